use cwv_core::error::AppError;
use cwv_core::models::{MeasurementRecord, SaveOutcome};

use crate::integration::common::{date, seed_urls, setup_test_db};

fn sample(url_id: i64, day: u32) -> MeasurementRecord {
    MeasurementRecord {
        performance_score: Some(87.0),
        largest_contentful_paint: Some(2345.6),
        cumulative_layout_shift: Some(0.05),
        crux_interaction_to_next_paint: Some(180.0),
        ..MeasurementRecord::new(url_id, date(day))
    }
}

#[tokio::test]
async fn insert_and_read_back() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 1).await;
    let repo = db.measurement_repo();

    let outcome = repo.insert(&sample(ids[0], 1)).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted);

    let stored = repo.get(ids[0], date(1)).await.unwrap().expect("row should exist");
    assert_eq!(stored, sample(ids[0], 1));
    assert_eq!(stored.first_contentful_paint, None);
    assert!(repo.exists(ids[0], date(1)).await.unwrap());
    assert!(!repo.exists(ids[0], date(2)).await.unwrap());
}

#[tokio::test]
async fn second_insert_for_same_key_is_skipped_and_does_not_overwrite() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 1).await;
    let repo = db.measurement_repo();

    repo.insert(&sample(ids[0], 1)).await.unwrap();

    let replacement = MeasurementRecord {
        performance_score: Some(12.0),
        ..MeasurementRecord::new(ids[0], date(1))
    };
    let outcome = repo.insert(&replacement).await.unwrap();

    assert_eq!(outcome, SaveOutcome::AlreadyExists);
    assert_eq!(repo.count_for_date(date(1)).await.unwrap(), 1);
    let stored = repo.get(ids[0], date(1)).await.unwrap().unwrap();
    assert_eq!(stored.performance_score, Some(87.0));
}

#[tokio::test]
async fn same_url_on_another_date_is_a_new_row() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 1).await;
    let repo = db.measurement_repo();

    assert_eq!(repo.insert(&sample(ids[0], 1)).await.unwrap(), SaveOutcome::Inserted);
    assert_eq!(repo.insert(&sample(ids[0], 2)).await.unwrap(), SaveOutcome::Inserted);
    assert_eq!(repo.count_for_date(date(1)).await.unwrap(), 1);
    assert_eq!(repo.count_for_date(date(2)).await.unwrap(), 1);
}

#[tokio::test]
async fn all_null_metrics_are_stored() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 1).await;
    let repo = db.measurement_repo();

    repo.insert(&MeasurementRecord::new(ids[0], date(3))).await.unwrap();

    let stored = repo.get(ids[0], date(3)).await.unwrap().unwrap();
    assert_eq!(stored, MeasurementRecord::new(ids[0], date(3)));
}

#[tokio::test]
async fn unknown_url_is_a_database_error() {
    let (db, _container) = setup_test_db().await;

    let err = db
        .measurement_repo()
        .insert(&sample(424242, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DatabaseError(_)));
}

#[tokio::test]
async fn health_check_succeeds() {
    let (db, _container) = setup_test_db().await;
    db.health_check().await.unwrap();
}
