use cwv_core::models::{MeasurementRecord, NewUrl, Strategy};
use cwv_db::Database;

use crate::integration::common::{date, seed_urls, setup_test_db};

#[tokio::test]
async fn add_and_get_url() {
    let (db, _container) = setup_test_db().await;
    let repo = db.url_repo();

    let id = repo
        .add(
            &NewUrl::new("https://shop.example.com/", Strategy::Desktop)
                .with_brand("shop")
                .with_page_type("category"),
        )
        .await
        .unwrap();

    let url = repo.get_by_id(id).await.unwrap().expect("URL should exist");
    assert_eq!(url.url, "https://shop.example.com/");
    assert_eq!(url.device, "desktop");
    assert_eq!(url.strategy().unwrap(), Strategy::Desktop);
    assert_eq!(url.brand, "shop");
    assert_eq!(url.page_type, "category");
    assert_eq!(url.country_id, "ES");
    assert!(url.created_at.is_some());

    assert!(repo.get_by_id(id + 1000).await.unwrap().is_none());
}

#[tokio::test]
async fn list_all_is_ordered_by_id() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 4).await;

    let all = db.url_repo().list_all().await.unwrap();
    let listed: Vec<i64> = all.iter().map(|u| u.url_id).collect();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn device_outside_mobile_desktop_is_rejected() {
    let (db, _container) = setup_test_db().await;

    let result = sqlx::query("INSERT INTO urls (url, device) VALUES ('https://x.example/', 'tablet')")
        .execute(db.pool())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn pending_excludes_already_measured_urls() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 5).await;
    let measurements = db.measurement_repo();

    measurements
        .insert(&MeasurementRecord::new(ids[1], date(10)))
        .await
        .unwrap();
    measurements
        .insert(&MeasurementRecord::new(ids[3], date(10)))
        .await
        .unwrap();

    let work = db.url_repo().select_pending(date(10)).await.unwrap();

    assert_eq!(work.total_urls, 5);
    assert_eq!(work.already_measured(), 2);
    let pending: Vec<i64> = work.pending.iter().map(|u| u.url_id).collect();
    assert_eq!(pending, vec![ids[0], ids[2], ids[4]]);
}

#[tokio::test]
async fn pending_is_scoped_to_the_execution_date() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 2).await;

    db.measurement_repo()
        .insert(&MeasurementRecord::new(ids[0], date(10)))
        .await
        .unwrap();

    let other_day = db.url_repo().select_pending(date(11)).await.unwrap();
    assert_eq!(other_day.pending.len(), 2);
}

#[tokio::test]
async fn pending_on_empty_table() {
    let (db, _container) = setup_test_db().await;

    let work = db.url_repo().select_pending(date(10)).await.unwrap();

    assert_eq!(work.total_urls, 0);
    assert!(work.pending.is_empty());
}

#[tokio::test]
async fn pending_never_exceeds_total_while_urls_are_seeded() {
    let (db, _container) = setup_test_db().await;
    seed_urls(&db, 3).await;

    let seeder_db: Database = db.clone();
    let seeder = tokio::spawn(async move {
        let repo = seeder_db.url_repo();
        for i in 0..200 {
            repo.add(&NewUrl::new(format!("https://late{i}.example.com/"), Strategy::Mobile))
                .await
                .unwrap();
        }
    });

    let repo = db.url_repo();
    while !seeder.is_finished() {
        let work = repo.select_pending(date(10)).await.unwrap();
        assert_eq!(
            work.pending.len() as u64,
            work.total_urls,
            "nothing is measured, so every counted URL must be pending and vice versa"
        );
    }
    seeder.await.unwrap();

    let work = repo.select_pending(date(10)).await.unwrap();
    assert_eq!(work.total_urls, 203);
    assert_eq!(work.pending.len(), 203);
}
