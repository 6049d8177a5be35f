use cwv_core::collect::{CollectService, TracingCollectReporter};
use cwv_core::error::AppError;
use cwv_core::mapper::PageSpeedMapper;
use cwv_core::testutil::{MockFetcher, performance_response};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{date, seed_urls, setup_test_db};

#[tokio::test]
async fn collect_against_postgres_is_idempotent() {
    let (db, _container) = setup_test_db().await;
    let ids = seed_urls(&db, 3).await;

    let fetcher = MockFetcher::new(performance_response(0.9))
        .on_url(ids[1], vec![Err(AppError::from_status(400, "bad url"))]);
    let svc = CollectService::new(
        db.url_repo(),
        fetcher.clone(),
        PageSpeedMapper,
        db.measurement_repo(),
    );

    let first = svc
        .run(date(20), &CancellationToken::new(), &TracingCollectReporter)
        .await
        .unwrap();

    assert_eq!(first.total_urls, 3);
    assert_eq!(first.stored, 2);
    assert_eq!(first.failed, 1);
    assert_eq!(first.skipped, 0);
    assert_eq!(db.measurement_repo().count_for_date(date(20)).await.unwrap(), 2);

    let second = svc
        .run(date(20), &CancellationToken::new(), &TracingCollectReporter)
        .await
        .unwrap();

    assert_eq!(second.skipped, first.stored);
    assert_eq!(second.stored, 1);
    assert_eq!(second.failed, 0);
    assert_eq!(db.measurement_repo().count_for_date(date(20)).await.unwrap(), 3);
    assert_eq!(fetcher.calls_for(ids[0]), 1);

    let stored = db
        .measurement_repo()
        .get(ids[0], date(20))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.performance_score, Some(90.0));
    assert_eq!(stored.crux_largest_contentful_paint, Some(2400.0));
}
