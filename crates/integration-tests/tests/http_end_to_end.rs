//! End-to-end: SQLite job store + record-import REST adapter (wiremock)

use std::sync::Arc;

use blob_watcher_core::application::{BlobReconciler, ReconcilerConfig, Watcher, WatcherSettings};
use blob_watcher_core::domain::{HarvestSearch, HarvestType, Job, JobConfig, JobState};
use blob_watcher_core::port::time_provider::SystemTimeProvider;
use blob_watcher_core::port::JobStore;
use blob_watcher_core::AppError;
use blob_watcher_infra_http::{HttpBlobStatusSource, HttpSourceConfig};
use blob_watcher_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup(server: &MockServer) -> (Arc<SqliteJobStore>, Watcher) {
    let pool = create_pool(":memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let time_provider = Arc::new(SystemTimeProvider);
    let store = Arc::new(SqliteJobStore::new(pool, time_provider.clone()));
    let source = Arc::new(
        HttpBlobStatusSource::new(
            HttpSourceConfig::new(server.uri()).with_credentials("melinda", "secret"),
        )
        .unwrap(),
    );
    let reconciler = Arc::new(BlobReconciler::new(
        source,
        time_provider,
        ReconcilerConfig::default(),
    ));
    let watcher = Watcher::new(store.clone(), reconciler, WatcherSettings::default());
    (store, watcher)
}

fn blob(id: &str, state: &str, records: u64) -> serde_json::Value {
    json!({
        "id": id,
        "state": state,
        "modificationTime": "2024-03-01T10:00:00.000Z",
        "processingInfo": {
            "numberOfRecords": records,
            "failedRecords": [],
            "importResults": []
        }
    })
}

fn sru_job(id: &str, blobs: &[&str]) -> Job {
    let search = HarvestSearch::new(HarvestType::Sru).with("offset", json!(40));
    Job::new(
        id,
        blobs.iter().map(|b| b.to_string()).collect(),
        JobConfig::new(search),
    )
}

#[tokio::test]
async fn test_settled_blob_is_promoted_over_http_then_job_done() {
    let server = MockServer::start().await;

    // First read sees TRANSFORMED, later reads see PROCESSED
    Mock::given(method("GET"))
        .and(path("/blobs/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blob("b1", "TRANSFORMED", 3)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blobs/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blob("b1", "PROCESSED", 3)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/blobs/b1"))
        .and(body_json(json!({"op": "updateState", "state": "PROCESSED"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (store, watcher) = setup(&server).await;
    store.insert(&sru_job("job-1", &["b1"])).await.unwrap();

    let first = watcher.sweep().await.unwrap();
    assert_eq!(first.inconclusive, 1);
    assert_eq!(
        store.find_by_id("job-1").await.unwrap().unwrap().state,
        JobState::PendingReconciliation
    );

    let second = watcher.sweep().await.unwrap();
    assert_eq!(second.done, 1);
    assert_eq!(
        store.find_by_id("job-1").await.unwrap().unwrap().state,
        JobState::Done
    );
}

#[tokio::test]
async fn test_aborted_blob_over_http_aborts_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blobs/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blob("b1", "PROCESSED", 1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blobs/b2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blob("b2", "ABORTED", 0)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (store, watcher) = setup(&server).await;
    store.insert(&sru_job("job-1", &["b1", "b2"])).await.unwrap();

    let report = watcher.sweep().await.unwrap();

    assert_eq!(report.aborted, 1);
    let stored = store.find_by_id("job-1").await.unwrap().unwrap();
    assert_eq!(stored.state, JobState::Aborted);
    assert_eq!(stored.job_config.link_data_harvest_search.offset(), Some(40));
}

#[tokio::test]
async fn test_service_outage_keeps_job_pending() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (store, watcher) = setup(&server).await;
    store.insert(&sru_job("job-1", &["b1"])).await.unwrap();

    let report = watcher.sweep().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(
        store.find_by_id("job-1").await.unwrap().unwrap().state,
        JobState::PendingReconciliation
    );
}

/// Once terminal, a job cannot be moved again
#[tokio::test]
async fn test_terminal_job_rejects_further_transitions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blobs/b1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(blob("b1", "PROCESSED", 1)))
        .mount(&server)
        .await;

    let (store, watcher) = setup(&server).await;
    store.insert(&sru_job("job-1", &["b1"])).await.unwrap();
    watcher.sweep().await.unwrap();

    let result = store
        .set_state(&"job-1".to_string(), JobState::PendingSruHarvester)
        .await;

    assert!(matches!(result, Err(AppError::InvalidState(_))));
    assert_eq!(
        store.find_by_id("job-1").await.unwrap().unwrap().state,
        JobState::Done
    );
}
