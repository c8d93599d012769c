mod common;

use std::time::Duration;

use docbridge::{
    memory::{DriverOp, InMemoryDriver, codes},
    prelude::*,
};

use common::{book, books, recording_store};

#[tokio::test]
async fn transient_failures_are_retried_with_backoff() {
    let driver = InMemoryDriver::new();
    let (store, sleeper) = recording_store(driver.clone(), RetryConfig::default());
    driver.fail_next(DriverOp::Put, 2, codes::UNAVAILABLE).await;

    let mut document = book("A", 1);
    store.collection(books()).put(&mut document).await.unwrap();

    assert!(document.get("docRevision").is_some());
    assert_eq!(driver.calls(DriverOp::Put), 3);
    assert_eq!(sleeper.count(), 2);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn exhausted_retries_surface_the_last_failure() {
    let driver = InMemoryDriver::new();
    let retry = RetryConfig::builder()
        .with_max_attempts(3)
        .build()
        .unwrap();
    let (store, sleeper) = recording_store(driver.clone(), retry);
    driver.fail_next(DriverOp::Get, 5, codes::THROTTLED).await;

    let err = store
        .collection(books())
        .get_by_key(&DocumentKey::new("A").with_sort(1))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(matches!(
        err.into_root(),
        DocStoreError::RetriesExhausted { attempts: 3, .. }
    ));
    assert_eq!(driver.calls(DriverOp::Get), 3);
    assert_eq!(sleeper.count(), 2);
}

#[tokio::test]
async fn fixed_mode_waits_the_same_delay() {
    let driver = InMemoryDriver::new();
    let retry = RetryConfig::builder()
        .with_mode(RetryMode::Fixed)
        .with_fixed_delay_millis(25)
        .with_max_attempts(4)
        .build()
        .unwrap();
    let (store, sleeper) = recording_store(driver.clone(), retry);
    driver.fail_next(DriverOp::Query, 3, codes::TIMEOUT).await;

    let documents = store
        .collection(books())
        .query(Query::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert!(documents.is_empty());
    assert_eq!(sleeper.delays(), vec![Duration::from_millis(25); 3]);
}

#[tokio::test]
async fn each_action_has_its_own_budget() {
    let driver = InMemoryDriver::new();
    let retry = RetryConfig::builder()
        .with_max_attempts(2)
        .build()
        .unwrap();
    let (store, _sleeper) = recording_store(driver.clone(), retry);
    driver.fail_next(DriverOp::Put, 3, codes::UNAVAILABLE).await;

    let result = store
        .collection(books())
        .batch()
        .put(book("A", 1))
        .put(book("B", 2))
        .run()
        .await
        .unwrap();

    assert_eq!(result.get(0).unwrap().error().unwrap().kind(), ErrorKind::Unavailable);
    assert!(result.get(1).unwrap().is_success());
    assert_eq!(driver.calls(DriverOp::Put), 4);
}

#[tokio::test(start_paused = true)]
async fn total_timeout_bounds_the_retry_loop() {
    let driver = InMemoryDriver::new();
    let retry = RetryConfig::builder()
        .with_max_attempts(10)
        .with_initial_delay_millis(100)
        .with_total_timeout_millis(250)
        .build()
        .unwrap();
    let store = DocumentStore::builder(driver.clone()).with_retry(retry).build();
    driver.fail_next(DriverOp::Put, 10, codes::UNAVAILABLE).await;

    let err = store
        .collection(books())
        .put(&mut book("A", 1))
        .await
        .unwrap_err();

    assert!(matches!(
        err.into_root(),
        DocStoreError::RetriesExhausted { attempts: 2, .. }
    ));
    assert_eq!(driver.calls(DriverOp::Put), 2);
}
