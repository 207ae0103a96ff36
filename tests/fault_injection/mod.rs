use std::time::Duration;

use futures::StreamExt;
use kvwatch::BusinessError;
use kvwatch::NetworkError;
use kvwatch::StoreError;
use kvwatch::WatchExit;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::keys;
use crate::common::setup;
use crate::common::DEBOUNCE;
use crate::common::RETRY;

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let (store, watcher) = setup(DEBOUNCE);
    store.fail_next(StoreError::Network(NetworkError::ConnectionLost("reset".to_string())));
    store.fail_next(StoreError::Business(BusinessError::RateLimited { retry_after_ms: 10 }));
    let started = Instant::now();

    let (mut stream, handle) = watcher.watch_key("config/app", CancellationToken::new()).unwrap();

    assert_eq!(stream.next().await, Some(None));
    // Two jittered delays, each at least half the current interval.
    assert!(started.elapsed() >= RETRY / 2 + RETRY * 3 / 4);
    assert!(store.request_count() >= 3);

    handle.cancel();
    assert_eq!(handle.join().await.unwrap(), WatchExit::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_ends_stream() {
    let (store, watcher) = setup(DEBOUNCE);
    let denied = StoreError::Business(BusinessError::PermissionDenied("no read on config/".to_string()));
    store.fail_next(denied.clone());

    let (mut stream, handle) = watcher.watch_key("config/app", CancellationToken::new()).unwrap();

    assert!(stream.next().await.is_none());
    assert_eq!(handle.join().await.unwrap(), WatchExit::Failed(denied));
    assert_eq!(store.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_failure_mid_watch() {
    let (store, watcher) = setup(Duration::ZERO);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    store.fail_next(StoreError::Server {
        status: 403,
        message: "ACL not found".to_string(),
    });
    store.put("services/web", "v1");

    assert_eq!(keys(&stream.next().await.unwrap()), vec!["services/web"]);
    assert!(stream.next().await.is_none());
    assert!(handle.join().await.unwrap().is_failed());
}

#[tokio::test(start_paused = true)]
async fn test_recovery_does_not_repeat_last_snapshot() {
    let (store, watcher) = setup(Duration::ZERO);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    store.fail_next(StoreError::Business(BusinessError::NoLeader));
    store.put("services/web", "v1");
    assert_eq!(keys(&stream.next().await.unwrap()), vec!["services/web"]);

    // The failed request is retried as a plain read of unchanged data.
    assert!(timeout(Duration::from_secs(5), stream.next()).await.is_err());
    assert_eq!(store.request_count(), 5);

    store.put("services/db", "v1");
    assert_eq!(keys(&stream.next().await.unwrap()), vec!["services/db", "services/web"]);

    handle.cancel();
}
