use std::time::Duration;

use futures::StreamExt;
use kvwatch::WatchExit;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::common::keys;
use crate::common::setup;
use crate::common::DEBOUNCE;

#[tokio::test(start_paused = true)]
async fn test_burst_of_writes_is_delivered_once() {
    let (store, watcher) = setup(DEBOUNCE);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();

    assert_eq!(stream.next().await, Some(vec![]));

    let burst_started = Instant::now();
    for i in 0..5 {
        store.put(format!("services/svc-{i}"), "10.0.0.1:80");
        sleep(Duration::from_millis(20)).await;
    }

    let pairs = stream.next().await.unwrap();
    assert_eq!(
        keys(&pairs),
        vec!["services/svc-0", "services/svc-1", "services/svc-2", "services/svc-3", "services/svc-4"]
    );
    assert!(burst_started.elapsed() >= DEBOUNCE);

    // Quiet store: nothing further.
    assert!(timeout(Duration::from_secs(5), stream.next()).await.is_err());

    handle.cancel();
    assert_eq!(handle.join().await.unwrap(), WatchExit::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_writes_outside_prefix_are_ignored() {
    let (store, watcher) = setup(DEBOUNCE);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    store.put("config/app", "v1");
    store.put("servicesx", "v1");
    assert!(timeout(Duration::from_secs(5), stream.next()).await.is_err());

    store.put("services/web", "v1");
    assert_eq!(keys(&stream.next().await.unwrap()), vec!["services/web"]);

    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_delete_tree_emits_empty_snapshot() {
    let (store, watcher) = setup(Duration::ZERO);
    store.put("services/a", "1");
    store.put("services/b", "2");

    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(keys(&stream.next().await.unwrap()), vec!["services/a", "services/b"]);

    store.delete_tree("services/");
    assert_eq!(stream.next().await, Some(vec![]));

    handle.cancel();
    assert!(stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_continuous_churn_still_emits() {
    let (store, watcher) = setup(DEBOUNCE);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    let writer_store = store.clone();
    let writer = tokio::spawn(async move {
        for i in 0..100u64 {
            writer_store.put("services/web", format!("v{i}"));
            sleep(DEBOUNCE / 4).await;
        }
    });

    // Writes never pause for a full debounce period, yet snapshots keep coming.
    let started = Instant::now();
    for _ in 0..3 {
        assert!(stream.next().await.is_some());
    }
    assert!(started.elapsed() <= DEBOUNCE * 10);

    handle.cancel();
    writer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_long_poll() {
    let (store, watcher) = setup(DEBOUNCE);
    let token = CancellationToken::new();
    let (mut stream, handle) = watcher.watch_tree("services/", token.clone()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    sleep(Duration::from_secs(30)).await;
    token.cancel();

    assert!(stream.next().await.is_none());
    assert_eq!(handle.join().await.unwrap(), WatchExit::Cancelled);
    // One initial read plus the parked blocking query.
    assert_eq!(store.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_ends_session() {
    let (store, watcher) = setup(DEBOUNCE);
    let (mut stream, handle) = watcher.watch_tree("services/", CancellationToken::new()).unwrap();
    assert_eq!(stream.next().await, Some(vec![]));

    drop(stream);
    store.put("services/web", "v1");

    assert_eq!(handle.join().await.unwrap(), WatchExit::ConsumerGone);
}
