//! Watch sessions over a [`KvStore`]
//!
//! - [`Watcher`] - configured entry point, cheap to clone
//! - [`Watcher::watch_key`] - stream of a single key's record (or its absence)
//! - [`Watcher::watch_tree`] - stream of every record under a prefix
//! - [`WatchHandle`] - cancels a session and reports why it ended
//!
//! Each session runs on its own tokio task: it long-polls the store with the
//! last seen change index, backs off on transient failures, and debounces
//! bursts of changes before handing a snapshot to the consumer.
//!
//! # Basic Usage
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use futures::StreamExt;
//! use kvwatch::MemoryStore;
//! use kvwatch::Watcher;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     let watcher = Watcher::new(
//!         Arc::new(store.clone()),
//!         Duration::from_millis(500),
//!         Duration::from_millis(250),
//!     );
//!
//!     let (mut stream, handle) = watcher
//!         .watch_tree("services/", CancellationToken::new())
//!         .unwrap();
//!
//!     store.put("services/web", "10.0.0.1:80");
//!     while let Some(pairs) = stream.next().await {
//!         println!("{} services", pairs.len());
//!         handle.cancel();
//!     }
//! }
//! ```

mod backoff;
mod debounce;
mod retrieval;
mod watch_loop;

pub use backoff::ExponentialBackoff;
pub use retrieval::WatchTarget;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use self::retrieval::KeyRetrieval;
use self::retrieval::Retrieval;
use self::retrieval::TreeRetrieval;
use self::watch_loop::WatchLoop;
use crate::BackoffPolicy;
use crate::Error;
use crate::KvPair;
use crate::KvPairs;
use crate::KvStore;
use crate::Result;
use crate::StoreError;
use crate::WatcherConfig;
use crate::constants::WATCH_CHANNEL_CAPACITY;

/// Read-only stream of snapshots produced by a watch session.
///
/// Ends when the session is cancelled or hits a fatal error; use
/// [`WatchHandle::join`] to tell the two apart.
pub type WatchStream<T> = ReceiverStream<T>;

/// Why a watch session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchExit {
    /// The cancellation token fired
    Cancelled,
    /// The store returned an error classified as fatal
    Failed(StoreError),
    /// The stream was dropped by its consumer
    ConsumerGone,
}

impl WatchExit {
    pub fn is_failed(&self) -> bool {
        matches!(self, WatchExit::Failed(_))
    }
}

/// Controls a running watch session
#[derive(Debug)]
pub struct WatchHandle {
    target: WatchTarget,
    cancel: CancellationToken,
    task: JoinHandle<WatchExit>,
}

impl WatchHandle {
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// Stops the session. Takes effect at the loop's next suspension point;
    /// no further snapshots are emitted afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the session's task has completed
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to end and reports why
    ///
    /// # Errors
    /// - [`Error::TaskFailed`] if the session task panicked or was aborted
    pub async fn join(self) -> Result<WatchExit> {
        Ok(self.task.await?)
    }
}

/// Entry point for watching keys and subtrees of a [`KvStore`]
#[derive(Clone)]
pub struct Watcher {
    store: Arc<dyn KvStore>,
    retry: BackoffPolicy,
    debounce: Duration,
}

impl std::fmt::Debug for Watcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("retry", &self.retry)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Creates a watcher with default backoff growth starting at `retry_time`
    /// and the given debounce duration.
    pub fn new(
        store: Arc<dyn KvStore>,
        retry_time: Duration,
        debounce_time: Duration,
    ) -> Self {
        Self {
            store,
            retry: BackoffPolicy::with_initial_interval(retry_time),
            debounce: debounce_time,
        }
    }

    /// Creates a watcher from a validated [`WatcherConfig`]
    pub fn from_config(
        store: Arc<dyn KvStore>,
        config: &WatcherConfig,
    ) -> Self {
        Self {
            store,
            retry: config.retry,
            debounce: config.debounce.debounce(),
        }
    }

    /// Watches a single key.
    ///
    /// The first item reflects the key's current state (`None` when absent)
    /// and is delivered without debouncing. Must be called from within a tokio
    /// runtime.
    ///
    /// # Errors
    /// - [`Error::InvalidTarget`] if `key` is empty
    pub fn watch_key(
        &self,
        key: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<(WatchStream<Option<KvPair>>, WatchHandle)> {
        let key = key.into();
        if key.is_empty() {
            return Err(Error::InvalidTarget("key must not be empty".into()));
        }
        Ok(self.spawn(KeyRetrieval::new(Arc::clone(&self.store), key), cancel))
    }

    /// Watches every key under `prefix`. An empty prefix watches the whole
    /// store. Must be called from within a tokio runtime.
    pub fn watch_tree(
        &self,
        prefix: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<(WatchStream<KvPairs>, WatchHandle)> {
        let prefix = prefix.into();
        Ok(self.spawn(TreeRetrieval::new(Arc::clone(&self.store), prefix), cancel))
    }

    fn spawn<R: Retrieval>(
        &self,
        retrieval: R,
        cancel: CancellationToken,
    ) -> (WatchStream<R::Snapshot>, WatchHandle) {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let target = retrieval.target().clone();
        let cancel = cancel.child_token();

        let watch = WatchLoop::new(
            retrieval,
            ExponentialBackoff::new(&self.retry),
            self.debounce,
            tx,
            cancel.clone(),
        );
        let task = tokio::spawn(watch.run());

        (ReceiverStream::new(rx), WatchHandle { target, cancel, task })
    }
}
