//! Store client contract consumed by the watch loop
//!
//! The watcher never talks to the network itself. Everything it needs from the
//! remote store is captured by the [`KvStore`] trait:
//! - [`KvStore::get`] - fetch a single key, `None` when the key does not exist
//! - [`KvStore::list`] - fetch every record under a prefix, ordered by key
//!
//! Both calls accept [`QueryOptions`] and report the store's change index in
//! [`QueryMeta`]. A non-zero `wait_index` turns the call into a blocking query
//! that returns only once the index moves past it or `wait_time` elapses.
//!
//! [`MemoryStore`] is a single-process implementation with the same blocking
//! semantics.

mod error;
mod memory;

pub use error::*;
pub use memory::*;


use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::DEFAULT_WAIT_TIME;

/// A single value record as stored remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Bytes,
    /// Index at which the key was first written
    pub create_index: u64,
    /// Index of the last write to the key
    pub modify_index: u64,
    /// Opaque application flags stored alongside the value
    pub flags: u64,
}

pub type KvPairs = Vec<KvPair>;

/// Per-request query parameters
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Any replica may answer, possibly with slightly stale data
    pub allow_stale: bool,

    /// Force a round-trip through the leader with a consistency check
    pub require_consistent: bool,

    /// Allow the agent-side response cache
    pub use_cache: bool,

    /// Block until the store's index for the target exceeds this value.
    /// Zero means "answer immediately".
    pub wait_index: u64,

    /// Upper bound on how long a blocking query may be held open
    pub wait_time: Duration,

    /// Aborts the request when cancelled
    pub cancel: Option<CancellationToken>,
}

impl QueryOptions {
    /// Options used by long-running watches: stale reads are acceptable in
    /// exchange for lower load on the leader.
    pub fn stale_blocking() -> Self {
        Self {
            allow_stale: true,
            require_consistent: false,
            use_cache: true,
            wait_index: 0,
            wait_time: DEFAULT_WAIT_TIME,
            cancel: None,
        }
    }

    /// Returns a copy bound to the given cancellation token
    pub fn with_cancellation(
        &self,
        token: CancellationToken,
    ) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// Effective long-poll duration, never above [`DEFAULT_WAIT_TIME`]
    pub fn effective_wait_time(&self) -> Duration {
        if self.wait_time.is_zero() {
            DEFAULT_WAIT_TIME
        } else {
            self.wait_time.min(DEFAULT_WAIT_TIME)
        }
    }
}

/// Response metadata returned with every successful query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Version of the queried data as of this response
    pub last_index: u64,

    /// Whether the answering node knew of a cluster leader
    pub known_leader: bool,

    /// Time spent serving the request, including any blocking wait
    pub request_time: Duration,
}

/// Read side of a remote key-value store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Fetches one key. A missing key is `Ok((None, meta))`, not an error.
    async fn get(
        &self,
        key: &str,
        options: &QueryOptions,
    ) -> std::result::Result<(Option<KvPair>, QueryMeta), StoreError>;

    /// Fetches all records whose key starts with `prefix`, ordered by key.
    async fn list(
        &self,
        prefix: &str,
        options: &QueryOptions,
    ) -> std::result::Result<(KvPairs, QueryMeta), StoreError>;
}
