use std::time::Duration;

// -
// Long-poll limits

/// Maximum time a blocking query is allowed to wait on the store.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(10 * 60);

/// Capacity of the per-watch output channel: at most one undelivered snapshot.
pub(crate) const WATCH_CHANNEL_CAPACITY: usize = 1;

// -
// Metric labels

pub(crate) const KEY_WATCH_KIND: &str = "key";
pub(crate) const TREE_WATCH_KIND: &str = "tree";
