use std::sync::Arc;
use std::time::Duration;

use kvwatch::KvPairs;
use kvwatch::MemoryStore;
use kvwatch::Watcher;

pub const RETRY: Duration = Duration::from_millis(100);
pub const DEBOUNCE: Duration = Duration::from_millis(200);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub fn setup(debounce: Duration) -> (MemoryStore, Watcher) {
    enable_logger();
    let store = MemoryStore::new();
    let watcher = Watcher::new(Arc::new(store.clone()), RETRY, debounce);
    (store, watcher)
}

pub fn keys(pairs: &KvPairs) -> Vec<&str> {
    pairs.iter().map(|pair| pair.key.as_str()).collect()
}
