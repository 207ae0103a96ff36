use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::KvPair;
use super::KvPairs;
use super::KvStore;
use super::NetworkError;
use super::QueryMeta;
use super::QueryOptions;
use super::StoreError;

/// Index reported for a target nothing has ever been written under.
///
/// Never zero: a zero wait index means "do not block", so handing it back to a
/// watcher would make it spin.
const FLOOR_INDEX: u64 = 1;

/// In-process key-value store with blocking-query semantics
///
/// Every write bumps a single store-wide index. Queries report the highest
/// modify (or delete) index under their target, so unrelated writes do not
/// wake a blocking query.
///
/// Failures can be scripted with [`MemoryStore::fail_next`]; each queued error
/// is returned by exactly one subsequent `get` or `list`.
///
/// Tombstones of deleted keys are never compacted, so memory grows with the
/// number of distinct keys ever deleted. Meant for tests and demos.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
    state: RwLock<StoreState>,
    index_tx: watch::Sender<u64>,
    faults: Mutex<VecDeque<StoreError>>,
    requests: AtomicU64,
}

struct StoreState {
    index: u64,
    entries: BTreeMap<String, KvPair>,
    tombstones: BTreeMap<String, u64>,
}

impl StoreState {
    fn key_index(
        &self,
        key: &str,
    ) -> u64 {
        let live = self.entries.get(key).map(|pair| pair.modify_index);
        let deleted = self.tombstones.get(key).copied();
        live.into_iter().chain(deleted).max().unwrap_or(FLOOR_INDEX)
    }

    fn prefix_index(
        &self,
        prefix: &str,
    ) -> u64 {
        let live = under_prefix(&self.entries, prefix).map(|(_, pair)| pair.modify_index);
        let deleted = under_prefix(&self.tombstones, prefix).map(|(_, index)| *index);
        live.chain(deleted).max().unwrap_or(FLOOR_INDEX)
    }
}

fn under_prefix<'a, V>(
    map: &'a BTreeMap<String, V>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a String, &'a V)> + 'a {
    map.range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(prefix))
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (index_tx, _) = watch::channel(FLOOR_INDEX);
        Self {
            inner: Arc::new(MemoryStoreInner {
                state: RwLock::new(StoreState {
                    index: FLOOR_INDEX,
                    entries: BTreeMap::new(),
                    tombstones: BTreeMap::new(),
                }),
                index_tx,
                faults: Mutex::new(VecDeque::new()),
                requests: AtomicU64::new(0),
            }),
        }
    }

    /// Stores `value` under `key`, returning the index of the write
    pub fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
    ) -> u64 {
        self.put_with_flags(key, value, 0)
    }

    pub fn put_with_flags(
        &self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
        flags: u64,
    ) -> u64 {
        let key = key.into();
        let value = value.into();

        let index = {
            let mut state = self.inner.state.write();
            state.index += 1;
            let index = state.index;

            state.tombstones.remove(&key);
            let create_index = state.entries.get(&key).map_or(index, |pair| pair.create_index);
            state.entries.insert(
                key.clone(),
                KvPair {
                    key: key.clone(),
                    value,
                    create_index,
                    modify_index: index,
                    flags,
                },
            );
            index
        };

        trace!(%key, index, "put");
        self.publish(index);
        index
    }

    /// Removes `key`. Deleting a missing key still consumes an index but wakes
    /// nobody watching it.
    pub fn delete(
        &self,
        key: &str,
    ) -> u64 {
        let index = {
            let mut state = self.inner.state.write();
            state.index += 1;
            let index = state.index;
            if state.entries.remove(key).is_some() {
                state.tombstones.insert(key.to_string(), index);
            }
            index
        };

        trace!(%key, index, "delete");
        self.publish(index);
        index
    }

    /// Removes every key starting with `prefix`
    pub fn delete_tree(
        &self,
        prefix: &str,
    ) -> u64 {
        let index = {
            let mut state = self.inner.state.write();
            state.index += 1;
            let index = state.index;
            let doomed: Vec<String> = under_prefix(&state.entries, prefix).map(|(key, _)| key.clone()).collect();
            for key in doomed {
                state.entries.remove(&key);
                state.tombstones.insert(key, index);
            }
            index
        };

        trace!(%prefix, index, "delete tree");
        self.publish(index);
        index
    }

    /// Queues an error to be returned by the next request
    pub fn fail_next(
        &self,
        error: StoreError,
    ) {
        self.inner.faults.lock().push_back(error);
    }

    /// Number of `get`/`list` calls served so far, failed ones included
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::SeqCst)
    }

    /// Store-wide index of the latest write
    pub fn last_index(&self) -> u64 {
        self.inner.state.read().index
    }

    fn publish(
        &self,
        index: u64,
    ) {
        self.inner.index_tx.send_replace(index);
    }

    fn begin_request(&self) -> std::result::Result<(), StoreError> {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.inner.faults.lock().pop_front() {
            debug!(?error, "injected failure");
            return Err(error);
        }
        Ok(())
    }

    /// Parks the caller until `index_of` moves past `wait_index`, the wait
    /// time elapses, or the request is cancelled.
    async fn block_on_index<F>(
        &self,
        options: &QueryOptions,
        index_of: F,
    ) -> std::result::Result<(), StoreError>
    where
        F: Fn(&StoreState) -> u64 + Send + Sync,
    {
        if options.wait_index == 0 {
            return Ok(());
        }

        // Subscribe before reading so a write landing in between still wakes us.
        let mut changes = self.inner.index_tx.subscribe();
        let deadline = tokio::time::sleep(options.effective_wait_time());
        tokio::pin!(deadline);

        loop {
            let current = index_of(&*self.inner.state.read());
            if current > options.wait_index {
                return Ok(());
            }

            tokio::select! {
                _ = &mut deadline => {
                    trace!(wait_index = options.wait_index, "blocking query wait time elapsed");
                    return Ok(());
                }
                _ = cancelled(options.cancel.as_ref()) => {
                    return Err(NetworkError::Cancelled.into());
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(
        &self,
        key: &str,
        options: &QueryOptions,
    ) -> std::result::Result<(Option<KvPair>, QueryMeta), StoreError> {
        let started = Instant::now();
        self.begin_request()?;
        self.block_on_index(options, |state| state.key_index(key)).await?;

        let state = self.inner.state.read();
        let meta = QueryMeta {
            last_index: state.key_index(key),
            known_leader: true,
            request_time: started.elapsed(),
        };
        Ok((state.entries.get(key).cloned(), meta))
    }

    async fn list(
        &self,
        prefix: &str,
        options: &QueryOptions,
    ) -> std::result::Result<(KvPairs, QueryMeta), StoreError> {
        let started = Instant::now();
        self.begin_request()?;
        self.block_on_index(options, |state| state.prefix_index(prefix)).await?;

        let state = self.inner.state.read();
        let meta = QueryMeta {
            last_index: state.prefix_index(prefix),
            known_leader: true,
            request_time: started.elapsed(),
        };
        let pairs = under_prefix(&state.entries, prefix).map(|(_, pair)| pair.clone()).collect();
        Ok((pairs, meta))
    }
}
