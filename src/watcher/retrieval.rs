use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::KvPair;
use crate::KvPairs;
use crate::KvStore;
use crate::QueryMeta;
use crate::QueryOptions;
use crate::StoreError;
use crate::constants::KEY_WATCH_KIND;
use crate::constants::TREE_WATCH_KIND;

/// What a watch session observes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    /// A single key
    Key(String),
    /// Every key under a prefix
    Prefix(String),
}

impl WatchTarget {
    /// Metric label for this kind of target
    pub fn kind(&self) -> &'static str {
        match self {
            WatchTarget::Key(_) => KEY_WATCH_KIND,
            WatchTarget::Prefix(_) => TREE_WATCH_KIND,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            WatchTarget::Key(key) => key,
            WatchTarget::Prefix(prefix) => prefix,
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            WatchTarget::Key(key) => write!(f, "key:{key}"),
            WatchTarget::Prefix(prefix) => write!(f, "tree:{prefix}"),
        }
    }
}

/// One round-trip to the store for a fixed target
///
/// Implementations are stateless adapters over a [`KvStore`]; everything that
/// changes between rounds travels in the [`QueryOptions`].
#[async_trait]
pub(crate) trait Retrieval: Send + Sync + 'static {
    type Snapshot: Send + 'static;

    fn target(&self) -> &WatchTarget;

    async fn fetch(
        &self,
        options: &QueryOptions,
    ) -> std::result::Result<(Self::Snapshot, QueryMeta), StoreError>;
}

pub(crate) struct KeyRetrieval {
    store: Arc<dyn KvStore>,
    target: WatchTarget,
}

impl KeyRetrieval {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        key: String,
    ) -> Self {
        Self {
            store,
            target: WatchTarget::Key(key),
        }
    }
}

#[async_trait]
impl Retrieval for KeyRetrieval {
    type Snapshot = Option<KvPair>;

    fn target(&self) -> &WatchTarget {
        &self.target
    }

    async fn fetch(
        &self,
        options: &QueryOptions,
    ) -> std::result::Result<(Option<KvPair>, QueryMeta), StoreError> {
        self.store.get(self.target.path(), options).await
    }
}

pub(crate) struct TreeRetrieval {
    store: Arc<dyn KvStore>,
    target: WatchTarget,
}

impl TreeRetrieval {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        prefix: String,
    ) -> Self {
        Self {
            store,
            target: WatchTarget::Prefix(prefix),
        }
    }
}

#[async_trait]
impl Retrieval for TreeRetrieval {
    type Snapshot = KvPairs;

    fn target(&self) -> &WatchTarget {
        &self.target
    }

    async fn fetch(
        &self,
        options: &QueryOptions,
    ) -> std::result::Result<(KvPairs, QueryMeta), StoreError> {
        self.store.list(self.target.path(), options).await
    }
}
