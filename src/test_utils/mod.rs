//! Helpers shared by the unit tests

use std::time::Duration;

use bytes::Bytes;

use crate::KvPair;
use crate::QueryMeta;

pub(crate) fn kv(
    key: &str,
    value: &str,
    index: u64,
) -> KvPair {
    KvPair {
        key: key.to_string(),
        value: Bytes::copy_from_slice(value.as_bytes()),
        create_index: index,
        modify_index: index,
        flags: 0,
    }
}

pub(crate) fn meta(last_index: u64) -> QueryMeta {
    QueryMeta {
        last_index,
        known_leader: true,
        request_time: Duration::from_millis(1),
    }
}
