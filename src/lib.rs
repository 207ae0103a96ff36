//! Change-notification streams over a long-polling key-value store.
//!
//! A [`Watcher`] turns blocking queries against a [`KvStore`] into a stream of
//! snapshots that only yields when the watched key or subtree actually
//! changed. Transient store failures are retried with exponential backoff,
//! bursts of writes are debounced into one emission, and every session can be
//! cancelled through a [`tokio_util::sync::CancellationToken`].

mod client;
mod config;
mod constants;
mod errors;
mod metrics;
mod watcher;

pub use client::*;
pub use config::*;
pub use constants::DEFAULT_WAIT_TIME;
pub use errors::*;
pub use metrics::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
