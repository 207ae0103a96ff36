use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::backoff::ExponentialBackoff;
use super::debounce::DebounceGate;
use super::debounce::Offer;
use super::retrieval::Retrieval;
use super::WatchExit;
use crate::QueryOptions;
use crate::WATCH_FATAL_FAILURES;
use crate::WATCH_FETCHES;
use crate::WATCH_RETRYABLE_FAILURES;

/// State of one running watch
///
/// Owned by the task that drives it. Only the debounce gate is shared, with
/// the gate's own timer task.
pub(crate) struct WatchLoop<R: Retrieval> {
    retrieval: R,
    backoff: ExponentialBackoff,
    gate: DebounceGate<R::Snapshot>,
    /// Only used to notice a consumer that dropped the stream
    consumer: mpsc::Sender<R::Snapshot>,
    /// Cancelled by the caller
    cancel: CancellationToken,
    /// Child of `cancel`, also cancelled when the loop exits on its own
    session: CancellationToken,
    /// Index of the newest snapshot handed to the gate
    last_index: Option<u64>,
}

impl<R: Retrieval> WatchLoop<R> {
    pub(crate) fn new(
        retrieval: R,
        backoff: ExponentialBackoff,
        debounce: std::time::Duration,
        tx: mpsc::Sender<R::Snapshot>,
        cancel: CancellationToken,
    ) -> Self {
        let session = cancel.child_token();
        let kind = retrieval.target().kind();
        Self {
            gate: DebounceGate::new(debounce, tx.clone(), session.clone(), kind),
            retrieval,
            backoff,
            consumer: tx,
            cancel,
            session,
            last_index: None,
        }
    }

    /// Runs until cancellation, a fatal error, or the consumer going away.
    ///
    /// The output channel is closed before this returns.
    pub(crate) async fn run(mut self) -> WatchExit {
        let target = self.retrieval.target().clone();
        debug!(%target, "watch started");

        let exit = self.drive().await;
        self.gate.shutdown().await;

        match &exit {
            WatchExit::Failed(err) => {
                WATCH_FATAL_FAILURES.with_label_values(&[target.kind()]).inc();
                error!(%target, %err, "watch stopped on fatal error");
            }
            other => info!(%target, exit = ?other, "watch stopped"),
        }
        exit
    }

    async fn drive(&mut self) -> WatchExit {
        let target = self.retrieval.target();
        let kind = target.kind();
        let mut options = QueryOptions::stale_blocking().with_cancellation(self.session.clone());

        loop {
            if self.cancel.is_cancelled() {
                return WatchExit::Cancelled;
            }

            WATCH_FETCHES.with_label_values(&[kind]).inc();
            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WatchExit::Cancelled,
                _ = self.consumer.closed() => return WatchExit::ConsumerGone,
                fetched = self.retrieval.fetch(&options) => fetched,
            };

            let (snapshot, meta) = match fetched {
                Ok(response) => response,
                Err(err) if err.is_retryable() => {
                    WATCH_RETRYABLE_FAILURES.with_label_values(&[kind]).inc();
                    // The store may no longer have our index as a basis: resync
                    // with a non-blocking read.
                    options.wait_index = 0;

                    let delay = self.backoff.next_backoff();
                    warn!(%target, %err, ?delay, "retryable fetch failure, backing off");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return WatchExit::Cancelled,
                        _ = sleep(delay) => continue,
                    }
                }
                Err(err) => return WatchExit::Failed(err),
            };

            self.backoff.reset();

            let immediate = options.wait_index == 0;
            let index = meta.last_index;
            options.wait_index = index;

            match self.last_index {
                Some(last) if index <= last => {
                    if index < last {
                        debug!(%target, index, last, "store index went backwards, keeping baseline");
                    } else {
                        trace!(%target, index, "no change");
                    }
                    continue;
                }
                _ => self.last_index = Some(index),
            }

            trace!(%target, index, immediate, "change detected");
            match self.gate.offer(snapshot, immediate).await {
                Offer::Emitted | Offer::Deferred => {}
                Offer::Cancelled => return WatchExit::Cancelled,
                Offer::ConsumerGone => return WatchExit::ConsumerGone,
            }
        }
    }
}
