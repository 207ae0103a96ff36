//! Debounce gate
//!
//! Coalesces bursts of changes into a single emission carrying the latest
//! snapshot.
//!
//! ```text
//! offer(s1)  offer(s2)  offer(s3)              timer fires
//!    |----------|----------|-----------------------|
//!    ^ window opens        ^ timer re-armed        emit(s3), window closes
//! ```
//!
//! A window that has been open for more than twice the debounce duration no
//! longer defers: the next offer is emitted at once, so a target under constant
//! churn still produces at least one emission per `2 × debounce`.
//!
//! The deferred emission runs on its own task. The watch loop and that task
//! serialize on one async mutex around [`GateState`], which also owns the
//! output sender, so two emissions can never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::WATCH_COALESCED;
use crate::WATCH_EMISSIONS;

/// Result of handing a snapshot to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    /// Delivered to the consumer
    Emitted,
    /// Scheduled for delivery after the debounce duration
    Deferred,
    /// Session cancelled while waiting on the consumer
    Cancelled,
    /// Consumer dropped the stream
    ConsumerGone,
}

struct GateState<T> {
    /// `None` once the gate is shut down
    tx: Option<mpsc::Sender<T>>,
    /// When the current coalescing window opened
    window_start: Option<Instant>,
    /// Bumped by every offer; a timer only emits if it is still current
    generation: u64,
    /// Timer task holding a not-yet-emitted snapshot
    pending: Option<JoinHandle<()>>,
}

pub(crate) struct DebounceGate<T> {
    debounce: Duration,
    state: Arc<Mutex<GateState<T>>>,
    session: CancellationToken,
    kind: &'static str,
}

impl<T: Send + 'static> DebounceGate<T> {
    pub(crate) fn new(
        debounce: Duration,
        tx: mpsc::Sender<T>,
        session: CancellationToken,
        kind: &'static str,
    ) -> Self {
        Self {
            debounce,
            state: Arc::new(Mutex::new(GateState {
                tx: Some(tx),
                window_start: None,
                generation: 0,
                pending: None,
            })),
            session,
            kind,
        }
    }

    /// Hands a new snapshot to the gate.
    ///
    /// `immediate` bypasses debouncing; the loop sets it when there is no
    /// baseline the consumer could already hold.
    pub(crate) async fn offer(
        &self,
        snapshot: T,
        immediate: bool,
    ) -> Offer {
        let mut state = self.state.lock().await;

        state.generation += 1;
        if let Some(pending) = state.pending.take() {
            pending.abort();
            WATCH_COALESCED.with_label_values(&[self.kind]).inc();
            trace!(kind = self.kind, "superseded pending emission");
        }

        let window_expired = state
            .window_start
            .is_some_and(|start| start.elapsed() > self.debounce.saturating_mul(2));

        if immediate || window_expired || self.debounce.is_zero() {
            if window_expired {
                debug!(kind = self.kind, "debounce window exceeded 2x, emitting now");
            }
            state.window_start = None;
            return emit(&mut *state, snapshot, &self.session, self.kind).await;
        }

        if state.window_start.is_none() {
            state.window_start = Some(Instant::now());
        }

        let generation = state.generation;
        let shared = Arc::clone(&self.state);
        let session = self.session.clone();
        let debounce = self.debounce;
        let kind = self.kind;

        state.pending = Some(tokio::spawn(async move {
            tokio::select! {
                _ = session.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            let mut state = shared.lock().await;
            if state.generation != generation {
                return;
            }
            state.pending = None;
            state.window_start = None;
            if emit(&mut *state, snapshot, &session, kind).await == Offer::Emitted {
                trace!(kind, "emitted debounced snapshot");
            }
        }));

        Offer::Deferred
    }

    /// Abandons any pending emission and drops the output sender.
    pub(crate) async fn shutdown(&self) {
        // Unblocks a timer that is parked on a full channel while holding the lock.
        self.session.cancel();

        let mut state = self.state.lock().await;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        state.window_start = None;
        state.tx = None;
    }
}

async fn emit<T>(
    state: &mut GateState<T>,
    snapshot: T,
    session: &CancellationToken,
    kind: &'static str,
) -> Offer {
    let Some(tx) = state.tx.as_ref() else {
        return Offer::ConsumerGone;
    };

    tokio::select! {
        biased;
        _ = session.cancelled() => Offer::Cancelled,
        sent = tx.send(snapshot) => match sent {
            Ok(()) => {
                WATCH_EMISSIONS.with_label_values(&[kind]).inc();
                Offer::Emitted
            }
            Err(_) => Offer::ConsumerGone,
        },
    }
}
