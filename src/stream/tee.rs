//! Fan-out of one token stream into live delivery and a completion aggregate.
//!
//! A single producer task pulls the source exactly once and pushes every
//! chunk into two unbounded queues: one feeds the returned [`TeeStream`],
//! the other feeds an aggregator task that concatenates the chunks. The
//! aggregator runs the completion callback only after the source ended
//! normally.
//!
//! When the [`TeeStream`] is dropped early the producer keeps draining the
//! source so the aggregate still completes; chunks for the detached consumer
//! are discarded.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::task::TaskTracker;

/// Lifecycle of a tee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeeState {
    #[default]
    Idle,
    Streaming,
    /// Source finished and the completion callback has returned.
    Completed,
    /// Source failed or the producer stopped before the end.
    Failed,
}

impl TeeState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

enum Aggregate {
    Chunk(String),
    Finished,
    Failed,
}

/// Move to `next` unless the tee already settled.
fn transition(state: &watch::Sender<TeeState>, next: TeeState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() || *current == next {
            return false;
        }
        tracing::trace!(from = ?*current, to = ?next, "Tee transition");
        *current = next;
        true
    })
}

/// Delivery side of a tee: yields the source's items in order.
pub struct TeeStream<E> {
    delivery: UnboundedReceiverStream<Result<String, E>>,
    state: watch::Receiver<TeeState>,
}

impl<E> TeeStream<E> {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TeeState {
        *self.state.borrow()
    }

    /// Watch handle that outlives the stream itself.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<TeeState> {
        self.state.clone()
    }

    /// Wait until the tee reaches [`TeeState::Completed`] or [`TeeState::Failed`].
    pub async fn settled(&self) -> TeeState {
        settled(self.state_watch()).await
    }
}

/// Wait on a state watch until the tee settles.
pub async fn settled(mut state: watch::Receiver<TeeState>) -> TeeState {
    let waited = state.wait_for(|s| s.is_terminal()).await.map(|s| *s);
    match waited {
        Ok(s) => s,
        // Both tasks are gone; whatever they left behind is final.
        Err(_) => *state.borrow(),
    }
}

impl<E> Unpin for TeeStream<E> {}

impl<E> Stream for TeeStream<E> {
    type Item = Result<String, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.delivery.poll_next_unpin(cx)
    }
}

impl<E> fmt::Debug for TeeStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeeStream")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Split `source` into a delivered stream and a completion callback.
///
/// `on_complete` receives the concatenation of every chunk and runs at most
/// once, only when `source` ends without an error. A source error is
/// forwarded to the returned stream and suppresses `on_complete`.
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
pub fn tee<S, E, F, Fut>(source: S, on_complete: F) -> TeeStream<E>
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tee_tracked(&TaskTracker::new(), source, on_complete)
}

/// Like [`tee`], with the producer and aggregator spawned on `tasks`.
///
/// Waiting on a closed `tasks` lets a host hold shutdown until detached
/// replies have been drained and recorded.
///
/// # Panics
///
/// Must be called from within a Tokio runtime.
pub fn tee_tracked<S, E, F, Fut>(tasks: &TaskTracker, source: S, on_complete: F) -> TeeStream<E>
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
    let (aggregate_tx, aggregate_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(TeeState::Idle);
    let state_tx = Arc::new(state_tx);

    tasks.spawn(produce(source, delivery_tx, aggregate_tx, Arc::clone(&state_tx)));
    tasks.spawn(aggregate(aggregate_rx, on_complete, state_tx));

    TeeStream {
        delivery: UnboundedReceiverStream::new(delivery_rx),
        state: state_rx,
    }
}

async fn produce<S, E>(
    source: S,
    delivery: mpsc::UnboundedSender<Result<String, E>>,
    aggregate: mpsc::UnboundedSender<Aggregate>,
    state: Arc<watch::Sender<TeeState>>,
) where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let mut source = Box::pin(source);
    let mut detached = false;
    transition(&state, TeeState::Streaming);

    while let Some(item) = source.next().await {
        match item {
            Ok(chunk) => {
                let _ = aggregate.send(Aggregate::Chunk(chunk.clone()));
                if !detached && delivery.send(Ok(chunk)).is_err() {
                    detached = true;
                    tracing::debug!("Delivery consumer detached, draining source for history");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation stream failed");
                transition(&state, TeeState::Failed);
                let _ = aggregate.send(Aggregate::Failed);
                let _ = delivery.send(Err(e));
                return;
            }
        }
    }

    let _ = aggregate.send(Aggregate::Finished);
}

async fn aggregate<F, Fut>(
    mut events: mpsc::UnboundedReceiver<Aggregate>,
    on_complete: F,
    state: Arc<watch::Sender<TeeState>>,
) where
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut full_text = String::new();

    while let Some(event) = events.recv().await {
        match event {
            Aggregate::Chunk(chunk) => full_text.push_str(&chunk),
            Aggregate::Finished => {
                tracing::debug!(chars = full_text.chars().count(), "Generation stream completed");
                on_complete(full_text).await;
                transition(&state, TeeState::Completed);
                return;
            }
            Aggregate::Failed => {
                transition(&state, TeeState::Failed);
                return;
            }
        }
    }

    // Producer vanished without a terminal event (panic or runtime shutdown).
    tracing::warn!("Generation stream ended without completion, discarding partial text");
    transition(&state, TeeState::Failed);
}
