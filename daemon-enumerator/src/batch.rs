//! Non-blocking batch requests.
//!
//! A batch request asks for up to `n` entries and completes exactly once, later,
//! through a [`BatchFuture`]. Four events can complete it:
//!
//! ```text
//!   threshold reached (push)  ──┐
//!   stream done (push)        ──┤      ┌── Ok(first n buffered entries)
//!   deadline elapsed (timer)  ──┼──> completion ──┤
//!   token cancelled (observer)──┘      └── Err(Cancelled), buffer untouched
//! ```
//!
//! The pending record lives inside the enumerator's buffer lock. The completion
//! routine takes it out under that lock and flips its `completed` flag first, so
//! whichever trigger arrives second finds nothing to complete. The reply is sent
//! after the lock is released; the consumer's continuation runs on its own task
//! when it polls the future, never on the triggering thread's stack.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EnumeratorError;
use crate::info::FileInfo;

/// Result carried by a batch completion.
pub(crate) type BatchResult = Result<Vec<FileInfo>, EnumeratorError>;

/// Event that asks the pending request to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// The request was just registered.
    Registered,
    /// Entries were appended.
    Appended,
    /// The daemon signalled the end of the listing.
    Done,
    /// The request's deadline elapsed.
    Deadline,
    /// The request's cancellation token fired.
    Cancelled,
    /// The enumerator was closed.
    Closed,
}

/// Outstanding batch request, guarded by the buffer lock.
pub(crate) struct PendingBatch {
    pub(crate) id: u64,
    pub(crate) requested: usize,
    completed: AtomicBool,
    reply: oneshot::Sender<BatchResult>,
    watchdog: Option<AbortHandle>,
}

impl PendingBatch {
    pub(crate) fn new(id: u64, requested: usize, reply: oneshot::Sender<BatchResult>) -> Self {
        Self {
            id,
            requested,
            completed: AtomicBool::new(false),
            reply,
            watchdog: None,
        }
    }

    /// Claim the right to complete this request. Only the first caller wins.
    pub(crate) fn begin_completion(&self) -> bool {
        !self.completed.swap(true, Ordering::AcqRel)
    }

    /// The consumer dropped its future.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    pub(crate) fn set_watchdog(&mut self, watchdog: AbortHandle) {
        self.watchdog = Some(watchdog);
    }

    /// Build the completion for this request.
    pub(crate) fn finish(self, trigger: Trigger, outcome: Outcome) -> Completion {
        Completion {
            id: self.id,
            requested: self.requested,
            trigger,
            outcome,
            reply: self.reply,
            watchdog: self.watchdog,
        }
    }
}

/// How a request ended.
pub(crate) enum Outcome {
    /// Entries split off the front of the buffer (possibly none).
    Delivered(Vec<FileInfo>),
    /// Cancelled; nothing was taken from the buffer.
    Cancelled,
}

/// A completed request waiting to be handed to its consumer.
///
/// Produced under the buffer lock, dispatched after it is released.
#[must_use]
pub(crate) struct Completion {
    id: u64,
    requested: usize,
    trigger: Trigger,
    outcome: Outcome,
    reply: oneshot::Sender<BatchResult>,
    watchdog: Option<AbortHandle>,
}

impl Completion {
    /// Disarm the watchdog, augment delivered entries and hand the result over.
    ///
    /// Aborting the watchdog never waits for it, so this is safe to call from the
    /// watchdog task itself.
    pub(crate) fn dispatch(self, augment: impl Fn(&mut FileInfo)) {
        if let Some(watchdog) = &self.watchdog {
            watchdog.abort();
        }

        let result = match self.outcome {
            Outcome::Delivered(mut entries) => {
                tracing::debug!(
                    request = self.id,
                    requested = self.requested,
                    delivered = entries.len(),
                    trigger = ?self.trigger,
                    "batch request completed"
                );
                entries.iter_mut().for_each(augment);
                Ok(entries)
            }
            Outcome::Cancelled => {
                tracing::debug!(request = self.id, trigger = ?self.trigger, "batch request cancelled");
                Err(EnumeratorError::Cancelled)
            }
        };

        if self.reply.send(result).is_err() {
            tracing::debug!(request = self.id, "batch future dropped before completion");
        }
    }
}

/// Wait for the first of the deadline or the token's cancellation.
pub(crate) async fn wait_for_trigger(
    deadline: Duration,
    cancel: Option<CancellationToken>,
) -> Trigger {
    tokio::select! {
        _ = tokio::time::sleep(deadline) => Trigger::Deadline,
        _ = cancelled(cancel.as_ref()) => Trigger::Cancelled,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Future returned by [`Enumerator::next_batch`](crate::Enumerator::next_batch).
///
/// Resolves to between zero and `n` entries, or to
/// [`EnumeratorError::Cancelled`] if the request's token fired first or the
/// enumerator was closed while the request was outstanding.
///
/// Dropping the future abandons the request; entries not yet handed over stay
/// buffered for the next request.
#[must_use = "futures do nothing unless polled"]
pub struct BatchFuture {
    receiver: oneshot::Receiver<BatchResult>,
    request_id: u64,
}

impl BatchFuture {
    pub(crate) fn new(receiver: oneshot::Receiver<BatchResult>, request_id: u64) -> Self {
        Self {
            receiver,
            request_id,
        }
    }

    /// Id of the request, unique per enumerator.
    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

impl Future for BatchFuture {
    type Output = Result<Vec<FileInfo>, EnumeratorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The enumerator went away without completing us.
            Poll::Ready(Err(_)) => Poll::Ready(Err(EnumeratorError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
