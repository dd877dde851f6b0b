//! ResultBuffer: ordered queue of pushed entries plus the terminal `done` flag.
//!
//! One lock guards the entries, `done`, `closed` and the pending batch request,
//! so no reader ever sees `done` set while a batch is half appended. The lock is
//! held for bookkeeping only: blocking pulls release it while waiting on the
//! buffer's own condition variable, and batch completions are handed back to the
//! caller to dispatch after the lock is gone.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::task::AbortHandle;

use crate::batch::{Completion, Outcome, PendingBatch, Trigger};
use crate::error::EnumeratorError;
use crate::info::FileInfo;

/// Result of a blocking pop.
#[derive(Debug)]
pub(crate) enum Pop {
    Entry(FileInfo),
    End,
    TimedOut,
}

/// What registering a batch request led to.
pub(crate) enum Registration {
    /// The request could be satisfied right away.
    Completed(Completion),
    /// The request waits for more pushes, its deadline or its token.
    Waiting,
}

#[derive(Default)]
struct BufferState {
    entries: VecDeque<FileInfo>,
    done: bool,
    closed: bool,
    pending: Option<PendingBatch>,
}

impl BufferState {
    /// Decide whether `trigger` completes the pending request, and if so take it.
    fn evaluate(&mut self, trigger: Trigger) -> Option<Completion> {
        let pending = self.pending.as_ref()?;

        let cancel = match trigger {
            _ if pending.is_abandoned() => true,
            Trigger::Registered | Trigger::Appended => {
                if !self.done && self.entries.len() < pending.requested {
                    return None;
                }
                false
            }
            Trigger::Done | Trigger::Deadline => false,
            Trigger::Cancelled | Trigger::Closed => true,
        };

        let pending = self.pending.take()?;
        if !pending.begin_completion() {
            tracing::trace!(request = pending.id, ?trigger, "request already completed");
            return None;
        }

        let outcome = if cancel {
            Outcome::Cancelled
        } else {
            let count = pending.requested.min(self.entries.len());
            Outcome::Delivered(self.entries.drain(..count).collect())
        };
        Some(pending.finish(trigger, outcome))
    }
}

/// Thread-safe, FIFO result buffer owned by one enumerator.
pub(crate) struct ResultBuffer {
    state: Mutex<BufferState>,
    /// Private wait primitive for blocking pulls.
    ready: Condvar,
}

impl ResultBuffer {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            ready: Condvar::new(),
        }
    }

    /// Append a decoded batch in order.
    ///
    /// Batches arriving after `done` or after close are ignored.
    pub(crate) fn append(&self, batch: Vec<FileInfo>) -> Option<Completion> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.closed {
            tracing::trace!(count = batch.len(), "append after close ignored");
            return None;
        }
        if state.done {
            tracing::warn!(count = batch.len(), "info received after done, ignoring");
            return None;
        }

        state.entries.extend(batch);
        tracing::trace!(buffered = state.entries.len(), "entries appended");
        self.ready.notify_all();
        state.evaluate(Trigger::Appended)
    }

    /// Mark the listing complete. Idempotent.
    pub(crate) fn mark_done(&self) -> Option<Completion> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.done {
            return None;
        }
        state.done = true;
        self.ready.notify_all();
        state.evaluate(Trigger::Done)
    }

    /// Remove and return the oldest entry.
    pub(crate) fn pop_front(&self) -> Option<FileInfo> {
        self.state.lock().entries.pop_front()
    }

    /// Pop the oldest entry, blocking the caller until one is pushed, the listing
    /// ends, or `timeout` elapses.
    pub(crate) fn wait_pop(&self, timeout: Duration) -> Pop {
        // None means the timeout is too large to represent; wait without bound.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        while state.entries.is_empty() && !state.done && !state.closed {
            let timed_out = match deadline {
                Some(deadline) => self.ready.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.ready.wait(&mut state);
                    false
                }
            };
            if timed_out {
                break;
            }
        }

        match state.entries.pop_front() {
            Some(entry) => Pop::Entry(entry),
            None if state.done || state.closed => Pop::End,
            None => Pop::TimedOut,
        }
    }

    /// Number of buffered entries.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether `done` has been received.
    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Install a batch request, completing it at once if it is already
    /// satisfiable.
    ///
    /// # Errors
    ///
    /// [`EnumeratorError::BatchPending`] if a live request is outstanding,
    /// [`EnumeratorError::Closed`] after close.
    pub(crate) fn register_batch(
        &self,
        batch: PendingBatch,
    ) -> Result<Registration, EnumeratorError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.closed {
            return Err(EnumeratorError::Closed);
        }

        match state.pending.as_ref().map(PendingBatch::is_abandoned) {
            Some(false) => return Err(EnumeratorError::BatchPending),
            Some(true) => {
                // The previous consumer dropped its future; retire the request
                // without touching the buffer.
                if let Some(stale) = state.evaluate(Trigger::Cancelled) {
                    stale.dispatch(|_| {});
                }
            }
            None => {}
        }

        state.pending = Some(batch);
        Ok(match state.evaluate(Trigger::Registered) {
            Some(completion) => Registration::Completed(completion),
            None => Registration::Waiting,
        })
    }

    /// Attach the watchdog of request `id`. If the request already completed the
    /// watchdog is aborted instead.
    pub(crate) fn arm(&self, id: u64, watchdog: AbortHandle) {
        let mut state = self.state.lock();
        match state.pending.as_mut() {
            Some(pending) if pending.id == id => pending.set_watchdog(watchdog),
            _ => watchdog.abort(),
        }
    }

    /// Complete request `id` because of its deadline or cancellation.
    ///
    /// Stale triggers for requests that already completed are ignored.
    pub(crate) fn complete(&self, id: u64, trigger: Trigger) -> Option<Completion> {
        let mut state = self.state.lock();
        if state.pending.as_ref().map(|p| p.id) != Some(id) {
            tracing::trace!(request = id, ?trigger, "stale trigger ignored");
            return None;
        }
        state.evaluate(trigger)
    }

    /// Close the buffer: discard entries, wake blocked pulls and cancel the
    /// pending request. Returns the number of discarded entries.
    pub(crate) fn close(&self) -> (usize, Option<Completion>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.closed = true;
        let discarded = state.entries.len();
        state.entries.clear();
        self.ready.notify_all();
        (discarded, state.evaluate(Trigger::Closed))
    }
}
