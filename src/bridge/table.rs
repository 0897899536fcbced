//! Correlation table: request id → pending completion.
//!
//! Registration, completion and cancellation are atomic with respect to the
//! map. The lock is released before a completion is delivered.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

/// One-shot sink of a pending call.
pub type Completion = oneshot::Sender<Result<String>>;

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, Completion>;

// ============================================================================
// CorrelationTable
// ============================================================================

/// Concurrency-safe map of outstanding calls.
///
/// Each id maps to at most one completion; an entry is removed exactly once,
/// by [`complete`](Self::complete), [`remove`](Self::remove) or
/// [`cancel_all`](Self::cancel_all).
#[derive(Debug)]
pub struct CorrelationTable {
    pending: Mutex<CorrelationMap>,
    max_pending: usize,
}

impl CorrelationTable {
    /// Creates an empty table that holds at most `max_pending` entries.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(CorrelationMap::default()),
            max_pending,
        }
    }

    /// Inserts a pending entry.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateRequestId`] if `id` is already outstanding
    /// - [`Error::TooManyPending`] if the table is full
    pub fn register(&self, id: RequestId, sink: Completion) -> Result<()> {
        let mut pending = self.pending.lock();

        if pending.contains_key(&id) {
            return Err(Error::duplicate_request_id(id));
        }
        if pending.len() >= self.max_pending {
            return Err(Error::TooManyPending {
                limit: self.max_pending,
            });
        }

        pending.insert(id, sink);
        Ok(())
    }

    /// Delivers `value` to the entry for `id` and removes it.
    ///
    /// Returns `false` (and does nothing) if no entry exists.
    pub fn complete(&self, id: &RequestId, value: String) -> bool {
        let sink = self.pending.lock().remove(id);

        match sink {
            Some(sink) => {
                // Receiver gone means the caller stopped waiting.
                let _ = sink.send(Ok(value));
                true
            }
            None => false,
        }
    }

    /// Removes the entry for `id` without completing it.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, id: &RequestId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Fails every outstanding entry with [`Error::ConnectionLost`].
    ///
    /// Returns how many calls were failed.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (_, sink) in drained {
            let _ = sink.send(Err(Error::connection_lost(reason)));
        }

        if count > 0 {
            debug!(count, reason, "Failed pending requests");
        }

        count
    }

    /// Returns `true` if `id` is outstanding.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.pending.lock().contains_key(id)
    }

    /// Returns the number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Returns the capacity limit.
    #[inline]
    #[must_use]
    pub const fn max_pending(&self) -> usize {
        self.max_pending
    }
}

// ============================================================================
// Tests
// ============================================================================
