use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::{CorrelationId, Result, RpcError};

/// Receiving half of a pending call's completion slot.
pub type Completion<T> = oneshot::Receiver<Result<T>>;

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a map of correlation id to oneshot sender with no
/// invariants spanning entries. The worst outcome of recovering a poisoned
/// lock is a dropped or unmatched response.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Tracks calls waiting for responses.
///
/// Maps correlation IDs to oneshot senders. Each entry is the sole record of
/// an outstanding call and leaves the map exactly once: through `resolve`,
/// `remove`, or `fail_all`, whichever reaches it first. The lock is held only
/// for a map operation, never across an await.
pub struct PendingCallRegistry<T> {
    // ---
    calls: Mutex<HashMap<CorrelationId, oneshot::Sender<Result<T>>>>,
}

impl<T> PendingCallRegistry<T> {
    // ---

    /// Create an empty registry.
    pub fn new() -> Self {
        // ---
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new pending call.
    ///
    /// Returns the receiver notified when the call is resolved or failed.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::DuplicateCorrelation`] if `id` is already pending.
    pub fn register(&self, id: CorrelationId) -> Result<Completion<T>> {
        // ---
        let mut calls = lock_ignore_poison(&self.calls);

        match calls.entry(id) {
            Entry::Occupied(_) => Err(RpcError::DuplicateCorrelation(id)),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Complete a pending call with its response and remove it.
    ///
    /// Returns false for an unknown, already resolved, or already removed id;
    /// the response is then dropped.
    pub fn resolve(&self, id: &CorrelationId, response: T) -> bool {
        // ---
        let tx = lock_ignore_poison(&self.calls).remove(id);

        match tx {
            Some(tx) => {
                // The receiver may already be gone if the caller's future was
                // dropped; the entry is still consumed.
                let _ = tx.send(Ok(response));
                true
            }
            None => false,
        }
    }

    /// Remove a pending call without delivering a response.
    ///
    /// Used for timeout, cancellation and publish-failure cleanup.
    pub fn remove(&self, id: &CorrelationId) -> bool {
        // ---
        lock_ignore_poison(&self.calls).remove(id).is_some()
    }

    /// Fail every pending call with the error built by `make_err`.
    ///
    /// Returns how many calls were failed. The registry is empty afterwards.
    pub fn fail_all<F>(&self, make_err: F) -> usize
    where
        F: Fn() -> RpcError,
    {
        // ---
        let drained: Vec<_> = lock_ignore_poison(&self.calls).drain().collect();
        let count = drained.len();

        for (_, tx) in drained {
            let _ = tx.send(Err(make_err()));
        }
        count
    }

    /// Whether `id` is currently pending.
    pub fn contains(&self, id: &CorrelationId) -> bool {
        lock_ignore_poison(&self.calls).contains_key(id)
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        // ---
        lock_ignore_poison(&self.calls).len()
    }

    /// Whether no calls are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PendingCallRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
