//! Per-thread concurrency registry.
//!
//! One conversation thread admits one running turn at a time. The
//! registry owns both halves of that discipline: the exclusive section
//! (a lazily created `Semaphore(1)` per thread id, held for the duration
//! of a turn) and the cancel token of the turn currently inside it.
//! Entries persist for process lifetime; thread cardinality is bounded
//! by active conversations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::cancel::CancelToken;

pub struct ThreadRegistry {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
    running: Mutex<HashMap<String, CancelToken>>,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive section for a thread. Waits for any current
    /// holder to drain; the permit auto-releases on drop.
    pub async fn acquire(&self, thread_id: &str) -> Result<OwnedSemaphorePermit, ThreadClosed> {
        let sem = {
            let mut locks = self.locks.lock();
            locks
                .entry(thread_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned().await.map_err(|_| ThreadClosed)
    }

    /// Register a fresh cancel token as the thread's running turn.
    pub fn begin_turn(&self, thread_id: &str) -> CancelToken {
        let token = CancelToken::new();
        self.running.lock().insert(thread_id.to_owned(), token.clone());
        token
    }

    /// Request cancellation of the thread's running turn, if any.
    /// Returns whether one was found.
    pub fn cancel_running(&self, thread_id: &str) -> bool {
        match self.running.lock().get(thread_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear the running entry — only while `token` is still the
    /// authoritative one. A superseding turn may already have replaced
    /// it, and a stale turn must not clobber the replacement.
    pub fn finish_turn(&self, thread_id: &str, token: &CancelToken) {
        let mut running = self.running.lock();
        if let Some(current) = running.get(thread_id) {
            if current.same_as(token) {
                running.remove(thread_id);
            }
        }
    }

    /// Whether a turn is registered as running for a thread.
    pub fn is_running(&self, thread_id: &str) -> bool {
        self.running.lock().contains_key(thread_id)
    }

    /// Number of tracked threads (for monitoring).
    pub fn thread_count(&self) -> usize {
        self.locks.lock().len()
    }
}

/// The thread's exclusive section is no longer usable (never happens in
/// practice; the registry keeps its semaphores open for process life).
#[derive(Debug)]
pub struct ThreadClosed;

impl std::fmt::Display for ThreadClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "thread registry entry is closed")
    }
}

impl std::error::Error for ThreadClosed {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
