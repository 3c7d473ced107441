//! Cooperative turn cancellation.
//!
//! Each running turn holds a `CancelToken`; the loop checks it at every
//! suspension point (between rounds, between stream events, before each
//! tool dispatch) and unwinds with `Error::Cancelled` when it flips.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation flag shared between a running turn and whoever may
/// supersede it.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same underlying token. Used to
    /// keep a finished turn from clearing a newer turn's registry entry.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
