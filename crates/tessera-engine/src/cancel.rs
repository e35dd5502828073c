//! Cooperative cancellation of updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared flag that aborts a running update at the next stage boundary.
///
/// Clones share the flag, so one clone can be handed to another thread
/// while the pipeline keeps its own. The engine never clears the flag;
/// call [`reset`](Self::reset) before the next update.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear a previous cancellation.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
