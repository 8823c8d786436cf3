//! Cooperative cancellation checked between frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{StabError, StabResult};

/// A cloneable flag that long-running passes poll between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(StabError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> StabResult<()> {
        if self.is_cancelled() {
            Err(StabError::Cancelled)
        } else {
            Ok(())
        }
    }
}
