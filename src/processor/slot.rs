use crate::error::ChangeFeedError;
use crate::observer::types::CloseReason;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Failure published by a partition task and polled by its supervisor.
///
/// Written at most once per run; the first failure wins. The flag is published
/// with release ordering so a polling supervisor never misses a recorded error.
#[derive(Debug, Default)]
pub struct ResultSlot {
    failed: AtomicBool,
    error: Mutex<Option<ChangeFeedError>>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `error` unless the slot already holds one. Cancellation is not a failure.
    pub fn record(&self, error: ChangeFeedError) -> bool {
        if error.is_cancelled() {
            return false;
        }

        let mut slot = self.error.lock();
        if self.failed.load(Ordering::Acquire) {
            tracing::debug!("Ignoring secondary failure: {}", error);
            return false;
        }

        *slot = Some(error);
        self.failed.store(true, Ordering::Release);
        true
    }

    pub fn is_set(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Classification of the stored failure, if any, without consuming it.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.error.lock().as_ref().map(|error| error.close_reason())
    }

    pub fn take(&self) -> Option<ChangeFeedError> {
        self.error.lock().take()
    }

    pub fn clear(&self) {
        let mut slot = self.error.lock();
        *slot = None;
        self.failed.store(false, Ordering::Release);
    }
}
