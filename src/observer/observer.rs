use super::types::{ChangeFeedObserverContext, CloseReason};
use crate::feed::types::ChangeBatch;

use anyhow::Result;
use async_trait::async_trait;

/// User callback contract for one partition.
///
/// The supervisor calls `open` once, then `process_changes` for every non-empty
/// batch in feed order, then `close` exactly once, whatever ended the run.
#[async_trait]
pub trait ChangeFeedObserver: Send + Sync {
    async fn open(&self, _context: &ChangeFeedObserverContext) -> Result<()> {
        Ok(())
    }

    async fn process_changes(
        &self,
        context: &ChangeFeedObserverContext,
        batch: &ChangeBatch,
    ) -> Result<()>;

    /// Best effort; a failure here is logged and never changes the run's outcome.
    async fn close(&self, _context: &ChangeFeedObserverContext, _reason: CloseReason) -> Result<()> {
        Ok(())
    }
}
