use crate::error::Result;
use crate::feed::types::ChangeBatch;
use crate::lease::checkpointer::PartitionCheckpointer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Why a partition was relinquished. Handed to `observer.close`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// Default / unclassified failure.
    Unknown,
    /// The shared shutdown signal was honored.
    Shutdown,
    /// Another host took the lease, or it expired.
    LeaseLost,
    /// The partition was split or merged and no longer exists.
    LeaseGone,
    /// User observer code failed.
    ObserverError,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CloseReason::Unknown => "unknown",
            CloseReason::Shutdown => "shutdown",
            CloseReason::LeaseLost => "lease_lost",
            CloseReason::LeaseGone => "lease_gone",
            CloseReason::ObserverError => "observer_error",
        };
        write!(f, "{}", name)
    }
}

/// Context of one supervision run, shared by `open`, every `process_changes` and `close`.
#[derive(Clone)]
pub struct ChangeFeedObserverContext {
    lease_token: String,
    checkpointer: Arc<dyn PartitionCheckpointer>,
}

impl ChangeFeedObserverContext {
    pub fn new(lease_token: &str, checkpointer: Arc<dyn PartitionCheckpointer>) -> Self {
        Self {
            lease_token: lease_token.to_string(),
            checkpointer,
        }
    }

    /// The partition being processed.
    pub fn lease_token(&self) -> &str {
        &self.lease_token
    }

    /// Persists the position right after `batch`. No-op for a batch without a position.
    pub async fn checkpoint(&self, batch: &ChangeBatch) -> Result<()> {
        match batch.continuation_token.as_deref() {
            Some(token) => self.checkpoint_at(token).await,
            None => Ok(()),
        }
    }

    pub async fn checkpoint_at(&self, continuation_token: &str) -> Result<()> {
        self.checkpointer
            .checkpoint_partition(continuation_token)
            .await
    }
}

impl fmt::Debug for ChangeFeedObserverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeedObserverContext")
            .field("lease_token", &self.lease_token)
            .finish()
    }
}
