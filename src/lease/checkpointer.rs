//! Partition Checkpointing
//!
//! The renewer and the checkpointer both write through the store and both get a
//! fresher lease back. They share one snapshot, which only ever moves forward in
//! `version`, so neither can roll the other's update back.

use super::store::LeaseStore;
use super::types::Lease;
use crate::error::Result;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Latest known copy of the lease held by a running partition.
#[derive(Debug, Clone)]
pub struct SharedLease {
    inner: Arc<RwLock<Lease>>,
}

impl SharedLease {
    pub fn new(lease: Lease) -> Self {
        Self {
            inner: Arc::new(RwLock::new(lease)),
        }
    }

    pub fn snapshot(&self) -> Lease {
        self.inner.read().clone()
    }

    pub fn lease_token(&self) -> String {
        self.inner.read().lease_token.clone()
    }

    /// Replaces the snapshot if `lease` is newer. Returns whether it was applied.
    pub fn refresh(&self, lease: Lease) -> bool {
        let mut current = self.inner.write();
        if lease.version > current.version {
            *current = lease;
            true
        } else {
            false
        }
    }
}

/// Persists the position a partition has been processed up to.
#[async_trait]
pub trait PartitionCheckpointer: Send + Sync {
    async fn checkpoint_partition(&self, continuation_token: &str) -> Result<()>;
}

/// Checkpointer writing the continuation token into the partition's lease.
pub struct LeaseCheckpointer {
    store: Arc<dyn LeaseStore>,
    lease: SharedLease,
}

impl LeaseCheckpointer {
    pub fn new(store: Arc<dyn LeaseStore>, lease: SharedLease) -> Self {
        Self { store, lease }
    }
}

#[async_trait]
impl PartitionCheckpointer for LeaseCheckpointer {
    async fn checkpoint_partition(&self, continuation_token: &str) -> Result<()> {
        let current = self.lease.snapshot();
        let updated = self.store.checkpoint(&current, continuation_token).await?;
        self.lease.refresh(updated);
        Ok(())
    }
}
