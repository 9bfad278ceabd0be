//! Lease Store
//!
//! Defines the contract the processor needs from lease persistence and ships an
//! in-memory implementation used by the host binary and the tests.
//!
//! ## Rejections
//! Every mutating call checks ownership first:
//! - **Record missing** → `LeaseGone` (the partition was split or merged away).
//! - **Owned by someone else** → `LeaseLost`.

use super::types::*;
use crate::error::{ChangeFeedError, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Persistence contract for partition leases.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Returns the existing lease for `lease_token`, creating an unowned one if absent.
    async fn create_lease_if_not_exists(
        &self,
        lease_token: &str,
        continuation_token: Option<String>,
    ) -> Result<Lease>;

    /// Takes ownership of an available lease (or refreshes one we already hold).
    async fn acquire(&self, lease: &Lease, owner: &str) -> Result<Lease>;

    /// Extends the expiration of a lease we hold.
    async fn renew(&self, lease: &Lease) -> Result<Lease>;

    /// Stores a new continuation token on a lease we hold.
    async fn checkpoint(&self, lease: &Lease, continuation_token: &str) -> Result<Lease>;

    /// Gives the lease back so another host can acquire it.
    async fn release(&self, lease: &Lease) -> Result<()>;

    /// Removes the lease record entirely.
    async fn delete(&self, lease: &Lease) -> Result<()>;

    async fn list_leases(&self) -> Result<Vec<Lease>>;
}

/// DashMap-backed lease store, keyed by `lease_token`.
pub struct InMemoryLeaseStore {
    leases: Arc<DashMap<String, Lease>>,
    lease_expiration: Duration,
}

impl InMemoryLeaseStore {
    pub fn new(lease_expiration: Duration) -> Self {
        Self {
            leases: Arc::new(DashMap::new()),
            lease_expiration,
        }
    }

    /// Local lookup of a single lease.
    pub fn get(&self, lease_token: &str) -> Option<Lease> {
        self.leases.get(lease_token).map(|entry| entry.clone())
    }

    /// Overwrites a record unconditionally (administrative import).
    pub fn upsert(&self, lease: Lease) {
        self.leases.insert(lease.lease_token.clone(), lease);
    }

    pub fn lease_count(&self) -> usize {
        self.leases.len()
    }

    fn expiry_from(&self, now: u64) -> u64 {
        now + self.lease_expiration.as_millis() as u64
    }

    /// Applies `update` to the stored record after verifying `lease.owner` still holds it.
    fn update_owned<F>(&self, lease: &Lease, update: F) -> Result<Lease>
    where
        F: FnOnce(&mut Lease, u64),
    {
        let mut entry = self
            .leases
            .get_mut(&lease.lease_token)
            .ok_or_else(|| ChangeFeedError::lease_gone(&lease.lease_token))?;

        let owner = match lease.owner.as_deref() {
            Some(owner) => owner,
            None => return Err(ChangeFeedError::lease_lost(&lease.lease_token)),
        };

        if !entry.is_owned_by(owner) {
            tracing::debug!(
                "Lease {} is owned by {:?}, not {}",
                lease.lease_token,
                entry.owner,
                owner
            );
            return Err(ChangeFeedError::lease_lost(&lease.lease_token));
        }

        let now = now_ms();
        update(&mut entry, now);
        entry.version += 1;
        entry.timestamp = now;

        Ok(entry.clone())
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn create_lease_if_not_exists(
        &self,
        lease_token: &str,
        continuation_token: Option<String>,
    ) -> Result<Lease> {
        let entry = self
            .leases
            .entry(lease_token.to_string())
            .or_insert_with(|| {
                tracing::info!("Created lease for partition {}", lease_token);
                let mut lease = Lease::new(lease_token);
                lease.continuation_token = continuation_token;
                lease
            });

        Ok(entry.clone())
    }

    async fn acquire(&self, lease: &Lease, owner: &str) -> Result<Lease> {
        let mut entry = self
            .leases
            .get_mut(&lease.lease_token)
            .ok_or_else(|| ChangeFeedError::lease_gone(&lease.lease_token))?;

        let now = now_ms();

        // Another host raced us and still holds a live lease
        if !entry.is_available_at(now) && !entry.is_owned_by(owner) {
            return Err(ChangeFeedError::lease_lost(&lease.lease_token));
        }

        entry.owner = Some(owner.to_string());
        entry.expires_at = Some(self.expiry_from(now));
        entry.version += 1;
        entry.timestamp = now;

        tracing::debug!(
            "Lease {} acquired by {} (version {})",
            lease.lease_token,
            owner,
            entry.version
        );

        Ok(entry.clone())
    }

    async fn renew(&self, lease: &Lease) -> Result<Lease> {
        let expiration = self.lease_expiration.as_millis() as u64;
        let renewed = self.update_owned(lease, |entry, now| {
            entry.expires_at = Some(now + expiration);
        })?;

        tracing::trace!(
            "Renewed lease {} (version {})",
            renewed.lease_token,
            renewed.version
        );
        Ok(renewed)
    }

    async fn checkpoint(&self, lease: &Lease, continuation_token: &str) -> Result<Lease> {
        let updated = self.update_owned(lease, |entry, _| {
            entry.continuation_token = Some(continuation_token.to_string());
        })?;

        tracing::debug!(
            "Checkpointed lease {} at {}",
            updated.lease_token,
            continuation_token
        );
        Ok(updated)
    }

    async fn release(&self, lease: &Lease) -> Result<()> {
        self.update_owned(lease, |entry, _| {
            entry.owner = None;
            entry.expires_at = None;
        })?;

        tracing::info!("Released lease {}", lease.lease_token);
        Ok(())
    }

    async fn delete(&self, lease: &Lease) -> Result<()> {
        if self.leases.remove(&lease.lease_token).is_some() {
            tracing::info!("Deleted lease {}", lease.lease_token);
        }
        Ok(())
    }

    async fn list_leases(&self) -> Result<Vec<Lease>> {
        let mut leases: Vec<Lease> = self
            .leases
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        leases.sort_by(|a, b| a.lease_token.cmp(&b.lease_token));
        Ok(leases)
    }
}
