//! Lease Renewer
//!
//! Keeps a held lease alive while its partition is being processed. Renewal
//! happens on a fixed cadence (first tick at half the interval); a definitive
//! rejection ends the loop immediately, since only the store can tell whether
//! ownership is still ours.

use super::slot::ResultSlot;
use super::sleep_or_cancelled;
use crate::cancellation::CancellationToken;
use crate::error::ChangeFeedError;
use crate::lease::checkpointer::SharedLease;
use crate::lease::store::LeaseStore;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Renews one partition's lease until cancelled or rejected.
///
/// Same contract as the processor: failures land in `result()`, cancellation does not.
#[async_trait]
pub trait LeaseRenewer: Send + Sync {
    async fn run(&self, cancellation: CancellationToken);

    fn result(&self) -> &ResultSlot;
}

pub struct PeriodicLeaseRenewer {
    store: Arc<dyn LeaseStore>,
    lease: SharedLease,
    renew_interval: Duration,
    result: ResultSlot,
}

impl PeriodicLeaseRenewer {
    pub fn new(store: Arc<dyn LeaseStore>, lease: SharedLease, renew_interval: Duration) -> Self {
        Self {
            store,
            lease,
            renew_interval,
            result: ResultSlot::new(),
        }
    }

    async fn renew(&self) -> Result<(), ChangeFeedError> {
        let current = self.lease.snapshot();
        let renewed = self.store.renew(&current).await?;

        tracing::trace!(
            "Renewed lease {} (version {})",
            renewed.lease_token,
            renewed.version
        );
        self.lease.refresh(renewed);
        Ok(())
    }
}

#[async_trait]
impl LeaseRenewer for PeriodicLeaseRenewer {
    async fn run(&self, cancellation: CancellationToken) {
        let lease_token = self.lease.lease_token();
        tracing::debug!(
            "Lease renewer started for {} (every {:?})",
            lease_token,
            self.renew_interval
        );

        let mut delay = self.renew_interval / 2;

        loop {
            if !sleep_or_cancelled(&cancellation, delay).await {
                break;
            }
            delay = self.renew_interval;

            match self.renew().await {
                Ok(()) => {}
                Err(e @ (ChangeFeedError::LeaseLost { .. } | ChangeFeedError::LeaseGone { .. })) => {
                    tracing::info!("Lease renewal for {} rejected: {}", lease_token, e);
                    self.result.record(e);
                    return;
                }
                Err(ChangeFeedError::Cancelled) => break,
                Err(e) => {
                    // Transient: the next scheduled tick tries again
                    tracing::warn!("Failed to renew lease {}: {}", lease_token, e);
                }
            }
        }

        tracing::debug!("Lease renewer for {} cancelled", lease_token);
    }

    fn result(&self) -> &ResultSlot {
        &self.result
    }
}
