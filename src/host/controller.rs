//! Partition Controller
//!
//! Host-side manager of every partition this process owns. For each lease it
//! acquires, it spawns a supervisor run and, once that run ends, hands the lease
//! back to the store.
//!
//! ## Responsibilities
//! - **Acquisition**: claiming available leases for this host.
//! - **Supervision**: one spawned `PartitionSupervisor::run` per owned partition,
//!   each under a child of the controller's shutdown token.
//! - **Hand-back**: releasing the lease after the run, or deleting it when the
//!   partition is gone.

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::{ChangeFeedError, Result};
use crate::lease::store::LeaseStore;
use crate::lease::types::{Lease, now_ms};
use crate::observer::types::CloseReason;
use crate::processor::factory::PartitionSupervisorFactory;

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct PartitionController {
    store: Arc<dyn LeaseStore>,
    factory: Arc<PartitionSupervisorFactory>,
    host_name: String,
    /// Parent of every supervisor's shutdown token.
    shutdown: CancellationToken,
    /// Lease tokens being acquired or supervised here; claimed before any await.
    claimed: Arc<DashSet<String>>,
    /// Lease token -> running supervisor task.
    running: Arc<DashMap<String, JoinHandle<()>>>,
    /// Lease token -> how its last run ended.
    outcomes: Arc<DashMap<String, CloseReason>>,
}

impl PartitionController {
    pub fn new(store: Arc<dyn LeaseStore>, factory: Arc<PartitionSupervisorFactory>) -> Arc<Self> {
        let host_name = factory.options().host_name.clone();
        Arc::new(Self {
            store,
            factory,
            host_name,
            shutdown: CancellationToken::new(),
            claimed: Arc::new(DashSet::new()),
            running: Arc::new(DashMap::new()),
            outcomes: Arc::new(DashMap::new()),
        })
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Acquires `lease` for this host and starts supervising it.
    ///
    /// A partition that is already claimed here, running or still being
    /// acquired, is left untouched.
    pub async fn add_lease(&self, lease: Lease) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(ChangeFeedError::Cancelled);
        }

        if !self.claimed.insert(lease.lease_token.clone()) {
            tracing::trace!("Partition {} already claimed", lease.lease_token);
            return Ok(());
        }

        let acquired = match self.store.acquire(&lease, &self.host_name).await {
            Ok(acquired) => acquired,
            Err(e) => {
                self.claimed.remove(&lease.lease_token);
                return Err(e);
            }
        };

        let lease_token = acquired.lease_token.clone();
        let supervisor = self.factory.create(acquired);

        let store = self.store.clone();
        let claimed = self.claimed.clone();
        let running = self.running.clone();
        let outcomes = self.outcomes.clone();
        let source = CancellationSource::linked_to(&self.shutdown);

        // The task must not deregister itself before it has been registered
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let task_token = lease_token.clone();
        let handle = tokio::spawn(async move {
            let _ = registered_rx.await;

            let result = supervisor.run(&source.token()).await;
            let final_lease = supervisor.lease_snapshot();

            let reason = match &result {
                Ok(()) => CloseReason::Shutdown,
                Err(error) => error.close_reason(),
            };

            match reason {
                CloseReason::LeaseGone => {
                    if let Err(e) = store.delete(&final_lease).await {
                        tracing::warn!("Failed to delete gone lease {}: {}", task_token, e);
                    }
                }
                _ => match store.release(&final_lease).await {
                    Ok(()) => {}
                    Err(ChangeFeedError::LeaseLost { .. }) | Err(ChangeFeedError::LeaseGone { .. }) => {
                        tracing::debug!("Lease {} no longer ours, nothing to release", task_token);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to release lease {}: {}", task_token, e);
                    }
                },
            }

            running.remove(&task_token);
            claimed.remove(&task_token);
            outcomes.insert(task_token, reason);
        });

        self.running.insert(lease_token.clone(), handle);
        let _ = registered_tx.send(());

        tracing::info!("Host {} started partition {}", self.host_name, lease_token);
        Ok(())
    }

    /// Acquires every lease that is free or expired. Returns how many were started.
    pub async fn acquire_available_leases(&self) -> Result<usize> {
        let now = now_ms();
        let mut started = 0;

        for lease in self.store.list_leases().await? {
            if self.claimed.contains(&lease.lease_token) || !lease.is_available_at(now) {
                continue;
            }

            match self.add_lease(lease).await {
                Ok(()) => started += 1,
                Err(ChangeFeedError::LeaseLost { lease_token }) => {
                    tracing::debug!("Lease {} taken by another host", lease_token);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(started)
    }

    /// Lease tokens currently supervised by this host.
    pub fn running_partitions(&self) -> Vec<String> {
        let mut partitions: Vec<String> = self
            .running
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        partitions.sort();
        partitions
    }

    pub fn last_outcome(&self, lease_token: &str) -> Option<CloseReason> {
        self.outcomes.get(lease_token).map(|entry| *entry)
    }

    pub fn outcomes(&self) -> Vec<(String, CloseReason)> {
        let mut outcomes: Vec<(String, CloseReason)> = self
            .outcomes
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    /// Signals every supervisor to stop and waits until all leases are handed back.
    pub async fn shutdown(&self) {
        tracing::info!(
            "Host {} shutting down {} partitions",
            self.host_name,
            self.running.len()
        );
        self.shutdown.cancel();

        let tokens: Vec<String> = self
            .running
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for token in tokens {
            if let Some((_, handle)) = self.running.remove(&token) {
                if let Err(e) = handle.await {
                    tracing::error!("Supervisor task for {} failed: {}", token, e);
                }
            }
        }

        tracing::info!("Host {} stopped", self.host_name);
    }
}
