use super::lease_renewer::PeriodicLeaseRenewer;
use super::partition_processor::FeedPartitionProcessor;
use super::supervisor::PartitionSupervisor;
use crate::config::ProcessorOptions;
use crate::feed::fetcher::ChangeFeedFetcher;
use crate::lease::checkpointer::{LeaseCheckpointer, SharedLease};
use crate::lease::store::LeaseStore;
use crate::lease::types::Lease;
use crate::observer::factory::ChangeFeedObserverFactory;
use crate::observer::observer::ChangeFeedObserver;
use crate::observer::wrapping::ObserverExceptionWrappingDecorator;

use std::sync::Arc;

/// Builds the supervisor, processor, renewer and decorated observer for one lease.
pub struct PartitionSupervisorFactory {
    store: Arc<dyn LeaseStore>,
    fetcher: Arc<dyn ChangeFeedFetcher>,
    observer_factory: Arc<dyn ChangeFeedObserverFactory>,
    options: ProcessorOptions,
}

impl PartitionSupervisorFactory {
    pub fn new(
        store: Arc<dyn LeaseStore>,
        fetcher: Arc<dyn ChangeFeedFetcher>,
        observer_factory: Arc<dyn ChangeFeedObserverFactory>,
        options: ProcessorOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            observer_factory,
            options,
        }
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// `lease` must already be acquired by this host.
    pub fn create(&self, lease: Lease) -> PartitionSupervisor {
        let shared = SharedLease::new(lease);

        let observer: Arc<dyn ChangeFeedObserver> = Arc::new(
            ObserverExceptionWrappingDecorator::new(self.observer_factory.create_observer()),
        );

        let checkpointer = Arc::new(LeaseCheckpointer::new(self.store.clone(), shared.clone()));

        let processor = Arc::new(FeedPartitionProcessor::new(
            shared.clone(),
            self.fetcher.clone(),
            observer.clone(),
            &self.options,
        ));

        let renewer = Arc::new(PeriodicLeaseRenewer::new(
            self.store.clone(),
            shared.clone(),
            self.options.lease_renew_interval(),
        ));

        PartitionSupervisor::new(
            shared,
            observer,
            processor,
            renewer,
            checkpointer,
            self.options.supervisor_poll_interval(),
        )
    }
}
