//! Partition Supervisor
//!
//! Owns the lifecycle of one acquired partition from `open` to `close`.
//!
//! ## Guarantees
//! - The observer is closed exactly once per run, including when `open` failed.
//! - The close reason reflects the first real failure: processor before renewer,
//!   `Shutdown` when only the shutdown token ended the run.
//! - Both inner tasks have been cancelled and have finished before `run` returns,
//!   so nothing keeps acting on the lease afterwards.

use super::lease_renewer::LeaseRenewer;
use super::partition_processor::PartitionProcessor;
use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::{ChangeFeedError, ObserverOperation, Result};
use crate::lease::checkpointer::{PartitionCheckpointer, SharedLease};
use crate::lease::types::Lease;
use crate::observer::observer::ChangeFeedObserver;
use crate::observer::types::{ChangeFeedObserverContext, CloseReason};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

/// Observer lifecycle as driven by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    NotOpened,
    Opened,
    Closed,
}

pub struct PartitionSupervisor {
    lease: SharedLease,
    observer: Arc<dyn ChangeFeedObserver>,
    processor: Arc<dyn PartitionProcessor>,
    renewer: Arc<dyn LeaseRenewer>,
    checkpointer: Arc<dyn PartitionCheckpointer>,
    poll_interval: Duration,
    state: Mutex<ObserverState>,
}

impl PartitionSupervisor {
    pub fn new(
        lease: SharedLease,
        observer: Arc<dyn ChangeFeedObserver>,
        processor: Arc<dyn PartitionProcessor>,
        renewer: Arc<dyn LeaseRenewer>,
        checkpointer: Arc<dyn PartitionCheckpointer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            lease,
            observer,
            processor,
            renewer,
            checkpointer,
            poll_interval,
            state: Mutex::new(ObserverState::NotOpened),
        }
    }

    pub fn lease_token(&self) -> String {
        self.lease.lease_token()
    }

    /// Latest lease copy, including renewals and checkpoints made during the run.
    pub fn lease_snapshot(&self) -> Lease {
        self.lease.snapshot()
    }

    pub fn observer_state(&self) -> ObserverState {
        *self.state.lock()
    }

    /// Runs the partition until shutdown or the first failure.
    ///
    /// Returns `Ok(())` only when the shared shutdown token ended the run.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let lease_token = self.lease_token();

        self.processor.result().clear();
        self.renewer.result().clear();
        *self.state.lock() = ObserverState::NotOpened;

        let context = ChangeFeedObserverContext::new(&lease_token, self.checkpointer.clone());

        let cause = match self.observer.open(&context).await {
            Ok(()) => {
                *self.state.lock() = ObserverState::Opened;
                tracing::info!("Partition {} opened", lease_token);
                self.supervise(&context, shutdown).await
            }
            Err(e) => {
                tracing::warn!("Observer open failed for partition {}: {:#}", lease_token, e);
                Some(ChangeFeedError::from_observer(ObserverOperation::Open, &lease_token, e))
            }
        };

        let reason = match &cause {
            Some(error) => error.close_reason(),
            None => CloseReason::Shutdown,
        };

        self.close_observer(&context, reason).await;

        match cause {
            Some(error) => {
                tracing::info!("Partition {} stopped ({}): {}", lease_token, reason, error);
                Err(error)
            }
            None => {
                tracing::info!("Partition {} stopped ({})", lease_token, reason);
                Ok(())
            }
        }
    }

    /// Runs processor and renewer concurrently and returns the triggering failure, if any.
    async fn supervise(
        &self,
        context: &ChangeFeedObserverContext,
        shutdown: &CancellationToken,
    ) -> Option<ChangeFeedError> {
        let lease_token = context.lease_token().to_string();

        let processor_source = CancellationSource::new();
        let renewer_source = CancellationSource::new();

        let processor_task: JoinHandle<()> = {
            let processor = self.processor.clone();
            let context = context.clone();
            let token = processor_source.token();
            tokio::spawn(async move {
                processor.run(context, token).await;
            })
        };

        let renewer_task: JoinHandle<()> = {
            let renewer = self.renewer.clone();
            let token = renewer_source.token();
            tokio::spawn(async move {
                renewer.run(token).await;
            })
        };

        while !shutdown.is_cancelled()
            && !self.processor.result().is_set()
            && !self.renewer.result().is_set()
        {
            // A task that ended on its own without reporting is treated as a failure
            if processor_task.is_finished() || renewer_task.is_finished() {
                break;
            }

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        let processor_ended_early = processor_task.is_finished();
        let renewer_ended_early = renewer_task.is_finished();

        processor_source.cancel();
        renewer_source.cancel();

        tracing::debug!("Partition {} waiting for processor and renewer", lease_token);
        let processor_exit = processor_task.await;
        let renewer_exit = renewer_task.await;

        let processor_cause = self
            .processor
            .result()
            .take()
            .filter(|error| !error.is_cancelled())
            .or_else(|| unexpected_exit("processor", &lease_token, processor_exit, processor_ended_early));

        let renewer_cause = self
            .renewer
            .result()
            .take()
            .filter(|error| !error.is_cancelled())
            .or_else(|| unexpected_exit("renewer", &lease_token, renewer_exit, renewer_ended_early));

        if let (Some(first), Some(second)) = (&processor_cause, &renewer_cause) {
            tracing::debug!(
                "Partition {}: processor failure ({}) takes precedence over renewer failure ({})",
                lease_token,
                first,
                second
            );
        }

        processor_cause.or(renewer_cause)
    }

    async fn close_observer(&self, context: &ChangeFeedObserverContext, reason: CloseReason) {
        {
            let mut state = self.state.lock();
            if *state == ObserverState::Closed {
                return;
            }
            *state = ObserverState::Closed;
        }

        match self.observer.close(context, reason).await {
            Ok(()) => {
                tracing::debug!(
                    "Observer closed for partition {} ({})",
                    context.lease_token(),
                    reason
                );
            }
            Err(e) => {
                // Best effort: the run already carries its own outcome
                tracing::warn!(
                    "Observer close failed for partition {} ({}): {:#}",
                    context.lease_token(),
                    reason,
                    e
                );
            }
        }
    }
}

/// Turns a task that stopped without recording a failure into one, when it should not have stopped.
fn unexpected_exit(
    task: &str,
    lease_token: &str,
    exit: std::result::Result<(), JoinError>,
    ended_early: bool,
) -> Option<ChangeFeedError> {
    match exit {
        Err(join_error) if join_error.is_panic() => {
            tracing::error!("{} for partition {} panicked", task, lease_token);
            Some(ChangeFeedError::Other(anyhow::anyhow!(
                "{} for partition {} panicked",
                task,
                lease_token
            )))
        }
        Err(join_error) => Some(ChangeFeedError::Other(anyhow::anyhow!(
            "{} for partition {} aborted: {}",
            task,
            lease_token,
            join_error
        ))),
        Ok(()) if ended_early => Some(ChangeFeedError::Other(anyhow::anyhow!(
            "{} for partition {} stopped unexpectedly",
            task,
            lease_token
        ))),
        Ok(()) => None,
    }
}
