//! Partition Processor
//!
//! Drives the fetch → deliver loop of one partition.
//!
//! ## Responsibilities
//! - **Fetching**: reading the next batch after the current continuation token.
//! - **Delivery**: handing non-empty batches to the observer, strictly in feed order.
//! - **Checkpointing**: persisting the continuation after each batch when automatic.
//! - **Back-off**: honoring throttling hints, idling on an empty partition.

use super::slot::ResultSlot;
use super::sleep_or_cancelled;
use crate::cancellation::CancellationToken;
use crate::config::ProcessorOptions;
use crate::error::{ChangeFeedError, ObserverOperation};
use crate::feed::fetcher::ChangeFeedFetcher;
use crate::lease::checkpointer::SharedLease;
use crate::observer::observer::ChangeFeedObserver;
use crate::observer::types::ChangeFeedObserverContext;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Delivers a partition's changes until cancelled or failed.
///
/// `run` never returns an error: a failure is recorded in `result()` and the
/// loop ends. A cooperative cancellation leaves `result()` empty.
#[async_trait]
pub trait PartitionProcessor: Send + Sync {
    async fn run(&self, context: ChangeFeedObserverContext, cancellation: CancellationToken);

    fn result(&self) -> &ResultSlot;
}

/// Processor reading from a [`ChangeFeedFetcher`].
pub struct FeedPartitionProcessor {
    lease: SharedLease,
    fetcher: Arc<dyn ChangeFeedFetcher>,
    observer: Arc<dyn ChangeFeedObserver>,
    feed_poll_delay: Duration,
    max_items_per_batch: usize,
    auto_checkpoint: bool,
    start_continuation: Option<String>,
    result: ResultSlot,
}

impl FeedPartitionProcessor {
    pub fn new(
        lease: SharedLease,
        fetcher: Arc<dyn ChangeFeedFetcher>,
        observer: Arc<dyn ChangeFeedObserver>,
        options: &ProcessorOptions,
    ) -> Self {
        Self {
            lease,
            fetcher,
            observer,
            feed_poll_delay: options.feed_poll_delay(),
            max_items_per_batch: options.max_items_per_batch,
            auto_checkpoint: options.auto_checkpoint,
            start_continuation: options.start_continuation.clone(),
            result: ResultSlot::new(),
        }
    }

    fn fail(&self, lease_token: &str, error: ChangeFeedError) {
        tracing::warn!("Partition {} processing stopped: {}", lease_token, error);
        self.result.record(error);
    }
}

#[async_trait]
impl PartitionProcessor for FeedPartitionProcessor {
    async fn run(&self, context: ChangeFeedObserverContext, cancellation: CancellationToken) {
        let lease_token = context.lease_token().to_string();

        // Resume from the lease checkpoint, else the configured start position
        let mut continuation = self
            .lease
            .snapshot()
            .continuation_token
            .or_else(|| self.start_continuation.clone());

        tracing::info!(
            "Partition {} processing from {:?}",
            lease_token,
            continuation
        );

        while !cancellation.is_cancelled() {
            let fetched = self
                .fetcher
                .fetch_next(&lease_token, continuation.as_deref(), self.max_items_per_batch)
                .await;

            let batch = match fetched {
                Ok(batch) => batch,
                Err(ChangeFeedError::Throttled { retry_after }) => {
                    // Simple jitter so throttled partitions do not retry in lockstep
                    let jitter = Duration::from_millis(rand::random::<u64>() % 50);
                    tracing::debug!(
                        "Partition {} throttled, retrying after {:?}",
                        lease_token,
                        retry_after + jitter
                    );
                    if !sleep_or_cancelled(&cancellation, retry_after + jitter).await {
                        break;
                    }
                    continue;
                }
                Err(ChangeFeedError::Cancelled) => break,
                Err(e) => {
                    self.fail(&lease_token, e);
                    return;
                }
            };

            if batch.is_empty() {
                if batch.continuation_token.is_some() {
                    continuation = batch.continuation_token;
                }
                if !sleep_or_cancelled(&cancellation, self.feed_poll_delay).await {
                    break;
                }
                continue;
            }

            tracing::trace!(
                "Partition {} delivering {} changes",
                lease_token,
                batch.len()
            );

            if let Err(e) = self.observer.process_changes(&context, &batch).await {
                self.fail(
                    &lease_token,
                    ChangeFeedError::from_observer(ObserverOperation::ProcessChanges, &lease_token, e),
                );
                return;
            }

            if batch.continuation_token.is_some() {
                continuation = batch.continuation_token.clone();
            }

            if self.auto_checkpoint {
                if let Err(e) = context.checkpoint(&batch).await {
                    self.fail(&lease_token, e);
                    return;
                }
            }
        }

        tracing::debug!("Partition {} processing cancelled", lease_token);
    }

    fn result(&self) -> &ResultSlot {
        &self.result
    }
}
