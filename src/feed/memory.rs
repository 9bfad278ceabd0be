//! In-Memory Change Feed
//!
//! A partitioned, append-only log kept in a `DashMap`. Continuation tokens are
//! the decimal LSN of the last item handed out, so resuming from a token
//! returns exactly the items that follow it.

use super::fetcher::ChangeFeedFetcher;
use super::types::*;
use crate::error::{ChangeFeedError, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct PartitionLog {
    items: Vec<ChangeItem>,
    next_lsn: u64,
    /// Set once the partition has been split or merged away.
    gone: bool,
    /// One-shot back-off hint returned by the next fetch.
    throttle: Option<Duration>,
}

pub struct InMemoryChangeFeed {
    partitions: Arc<DashMap<String, PartitionLog>>,
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(DashMap::new()),
        }
    }

    pub fn create_partition(&self, partition: &str) {
        self.partitions
            .entry(partition.to_string())
            .or_insert_with(|| PartitionLog {
                next_lsn: 1,
                ..PartitionLog::default()
            });
    }

    /// Appends a change to `partition` and returns its LSN.
    pub fn append(
        &self,
        partition: &str,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<u64> {
        let mut log = self
            .partitions
            .get_mut(partition)
            .ok_or_else(|| ChangeFeedError::lease_gone(partition))?;

        if log.gone {
            return Err(ChangeFeedError::lease_gone(partition));
        }

        let lsn = log.next_lsn;
        log.next_lsn += 1;
        log.items.push(ChangeItem {
            id: id.to_string(),
            lsn,
            payload,
        });

        tracing::trace!("Appended {} to partition {} at lsn {}", id, partition, lsn);
        Ok(lsn)
    }

    /// Marks `partition` as split; further reads and writes report `LeaseGone`.
    pub fn split(&self, partition: &str) {
        if let Some(mut log) = self.partitions.get_mut(partition) {
            log.gone = true;
            tracing::info!("Partition {} split", partition);
        }
    }

    /// Makes the next fetch of `partition` answer `Throttled`.
    pub fn throttle_next(&self, partition: &str, retry_after: Duration) {
        if let Some(mut log) = self.partitions.get_mut(partition) {
            log.throttle = Some(retry_after);
        }
    }

    pub fn partition_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .partitions
            .iter()
            .filter(|entry| !entry.value().gone)
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn item_count(&self, partition: &str) -> usize {
        self.partitions
            .get(partition)
            .map(|log| log.items.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_continuation(partition: &str, token: Option<&str>) -> Result<u64> {
    match token {
        None => Ok(0),
        Some(raw) => raw.parse::<u64>().map_err(|e| {
            ChangeFeedError::Other(anyhow::anyhow!(
                "invalid continuation token {:?} for partition {}: {}",
                raw,
                partition,
                e
            ))
        }),
    }
}

#[async_trait]
impl ChangeFeedFetcher for InMemoryChangeFeed {
    async fn fetch_next(
        &self,
        lease_token: &str,
        continuation_token: Option<&str>,
        max_items: usize,
    ) -> Result<ChangeBatch> {
        let after = parse_continuation(lease_token, continuation_token)?;

        let mut log = self
            .partitions
            .get_mut(lease_token)
            .ok_or_else(|| ChangeFeedError::lease_gone(lease_token))?;

        if log.gone {
            return Err(ChangeFeedError::lease_gone(lease_token));
        }

        if let Some(retry_after) = log.throttle.take() {
            return Err(ChangeFeedError::Throttled { retry_after });
        }

        // Items are stored in LSN order, so the first match starts the batch
        let items: Vec<ChangeItem> = log
            .items
            .iter()
            .skip_while(|item| item.lsn <= after)
            .take(max_items)
            .cloned()
            .collect();

        let continuation = match items.last() {
            Some(last) => Some(last.lsn.to_string()),
            None => continuation_token.map(str::to_string),
        };

        Ok(ChangeBatch::new(items, continuation))
    }
}
