use super::types::ChangeBatch;
use crate::error::Result;

use async_trait::async_trait;

/// Reads the next batch of changes of one partition.
///
/// Implementations report a lost or split partition as `LeaseLost` / `LeaseGone`
/// and ask for back-off with `Throttled`.
#[async_trait]
pub trait ChangeFeedFetcher: Send + Sync {
    async fn fetch_next(
        &self,
        lease_token: &str,
        continuation_token: Option<&str>,
        max_items: usize,
    ) -> Result<ChangeBatch>;
}
