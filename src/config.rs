//! Processor Options
//!
//! Tunables shared by every partition a host processes. Durations are stored in
//! milliseconds so the options file stays plain JSON.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Identity written into the `owner` field of every lease this host acquires.
    pub host_name: String,
    /// How often a held lease is renewed.
    pub lease_renew_interval_ms: u64,
    /// How long a lease stays valid without renewal.
    pub lease_expiration_ms: u64,
    /// Wait between fetches when the partition has no new changes.
    pub feed_poll_delay_ms: u64,
    pub max_items_per_batch: usize,
    /// Tick of the supervisor's wait loop.
    pub supervisor_poll_interval_ms: u64,
    /// Persist the continuation after every delivered batch.
    /// When false, the observer checkpoints explicitly through its context.
    pub auto_checkpoint: bool,
    /// Position used when a lease carries no continuation yet.
    pub start_continuation: Option<String>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            host_name: uuid::Uuid::new_v4().to_string(),
            lease_renew_interval_ms: 17_000,
            lease_expiration_ms: 60_000,
            feed_poll_delay_ms: 5_000,
            max_items_per_batch: 100,
            supervisor_poll_interval_ms: 100,
            auto_checkpoint: true,
            start_continuation: None,
        }
    }
}

impl ProcessorOptions {
    /// Reads options from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading options file {}", path.display()))?;
        let options: ProcessorOptions = serde_json::from_str(&raw)
            .with_context(|| format!("parsing options file {}", path.display()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.host_name.is_empty(), "host_name must not be empty");
        anyhow::ensure!(
            self.lease_renew_interval_ms > 0,
            "lease_renew_interval_ms must be positive"
        );
        anyhow::ensure!(
            self.lease_renew_interval_ms < self.lease_expiration_ms,
            "lease_renew_interval_ms ({}) must be shorter than lease_expiration_ms ({})",
            self.lease_renew_interval_ms,
            self.lease_expiration_ms
        );
        anyhow::ensure!(
            self.max_items_per_batch > 0,
            "max_items_per_batch must be positive"
        );
        anyhow::ensure!(
            self.supervisor_poll_interval_ms > 0,
            "supervisor_poll_interval_ms must be positive"
        );
        Ok(())
    }

    pub fn lease_renew_interval(&self) -> Duration {
        Duration::from_millis(self.lease_renew_interval_ms)
    }

    pub fn lease_expiration(&self) -> Duration {
        Duration::from_millis(self.lease_expiration_ms)
    }

    pub fn feed_poll_delay(&self) -> Duration {
        Duration::from_millis(self.feed_poll_delay_ms)
    }

    pub fn supervisor_poll_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor_poll_interval_ms)
    }
}
