use serde::{Deserialize, Serialize};

/// Ownership record over one partition of the change feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lease {
    /// Identifier of the partition (key range) this lease governs.
    pub lease_token: String,
    /// Position to resume from; `None` means "start of the partition".
    pub continuation_token: Option<String>,
    /// Host currently holding the lease.
    pub owner: Option<String>,
    /// Optimistic concurrency marker, bumped by the store on every update.
    pub version: u64,
    /// Timestamp (ms) after which the lease is considered abandoned.
    pub expires_at: Option<u64>,
    /// Timestamp (ms) of the last mutation.
    pub timestamp: u64,
}

impl Lease {
    pub fn new(lease_token: &str) -> Self {
        Self {
            lease_token: lease_token.to_string(),
            continuation_token: None,
            owner: None,
            version: 0,
            expires_at: None,
            timestamp: now_ms(),
        }
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner)
    }

    /// A lease is available when nobody holds it or the holder let it expire.
    pub fn is_available_at(&self, now: u64) -> bool {
        self.owner.is_none() || self.is_expired_at(now)
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
