//! Status API Definitions
//!
//! Data Transfer Objects returned by the host's HTTP status endpoints.

use crate::lease::types::Lease;
use crate::observer::types::CloseReason;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_LEASES: &str = "/leases";
pub const ENDPOINT_PARTITIONS: &str = "/partitions";

#[derive(Debug, Serialize, Deserialize)]
pub struct LeasesResponse {
    pub leases: Vec<Lease>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartitionOutcome {
    pub lease_token: String,
    pub reason: CloseReason,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PartitionsResponse {
    pub host: String,
    pub running: Vec<String>,
    pub stopped: Vec<PartitionOutcome>,
}
