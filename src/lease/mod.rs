//! Lease Module
//!
//! A lease grants one host exclusive ownership of one partition of the change feed.
//!
//! ## Core Concepts
//! - **Ownership**: `owner` names the host; a lease with no owner or an expired
//!   `expires_at` can be acquired by anyone.
//! - **Versioning**: every successful store mutation bumps `version`, so a stale
//!   copy can never overwrite a newer one.
//! - **Checkpointing**: the lease also carries the partition's continuation token,
//!   the position from which processing resumes after a handover.
//!
//! ## Submodules
//! - **`types`**: The `Lease` record and time helpers.
//! - **`store`**: The `LeaseStore` contract and its in-memory implementation.
//! - **`checkpointer`**: Persists continuation tokens on behalf of a running partition.

pub mod checkpointer;
pub mod store;
pub mod types;
