//! Change Feed Processor Library
//!
//! Reads a partitioned change feed and delivers every partition's changes, in
//! order, to a user-supplied observer. Each partition is owned through a lease;
//! the host binary (`main.rs`) wires the pieces together.
//!
//! ## Architecture Modules
//! - **`cancellation`**: Cancellation tokens and owning sources.
//! - **`config`**: Processor options loaded from JSON.
//! - **`error`**: The `ChangeFeedError` taxonomy and observer failure wrapping.
//! - **`feed`**: Change items, batches, the fetcher contract and an in-memory feed.
//! - **`lease`**: Lease records, the lease store and continuation checkpointing.
//! - **`observer`**: The observer plugin point, its factory and the failure-wrapping decorator.
//! - **`processor`**: Per-partition processor, lease renewer and their supervisor.
//! - **`host`**: Lease acquisition across partitions and the HTTP status surface.

pub mod cancellation;
pub mod config;
pub mod error;
pub mod feed;
pub mod host;
pub mod lease;
pub mod observer;
pub mod processor;

#[cfg(test)]
pub(crate) mod testing;
