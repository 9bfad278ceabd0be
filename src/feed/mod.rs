//! Change Feed Module
//!
//! The processor reads each partition through the [`fetcher::ChangeFeedFetcher`]
//! contract; how batches travel over the wire is the fetcher's business.
//!
//! ## Core Concepts
//! - **Partition log**: an append-only, ordered sequence of changed items per partition.
//! - **Continuation token**: opaque position after the last item a batch delivered.
//! - **Split**: once a partition is split or merged away, fetching it reports `LeaseGone`.
//!
//! ## Submodules
//! - **`types`**: Items and batches.
//! - **`fetcher`**: The fetch contract.
//! - **`memory`**: A DashMap-backed partitioned log used by the host binary and tests.

pub mod fetcher;
pub mod memory;
pub mod types;
