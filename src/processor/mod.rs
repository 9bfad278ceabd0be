//! Partition Processing Module
//!
//! Runs one acquired partition: a processor delivers changes to the observer while
//! a renewer keeps the lease alive, both under the eye of a supervisor.
//!
//! ## Architecture Overview
//! 1. **Open**: The supervisor opens the observer for the partition.
//! 2. **Run**: Processor and renewer are spawned as two tokio tasks, each with its own
//!    cancellation source. Either one records a failure in its `ResultSlot` and stops.
//! 3. **Watch**: The supervisor polls both slots and the fleet-wide shutdown token.
//! 4. **Unwind**: Both sources are cancelled, both tasks awaited, the first failure
//!    (processor first) is classified and the observer closed exactly once.
//!
//! ## Submodules
//! - **`slot`**: Write-once failure slot shared between a task and the supervisor.
//! - **`partition_processor`**: Fetch → deliver → checkpoint loop.
//! - **`lease_renewer`**: Fixed-interval lease renewal loop.
//! - **`supervisor`**: Orchestration and failure classification.
//! - **`factory`**: Wires a supervisor for a freshly acquired lease.

pub mod factory;
pub mod lease_renewer;
pub mod partition_processor;
pub mod slot;
pub mod supervisor;


use crate::cancellation::CancellationToken;

use std::time::Duration;

/// Sleeps for `delay` unless cancelled first. Returns `false` when cancelled.
pub(crate) async fn sleep_or_cancelled(cancellation: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancellation.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
