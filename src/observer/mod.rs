//! Observer Module
//!
//! The observer is the plug-in point for user code: it receives every batch of
//! changes of one partition, in order, between a single `open` and a single `close`.
//!
//! ## Submodules
//! - **`types`**: The per-run context handed to every callback and the close reasons.
//! - **`observer`**: The `ChangeFeedObserver` contract.
//! - **`wrapping`**: Decorator turning any user failure (error or panic) into an `ObserverException`.
//! - **`factory`**: Creates one observer per acquired partition; closure-based observers.

pub mod factory;
pub mod observer;
pub mod types;
pub mod wrapping;
