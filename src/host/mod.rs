//! Host Module
//!
//! Everything a processing host needs around the per-partition supervisors:
//! the controller that acquires leases and runs supervisors, and a small HTTP
//! status surface.
//!
//! ## Submodules
//! - **`controller`**: Lease acquisition, supervisor spawning, lease hand-back.
//! - **`protocol`**: JSON DTOs and endpoint paths of the status API.
//! - **`handlers`**: axum handlers serving the status API.

pub mod controller;
pub mod handlers;
pub mod protocol;
