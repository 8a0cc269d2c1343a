//! rotor fleet-recycling watchdog library.
//!
//! The watchdog recycles preemptible-style compute instances during an
//! administrator-defined maintenance window, never exceeding a global
//! budget of concurrently in-flight lifecycle operations. All durable
//! state lives in instance labels on the provider side; every pass
//! re-derives its decisions from them.
//!
//! ## Modules
//!
//! - `compute`: provider types, the `ComputeApi` trait, and a mock
//! - `client`: reqwest implementation of `ComputeApi`
//! - `scanner`: paginated fleet scan and status classification
//! - `reconciler`: the pass driver and periodic loop

pub mod client;
pub mod compute;
pub mod config;
pub mod reconciler;
pub mod scanner;

// Re-export commonly used types
pub use compute::{ComputeApi, Instance, InstanceStatus, MockCompute};
pub use config::Config;
pub use reconciler::Watchdog;
