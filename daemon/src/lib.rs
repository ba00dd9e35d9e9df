//! loadgate: suspends a background compute workload while the host is busy.
//!
//! The daemon polls the runnable-process count, feeds it through a
//! two-threshold hysteresis decision, and issues start/stop commands to
//! the workload manager only when the decision changes state.

pub mod config;
pub mod error;
pub mod executor;
pub mod hysteresis;
pub mod monitor;
pub mod sampler;
