//! Load indicator sampling (reads /proc/stat on Linux)

mod linux;

pub use linux::{parse_procs_running, ProcStatSampler, DEFAULT_LOAD_SOURCE};

use crate::error::SampleError;

/// Number of currently runnable processes at one instant.
pub type LoadSample = u64;

/// Point-in-time read of the load indicator. Each call is independent;
/// no sample is carried over to the next.
#[async_trait::async_trait]
pub trait LoadSampler: Send + Sync {
    async fn sample(&self) -> Result<LoadSample, SampleError>;
}
