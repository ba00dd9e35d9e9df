use super::{LoadSample, LoadSampler};
use crate::error::SampleError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_LOAD_SOURCE: &str = "/proc/stat";
const PROCS_RUNNING: &str = "procs_running";

/// Reads the `procs_running` counter from a /proc/stat formatted file.
///
/// The read runs on the blocking pool and cannot be cancelled. If a caller
/// gives up on a read that hangs, later calls fail fast until that read
/// finishes, so at most one pool thread is ever parked on the source.
#[derive(Debug, Clone)]
pub struct ProcStatSampler {
    path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

impl ProcStatSampler {
    pub fn new() -> Self {
        Self::with_path(DEFAULT_LOAD_SOURCE)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while a read of the load source has not returned.
    pub fn read_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Default for ProcStatSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LoadSampler for ProcStatSampler {
    async fn sample(&self) -> Result<LoadSample, SampleError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(SampleError::Unavailable(format!(
                "previous read of {} has not finished",
                self.path.display()
            )));
        }

        let path = self.path.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let read = tokio::task::spawn_blocking(move || {
            let result = std::fs::read_to_string(&path);
            in_flight.store(false, Ordering::Release);
            result
        });

        let content = read
            .await
            .map_err(|e| SampleError::Unavailable(format!("load read task failed: {}", e)))?
            .map_err(|e| {
                SampleError::Unavailable(format!("failed to read {}: {}", self.path.display(), e))
            })?;
        parse_procs_running(&content)
    }
}

/// Find the `procs_running <n>` line and parse its value.
pub fn parse_procs_running(content: &str) -> Result<LoadSample, SampleError> {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(PROCS_RUNNING) {
            continue;
        }
        let value = fields.next().ok_or_else(|| {
            SampleError::Unavailable(format!("{} line has no value", PROCS_RUNNING))
        })?;
        return value.parse().map_err(|e| {
            SampleError::Unavailable(format!(
                "malformed {} value {:?}: {}",
                PROCS_RUNNING, value, e
            ))
        });
    }
    Err(SampleError::Unavailable(format!("no {} line found", PROCS_RUNNING)))
}
