//! Per-run download report and aggregate outcome.

use std::path::PathBuf;
use std::sync::Arc;

use crate::fetcher::DownloadError;
use crate::recording::RecordingDescriptor;

/// A segment that reached its staging path.
#[derive(Debug, Clone)]
pub struct SegmentSuccess {
    /// Position in the chronologically sorted search result (tie-breaker for merge order).
    pub index: usize,
    pub descriptor: Arc<RecordingDescriptor>,
    pub path: PathBuf,
    pub bytes: u64,
    pub attempts: u32,
}

/// Aggregate outcome. The coordinator reports it; the caller decides what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    AllSucceeded,
    PartialSuccess { succeeded: usize, failed: usize },
    NoneSucceeded,
}

/// Everything the coordinator learned during one run.
///
/// `succeeded` and `failed` are in completion order, which carries no meaning.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub total: usize,
    pub succeeded: Vec<SegmentSuccess>,
    pub failed: Vec<DownloadError>,
    /// Segments never dispatched (cancellation) or lost to a worker panic.
    pub not_run: usize,
    pub cancelled: bool,
}

impl DownloadReport {
    pub(super) fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn outcome(&self) -> DownloadOutcome {
        let succeeded = self.succeeded.len();
        let failed = self.total - succeeded;
        if succeeded == 0 {
            DownloadOutcome::NoneSucceeded
        } else if failed == 0 {
            DownloadOutcome::AllSucceeded
        } else {
            DownloadOutcome::PartialSuccess { succeeded, failed }
        }
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.succeeded.iter().map(|s| s.bytes).sum()
    }
}
