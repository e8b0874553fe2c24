//! Progress reporting for a download run (segments done, bytes, rate).
//!
//! The coordinator sends a snapshot after every finished segment; consumers
//! can compute rate = bytes_done / elapsed_secs.

/// Snapshot of download progress for one run (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Segments that reached their final path.
    pub completed: usize,
    /// Segments that exhausted their attempts.
    pub failed: usize,
    /// Total number of segments scheduled.
    pub total: usize,
    /// Bytes written by completed segments.
    pub bytes_done: u64,
    /// Elapsed time since the first dispatch (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Segments with a terminal outcome.
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Download rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Fraction of segments finished, in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.finished() as f64 / self.total as f64).min(1.0)
    }
}
