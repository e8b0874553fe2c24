//! Segment fetcher: one descriptor's payload to one local file, with retry.
//!
//! Every attempt streams into `<dest>.part` and renames on success, so the
//! destination path only ever holds a complete payload. Between attempts the
//! task moves through `RetryScheduled` and waits out the policy's backoff.

use std::path::PathBuf;
use std::sync::Arc;

use crate::control::CancelToken;
use crate::recording::RecordingDescriptor;
use crate::retry::{classify, RetryDecision, RetryPolicy, SegmentError};
use crate::storage::StagedFile;
use crate::task::DownloadTask;

/// Where segment payloads come from. Implemented by `CameraSession`; tests
/// substitute scripted sources.
pub trait SegmentSource: Send + Sync {
    /// Stream the payload for `descriptor` into `out`, returning bytes received.
    /// Implementations should stop early with `SegmentError::Cancelled` once
    /// `cancel` is set.
    fn fetch_into(
        &self,
        descriptor: &RecordingDescriptor,
        out: &mut StagedFile,
        cancel: &CancelToken,
    ) -> Result<u64, SegmentError>;
}

/// A segment that reached its final path.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    pub attempts: u32,
}

/// A segment that exhausted its attempts (or hit a non-retryable error).
#[derive(Debug, thiserror::Error)]
#[error("segment {descriptor} failed after {attempts} attempt(s): {last_cause}")]
pub struct DownloadError {
    pub descriptor: Arc<RecordingDescriptor>,
    pub attempts: u32,
    pub last_cause: SegmentError,
}

/// Downloads single segments through a `SegmentSource` under a retry policy.
pub struct SegmentFetcher<S> {
    source: Arc<S>,
    policy: RetryPolicy,
}

impl<S: SegmentSource> SegmentFetcher<S> {
    pub fn new(source: Arc<S>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `descriptor` to `dest` as a one-off task.
    pub fn fetch_to(
        &self,
        descriptor: Arc<RecordingDescriptor>,
        dest: PathBuf,
        cancel: &CancelToken,
    ) -> Result<FetchOutcome, DownloadError> {
        let mut task = DownloadTask::new(0, descriptor, dest);
        self.fetch(&mut task, cancel)
    }

    /// Drive `task` to a terminal state.
    pub fn fetch(
        &self,
        task: &mut DownloadTask,
        cancel: &CancelToken,
    ) -> Result<FetchOutcome, DownloadError> {
        loop {
            if cancel.is_cancelled() {
                task.fail();
                return Err(self.give_up(task, SegmentError::Cancelled));
            }
            task.begin_attempt();
            let err = match self.attempt(task, cancel) {
                Ok(bytes) => {
                    task.succeed();
                    tracing::debug!(
                        segment = %task.descriptor(),
                        attempt = task.attempt(),
                        bytes,
                        "segment downloaded"
                    );
                    return Ok(FetchOutcome {
                        path: task.local_path().to_path_buf(),
                        bytes,
                        attempts: task.attempt(),
                    });
                }
                Err(e) => e,
            };

            let kind = classify(&err);
            match self.policy.decide(task.attempt(), kind) {
                RetryDecision::NoRetry => {
                    task.fail();
                    return Err(self.give_up(task, err));
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        segment = %task.descriptor(),
                        attempt = task.attempt(),
                        ?kind,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "segment attempt failed, retrying"
                    );
                    task.schedule_retry();
                    if !cancel.sleep(delay) {
                        task.fail();
                        return Err(self.give_up(task, SegmentError::Cancelled));
                    }
                }
            }
        }
    }

    /// One attempt: stage, stream, verify non-empty, publish.
    fn attempt(&self, task: &DownloadTask, cancel: &CancelToken) -> Result<u64, SegmentError> {
        let mut staged = StagedFile::create(task.local_path()).map_err(SegmentError::Storage)?;
        let bytes = self.source.fetch_into(task.descriptor(), &mut staged, cancel)?;
        if bytes == 0 || staged.bytes_written() == 0 {
            return Err(SegmentError::Empty);
        }
        staged.finalize().map_err(SegmentError::Storage)?;
        Ok(bytes)
    }

    fn give_up(&self, task: &DownloadTask, last_cause: SegmentError) -> DownloadError {
        tracing::warn!(
            segment = %task.descriptor(),
            attempts = task.attempt(),
            error = %last_cause,
            "segment download failed"
        );
        DownloadError {
            descriptor: Arc::clone(task.descriptor()),
            attempts: task.attempt(),
            last_cause,
        }
    }
}

#[cfg(test)]
mod tests;
