//! Per-segment download task and its retry state machine.
//!
//! ```text
//! Pending → InFlight → Succeeded
//!              │  ↑
//!              ↓  │
//!        RetryScheduled
//!              │
//!              ↓
//!            Failed
//! ```
//! `InFlight` may also go straight to `Failed` when the policy refuses a retry.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::recording::RecordingDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    RetryScheduled,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (Pending, Failed)
                | (InFlight, Succeeded)
                | (InFlight, RetryScheduled)
                | (InFlight, Failed)
                | (RetryScheduled, InFlight)
                | (RetryScheduled, Failed)
        )
    }
}

/// A descriptor bound to its staging path, attempt counter and state.
/// Owned by the coordinator; the descriptor itself is shared read-only.
#[derive(Debug)]
pub struct DownloadTask {
    index: usize,
    descriptor: Arc<RecordingDescriptor>,
    local_path: PathBuf,
    attempt: u32,
    state: TaskState,
}

impl DownloadTask {
    pub fn new(index: usize, descriptor: Arc<RecordingDescriptor>, local_path: PathBuf) -> Self {
        Self {
            index,
            descriptor,
            local_path,
            attempt: 0,
            state: TaskState::Pending,
        }
    }

    /// Position of the descriptor in the chronologically sorted search result.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn descriptor(&self) -> &Arc<RecordingDescriptor> {
        &self.descriptor
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Attempts started so far (1-based once the first attempt begins).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Enter `InFlight`, counting a new attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.advance(TaskState::InFlight);
        self.attempt += 1;
    }

    pub(crate) fn schedule_retry(&mut self) {
        self.advance(TaskState::RetryScheduled);
    }

    pub(crate) fn succeed(&mut self) {
        self.advance(TaskState::Succeeded);
    }

    pub(crate) fn fail(&mut self) {
        self.advance(TaskState::Failed);
    }

    fn advance(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal task transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }
}
