//! Download coordinator: bounded worker pool over the segment fetcher.
//!
//! Tasks sit in a shared queue; `N` worker threads each pop one, run the
//! fetcher (including its retry loop) to a terminal state, send the result
//! over a channel and pop the next. The collector on the calling thread is
//! the only owner of the report. A failed segment does not stop the others.

mod progress;
mod report;

pub use progress::ProgressStats;
pub use report::{DownloadOutcome, DownloadReport, SegmentSuccess};

use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::control::CancelToken;
use crate::fetcher::{DownloadError, FetchOutcome, SegmentFetcher, SegmentSource};
use crate::recording::RecordingDescriptor;
use crate::task::DownloadTask;

/// Schedules segment fetches with at most `max_concurrent` in flight.
pub struct DownloadCoordinator<S> {
    fetcher: Arc<SegmentFetcher<S>>,
    max_concurrent: usize,
}

impl<S: SegmentSource + 'static> DownloadCoordinator<S> {
    /// `max_concurrent` is clamped to at least 1.
    pub fn new(fetcher: SegmentFetcher<S>, max_concurrent: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Download every descriptor into `staging_dir`. Descriptors are expected in
    /// chronological order; their position becomes the task index.
    ///
    /// If `progress_tx` is `Some`, a [`ProgressStats`] is sent after each
    /// finished segment (dropped when the channel is full).
    pub fn run<I>(
        &self,
        descriptors: I,
        staging_dir: &Path,
        cancel: &CancelToken,
        progress_tx: Option<&tokio::sync::mpsc::Sender<ProgressStats>>,
    ) -> DownloadReport
    where
        I: IntoIterator<Item = RecordingDescriptor>,
    {
        let queue: VecDeque<DownloadTask> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, d)| {
                let path = staging_dir.join(d.staging_file_name(index));
                DownloadTask::new(index, Arc::new(d), path)
            })
            .collect();
        let count = queue.len();
        let mut report = DownloadReport::new(count);
        if count == 0 {
            return report;
        }

        let work = Arc::new(Mutex::new(queue));
        let (tx, rx) = mpsc::channel::<(DownloadTask, Result<FetchOutcome, DownloadError>)>();
        let num_workers = self.max_concurrent.min(count);
        tracing::info!(segments = count, workers = num_workers, "starting downloads");

        let mut handles = Vec::with_capacity(num_workers);
        for worker in 0..num_workers {
            let work = Arc::clone(&work);
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let cancel = cancel.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("recfetch-worker-{}", worker))
                .spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = work
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(mut task) = next else {
                        break;
                    };
                    let res = fetcher.fetch(&mut task, &cancel);
                    if tx.send((task, res)).is_err() {
                        break;
                    }
                });
            match spawned {
                Ok(h) => handles.push(h),
                Err(e) => tracing::warn!(worker, error = %e, "could not spawn download worker"),
            }
        }
        drop(tx);

        let started = Instant::now();
        for (task, res) in rx {
            match res {
                Ok(out) => report.succeeded.push(SegmentSuccess {
                    index: task.index(),
                    descriptor: Arc::clone(task.descriptor()),
                    path: out.path,
                    bytes: out.bytes,
                    attempts: out.attempts,
                }),
                Err(e) => report.failed.push(e),
            }
            if let Some(progress_tx) = progress_tx {
                let _ = progress_tx.try_send(ProgressStats {
                    completed: report.succeeded.len(),
                    failed: report.failed.len(),
                    total: count,
                    bytes_done: report.bytes_downloaded(),
                    elapsed_secs: started.elapsed().as_secs_f64(),
                });
            }
        }

        for h in handles {
            if h.join().is_err() {
                tracing::warn!("download worker panicked");
            }
        }

        report.not_run = count - report.succeeded.len() - report.failed.len();
        report.cancelled = cancel.is_cancelled();
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            not_run = report.not_run,
            bytes = report.bytes_downloaded(),
            "downloads finished"
        );
        report
    }
}
