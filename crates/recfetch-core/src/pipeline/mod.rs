//! End-to-end run: search → workspace → downloads → merge → cleanup.
//!
//! Every stage is a collaborator behind a seam so the whole flow runs
//! against fakes in tests. The workspace is released on every exit path
//! once acquired (unless retention was requested).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{PartialPolicy, RecfetchConfig};
use crate::control::CancelToken;
use crate::coordinator::{DownloadCoordinator, DownloadOutcome, ProgressStats};
use crate::fetcher::{DownloadError, SegmentFetcher, SegmentSource};
use crate::locator::{RecordingLocator, RecordingSearch, SearchError};
use crate::merger::{self, ConcatTool, MergeError, OutputFormat};
use crate::recording::{RecordingDescriptor, TimeRange};
use crate::retry::RetryPolicy;
use crate::session::CameraSession;
use crate::workspace::{Workspace, WorkspaceError};

type ProgressSender = tokio::sync::mpsc::Sender<ProgressStats>;

/// One acquisition job.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub range: TimeRange,
    pub channel: u32,
    pub output_format: OutputFormat,
    /// Directory for the default-named output and, by default, the workspace.
    pub output_dir: PathBuf,
    /// Explicit output file; overrides `output_dir` + default name.
    pub output_file: Option<PathBuf>,
    /// Where the staging directory is created; `output_dir` when `None`.
    pub staging_parent: Option<PathBuf>,
    pub retain_staging: bool,
    pub max_concurrent: usize,
    pub partial_policy: PartialPolicy,
}

impl FetchRequest {
    /// Request with config defaults for everything but the range.
    pub fn new(range: TimeRange, cfg: &RecfetchConfig) -> Self {
        Self {
            range,
            channel: 1,
            output_format: cfg.output_format,
            output_dir: PathBuf::from("."),
            output_file: None,
            staging_parent: None,
            retain_staging: false,
            max_concurrent: cfg.max_concurrent,
            partial_policy: cfg.partial_policy,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output_file {
            Some(f) => f.clone(),
            None => self.output_dir.join(merger::default_output_name(
                self.range.start(),
                self.output_format,
            )),
        }
    }

    fn staging_parent(&self) -> &std::path::Path {
        self.staging_parent.as_deref().unwrap_or(&self.output_dir)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.max_concurrent == 0 {
            return Err(PipelineError::InvalidRequest(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of a successful merge.
#[derive(Debug)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub segments: usize,
    pub bytes: u64,
    /// Segments that could not be downloaded (coverage gaps in the output).
    pub gaps: Vec<DownloadError>,
    /// Kept staging directory, when retention was requested.
    pub staging: Option<PathBuf>,
}

#[derive(Debug)]
pub enum PipelineReport {
    /// The camera has no video in the range; nothing was downloaded.
    NothingFound,
    Merged(MergeSummary),
}

/// Pipeline stage, named in every fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Search,
    Workspace,
    Download,
    Merge,
    /// The blocking task running the pipeline panicked or was dropped.
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Validate => "validate",
            Stage::Search => "search",
            Stage::Workspace => "workspace",
            Stage::Download => "download",
            Stage::Merge => "merge",
            Stage::Runtime => "runtime",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("search stage failed: {0}")]
    Search(#[from] SearchError),
    #[error("workspace stage failed: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("download stage failed: none of {total} segment(s) could be downloaded")]
    NoneSucceeded {
        total: usize,
        failures: Vec<DownloadError>,
    },
    #[error("download stage failed: {} of {total} segment(s) missing and partial merges are disabled", .failures.len())]
    PartialRejected {
        total: usize,
        failures: Vec<DownloadError>,
    },
    #[error("merge stage failed: {0}")]
    Merge(#[from] MergeError),
    #[error("cancelled during {stage}")]
    Cancelled { stage: Stage },
    #[error("pipeline task aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidRequest(_) => Stage::Validate,
            PipelineError::Aborted(_) => Stage::Runtime,
            PipelineError::Search(_) => Stage::Search,
            PipelineError::Workspace(_) => Stage::Workspace,
            PipelineError::NoneSucceeded { .. } | PipelineError::PartialRejected { .. } => {
                Stage::Download
            }
            PipelineError::Merge(_) => Stage::Merge,
            PipelineError::Cancelled { stage } => *stage,
        }
    }

    /// Per-segment failures, when the download stage failed.
    pub fn download_failures(&self) -> &[DownloadError] {
        match self {
            PipelineError::NoneSucceeded { failures, .. }
            | PipelineError::PartialRejected { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// The assembled pipeline. Cheap to share; one `run` per request.
pub struct Pipeline<S> {
    search: Arc<dyn RecordingSearch>,
    source: Arc<S>,
    tool: Arc<dyn ConcatTool>,
    retry: RetryPolicy,
}

impl Pipeline<CameraSession> {
    /// Production wiring: camera search and transfers share one session.
    pub fn for_camera(
        session: Arc<CameraSession>,
        cfg: &RecfetchConfig,
        tool: Arc<dyn ConcatTool>,
    ) -> Self {
        let locator = RecordingLocator::new(Arc::clone(&session), cfg.batch_size);
        Self::new(Arc::new(locator), session, tool, cfg.retry_policy())
    }
}

impl<S: SegmentSource + 'static> Pipeline<S> {
    pub fn new(
        search: Arc<dyn RecordingSearch>,
        source: Arc<S>,
        tool: Arc<dyn ConcatTool>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            search,
            source,
            tool,
            retry,
        }
    }

    /// Locate recordings for the request's channel and range.
    pub fn locate(&self, request: &FetchRequest) -> Result<Vec<RecordingDescriptor>, SearchError> {
        Ok(self.search.find(request.channel, &request.range)?.collect())
    }

    /// Run the whole job on the current thread.
    pub fn run(
        &self,
        request: &FetchRequest,
        cancel: &CancelToken,
        progress_tx: Option<&ProgressSender>,
    ) -> Result<PipelineReport, PipelineError> {
        request.validate()?;
        check_cancel(cancel, Stage::Search)?;

        let descriptors = self.locate(request)?;
        if descriptors.is_empty() {
            tracing::info!(channel = request.channel, "no recordings in range");
            return Ok(PipelineReport::NothingFound);
        }
        check_cancel(cancel, Stage::Workspace)?;

        let mut workspace = Workspace::acquire(request.staging_parent(), request.retain_staging)?;
        let fetcher = SegmentFetcher::new(Arc::clone(&self.source), self.retry);
        let coordinator = DownloadCoordinator::new(fetcher, request.max_concurrent);
        let report = coordinator.run(descriptors, workspace.path(), cancel, progress_tx);
        if report.cancelled {
            return Err(PipelineError::Cancelled {
                stage: Stage::Download,
            });
        }

        let total = report.total;
        match report.outcome() {
            DownloadOutcome::AllSucceeded => {}
            DownloadOutcome::NoneSucceeded => {
                return Err(PipelineError::NoneSucceeded {
                    total,
                    failures: report.failed,
                })
            }
            DownloadOutcome::PartialSuccess { succeeded, failed } => {
                if request.partial_policy == PartialPolicy::Abort {
                    return Err(PipelineError::PartialRejected {
                        total,
                        failures: report.failed,
                    });
                }
                tracing::warn!(
                    succeeded,
                    failed,
                    "coverage gap: merging without {} segment(s)",
                    failed
                );
                for gap in &report.failed {
                    tracing::warn!(segment = %gap.descriptor, attempts = gap.attempts, "missing from output");
                }
            }
        }
        check_cancel(cancel, Stage::Merge)?;

        let output = request.output_path();
        let manifest = merger::merge(
            self.tool.as_ref(),
            &report.succeeded,
            request.output_format,
            &output,
            workspace.path(),
        )?;

        let staging = workspace.retain().then(|| workspace.path().to_path_buf());
        workspace.release();
        Ok(PipelineReport::Merged(MergeSummary {
            output,
            segments: manifest.len(),
            bytes: report.bytes_downloaded(),
            gaps: report.failed,
            staging,
        }))
    }
}

fn check_cancel(cancel: &CancelToken, stage: Stage) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled { stage });
    }
    Ok(())
}

/// Camera pipeline in one call (blocking).
pub fn run(
    request: &FetchRequest,
    session: Arc<CameraSession>,
    cfg: &RecfetchConfig,
    tool: Arc<dyn ConcatTool>,
    cancel: &CancelToken,
    progress_tx: Option<&ProgressSender>,
) -> Result<PipelineReport, PipelineError> {
    Pipeline::for_camera(session, cfg, tool).run(request, cancel, progress_tx)
}

/// Run on tokio's blocking pool; downloads use OS threads and blocking curl.
pub async fn run_async<S: SegmentSource + 'static>(
    pipeline: Arc<Pipeline<S>>,
    request: FetchRequest,
    cancel: CancelToken,
    progress_tx: Option<ProgressSender>,
) -> Result<PipelineReport, PipelineError> {
    tokio::task::spawn_blocking(move || pipeline.run(&request, &cancel, progress_tx.as_ref()))
        .await
        .map_err(|e| PipelineError::Aborted(e.to_string()))?
}
