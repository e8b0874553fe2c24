//! Sequencer/merger: order downloaded segments and concatenate them.
//!
//! The concatenation itself is delegated to a [`ConcatTool`] (ffmpeg in
//! production). Gaps between consecutive segments are not detected; they
//! show up as jumps in playback time.

mod ffmpeg;
mod manifest;

pub use ffmpeg::Ffmpeg;
pub use manifest::MergeManifest;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::coordinator::SegmentSuccess;
use crate::recording::FILE_STAMP_FORMAT;

/// Name of the concat list written into the staging directory.
pub const CONCAT_LIST_NAME: &str = "concat_list.txt";

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mkv,
    Avi,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Mp4, OutputFormat::Mkv, OutputFormat::Avi];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "mkv",
            OutputFormat::Avi => "avi",
        }
    }

    /// ffmpeg muxer name for `-f`.
    pub fn muxer(self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Mkv => "matroska",
            OutputFormat::Avi => "avi",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MergeError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("unsupported output format {0:?} (expected mp4, mkv or avi)")]
    UnsupportedFormat(String),
    #[error("no downloaded segments to merge")]
    NothingToMerge,
    #[error("{0} not found; install ffmpeg or set ffmpeg_path in config.toml")]
    ToolNotFound(String),
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("concatenation failed (exit status {status}): {stderr}")]
    ToolFailed { status: String, stderr: String },
    #[error("expected output {0} is missing or empty")]
    MissingOutput(PathBuf),
    #[error("merge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Black-box concatenation of an ordered file list into one container.
pub trait ConcatTool: Send + Sync {
    /// `scratch` is a writable directory for intermediate files (the workspace).
    fn concat(
        &self,
        manifest: &MergeManifest,
        format: OutputFormat,
        output: &Path,
        scratch: &Path,
    ) -> Result<(), MergeError>;
}

/// `merged_20240101_100000.mp4`, stamped with the range start.
pub fn default_output_name(range_start: NaiveDateTime, format: OutputFormat) -> String {
    format!(
        "merged_{}.{}",
        range_start.format(FILE_STAMP_FORMAT),
        format.extension()
    )
}

/// Build the manifest from `segments`, run `tool`, and check the output exists
/// and is non-empty.
pub fn merge(
    tool: &dyn ConcatTool,
    segments: &[SegmentSuccess],
    format: OutputFormat,
    output: &Path,
    scratch: &Path,
) -> Result<MergeManifest, MergeError> {
    if segments.is_empty() {
        return Err(MergeError::NothingToMerge);
    }
    let manifest = MergeManifest::from_segments(segments);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    // A stale file would pass the size check below if the tool wrote nothing.
    match std::fs::remove_file(output) {
        Ok(()) => tracing::debug!(output = %output.display(), "replacing existing output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tracing::info!(
        segments = manifest.len(),
        output = %output.display(),
        %format,
        "merging segments"
    );
    tool.concat(&manifest, format, output, scratch)?;

    let len = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(MergeError::MissingOutput(output.to_path_buf()));
    }
    tracing::info!(output = %output.display(), bytes = len, "merge complete");
    Ok(manifest)
}
