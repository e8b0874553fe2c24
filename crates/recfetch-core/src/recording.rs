//! Recording metadata: requested time ranges and discovered segment descriptors.
//!
//! Cameras report wall-clock times without an offset, so every timestamp here
//! is a `NaiveDateTime` in camera-local time. User input carrying an explicit
//! offset is normalized by dropping the offset and keeping the wall time.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt;
use std::path::Path;

/// Timestamp format used by the camera search API (`2024-01-01 10:00:00`).
pub const CAMERA_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compact timestamp used in staging and output file names.
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Invalid time range input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("invalid timestamp {0:?}: expected ISO 8601 (e.g. 2024-01-01T10:00:00)")]
    Unparsable(String),
    #[error("start {start} must be before end {end}")]
    Empty {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Half-open search window `[start, end]` in camera-local time. Always `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, TimeRangeError> {
        if start >= end {
            return Err(TimeRangeError::Empty { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from ISO 8601 strings (see [`parse_timestamp`]).
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeRangeError> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Both ends formatted for the camera search API.
    pub fn to_camera_format(&self) -> (String, String) {
        (
            self.start.format(CAMERA_TIME_FORMAT).to_string(),
            self.end.format(CAMERA_TIME_FORMAT).to_string(),
        )
    }
}

/// Parse an ISO 8601 timestamp. Accepts RFC 3339 with an offset (the offset is
/// dropped), `T` or space separated date-times with optional fractional
/// seconds, and bare dates (midnight).
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, TimeRangeError> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(TimeRangeError::Unparsable(input.to_string()))
}

/// What a discovered file contains. Only `Video` is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingKind {
    Video,
    Snapshot,
    Other,
}

impl RecordingKind {
    /// Classify from the camera's `Type` field, falling back to the path extension.
    pub fn classify(type_tag: Option<&str>, remote_path: &str) -> Self {
        let by_tag = type_tag.map(|t| t.trim().to_ascii_lowercase());
        match by_tag.as_deref() {
            Some("dav") | Some("mp4") => return RecordingKind::Video,
            Some("jpg") | Some("jpeg") => return RecordingKind::Snapshot,
            _ => {}
        }
        let ext = Path::new(remote_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp4") | Some("dav") => RecordingKind::Video,
            Some("jpg") | Some("jpeg") => RecordingKind::Snapshot,
            _ => RecordingKind::Other,
        }
    }
}

/// One recording segment as reported by the camera. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingDescriptor {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub channel: u32,
    /// Camera-side path, passed back verbatim to the file endpoint.
    pub remote_path: String,
    pub kind: RecordingKind,
}

impl RecordingDescriptor {
    /// Returns `None` when `end < start`.
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        channel: u32,
        remote_path: impl Into<String>,
        kind: RecordingKind,
    ) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self {
            start,
            end,
            channel,
            remote_path: remote_path.into(),
            kind,
        })
    }

    pub fn is_video(&self) -> bool {
        self.kind == RecordingKind::Video
    }

    /// True if `[start, end]` overlaps the range (touching endpoints count).
    pub fn intersects(&self, range: &TimeRange) -> bool {
        self.end >= range.start() && self.start <= range.end()
    }

    /// Staging file name, unique per discovery index:
    /// `recording_0003_20240101_100500.mp4`.
    pub fn staging_file_name(&self, index: usize) -> String {
        let ext = Path::new(&self.remote_path)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");
        format!(
            "recording_{:04}_{}.{}",
            index,
            self.start.format(FILE_STAMP_FORMAT),
            ext
        )
    }
}

impl fmt::Display for RecordingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.start.format(CAMERA_TIME_FORMAT),
            self.end.format(CAMERA_TIME_FORMAT),
            self.remote_path
        )
    }
}

/// Stable sort by start time; equal starts keep discovery order.
pub fn sort_chronologically(descriptors: &mut [RecordingDescriptor]) {
    descriptors.sort_by_key(|d| d.start);
}
