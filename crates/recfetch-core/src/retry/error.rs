//! Per-attempt segment transfer error, classified before it becomes a `DownloadError`.

use std::fmt;

/// Error returned by a single fetch attempt (curl failure, HTTP error, bad
/// payload, or storage failure).
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Transfer ended before `Content-Length` bytes arrived (server closed early).
    PartialTransfer { expected: u64, received: u64 },
    /// Transfer succeeded but carried no bytes.
    Empty,
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// The pipeline was cancelled while this attempt was running or waiting.
    Cancelled,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Empty => write!(f, "empty payload"),
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
            SegmentError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            SegmentError::Http(_)
            | SegmentError::PartialTransfer { .. }
            | SegmentError::Empty
            | SegmentError::Cancelled => None,
        }
    }
}
