//! Scripted sources, fake search/concat collaborators and descriptor builders
//! shared by unit tests.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::control::CancelToken;
use crate::fetcher::SegmentSource;
use crate::locator::{RecordingSearch, Recordings, SearchError};
use crate::merger::{ConcatTool, MergeError, MergeManifest, OutputFormat};
use crate::recording::{RecordingDescriptor, RecordingKind, TimeRange, CAMERA_TIME_FORMAT};
use crate::retry::{RetryPolicy, SegmentError};
use crate::storage::StagedFile;

pub(crate) fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, CAMERA_TIME_FORMAT).unwrap()
}

/// Five-minute video descriptor starting at `start` (`"2024-01-01 10:00:00"`).
pub(crate) fn video(start: &str, remote_path: &str) -> RecordingDescriptor {
    let s = at(start);
    RecordingDescriptor::new(s, s + ChronoDuration::minutes(5), 1, remote_path, RecordingKind::Video)
        .unwrap()
}

/// Millisecond backoff so retry tests stay fast.
pub(crate) fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Script {
    /// Leading attempts answered with HTTP 503. `u32::MAX` never succeeds.
    pub failures: u32,
    pub delay: Duration,
    pub body: Vec<u8>,
}

impl Script {
    pub fn ok(body: &[u8]) -> Self {
        Self {
            failures: 0,
            delay: Duration::ZERO,
            body: body.to_vec(),
        }
    }

    pub fn failing(mut self, failures: u32) -> Self {
        self.failures = failures;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Source answering per remote path from a script, tracking concurrency.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    scripts: HashMap<String, Script>,
    attempts: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completions: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, remote_path: &str, script: Script) -> Self {
        self.scripts.insert(remote_path.to_string(), script);
        self
    }

    pub fn attempts(&self, remote_path: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(remote_path)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Remote paths in the order their successful transfers finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }
}

impl SegmentSource for ScriptedSource {
    fn fetch_into(
        &self,
        descriptor: &RecordingDescriptor,
        out: &mut StagedFile,
        cancel: &CancelToken,
    ) -> Result<u64, SegmentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run_script(descriptor, out, cancel);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl ScriptedSource {
    fn run_script(
        &self,
        descriptor: &RecordingDescriptor,
        out: &mut StagedFile,
        cancel: &CancelToken,
    ) -> Result<u64, SegmentError> {
        let path = descriptor.remote_path.as_str();
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(path.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let Some(script) = self.scripts.get(path) else {
            return Err(SegmentError::Http(404));
        };
        if !cancel.sleep(script.delay) {
            return Err(SegmentError::Cancelled);
        }
        if attempt <= script.failures {
            // Leave half a payload behind to prove it never reaches the final path.
            let _ = out.write_all(&script.body[..script.body.len() / 2]);
            return Err(SegmentError::Http(503));
        }
        out.write_all(&script.body).map_err(SegmentError::Storage)?;
        self.completions.lock().unwrap().push(path.to_string());
        Ok(script.body.len() as u64)
    }
}

/// Concatenates the manifest's bytes; remembers the order it was given.
#[derive(Default)]
pub(crate) struct ByteConcat {
    pub seen: Mutex<Vec<PathBuf>>,
}

impl ConcatTool for ByteConcat {
    fn concat(
        &self,
        manifest: &MergeManifest,
        _format: OutputFormat,
        output: &Path,
        _scratch: &Path,
    ) -> Result<(), MergeError> {
        *self.seen.lock().unwrap() = manifest.paths().to_vec();
        let mut out = std::fs::File::create(output)?;
        for p in manifest.paths() {
            out.write_all(&std::fs::read(p)?)?;
        }
        Ok(())
    }
}

/// Search returning a fixed (possibly unsorted) list, or an error.
pub(crate) struct FixedSearch {
    pub found: Vec<RecordingDescriptor>,
    pub fail: bool,
}

impl FixedSearch {
    pub fn of(found: Vec<RecordingDescriptor>) -> Self {
        Self { found, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            found: Vec::new(),
            fail: true,
        }
    }
}

impl RecordingSearch for FixedSearch {
    fn find(&self, _channel: u32, range: &TimeRange) -> Result<Recordings, SearchError> {
        if self.fail {
            return Err(SearchError::Malformed("found=?".to_string()));
        }
        Ok(Recordings::from_unsorted(self.found.clone(), range))
    }
}
