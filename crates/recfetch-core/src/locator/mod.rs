//! Recording locator: drives the camera's paginated finder protocol.
//!
//! `factory.create` → `findFile` → `findNextFile` (repeated) → `destroy`.
//! The finder is destroyed on every exit path once it has been created.

mod parse;

use std::sync::Arc;
use std::time::Duration;

use crate::recording::{sort_chronologically, RecordingDescriptor, TimeRange};
use crate::session::{CameraSession, HttpError};
use parse::PageHeader;

pub const FINDER_ENDPOINT: &str = "/cgi-bin/mediaFileFind.cgi";

/// Default `count` per `findNextFile` page.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] HttpError),
    #[error("camera did not return a finder object id")]
    MissingObjectId,
    #[error("camera rejected the search: {0}")]
    Rejected(String),
    #[error("malformed search reply: {0}")]
    Malformed(String),
}

/// Chronologically ordered video descriptors intersecting the requested range.
/// Finite and consumed once.
#[derive(Debug)]
pub struct Recordings {
    inner: std::vec::IntoIter<RecordingDescriptor>,
}

impl Recordings {
    /// Filter to video segments intersecting `range`, then sort by start.
    pub fn from_unsorted(mut found: Vec<RecordingDescriptor>, range: &TimeRange) -> Self {
        found.retain(|d| d.is_video() && d.intersects(range));
        sort_chronologically(&mut found);
        Self {
            inner: found.into_iter(),
        }
    }
}

impl Iterator for Recordings {
    type Item = RecordingDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Recordings {}

/// Search seam used by the pipeline (faked in tests).
pub trait RecordingSearch: Send + Sync {
    fn find(&self, channel: u32, range: &TimeRange) -> Result<Recordings, SearchError>;
}

/// GET of the finder endpoint returning the text body.
pub trait FinderTransport: Send + Sync {
    fn call(&self, params: &[(&str, String)], timeout: Duration) -> Result<String, HttpError>;
}

impl FinderTransport for CameraSession {
    fn call(&self, params: &[(&str, String)], timeout: Duration) -> Result<String, HttpError> {
        self.get_text(FINDER_ENDPOINT, params, timeout)
    }
}

pub struct RecordingLocator<T = CameraSession> {
    transport: Arc<T>,
    batch_size: u32,
    request_timeout: Duration,
    search_timeout: Duration,
}

impl RecordingLocator<CameraSession> {
    pub fn new(session: Arc<CameraSession>, batch_size: u32) -> Self {
        let timeouts = *session.timeouts();
        Self {
            transport: session,
            batch_size: batch_size.max(1),
            request_timeout: timeouts.request,
            search_timeout: timeouts.search,
        }
    }
}

impl<T: FinderTransport> RecordingLocator<T> {
    fn create_finder(&self) -> Result<Finder<'_, T>, SearchError> {
        let body = self
            .transport
            .call(&[("action", "factory.create".to_string())], self.request_timeout)?;
        let id = parse::object_id(&body).ok_or(SearchError::MissingObjectId)?;
        tracing::debug!(object = %id, "finder created");
        Ok(Finder {
            transport: &*self.transport,
            id,
            timeout: self.request_timeout,
        })
    }

    fn collect(
        &self,
        finder: &Finder<'_, T>,
        channel: u32,
        range: &TimeRange,
    ) -> Result<Vec<RecordingDescriptor>, SearchError> {
        let (start, end) = range.to_camera_format();
        let reply = self.transport.call(
            &[
                ("action", "findFile".to_string()),
                ("object", finder.id.clone()),
                ("condition.Channel", channel.to_string()),
                ("condition.StartTime", start),
                ("condition.EndTime", end),
            ],
            self.search_timeout,
        )?;
        if !parse::is_ok(&reply) {
            return Err(SearchError::Rejected(reply.trim().to_string()));
        }

        let mut found = Vec::new();
        for page_no in 1.. {
            let page = self.transport.call(
                &[
                    ("action", "findNextFile".to_string()),
                    ("object", finder.id.clone()),
                    ("count", self.batch_size.to_string()),
                ],
                self.search_timeout,
            )?;
            match parse::page_header(&page) {
                PageHeader::Found(0) => break,
                PageHeader::Found(_) => {}
                PageHeader::Missing => {
                    tracing::debug!(page = page_no, "findNextFile reply without found=, ending search");
                    break;
                }
                PageHeader::Invalid => {
                    return Err(SearchError::Malformed(
                        page.lines().next().unwrap_or_default().to_string(),
                    ))
                }
            }
            let batch = parse::records(&page, channel);
            if batch.is_empty() {
                break;
            }
            tracing::debug!(page = page_no, records = batch.len(), "search page");
            found.extend(batch);
        }
        Ok(found)
    }
}

impl<T: FinderTransport> RecordingSearch for RecordingLocator<T> {
    fn find(&self, channel: u32, range: &TimeRange) -> Result<Recordings, SearchError> {
        let finder = self.create_finder()?;
        let found = self.collect(&finder, channel, range)?;
        drop(finder);
        let reported = found.len();
        let recordings = Recordings::from_unsorted(found, range);
        tracing::info!(
            channel,
            reported,
            kept = recordings.len(),
            "search finished"
        );
        Ok(recordings)
    }
}

/// Live finder object; `destroy` is sent when dropped. Its errors are ignored.
struct Finder<'a, T: FinderTransport> {
    transport: &'a T,
    id: String,
    timeout: Duration,
}

impl<T: FinderTransport> Drop for Finder<'_, T> {
    fn drop(&mut self) {
        let params = [
            ("action", "destroy".to_string()),
            ("object", self.id.clone()),
        ];
        if let Err(e) = self.transport.call(&params, self.timeout) {
            tracing::debug!(object = %self.id, error = %e, "finder destroy failed");
        }
    }
}
