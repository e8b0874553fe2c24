//! Staged file lifecycle.
//!
//! Segment payloads are streamed into `<final>.part`, flushed and synced,
//! then atomically renamed to the final name. A staged file that is dropped
//! without being finalized removes its `.part`, so a partially written
//! payload never appears at a final path.

mod writer;

pub use writer::StagedFile;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `a.mp4` → `a.mp4.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
