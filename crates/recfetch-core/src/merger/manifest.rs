//! Merge manifest: staged files in chronological order, and its ffmpeg concat list.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::coordinator::SegmentSuccess;

/// Local paths ascending by descriptor start; equal starts keep discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeManifest {
    paths: Vec<PathBuf>,
}

impl MergeManifest {
    /// Order depends only on descriptor metadata, never on the slice order.
    pub fn from_segments(segments: &[SegmentSuccess]) -> Self {
        let mut ordered: Vec<&SegmentSuccess> = segments.iter().collect();
        ordered.sort_by_key(|s| (s.descriptor.start, s.index));
        Self {
            paths: ordered.into_iter().map(|s| s.path.clone()).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Write an ffmpeg concat-demuxer list (`file '<abs path>'` per line).
    pub fn write_concat_list(&self, list_path: &Path) -> io::Result<()> {
        let mut out = io::BufWriter::new(std::fs::File::create(list_path)?);
        for path in &self.paths {
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()?.join(path)
            };
            writeln!(out, "file '{}'", escape_single_quotes(&abs.to_string_lossy()))?;
        }
        out.flush()
    }
}

/// Concat lists quote paths in single quotes; an embedded quote becomes `'\''`.
fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', r"'\''")
}
