//! Staging workspace: one fresh directory per pipeline run.
//!
//! The directory is created with a unique name under a caller-chosen parent
//! and removed on release (or drop) unless retention was requested. Only the
//! directory this handle created is ever removed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of staging directory names (`.recfetch-XXXXXX`).
pub const WORKSPACE_PREFIX: &str = ".recfetch-";

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("staging location {0} exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot create staging directory under {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    retain: bool,
    released: bool,
}

impl Workspace {
    /// Create a uniquely named directory under `parent` (created if missing).
    pub fn acquire(parent: &Path, retain: bool) -> Result<Self, WorkspaceError> {
        match fs::metadata(parent) {
            Ok(meta) if !meta.is_dir() => {
                return Err(WorkspaceError::NotADirectory(parent.to_path_buf()))
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|source| WorkspaceError::Create {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(WorkspaceError::Create {
                    path: parent.to_path_buf(),
                    source,
                })
            }
        }

        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|source| WorkspaceError::Create {
                path: parent.to_path_buf(),
                source,
            })?;
        #[allow(deprecated)]
        let path = dir.into_path();
        tracing::debug!(path = %path.display(), retain, "workspace acquired");
        Ok(Self {
            path,
            retain,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Remove the directory unless retained. Idempotent; returns true only on
    /// the call that actually removed it.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if self.retain {
            tracing::info!(path = %self.path.display(), "keeping staging directory");
            return false;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "workspace removed");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
                false
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release();
    }
}
