//! Sequential writer for one staged segment file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::temp_path;

/// A payload being written to `<final>.part`. Call [`StagedFile::finalize`] to
/// publish it under the final name; dropping it unfinished removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
    written: u64,
}

impl StagedFile {
    /// Create (or truncate) the temp file for `final_path`.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(StagedFile {
            file: Some(BufWriter::new(file)),
            temp_path,
            final_path: final_path.to_path_buf(),
            written: 0,
        })
    }

    /// Bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Path to the current temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, sync and atomically rename the temp file to the final path.
    /// On failure the temp file is removed.
    pub fn finalize(mut self) -> io::Result<PathBuf> {
        let Some(writer) = self.file.take() else {
            return Err(io::Error::new(io::ErrorKind::Other, "staged file already closed"));
        };
        let result = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all())
            .and_then(|()| std::fs::rename(&self.temp_path, &self.final_path));
        match result {
            Ok(()) => Ok(self.final_path.clone()),
            Err(e) => {
                let _ = std::fs::remove_file(&self.temp_path);
                Err(e)
            }
        }
    }

    /// Drop the temp file without publishing anything.
    pub fn discard(mut self) {
        self.remove_temp();
    }

    fn remove_temp(&mut self) {
        if self.file.take().is_some() {
            if let Err(e) = std::fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.temp_path.display(), error = %e, "could not remove temp file");
                }
            }
        }
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "staged file already closed"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.remove_temp();
    }
}
