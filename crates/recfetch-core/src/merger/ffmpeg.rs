//! ffmpeg concat-demuxer backend.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{ConcatTool, MergeError, MergeManifest, OutputFormat, CONCAT_LIST_NAME};

/// Keep only the tail of ffmpeg's stderr in error messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs `ffmpeg -f concat -safe 0 -i <list> -c copy -f <muxer> -y <output>`.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    /// Use `override_path` if it exists, else look `ffmpeg` up on `PATH`.
    pub fn locate(override_path: Option<&Path>) -> Result<Self, MergeError> {
        if let Some(p) = override_path {
            if p.exists() {
                return Ok(Self::with_program(p));
            }
            tracing::warn!(path = %p.display(), "configured ffmpeg_path does not exist, searching PATH");
        }
        which::which("ffmpeg")
            .map(|program| Self { program })
            .map_err(|_| MergeError::ToolNotFound("ffmpeg".to_string()))
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, list: &Path, format: OutputFormat, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(list)
            .args(["-c", "copy", "-f", format.muxer(), "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl ConcatTool for Ffmpeg {
    fn concat(
        &self,
        manifest: &MergeManifest,
        format: OutputFormat,
        output: &Path,
        scratch: &Path,
    ) -> Result<(), MergeError> {
        let list = scratch.join(CONCAT_LIST_NAME);
        manifest.write_concat_list(&list)?;

        let result = self.command(&list, format, output).output();
        let _ = std::fs::remove_file(&list);
        let out = result.map_err(|source| MergeError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let trimmed = stderr.trim();
            let start = trimmed.len().saturating_sub(STDERR_TAIL_BYTES);
            let tail = trimmed
                .char_indices()
                .find(|(i, _)| *i >= start)
                .map(|(i, _)| &trimmed[i..])
                .unwrap_or(trimmed);
            return Err(MergeError::ToolFailed {
                status: out
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: tail.to_string(),
            });
        }
        Ok(())
    }
}
