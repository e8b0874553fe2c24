use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::merger::OutputFormat;
use crate::retry::RetryPolicy;
use crate::session::SessionTimeouts;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per segment (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let base = if self.base_delay_secs.is_finite() && self.base_delay_secs > 0.0 {
            Duration::from_secs_f64(self.base_delay_secs)
        } else {
            Duration::ZERO
        };
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: base,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// What to do when some segments fail for good but others were downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Merge what was downloaded and report the gaps.
    #[default]
    Continue,
    /// Fail the run without merging.
    Abort,
}

/// Global configuration loaded from `~/.config/recfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecfetchConfig {
    /// Maximum concurrent segment downloads.
    pub max_concurrent: usize,
    /// `count` passed to each `findNextFile` page.
    pub batch_size: u32,
    pub connect_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// Transfers abort when throughput stays under 1 KiB/s this long.
    pub download_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    pub retry: Option<RetryConfig>,
    pub partial_policy: PartialPolicy,
    pub output_format: OutputFormat,
    /// Explicit ffmpeg binary; otherwise `ffmpeg` is looked up on PATH.
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for RecfetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            batch_size: 100,
            connect_timeout_secs: 10,
            search_timeout_secs: 30,
            download_timeout_secs: 60,
            retry: None,
            partial_policy: PartialPolicy::Continue,
            output_format: OutputFormat::Mp4,
            ffmpeg_path: None,
        }
    }
}

impl RecfetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }

    pub fn session_timeouts(&self) -> SessionTimeouts {
        SessionTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.connect_timeout_secs),
            search: Duration::from_secs(self.search_timeout_secs),
            low_speed: Duration::from_secs(self.download_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("recfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RecfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RecfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file; missing keys take defaults.
pub fn load_from(path: &Path) -> Result<RecfetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RecfetchConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}
