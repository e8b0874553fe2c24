//! CLI command handlers, one file per subcommand.

mod fetch;
mod search;

pub use fetch::run_fetch;
pub use search::run_search;

use anyhow::{Context, Result};
use recfetch_core::config::RecfetchConfig;
use recfetch_core::recording::TimeRange;
use recfetch_core::session::{CameraSession, Credentials};
use std::sync::Arc;

use super::credentials::resolve_password;
use super::CameraArgs;

/// Validate the range and open an authenticated session.
fn connect(cfg: &RecfetchConfig, camera: &CameraArgs) -> Result<(Arc<CameraSession>, TimeRange)> {
    let range = TimeRange::parse(&camera.start, &camera.end).context("invalid time range")?;
    let password = resolve_password(&camera.username)?;
    let session = CameraSession::new(
        &camera.host,
        Credentials::new(camera.username.clone(), password),
        cfg.session_timeouts(),
    )?;
    tracing::info!(camera = session.base_url(), channel = camera.channel, "connecting");
    Ok((Arc::new(session), range))
}
