//! `recfetch search`: list recordings in a range.

use anyhow::{Context, Result};
use recfetch_core::config::RecfetchConfig;
use recfetch_core::locator::{RecordingLocator, RecordingSearch};
use recfetch_core::recording::CAMERA_TIME_FORMAT;

use super::connect;
use crate::cli::CameraArgs;

pub async fn run_search(cfg: &RecfetchConfig, camera: CameraArgs) -> Result<i32> {
    let (session, range) = connect(cfg, &camera)?;
    let locator = RecordingLocator::new(session, cfg.batch_size);
    let channel = camera.channel;
    let found: Vec<_> = tokio::task::spawn_blocking(move || locator.find(channel, &range))
        .await
        .context("search task failed")??
        .collect();

    if found.is_empty() {
        println!("No recordings found.");
        return Ok(0);
    }
    for (i, d) in found.iter().enumerate() {
        println!(
            "{:>4}  {}  {}  {}",
            i + 1,
            d.start.format(CAMERA_TIME_FORMAT),
            d.end.format(CAMERA_TIME_FORMAT),
            d.remote_path
        );
    }
    println!("{} recording(s).", found.len());
    Ok(0)
}
