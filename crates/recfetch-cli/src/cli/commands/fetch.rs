//! `recfetch fetch`: search, download, merge.

use anyhow::Result;
use recfetch_core::config::{PartialPolicy, RecfetchConfig};
use recfetch_core::control::CancelToken;
use recfetch_core::coordinator::ProgressStats;
use recfetch_core::merger::Ffmpeg;
use recfetch_core::pipeline::{self, FetchRequest, Pipeline, PipelineError, PipelineReport};
use std::path::PathBuf;
use std::sync::Arc;

use super::connect;
use crate::cli::{FetchArgs, EXIT_CANCELLED};

pub async fn run_fetch(cfg: &RecfetchConfig, args: FetchArgs) -> Result<i32> {
    // Fail before downloading anything if the merge tool is missing.
    let ffmpeg = Ffmpeg::locate(cfg.ffmpeg_path.as_deref())?;
    tracing::debug!(ffmpeg = %ffmpeg.program().display(), "using ffmpeg");

    let (session, range) = connect(cfg, &args.camera)?;
    let request = build_request(cfg, range, &args);
    let output = request.output_path();
    let pipeline = Arc::new(Pipeline::for_camera(session, cfg, Arc::new(ffmpeg)));

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling, waiting for in-flight downloads to stop...");
                cancel.cancel();
            }
        })
    };

    let (progress_tx, progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let printer = tokio::spawn(print_progress(progress_rx));

    let result = pipeline::run_async(pipeline, request, cancel, Some(progress_tx)).await;
    let _ = printer.await;
    ctrl_c.abort();

    match result {
        Ok(PipelineReport::NothingFound) => {
            println!("No recordings found for the requested time range.");
            Ok(0)
        }
        Ok(PipelineReport::Merged(summary)) => {
            if !summary.gaps.is_empty() {
                eprintln!(
                    "Warning: {} segment(s) could not be downloaded; the output has gaps:",
                    summary.gaps.len()
                );
                for gap in &summary.gaps {
                    eprintln!("  {}", gap);
                }
            }
            if let Some(staging) = &summary.staging {
                println!("Downloaded segments kept in {}", staging.display());
            }
            println!(
                "Merged {} segment(s) ({:.1} MiB) into {}",
                summary.segments,
                summary.bytes as f64 / 1_048_576.0,
                summary.output.display()
            );
            Ok(0)
        }
        Err(PipelineError::Cancelled { stage }) => {
            eprintln!("Cancelled during {}; {} was not written.", stage, output.display());
            Ok(EXIT_CANCELLED)
        }
        Err(err) => {
            for failure in err.download_failures() {
                eprintln!("  {}", failure);
            }
            Err(err.into())
        }
    }
}

fn build_request(
    cfg: &RecfetchConfig,
    range: recfetch_core::recording::TimeRange,
    args: &FetchArgs,
) -> FetchRequest {
    let mut request = FetchRequest::new(range, cfg);
    request.channel = args.camera.channel;
    if let Some(format) = args.output_format {
        request.output_format = format;
    }
    request.output_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    request.output_file = args.output_file.clone();
    request.retain_staging = args.keep_files;
    if let Some(n) = args.max_concurrent {
        request.max_concurrent = usize::try_from(n).unwrap_or(usize::MAX);
    }
    if args.abort_on_partial {
        request.partial_policy = PartialPolicy::Abort;
    }
    request
}

async fn print_progress(mut rx: tokio::sync::mpsc::Receiver<ProgressStats>) {
    while let Some(stats) = rx.recv().await {
        let failed = if stats.failed > 0 {
            format!(", {} failed", stats.failed)
        } else {
            String::new()
        };
        println!(
            "Progress: {}/{} ({:.0}%{})  {:.2} MiB/s",
            stats.finished(),
            stats.total,
            stats.fraction() * 100.0,
            failed,
            stats.bytes_per_sec() / 1_048_576.0
        );
    }
}
