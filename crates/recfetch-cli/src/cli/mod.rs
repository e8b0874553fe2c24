//! CLI for recfetch: pull recordings off a camera and merge them into one file.

mod commands;
mod credentials;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use recfetch_core::config::{self, RecfetchConfig};
use recfetch_core::merger::OutputFormat;
use std::path::{Path, PathBuf};

use commands::{run_fetch, run_search};

/// Exit status for a run stopped by Ctrl-C.
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level CLI for recfetch.
#[derive(Debug, Parser)]
#[command(name = "recfetch")]
#[command(about = "Download camera recordings for a time range and merge them into one video", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/recfetch/config.toml, created if missing).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Camera connection and search window, shared by every subcommand.
#[derive(Debug, Args)]
pub struct CameraArgs {
    /// Camera address (IP, host:port or http:// URL).
    #[arg(long)]
    pub host: String,
    /// Camera user. The password is read from RECFETCH_PASSWORD or prompted for.
    #[arg(long, short = 'u')]
    pub username: String,
    /// Range start, ISO 8601 (e.g. 2024-01-01T10:00:00).
    #[arg(long)]
    pub start: String,
    /// Range end, ISO 8601.
    #[arg(long)]
    pub end: String,
    /// Camera channel.
    #[arg(long, default_value_t = 1)]
    pub channel: u32,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub camera: CameraArgs,
    /// Output container: mp4, mkv or avi (default from config).
    #[arg(long, value_name = "FORMAT")]
    pub output_format: Option<OutputFormat>,
    /// Directory for the merged file (default: current directory).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Exact output file; overrides --output-dir and the default name.
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,
    /// Keep the downloaded segments after merging.
    #[arg(long)]
    pub keep_files: bool,
    /// Parallel downloads (default from config).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,
    /// Fail instead of merging when some segments could not be downloaded.
    #[arg(long)]
    pub abort_on_partial: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every recording in the range and merge them into one file.
    Fetch(FetchArgs),

    /// List the recordings in the range without downloading.
    Search(CameraArgs),
}

impl CliCommand {
    /// Parse arguments, load config and dispatch. Returns the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_deref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch(args) => run_fetch(&cfg, args).await,
            CliCommand::Search(camera) => run_search(&cfg, camera).await,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RecfetchConfig> {
    match path {
        Some(p) => config::load_from(p),
        None => config::load_or_init().context("loading default config"),
    }
}

#[cfg(test)]
mod tests;
