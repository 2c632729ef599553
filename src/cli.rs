// src/cli.rs

use crate::config::DEFAULT_CHUNK_SIZE;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Calculate and interpret PSNR and SSIM metrics for two videos.", long_about = None)]
pub struct CliArgs {
    /// Path to the 1080p (reference) video file
    #[arg(required = true)]
    pub video1080_path: PathBuf,

    /// Path to the 4K (candidate) video file
    #[arg(required = true)]
    pub video4k_path: PathBuf,

    /// Number of frames averaged together before the chunk mean is pooled
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_name = "N")]
    pub chunk_size: usize,

    /// Write the metrics report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Specify output directory for the log file (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable logging to file (e.g., vqcompare_YYYYMMDD_HHMMSS.log)
    #[arg(long)]
    pub log: bool,
}

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
