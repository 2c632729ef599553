mod aggregate;
mod cli;
mod config;
mod error;
mod ffmpeg;
mod frame;
mod interpret;
mod metrics;
mod report;

use crate::aggregate::{LogObserver, calculate_metrics};
use crate::cli::CliArgs;
use crate::config::MetricsConfig;
use crate::error::{Result, VqError};
use crate::ffmpeg::FfmpegSource;
use crate::frame::FramePair;
use crate::report::MetricsReport;
use chrono::Local;
use log::{LevelFilter, error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    let args = cli::parse_args();

    if let Err(e) = setup_logging(&args) {
        eprintln!("Error setting up logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(report) => {
            report.log();
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to calculate metrics: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up logging to console and optionally to a file.
fn setup_logging(args: &CliArgs) -> std::result::Result<(), fern::InitError> {
    let base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for("vqcompare", LevelFilter::Debug);

    let console_config = fern::Dispatch::new()
        .level_for("vqcompare", LevelFilter::Info)
        .chain(std::io::stderr());

    let mut logger = base_config.chain(console_config);

    let mut log_path = None;
    if args.log {
        let log_filename = format!("vqcompare_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let path = args
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(log_filename);
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        logger = logger.chain(fern::Dispatch::new().chain(fern::log_file(&path)?));
        log_path = Some(path);
    }

    logger.apply()?;
    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }
    Ok(())
}

/// Checks the inputs, runs the comparison and assembles the report.
fn run(args: &CliArgs) -> Result<MetricsReport> {
    let reference_path = &args.video1080_path;
    let candidate_path = &args.video4k_path;

    for path in [reference_path, candidate_path] {
        if !path.exists() {
            return Err(VqError::PathNotFound(path.clone()));
        }
    }

    let config = MetricsConfig::with_chunk_size(args.chunk_size);
    config.validate()?;

    let start_time = Instant::now();
    info!(
        "Calculating metrics for videos {} (1080p) and {} (4K)",
        reference_path.display(),
        candidate_path.display()
    );

    // Both decoders are dropped, and so stopped, on every return path.
    let reference = FfmpegSource::open(reference_path)?;
    let candidate = FfmpegSource::open(candidate_path)?;
    let (ref_info, cand_info) = (reference.info(), candidate.info());
    if cand_info.width < ref_info.width || cand_info.height < ref_info.height {
        warn!(
            "Candidate dimensions ({}x{}) are smaller than reference ({}x{}); inputs may be swapped.",
            cand_info.width, cand_info.height, ref_info.width, ref_info.height
        );
    }
    let mut pair = FramePair::new(reference, candidate);

    let scores = calculate_metrics(&mut pair, &config, &mut LogObserver)?;
    drop(pair);

    let report = MetricsReport::new(
        reference_path,
        candidate_path,
        &config,
        &scores,
        start_time.elapsed(),
    );

    if let Some(json_path) = &args.json {
        report.write_json(json_path)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffmpeg::tests::make_solid_clip;
    use crate::interpret::{PsnrBand, SsimBand};
    use clap::Parser;

    fn args(reference: &std::path::Path, candidate: &std::path::Path, extra: &[&str]) -> CliArgs {
        let mut argv = vec![
            "vqcompare".to_string(),
            reference.display().to_string(),
            candidate.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn missing_input_aborts_before_opening() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("exists.mp4");
        std::fs::write(&existing, b"").unwrap();
        let missing = dir.path().join("missing.mp4");

        let err = run(&args(&existing, &missing, &[])).unwrap_err();
        match err {
            VqError::PathNotFound(path) => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn undecodable_input_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = make_solid_clip(dir.path(), "ok.mkv", "gray", "32x18", 3);
        let bad = dir.path().join("bad.mp4");
        std::fs::write(&bad, b"garbage").unwrap();
        let err = run(&args(&good, &bad, &[])).unwrap_err();
        assert!(matches!(err, VqError::Open { .. }));
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn same_color_clips_at_two_resolutions_are_perfect() {
        let dir = tempfile::tempdir().unwrap();
        let low = make_solid_clip(dir.path(), "low.mkv", "0x3366CC", "320x180", 30);
        let high = make_solid_clip(dir.path(), "high.mkv", "0x3366CC", "640x360", 30);
        let json_path = dir.path().join("report.json");

        let report = run(&args(&low, &high, &["--json", json_path.to_str().unwrap()])).unwrap();

        assert!(report.psnr.is_infinite() || report.psnr > 60.0, "psnr {}", report.psnr);
        assert!(report.ssim > 0.999, "ssim {}", report.ssim);
        assert_eq!(report.psnr_band, PsnrBand::High);
        assert_eq!(report.ssim_band, SsimBand::High);
        assert_eq!(report.frames_evaluated, report.frame_count.min(30));
        assert!(json_path.exists());
    }

    #[test]
    #[ignore = "requires ffmpeg"]
    fn different_colors_score_poorly() {
        let dir = tempfile::tempdir().unwrap();
        let black = make_solid_clip(dir.path(), "black.mkv", "black", "64x36", 10);
        let white = make_solid_clip(dir.path(), "white.mkv", "white", "128x72", 10);

        let report = run(&args(&black, &white, &["--chunk-size", "4"])).unwrap();

        assert!(report.psnr < 10.0);
        assert_eq!(report.psnr_band, PsnrBand::Poor);
        assert_eq!(report.ssim_band, SsimBand::Poor);
        assert_eq!(report.config.chunk_size, 4);
    }
}
