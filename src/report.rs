// src/report.rs

use crate::aggregate::AggregateScores;
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::interpret::{PsnrBand, SsimBand, interpret_metrics};
use log::info;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Debug, Clone)]
pub struct MetricsReport {
    pub reference: PathBuf,
    pub candidate: PathBuf,
    /// Chunk size and band thresholds the run was scored with.
    pub config: MetricsConfig,
    pub frame_count: u64,
    pub chunks_planned: u64,
    pub chunks_evaluated: u64,
    pub frames_evaluated: u64,
    // JSON has no infinity; identical inputs are written as "inf".
    #[serde(serialize_with = "serialize_score")]
    pub psnr: f64,
    pub ssim: f64,
    pub psnr_band: PsnrBand,
    pub ssim_band: SsimBand,
    pub psnr_interpretation: &'static str,
    pub ssim_interpretation: &'static str,
    pub elapsed_secs: f64,
}

fn serialize_score<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("nan")
    } else if value.is_sign_positive() {
        serializer.serialize_str("inf")
    } else {
        serializer.serialize_str("-inf")
    }
}

impl MetricsReport {
    pub fn new(
        reference: &Path,
        candidate: &Path,
        config: &MetricsConfig,
        scores: &AggregateScores,
        elapsed: Duration,
    ) -> Self {
        let (psnr_band, ssim_band) =
            interpret_metrics(scores.psnr, scores.ssim, &config.psnr, &config.ssim);
        Self {
            reference: reference.to_path_buf(),
            candidate: candidate.to_path_buf(),
            config: config.clone(),
            frame_count: scores.frame_count,
            chunks_planned: scores.chunks_planned,
            chunks_evaluated: scores.chunks_evaluated,
            frames_evaluated: scores.frames_evaluated,
            psnr: scores.psnr,
            ssim: scores.ssim,
            psnr_band,
            ssim_band,
            psnr_interpretation: psnr_band.description(),
            ssim_interpretation: ssim_band.description(),
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    pub fn log(&self) {
        info!("Average PSNR: {}", self.psnr);
        info!("Average SSIM: {}", self.ssim);
        info!("PSNR Interpretation: {}", self.psnr_interpretation);
        info!("SSIM Interpretation: {}", self.ssim_interpretation);
        info!("Time of execution: {} seconds", self.elapsed_secs);
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved metrics report to {}", path.display());
        Ok(())
    }
}
