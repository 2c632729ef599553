// src/interpret.rs

use crate::config::{PsnrThresholds, SsimThresholds};
use serde::Serialize;
use std::fmt;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PsnrBand {
    High,
    Good,
    Acceptable,
    Poor,
}

impl PsnrBand {
    /// Bands are upper-inclusive: a score exactly on a threshold falls into
    /// the lower band. NaN and negative infinity are `Poor`.
    pub fn classify(psnr: f64, thresholds: &PsnrThresholds) -> Self {
        if psnr > thresholds.high {
            PsnrBand::High
        } else if psnr > thresholds.good {
            PsnrBand::Good
        } else if psnr > thresholds.acceptable {
            PsnrBand::Acceptable
        } else {
            PsnrBand::Poor
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PsnrBand::High => "High quality, almost indistinguishable from the original.",
            PsnrBand::Good => "Good quality, minor differences may be noticeable.",
            PsnrBand::Acceptable => "Acceptable quality, noticeable differences.",
            PsnrBand::Poor => "Poor quality, significant degradation.",
        }
    }
}

impl fmt::Display for PsnrBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SsimBand {
    High,
    Good,
    Moderate,
    Poor,
}

impl SsimBand {
    pub fn classify(ssim: f64, thresholds: &SsimThresholds) -> Self {
        if ssim > thresholds.high {
            SsimBand::High
        } else if ssim > thresholds.good {
            SsimBand::Good
        } else if ssim > thresholds.moderate {
            SsimBand::Moderate
        } else {
            SsimBand::Poor
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SsimBand::High => "High quality, minimal degradation.",
            SsimBand::Good => "Good quality, low degradation.",
            SsimBand::Moderate => "Moderate quality, noticeable degradation.",
            SsimBand::Poor => "Poor quality, significant degradation.",
        }
    }
}

impl fmt::Display for SsimBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Maps the pooled scores to their quality bands.
pub fn interpret_metrics(
    psnr: f64,
    ssim: f64,
    psnr_thresholds: &PsnrThresholds,
    ssim_thresholds: &SsimThresholds,
) -> (PsnrBand, SsimBand) {
    (
        PsnrBand::classify(psnr, psnr_thresholds),
        SsimBand::classify(ssim, ssim_thresholds),
    )
}
