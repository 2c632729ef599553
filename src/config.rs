// src/config.rs

use crate::error::{Result, VqError};
use serde::Serialize;

/// Frames per chunk when nothing else is requested.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Lower bounds (exclusive) of the PSNR bands, in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PsnrThresholds {
    pub high: f64,
    pub good: f64,
    pub acceptable: f64,
}

impl Default for PsnrThresholds {
    fn default() -> Self {
        Self {
            high: 40.0,
            good: 30.0,
            acceptable: 20.0,
        }
    }
}

/// Lower bounds (exclusive) of the SSIM bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SsimThresholds {
    pub high: f64,
    pub good: f64,
    pub moderate: f64,
}

impl Default for SsimThresholds {
    fn default() -> Self {
        Self {
            high: 0.95,
            good: 0.90,
            moderate: 0.80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsConfig {
    pub chunk_size: usize,
    pub psnr: PsnrThresholds,
    pub ssim: SsimThresholds,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            psnr: PsnrThresholds::default(),
            ssim: SsimThresholds::default(),
        }
    }
}

impl MetricsConfig {
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Rejects settings the aggregator and interpreter cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(VqError::Config("chunk size must be at least 1".to_string()));
        }
        let p = &self.psnr;
        if !(p.high >= p.good && p.good >= p.acceptable) {
            return Err(VqError::Config(format!(
                "PSNR thresholds must be descending (high {}, good {}, acceptable {})",
                p.high, p.good, p.acceptable
            )));
        }
        let s = &self.ssim;
        if !(s.high >= s.good && s.good >= s.moderate) {
            return Err(VqError::Config(format!(
                "SSIM thresholds must be descending (high {}, good {}, moderate {})",
                s.high, s.good, s.moderate
            )));
        }
        Ok(())
    }
}
