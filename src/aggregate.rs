// src/aggregate.rs

use crate::config::MetricsConfig;
use crate::error::{Result, VqError};
use crate::frame::{FramePair, FrameSource, normalize};
use crate::metrics::{MetricSample, evaluate};
use log::{debug, info, warn};

/// Means of one chunk of frame pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkSummary {
    pub index: u64,
    pub frames: usize,
    pub psnr_mean: f64,
    pub ssim_mean: f64,
}

/// Final pooled scores of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateScores {
    pub psnr: f64,
    pub ssim: f64,
    /// Reference frame count used to size the chunk loop.
    pub frame_count: u64,
    /// `ceil(frame_count / chunk_size)`.
    pub chunks_planned: u64,
    /// Chunks that held at least one frame pair; the divisor of both scores.
    pub chunks_evaluated: u64,
    pub frames_evaluated: u64,
}

/// Receives progress events from [`calculate_metrics`].
pub trait MetricsObserver {
    fn run_started(&mut self, _frame_count: u64, _chunks_planned: u64) {}
    fn chunk_finished(&mut self, _summary: &ChunkSummary) {}
    fn stream_exhausted(&mut self, _frames_evaluated: u64) {}
}

/// Ignores every event.
impl MetricsObserver for () {}

/// Forwards progress events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl MetricsObserver for LogObserver {
    fn run_started(&mut self, frame_count: u64, chunks_planned: u64) {
        info!("Processing {} frames in {} chunks", frame_count, chunks_planned);
    }

    fn chunk_finished(&mut self, summary: &ChunkSummary) {
        debug!(
            "Chunk {}: {} frames, mean PSNR {:.4}, mean SSIM {:.6}",
            summary.index, summary.frames, summary.psnr_mean, summary.ssim_mean
        );
    }

    fn stream_exhausted(&mut self, frames_evaluated: u64) {
        info!("Input stream ended after {} frame pairs", frames_evaluated);
    }
}

#[derive(Default)]
struct ChunkAccumulator {
    psnr: Vec<f64>,
    ssim: Vec<f64>,
}

impl ChunkAccumulator {
    fn push(&mut self, sample: MetricSample) {
        self.psnr.push(sample.psnr);
        self.ssim.push(sample.ssim);
    }

    /// `None` when the chunk holds no samples.
    fn summarize(&self, index: u64) -> Option<ChunkSummary> {
        if self.psnr.is_empty() {
            return None;
        }
        Some(ChunkSummary {
            index,
            frames: self.psnr.len(),
            psnr_mean: mean(&self.psnr),
            ssim_mean: mean(&self.ssim),
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Compares two frame streams chunk by chunk and pools the chunk means.
///
/// The loop is sized by the reference stream's frame count and stops early
/// as soon as either stream runs dry. A chunk that received no frame pairs
/// is left out of both the totals and the divisor. Infinite PSNR values
/// (identical frames) propagate unchanged.
pub fn calculate_metrics<R, C, O>(
    pair: &mut FramePair<R, C>,
    config: &MetricsConfig,
    observer: &mut O,
) -> Result<AggregateScores>
where
    R: FrameSource,
    C: FrameSource,
    O: MetricsObserver + ?Sized,
{
    config.validate()?;

    let chunk_size = config.chunk_size as u64;
    let frame_count = pair.frame_count();
    let chunks_planned = frame_count.div_ceil(chunk_size);
    observer.run_started(frame_count, chunks_planned);

    let mut psnr_total = 0.0;
    let mut ssim_total = 0.0;
    let mut chunks_evaluated = 0u64;
    let mut frames_evaluated = 0u64;
    let mut exhausted = false;

    for index in 0..chunks_planned {
        let mut chunk = ChunkAccumulator::default();

        for _ in 0..chunk_size {
            let Some((reference, candidate)) = pair.read_next()? else {
                exhausted = true;
                break;
            };
            let (reference_gray, candidate_gray) = normalize(&reference, &candidate);
            chunk.push(evaluate(&reference_gray, &candidate_gray));
            frames_evaluated += 1;
        }

        match chunk.summarize(index) {
            Some(summary) => {
                psnr_total += summary.psnr_mean;
                ssim_total += summary.ssim_mean;
                chunks_evaluated += 1;
                observer.chunk_finished(&summary);
            }
            None => debug!("Chunk {} received no frame pairs; skipped", index),
        }

        if exhausted {
            observer.stream_exhausted(frames_evaluated);
            break;
        }
    }

    if chunks_evaluated == 0 {
        warn!("No frame pairs evaluated (reported frame count {})", frame_count);
        return Err(VqError::EmptyComparison);
    }

    Ok(AggregateScores {
        psnr: psnr_total / chunks_evaluated as f64,
        ssim: ssim_total / chunks_evaluated as f64,
        frame_count,
        chunks_planned,
        chunks_evaluated,
        frames_evaluated,
    })
}
