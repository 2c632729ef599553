// src/frame.rs

use crate::error::Result;
use image::{GrayImage, Luma, RgbImage, imageops, imageops::FilterType};
use log::debug;

/// A decoded video frame with packed 8-bit RGB samples.
pub type Frame = RgbImage;

/// A sequential source of decoded frames.
pub trait FrameSource {
    /// Returns the next frame, or `None` once the stream is exhausted.
    fn read_next(&mut self) -> Result<Option<Frame>>;

    /// Best-effort total frame count. May be approximate, or 0 when the
    /// container does not say.
    fn frame_count(&self) -> u64;
}

/// Reference and candidate streams read in lockstep.
pub struct FramePair<R, C> {
    reference: R,
    candidate: C,
}

impl<R: FrameSource, C: FrameSource> FramePair<R, C> {
    pub fn new(reference: R, candidate: C) -> Self {
        Self {
            reference,
            candidate,
        }
    }

    /// Reads one frame from each stream. Both streams advance even when
    /// only one of them still has data.
    pub fn read_next(&mut self) -> Result<Option<(Frame, Frame)>> {
        let reference = self.reference.read_next()?;
        let candidate = self.candidate.read_next()?;
        match (reference, candidate) {
            (Some(r), Some(c)) => Ok(Some((r, c))),
            (r, c) => {
                debug!(
                    "End of stream (reference exhausted: {}, candidate exhausted: {})",
                    r.is_none(),
                    c.is_none()
                );
                Ok(None)
            }
        }
    }

    /// Frame count of the reference stream; it sizes the chunk loop.
    pub fn frame_count(&self) -> u64 {
        self.reference.frame_count()
    }
}

// BT.601 luma weights in 14-bit fixed point.
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// Converts an RGB frame to single-channel luma using BT.601 weighting.
pub fn to_luma(frame: &Frame) -> GrayImage {
    let mut gray = GrayImage::new(frame.width(), frame.height());
    for (dst, src) in gray.pixels_mut().zip(frame.pixels()) {
        let [r, g, b] = src.0;
        let y = (LUMA_R * r as u32 + LUMA_G * g as u32 + LUMA_B * b as u32
            + (1 << (LUMA_SHIFT - 1)))
            >> LUMA_SHIFT;
        *dst = Luma([y as u8]);
    }
    gray
}

/// Brings a frame pair to a common geometry and colour model.
///
/// The candidate is resampled to the reference's exact width and height
/// (bilinear, no aspect-ratio correction), then both frames are reduced to
/// luma.
pub fn normalize(reference: &Frame, candidate: &Frame) -> (GrayImage, GrayImage) {
    let (width, height) = reference.dimensions();
    let candidate_gray = if candidate.dimensions() == (width, height) {
        to_luma(candidate)
    } else {
        let resized = imageops::resize(candidate, width, height, FilterType::Triangle);
        to_luma(&resized)
    };
    (to_luma(reference), candidate_gray)
}
