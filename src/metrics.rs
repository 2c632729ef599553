// src/metrics.rs

use image::GrayImage;

// --- Constants ---

const MAX_VALUE: f64 = 255.0;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const C1: f64 = (K1 * MAX_VALUE) * (K1 * MAX_VALUE);
const C2: f64 = (K2 * MAX_VALUE) * (K2 * MAX_VALUE);

/// Side of the square uniform SSIM window.
const SSIM_WINDOW: usize = 7;

// --- Data Structures ---

/// PSNR and SSIM of a single normalized frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample {
    pub psnr: f64,
    pub ssim: f64,
}

/// Computes both metrics for two equally sized luma frames.
pub fn evaluate(reference: &GrayImage, candidate: &GrayImage) -> MetricSample {
    MetricSample {
        psnr: psnr(reference, candidate),
        ssim: ssim(reference, candidate),
    }
}

// --- PSNR ---

/// Peak signal-to-noise ratio in dB. Identical frames yield `+inf`.
pub fn psnr(reference: &GrayImage, candidate: &GrayImage) -> f64 {
    debug_assert_eq!(reference.dimensions(), candidate.dimensions());

    let count = reference.as_raw().len();
    let squared_error: u64 = reference
        .as_raw()
        .iter()
        .zip(candidate.as_raw())
        .map(|(&a, &b)| {
            let d = a.abs_diff(b) as u64;
            d * d
        })
        .sum();

    if squared_error == 0 || count == 0 {
        return f64::INFINITY;
    }

    let mse = squared_error as f64 / count as f64;
    10.0 * (MAX_VALUE * MAX_VALUE / mse).log10()
}

// --- SSIM ---

/// Raw moments of one window, kept as exact integers.
#[derive(Debug, Clone, Copy, Default)]
struct WindowSums {
    x: u64,
    y: u64,
    xx: u64,
    yy: u64,
    xy: u64,
}

impl WindowSums {
    fn pixel(a: u8, b: u8) -> Self {
        let (a, b) = (a as u64, b as u64);
        Self {
            x: a,
            y: b,
            xx: a * a,
            yy: b * b,
            xy: a * b,
        }
    }

    fn add(&mut self, other: &Self) {
        self.x += other.x;
        self.y += other.y;
        self.xx += other.xx;
        self.yy += other.yy;
        self.xy += other.xy;
    }

    fn sub(&mut self, other: &Self) {
        self.x -= other.x;
        self.y -= other.y;
        self.xx -= other.xx;
        self.yy -= other.yy;
        self.xy -= other.xy;
    }

    /// SSIM of the window covering `n` pixels, using sample (n - 1) variance.
    fn ssim(&self, n: u64) -> f64 {
        let nf = n as f64;
        let mean_x = self.x as f64 / nf;
        let mean_y = self.y as f64 / nf;

        // n * sum(x^2) - sum(x)^2 stays exact in integer arithmetic.
        let var_x = (n * self.xx - self.x * self.x) as f64;
        let var_y = (n * self.yy - self.y * self.y) as f64;
        let cov_xy = (n as i128 * self.xy as i128 - self.x as i128 * self.y as i128) as f64;
        let norm = if n > 1 { nf * (nf - 1.0) } else { 1.0 };
        let (var_x, var_y, cov_xy) = (var_x / norm, var_y / norm, cov_xy / norm);

        let numerator = (2.0 * mean_x * mean_y + C1) * (2.0 * cov_xy + C2);
        let denominator = (mean_x * mean_x + mean_y * mean_y + C1) * (var_x + var_y + C2);
        numerator / denominator
    }
}

/// Mean structural similarity over all 7x7 windows that fit inside the frame.
///
/// Frames narrower or shorter than the window are scored as one global window.
pub fn ssim(reference: &GrayImage, candidate: &GrayImage) -> f64 {
    debug_assert_eq!(reference.dimensions(), candidate.dimensions());

    let width = reference.width() as usize;
    let height = reference.height() as usize;
    let a = reference.as_raw();
    let b = candidate.as_raw();

    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return global_ssim(a, b);
    }

    // Per-column sums over the current band of SSIM_WINDOW rows.
    let mut columns = vec![WindowSums::default(); width];
    let n = (SSIM_WINDOW * SSIM_WINDOW) as u64;
    let mut total = 0.0;
    let mut windows = 0u64;

    for y in 0..height {
        let row = y * width;
        for (x, column) in columns.iter_mut().enumerate() {
            column.add(&WindowSums::pixel(a[row + x], b[row + x]));
        }
        if y >= SSIM_WINDOW {
            let old = (y - SSIM_WINDOW) * width;
            for (x, column) in columns.iter_mut().enumerate() {
                column.sub(&WindowSums::pixel(a[old + x], b[old + x]));
            }
        }
        if y + 1 < SSIM_WINDOW {
            continue;
        }

        let mut window = WindowSums::default();
        for column in &columns[..SSIM_WINDOW] {
            window.add(column);
        }
        for x in 0..=(width - SSIM_WINDOW) {
            total += window.ssim(n);
            windows += 1;
            if x + SSIM_WINDOW < width {
                window.add(&columns[x + SSIM_WINDOW]);
                window.sub(&columns[x]);
            }
        }
    }

    total / windows as f64
}

fn global_ssim(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() {
        return 1.0;
    }
    let mut sums = WindowSums::default();
    for (&pa, &pb) in a.iter().zip(b) {
        sums.add(&WindowSums::pixel(pa, pb));
    }
    sums.ssim(a.len() as u64)
}
