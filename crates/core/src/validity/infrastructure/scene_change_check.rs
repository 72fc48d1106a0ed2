//! Scene-cut detector based on structural similarity between a frame and
//! its immediate predecessor.
//!
//! Both frames are area-downscaled to a small square, then compared with
//! mean SSIM (7x7 uniform window, sample covariance, data range 255),
//! averaged over channels. A dissimilarity `1 - ssim` above the threshold
//! rejects the frame.

use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::shared::constants::{DEFAULT_CHANGE_SCENE_THRESHOLD, SCENE_COMPARE_SIZE};
use crate::shared::frame::Frame;
use crate::validity::domain::frame_check::FrameCheck;
use crate::validity::domain::verdict::Verdict;

pub const SCENE_CHANGE_REASON: &str = "large difference with previous frame, probably another scene";

const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

pub struct SceneChangeCheck {
    threshold: f64,
    size: usize,
}

impl SceneChangeCheck {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            size: SCENE_COMPARE_SIZE,
        }
    }

    /// Mean SSIM between two frames after downscaling.
    pub fn similarity(&self, a: &Frame, b: &Frame) -> Result<f64, Box<dyn std::error::Error>> {
        if a.channels() != b.channels() {
            return Err(format!(
                "cannot compare {}-channel frame with {}-channel frame",
                a.channels(),
                b.channels()
            )
            .into());
        }
        let a = area_resize(a, self.size);
        let b = area_resize(b, self.size);
        Ok(mean_ssim(&a, &b))
    }
}

impl Default for SceneChangeCheck {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_SCENE_THRESHOLD)
    }
}

impl FrameCheck for SceneChangeCheck {
    fn check(
        &mut self,
        frame: &Frame,
        previous: Option<&Frame>,
    ) -> Result<Verdict, Box<dyn std::error::Error>> {
        let Some(previous) = previous else {
            return Ok(Verdict::Valid);
        };
        let score = self.similarity(frame, previous)?;
        if 1.0 - score > self.threshold {
            log::debug!(
                "Frame {}: similarity {score:.3} to previous frame",
                frame.index()
            );
            Ok(Verdict::invalid(SCENE_CHANGE_REASON))
        } else {
            Ok(Verdict::Valid)
        }
    }
}

/// Box-filter downscale to `size` x `size`, averaging every source pixel
/// that falls into each destination cell. Sources smaller than the target
/// repeat pixels instead.
fn area_resize(frame: &Frame, size: usize) -> Array3<f64> {
    let src = frame.as_ndarray();
    let (src_h, src_w, channels) = src.dim();
    let mut out = Array3::<f64>::zeros((size, size, channels));
    if src_h == 0 || src_w == 0 {
        return out;
    }

    for oy in 0..size {
        let (y0, y1) = cell_span(oy, size, src_h);
        for ox in 0..size {
            let (x0, x1) = cell_span(ox, size, src_w);
            let count = ((y1 - y0) * (x1 - x0)) as f64;
            for c in 0..channels {
                let mut sum = 0.0;
                for y in y0..y1 {
                    for x in x0..x1 {
                        sum += src[[y, x, c]] as f64;
                    }
                }
                out[[oy, ox, c]] = sum / count;
            }
        }
    }
    out
}

/// Source range covered by destination cell `i`, never empty.
fn cell_span(i: usize, dst: usize, src: usize) -> (usize, usize) {
    let start = i * src / dst;
    let end = ((i + 1) * src).div_ceil(dst).max(start + 1).min(src);
    (start.min(src - 1), end)
}

fn mean_ssim(a: &Array3<f64>, b: &Array3<f64>) -> f64 {
    let channels = a.len_of(Axis(2));
    if channels == 0 {
        return 1.0;
    }
    let total: f64 = (0..channels)
        .map(|c| channel_ssim(a.index_axis(Axis(2), c), b.index_axis(Axis(2), c)))
        .sum();
    total / channels as f64
}

/// Mean SSIM over every full 7x7 window of one channel.
fn channel_ssim(x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>) -> f64 {
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);
    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);

    let xy: Array2<f64> = &x * &y;
    let xx: Array2<f64> = &x * &x;
    let yy: Array2<f64> = &y * &y;

    let mut sum = 0.0;
    let mut windows = 0usize;
    let shape = (WINDOW, WINDOW);
    for ((((wx, wy), wxx), wyy), wxy) in x
        .windows(shape)
        .into_iter()
        .zip(y.windows(shape))
        .zip(xx.windows(shape))
        .zip(yy.windows(shape))
        .zip(xy.windows(shape))
    {
        let ux = wx.sum() / n;
        let uy = wy.sum() / n;
        let vx = cov_norm * (wxx.sum() / n - ux * ux);
        let vy = cov_norm * (wyy.sum() / n - uy * uy);
        let vxy = cov_norm * (wxy.sum() / n - ux * uy);

        let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
        let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
        sum += numerator / denominator;
        windows += 1;
    }

    if windows == 0 {
        1.0
    } else {
        sum / windows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_frame(index: usize, w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 3, index)
    }

    /// Vertical stripes alternating every `period` columns.
    fn striped_frame(index: usize, w: u32, h: u32, period: u32, invert: bool) -> Frame {
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for _y in 0..h {
            for x in 0..w {
                let on = ((x / period) % 2 == 0) != invert;
                let v = if on { 230 } else { 20 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(data, w, h, 3, index)
    }

    #[test]
    fn test_identical_frames_have_similarity_one() {
        let check = SceneChangeCheck::default();
        let a = striped_frame(0, 200, 150, 10, false);
        assert_relative_eq!(check.similarity(&a, &a).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_first_frame_without_previous_is_valid() {
        let mut check = SceneChangeCheck::default();
        let verdict = check.check(&flat_frame(0, 64, 64, 0), None).unwrap();
        assert_eq!(verdict, Verdict::Valid);
    }

    #[test]
    fn test_small_brightness_change_is_valid() {
        let mut check = SceneChangeCheck::default();
        let prev = striped_frame(0, 200, 150, 10, false);
        let data: Vec<u8> = prev.data().iter().map(|v| v.saturating_add(3)).collect();
        let next = Frame::new(data, 200, 150, 3, 1);
        assert_eq!(check.check(&next, Some(&prev)).unwrap(), Verdict::Valid);
    }

    #[test]
    fn test_inverted_pattern_is_scene_change() {
        let mut check = SceneChangeCheck::default();
        let prev = striped_frame(0, 200, 200, 10, false);
        let next = striped_frame(1, 200, 200, 10, true);
        assert_eq!(
            check.check(&next, Some(&prev)).unwrap(),
            Verdict::invalid(SCENE_CHANGE_REASON)
        );
    }

    #[test]
    fn test_threshold_one_accepts_any_change() {
        let mut check = SceneChangeCheck::new(1.0);
        let prev = striped_frame(0, 200, 200, 10, false);
        let next = striped_frame(1, 200, 200, 10, true);
        assert_eq!(check.check(&next, Some(&prev)).unwrap(), Verdict::Valid);
    }

    #[test]
    fn test_channel_mismatch_is_error() {
        let check = SceneChangeCheck::default();
        let rgb = flat_frame(0, 4, 4, 0);
        let gray = Frame::new(vec![0u8; 16], 4, 4, 1, 1);
        assert!(check.similarity(&rgb, &gray).is_err());
    }

    #[test]
    fn test_area_resize_averages_cells() {
        // 4x2 frame: left half 0, right half 200 -> 2x2 target keeps halves
        let mut data = Vec::new();
        for _y in 0..2 {
            for x in 0..4 {
                let v = if x < 2 { 0 } else { 200 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let frame = Frame::new(data, 4, 2, 3, 0);
        let out = area_resize(&frame, 2);
        assert_relative_eq!(out[[0, 0, 0]], 0.0);
        assert_relative_eq!(out[[1, 1, 2]], 200.0);
    }

    #[test]
    fn test_area_resize_upscales_small_frames() {
        let frame = flat_frame(0, 3, 3, 90);
        let out = area_resize(&frame, 10);
        assert_eq!(out.dim(), (10, 10, 3));
        assert!(out.iter().all(|&v| (v - 90.0).abs() < 1e-9));
    }

    #[test]
    fn test_cell_span_never_empty() {
        for i in 0..100 {
            let (start, end) = cell_span(i, 100, 37);
            assert!(start < end, "cell {i}: {start}..{end}");
            assert!(end <= 37);
        }
    }
}
