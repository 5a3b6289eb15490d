//! Per-pixel comparison between golden and candidate captures

use image::{Rgba, RgbaImage};
use snapdiff_core::{CapturedImage, DiffResult};
use tracing::debug;

/// Knobs for one comparison
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Per-channel color distance above which a pixel counts as differing
    pub pixel_threshold: u8,
    /// Fraction of differing pixels tolerated before the verdict flips
    pub tolerance: f64,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            pixel_threshold: 10,
            tolerance: 0.0,
        }
    }
}

/// Compare a candidate capture against its golden image.
///
/// A dimension mismatch is itself a failing result with the maximum score —
/// a resized layout is a legitimate regression to report — and no pixel
/// walk is attempted. Otherwise the score is the fraction of pixels whose
/// largest channel difference exceeds the per-pixel threshold, and the
/// verdict passes iff that fraction is within the tolerance.
pub fn compare(
    golden: &CapturedImage,
    candidate: &CapturedImage,
    options: &DiffOptions,
) -> DiffResult {
    if golden.width() != candidate.width() || golden.height() != candidate.height() {
        debug!(
            "dimension mismatch for {}/{}: golden {}x{}, candidate {}x{}",
            candidate.test_id,
            candidate.label,
            golden.width(),
            golden.height(),
            candidate.width(),
            candidate.height()
        );
        return DiffResult {
            test_id: candidate.test_id.clone(),
            label: candidate.label.clone(),
            passed: false,
            score: 1.0,
            differing_pixels: 0,
            total_pixels: 0,
            dimension_mismatch: true,
            diff_image: None,
        };
    }

    let mut differing: u64 = 0;
    for (golden_px, candidate_px) in golden.image.pixels().zip(candidate.image.pixels()) {
        if max_channel_diff(golden_px, candidate_px) > options.pixel_threshold {
            differing += 1;
        }
    }

    let total = u64::from(golden.width()) * u64::from(golden.height());
    let score = if total == 0 {
        0.0
    } else {
        differing as f64 / total as f64
    };
    let passed = score <= options.tolerance;

    let diff_image = if passed {
        None
    } else {
        Some(render_diff(
            &golden.image,
            &candidate.image,
            options.pixel_threshold,
        ))
    };

    debug!(
        "compared {}/{}: {}/{} pixels differ (score {:.6}, tolerance {:.6})",
        candidate.test_id, candidate.label, differing, total, score, options.tolerance
    );

    DiffResult {
        test_id: candidate.test_id.clone(),
        label: candidate.label.clone(),
        passed,
        score,
        differing_pixels: differing,
        total_pixels: total,
        dimension_mismatch: false,
        diff_image,
    }
}

fn max_channel_diff(a: &Rgba<u8>, b: &Rgba<u8>) -> u8 {
    let mut max = 0u8;
    for channel in 0..4 {
        let diff = i16::from(a.0[channel]) - i16::from(b.0[channel]);
        let abs = diff.unsigned_abs() as u8;
        if abs > max {
            max = abs;
        }
    }
    max
}

/// Differing pixels rendered red over a dimmed grayscale of the candidate,
/// for human inspection of failures
fn render_diff(golden: &RgbaImage, candidate: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut out = RgbaImage::new(candidate.width(), candidate.height());
    for (x, y, out_px) in out.enumerate_pixels_mut() {
        let golden_px = golden.get_pixel(x, y);
        let candidate_px = candidate.get_pixel(x, y);
        *out_px = if max_channel_diff(golden_px, candidate_px) > threshold {
            Rgba([255, 0, 0, 255])
        } else {
            let luma = (u16::from(candidate_px.0[0])
                + u16::from(candidate_px.0[1])
                + u16::from(candidate_px.0[2]))
                / 3;
            let dimmed = (luma / 3) as u8;
            Rgba([dimmed, dimmed, dimmed, 255])
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn capture(color: [u8; 4], width: u32, height: u32) -> CapturedImage {
        CapturedImage::new(
            "suite/case",
            "default",
            RgbaImage::from_pixel(width, height, Rgba(color)),
        )
    }

    #[test]
    fn test_identical_images_pass_with_zero_score() {
        let golden = capture([100, 150, 200, 255], 10, 10);
        let candidate = capture([100, 150, 200, 255], 10, 10);
        let result = compare(&golden, &candidate, &DiffOptions::default());
        assert!(result.passed);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.differing_pixels, 0);
        assert!(result.diff_image.is_none());
        assert!(!result.dimension_mismatch);
    }

    #[test]
    fn test_comparison_is_deterministic() {
        let golden = capture([1, 2, 3, 255], 6, 6);
        let mut image = RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 255]));
        image.put_pixel(3, 3, Rgba([250, 2, 3, 255]));
        let candidate = CapturedImage::new("suite/case", "default", image);

        let first = compare(&golden, &candidate, &DiffOptions::default());
        let second = compare(&golden, &candidate, &DiffOptions::default());
        assert_eq!(first.score, second.score);
        assert_eq!(first.passed, second.passed);
        assert_eq!(first.differing_pixels, second.differing_pixels);
    }

    #[test]
    fn test_dimension_mismatch_fails_with_max_score() {
        let golden = capture([0, 0, 0, 255], 100, 100);
        let candidate = capture([0, 0, 0, 255], 200, 200);
        let result = compare(&golden, &candidate, &DiffOptions::default());
        assert!(!result.passed);
        assert_eq!(result.score, 1.0);
        assert!(result.dimension_mismatch);
        assert!(result.diff_image.is_none());
        assert_eq!(result.differing_pixels, 0);
    }

    #[test]
    fn test_single_changed_pixel_fails_at_zero_tolerance() {
        let golden = capture([10, 10, 10, 255], 10, 10);
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([10, 10, 10, 255]));
        image.put_pixel(5, 5, Rgba([200, 10, 10, 255]));
        let candidate = CapturedImage::new("suite/case", "default", image);

        let result = compare(&golden, &candidate, &DiffOptions::default());
        assert!(!result.passed);
        assert_eq!(result.differing_pixels, 1);
        assert_eq!(result.score, 0.01);
    }

    #[test]
    fn test_tolerance_absorbs_small_divergence() {
        let golden = capture([10, 10, 10, 255], 10, 10);
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([10, 10, 10, 255]));
        image.put_pixel(5, 5, Rgba([200, 10, 10, 255]));
        let candidate = CapturedImage::new("suite/case", "default", image);

        let options = DiffOptions {
            tolerance: 0.02,
            ..DiffOptions::default()
        };
        let result = compare(&golden, &candidate, &options);
        assert!(result.passed);
        assert!(result.diff_image.is_none());
    }

    #[test]
    fn test_pixel_threshold_ignores_subtle_noise() {
        let golden = capture([100, 100, 100, 255], 4, 4);
        let candidate = capture([105, 100, 100, 255], 4, 4);
        let result = compare(&golden, &candidate, &DiffOptions::default());
        assert!(result.passed);

        let strict = DiffOptions {
            pixel_threshold: 2,
            ..DiffOptions::default()
        };
        let result = compare(&golden, &candidate, &strict);
        assert!(!result.passed);
        assert_eq!(result.differing_pixels, 16);
    }

    #[test]
    fn test_diff_image_marks_changed_pixels_red() {
        let golden = capture([10, 10, 10, 255], 4, 4);
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([10, 10, 10, 255]));
        image.put_pixel(2, 1, Rgba([250, 10, 10, 255]));
        let candidate = CapturedImage::new("suite/case", "default", image);

        let result = compare(&golden, &candidate, &DiffOptions::default());
        let diff = result.diff_image.expect("diff image on failure");
        assert_eq!(diff.get_pixel(2, 1), &Rgba([255, 0, 0, 255]));
        // unchanged pixels are dimmed, never red
        assert_ne!(diff.get_pixel(0, 0).0[0], 255);
        assert_eq!(diff.get_pixel(0, 0).0[1], diff.get_pixel(0, 0).0[2]);
    }
}
