//! Frame-by-frame comparison of the captioned output against its source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TestReport {
    pub expected_first: u64,
    pub expected_last: u64,
    pub frames_compared: usize,
    pub changed_frames: Vec<u64>,
    /// Changed frames outside the caption's range.
    pub unexpected: Vec<u64>,
    /// Frames inside the range that show no caption.
    pub missing: Vec<u64>,
    pub overall_status: TestStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TestStatus {
    Pass,
    Fail,
}

/// Per-frame difference thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DiffThresholds {
    /// Largest per-channel difference still counted as equal.
    pub channel_tolerance: u8,
    /// Pixels that must differ before a frame counts as changed.
    pub min_changed_pixels: usize,
}

impl Default for DiffThresholds {
    fn default() -> Self {
        Self {
            channel_tolerance: 8,
            min_changed_pixels: 20,
        }
    }
}

/// Number of pixels whose channels differ by more than the tolerance.
pub fn changed_pixels(a: &RgbImage, b: &RgbImage, tolerance: u8) -> usize {
    if a.dimensions() != b.dimensions() {
        let area = |img: &RgbImage| img.width() as usize * img.height() as usize;
        return area(a).max(area(b));
    }
    a.pixels()
        .zip(b.pixels())
        .filter(|(pa, pb)| {
            pa.0.iter()
                .zip(pb.0.iter())
                .any(|(ca, cb)| ca.abs_diff(*cb) > tolerance)
        })
        .count()
}

/// Zero-based indices of frames that differ between the two sequences.
pub fn changed_frames(
    source: &[PathBuf],
    rendered: &[PathBuf],
    thresholds: DiffThresholds,
) -> Result<Vec<u64>> {
    if source.len() != rendered.len() {
        anyhow::bail!(
            "frame count mismatch: source has {}, output has {}",
            source.len(),
            rendered.len()
        );
    }

    let mut changed = Vec::new();
    for (index, (a, b)) in source.iter().zip(rendered).enumerate() {
        let a = load(a)?;
        let b = load(b)?;
        let pixels = changed_pixels(&a, &b, thresholds.channel_tolerance);
        if pixels >= thresholds.min_changed_pixels {
            tracing::debug!(frame = index, pixels, "Frame differs");
            changed.push(index as u64);
        }
    }
    Ok(changed)
}

fn load(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("Failed to decode {}", path.display()))?
        .to_rgb8())
}

/// Compare observed changes with the inclusive range `first..=last`.
pub fn evaluate(changed: Vec<u64>, frames_compared: usize, first: u64, last: u64) -> TestReport {
    let unexpected: Vec<u64> = changed
        .iter()
        .copied()
        .filter(|f| *f < first || *f > last)
        .collect();
    let missing: Vec<u64> = (first..=last).filter(|f| !changed.contains(f)).collect();
    let overall_status = if unexpected.is_empty() && missing.is_empty() {
        TestStatus::Pass
    } else {
        TestStatus::Fail
    };

    TestReport {
        expected_first: first,
        expected_last: last,
        frames_compared,
        changed_frames: changed,
        unexpected,
        missing,
        overall_status,
    }
}

pub fn write_report(path: &Path, report: &TestReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Test report saved to: {}", path.display());
    tracing::info!("Overall status: {:?}", report.overall_status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_changed_pixels_respects_tolerance() {
        let a = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let mut b = a.clone();
        b.put_pixel(0, 0, Rgb([105, 100, 100]));
        b.put_pixel(1, 1, Rgb([255, 255, 255]));
        assert_eq!(changed_pixels(&a, &b, 8), 1);
        assert_eq!(changed_pixels(&a, &b, 0), 2);
    }

    #[test]
    fn test_size_mismatch_counts_everything() {
        let a = RgbImage::new(4, 4);
        let b = RgbImage::new(2, 2);
        assert_eq!(changed_pixels(&a, &b, 8), 16);
    }

    #[test]
    fn test_evaluate_exact_range_passes() {
        let report = evaluate((48..=96).collect(), 240, 48, 96);
        assert_eq!(report.overall_status, TestStatus::Pass);
    }

    #[test]
    fn test_evaluate_flags_leaks_and_gaps() {
        let mut changed: Vec<u64> = (49..=97).collect();
        changed.retain(|f| *f != 60);
        let report = evaluate(changed, 240, 48, 96);
        assert_eq!(report.overall_status, TestStatus::Fail);
        assert_eq!(report.unexpected, vec![97]);
        assert_eq!(report.missing, vec![48, 60]);
    }
}
