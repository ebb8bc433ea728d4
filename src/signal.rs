//! Depth Signal Module.
//!
//! Turns raw joint positions into the normalized squat-depth signal that
//! drives the phase tracker:
//! - Hip height measured in shin lengths (camera-distance invariant)
//! - Normalized against a standing baseline captured on the first valid frame
//! - Smoothed with a fixed-size moving average
//!
//! Convention: 1.0 is standing, smaller is deeper, 0.0 puts the hips at
//! ankle height.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::metrics::{midpoint, Point};
use crate::types::{Joint, PoseFrame};

/// Configuration for depth estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    /// Moving average window in frames.
    pub window_size: usize,
    /// Shin spans (ankle y - knee y) below this are ignored as degenerate.
    pub min_shin_span: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            window_size: 5,      // ~165ms at 30fps
            min_shin_span: 1e-4, // normalized image units
        }
    }
}

/// Standing reference geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    /// Hip-to-ankle height over shin length while standing.
    pub hip_ankle_ratio: f64,
    pub captured_at_ms: u64,
}

/// One depth reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSample {
    /// Unsmoothed normalized depth for this frame.
    pub raw: f64,
    /// Moving average over the recent window.
    pub smoothed: f64,
}

/// Stateful depth estimator with a ring-buffer moving average.
pub struct DepthEstimator {
    config: DepthConfig,

    // Circular buffer of raw depths
    buffer: Vec<f64>,
    buffer_index: usize,
    buffer_filled: bool,

    baseline: Option<Baseline>,
}

impl DepthEstimator {
    pub fn new(config: DepthConfig) -> Self {
        let window_size = config.window_size.max(1);
        Self {
            config,
            buffer: vec![0.0; window_size],
            buffer_index: 0,
            buffer_filled: false,
            baseline: None,
        }
    }

    /// Process a validated frame.
    ///
    /// Returns `Ok(None)` when the frame carries no usable depth (degenerate
    /// leg geometry, or a baseline that could not be captured yet).
    pub fn update(&mut self, frame: &PoseFrame) -> Result<Option<DepthSample>> {
        let ratio = match self.hip_ankle_ratio(frame)? {
            Some(ratio) => ratio,
            None => return Ok(None),
        };

        let baseline = match self.baseline {
            Some(baseline) => baseline,
            None => {
                if ratio <= 0.0 {
                    return Ok(None);
                }
                let baseline = Baseline {
                    hip_ankle_ratio: ratio,
                    captured_at_ms: frame.timestamp_ms,
                };
                debug!(
                    timestamp_ms = frame.timestamp_ms,
                    hip_ankle_ratio = ratio,
                    "captured standing baseline"
                );
                self.baseline = Some(baseline);
                baseline
            }
        };

        let raw = (ratio / baseline.hip_ankle_ratio).clamp(0.0, 1.0);
        self.push(raw);
        let sample = DepthSample {
            raw,
            smoothed: self.mean(),
        };
        Ok(Some(sample))
    }

    fn hip_ankle_ratio(&self, frame: &PoseFrame) -> Result<Option<f64>> {
        let hips: Point = midpoint(frame, Joint::LeftHip, Joint::RightHip)?;
        let knees = midpoint(frame, Joint::LeftKnee, Joint::RightKnee)?;
        let ankles = midpoint(frame, Joint::LeftAnkle, Joint::RightAnkle)?;

        let shin = ankles.y - knees.y;
        if shin < self.config.min_shin_span {
            return Ok(None);
        }
        Ok(Some((ankles.y - hips.y) / shin))
    }

    fn push(&mut self, value: f64) {
        self.buffer[self.buffer_index] = value;
        self.buffer_index = (self.buffer_index + 1) % self.buffer.len();
        if self.buffer_index == 0 {
            self.buffer_filled = true;
        }
    }

    fn mean(&self) -> f64 {
        let count = if self.buffer_filled {
            self.buffer.len()
        } else {
            self.buffer_index
        };
        if count == 0 {
            return 1.0;
        }
        self.buffer[..count].iter().sum::<f64>() / count as f64
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// Drop the baseline and the smoothing history.
    pub fn reset(&mut self) {
        self.buffer.iter_mut().for_each(|v| *v = 0.0);
        self.buffer_index = 0;
        self.buffer_filled = false;
        self.baseline = None;
    }
}

impl Default for DepthEstimator {
    fn default() -> Self {
        Self::new(DepthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{squat_frame, ANKLE_Y};
    use crate::types::Landmark;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_baseline_captured_on_first_frame() {
        let mut estimator = DepthEstimator::default();
        assert!(!estimator.is_calibrated());

        let sample = estimator.update(&squat_frame(100, 1.0)).unwrap().unwrap();
        assert!(estimator.is_calibrated());
        assert_eq!(estimator.baseline().unwrap().captured_at_ms, 100);
        assert_approx_eq!(sample.raw, 1.0, 1e-9);
        assert_approx_eq!(sample.smoothed, 1.0, 1e-9);
    }

    #[test]
    fn test_raw_depth_tracks_hip_height() {
        let mut estimator = DepthEstimator::default();
        estimator.update(&squat_frame(0, 1.0)).unwrap();

        for &depth in &[0.8, 0.5, 0.25] {
            let sample = estimator.update(&squat_frame(33, depth)).unwrap().unwrap();
            assert_approx_eq!(sample.raw, depth, 1e-5);
        }
    }

    #[test]
    fn test_moving_average_window() {
        let mut estimator = DepthEstimator::default();
        estimator.update(&squat_frame(0, 1.0)).unwrap();
        let sample = estimator.update(&squat_frame(33, 0.5)).unwrap().unwrap();
        // Two samples in the window so far.
        assert_approx_eq!(sample.smoothed, 0.75, 1e-5);

        let mut last = sample;
        for i in 0..5 {
            last = estimator.update(&squat_frame(66 + i * 33, 0.5)).unwrap().unwrap();
        }
        // Window of 5 is now entirely 0.5.
        assert_approx_eq!(last.smoothed, 0.5, 1e-5);
    }

    #[test]
    fn test_depth_clamped() {
        let mut estimator = DepthEstimator::default();
        estimator.update(&squat_frame(0, 0.9)).unwrap();
        // Standing taller than the baseline still reads as 1.0.
        let sample = estimator.update(&squat_frame(33, 1.0)).unwrap().unwrap();
        assert_eq!(sample.raw, 1.0);
    }

    #[test]
    fn test_degenerate_shin_skipped() {
        let mut estimator = DepthEstimator::default();
        let frame = squat_frame(0, 1.0)
            .with_joint(Joint::LeftKnee, Landmark::new(0.45, ANKLE_Y, 0.0, 0.95))
            .with_joint(Joint::RightKnee, Landmark::new(0.55, ANKLE_Y, 0.0, 0.95));
        assert!(estimator.update(&frame).unwrap().is_none());
        assert!(!estimator.is_calibrated());
    }

    #[test]
    fn test_reset_clears_history() {
        let mut estimator = DepthEstimator::default();
        estimator.update(&squat_frame(0, 1.0)).unwrap();
        estimator.update(&squat_frame(33, 0.3)).unwrap();
        estimator.reset();
        assert!(!estimator.is_calibrated());
        assert!(estimator.baseline().is_none());

        let sample = estimator.update(&squat_frame(66, 1.0)).unwrap().unwrap();
        assert_approx_eq!(sample.smoothed, 1.0, 1e-9);
    }
}
