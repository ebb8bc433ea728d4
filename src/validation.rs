//! Landmark Validation Module.
//!
//! Gatekeeper in front of every other stage. A frame is only scored when
//! every joint the exercise needs is present and confidently tracked.
//!
//! Short dropouts are common (a hand sweeps past a knee, the model blinks
//! for a frame), so missing joints are debounced: the first few bad frames
//! are reported as `Occluded` and simply skipped, and only a sustained run
//! of bad frames is escalated to `Lost`.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{Joint, PoseFrame};

/// Message shown while tracking is lost.
pub const TRACKING_LOST_MESSAGE: &str = "Tracking lost. Step back so your whole body is in view";

/// Configuration for landmark validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum visibility for a joint to count as tracked (0-1).
    pub min_landmark_confidence: f32,
    /// Consecutive bad frames before tracking is declared lost.
    pub tracking_loss_frames: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_landmark_confidence: 0.7,
            tracking_loss_frames: 3, // ~100ms at 30fps
        }
    }
}

/// Tracking status of a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// All required joints tracked.
    Valid,
    /// Some joints missing, still inside the debounce window.
    Occluded,
    /// Joints missing for too many consecutive frames.
    Lost,
}

/// Outcome of validating one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub status: FrameStatus,
    /// Human readable explanation when the frame is not valid.
    pub reason: Option<String>,
    /// Mean visibility of the required joints, 0-100. Absent joints count as 0.
    pub confidence: f64,
    pub missing: Vec<Joint>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.status == FrameStatus::Valid
    }
}

/// Debounced landmark presence/confidence checker.
pub struct LandmarkValidator {
    config: ValidatorConfig,
    consecutive_errors: u32,

    // Statistics
    frames_checked: u64,
    frames_lost: u64,
}

impl LandmarkValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            consecutive_errors: 0,
            frames_checked: 0,
            frames_lost: 0,
        }
    }

    /// Check a frame against the joints an exercise requires.
    pub fn validate(&mut self, frame: &PoseFrame, required: &[Joint]) -> ValidationReport {
        self.frames_checked += 1;

        let mut missing = Vec::new();
        let mut visibility_sum = 0.0f64;
        for &joint in required {
            match frame.joint(joint) {
                Some(lm) => {
                    visibility_sum += lm.visibility.clamp(0.0, 1.0) as f64;
                    if !lm.is_visible(self.config.min_landmark_confidence) {
                        missing.push(joint);
                    }
                }
                None => missing.push(joint),
            }
        }

        let confidence = if required.is_empty() {
            100.0
        } else {
            (visibility_sum / required.len() as f64 * 100.0).clamp(0.0, 100.0)
        };

        if missing.is_empty() {
            if self.is_lost() {
                info!(
                    timestamp_ms = frame.timestamp_ms,
                    after_frames = self.consecutive_errors,
                    "tracking recovered"
                );
            }
            self.consecutive_errors = 0;
            return ValidationReport {
                status: FrameStatus::Valid,
                reason: None,
                confidence,
                missing,
            };
        }

        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        if self.is_lost() {
            self.frames_lost += 1;
            if self.consecutive_errors == self.config.tracking_loss_frames {
                warn!(
                    timestamp_ms = frame.timestamp_ms,
                    missing = ?missing,
                    "tracking lost"
                );
            }
            ValidationReport {
                status: FrameStatus::Lost,
                reason: Some(TRACKING_LOST_MESSAGE.to_string()),
                confidence,
                missing,
            }
        } else {
            let names: Vec<String> = missing.iter().map(|j| j.to_string()).collect();
            ValidationReport {
                status: FrameStatus::Occluded,
                reason: Some(format!("Waiting for a clear view of {}", names.join(", "))),
                confidence,
                missing,
            }
        }
    }

    /// Whether the consecutive-error counter has reached the loss threshold.
    pub fn is_lost(&self) -> bool {
        self.consecutive_errors >= self.config.tracking_loss_frames
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Get (frames checked, frames reported lost).
    pub fn statistics(&self) -> (u64, u64) {
        (self.frames_checked, self.frames_lost)
    }

    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.frames_checked = 0;
        self.frames_lost = 0;
    }
}

impl Default for LandmarkValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{frame_without, squat_frame};
    use crate::types::{ExerciseKind, Landmark};
    use assert_approx_eq::assert_approx_eq;

    fn required() -> &'static [Joint] {
        ExerciseKind::Squat.required_joints()
    }

    #[test]
    fn test_valid_frame() {
        let mut validator = LandmarkValidator::default();
        let report = validator.validate(&squat_frame(0, 1.0), required());
        assert!(report.is_valid());
        assert!(report.missing.is_empty());
        assert!(report.reason.is_none());
        assert_approx_eq!(report.confidence, 95.0, 1e-3);
    }

    #[test]
    fn test_missing_joint_debounced_then_lost() {
        let mut validator = LandmarkValidator::default();

        let first = validator.validate(&frame_without(0, Joint::LeftKnee), required());
        assert_eq!(first.status, FrameStatus::Occluded);
        assert_eq!(first.missing, vec![Joint::LeftKnee]);

        let second = validator.validate(&frame_without(33, Joint::LeftKnee), required());
        assert_eq!(second.status, FrameStatus::Occluded);

        let third = validator.validate(&frame_without(66, Joint::LeftKnee), required());
        assert_eq!(third.status, FrameStatus::Lost, "Third bad frame should be lost");
        assert_eq!(third.reason.as_deref(), Some(TRACKING_LOST_MESSAGE));

        let fourth = validator.validate(&frame_without(99, Joint::LeftKnee), required());
        assert_eq!(fourth.status, FrameStatus::Lost);
    }

    #[test]
    fn test_valid_frame_resets_counter() {
        let mut validator = LandmarkValidator::default();
        validator.validate(&frame_without(0, Joint::RightAnkle), required());
        validator.validate(&frame_without(33, Joint::RightAnkle), required());
        assert_eq!(validator.consecutive_errors(), 2);

        let report = validator.validate(&squat_frame(66, 1.0), required());
        assert!(report.is_valid());
        assert_eq!(validator.consecutive_errors(), 0);

        let again = validator.validate(&frame_without(99, Joint::RightAnkle), required());
        assert_eq!(again.status, FrameStatus::Occluded, "Counter should start over");
    }

    #[test]
    fn test_low_visibility_counts_as_missing() {
        let mut validator = LandmarkValidator::default();
        let frame = squat_frame(0, 1.0)
            .with_joint(Joint::LeftHip, Landmark::new(0.45, 0.5, 0.0, 0.3));
        let report = validator.validate(&frame, required());
        assert_eq!(report.status, FrameStatus::Occluded);
        assert_eq!(report.missing, vec![Joint::LeftHip]);
        // Seven joints at 0.95 and one at 0.3.
        assert_approx_eq!(report.confidence, (7.0 * 0.95 + 0.3) / 8.0 * 100.0, 1e-3);
    }

    #[test]
    fn test_absent_joint_lowers_confidence() {
        let mut validator = LandmarkValidator::default();
        let report = validator.validate(&frame_without(0, Joint::LeftKnee), required());
        assert_approx_eq!(report.confidence, 7.0 * 0.95 / 8.0 * 100.0, 1e-3);
    }

    #[test]
    fn test_reset() {
        let mut validator = LandmarkValidator::default();
        for i in 0..5 {
            validator.validate(&frame_without(i * 33, Joint::LeftKnee), required());
        }
        assert!(validator.is_lost());
        assert_eq!(validator.statistics(), (5, 3));

        validator.reset();
        assert!(!validator.is_lost());
        assert_eq!(validator.statistics(), (0, 0));
    }
}
