//! Form Metric Calculators.
//!
//! Pure geometry over a single frame. Nothing in here keeps state, so each
//! function can be tested (and reused) in isolation:
//! - Back angle: torso lean from vertical
//! - Knee alignment: knee drift off the hip-ankle line
//! - Balance: lateral hip offset over the feet
//! - Frontal ratio: whether the camera sees the body face-on
//!
//! Distances are normalized by hip width so the metrics do not depend on how
//! far the person stands from the camera.

use crate::error::{Error, Result};
use crate::types::{Joint, PoseFrame};

/// Widths below this are treated as degenerate when normalizing.
const MIN_SPAN: f64 = 1e-3;

/// 2D point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

pub fn joint_point(frame: &PoseFrame, joint: Joint) -> Result<Point> {
    frame
        .joint(joint)
        .map(|lm| Point {
            x: lm.x as f64,
            y: lm.y as f64,
        })
        .ok_or(Error::MissingJoint(joint))
}

pub fn midpoint(frame: &PoseFrame, left: Joint, right: Joint) -> Result<Point> {
    let a = joint_point(frame, left)?;
    let b = joint_point(frame, right)?;
    Ok(Point {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    })
}

fn hip_width(frame: &PoseFrame) -> Result<f64> {
    let left = joint_point(frame, Joint::LeftHip)?;
    let right = joint_point(frame, Joint::RightHip)?;
    Ok((left.x - right.x).abs())
}

/// Torso lean from vertical, in degrees (0 = upright).
pub fn back_angle(frame: &PoseFrame) -> Result<f64> {
    let shoulders = midpoint(frame, Joint::LeftShoulder, Joint::RightShoulder)?;
    let hips = midpoint(frame, Joint::LeftHip, Joint::RightHip)?;
    // Image y grows downward, so "up" is hips.y - shoulders.y.
    let rise = hips.y - shoulders.y;
    let run = (shoulders.x - hips.x).abs();
    Ok(run.atan2(rise).to_degrees())
}

/// Horizontal knee deviation from the hip-ankle line, in hip widths.
/// The worse of the two legs is returned.
pub fn knee_alignment(frame: &PoseFrame) -> Result<f64> {
    let width = hip_width(frame)?.max(MIN_SPAN);
    let sides = [
        (Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle),
        (Joint::RightHip, Joint::RightKnee, Joint::RightAnkle),
    ];

    let mut worst = 0.0f64;
    for (hip, knee, ankle) in sides {
        let hip = joint_point(frame, hip)?;
        let knee = joint_point(frame, knee)?;
        let ankle = joint_point(frame, ankle)?;

        let span = ankle.y - hip.y;
        let line_x = if span.abs() < MIN_SPAN {
            (hip.x + ankle.x) / 2.0
        } else {
            let t = (knee.y - hip.y) / span;
            hip.x + t * (ankle.x - hip.x)
        };
        worst = worst.max((knee.x - line_x).abs() / width);
    }
    Ok(worst)
}

/// Lateral offset of the hip center from the ankle center, in hip widths.
pub fn balance_offset(frame: &PoseFrame) -> Result<f64> {
    let width = hip_width(frame)?.max(MIN_SPAN);
    let hips = midpoint(frame, Joint::LeftHip, Joint::RightHip)?;
    let ankles = midpoint(frame, Joint::LeftAnkle, Joint::RightAnkle)?;
    Ok((hips.x - ankles.x).abs() / width)
}

/// Hip width over torso length. Small values mean the camera sees the body
/// side-on, where the frontal metrics are meaningless.
pub fn frontal_ratio(frame: &PoseFrame) -> Result<f64> {
    let shoulders = midpoint(frame, Joint::LeftShoulder, Joint::RightShoulder)?;
    let hips = midpoint(frame, Joint::LeftHip, Joint::RightHip)?;
    let torso = shoulders.distance(&hips);
    if torso < MIN_SPAN {
        return Ok(0.0);
    }
    Ok(hip_width(frame)? / torso)
}

/// All per-frame metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    pub back_angle: f64,
    pub knee_alignment: f64,
    pub balance: f64,
    pub frontal_ratio: f64,
}

impl FrameMetrics {
    pub fn compute(frame: &PoseFrame) -> Result<Self> {
        Ok(Self {
            back_angle: back_angle(frame)?,
            knee_alignment: knee_alignment(frame)?,
            balance: balance_offset(frame)?,
            frontal_ratio: frontal_ratio(frame)?,
        })
    }
}

// ============================================================================
// Scoring curves
// ============================================================================

/// Piecewise-linear map from a metric to a 0-100 score.
///
/// Breakpoints are `(metric, score)` pairs with increasing metric. Values
/// before the first or after the last breakpoint saturate.
#[derive(Debug, Clone, Copy)]
pub struct ScoreCurve {
    points: &'static [(f64, f64)],
}

impl ScoreCurve {
    pub const fn new(points: &'static [(f64, f64)]) -> Self {
        Self { points }
    }

    pub fn score(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        if value <= first.0 {
            return first.1.clamp(0.0, 100.0);
        }
        if value >= last.0 {
            return last.1.clamp(0.0, 100.0);
        }
        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if value <= x1 {
                let t = (value - x0) / (x1 - x0);
                return (y0 + t * (y1 - y0)).clamp(0.0, 100.0);
            }
        }
        last.1.clamp(0.0, 100.0)
    }
}

pub const BACK_ANGLE_CURVE: ScoreCurve =
    ScoreCurve::new(&[(15.0, 100.0), (45.0, 60.0), (75.0, 0.0)]);
pub const KNEE_ALIGNMENT_CURVE: ScoreCurve =
    ScoreCurve::new(&[(0.10, 100.0), (0.30, 50.0), (0.60, 0.0)]);
pub const BALANCE_CURVE: ScoreCurve =
    ScoreCurve::new(&[(0.10, 100.0), (0.30, 60.0), (0.60, 0.0)]);

/// Depth score: 100 at or below the bottom threshold, 0 at or above the
/// descent threshold, linear in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthCurve {
    pub bottom: f64,
    pub descent: f64,
}

impl DepthCurve {
    pub fn score(&self, depth: f64) -> f64 {
        if !depth.is_finite() {
            return 0.0;
        }
        if depth <= self.bottom {
            100.0
        } else if depth >= self.descent {
            0.0
        } else {
            100.0 * (self.descent - depth) / (self.descent - self.bottom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{knees_in_frame, leaning_frame, squat_frame};
    use crate::types::Landmark;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_perfect_frame_metrics() {
        let metrics = FrameMetrics::compute(&squat_frame(0, 0.5)).unwrap();
        assert_approx_eq!(metrics.back_angle, 0.0, 1e-4);
        assert_approx_eq!(metrics.knee_alignment, 0.0, 1e-4);
        assert_approx_eq!(metrics.balance, 0.0, 1e-4);
        assert!(metrics.frontal_ratio > 0.3, "Got {}", metrics.frontal_ratio);
    }

    #[test]
    fn test_back_angle_lean() {
        // Shoulders shifted by the torso length: 45 degrees.
        let angle = back_angle(&leaning_frame(0, 1.0, 0.3)).unwrap();
        assert_approx_eq!(angle, 45.0, 1e-3);
    }

    #[test]
    fn test_knee_alignment_valgus() {
        // Both knees pulled in by half a hip width.
        let value = knee_alignment(&knees_in_frame(0, 0.5, 0.05)).unwrap();
        assert_approx_eq!(value, 0.5, 1e-3);
    }

    #[test]
    fn test_balance_offset() {
        let frame = squat_frame(0, 1.0)
            .with_joint(Joint::LeftHip, Landmark::new(0.47, 0.5, 0.0, 0.95))
            .with_joint(Joint::RightHip, Landmark::new(0.57, 0.5, 0.0, 0.95));
        assert_approx_eq!(balance_offset(&frame).unwrap(), 0.2, 1e-3);
    }

    #[test]
    fn test_side_view_ratio() {
        let frame = squat_frame(0, 1.0)
            .with_joint(Joint::LeftHip, Landmark::new(0.50, 0.5, 0.0, 0.95))
            .with_joint(Joint::RightHip, Landmark::new(0.51, 0.5, 0.0, 0.95));
        let ratio = frontal_ratio(&frame).unwrap();
        assert!(ratio < 0.15, "Side-on hips should give a small ratio, got {}", ratio);
    }

    #[test]
    fn test_missing_joint_is_error() {
        let mut frame = squat_frame(0, 1.0);
        frame.set(Joint::RightShoulder, None);
        match back_angle(&frame) {
            Err(Error::MissingJoint(joint)) => assert_eq!(joint, Joint::RightShoulder),
            other => panic!("Expected missing joint, got {:?}", other),
        }
    }

    #[test]
    fn test_score_curves() {
        assert_eq!(BACK_ANGLE_CURVE.score(0.0), 100.0);
        assert_eq!(BACK_ANGLE_CURVE.score(15.0), 100.0);
        assert_approx_eq!(BACK_ANGLE_CURVE.score(30.0), 80.0, 1e-9);
        assert_eq!(BACK_ANGLE_CURVE.score(45.0), 60.0);
        assert_approx_eq!(BACK_ANGLE_CURVE.score(60.0), 30.0, 1e-9);
        assert_eq!(BACK_ANGLE_CURVE.score(90.0), 0.0);

        assert_approx_eq!(KNEE_ALIGNMENT_CURVE.score(0.2), 75.0, 1e-9);
        assert_eq!(KNEE_ALIGNMENT_CURVE.score(1.5), 0.0);
        assert_approx_eq!(BALANCE_CURVE.score(0.2), 80.0, 1e-9);
        assert_eq!(BALANCE_CURVE.score(f64::NAN), 0.0);
    }

    #[test]
    fn test_depth_curve() {
        let curve = DepthCurve {
            bottom: 0.55,
            descent: 0.8,
        };
        assert_eq!(curve.score(0.3), 100.0);
        assert_eq!(curve.score(0.55), 100.0);
        assert_approx_eq!(curve.score(0.675), 50.0, 1e-9);
        assert_eq!(curve.score(0.8), 0.0);
        assert_eq!(curve.score(1.0), 0.0);
    }
}
