//! Synthetic pose frames for tests.
//!
//! Frames model a person facing the camera: ankles at y=0.875, knees at
//! y=0.625 and hips lowered as the squat deepens, so that the depth estimator
//! reads back the `depth` passed in (1.0 standing, 0.0 hips at ankle height)
//! once calibrated on a standing frame. Ankle, knee and standing hip heights
//! are exact in f32, so threshold depths such as 0.3 read back at or below
//! the threshold. Back, knees and hips are
//! perfectly aligned, so every form metric scores 100.

use crate::types::{Joint, Landmark, PoseFrame};

pub const VISIBILITY: f32 = 0.95;
const LEFT_X: f32 = 0.45;
const RIGHT_X: f32 = 0.55;
pub const ANKLE_Y: f32 = 0.875;
const KNEE_Y: f32 = 0.625;
const TORSO: f32 = 0.3;

pub fn hip_y(depth: f64) -> f32 {
    (ANKLE_Y as f64 - 0.5 * depth) as f32
}

fn lm(x: f32, y: f32) -> Landmark {
    Landmark::new(x, y, 0.0, VISIBILITY)
}

/// Perfect-form frame at the given depth.
pub fn squat_frame(timestamp_ms: u64, depth: f64) -> PoseFrame {
    let hip = hip_y(depth);
    PoseFrame::empty(timestamp_ms)
        .with_joint(Joint::Nose, lm(0.5, hip - TORSO - 0.1))
        .with_joint(Joint::LeftShoulder, lm(LEFT_X, hip - TORSO))
        .with_joint(Joint::RightShoulder, lm(RIGHT_X, hip - TORSO))
        .with_joint(Joint::LeftHip, lm(LEFT_X, hip))
        .with_joint(Joint::RightHip, lm(RIGHT_X, hip))
        .with_joint(Joint::LeftKnee, lm(LEFT_X, KNEE_Y))
        .with_joint(Joint::RightKnee, lm(RIGHT_X, KNEE_Y))
        .with_joint(Joint::LeftAnkle, lm(LEFT_X, ANKLE_Y))
        .with_joint(Joint::RightAnkle, lm(RIGHT_X, ANKLE_Y))
}

/// Standing frame with one joint removed.
pub fn frame_without(timestamp_ms: u64, joint: Joint) -> PoseFrame {
    let mut frame = squat_frame(timestamp_ms, 1.0);
    frame.set(joint, None);
    frame
}

/// Frame with the shoulders shifted sideways by `offset`, leaning the torso.
pub fn leaning_frame(timestamp_ms: u64, depth: f64, offset: f32) -> PoseFrame {
    let hip = hip_y(depth);
    squat_frame(timestamp_ms, depth)
        .with_joint(Joint::LeftShoulder, lm(LEFT_X + offset, hip - TORSO))
        .with_joint(Joint::RightShoulder, lm(RIGHT_X + offset, hip - TORSO))
}

/// Frame with both knees pulled toward the midline by `inset`.
pub fn knees_in_frame(timestamp_ms: u64, depth: f64, inset: f32) -> PoseFrame {
    squat_frame(timestamp_ms, depth)
        .with_joint(Joint::LeftKnee, lm(LEFT_X + inset, KNEE_Y))
        .with_joint(Joint::RightKnee, lm(RIGHT_X - inset, KNEE_Y))
}

/// One full squat: `standing` frames up, ramp down to `bottom`, hold, ramp up,
/// `standing` frames up. Returns the frames and the next free timestamp.
pub fn squat_rep(
    start_ms: u64,
    interval_ms: u64,
    bottom: f64,
    ramp_frames: usize,
    hold_frames: usize,
    standing: usize,
) -> (Vec<PoseFrame>, u64) {
    let mut depths = Vec::new();
    depths.extend(std::iter::repeat(1.0).take(standing));
    for i in 1..=ramp_frames {
        depths.push(1.0 - (1.0 - bottom) * i as f64 / ramp_frames as f64);
    }
    depths.extend(std::iter::repeat(bottom).take(hold_frames));
    for i in 1..=ramp_frames {
        depths.push(bottom + (1.0 - bottom) * i as f64 / ramp_frames as f64);
    }
    depths.extend(std::iter::repeat(1.0).take(standing));

    let mut ts = start_ms;
    let frames = depths
        .into_iter()
        .map(|d| {
            let frame = squat_frame(ts, d);
            ts += interval_ms;
            frame
        })
        .collect();
    (frames, ts)
}
