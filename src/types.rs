//! Core types for the squat analysis engine.
//!
//! All coordinates are normalized image coordinates as produced by a
//! BlazePose-style pose model: `x` grows to the right, `y` grows downward,
//! and `visibility` is the model's confidence in `[0, 1]`.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

use crate::error::Error;

// ============================================================================
// Joints and landmarks
// ============================================================================

/// The 33 body landmarks of the BlazePose topology.
///
/// Raw integer indices from the pose model are mapped to this enum once, at
/// the frame boundary. Nothing downstream indexes landmarks by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl Joint {
    /// Number of landmarks in a full frame.
    pub const COUNT: usize = 33;

    /// Every joint, in model index order.
    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Nose,
        Joint::LeftEyeInner,
        Joint::LeftEye,
        Joint::LeftEyeOuter,
        Joint::RightEyeInner,
        Joint::RightEye,
        Joint::RightEyeOuter,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::MouthLeft,
        Joint::MouthRight,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftPinky,
        Joint::RightPinky,
        Joint::LeftIndex,
        Joint::RightIndex,
        Joint::LeftThumb,
        Joint::RightThumb,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::LeftHeel,
        Joint::RightHeel,
        Joint::LeftFootIndex,
        Joint::RightFootIndex,
    ];

    /// Map a pose-model landmark index to a joint.
    pub fn from_index(index: usize) -> Option<Joint> {
        Self::ALL.get(index).copied()
    }

    /// Index of this joint in the pose model's output.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single tracked body point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    /// Model confidence that the point is visible (0-1).
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility >= threshold
    }

    /// True when every coordinate and the visibility are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_finite()
    }
}

/// One frame of pose landmarks.
///
/// The landmark array is total over [`Joint`]: a joint the model did not
/// report is `None` rather than absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoseFrame", into = "RawPoseFrame")]
pub struct PoseFrame {
    /// Capture time in milliseconds (monotonic within a session).
    pub timestamp_ms: u64,
    pub landmarks: [Option<Landmark>; Joint::COUNT],
}

/// Wire form of a frame: a plain list indexed by model landmark number.
#[derive(Serialize, Deserialize)]
struct RawPoseFrame {
    timestamp_ms: u64,
    landmarks: Vec<Option<Landmark>>,
}

impl PoseFrame {
    /// A frame with no landmarks.
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            landmarks: [None; Joint::COUNT],
        }
    }

    /// Build a frame from a model output list. The list must hold exactly
    /// one entry per joint.
    pub fn from_indexed(
        timestamp_ms: u64,
        raw: Vec<Option<Landmark>>,
    ) -> Result<Self, Error> {
        if raw.len() != Joint::COUNT {
            return Err(Error::LandmarkCount {
                expected: Joint::COUNT,
                actual: raw.len(),
            });
        }
        let mut frame = Self::empty(timestamp_ms);
        for (slot, landmark) in frame.landmarks.iter_mut().zip(raw) {
            *slot = landmark;
        }
        Ok(frame)
    }

    /// Builder-style setter used when assembling frames by hand.
    pub fn with_joint(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.set(joint, Some(landmark));
        self
    }

    pub fn set(&mut self, joint: Joint, landmark: Option<Landmark>) {
        self.landmarks[joint.index()] = landmark;
    }

    pub fn joint(&self, joint: Joint) -> Option<&Landmark> {
        self.landmarks[joint.index()].as_ref()
    }

    /// First joint carrying a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<Joint> {
        Joint::ALL
            .iter()
            .copied()
            .find(|&joint| matches!(self.joint(joint), Some(lm) if !lm.is_finite()))
    }
}

impl TryFrom<RawPoseFrame> for PoseFrame {
    type Error = Error;

    fn try_from(raw: RawPoseFrame) -> Result<Self, Self::Error> {
        PoseFrame::from_indexed(raw.timestamp_ms, raw.landmarks)
    }
}

impl From<PoseFrame> for RawPoseFrame {
    fn from(frame: PoseFrame) -> Self {
        RawPoseFrame {
            timestamp_ms: frame.timestamp_ms,
            landmarks: frame.landmarks.to_vec(),
        }
    }
}

// ============================================================================
// Exercise model
// ============================================================================

/// Exercises the engine knows how to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Squat,
}

impl ExerciseKind {
    /// Joints that must be visible for the exercise to be scored.
    pub fn required_joints(self) -> &'static [Joint] {
        match self {
            ExerciseKind::Squat => &[
                Joint::LeftShoulder,
                Joint::RightShoulder,
                Joint::LeftHip,
                Joint::RightHip,
                Joint::LeftKnee,
                Joint::RightKnee,
                Joint::LeftAnkle,
                Joint::RightAnkle,
            ],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::Squat => "squat",
        }
    }
}

/// Segment of a repetition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExercisePhase {
    /// No standing reference seen yet.
    Start,
    /// Moving down from standing.
    Descent,
    /// At or below the bottom threshold.
    Bottom,
    /// Moving up out of the hole.
    Ascent,
    /// Standing between reps.
    Top,
}

impl Default for ExercisePhase {
    fn default() -> Self {
        ExercisePhase::Start
    }
}

impl ExercisePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ExercisePhase::Start => "start",
            ExercisePhase::Descent => "descent",
            ExercisePhase::Bottom => "bottom",
            ExercisePhase::Ascent => "ascent",
            ExercisePhase::Top => "top",
        }
    }
}

impl fmt::Display for ExercisePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scores and feedback
// ============================================================================

/// Scored quality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Form,
    Depth,
    Alignment,
    Balance,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Form,
        Category::Depth,
        Category::Alignment,
        Category::Balance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Form => "form",
            Category::Depth => "depth",
            Category::Alignment => "alignment",
            Category::Balance => "balance",
        }
    }
}

/// One score per category, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub form: f64,
    pub depth: f64,
    pub alignment: f64,
    pub balance: f64,
}

impl CategoryScores {
    pub fn uniform(value: f64) -> Self {
        Self {
            form: value,
            depth: value,
            alignment: value,
            balance: value,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Form => self.form,
            Category::Depth => self.depth,
            Category::Alignment => self.alignment,
            Category::Balance => self.balance,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        let slot = match category {
            Category::Form => &mut self.form,
            Category::Depth => &mut self.depth,
            Category::Alignment => &mut self.alignment,
            Category::Balance => &mut self.balance,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().map(move |&c| (c, self.get(c)))
    }
}

impl Default for CategoryScores {
    /// Every category starts perfect until evidence says otherwise.
    fn default() -> Self {
        Self::uniform(100.0)
    }
}

/// How bad a detected issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
}

/// Presentation class of a feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Success,
    Warning,
    Error,
}

/// A user-facing feedback message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub message: String,
    pub category: Category,
    pub severity: Severity,
    pub kind: FeedbackKind,
    /// Time the message was (re)raised, in frame time.
    pub created_at_ms: u64,
    /// Joints a renderer may highlight alongside the message.
    pub anchor_landmarks: Vec<Joint>,
}

/// Geometry captured for a completed repetition.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RepMetrics {
    /// Deepest normalized depth reached (1.0 standing, smaller is deeper).
    pub depth: f64,
    pub duration_ms: u64,
    /// Worst torso lean from vertical, in degrees.
    pub back_angle: f64,
    /// Worst knee deviation, in hip widths.
    pub knee_alignment: f64,
    /// Worst lateral hip offset, in hip widths.
    pub balance: f64,
}

/// A counted repetition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepHistoryItem {
    pub timestamp_ms: u64,
    pub score: f64,
    pub metrics: RepMetrics,
}

/// Everything the caller needs to render one analyzed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub timestamp_ms: u64,
    pub phase: ExercisePhase,
    pub feedback: Vec<FeedbackItem>,
    pub category_scores: CategoryScores,
    pub overall_score: f64,
    pub rep_count: u32,
    pub consecutive_good_reps: u32,
    pub rep_history: Vec<RepHistoryItem>,
    /// True until a standing baseline has been captured.
    pub is_initializing: bool,
    /// Mean visibility of required joints, 0-100.
    pub tracking_confidence: f64,
    pub is_video_complete: bool,
}

// ============================================================================
// Tests
// ============================================================================
