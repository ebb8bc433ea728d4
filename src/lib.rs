//! Squat Sense Analysis Engine Library
//!
//! A real-time exercise analysis kernel that turns a stream of pose landmark
//! frames into squat repetitions, category scores and coaching feedback.
//!
//! # Design Philosophy
//!
//! This library is built on several core principles:
//!
//! - **Streaming first**: Each frame is processed once, in order, with fixed
//!   memory per session.
//! - **Recover, don't crash**: Tracking loss and bad frames produce explicit
//!   feedback, and the next good frame picks up where the session left off.
//! - **Explicit state**: All per-session state lives in one owned value that
//!   `reset` replaces wholesale.
//! - **Quiet feedback**: Messages are de-duplicated, throttled and expire, so
//!   the user sees a short list of what matters now.
//!
//! # Example
//!
//! ```no_run
//! use squat_sense::{EngineConfig, ExerciseKind, ExerciseSession, PoseFrame};
//!
//! # fn frames() -> Vec<PoseFrame> { Vec::new() }
//! let mut session = ExerciseSession::new(ExerciseKind::Squat, EngineConfig::default())?;
//! for frame in frames() {
//!     let result = session.analyze(&frame);
//!     for item in &result.feedback {
//!         println!("{:?}: {}", item.kind, item.message);
//!     }
//! }
//! let summary = session.finalize();
//! println!("{} reps, score {:.0}", summary.rep_count, summary.overall_score);
//! # Ok::<(), squat_sense::Error>(())
//! ```

pub mod advisory;
pub mod config;
pub mod error;
pub mod export;
pub mod feedback;
pub mod metrics;
pub mod phase_detection;
pub mod rep_detection;
pub mod scoring;
pub mod session;
pub mod signal;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use advisory::{
    AdvisoryClassifier, AdvisoryConfig, AdvisoryHandle, AdvisoryIssue, AdvisoryIssueKind,
    AdvisoryPrediction,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use export::{SessionSummary, WorkoutRecord};
pub use session::ExerciseSession;
pub use types::{
    AnalysisResult, Category, CategoryScores, ExerciseKind, ExercisePhase, FeedbackItem,
    FeedbackKind, Joint, Landmark, PoseFrame, RepHistoryItem, RepMetrics, Severity,
};
