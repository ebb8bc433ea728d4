//! Session Export Module.
//!
//! Structured output for whoever persists workouts:
//! - **SessionSummary**: everything known about a finished session
//! - **WorkoutRecord**: the compact `{rep_count, best_score, date}` record
//!   stored per workout
//!
//! The engine itself never touches storage. Callers serialize these with
//! [`SessionSummary::to_json`] / [`WorkoutRecord::to_json`] and ship them
//! wherever they need to go.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CategoryScores, ExerciseKind, RepHistoryItem};

/// Final state of an analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    /// Cycles that completed but failed rep validation.
    pub rejected_reps: u32,
    /// Mean rep score, 0 when no reps were counted.
    pub overall_score: f64,
    pub best_score: Option<f64>,
    pub consecutive_good_reps: u32,
    /// Smoothed category scores at the end of the session.
    pub category_scores: CategoryScores,
    /// Category scores after feedback penalties.
    pub cumulative_scores: CategoryScores,
    pub rep_history: Vec<RepHistoryItem>,
    pub frames_analyzed: u64,
    /// Frame time from the first to the last analyzed frame.
    pub duration_ms: u64,
    pub is_video_complete: bool,
}

impl SessionSummary {
    /// Compact record for persistence, stamped with `date`.
    pub fn workout_record(&self, date: DateTime<Utc>) -> WorkoutRecord {
        WorkoutRecord {
            exercise: self.exercise,
            rep_count: self.rep_count,
            best_score: self.best_score.unwrap_or(0.0),
            date,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Serialize)
    }
}

/// Per-workout persistence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    pub best_score: f64,
    pub date: DateTime<Utc>,
}

impl WorkoutRecord {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepMetrics;
    use chrono::TimeZone;

    fn summary() -> SessionSummary {
        SessionSummary {
            exercise: ExerciseKind::Squat,
            rep_count: 2,
            rejected_reps: 1,
            overall_score: 87.5,
            best_score: Some(92.0),
            consecutive_good_reps: 1,
            category_scores: CategoryScores::uniform(90.0),
            cumulative_scores: CategoryScores::uniform(95.0),
            rep_history: vec![
                RepHistoryItem {
                    timestamp_ms: 2000,
                    score: 83.0,
                    metrics: RepMetrics::default(),
                },
                RepHistoryItem {
                    timestamp_ms: 4500,
                    score: 92.0,
                    metrics: RepMetrics::default(),
                },
            ],
            frames_analyzed: 150,
            duration_ms: 5000,
            is_video_complete: true,
        }
    }

    #[test]
    fn test_workout_record() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap();
        let record = summary().workout_record(date);
        assert_eq!(record.rep_count, 2);
        assert_eq!(record.best_score, 92.0);

        let json = record.to_json().unwrap();
        assert!(json.contains("\"rep_count\":2"));
        assert!(json.contains("\"exercise\":\"squat\""));
        assert!(json.contains("2024-03-01T18:30:00Z"), "Got {}", json);
    }

    #[test]
    fn test_record_without_reps() {
        let mut empty = summary();
        empty.rep_count = 0;
        empty.best_score = None;
        let record = empty.workout_record(Utc::now());
        assert_eq!(record.best_score, 0.0);
    }

    #[test]
    fn test_summary_json() {
        let json = summary().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["rep_count"], 2);
        assert_eq!(parsed["is_video_complete"], true);
        assert_eq!(parsed["rep_history"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["category_scores"]["depth"], 90.0);
    }
}
