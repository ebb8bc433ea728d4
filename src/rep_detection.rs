//! Rep Detection Module.
//!
//! Decides whether a completed phase cycle counts as a repetition and keeps
//! the session's rep history:
//! - Duration bounds reject twitches and stalls
//! - Cycles that never reached the bottom are not reps
//! - Depth bounds reject tracking glitches
//! - A streak of high-scoring reps triggers a celebration message
//!
//! Rejected cycles are dropped without user-facing feedback.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::metrics::FrameMetrics;
use crate::phase_detection::RepCompletion;
use crate::types::{RepHistoryItem, RepMetrics};

/// Configuration for rep validation and streaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepConfig {
    /// Shortest plausible rep (ms).
    pub min_rep_duration_ms: u64,
    /// Longest plausible rep (ms).
    pub max_rep_duration_ms: u64,
    /// Depths below this are treated as tracking glitches.
    pub min_plausible_depth: f64,
    /// Rep score needed to extend the good-rep streak.
    pub good_rep_threshold: f64,
    /// Streak length that earns a celebration message.
    pub celebration_streak: u32,
}

impl Default for RepConfig {
    fn default() -> Self {
        Self {
            min_rep_duration_ms: 800,  // faster is a bounce, not a squat
            max_rep_duration_ms: 5000, // slower is a pause or a sit
            min_plausible_depth: 0.05,
            good_rep_threshold: 90.0,
            celebration_streak: 3,
        }
    }
}

/// Why a cycle did not count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepRejection {
    TooShort { duration_ms: u64, min_ms: u64 },
    TooLong { duration_ms: u64, max_ms: u64 },
    NoBottom { depth: f64 },
    ImplausiblyDeep { depth: f64, limit: f64 },
}

impl fmt::Display for RepRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepRejection::TooShort { duration_ms, min_ms } => {
                write!(f, "rep too short: {} ms < {} ms", duration_ms, min_ms)
            }
            RepRejection::TooLong { duration_ms, max_ms } => {
                write!(f, "rep too long: {} ms > {} ms", duration_ms, max_ms)
            }
            RepRejection::NoBottom { depth } => {
                write!(f, "rep never reached the bottom: deepest {:.3}", depth)
            }
            RepRejection::ImplausiblyDeep { depth, limit } => {
                write!(f, "rep implausibly deep: depth {:.3} below {:.3}", depth, limit)
            }
        }
    }
}

/// A rep that was counted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRep {
    pub item: RepHistoryItem,
    /// 1-based rep number.
    pub rep_number: u32,
    pub streak: u32,
    pub celebration: Option<String>,
}

/// Worst form seen during the cycle in progress.
#[derive(Debug, Clone, Copy, Default)]
struct CycleMetrics {
    back_angle: f64,
    knee_alignment: f64,
    balance: f64,
}

/// Validates completed cycles and keeps rep history.
pub struct RepRecorder {
    config: RepConfig,
    cycle: CycleMetrics,

    history: Vec<RepHistoryItem>,
    rep_count: u32,
    streak: u32,
    best_score: Option<f64>,
    rejected_count: u32,
}

impl RepRecorder {
    pub fn new(config: RepConfig) -> Self {
        Self {
            config,
            cycle: CycleMetrics::default(),
            history: Vec::new(),
            rep_count: 0,
            streak: 0,
            best_score: None,
            rejected_count: 0,
        }
    }

    /// Start tracking a new cycle.
    pub fn start_cycle(&mut self) {
        self.cycle = CycleMetrics::default();
    }

    /// Fold one frame's metrics into the cycle's worst case.
    pub fn observe(&mut self, metrics: &FrameMetrics) {
        self.cycle.back_angle = self.cycle.back_angle.max(metrics.back_angle);
        self.cycle.knee_alignment = self.cycle.knee_alignment.max(metrics.knee_alignment);
        self.cycle.balance = self.cycle.balance.max(metrics.balance);
    }

    /// Check a completed cycle against the duration and depth bounds.
    /// Both bounds are inclusive. A cycle must have visited `Bottom`.
    pub fn validate(&self, completion: &RepCompletion) -> Result<(), RepRejection> {
        let duration_ms = completion.duration_ms;
        if duration_ms < self.config.min_rep_duration_ms {
            return Err(RepRejection::TooShort {
                duration_ms,
                min_ms: self.config.min_rep_duration_ms,
            });
        }
        if duration_ms > self.config.max_rep_duration_ms {
            return Err(RepRejection::TooLong {
                duration_ms,
                max_ms: self.config.max_rep_duration_ms,
            });
        }

        let depth = completion.max_depth;
        if depth < self.config.min_plausible_depth {
            return Err(RepRejection::ImplausiblyDeep {
                depth,
                limit: self.config.min_plausible_depth,
            });
        }
        if !completion.visited_bottom {
            return Err(RepRejection::NoBottom { depth });
        }
        Ok(())
    }

    /// Count a completed cycle with the given score, or explain why not.
    pub fn record(
        &mut self,
        completion: &RepCompletion,
        score: f64,
    ) -> Result<RecordedRep, RepRejection> {
        let cycle = self.cycle;
        self.cycle = CycleMetrics::default();

        if let Err(rejection) = self.validate(completion) {
            self.rejected_count += 1;
            debug!(
                completed_ms = completion.completed_ms,
                reason = %rejection,
                "rep discarded"
            );
            return Err(rejection);
        }

        let score = score.clamp(0.0, 100.0);
        let item = RepHistoryItem {
            timestamp_ms: completion.completed_ms,
            score,
            metrics: RepMetrics {
                depth: completion.max_depth,
                duration_ms: completion.duration_ms,
                back_angle: cycle.back_angle,
                knee_alignment: cycle.knee_alignment,
                balance: cycle.balance,
            },
        };
        self.history.push(item.clone());
        self.rep_count += 1;
        self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));

        if score < self.config.good_rep_threshold {
            self.streak = 0;
        } else {
            self.streak += 1;
        }

        let celebration = if self.streak >= self.config.celebration_streak {
            Some(format!("Great form! {} good reps in a row", self.streak))
        } else {
            None
        };

        info!(
            rep = self.rep_count,
            score,
            duration_ms = completion.duration_ms,
            depth = completion.max_depth,
            streak = self.streak,
            "rep counted"
        );

        Ok(RecordedRep {
            item,
            rep_number: self.rep_count,
            streak: self.streak,
            celebration,
        })
    }

    pub fn history(&self) -> &[RepHistoryItem] {
        &self.history
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn rejected_count(&self) -> u32 {
        self.rejected_count
    }

    /// Mean score of all counted reps, 0 when none.
    pub fn average_score(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().map(|rep| rep.score).sum::<f64>() / self.history.len() as f64
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}
