//! Phase Detection Module.
//!
//! State machine over the smoothed depth signal that segments movement into
//! squat phases and reports completed cycles:
//!
//! ```text
//! Start -> Top -> Descent -> Bottom -> Ascent -> Top
//!                    |                   ^  |
//!                    +-------------------+  +-> Bottom
//! ```
//!
//! Cycles that turn back near the top are treated as abandoned and never
//! reach the rep recorder. Shallow cycles that turn back between the descent
//! and bottom thresholds do complete, and the recorder decides whether they
//! count.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::ExercisePhase;

/// Configuration for phase detection. Depth thresholds use the normalized
/// depth convention (1.0 standing, smaller is deeper).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// At or above this depth the person is standing.
    pub standing_threshold: f64,
    /// Turning back above this depth abandons the cycle.
    pub descent_threshold: f64,
    /// At or below this depth the person is in the hole.
    pub bottom_threshold: f64,
    /// Minimum frame-to-frame depth change that counts as movement.
    pub movement_epsilon: f64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            standing_threshold: 0.95,
            descent_threshold: 0.8,
            bottom_threshold: 0.55, // roughly thighs parallel
            movement_epsilon: 0.01,
        }
    }
}

/// A finished descent/ascent cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepCompletion {
    /// Timestamp of the last standing frame before the descent.
    pub started_ms: u64,
    pub completed_ms: u64,
    pub duration_ms: u64,
    /// Deepest (smallest) depth reached during the cycle.
    pub max_depth: f64,
    pub visited_bottom: bool,
}

/// Result of feeding one depth value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseUpdate {
    pub phase: ExercisePhase,
    pub previous: ExercisePhase,
    pub changed: bool,
    pub completed: Option<RepCompletion>,
    pub abandoned: bool,
}

/// Squat phase state machine.
pub struct PhaseTracker {
    config: PhaseConfig,
    phase: ExercisePhase,
    prev_depth: Option<f64>,

    // Current cycle
    last_top_ms: Option<u64>,
    cycle_start_ms: u64,
    deepest: Option<f64>,
    visited_bottom: bool,

    // Statistics
    transition_count: u64,
    abandoned_count: u32,
}

impl PhaseTracker {
    pub fn new(config: PhaseConfig) -> Self {
        Self {
            config,
            phase: ExercisePhase::Start,
            prev_depth: None,
            last_top_ms: None,
            cycle_start_ms: 0,
            deepest: None,
            visited_bottom: false,
            transition_count: 0,
            abandoned_count: 0,
        }
    }

    /// Feed one smoothed depth value.
    pub fn update(&mut self, depth: f64, timestamp_ms: u64) -> PhaseUpdate {
        let delta = self.prev_depth.map(|prev| depth - prev).unwrap_or(0.0);
        self.prev_depth = Some(depth);

        let standing = self.config.standing_threshold;
        let bottom = self.config.bottom_threshold;
        let eps = self.config.movement_epsilon;

        let previous = self.phase;
        let in_cycle = matches!(
            previous,
            ExercisePhase::Descent | ExercisePhase::Bottom | ExercisePhase::Ascent
        );
        if in_cycle {
            self.deepest = Some(self.deepest.map_or(depth, |d| d.min(depth)));
        }

        let mut completed = None;
        let mut abandoned = false;

        let next = match previous {
            ExercisePhase::Start => {
                if depth >= standing {
                    ExercisePhase::Top
                } else {
                    ExercisePhase::Start
                }
            }
            ExercisePhase::Top => {
                if depth < standing && delta < -eps {
                    self.begin_cycle(depth, timestamp_ms);
                    ExercisePhase::Descent
                } else {
                    ExercisePhase::Top
                }
            }
            ExercisePhase::Descent => {
                if depth <= bottom {
                    ExercisePhase::Bottom
                } else if depth >= standing {
                    abandoned = true;
                    ExercisePhase::Top
                } else if delta > eps {
                    if depth <= self.config.descent_threshold {
                        ExercisePhase::Ascent
                    } else {
                        abandoned = true;
                        ExercisePhase::Top
                    }
                } else {
                    ExercisePhase::Descent
                }
            }
            ExercisePhase::Bottom => {
                if depth >= standing {
                    completed = Some(self.complete_cycle(timestamp_ms));
                    ExercisePhase::Top
                } else if depth > bottom {
                    ExercisePhase::Ascent
                } else {
                    ExercisePhase::Bottom
                }
            }
            ExercisePhase::Ascent => {
                if depth >= standing {
                    completed = Some(self.complete_cycle(timestamp_ms));
                    ExercisePhase::Top
                } else if depth <= bottom && delta < -eps {
                    ExercisePhase::Bottom
                } else {
                    ExercisePhase::Ascent
                }
            }
        };

        if next == ExercisePhase::Bottom {
            self.visited_bottom = true;
        }
        if next == ExercisePhase::Top {
            self.last_top_ms = Some(timestamp_ms);
        }
        if abandoned {
            self.abandoned_count += 1;
            self.deepest = None;
            debug!(timestamp_ms, depth, "squat cycle abandoned near the top");
        }

        let changed = next != previous;
        if changed {
            self.transition_count += 1;
            trace!(from = %previous, to = %next, depth, delta, "phase transition");
        }
        self.phase = next;

        PhaseUpdate {
            phase: next,
            previous,
            changed,
            completed,
            abandoned,
        }
    }

    fn begin_cycle(&mut self, depth: f64, timestamp_ms: u64) {
        self.cycle_start_ms = self.last_top_ms.unwrap_or(timestamp_ms);
        self.deepest = Some(depth);
        self.visited_bottom = false;
    }

    fn complete_cycle(&mut self, timestamp_ms: u64) -> RepCompletion {
        let completion = RepCompletion {
            started_ms: self.cycle_start_ms,
            completed_ms: timestamp_ms,
            duration_ms: timestamp_ms.saturating_sub(self.cycle_start_ms),
            max_depth: self.deepest.unwrap_or(1.0),
            visited_bottom: self.visited_bottom,
        };
        self.deepest = None;
        completion
    }

    pub fn phase(&self) -> ExercisePhase {
        self.phase
    }

    /// Deepest depth of the cycle in progress, if any.
    pub fn cycle_depth(&self) -> Option<f64> {
        self.deepest
    }

    /// Get (transitions, abandoned cycles).
    pub fn statistics(&self) -> (u64, u32) {
        (self.transition_count, self.abandoned_count)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new(PhaseConfig::default())
    }
}
