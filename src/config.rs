//! Engine configuration.
//!
//! Bundles the per-stage configs into one document that can be loaded from
//! TOML. Every section and key is optional; missing values fall back to
//! the defaults.
//!
//! ```toml
//! [phase]
//! bottom_threshold = 0.5
//!
//! [reps]
//! min_rep_duration_ms = 600
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::advisory::AdvisoryConfig;
use crate::error::{Error, Result};
use crate::feedback::FeedbackConfig;
use crate::metrics::DepthCurve;
use crate::phase_detection::PhaseConfig;
use crate::rep_detection::RepConfig;
use crate::scoring::ScoringConfig;
use crate::signal::DepthConfig;
use crate::validation::ValidatorConfig;

/// Configuration for the whole analysis engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation: ValidatorConfig,
    pub depth: DepthConfig,
    pub phase: PhaseConfig,
    pub scoring: ScoringConfig,
    pub feedback: FeedbackConfig,
    pub reps: RepConfig,
    pub advisory: AdvisoryConfig,
}

impl EngineConfig {
    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).map_err(|e| Error::ReadConfig(e, path.to_path_buf()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).map_err(Error::ParseConfig)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(Error::SerializeConfig)?;
        fs::write(path, content).map_err(|e| Error::WriteConfig(e, path.to_path_buf()))?;
        Ok(())
    }

    /// Depth scoring curve implied by the phase thresholds.
    pub fn depth_curve(&self) -> DepthCurve {
        DepthCurve {
            bottom: self.phase.bottom_threshold,
            descent: self.phase.descent_threshold,
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let v = &self.validation;
        if !(0.0..=1.0).contains(&v.min_landmark_confidence) {
            return invalid(format!(
                "validation.min_landmark_confidence must be within 0-1, got {}",
                v.min_landmark_confidence
            ));
        }
        if v.tracking_loss_frames == 0 {
            return invalid("validation.tracking_loss_frames must be at least 1");
        }

        if self.depth.window_size == 0 {
            return invalid("depth.window_size must be at least 1");
        }

        let p = &self.phase;
        let ordered = 0.0 < p.bottom_threshold
            && p.bottom_threshold < p.descent_threshold
            && p.descent_threshold <= p.standing_threshold
            && p.standing_threshold <= 1.0;
        if !ordered {
            return invalid(format!(
                "phase thresholds must satisfy 0 < bottom ({}) < descent ({}) <= standing ({}) <= 1",
                p.bottom_threshold, p.descent_threshold, p.standing_threshold
            ));
        }
        if !(p.movement_epsilon >= 0.0) {
            return invalid("phase.movement_epsilon must be non-negative");
        }

        let s = &self.scoring;
        if !(s.smoothing_alpha > 0.0 && s.smoothing_alpha <= 1.0) {
            return invalid(format!(
                "scoring.smoothing_alpha must be within (0, 1], got {}",
                s.smoothing_alpha
            ));
        }
        if s.history_len == 0 {
            return invalid("scoring.history_len must be at least 1");
        }
        s.weights.validate()?;

        if self.feedback.max_items == 0 {
            return invalid("feedback.max_items must be at least 1");
        }

        let r = &self.reps;
        if r.min_rep_duration_ms > r.max_rep_duration_ms {
            return invalid(format!(
                "reps.min_rep_duration_ms ({}) exceeds reps.max_rep_duration_ms ({})",
                r.min_rep_duration_ms, r.max_rep_duration_ms
            ));
        }
        if r.min_plausible_depth >= p.descent_threshold {
            return invalid("reps.min_plausible_depth must be below phase.descent_threshold");
        }

        if !(0.0..=1.0).contains(&self.advisory.min_confidence) {
            return invalid("advisory.min_confidence must be within 0-1");
        }
        Ok(())
    }
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::InvalidConfig(message.into()))
}
