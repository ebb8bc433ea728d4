//! Scoring Engine Module.
//!
//! Turns per-frame form metrics into smoothed category scores and raises
//! form issues when a category drops below the correction threshold.
//!
//! Evaluation only happens on phase changes, so the scores move at rep
//! cadence rather than frame cadence. Each category is blended with an
//! exponential moving average and keeps a bounded history for reporting.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::metrics::{
    DepthCurve, FrameMetrics, BACK_ANGLE_CURVE, BALANCE_CURVE, KNEE_ALIGNMENT_CURVE,
};
use crate::types::{Category, CategoryScores, ExercisePhase, FeedbackKind, Joint, Severity};

/// Weights used to fold category scores into one overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub form: f64,
    pub depth: f64,
    pub alignment: f64,
    pub balance: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            form: 0.30,
            depth: 0.25,
            alignment: 0.25,
            balance: 0.20,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Form => self.form,
            Category::Depth => self.depth,
            Category::Alignment => self.alignment,
            Category::Balance => self.balance,
        }
    }

    pub fn sum(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.get(c)).sum()
    }

    /// Weighted sum of the category scores, clamped to 0-100.
    pub fn overall(&self, scores: &CategoryScores) -> f64 {
        scores
            .iter()
            .map(|(category, score)| self.get(category) * score)
            .sum::<f64>()
            .clamp(0.0, 100.0)
    }

    pub fn validate(&self) -> Result<()> {
        if Category::ALL.iter().any(|&c| self.get(c) < 0.0 || !self.get(c).is_finite()) {
            return Err(Error::InvalidConfig(
                "category weights must be finite and non-negative".to_string(),
            ));
        }
        if (self.sum() - 1.0).abs() > 1e-6 {
            return Err(Error::InvalidConfig(format!(
                "category weights must sum to 1.0, got {:.4}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Configuration for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// EMA factor for blending new sub-scores (0-1, higher = more reactive).
    pub smoothing_alpha: f64,
    /// Samples kept per category history.
    pub history_len: usize,
    /// Sub-scores below this raise a form issue.
    pub correction_threshold: f64,
    /// Hip width / torso length below which the view is treated as side-on.
    pub min_frontal_ratio: f64,
    pub weights: CategoryWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.2,
            history_len: 100,
            correction_threshold: 70.0,
            min_frontal_ratio: 0.15,
            weights: CategoryWeights::default(),
        }
    }
}

/// Depth information available to an evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthEvidence {
    /// Depth is not scored at this point.
    None,
    /// Entering the bottom: scored, but no issue raised yet.
    Provisional(f64),
    /// Rep completed: scored, and an issue is raised if too shallow.
    Final(f64),
}

/// A detected form problem.
#[derive(Debug, Clone, PartialEq)]
pub struct FormIssue {
    pub category: Category,
    /// Instantaneous sub-score that triggered the issue.
    pub score: f64,
    pub severity: Severity,
    pub message: &'static str,
    pub anchors: &'static [Joint],
}

impl FormIssue {
    pub fn kind(&self) -> FeedbackKind {
        match self.severity {
            Severity::Major => FeedbackKind::Error,
            Severity::Moderate | Severity::Minor => FeedbackKind::Warning,
        }
    }
}

/// Sub-scores and issues from one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub sub_scores: Vec<(Category, f64)>,
    pub issues: Vec<FormIssue>,
}

/// Map a sub-score to issue severity.
pub fn severity_for(score: f64) -> Severity {
    if score < 40.0 {
        Severity::Major
    } else if score < 55.0 {
        Severity::Moderate
    } else {
        Severity::Minor
    }
}

pub fn correction_message(category: Category) -> &'static str {
    match category {
        Category::Form => "Keep your chest up and back straight",
        Category::Depth => "Squat deeper, aim for thighs parallel to the floor",
        Category::Alignment => "Keep your knees aligned over your toes",
        Category::Balance => "Keep your hips level and weight centered",
    }
}

pub fn anchor_joints(category: Category) -> &'static [Joint] {
    match category {
        Category::Form => &[
            Joint::LeftShoulder,
            Joint::RightShoulder,
            Joint::LeftHip,
            Joint::RightHip,
        ],
        Category::Depth => &[Joint::LeftHip, Joint::RightHip, Joint::LeftKnee, Joint::RightKnee],
        Category::Alignment => &[
            Joint::LeftKnee,
            Joint::RightKnee,
            Joint::LeftAnkle,
            Joint::RightAnkle,
        ],
        Category::Balance => &[
            Joint::LeftHip,
            Joint::RightHip,
            Joint::LeftAnkle,
            Joint::RightAnkle,
        ],
    }
}

fn category_slot(category: Category) -> usize {
    match category {
        Category::Form => 0,
        Category::Depth => 1,
        Category::Alignment => 2,
        Category::Balance => 3,
    }
}

/// Smoothed category scoring.
pub struct ScoringEngine {
    config: ScoringConfig,
    depth_curve: DepthCurve,
    scores: CategoryScores,
    seeded: [bool; 4],
    history: [VecDeque<f64>; 4],
    evaluation_count: u64,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig, depth_curve: DepthCurve) -> Self {
        let capacity = config.history_len;
        Self {
            config,
            depth_curve,
            scores: CategoryScores::default(),
            seeded: [false; 4],
            history: [
                VecDeque::with_capacity(capacity),
                VecDeque::with_capacity(capacity),
                VecDeque::with_capacity(capacity),
                VecDeque::with_capacity(capacity),
            ],
            evaluation_count: 0,
        }
    }

    /// Score the frame that triggered a phase change.
    ///
    /// Alignment and balance are skipped when `frontal` is false, since they
    /// cannot be judged from a side-on view.
    pub fn evaluate(
        &mut self,
        metrics: &FrameMetrics,
        phase: ExercisePhase,
        frontal: bool,
        depth: DepthEvidence,
    ) -> Evaluation {
        self.evaluation_count += 1;
        let mut evaluation = Evaluation::default();
        let in_hole = phase == ExercisePhase::Bottom;

        let mut sub_scores = vec![(Category::Form, BACK_ANGLE_CURVE.score(metrics.back_angle))];
        if frontal {
            sub_scores.push((
                Category::Alignment,
                KNEE_ALIGNMENT_CURVE.score(metrics.knee_alignment),
            ));
            sub_scores.push((Category::Balance, BALANCE_CURVE.score(metrics.balance)));
        }

        for &(category, score) in &sub_scores {
            self.blend(category, score);
            if in_hole && score < self.config.correction_threshold {
                evaluation.issues.push(Self::issue(category, score));
            }
        }

        match depth {
            DepthEvidence::None => {}
            DepthEvidence::Provisional(value) => {
                let score = self.depth_curve.score(value);
                self.blend(Category::Depth, score);
                sub_scores.push((Category::Depth, score));
            }
            DepthEvidence::Final(value) => {
                let score = self.depth_curve.score(value);
                self.blend(Category::Depth, score);
                sub_scores.push((Category::Depth, score));
                if score < self.config.correction_threshold {
                    evaluation.issues.push(Self::issue(Category::Depth, score));
                }
            }
        }

        evaluation.sub_scores = sub_scores;
        evaluation
    }

    fn issue(category: Category, score: f64) -> FormIssue {
        FormIssue {
            category,
            score,
            severity: severity_for(score),
            message: correction_message(category),
            anchors: anchor_joints(category),
        }
    }

    fn blend(&mut self, category: Category, sample: f64) {
        let slot = category_slot(category);
        let sample = sample.clamp(0.0, 100.0);
        let blended = if self.seeded[slot] {
            let current = self.scores.get(category);
            current + self.config.smoothing_alpha * (sample - current)
        } else {
            self.seeded[slot] = true;
            sample
        };
        self.scores.set(category, blended.clamp(0.0, 100.0));

        let history = &mut self.history[slot];
        if history.len() >= self.config.history_len {
            history.pop_front();
        }
        history.push_back(sample);
    }

    pub fn scores(&self) -> &CategoryScores {
        &self.scores
    }

    pub fn overall(&self) -> f64 {
        self.config.weights.overall(&self.scores)
    }

    /// Recent raw sub-scores for a category, oldest first.
    pub fn history(&self, category: Category) -> &VecDeque<f64> {
        &self.history[category_slot(category)]
    }

    pub fn evaluation_count(&self) -> u64 {
        self.evaluation_count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone(), self.depth_curve);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(
            ScoringConfig::default(),
            DepthCurve {
                bottom: 0.55,
                descent: 0.8,
            },
        )
    }

    fn perfect() -> FrameMetrics {
        FrameMetrics {
            back_angle: 0.0,
            knee_alignment: 0.0,
            balance: 0.0,
            frontal_ratio: 0.4,
        }
    }

    #[test]
    fn test_weights_all_perfect() {
        let weights = CategoryWeights::default();
        assert_approx_eq!(weights.overall(&CategoryScores::uniform(100.0)), 100.0, 1e-9);
    }

    #[test]
    fn test_weights_form_half() {
        let weights = CategoryWeights::default();
        let mut scores = CategoryScores::uniform(100.0);
        scores.form = 50.0;
        assert_approx_eq!(weights.overall(&scores), 85.0, 1e-9);
    }

    #[test]
    fn test_weights_validate() {
        assert!(CategoryWeights::default().validate().is_ok());
        let bad = CategoryWeights {
            form: 0.5,
            ..CategoryWeights::default()
        };
        assert!(bad.validate().is_err());
        let negative = CategoryWeights {
            form: -0.1,
            depth: 0.65,
            ..CategoryWeights::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_for(10.0), Severity::Major);
        assert_eq!(severity_for(39.9), Severity::Major);
        assert_eq!(severity_for(40.0), Severity::Moderate);
        assert_eq!(severity_for(54.9), Severity::Moderate);
        assert_eq!(severity_for(55.0), Severity::Minor);
    }

    #[test]
    fn test_first_sample_seeds_then_blends() {
        let mut engine = engine();
        let leaning = FrameMetrics {
            back_angle: 45.0,
            ..perfect()
        };
        engine.evaluate(&leaning, ExercisePhase::Descent, true, DepthEvidence::None);
        assert_approx_eq!(engine.scores().form, 60.0, 1e-9);

        engine.evaluate(&perfect(), ExercisePhase::Ascent, true, DepthEvidence::None);
        // 60 + 0.2 * (100 - 60)
        assert_approx_eq!(engine.scores().form, 68.0, 1e-9);
        assert_eq!(engine.history(Category::Form).len(), 2);
    }

    #[test]
    fn test_issues_only_in_bottom() {
        let mut engine = engine();
        let leaning = FrameMetrics {
            back_angle: 60.0,
            ..perfect()
        };
        let descent = engine.evaluate(&leaning, ExercisePhase::Descent, true, DepthEvidence::None);
        assert!(descent.issues.is_empty(), "No issues outside the bottom");

        let bottom = engine.evaluate(
            &leaning,
            ExercisePhase::Bottom,
            true,
            DepthEvidence::Provisional(0.5),
        );
        assert_eq!(bottom.issues.len(), 1);
        let issue = &bottom.issues[0];
        assert_eq!(issue.category, Category::Form);
        assert_eq!(issue.severity, Severity::Major);
        assert_eq!(issue.kind(), FeedbackKind::Error);
        assert_eq!(issue.message, "Keep your chest up and back straight");
    }

    #[test]
    fn test_shallow_rep_raises_depth_issue() {
        let mut engine = engine();
        let evaluation = engine.evaluate(
            &perfect(),
            ExercisePhase::Top,
            true,
            DepthEvidence::Final(0.675),
        );
        // (0.8 - 0.675) / 0.25 * 100 = 50
        assert_eq!(evaluation.issues.len(), 1);
        assert_eq!(evaluation.issues[0].category, Category::Depth);
        assert_eq!(evaluation.issues[0].severity, Severity::Moderate);
        assert_approx_eq!(engine.scores().depth, 50.0, 1e-6);
    }

    #[test]
    fn test_side_view_skips_frontal_categories() {
        let mut engine = engine();
        let bad_knees = FrameMetrics {
            knee_alignment: 0.6,
            balance: 0.6,
            frontal_ratio: 0.05,
            ..perfect()
        };
        let evaluation =
            engine.evaluate(&bad_knees, ExercisePhase::Bottom, false, DepthEvidence::None);
        assert!(evaluation.issues.is_empty());
        assert_eq!(engine.scores().alignment, 100.0);
        assert!(engine.history(Category::Alignment).is_empty());
    }

    #[test]
    fn test_history_bounded() {
        let mut engine = ScoringEngine::new(
            ScoringConfig {
                history_len: 4,
                ..ScoringConfig::default()
            },
            DepthCurve {
                bottom: 0.55,
                descent: 0.8,
            },
        );
        for _ in 0..10 {
            engine.evaluate(&perfect(), ExercisePhase::Descent, true, DepthEvidence::None);
        }
        assert_eq!(engine.history(Category::Form).len(), 4);
        assert_eq!(engine.evaluation_count(), 10);
    }

    #[test]
    fn test_reset_restores_perfect_scores() {
        let mut engine = engine();
        let bad = FrameMetrics {
            back_angle: 80.0,
            ..perfect()
        };
        engine.evaluate(&bad, ExercisePhase::Bottom, true, DepthEvidence::None);
        assert_eq!(engine.scores().form, 0.0);
        engine.reset();
        assert_eq!(engine.scores().form, 100.0);
        assert!(engine.history(Category::Form).is_empty());
    }
}
