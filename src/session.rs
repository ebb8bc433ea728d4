//! Exercise Session Module.
//!
//! Orchestrates all stages for one workout:
//! 1. Landmark validation (tracking loss short-circuits everything)
//! 2. Depth estimation and form metrics
//! 3. Phase tracking
//! 4. Scoring and feedback on phase changes
//! 5. Rep validation and recording on cycle completion
//! 6. Advisory classifier polling
//!
//! `analyze` is infallible from the caller's point of view. Anything that
//! goes wrong inside a frame is logged and reported as an error item in the
//! result, and the next frame is processed normally.

use tracing::{debug, error, info};

use crate::advisory::AdvisoryHandle;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::export::SessionSummary;
use crate::feedback::FeedbackManager;
use crate::metrics::FrameMetrics;
use crate::phase_detection::{PhaseTracker, PhaseUpdate};
use crate::rep_detection::RepRecorder;
use crate::scoring::{DepthEvidence, ScoringEngine};
use crate::signal::DepthEstimator;
use crate::types::*;
use crate::validation::{FrameStatus, LandmarkValidator, ValidationReport};

/// Guidance shown when the camera sees the body side-on.
pub const CAMERA_PROFILE_MESSAGE: &str = "Turn to face the camera so your hips and knees are visible";

/// Everything that is rebuilt on reset.
struct SessionState {
    validator: LandmarkValidator,
    depth: DepthEstimator,
    phase: PhaseTracker,
    scoring: ScoringEngine,
    feedback: FeedbackManager,
    reps: RepRecorder,

    first_timestamp_ms: Option<u64>,
    last_frame: Option<PoseFrame>,
    tracking_confidence: f64,
    frames_analyzed: u64,
}

impl SessionState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            validator: LandmarkValidator::new(config.validation.clone()),
            depth: DepthEstimator::new(config.depth.clone()),
            phase: PhaseTracker::new(config.phase.clone()),
            scoring: ScoringEngine::new(config.scoring.clone(), config.depth_curve()),
            feedback: FeedbackManager::new(config.feedback.clone()),
            reps: RepRecorder::new(config.reps.clone()),
            first_timestamp_ms: None,
            last_frame: None,
            tracking_confidence: 0.0,
            frames_analyzed: 0,
        }
    }
}

/// A single-exercise analysis session.
pub struct ExerciseSession {
    kind: ExerciseKind,
    config: EngineConfig,
    state: SessionState,
    advisory: Option<AdvisoryHandle>,
}

impl ExerciseSession {
    /// Create a session. Fails if the configuration is inconsistent.
    pub fn new(kind: ExerciseKind, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let state = SessionState::new(&config);
        info!(exercise = kind.as_str(), "session started");
        Ok(Self {
            kind,
            config,
            state,
            advisory: None,
        })
    }

    /// Attach a background advisory classifier.
    pub fn with_advisory(mut self, advisory: AdvisoryHandle) -> Self {
        self.advisory = Some(advisory);
        self
    }

    /// Analyze one frame.
    pub fn analyze(&mut self, frame: &PoseFrame) -> AnalysisResult {
        match self.try_analyze(frame) {
            Ok(result) => result,
            Err(e) => {
                error!(timestamp_ms = frame.timestamp_ms, error = %e, "frame analysis failed");
                self.error_result(frame.timestamp_ms, &e)
            }
        }
    }

    fn try_analyze(&mut self, frame: &PoseFrame) -> Result<AnalysisResult> {
        // Checks that can fail run before any state is touched.
        if let Some(joint) = frame.first_non_finite() {
            return Err(Error::NonFiniteLandmark { joint });
        }
        if let Some(last) = &self.state.last_frame {
            if frame.timestamp_ms < last.timestamp_ms {
                return Err(Error::TimestampRegression {
                    previous: last.timestamp_ms,
                    current: frame.timestamp_ms,
                });
            }
            if last == frame {
                return Ok(self.snapshot(frame.timestamp_ms));
            }
        }

        let now = frame.timestamp_ms;
        let report = self
            .state
            .validator
            .validate(frame, self.kind.required_joints());
        self.state.tracking_confidence = report.confidence;

        if !report.is_valid() {
            self.commit_frame(frame);
            return Ok(match report.status {
                FrameStatus::Lost => self.tracking_lost_result(now, &report),
                _ => self.snapshot(now),
            });
        }

        let metrics = FrameMetrics::compute(frame)?;
        let depth = self.state.depth.update(frame)?;
        self.commit_frame(frame);

        let frontal = metrics.frontal_ratio >= self.config.scoring.min_frontal_ratio;
        if frontal {
            self.state.feedback.dismiss(CAMERA_PROFILE_MESSAGE);
        } else {
            self.state.feedback.add_feedback(
                now,
                CAMERA_PROFILE_MESSAGE,
                Category::Alignment,
                FeedbackKind::Warning,
                Severity::Minor,
                &[Joint::LeftHip, Joint::RightHip],
            );
        }

        self.state.reps.observe(&metrics);

        if let Some(sample) = depth {
            let update = self.state.phase.update(sample.smoothed, now);
            if update.changed {
                self.on_phase_change(now, &metrics, frontal, &update);
            }
        }

        self.poll_advisory(frame);
        Ok(self.snapshot(now))
    }

    fn commit_frame(&mut self, frame: &PoseFrame) {
        self.state.first_timestamp_ms.get_or_insert(frame.timestamp_ms);
        self.state.last_frame = Some(frame.clone());
        self.state.frames_analyzed += 1;
    }

    fn on_phase_change(
        &mut self,
        now: u64,
        metrics: &FrameMetrics,
        frontal: bool,
        update: &PhaseUpdate,
    ) {
        debug!(timestamp_ms = now, from = %update.previous, to = %update.phase, "phase change");

        if update.previous == ExercisePhase::Top && update.phase == ExercisePhase::Descent {
            self.state.reps.start_cycle();
            self.state.reps.observe(metrics);
        }

        let evidence = match (&update.completed, update.phase) {
            (Some(completion), _) => DepthEvidence::Final(completion.max_depth),
            (None, ExercisePhase::Bottom) => self
                .state
                .phase
                .cycle_depth()
                .map_or(DepthEvidence::None, DepthEvidence::Provisional),
            _ => DepthEvidence::None,
        };

        let evaluation = self
            .state
            .scoring
            .evaluate(metrics, update.phase, frontal, evidence);
        for issue in &evaluation.issues {
            self.state.feedback.add_feedback(
                now,
                issue.message,
                issue.category,
                issue.kind(),
                issue.severity,
                issue.anchors,
            );
        }

        if let Some(completion) = &update.completed {
            let score = self.state.scoring.overall();
            if let Ok(rep) = self.state.reps.record(completion, score) {
                if let Some(message) = rep.celebration {
                    self.state.feedback.add_feedback(
                        now,
                        message,
                        Category::Form,
                        FeedbackKind::Success,
                        Severity::Minor,
                        &[],
                    );
                }
            }
        }
    }

    fn poll_advisory(&mut self, frame: &PoseFrame) {
        let advisory = match self.advisory.as_mut() {
            Some(advisory) => advisory,
            None => return,
        };
        advisory.maybe_submit(frame);
        if let Some(published) = advisory.take_latest(frame.timestamp_ms) {
            let min_confidence = advisory.config().min_confidence;
            let raised = self.state.feedback.merge_advisory(
                frame.timestamp_ms,
                self.state.reps.rep_count(),
                &published.prediction,
                min_confidence,
            );
            if raised > 0 {
                debug!(timestamp_ms = frame.timestamp_ms, raised, "merged advisory feedback");
            }
        }
    }

    fn snapshot(&mut self, now: u64) -> AnalysisResult {
        let state = &mut self.state;
        AnalysisResult {
            timestamp_ms: now,
            phase: state.phase.phase(),
            feedback: state.feedback.get_feedback(now),
            category_scores: *state.scoring.scores(),
            overall_score: state.scoring.overall(),
            rep_count: state.reps.rep_count(),
            consecutive_good_reps: state.reps.streak(),
            rep_history: state.reps.history().to_vec(),
            is_initializing: !state.depth.is_calibrated()
                || state.phase.phase() == ExercisePhase::Start,
            tracking_confidence: state.tracking_confidence,
            is_video_complete: false,
        }
    }

    fn tracking_lost_result(&mut self, now: u64, report: &ValidationReport) -> AnalysisResult {
        let message = report
            .reason
            .clone()
            .unwrap_or_else(|| crate::validation::TRACKING_LOST_MESSAGE.to_string());
        let mut result = self.snapshot(now);
        result.overall_score = 0.0;
        result.feedback = vec![FeedbackItem {
            message,
            category: Category::Form,
            severity: Severity::Major,
            kind: FeedbackKind::Error,
            created_at_ms: now,
            anchor_landmarks: report.missing.clone(),
        }];
        result
    }

    fn error_result(&mut self, now: u64, err: &Error) -> AnalysisResult {
        let mut result = self.snapshot(now);
        result.overall_score = 0.0;
        result.feedback = vec![FeedbackItem {
            message: format!("Analysis error: {}", err),
            category: Category::Form,
            severity: Severity::Major,
            kind: FeedbackKind::Error,
            created_at_ms: now,
            anchor_landmarks: Vec::new(),
        }];
        result
    }

    /// Start over with fresh state, keeping the exercise and configuration.
    pub fn reset(&mut self) {
        info!(
            exercise = self.kind.as_str(),
            reps = self.state.reps.rep_count(),
            "session reset"
        );
        self.state = SessionState::new(&self.config);
        if let Some(advisory) = self.advisory.as_mut() {
            advisory.clear();
        }
    }

    /// Switch exercise. Resets the session if the selection changes.
    pub fn set_exercise(&mut self, kind: ExerciseKind) {
        if kind != self.kind {
            self.kind = kind;
            self.reset();
        }
    }

    /// Close the session and summarize it.
    pub fn finalize(&mut self) -> SessionSummary {
        let state = &self.state;
        let duration_ms = match (state.first_timestamp_ms, &state.last_frame) {
            (Some(first), Some(last)) => last.timestamp_ms.saturating_sub(first),
            _ => 0,
        };
        let summary = SessionSummary {
            exercise: self.kind,
            rep_count: state.reps.rep_count(),
            rejected_reps: state.reps.rejected_count(),
            overall_score: state.reps.average_score(),
            best_score: state.reps.best_score(),
            consecutive_good_reps: state.reps.streak(),
            category_scores: *state.scoring.scores(),
            cumulative_scores: *state.feedback.cumulative_scores(),
            rep_history: state.reps.history().to_vec(),
            frames_analyzed: state.frames_analyzed,
            duration_ms,
            is_video_complete: true,
        };
        info!(
            reps = summary.rep_count,
            rejected = summary.rejected_reps,
            overall = summary.overall_score,
            "session finalized"
        );

        let (frames_checked, frames_lost) = state.validator.statistics();
        let (transitions, abandoned) = state.phase.statistics();
        debug!(
            frames_checked,
            frames_lost,
            transitions,
            abandoned,
            evaluations = state.scoring.evaluation_count(),
            feedback_raised = state.feedback.raised_count(),
            baseline_ratio = ?state.depth.baseline().map(|b| b.hip_ankle_ratio),
            "session statistics"
        );
        if let Some(advisory) = &self.advisory {
            let (submitted, skipped) = advisory.statistics();
            debug!(submitted, skipped, "advisory statistics");
        }
        summary
    }

    /// Queue a labelled frame for the advisory classifier.
    pub fn add_training_example(&self, frame: &PoseFrame, label: &str) -> Result<()> {
        match &self.advisory {
            Some(advisory) => advisory.submit_training_example(frame, label),
            None => Err(Error::AdvisoryUnavailable(
                "no classifier attached".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> ExerciseKind {
        self.kind
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> ExercisePhase {
        self.state.phase.phase()
    }

    pub fn rep_count(&self) -> u32 {
        self.state.reps.rep_count()
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.state.frames_analyzed
    }
}
