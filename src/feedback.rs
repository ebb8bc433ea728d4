//! Feedback Manager Module.
//!
//! Owns the list of messages shown to the user. Form issues fire on every
//! qualifying phase change, which would flood the screen without
//! throttling, so the manager enforces:
//! - One item per message text
//! - A cooldown during which a repeated message only refreshes its timestamp
//! - A time-to-live after which items disappear
//! - A cap on the number of visible items (newest first)
//!
//! Every newly raised issue also deducts a severity-weighted penalty from a
//! cumulative per-category score used in the session summary.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::advisory::AdvisoryPrediction;
use crate::types::{Category, CategoryScores, FeedbackItem, FeedbackKind, Joint, Severity};

/// Penalty deducted from the cumulative category score per raised issue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityScores {
    pub minor: f64,
    pub moderate: f64,
    pub major: f64,
}

impl Default for SeverityScores {
    fn default() -> Self {
        Self {
            minor: 2.0,
            moderate: 5.0,
            major: 10.0,
        }
    }
}

impl SeverityScores {
    pub fn get(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Minor => self.minor,
            Severity::Moderate => self.moderate,
            Severity::Major => self.major,
        }
    }
}

/// Configuration for feedback throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Repeats of a message inside this window only refresh it.
    pub cooldown_ms: u64,
    /// Items older than this are purged.
    pub ttl_ms: u64,
    pub max_items: usize,
    pub severity_scores: SeverityScores,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 2000,
            ttl_ms: 4000,
            max_items: 10,
            severity_scores: SeverityScores::default(),
        }
    }
}

/// What `add_feedback` did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// A new item was created.
    Added,
    /// An identical recent item had its timestamp refreshed.
    Refreshed,
}

/// De-duplicating, throttled feedback list.
pub struct FeedbackManager {
    config: FeedbackConfig,
    items: VecDeque<FeedbackItem>,
    cumulative: CategoryScores,
    last_advisory_rep: Option<u32>,

    // Statistics
    raised_count: u64,
}

impl FeedbackManager {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            items: VecDeque::new(),
            cumulative: CategoryScores::default(),
            last_advisory_rep: None,
            raised_count: 0,
        }
    }

    /// Raise a message at frame time `now_ms`.
    pub fn add_feedback(
        &mut self,
        now_ms: u64,
        message: impl Into<String>,
        category: Category,
        kind: FeedbackKind,
        severity: Severity,
        anchors: &[Joint],
    ) -> FeedbackOutcome {
        let message = message.into();

        if let Some(pos) = self.items.iter().position(|item| item.message == message) {
            if now_ms.saturating_sub(self.items[pos].created_at_ms) < self.config.cooldown_ms {
                self.items[pos].created_at_ms = now_ms;
                return FeedbackOutcome::Refreshed;
            }
            self.items.remove(pos);
        }

        if kind != FeedbackKind::Success {
            let penalty = self.config.severity_scores.get(severity);
            let current = self.cumulative.get(category);
            self.cumulative.set(category, (current - penalty).max(0.0));
        }

        debug!(now_ms, message = %message, ?category, ?severity, "feedback raised");
        self.items.push_front(FeedbackItem {
            message,
            category,
            severity,
            kind,
            created_at_ms: now_ms,
            anchor_landmarks: anchors.to_vec(),
        });
        self.items.truncate(self.config.max_items);
        self.raised_count += 1;
        FeedbackOutcome::Added
    }

    /// Purge expired items and return the active list, newest first.
    pub fn get_feedback(&mut self, now_ms: u64) -> Vec<FeedbackItem> {
        self.purge_expired(now_ms);
        self.items.iter().cloned().collect()
    }

    fn purge_expired(&mut self, now_ms: u64) {
        let ttl = self.config.ttl_ms;
        self.items
            .retain(|item| now_ms.saturating_sub(item.created_at_ms) <= ttl);
    }

    /// Remove a message. Returns whether it was present.
    pub fn dismiss(&mut self, message: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.message != message);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Fold a classifier prediction into the feedback list.
    ///
    /// At most one prediction is merged per rep. Returns the number of items
    /// raised.
    pub fn merge_advisory(
        &mut self,
        now_ms: u64,
        rep_index: u32,
        prediction: &AdvisoryPrediction,
        min_confidence: f32,
    ) -> usize {
        if self.last_advisory_rep == Some(rep_index) {
            return 0;
        }
        if prediction.confidence < min_confidence {
            return 0;
        }
        self.last_advisory_rep = Some(rep_index);

        let mut raised = 0;
        for issue in prediction
            .issues
            .iter()
            .filter(|issue| issue.confidence >= min_confidence)
        {
            let severity = if issue.confidence >= 0.9 {
                Severity::Moderate
            } else {
                Severity::Minor
            };
            let outcome = self.add_feedback(
                now_ms,
                issue.kind.message(),
                issue.kind.category(),
                FeedbackKind::Warning,
                severity,
                &[],
            );
            if outcome == FeedbackOutcome::Added {
                raised += 1;
            }
        }
        raised
    }

    /// Session-level category scores after issue penalties.
    pub fn cumulative_scores(&self) -> &CategoryScores {
        &self.cumulative
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of items ever raised (refreshes excluded).
    pub fn raised_count(&self) -> u64 {
        self.raised_count
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl Default for FeedbackManager {
    fn default() -> Self {
        Self::new(FeedbackConfig::default())
    }
}
