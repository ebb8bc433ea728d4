//! Advisory Classifier Module.
//!
//! Optional learned model that second-guesses the rule-based scoring. The
//! classifier is slow relative to the frame rate, so it runs on a tokio task:
//! frames are offered through a bounded channel (dropped when the worker is
//! busy) and the newest prediction is published into a `watch` slot that the
//! session polls without blocking.
//!
//! Classifier failures, timeouts and a dead worker never reach the caller.
//! They are logged and the session carries on with rule-based feedback only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::types::{Category, PoseFrame};

/// Configuration for the advisory worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Minimum frame-time gap between submitted frames.
    pub interval_ms: u64,
    /// Predictions and issues below this confidence are ignored.
    pub min_confidence: f32,
    /// Per-prediction deadline.
    pub timeout_ms: u64,
    /// Predictions older than this (in frame time) are discarded.
    pub max_age_ms: u64,
    /// Pending requests the worker may queue.
    pub queue_capacity: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            min_confidence: 0.7,
            timeout_ms: 300,
            max_age_ms: 2000,
            queue_capacity: 1,
        }
    }
}

/// Form problems a classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryIssueKind {
    BackRounding,
    ShallowDepth,
    KneeValgus,
    WeightShift,
}

impl AdvisoryIssueKind {
    pub fn category(self) -> Category {
        match self {
            AdvisoryIssueKind::BackRounding => Category::Form,
            AdvisoryIssueKind::ShallowDepth => Category::Depth,
            AdvisoryIssueKind::KneeValgus => Category::Alignment,
            AdvisoryIssueKind::WeightShift => Category::Balance,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AdvisoryIssueKind::BackRounding => "Your back looks rounded, brace your core",
            AdvisoryIssueKind::ShallowDepth => "Try sinking a little lower on the next rep",
            AdvisoryIssueKind::KneeValgus => "Your knees look like they are caving in, push them out",
            AdvisoryIssueKind::WeightShift => "You are shifting to one side, spread your weight evenly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryIssue {
    pub kind: AdvisoryIssueKind,
    pub confidence: f32,
}

/// Classifier output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryPrediction {
    /// Classifier label for the frame, e.g. "good_form".
    pub category: String,
    pub confidence: f32,
    pub issues: Vec<AdvisoryIssue>,
}

/// A trainable form classifier.
#[async_trait]
pub trait AdvisoryClassifier: Send + Sync + 'static {
    async fn predict(&self, frame: &PoseFrame) -> Result<AdvisoryPrediction>;

    async fn add_training_example(&self, frame: &PoseFrame, label: &str) -> Result<()>;
}

enum AdvisoryRequest {
    Predict { frame: PoseFrame, generation: u64 },
    Train { frame: PoseFrame, label: String },
}

/// A prediction together with the frame time it was made for.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPrediction {
    pub frame_timestamp_ms: u64,
    /// Handle generation the frame was submitted under; bumped by `clear`.
    pub generation: u64,
    pub prediction: AdvisoryPrediction,
}

/// Session-side handle to the background classifier task.
pub struct AdvisoryHandle {
    config: AdvisoryConfig,
    requests: mpsc::Sender<AdvisoryRequest>,
    latest: watch::Receiver<Option<PublishedPrediction>>,
    task: JoinHandle<()>,
    last_submit_ms: Option<u64>,
    generation: u64,

    // Statistics
    submitted: u64,
    skipped: u64,
}

impl AdvisoryHandle {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(classifier: Arc<dyn AdvisoryClassifier>, config: AdvisoryConfig) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::AdvisoryUnavailable(e.to_string()))?;

        let (requests, mut inbox) = mpsc::channel(config.queue_capacity.max(1));
        let (publisher, latest) = watch::channel(None);
        let deadline = Duration::from_millis(config.timeout_ms);

        let task = runtime.spawn(async move {
            while let Some(request) = inbox.recv().await {
                match request {
                    AdvisoryRequest::Predict { frame, generation } => {
                        let timestamp_ms = frame.timestamp_ms;
                        match tokio::time::timeout(deadline, classifier.predict(&frame)).await {
                            Ok(Ok(prediction)) => {
                                trace!(timestamp_ms, label = %prediction.category, "advisory prediction");
                                let published = PublishedPrediction {
                                    frame_timestamp_ms: timestamp_ms,
                                    generation,
                                    prediction,
                                };
                                if publisher.send(Some(published)).is_err() {
                                    break;
                                }
                            }
                            Ok(Err(e)) => debug!(timestamp_ms, error = %e, "advisory prediction failed"),
                            Err(_) => debug!(
                                timestamp_ms,
                                timeout_ms = deadline.as_millis() as u64,
                                "advisory prediction timed out"
                            ),
                        }
                    }
                    AdvisoryRequest::Train { frame, label } => {
                        if let Err(e) = classifier.add_training_example(&frame, &label).await {
                            debug!(label = %label, error = %e, "failed to add training example");
                        }
                    }
                }
            }
            debug!("advisory worker stopped");
        });

        Ok(Self {
            config,
            requests,
            latest,
            task,
            last_submit_ms: None,
            generation: 0,
            submitted: 0,
            skipped: 0,
        })
    }

    /// Offer a frame to the worker if the cadence allows it.
    /// Never blocks; a busy worker means the frame is skipped.
    pub fn maybe_submit(&mut self, frame: &PoseFrame) -> bool {
        if let Some(last) = self.last_submit_ms {
            if frame.timestamp_ms.saturating_sub(last) < self.config.interval_ms {
                return false;
            }
        }

        let request = AdvisoryRequest::Predict {
            frame: frame.clone(),
            generation: self.generation,
        };
        match self.requests.try_send(request) {
            Ok(()) => {
                self.last_submit_ms = Some(frame.timestamp_ms);
                self.submitted += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.skipped += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("advisory worker is gone, frame dropped");
                false
            }
        }
    }

    /// Queue a labelled example for the classifier.
    pub fn submit_training_example(&self, frame: &PoseFrame, label: impl Into<String>) -> Result<()> {
        self.requests
            .try_send(AdvisoryRequest::Train {
                frame: frame.clone(),
                label: label.into(),
            })
            .map_err(|e| Error::AdvisoryUnavailable(e.to_string()))
    }

    /// Newest unseen prediction that is still fresh at `now_ms`.
    ///
    /// Predictions from before the last `clear`, or for frames later than
    /// `now_ms`, are dropped.
    pub fn take_latest(&mut self, now_ms: u64) -> Option<PublishedPrediction> {
        match self.latest.has_changed() {
            Ok(true) => {}
            _ => return None,
        }
        let published = self.latest.borrow_and_update().clone()?;
        if published.generation != self.generation {
            trace!(
                generation = published.generation,
                current = self.generation,
                "dropping prediction from a cleared session"
            );
            return None;
        }
        if published.frame_timestamp_ms > now_ms
            || now_ms - published.frame_timestamp_ms > self.config.max_age_ms
        {
            return None;
        }
        Some(published)
    }

    /// Forget any pending or in-flight prediction and restart the cadence.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.latest.borrow_and_update();
        self.last_submit_ms = None;
    }

    pub fn config(&self) -> &AdvisoryConfig {
        &self.config
    }

    /// Get (frames submitted, frames skipped because the worker was busy).
    pub fn statistics(&self) -> (u64, u64) {
        (self.submitted, self.skipped)
    }
}

impl Drop for AdvisoryHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::squat_frame;
    use std::sync::Mutex;

    struct FixedClassifier {
        prediction: AdvisoryPrediction,
        labels: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AdvisoryClassifier for FixedClassifier {
        async fn predict(&self, _frame: &PoseFrame) -> Result<AdvisoryPrediction> {
            Ok(self.prediction.clone())
        }

        async fn add_training_example(&self, _frame: &PoseFrame, label: &str) -> Result<()> {
            if let Ok(mut labels) = self.labels.lock() {
                labels.push(label.to_string());
            }
            Ok(())
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl AdvisoryClassifier for SlowClassifier {
        async fn predict(&self, _frame: &PoseFrame) -> Result<AdvisoryPrediction> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(Error::Classifier("unreachable".to_string()))
        }

        async fn add_training_example(&self, _frame: &PoseFrame, _label: &str) -> Result<()> {
            Ok(())
        }
    }

    fn valgus_prediction() -> AdvisoryPrediction {
        AdvisoryPrediction {
            category: "bad_form".to_string(),
            confidence: 0.9,
            issues: vec![AdvisoryIssue {
                kind: AdvisoryIssueKind::KneeValgus,
                confidence: 0.85,
            }],
        }
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let result = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default());
        assert!(matches!(result, Err(Error::AdvisoryUnavailable(_))));
    }

    #[tokio::test]
    async fn test_prediction_published() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let mut handle = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default()).unwrap();

        assert!(handle.take_latest(0).is_none());
        assert!(handle.maybe_submit(&squat_frame(1000, 1.0)));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let published = handle.take_latest(1100).expect("Prediction should be published");
        assert_eq!(published.frame_timestamp_ms, 1000);
        assert_eq!(published.prediction, valgus_prediction());
        assert!(handle.take_latest(1100).is_none(), "Each prediction is taken once");
    }

    #[tokio::test]
    async fn test_submit_cadence() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let mut handle = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default()).unwrap();

        assert!(handle.maybe_submit(&squat_frame(0, 1.0)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.maybe_submit(&squat_frame(200, 1.0)), "Too soon after last submit");
        assert!(handle.maybe_submit(&squat_frame(500, 1.0)));
        assert_eq!(handle.statistics().0, 2);
    }

    #[tokio::test]
    async fn test_stale_prediction_dropped() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let mut handle = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default()).unwrap();
        handle.maybe_submit(&squat_frame(0, 1.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.take_latest(10_000).is_none());
    }

    #[tokio::test]
    async fn test_prediction_from_the_future_dropped() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let mut handle = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default()).unwrap();
        handle.maybe_submit(&squat_frame(5_000, 1.0));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.take_latest(100).is_none(), "Frame time ahead of now is not fresh");
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_prediction() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let mut handle = AdvisoryHandle::spawn(classifier, AdvisoryConfig::default()).unwrap();
        assert!(handle.maybe_submit(&squat_frame(1_000, 1.0)));
        // Cleared before the worker publishes.
        handle.clear();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.take_latest(1_100).is_none());

        assert!(handle.maybe_submit(&squat_frame(1_200, 1.0)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let published = handle.take_latest(1_300).expect("New generation is accepted");
        assert_eq!(published.generation, 1);
    }

    #[tokio::test]
    async fn test_timeout_is_ignored() {
        let config = AdvisoryConfig {
            timeout_ms: 10,
            ..AdvisoryConfig::default()
        };
        let mut handle = AdvisoryHandle::spawn(Arc::new(SlowClassifier), config).unwrap();
        handle.maybe_submit(&squat_frame(0, 1.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.take_latest(100).is_none());
    }

    #[tokio::test]
    async fn test_training_examples_forwarded() {
        let classifier = Arc::new(FixedClassifier {
            prediction: valgus_prediction(),
            labels: Mutex::new(Vec::new()),
        });
        let handle = AdvisoryHandle::spawn(classifier.clone(), AdvisoryConfig::default()).unwrap();
        handle
            .submit_training_example(&squat_frame(0, 0.5), "good_form")
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*classifier.labels.lock().unwrap(), vec!["good_form".to_string()]);
    }

    #[test]
    fn test_issue_kind_mapping() {
        assert_eq!(AdvisoryIssueKind::BackRounding.category(), Category::Form);
        assert_eq!(AdvisoryIssueKind::WeightShift.category(), Category::Balance);
    }
}
