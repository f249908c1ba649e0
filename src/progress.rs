//! Ordered training progress channel
//!
//! The orchestrator narrates each run as a fixed sequence of events. The
//! sink is a synchronous ordered-publish interface; pacing and transport
//! are the caller's concern.

use crate::training::Metrics;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One feature with its normalized importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Progress events, emitted in this exact order per run, one terminal
/// `Finished` last on both success and failure paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    ParamsReceived,
    TargetColumn {
        name: String,
    },
    FeatureCount {
        count: usize,
    },
    ProblemTypeSelected {
        problem_type: String,
    },
    DataSize {
        rows: usize,
    },
    SplitRatio {
        train_ratio: f64,
    },
    PreprocessingStarted,
    PreprocessingComplete {
        feature_count: usize,
        sample_count: usize,
    },
    SplitComplete {
        train_count: usize,
        test_count: usize,
    },
    ModelSelected {
        model: String,
    },
    TrainingStarted,
    TrainingComplete,
    EvaluationStarted,
    MetricsReport {
        metrics: Metrics,
    },
    SamplePrediction {
        actual: f64,
        predicted: f64,
    },
    TopFeatures {
        importances: Vec<FeatureImportance>,
    },
    Finished {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Ordered event sink. Publish never fails; a sink whose consumer has
/// gone away drops events silently.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Sink that discards every event
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Sink that records events in memory, for tests and summaries
#[derive(Debug, Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressSink for MemorySink {
    fn publish(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Sink backed by an unbounded channel; the receiver half streams
/// events to whatever transport the caller wires up.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&self, event: ProgressEvent) {
        // Receiver dropped means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}
