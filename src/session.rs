//! Per-session state: dataset, published model, training lock
//!
//! Each session owns its dataset store and at most one live model
//! artifact. Training runs are serialized per session by an exclusive
//! lock; predictions are read-only against whichever artifact reference
//! they captured at call start, so a completing run never invalidates
//! in-flight predictions.

use crate::dataset::{DataSummary, DatasetStore};
use crate::error::{AutotabError, Result};
use crate::inference::{
    self, BatchPredictionResponse, PredictionResponse, Record,
};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::training::{ModelArtifact, TrainOutcome, TrainingConfig, TrainingOrchestrator};
use polars::prelude::DataFrame;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use uuid::Uuid;

pub struct Session {
    id: String,
    store: RwLock<DatasetStore>,
    artifact: RwLock<Option<Arc<ModelArtifact>>>,
    train_lock: Mutex<()>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            id,
            store: RwLock::new(DatasetStore::new()),
            artifact: RwLock::new(None),
            train_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the session's table with a freshly parsed upload
    pub async fn load_data(&self, df: DataFrame, filename: &str) -> Result<DataSummary> {
        let mut store = self.store.write().await;
        let summary = store.load(df, filename)?;
        info!(
            session = %self.id,
            filename,
            rows = summary.shape[0],
            cols = summary.shape[1],
            "dataset loaded"
        );
        Ok(summary)
    }

    /// Run one training pass, narrating progress on `sink`.
    ///
    /// Holds the session's training lock for the whole run. The fit
    /// itself runs on the blocking pool; a successful run atomically
    /// publishes its artifact, a failed one leaves the previous
    /// artifact in place.
    pub async fn train(
        &self,
        config: TrainingConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> TrainOutcome {
        let _guard = self.train_lock.lock().await;

        let df = {
            let store = self.store.read().await;
            match store.frame() {
                Some(frame) => frame.clone(),
                None => {
                    let message = "no dataset loaded".to_string();
                    sink.publish(ProgressEvent::Finished {
                        success: false,
                        error: Some(message.clone()),
                    });
                    return TrainOutcome {
                        success: false,
                        metrics: None,
                        feature_importance: None,
                        error: Some(message),
                    };
                }
            }
        };

        info!(session = %self.id, target = %config.target_column, "training run started");

        let worker_sink = Arc::clone(&sink);
        let joined = tokio::task::spawn_blocking(move || {
            TrainingOrchestrator::run(&df, &config, worker_sink.as_ref())
        })
        .await;

        let (outcome, artifact) = match joined {
            Ok(result) => result,
            Err(join_err) => {
                // Worker panicked; the orchestrator never got to emit
                // its terminal event, so narrate the failure here.
                let message = AutotabError::Internal(join_err.to_string()).to_string();
                error!(session = %self.id, error = %message, "training worker failed");
                sink.publish(ProgressEvent::Finished {
                    success: false,
                    error: Some(message.clone()),
                });
                return TrainOutcome {
                    success: false,
                    metrics: None,
                    feature_importance: None,
                    error: Some(message),
                };
            }
        };

        if let Some(artifact) = artifact {
            let mut slot = self.artifact.write().await;
            *slot = Some(Arc::new(artifact));
        }

        outcome
    }

    /// Score one record against the current artifact
    pub async fn predict(&self, record: Record) -> PredictionResponse {
        let Some(artifact) = self.current_artifact().await else {
            return PredictionResponse::from_result(Err(AutotabError::NotTrained));
        };

        let joined = tokio::task::spawn_blocking(move || {
            inference::predict_one(&artifact, &record)
        })
        .await;

        PredictionResponse::from_result(flatten_join(joined))
    }

    /// Score a batch of records with one model call
    pub async fn predict_batch(&self, records: Vec<Value>) -> BatchPredictionResponse {
        let Some(artifact) = self.current_artifact().await else {
            return BatchPredictionResponse::from_result(Err(AutotabError::NotTrained));
        };

        let joined = tokio::task::spawn_blocking(move || {
            inference::predict_batch(&artifact, &records)
        })
        .await;

        BatchPredictionResponse::from_result(flatten_join(joined))
    }

    pub async fn is_trained(&self) -> bool {
        self.artifact.read().await.is_some()
    }

    async fn current_artifact(&self) -> Option<Arc<ModelArtifact>> {
        self.artifact.read().await.as_ref().map(Arc::clone)
    }
}

fn flatten_join<T>(joined: std::result::Result<Result<T>, tokio::task::JoinError>) -> Result<T> {
    match joined {
        Ok(result) => result,
        Err(join_err) => Err(AutotabError::Internal(join_err.to_string())),
    }
}
