//! Detection cycle orchestration
//!
//! Runs every active, applicable model over the selected metrics, drops
//! candidates already represented in the history and records the rest.
//!
//! Each (metric, model) pair also keeps the newest candidate timestamp it has
//! produced. Later scans ignore candidates at or before that mark, so an
//! anomaly evicted from the bounded history is not reported again.

use super::history::{AnomalyHistory, DEFAULT_HISTORY_CAPACITY};
use super::model::{model_for, DetectionModelConfig, ModelKind, ModelUpdate};
use crate::error::{MonitorError, MonitorResult};
use crate::models::{AnomalyRecord, MetricSample};
use crate::series::MetricStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Default window within which two anomalies on one metric are the same event
pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 5;

/// Owns the model configurations and the anomaly history
pub struct AnomalyDetector {
    models: Vec<DetectionModelConfig>,
    history: AnomalyHistory,
    dedup_window: Duration,
    selected_metrics: Vec<String>,
    /// Newest candidate timestamp seen per (metric, model id)
    scanned_through: HashMap<(String, String), DateTime<Utc>>,
}

impl AnomalyDetector {
    pub fn new(models: Vec<DetectionModelConfig>) -> Self {
        Self {
            models,
            history: AnomalyHistory::new(DEFAULT_HISTORY_CAPACITY),
            dedup_window: Duration::minutes(DEFAULT_DEDUP_WINDOW_MINUTES),
            selected_metrics: Vec::new(),
            scanned_through: HashMap::new(),
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = AnomalyHistory::new(capacity);
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Restrict detection to these metrics; empty means every stored metric
    pub fn with_selected_metrics(mut self, metrics: Vec<String>) -> Self {
        self.selected_metrics = metrics;
        self
    }

    /// Run one detection pass over the store
    ///
    /// Returns the newly recorded anomalies in acceptance order.
    pub fn run_cycle(&mut self, store: &MetricStore) -> Vec<AnomalyRecord> {
        let metrics = if self.selected_metrics.is_empty() {
            store.metric_names()
        } else {
            self.selected_metrics.clone()
        };

        let mut candidates = Vec::new();
        for metric in &metrics {
            let Some(series) = store.series(metric) else {
                continue;
            };
            candidates.extend(self.candidates(metric, &series.samples()));
        }

        let fresh: Vec<AnomalyRecord> = candidates
            .into_iter()
            .filter(|c| self.is_unscanned(c))
            .collect();
        for candidate in &fresh {
            let mark = self
                .scanned_through
                .entry((candidate.metric.clone(), candidate.model_id.clone()))
                .or_insert(candidate.timestamp);
            if candidate.timestamp > *mark {
                *mark = candidate.timestamp;
            }
        }

        self.record(fresh)
    }

    /// Whether `candidate` is newer than anything its model reported before
    fn is_unscanned(&self, candidate: &AnomalyRecord) -> bool {
        self.scanned_through
            .get(&(candidate.metric.clone(), candidate.model_id.clone()))
            .map_or(true, |mark| candidate.timestamp > *mark)
    }

    /// Run every active model applicable to `metric` over `series`
    pub fn candidates(&self, metric: &str, series: &[MetricSample]) -> Vec<AnomalyRecord> {
        let mut found = Vec::new();

        for config in self.models.iter().filter(|m| m.is_active && m.applies_to(metric)) {
            let Some(model) = model_for(config.kind) else {
                match config.kind {
                    ModelKind::Unknown => {
                        warn!(model_id = %config.id, "Skipping detection model with unknown type")
                    }
                    kind => {
                        debug!(model_id = %config.id, kind = %kind, "Detection model has no implementation")
                    }
                }
                continue;
            };

            let anomalies = model.evaluate(config, series);
            debug!(
                model_id = %config.id,
                metric = %metric,
                samples = series.len(),
                candidates = anomalies.len(),
                "Model evaluated"
            );
            found.extend(anomalies);
        }

        found
    }

    /// Record candidates that are not already represented in the history
    ///
    /// A candidate is already seen when the history holds a record for the
    /// same metric within the dedup window, including records accepted
    /// earlier in the same call.
    pub fn record(&mut self, candidates: Vec<AnomalyRecord>) -> Vec<AnomalyRecord> {
        let mut accepted = Vec::new();

        for candidate in candidates {
            if self.is_duplicate(&candidate) {
                continue;
            }
            self.history.push(candidate.clone());
            accepted.push(candidate);
        }

        accepted
    }

    pub fn is_duplicate(&self, candidate: &AnomalyRecord) -> bool {
        self.history
            .contains_near(&candidate.metric, candidate.timestamp, self.dedup_window)
    }

    pub fn history(&self) -> &AnomalyHistory {
        &self.history
    }

    pub fn models(&self) -> &[DetectionModelConfig] {
        &self.models
    }

    /// Insert or replace a model configuration by id
    pub fn upsert_model(&mut self, config: DetectionModelConfig) -> MonitorResult<()> {
        config.validate()?;
        match self.models.iter_mut().find(|m| m.id == config.id) {
            Some(existing) => *existing = config,
            None => self.models.push(config),
        }
        Ok(())
    }

    pub fn set_model_active(&mut self, id: &str, active: bool) -> MonitorResult<DetectionModelConfig> {
        self.update_model(
            id,
            ModelUpdate {
                is_active: Some(active),
                ..Default::default()
            },
        )
    }

    pub fn update_model(&mut self, id: &str, update: ModelUpdate) -> MonitorResult<DetectionModelConfig> {
        let config = self
            .models
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| MonitorError::ModelNotFound(id.to_string()))?;
        update.apply(config)?;
        Ok(config.clone())
    }

    /// Counts over the retained history
    pub fn summary(&self) -> AnomalySummary {
        let mut by_severity = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        let mut by_metric = BTreeMap::new();

        for record in self.history.iter() {
            *by_severity.entry(record.severity.to_string()).or_insert(0) += 1;
            *by_type.entry(record.anomaly_type.to_string()).or_insert(0) += 1;
            *by_metric.entry(record.metric.clone()).or_insert(0) += 1;
        }

        AnomalySummary {
            total: self.history.len(),
            by_severity,
            by_type,
            by_metric,
            latest: self.history.iter().map(|r| r.timestamp).max(),
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectionModelConfig::defaults())
    }
}

/// Aggregate view of the anomaly history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalySummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_metric: BTreeMap<String, usize>,
    pub latest: Option<DateTime<Utc>>,
}
