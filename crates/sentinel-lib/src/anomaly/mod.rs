//! Anomaly detection over metric series
//!
//! This module provides:
//! - Pluggable detection models (statistical, seasonal/trend, adaptive threshold)
//! - The detector that runs them each cycle and deduplicates the results
//! - A bounded history of recorded anomalies

mod adaptive;
mod detector;
mod history;
mod model;
mod seasonal;
mod statistical;

pub use adaptive::AdaptiveThresholdModel;
pub use detector::{AnomalyDetector, AnomalySummary, DEFAULT_DEDUP_WINDOW_MINUTES};
pub use history::{AnomalyHistory, DEFAULT_HISTORY_CAPACITY};
pub use model::{
    model_for, DetectionModel, DetectionModelConfig, ModelKind, ModelParameters, ModelUpdate,
    ALL_METRICS,
};
pub use seasonal::SeasonalModel;
pub use statistical::StatisticalModel;
