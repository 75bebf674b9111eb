//! Detection model configuration and dispatch

use super::{AdaptiveThresholdModel, SeasonalModel, StatisticalModel};
use crate::error::{MonitorError, MonitorResult};
use crate::models::{AnomalyRecord, AnomalyType, MetricSample, Severity};
use serde::{Deserialize, Serialize};

/// Wildcard entry in `applicable_metrics`
pub const ALL_METRICS: &str = "all";

/// Largest accepted analysis window, matching the per-series sample cap
pub const MAX_MODEL_WINDOW: usize = crate::series::DEFAULT_MAX_SAMPLES;

/// Strategy tag selecting a model implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Statistical,
    Seasonal,
    Threshold,
    /// Declared slot with no implementation; never produces anomalies
    IsolationForest,
    /// Any tag this build does not recognize
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Statistical => write!(f, "statistical"),
            ModelKind::Seasonal => write!(f, "seasonal"),
            ModelKind::Threshold => write!(f, "threshold"),
            ModelKind::IsolationForest => write!(f, "isolation_forest"),
            ModelKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Tunable parameters; each model reads only the fields it needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelParameters {
    /// z-score threshold (statistical)
    pub threshold: f64,
    /// Analysis window (statistical, informational)
    pub window_size: usize,
    /// Moving-average window for trend changes (seasonal)
    pub trend_window: usize,
    /// Moving-average window for the adaptive baseline (threshold)
    pub adaptive_window: usize,
    /// Allowed deviation as a fraction of the baseline (threshold)
    pub threshold_multiplier: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            threshold: crate::stats::DEFAULT_OUTLIER_THRESHOLD,
            window_size: 20,
            trend_window: crate::stats::DEFAULT_TREND_WINDOW,
            adaptive_window: 20,
            threshold_multiplier: 0.5,
        }
    }
}

impl ModelParameters {
    /// Check that every window and multiplier is usable by the models
    pub fn validate(&self, id: &str) -> MonitorResult<()> {
        let invalid = |reason: String| MonitorError::InvalidModel {
            id: id.to_string(),
            reason,
        };

        for (name, window) in [
            ("windowSize", self.window_size),
            ("trendWindow", self.trend_window),
            ("adaptiveWindow", self.adaptive_window),
        ] {
            if window == 0 || window > MAX_MODEL_WINDOW {
                return Err(invalid(format!(
                    "{} must be between 1 and {}",
                    name, MAX_MODEL_WINDOW
                )));
            }
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(invalid("threshold must be a finite non-negative number".to_string()));
        }
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier < 0.0 {
            return Err(invalid(
                "thresholdMultiplier must be a finite non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration of one detection model, owned by the anomaly detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionModelConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub is_active: bool,
    /// 0-100, informational
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default = "default_applicable_metrics")]
    pub applicable_metrics: Vec<String>,
    /// Informational, not enforced
    #[serde(default)]
    pub accuracy: f64,
    /// Informational, not enforced
    #[serde(default)]
    pub false_positive_rate: f64,
}

fn default_sensitivity() -> f64 {
    50.0
}

fn default_applicable_metrics() -> Vec<String> {
    vec![ALL_METRICS.to_string()]
}

impl DetectionModelConfig {
    pub fn new(id: impl Into<String>, kind: ModelKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            is_active: true,
            sensitivity: default_sensitivity(),
            parameters: ModelParameters::default(),
            applicable_metrics: default_applicable_metrics(),
            accuracy: 0.0,
            false_positive_rate: 0.0,
        }
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_metrics(mut self, metrics: &[&str]) -> Self {
        self.applicable_metrics = metrics.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if !self.sensitivity.is_finite() {
            return Err(MonitorError::InvalidModel {
                id: self.id.clone(),
                reason: "sensitivity must be finite".to_string(),
            });
        }
        self.parameters.validate(&self.id)
    }

    /// Whether this model should run against `metric`
    pub fn applies_to(&self, metric: &str) -> bool {
        self.applicable_metrics
            .iter()
            .any(|m| m == metric || m == ALL_METRICS)
    }

    /// Built-in model set used when no configuration is supplied
    pub fn defaults() -> Vec<DetectionModelConfig> {
        vec![
            DetectionModelConfig {
                name: "Statistical Outlier Detection".to_string(),
                sensitivity: 75.0,
                accuracy: 0.87,
                false_positive_rate: 0.08,
                ..DetectionModelConfig::new("statistical-zscore", ModelKind::Statistical)
            },
            DetectionModelConfig {
                name: "Seasonal Trend Analysis".to_string(),
                sensitivity: 60.0,
                accuracy: 0.82,
                false_positive_rate: 0.12,
                ..DetectionModelConfig::new("seasonal-trend", ModelKind::Seasonal)
                    .with_metrics(&["spend", "impressions", "clicks", "conversions"])
            },
            DetectionModelConfig {
                name: "Adaptive Threshold".to_string(),
                sensitivity: 70.0,
                accuracy: 0.79,
                false_positive_rate: 0.15,
                ..DetectionModelConfig::new("adaptive-threshold", ModelKind::Threshold)
                    .with_metrics(&["ctr", "cpc", "cpa", "roas"])
            },
            DetectionModelConfig {
                name: "Isolation Forest".to_string(),
                sensitivity: 80.0,
                ..DetectionModelConfig::new("isolation-forest", ModelKind::IsolationForest)
                    .inactive()
            },
        ]
    }
}

/// Partial update applied to a model configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUpdate {
    pub is_active: Option<bool>,
    pub sensitivity: Option<f64>,
    pub parameters: Option<ModelParameters>,
    pub applicable_metrics: Option<Vec<String>>,
}

impl ModelUpdate {
    /// Apply the update, leaving `config` untouched when it is rejected
    pub fn apply(self, config: &mut DetectionModelConfig) -> MonitorResult<()> {
        if let Some(parameters) = &self.parameters {
            parameters.validate(&config.id)?;
        }
        if self.sensitivity.is_some_and(|s| !s.is_finite()) {
            return Err(MonitorError::InvalidModel {
                id: config.id.clone(),
                reason: "sensitivity must be finite".to_string(),
            });
        }

        if let Some(active) = self.is_active {
            config.is_active = active;
        }
        if let Some(sensitivity) = self.sensitivity {
            config.sensitivity = sensitivity.clamp(0.0, 100.0);
        }
        if let Some(parameters) = self.parameters {
            config.parameters = parameters;
        }
        if let Some(metrics) = self.applicable_metrics {
            config.applicable_metrics = metrics;
        }
        Ok(())
    }
}

/// A detection strategy scanning one metric series
pub trait DetectionModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Scan `series` (oldest first) and return anomaly candidates
    fn evaluate(&self, config: &DetectionModelConfig, series: &[MetricSample])
        -> Vec<AnomalyRecord>;
}

/// Resolve the implementation for a model kind
///
/// Returns `None` for kinds without an implementation.
pub fn model_for(kind: ModelKind) -> Option<Box<dyn DetectionModel>> {
    match kind {
        ModelKind::Statistical => Some(Box::new(StatisticalModel)),
        ModelKind::Seasonal => Some(Box::new(SeasonalModel)),
        ModelKind::Threshold => Some(Box::new(AdaptiveThresholdModel)),
        ModelKind::IsolationForest | ModelKind::Unknown => None,
    }
}

/// Absolute deviation of `value` from `expected` in percent, 0 when expected is 0
pub(crate) fn deviation_pct(value: f64, expected: f64) -> f64 {
    if expected.abs() < f64::EPSILON {
        return 0.0;
    }
    ((value - expected) / expected).abs() * 100.0
}

/// Build an anomaly record for the sample that triggered it
pub(crate) fn anomaly_from_sample(
    config: &DetectionModelConfig,
    sample: &MetricSample,
    expected_value: f64,
    anomaly_type: AnomalyType,
    severity: Severity,
    confidence: f64,
) -> AnomalyRecord {
    AnomalyRecord {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: sample.timestamp,
        metric: sample.metric.clone(),
        value: sample.value,
        expected_value,
        deviation_score_pct: deviation_pct(sample.value, expected_value),
        anomaly_type,
        severity,
        confidence,
        model_id: config.id.clone(),
        campaign_id: sample.campaign_id.clone(),
        adset_id: sample.adset_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicability() {
        let wildcard = DetectionModelConfig::new("m1", ModelKind::Statistical);
        assert!(wildcard.applies_to("spend"));
        assert!(wildcard.applies_to("anything"));

        let scoped = DetectionModelConfig::new("m2", ModelKind::Threshold).with_metrics(&["ctr"]);
        assert!(scoped.applies_to("ctr"));
        assert!(!scoped.applies_to("spend"));
    }

    #[test]
    fn test_unknown_kind_deserializes() {
        let json = r#"{"id":"x","name":"X","type":"neural_prophet","isActive":true}"#;
        let config: DetectionModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, ModelKind::Unknown);
        assert!(model_for(config.kind).is_none());
        assert_eq!(config.parameters, ModelParameters::default());
        assert!(config.applies_to("spend"));
    }

    #[test]
    fn test_model_dispatch() {
        assert_eq!(
            model_for(ModelKind::Statistical).map(|m| m.kind()),
            Some(ModelKind::Statistical)
        );
        assert_eq!(
            model_for(ModelKind::Seasonal).map(|m| m.kind()),
            Some(ModelKind::Seasonal)
        );
        assert_eq!(
            model_for(ModelKind::Threshold).map(|m| m.kind()),
            Some(ModelKind::Threshold)
        );
        assert!(model_for(ModelKind::IsolationForest).is_none());
    }

    #[test]
    fn test_defaults_leave_isolation_forest_inactive() {
        let defaults = DetectionModelConfig::defaults();
        assert_eq!(defaults.len(), 4);
        let forest = defaults
            .iter()
            .find(|m| m.kind == ModelKind::IsolationForest)
            .unwrap();
        assert!(!forest.is_active);
    }

    #[test]
    fn test_model_update() {
        let mut config = DetectionModelConfig::new("m1", ModelKind::Statistical);
        ModelUpdate {
            is_active: Some(false),
            sensitivity: Some(140.0),
            ..Default::default()
        }
        .apply(&mut config)
        .unwrap();

        assert!(!config.is_active);
        assert_eq!(config.sensitivity, 100.0);
    }

    #[test]
    fn test_model_update_rejects_unusable_parameters() {
        let mut config = DetectionModelConfig::new("m1", ModelKind::Seasonal);
        let rejected = [
            ModelParameters {
                trend_window: usize::MAX,
                ..Default::default()
            },
            ModelParameters {
                adaptive_window: 0,
                ..Default::default()
            },
            ModelParameters {
                threshold_multiplier: f64::NAN,
                ..Default::default()
            },
            ModelParameters {
                threshold: f64::INFINITY,
                ..Default::default()
            },
        ];

        for parameters in rejected {
            let err = ModelUpdate {
                is_active: Some(false),
                parameters: Some(parameters),
                ..Default::default()
            }
            .apply(&mut config)
            .unwrap_err();
            assert!(matches!(err, MonitorError::InvalidModel { .. }));
        }
        // Rejected updates leave the model untouched
        assert!(config.is_active);
        assert_eq!(config.parameters, ModelParameters::default());
    }

    #[test]
    fn test_default_models_are_valid() {
        for model in DetectionModelConfig::defaults() {
            model.validate().unwrap();
        }
    }

    #[test]
    fn test_deviation_pct_guard() {
        assert_eq!(deviation_pct(10.0, 0.0), 0.0);
        assert!((deviation_pct(400.0, 100.0) - 300.0).abs() < 1e-9);
        assert!((deviation_pct(50.0, 100.0) - 50.0).abs() < 1e-9);
    }
}
