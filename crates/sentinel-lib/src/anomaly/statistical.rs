//! Statistical outlier detection
//!
//! Flags points whose z-score against the whole series exceeds the configured
//! threshold, then scores each flagged point against the mean of the points
//! immediately before it.

use super::model::{anomaly_from_sample, deviation_pct, DetectionModel, DetectionModelConfig, ModelKind};
use crate::models::{AnomalyRecord, AnomalyType, MetricSample, Severity};
use crate::stats::{detect_outliers, mean};

/// Points used as context before a flagged value; earlier points are never reported
const CONTEXT_WINDOW: usize = 10;

/// Z-score outlier model
pub struct StatisticalModel;

impl StatisticalModel {
    /// Severity from percentage deviation
    pub fn severity_for(deviation_pct: f64) -> Severity {
        if deviation_pct > 50.0 {
            Severity::Critical
        } else if deviation_pct > 30.0 {
            Severity::High
        } else if deviation_pct > 15.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Confidence grows with deviation, capped at 95
    pub fn confidence_for(deviation_pct: f64) -> f64 {
        (60.0 + deviation_pct / 100.0 * 35.0).min(95.0)
    }
}

impl DetectionModel for StatisticalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Statistical
    }

    fn evaluate(
        &self,
        config: &DetectionModelConfig,
        series: &[MetricSample],
    ) -> Vec<AnomalyRecord> {
        if series.len() <= CONTEXT_WINDOW {
            return Vec::new();
        }

        let values: Vec<f64> = series.iter().map(|s| s.value).collect();
        let flags = detect_outliers(&values, config.parameters.threshold);

        (CONTEXT_WINDOW..values.len())
            .filter(|&i| flags[i])
            .map(|i| {
                let current = values[i];
                let expected = mean(&values[i - CONTEXT_WINDOW..i]);
                let deviation = deviation_pct(current, expected);
                let anomaly_type = if current > expected {
                    AnomalyType::Spike
                } else {
                    AnomalyType::Drop
                };

                anomaly_from_sample(
                    config,
                    &series[i],
                    expected,
                    anomaly_type,
                    Self::severity_for(deviation),
                    Self::confidence_for(deviation),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::ModelParameters;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new("spend", *v, start + Duration::minutes(i as i64 * 15)))
            .collect()
    }

    fn config(threshold: f64) -> DetectionModelConfig {
        DetectionModelConfig::new("stat", ModelKind::Statistical).with_parameters(ModelParameters {
            threshold,
            window_size: 20,
            ..Default::default()
        })
    }

    #[test]
    fn test_flat_series_then_spike() {
        let mut values = vec![100.0; 30];
        values.push(400.0);

        let anomalies = StatisticalModel.evaluate(&config(2.5), &series(&values));

        assert_eq!(anomalies.len(), 1);
        let anomaly = &anomalies[0];
        assert_eq!(anomaly.anomaly_type, AnomalyType::Spike);
        assert!((anomaly.expected_value - 100.0).abs() < 1e-9);
        assert!((anomaly.deviation_score_pct - 300.0).abs() < 1e-9);
        assert_eq!(anomaly.severity, Severity::Critical);
        assert_eq!(anomaly.confidence, 95.0);
        assert_eq!(anomaly.model_id, "stat");
    }

    #[test]
    fn test_drop_detected() {
        let mut values = vec![200.0; 30];
        values.push(20.0);

        let anomalies = StatisticalModel.evaluate(&config(2.5), &series(&values));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::Drop);
        assert!((anomalies[0].deviation_score_pct - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_warm_up_points_never_reported() {
        // The extreme value sits inside the context window
        let mut values = vec![500.0];
        values.extend(vec![100.0; 30]);

        assert!(StatisticalModel.evaluate(&config(2.5), &series(&values)).is_empty());
    }

    #[test]
    fn test_constant_series() {
        assert!(StatisticalModel
            .evaluate(&config(2.5), &series(&[0.0; 40]))
            .is_empty());
    }

    #[test]
    fn test_severity_and_confidence_bands() {
        assert_eq!(StatisticalModel::severity_for(51.0), Severity::Critical);
        assert_eq!(StatisticalModel::severity_for(50.0), Severity::High);
        assert_eq!(StatisticalModel::severity_for(30.5), Severity::High);
        assert_eq!(StatisticalModel::severity_for(16.0), Severity::Medium);
        assert_eq!(StatisticalModel::severity_for(15.0), Severity::Low);

        assert!((StatisticalModel::confidence_for(20.0) - 67.0).abs() < 1e-9);
        assert_eq!(StatisticalModel::confidence_for(500.0), 95.0);
    }
}
