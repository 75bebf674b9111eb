//! Adaptive threshold detection
//!
//! The baseline is a trailing moving average, so the threshold follows the
//! metric as it drifts and only sharp departures from recent behavior fire.

use super::model::{anomaly_from_sample, deviation_pct, DetectionModel, DetectionModelConfig, ModelKind};
use crate::models::{AnomalyRecord, AnomalyType, MetricSample, Severity};
use crate::stats::moving_average;

/// Fixed confidence for adaptive threshold anomalies
const THRESHOLD_CONFIDENCE: f64 = 70.0;

/// Deviation above which an outlier is rated high
const HIGH_SEVERITY_DEVIATION_PCT: f64 = 40.0;

/// Moving-average band model
pub struct AdaptiveThresholdModel;

impl DetectionModel for AdaptiveThresholdModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Threshold
    }

    fn evaluate(
        &self,
        config: &DetectionModelConfig,
        series: &[MetricSample],
    ) -> Vec<AnomalyRecord> {
        let window = config.parameters.adaptive_window.max(1);
        let multiplier = config.parameters.threshold_multiplier;

        let values: Vec<f64> = series.iter().map(|s| s.value).collect();
        let baseline = moving_average(&values, window);

        (window..values.len())
            .filter(|&i| (values[i] - baseline[i]).abs() > baseline[i] * multiplier)
            .map(|i| {
                let severity = if deviation_pct(values[i], baseline[i]) > HIGH_SEVERITY_DEVIATION_PCT
                {
                    Severity::High
                } else {
                    Severity::Medium
                };

                anomaly_from_sample(
                    config,
                    &series[i],
                    baseline[i],
                    AnomalyType::Outlier,
                    severity,
                    THRESHOLD_CONFIDENCE,
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
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new("ctr", *v, start + Duration::minutes(i as i64 * 30)))
            .collect()
    }

    fn config(window: usize, multiplier: f64) -> DetectionModelConfig {
        DetectionModelConfig::new("adaptive", ModelKind::Threshold).with_parameters(
            ModelParameters {
                adaptive_window: window,
                threshold_multiplier: multiplier,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_jump_above_band() {
        let mut values = vec![2.0; 10];
        values.push(6.0);

        let anomalies = AdaptiveThresholdModel.evaluate(&config(5, 0.5), &series(&values));

        // Baseline at the jump is (2*4 + 6) / 5 = 2.8; |6 - 2.8| = 3.2 > 1.4
        assert_eq!(anomalies.len(), 1);
        let anomaly = &anomalies[0];
        assert_eq!(anomaly.anomaly_type, AnomalyType::Outlier);
        assert!((anomaly.expected_value - 2.8).abs() < 1e-9);
        assert_eq!(anomaly.severity, Severity::High);
        assert_eq!(anomaly.confidence, 70.0);
    }

    #[test]
    fn test_moderate_deviation_is_medium() {
        let mut values = vec![10.0; 10];
        values.push(16.0);

        // Baseline (40 + 16) / 5 = 11.2; deviation 4.8 > 11.2 * 0.3 = 3.36; 42.9% -> high
        let anomalies = AdaptiveThresholdModel.evaluate(&config(5, 0.3), &series(&values));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::High);

        let mut values = vec![10.0; 10];
        values.push(14.0);
        // Baseline 10.8; deviation 3.2 > 2.16; 29.6% -> medium
        let anomalies = AdaptiveThresholdModel.evaluate(&config(5, 0.2), &series(&values));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::Medium);
    }

    #[test]
    fn test_points_before_window_are_skipped() {
        let values = vec![50.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        assert!(AdaptiveThresholdModel
            .evaluate(&config(5, 0.5), &series(&values))
            .is_empty());
    }

    #[test]
    fn test_all_zero_series() {
        assert!(AdaptiveThresholdModel
            .evaluate(&config(5, 0.5), &series(&[0.0; 30]))
            .is_empty());
    }
}
