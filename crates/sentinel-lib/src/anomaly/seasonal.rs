//! Trend change detection

use super::model::{anomaly_from_sample, deviation_pct, DetectionModel, DetectionModelConfig, ModelKind};
use crate::models::{AnomalyRecord, AnomalyType, MetricSample, Severity};
use crate::stats::detect_trend_change;

/// Fixed confidence for trend change anomalies
const TREND_CONFIDENCE: f64 = 75.0;

/// Deviation above which a trend change is rated high
const HIGH_SEVERITY_DEVIATION_PCT: f64 = 25.0;

/// Seasonal/trend model: reports points where the smoothed slope turns
pub struct SeasonalModel;

impl DetectionModel for SeasonalModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Seasonal
    }

    fn evaluate(
        &self,
        config: &DetectionModelConfig,
        series: &[MetricSample],
    ) -> Vec<AnomalyRecord> {
        let values: Vec<f64> = series.iter().map(|s| s.value).collect();
        let last = values.len().saturating_sub(1);

        detect_trend_change(&values, config.parameters.trend_window)
            .into_iter()
            .filter(|change| change.index > 0 && change.index < last)
            .map(|change| {
                let i = change.index;
                let expected = values[i - 1];
                let severity = if deviation_pct(values[i], expected) > HIGH_SEVERITY_DEVIATION_PCT {
                    Severity::High
                } else {
                    Severity::Medium
                };

                anomaly_from_sample(
                    config,
                    &series[i],
                    expected,
                    AnomalyType::TrendChange,
                    severity,
                    TREND_CONFIDENCE,
                )
            })
            .collect()
    }
}
