//! Observability infrastructure for the monitor
//!
//! Provides:
//! - Prometheus metrics (cycle latency, anomaly/alert counts, ingestion, notifications)
//! - Structured JSON logging with tracing

use crate::alerting::ActiveAlert;
use crate::models::{AnomalyRecord, PatternInsight, Severity};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    detection_cycle_seconds: Histogram,
    alert_cycle_seconds: Histogram,
    anomalies_detected: IntCounterVec,
    insights_discovered: IntCounter,
    alerts_triggered: IntCounterVec,
    alerts_suppressed: IntCounter,
    notification_failures: IntCounterVec,
    samples_ingested: IntCounter,
    samples_rejected: IntCounter,
    series_tracked: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            detection_cycle_seconds: register_histogram!(
                "perf_sentinel_detection_cycle_seconds",
                "Time spent running one anomaly detection cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_cycle_seconds"),

            alert_cycle_seconds: register_histogram!(
                "perf_sentinel_alert_cycle_seconds",
                "Time spent evaluating pending samples against thresholds",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register alert_cycle_seconds"),

            anomalies_detected: register_int_counter_vec!(
                "perf_sentinel_anomalies_detected_total",
                "Anomalies recorded after deduplication",
                &["severity"]
            )
            .expect("Failed to register anomalies_detected"),

            insights_discovered: register_int_counter!(
                "perf_sentinel_insights_discovered_total",
                "Pattern insights discovered"
            )
            .expect("Failed to register insights_discovered"),

            alerts_triggered: register_int_counter_vec!(
                "perf_sentinel_alerts_triggered_total",
                "Alerts raised by threshold breaches",
                &["severity"]
            )
            .expect("Failed to register alerts_triggered"),

            alerts_suppressed: register_int_counter!(
                "perf_sentinel_alerts_suppressed_total",
                "Threshold breaches dropped by cooldown"
            )
            .expect("Failed to register alerts_suppressed"),

            notification_failures: register_int_counter_vec!(
                "perf_sentinel_notification_failures_total",
                "Notification deliveries that failed after all retries",
                &["channel_type"]
            )
            .expect("Failed to register notification_failures"),

            samples_ingested: register_int_counter!(
                "perf_sentinel_samples_ingested_total",
                "Metric samples accepted by the store"
            )
            .expect("Failed to register samples_ingested"),

            samples_rejected: register_int_counter!(
                "perf_sentinel_samples_rejected_total",
                "Metric samples rejected by validation"
            )
            .expect("Failed to register samples_rejected"),

            series_tracked: register_int_gauge!(
                "perf_sentinel_series_tracked",
                "Number of metric series currently held in memory"
            )
            .expect("Failed to register series_tracked"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_detection_cycle(&self, duration_secs: f64) {
        self.inner().detection_cycle_seconds.observe(duration_secs);
    }

    pub fn observe_alert_cycle(&self, duration_secs: f64) {
        self.inner().alert_cycle_seconds.observe(duration_secs);
    }

    pub fn inc_anomalies_detected(&self, severity: Severity) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[&severity.to_string()])
            .inc();
    }

    pub fn inc_insights_discovered(&self) {
        self.inner().insights_discovered.inc();
    }

    pub fn inc_alerts_triggered(&self, severity: Severity) {
        self.inner()
            .alerts_triggered
            .with_label_values(&[&severity.to_string()])
            .inc();
    }

    pub fn inc_alerts_suppressed(&self, count: u64) {
        self.inner().alerts_suppressed.inc_by(count);
    }

    pub fn inc_notification_failures(&self, channel_type: &str) {
        self.inner()
            .notification_failures
            .with_label_values(&[channel_type])
            .inc();
    }

    pub fn inc_samples_ingested(&self) {
        self.inner().samples_ingested.inc();
    }

    pub fn inc_samples_rejected(&self) {
        self.inner().samples_rejected.inc();
    }

    pub fn set_series_tracked(&self, count: i64) {
        self.inner().series_tracked.set(count);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> prometheus::Result<Vec<u8>> {
        self.inner();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for monitor events
///
/// Keeps the `event` field consistent so log pipelines can key on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a recorded anomaly; critical ones go out at warn level
    pub fn log_anomaly(&self, anomaly: &AnomalyRecord) {
        match anomaly.severity {
            Severity::Critical => {
                warn!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    anomaly_id = %anomaly.id,
                    metric = %anomaly.metric,
                    anomaly_type = %anomaly.anomaly_type,
                    severity = %anomaly.severity,
                    value = anomaly.value,
                    expected_value = anomaly.expected_value,
                    deviation_pct = anomaly.deviation_score_pct,
                    model_id = %anomaly.model_id,
                    "Critical anomaly detected"
                );
            }
            _ => {
                info!(
                    event = "anomaly_detected",
                    instance = %self.instance,
                    anomaly_id = %anomaly.id,
                    metric = %anomaly.metric,
                    anomaly_type = %anomaly.anomaly_type,
                    severity = %anomaly.severity,
                    value = anomaly.value,
                    expected_value = anomaly.expected_value,
                    deviation_pct = anomaly.deviation_score_pct,
                    model_id = %anomaly.model_id,
                    "Anomaly detected"
                );
            }
        }
    }

    pub fn log_insight(&self, insight: &PatternInsight) {
        info!(
            event = "pattern_discovered",
            instance = %self.instance,
            insight_id = %insight.id,
            insight_type = %insight.insight_type,
            confidence = insight.confidence,
            metrics = ?insight.metrics,
            "Pattern insight discovered"
        );
    }

    pub fn log_alert_triggered(&self, alert: &ActiveAlert, channels: usize) {
        warn!(
            event = "alert_triggered",
            instance = %self.instance,
            alert_id = %alert.id,
            threshold_id = %alert.threshold_id,
            metric = %alert.metric,
            current_value = alert.current_value,
            threshold_value = alert.threshold_value,
            severity = %alert.severity,
            channels = channels,
            "{}",
            alert.message
        );
    }

    pub fn log_alert_transition(&self, alert: &ActiveAlert) {
        info!(
            event = "alert_status_changed",
            instance = %self.instance,
            alert_id = %alert.id,
            threshold_id = %alert.threshold_id,
            status = %alert.status,
            "Alert status changed"
        );
    }

    pub fn log_startup(&self, version: &str, models: usize, thresholds: usize) {
        info!(
            event = "monitor_started",
            instance = %self.instance,
            version = %version,
            models = models,
            thresholds = thresholds,
            "Performance monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Performance monitor shutting down"
        );
    }
}
