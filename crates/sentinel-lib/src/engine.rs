//! The monitor: one actor owning every piece of mutable state
//!
//! Store, detector, synthesizer and alert engine sit behind a single
//! mutex, so the detection, alert, retraining and ingestion loops
//! serialize their mutations. Notification I/O happens after the lock is
//! released, in detached tasks.

use crate::alerting::{
    ActiveAlert, AlertEngine, AlertStatus, AlertThreshold, NotificationDispatcher,
    DEFAULT_NOTIFY_RETRIES, DEFAULT_NOTIFY_TIMEOUT,
};
use crate::anomaly::{
    AnomalyDetector, AnomalySummary, DetectionModelConfig, ModelUpdate,
    DEFAULT_DEDUP_WINDOW_MINUTES, DEFAULT_HISTORY_CAPACITY,
};
use crate::error::MonitorResult;
use crate::health::{components, HealthRegistry};
use crate::models::{AnomalyRecord, MetricSample, PatternInsight};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::patterns::PatternSynthesizer;
use crate::scheduler::{
    spawn_loop, DEFAULT_ALERT_INTERVAL, DEFAULT_DETECTION_INTERVAL, DEFAULT_INGESTION_INTERVAL,
    DEFAULT_RETRAINING_INTERVAL,
};
use crate::series::{MetricStore, RetentionWindow, DEFAULT_MAX_SAMPLES};
use crate::significance::{ABTest, SignificanceEngine, SignificanceResult};
use crate::source::MetricSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_EVENT_BUFFER: usize = 256;

/// Runtime settings for the monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Name attached to structured log events
    pub instance: String,
    pub detection_interval: Duration,
    pub alert_interval: Duration,
    pub retraining_interval: Duration,
    pub ingestion_interval: Duration,
    pub retention: chrono::Duration,
    pub max_samples_per_series: usize,
    pub history_capacity: usize,
    pub dedup_window: chrono::Duration,
    /// Metrics scanned by detection; empty means all
    pub selected_metrics: Vec<String>,
    pub models: Vec<DetectionModelConfig>,
    pub thresholds: Vec<AlertThreshold>,
    pub notify_timeout: Duration,
    pub notify_retries: u32,
    pub event_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            instance: "perf-sentinel".to_string(),
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            alert_interval: DEFAULT_ALERT_INTERVAL,
            retraining_interval: DEFAULT_RETRAINING_INTERVAL,
            ingestion_interval: DEFAULT_INGESTION_INTERVAL,
            retention: RetentionWindow::default().duration(),
            max_samples_per_series: DEFAULT_MAX_SAMPLES,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            dedup_window: chrono::Duration::minutes(DEFAULT_DEDUP_WINDOW_MINUTES),
            selected_metrics: Vec::new(),
            models: DetectionModelConfig::defaults(),
            thresholds: Vec::new(),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            notify_retries: DEFAULT_NOTIFY_RETRIES,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Output events broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MonitorEvent {
    AnomalyDetected(AnomalyRecord),
    PatternDiscovered(PatternInsight),
    AlertTriggered(ActiveAlert),
    AlertResolved(ActiveAlert),
}

/// Result of one detection cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub anomalies: Vec<AnomalyRecord>,
    pub insights: Vec<PatternInsight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedSample {
    pub index: usize,
    pub metric: String,
    pub reason: String,
}

/// Result of a batch ingestion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedSample>,
}

/// Point-in-time counters for status endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub running: bool,
    pub series: usize,
    pub samples: usize,
    pub anomalies: usize,
    pub insights: usize,
    pub active_alerts: usize,
    pub active_models: usize,
    pub thresholds: usize,
}

struct MonitorState {
    store: MetricStore,
    detector: AnomalyDetector,
    synthesizer: PatternSynthesizer,
    alerts: AlertEngine,
}

pub struct Monitor {
    state: Mutex<MonitorState>,
    config: MonitorConfig,
    significance: SignificanceEngine,
    dispatcher: NotificationDispatcher,
    events: broadcast::Sender<MonitorEvent>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    health: HealthRegistry,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl Monitor {
    /// Build a monitor with the HTTP/log notification dispatcher
    pub fn new(config: MonitorConfig, health: HealthRegistry) -> Result<Self> {
        let dispatcher = NotificationDispatcher::new(config.notify_timeout, config.notify_retries)
            .context("Failed to create notification dispatcher")?;
        Ok(Self::with_dispatcher(config, health, dispatcher))
    }

    pub fn with_dispatcher(
        config: MonitorConfig,
        health: HealthRegistry,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let detector = AnomalyDetector::new(config.models.clone())
            .with_history_capacity(config.history_capacity)
            .with_dedup_window(config.dedup_window)
            .with_selected_metrics(config.selected_metrics.clone());

        let state = MonitorState {
            store: MetricStore::new(config.retention, config.max_samples_per_series),
            detector,
            synthesizer: PatternSynthesizer::new(),
            alerts: AlertEngine::new(config.thresholds.clone()),
        };

        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (shutdown, _) = broadcast::channel(1);

        Self {
            state: Mutex::new(state),
            logger: StructuredLogger::new(config.instance.clone()),
            config,
            significance: SignificanceEngine::new(),
            dispatcher,
            events,
            shutdown,
            running: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            health,
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Spawn the periodic loops
    ///
    /// Returns `false` without side effects when already running. The
    /// ingestion loop only runs when a source is given.
    pub async fn start(self: &Arc<Self>, source: Option<Arc<dyn MetricSource>>) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Monitor already running");
            return false;
        }

        let mut handles = Vec::new();

        let monitor = Arc::clone(self);
        handles.push(spawn_loop(
            "detection",
            self.config.detection_interval,
            self.shutdown.subscribe(),
            move || {
                let monitor = monitor.clone();
                async move {
                    monitor.run_detection_cycle(Utc::now()).await;
                }
            },
        ));

        let monitor = Arc::clone(self);
        handles.push(spawn_loop(
            "alerting",
            self.config.alert_interval,
            self.shutdown.subscribe(),
            move || {
                let monitor = monitor.clone();
                async move {
                    monitor.run_alert_cycle(Utc::now()).await;
                }
            },
        ));

        let monitor = Arc::clone(self);
        handles.push(spawn_loop(
            "retraining",
            self.config.retraining_interval,
            self.shutdown.subscribe(),
            move || {
                let monitor = monitor.clone();
                async move {
                    monitor.run_retraining_cycle().await;
                }
            },
        ));

        if let Some(source) = source {
            let monitor = Arc::clone(self);
            handles.push(spawn_loop(
                "ingestion",
                self.config.ingestion_interval,
                self.shutdown.subscribe(),
                move || {
                    let monitor = monitor.clone();
                    let source = source.clone();
                    async move {
                        monitor.poll_source(source.as_ref()).await;
                    }
                },
            ));
        }

        self.tasks.lock().await.extend(handles);
        self.health.set_ready(true).await;

        let state = self.state.lock().await;
        self.logger.log_startup(
            env!("CARGO_PKG_VERSION"),
            state.detector.models().iter().filter(|m| m.is_active).count(),
            state.alerts.thresholds().len(),
        );
        true
    }

    /// Signal every loop to stop and wait for in-flight ticks to finish
    ///
    /// Returns `false` when the monitor was not running.
    pub async fn stop(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }

        self.health.set_ready(false).await;
        // Receivers only exist while loops run
        let _ = self.shutdown.send(());

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Monitor loop ended abnormally");
            }
        }

        self.logger.log_shutdown("stop requested");
        true
    }

    /// Validate and store one sample
    pub async fn ingest(&self, sample: MetricSample) -> MonitorResult<()> {
        let result = {
            let mut state = self.state.lock().await;
            self.ingest_locked(&mut state, sample)
        };
        let accepted = usize::from(result.is_ok());
        self.record_ingestion_health(accepted, 1 - accepted).await;
        result
    }

    /// Store a batch, skipping invalid samples
    pub async fn ingest_batch(&self, samples: Vec<MetricSample>) -> IngestReport {
        let mut report = IngestReport::default();
        {
            let mut state = self.state.lock().await;
            for (index, sample) in samples.into_iter().enumerate() {
                let metric = sample.metric.clone();
                match self.ingest_locked(&mut state, sample) {
                    Ok(()) => report.accepted += 1,
                    Err(e) => report.rejected.push(RejectedSample {
                        index,
                        metric,
                        reason: e.to_string(),
                    }),
                }
            }
        }

        self.record_ingestion_health(report.accepted, report.rejected.len())
            .await;
        report
    }

    /// Healthy while samples get through, degraded when a whole batch bounces
    async fn record_ingestion_health(&self, accepted: usize, rejected: usize) {
        if accepted > 0 {
            self.health.set_healthy(components::INGESTION).await;
        } else if rejected > 0 {
            self.health
                .set_degraded(
                    components::INGESTION,
                    format!("all {rejected} samples in the last batch were rejected"),
                )
                .await;
        }
    }

    fn ingest_locked(&self, state: &mut MonitorState, sample: MetricSample) -> MonitorResult<()> {
        match state.store.ingest(sample) {
            Ok(()) => {
                self.metrics.inc_samples_ingested();
                self.metrics.set_series_tracked(state.store.series_count() as i64);
                Ok(())
            }
            Err(e) => {
                self.metrics.inc_samples_rejected();
                debug!(error = %e, "Sample rejected");
                Err(e)
            }
        }
    }

    async fn poll_source(&self, source: &dyn MetricSource) {
        match source.poll().await {
            Ok(samples) if samples.is_empty() => {
                self.health.set_healthy(components::INGESTION).await;
            }
            Ok(samples) => {
                let report = self.ingest_batch(samples).await;
                if !report.rejected.is_empty() {
                    warn!(
                        accepted = report.accepted,
                        rejected = report.rejected.len(),
                        "Source delivered invalid samples"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "Metric source poll failed");
                self.health
                    .set_degraded(components::INGESTION, format!("poll failed: {e}"))
                    .await;
            }
        }
    }

    /// Detect anomalies, then derive insights from the updated history
    pub async fn run_detection_cycle(&self, now: DateTime<Utc>) -> DetectionOutcome {
        let started = Instant::now();

        let outcome = {
            let mut state = self.state.lock().await;
            let MonitorState {
                store,
                detector,
                synthesizer,
                ..
            } = &mut *state;

            let anomalies = detector.run_cycle(store);
            let insights = synthesizer.synthesize(detector.history().iter(), now);
            DetectionOutcome { anomalies, insights }
        };

        self.metrics
            .observe_detection_cycle(started.elapsed().as_secs_f64());

        for anomaly in &outcome.anomalies {
            self.metrics.inc_anomalies_detected(anomaly.severity);
            self.logger.log_anomaly(anomaly);
            self.emit(MonitorEvent::AnomalyDetected(anomaly.clone()));
        }
        for insight in &outcome.insights {
            self.metrics.inc_insights_discovered();
            self.logger.log_insight(insight);
            self.emit(MonitorEvent::PatternDiscovered(insight.clone()));
        }

        self.health.set_healthy(components::DETECTOR).await;
        debug!(
            anomalies = outcome.anomalies.len(),
            insights = outcome.insights.len(),
            "Detection cycle complete"
        );
        outcome
    }

    /// Evaluate samples ingested since the previous alert cycle
    ///
    /// Returns the alerts created. Notifications are dispatched without
    /// waiting for delivery.
    pub async fn run_alert_cycle(&self, now: DateTime<Utc>) -> Vec<ActiveAlert> {
        let started = Instant::now();
        let mut triggered = Vec::new();
        let mut suppressed = 0u64;

        {
            let mut state = self.state.lock().await;
            for sample in state.store.drain_pending() {
                let evaluation = state.alerts.evaluate(&sample, now);
                suppressed += evaluation.suppressed.len() as u64;
                triggered.extend(evaluation.triggered);
            }
        }

        self.metrics.observe_alert_cycle(started.elapsed().as_secs_f64());
        if suppressed > 0 {
            self.metrics.inc_alerts_suppressed(suppressed);
        }

        let mut deliveries = Vec::new();
        let mut alerts = Vec::with_capacity(triggered.len());
        for item in triggered {
            self.metrics.inc_alerts_triggered(item.alert.severity);
            self.logger
                .log_alert_triggered(&item.alert, item.channels.len());
            deliveries.extend(self.dispatcher.dispatch(&item.channels, &item.alert));
            self.emit(MonitorEvent::AlertTriggered(item.alert.clone()));
            alerts.push(item.alert);
        }

        if !deliveries.is_empty() {
            let health = self.health.clone();
            tokio::spawn(async move {
                let mut failures = 0usize;
                for delivery in deliveries {
                    if !matches!(delivery.await, Ok(Ok(()))) {
                        failures += 1;
                    }
                }
                if failures == 0 {
                    health.set_healthy(components::NOTIFIER).await;
                } else {
                    health
                        .set_degraded(
                            components::NOTIFIER,
                            format!("{failures} notification deliveries failed"),
                        )
                        .await;
                }
            });
        }

        self.health.set_healthy(components::ALERTING).await;
        alerts
    }

    /// Periodic model retraining slot
    pub async fn run_retraining_cycle(&self) {
        let state = self.state.lock().await;
        info!(
            models = state.detector.models().len(),
            anomalies = state.detector.history().len(),
            "Model retraining is not implemented; keeping current parameters"
        );
    }

    /// Recorded anomalies, newest first
    pub async fn anomalies(&self, metric: Option<&str>, limit: Option<usize>) -> Vec<AnomalyRecord> {
        let state = self.state.lock().await;
        state
            .detector
            .history()
            .iter()
            .filter(|a| metric.map_or(true, |m| a.metric == m))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub async fn anomaly_summary(&self) -> AnomalySummary {
        self.state.lock().await.detector.summary()
    }

    pub async fn insights(&self) -> Vec<PatternInsight> {
        self.state.lock().await.synthesizer.insights().to_vec()
    }

    pub async fn alerts(&self, status: Option<AlertStatus>) -> Vec<ActiveAlert> {
        self.state.lock().await.alerts.alerts(status)
    }

    pub async fn acknowledge_alert(&self, id: &str, now: DateTime<Utc>) -> MonitorResult<ActiveAlert> {
        let alert = self.state.lock().await.alerts.acknowledge(id, now)?;
        self.logger.log_alert_transition(&alert);
        Ok(alert)
    }

    pub async fn resolve_alert(&self, id: &str, now: DateTime<Utc>) -> MonitorResult<ActiveAlert> {
        let alert = self.state.lock().await.alerts.resolve(id, now)?;
        self.logger.log_alert_transition(&alert);
        self.emit(MonitorEvent::AlertResolved(alert.clone()));
        Ok(alert)
    }

    pub async fn thresholds(&self) -> Vec<AlertThreshold> {
        self.state.lock().await.alerts.thresholds().to_vec()
    }

    pub async fn upsert_threshold(&self, threshold: AlertThreshold) -> MonitorResult<AlertThreshold> {
        let stored = self.state.lock().await.alerts.upsert_threshold(threshold)?;
        info!(threshold_id = %stored.id, metric = %stored.metric, "Threshold saved");
        Ok(stored)
    }

    pub async fn remove_threshold(&self, id: &str) -> MonitorResult<AlertThreshold> {
        let removed = self.state.lock().await.alerts.remove_threshold(id)?;
        info!(threshold_id = %removed.id, "Threshold removed");
        Ok(removed)
    }

    pub async fn models(&self) -> Vec<DetectionModelConfig> {
        self.state.lock().await.detector.models().to_vec()
    }

    pub async fn update_model(&self, id: &str, update: ModelUpdate) -> MonitorResult<DetectionModelConfig> {
        let model = self.state.lock().await.detector.update_model(id, update)?;
        info!(model_id = %model.id, active = model.is_active, "Detection model updated");
        Ok(model)
    }

    /// Significance of an A/B test; does not touch monitor state
    pub fn evaluate_experiment(&self, test: &ABTest) -> MonitorResult<SignificanceResult> {
        self.significance.evaluate(test)
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        MonitorStatus {
            running: self.is_running(),
            series: state.store.series_count(),
            samples: state.store.total_samples(),
            anomalies: state.detector.history().len(),
            insights: state.synthesizer.insights().len(),
            active_alerts: state.alerts.alerts(Some(AlertStatus::Active)).len(),
            active_models: state.detector.models().iter().filter(|m| m.is_active).count(),
            thresholds: state.alerts.thresholds().len(),
        }
    }
}
