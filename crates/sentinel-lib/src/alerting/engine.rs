//! Threshold evaluation with cooldown suppression
//!
//! Each threshold cycles idle -> triggered -> cooldown -> idle. A breach
//! during cooldown is dropped, not queued. Alerts move active ->
//! acknowledged -> resolved through operator action only.

use super::threshold::{AlertThreshold, NotificationChannel};
use crate::error::{MonitorError, MonitorResult};
use crate::models::{MetricSample, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum alerts retained before the oldest are evicted
const DEFAULT_MAX_RETAINED_ALERTS: usize = 1000;

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// An alert raised by a threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlert {
    pub id: String,
    pub threshold_id: String,
    pub threshold_name: String,
    pub metric: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

/// A newly created alert together with the channels it must reach
#[derive(Debug, Clone)]
pub struct TriggeredAlert {
    pub alert: ActiveAlert,
    pub channels: Vec<NotificationChannel>,
}

/// Outcome of evaluating one sample
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluation {
    pub triggered: Vec<TriggeredAlert>,
    /// Thresholds whose breach was dropped by cooldown
    pub suppressed: Vec<String>,
}

/// Owns thresholds and the alerts they raised
pub struct AlertEngine {
    thresholds: Vec<AlertThreshold>,
    alerts: Vec<ActiveAlert>,
    max_retained_alerts: usize,
}

impl AlertEngine {
    pub fn new(thresholds: Vec<AlertThreshold>) -> Self {
        Self {
            thresholds,
            alerts: Vec::new(),
            max_retained_alerts: DEFAULT_MAX_RETAINED_ALERTS,
        }
    }

    pub fn with_max_retained_alerts(mut self, max: usize) -> Self {
        self.max_retained_alerts = max.max(1);
        self
    }

    /// Evaluate every threshold against one sample
    pub fn evaluate(&mut self, sample: &MetricSample, now: DateTime<Utc>) -> AlertEvaluation {
        let mut outcome = AlertEvaluation::default();
        let mut created = Vec::new();

        for threshold in self.thresholds.iter_mut() {
            if !threshold.is_active || threshold.metric != sample.metric {
                continue;
            }
            if !threshold.is_breached(sample.value) {
                continue;
            }
            if threshold.in_cooldown(now) {
                debug!(
                    threshold_id = %threshold.id,
                    metric = %sample.metric,
                    value = sample.value,
                    "Breach suppressed by cooldown"
                );
                outcome.suppressed.push(threshold.id.clone());
                continue;
            }

            threshold.trigger_count += 1;
            threshold.last_triggered_at = Some(now);

            let alert = ActiveAlert {
                id: uuid::Uuid::new_v4().to_string(),
                threshold_id: threshold.id.clone(),
                threshold_name: threshold.name.clone(),
                metric: sample.metric.clone(),
                current_value: sample.value,
                threshold_value: threshold.value,
                severity: threshold.severity,
                message: alert_message(threshold, sample.value),
                triggered_at: now,
                status: AlertStatus::Active,
                acknowledged_at: None,
                resolved_at: None,
                campaign_id: sample.campaign_id.clone(),
            };

            created.push(alert.clone());
            outcome.triggered.push(TriggeredAlert {
                alert,
                channels: threshold.active_channels(),
            });
        }

        for alert in created {
            self.retain(alert);
        }
        outcome
    }

    /// Push an alert and evict down to the cap
    ///
    /// Alerts are stored oldest first. Eviction takes the oldest resolved
    /// alert, then the oldest acknowledged one, then the oldest active one.
    fn retain(&mut self, alert: ActiveAlert) {
        self.alerts.push(alert);
        while self.alerts.len() > self.max_retained_alerts {
            let victim = [AlertStatus::Resolved, AlertStatus::Acknowledged, AlertStatus::Active]
                .iter()
                .find_map(|status| self.alerts.iter().position(|a| a.status == *status));
            match victim {
                Some(idx) => {
                    self.alerts.remove(idx);
                }
                None => break,
            }
        }
    }

    /// Mark an active alert as acknowledged
    pub fn acknowledge(&mut self, id: &str, now: DateTime<Utc>) -> MonitorResult<ActiveAlert> {
        let alert = self.alert_mut(id)?;
        if alert.status != AlertStatus::Active {
            return Err(invalid_transition(alert, AlertStatus::Acknowledged));
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_at = Some(now);
        Ok(alert.clone())
    }

    /// Resolve an active or acknowledged alert
    pub fn resolve(&mut self, id: &str, now: DateTime<Utc>) -> MonitorResult<ActiveAlert> {
        let alert = self.alert_mut(id)?;
        if alert.status == AlertStatus::Resolved {
            return Err(invalid_transition(alert, AlertStatus::Resolved));
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_at = Some(now);
        Ok(alert.clone())
    }

    fn alert_mut(&mut self, id: &str) -> MonitorResult<&mut ActiveAlert> {
        self.alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| MonitorError::AlertNotFound(id.to_string()))
    }

    /// Alerts, newest first, optionally filtered by status
    pub fn alerts(&self, status: Option<AlertStatus>) -> Vec<ActiveAlert> {
        self.alerts
            .iter()
            .rev()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect()
    }

    pub fn thresholds(&self) -> &[AlertThreshold] {
        &self.thresholds
    }

    /// Insert or replace a threshold by id
    ///
    /// Trigger bookkeeping is carried over when an existing threshold is
    /// replaced, so an edit cannot reset its cooldown.
    pub fn upsert_threshold(&mut self, mut threshold: AlertThreshold) -> MonitorResult<AlertThreshold> {
        threshold.validate()?;

        match self.thresholds.iter_mut().find(|t| t.id == threshold.id) {
            Some(existing) => {
                threshold.last_triggered_at = existing.last_triggered_at;
                threshold.trigger_count = existing.trigger_count;
                *existing = threshold.clone();
            }
            None => self.thresholds.push(threshold.clone()),
        }
        Ok(threshold)
    }

    pub fn remove_threshold(&mut self, id: &str) -> MonitorResult<AlertThreshold> {
        let idx = self
            .thresholds
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| MonitorError::ThresholdNotFound(id.to_string()))?;
        Ok(self.thresholds.remove(idx))
    }
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn alert_message(threshold: &AlertThreshold, value: f64) -> String {
    match (threshold.operator, threshold.max_value) {
        (super::Operator::Between, Some(max)) => format!(
            "{}: {} is {:.2} (between {:.2} and {:.2})",
            threshold.name, threshold.metric, value, threshold.value, max
        ),
        (op, _) => format!(
            "{}: {} is {:.2} ({} {:.2})",
            threshold.name,
            threshold.metric,
            value,
            op.symbol(),
            threshold.value
        ),
    }
}

fn invalid_transition(alert: &ActiveAlert, to: AlertStatus) -> MonitorError {
    MonitorError::InvalidTransition {
        id: alert.id.clone(),
        from: alert.status.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{ChannelType, Operator};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
    }

    fn spend(value: f64, at: DateTime<Utc>) -> MetricSample {
        MetricSample::new("spend", value, at)
    }

    fn engine_with_cooldown(minutes: i64) -> AlertEngine {
        AlertEngine::new(vec![AlertThreshold::new(
            "spend-cap",
            "spend",
            Operator::Gt,
            1000.0,
            Severity::High,
        )
        .with_cooldown_minutes(minutes)
        .with_channel(NotificationChannel::new("ops", ChannelType::Slack))
        .with_channel(NotificationChannel {
            is_active: false,
            ..NotificationChannel::new("muted", ChannelType::Email)
        })])
    }

    #[test]
    fn test_breach_creates_active_alert() {
        let mut engine = engine_with_cooldown(60);
        let outcome = engine.evaluate(&spend(1500.0, t0()), t0());

        assert_eq!(outcome.triggered.len(), 1);
        let triggered = &outcome.triggered[0];
        assert_eq!(triggered.alert.status, AlertStatus::Active);
        assert_eq!(triggered.alert.current_value, 1500.0);
        assert_eq!(triggered.alert.threshold_value, 1000.0);
        assert_eq!(triggered.alert.severity, Severity::High);
        assert_eq!(triggered.channels.len(), 1);
        assert_eq!(triggered.channels[0].id, "ops");

        let threshold = &engine.thresholds()[0];
        assert_eq!(threshold.trigger_count, 1);
        assert_eq!(threshold.last_triggered_at, Some(t0()));
    }

    #[test]
    fn test_alert_carries_campaign() {
        let mut engine = engine_with_cooldown(0);
        let outcome = engine.evaluate(&spend(1500.0, t0()).with_campaign("camp-9"), t0());
        assert_eq!(outcome.triggered[0].alert.campaign_id.as_deref(), Some("camp-9"));
    }

    #[test]
    fn test_cooldown_suppresses_then_releases() {
        let mut engine = engine_with_cooldown(60);
        assert_eq!(engine.evaluate(&spend(1500.0, t0()), t0()).triggered.len(), 1);

        let at_30 = t0() + Duration::minutes(30);
        let outcome = engine.evaluate(&spend(1600.0, at_30), at_30);
        assert!(outcome.triggered.is_empty());
        assert_eq!(outcome.suppressed, vec!["spend-cap".to_string()]);

        let at_61 = t0() + Duration::minutes(61);
        assert_eq!(engine.evaluate(&spend(1700.0, at_61), at_61).triggered.len(), 1);

        assert_eq!(engine.thresholds()[0].trigger_count, 2);
        assert_eq!(engine.alerts(None).len(), 2);
    }

    #[test]
    fn test_unrepresentable_cooldown_does_not_panic() {
        let mut engine = engine_with_cooldown(i64::MAX);
        assert_eq!(engine.evaluate(&spend(1500.0, t0()), t0()).triggered.len(), 1);

        let later = t0() + Duration::days(1);
        let outcome = engine.evaluate(&spend(1600.0, later), later);
        assert!(outcome.triggered.is_empty());
        assert_eq!(outcome.suppressed, vec!["spend-cap".to_string()]);
    }

    #[test]
    fn test_retention_cap_holds_without_resolved_alerts() {
        let mut engine = engine_with_cooldown(0).with_max_retained_alerts(5);
        for i in 0..50 {
            let at = t0() + Duration::minutes(i);
            engine.evaluate(&spend(1500.0 + i as f64, at), at);
        }

        let alerts = engine.alerts(None);
        assert_eq!(alerts.len(), 5);
        // The newest breaches survive
        assert!(alerts.iter().all(|a| a.current_value >= 1545.0));
    }

    #[test]
    fn test_retention_evicts_resolved_then_acknowledged_first() {
        let mut engine = engine_with_cooldown(0).with_max_retained_alerts(3);
        let mut ids = Vec::new();
        for i in 0..3 {
            let at = t0() + Duration::minutes(i);
            ids.push(engine.evaluate(&spend(1500.0, at), at).triggered[0].alert.id.clone());
        }
        engine.acknowledge(&ids[1], t0()).unwrap();
        engine.resolve(&ids[2], t0()).unwrap();

        let at = t0() + Duration::minutes(10);
        engine.evaluate(&spend(1500.0, at), at);
        let kept: Vec<String> = engine.alerts(None).iter().map(|a| a.id.clone()).collect();
        assert!(!kept.contains(&ids[2]));
        assert!(kept.contains(&ids[1]));

        let at = t0() + Duration::minutes(11);
        engine.evaluate(&spend(1500.0, at), at);
        let kept: Vec<String> = engine.alerts(None).iter().map(|a| a.id.clone()).collect();
        assert!(!kept.contains(&ids[1]));
        assert!(kept.contains(&ids[0]));
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_no_breach_no_alert() {
        let mut engine = engine_with_cooldown(0);
        let outcome = engine.evaluate(&spend(900.0, t0()), t0());
        assert!(outcome.triggered.is_empty());
        assert!(outcome.suppressed.is_empty());
    }

    #[test]
    fn test_inactive_and_mismatched_thresholds_skipped() {
        let mut engine = AlertEngine::new(vec![
            AlertThreshold {
                is_active: false,
                ..AlertThreshold::new("off", "spend", Operator::Gt, 1.0, Severity::Low)
            },
            AlertThreshold::new("clicks", "clicks", Operator::Gt, 1.0, Severity::Low),
        ]);

        assert!(engine.evaluate(&spend(50.0, t0()), t0()).triggered.is_empty());
    }

    #[test]
    fn test_between_without_max_never_fires() {
        let mut engine = AlertEngine::new(vec![AlertThreshold::new(
            "band",
            "spend",
            Operator::Between,
            10.0,
            Severity::Medium,
        )]);
        assert!(engine.evaluate(&spend(20.0, t0()), t0()).triggered.is_empty());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut engine = engine_with_cooldown(0);
        let id = engine.evaluate(&spend(1500.0, t0()), t0()).triggered[0]
            .alert
            .id
            .clone();

        let later = t0() + Duration::minutes(5);
        let acked = engine.acknowledge(&id, later).unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_at, Some(later));

        // Acknowledging twice is not allowed
        assert!(matches!(
            engine.acknowledge(&id, later),
            Err(MonitorError::InvalidTransition { .. })
        ));

        let resolved = engine.resolve(&id, later).unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);

        // Resolved alerts never move back
        assert!(engine.acknowledge(&id, later).is_err());
        assert!(engine.resolve(&id, later).is_err());

        assert_eq!(engine.alerts(Some(AlertStatus::Resolved)).len(), 1);
        assert!(engine.alerts(Some(AlertStatus::Active)).is_empty());
    }

    #[test]
    fn test_resolve_directly_from_active() {
        let mut engine = engine_with_cooldown(0);
        let id = engine.evaluate(&spend(1500.0, t0()), t0()).triggered[0]
            .alert
            .id
            .clone();
        assert_eq!(engine.resolve(&id, t0()).unwrap().status, AlertStatus::Resolved);
    }

    #[test]
    fn test_unknown_alert() {
        let mut engine = AlertEngine::default();
        assert_eq!(
            engine.acknowledge("missing", t0()).unwrap_err(),
            MonitorError::AlertNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_upsert_preserves_trigger_state() {
        let mut engine = engine_with_cooldown(60);
        engine.evaluate(&spend(1500.0, t0()), t0());

        let edited = AlertThreshold::new("spend-cap", "spend", Operator::Gt, 2000.0, Severity::Critical)
            .with_cooldown_minutes(60);
        let stored = engine.upsert_threshold(edited).unwrap();

        assert_eq!(stored.trigger_count, 1);
        assert_eq!(stored.last_triggered_at, Some(t0()));
        assert_eq!(engine.thresholds().len(), 1);
        assert_eq!(engine.thresholds()[0].value, 2000.0);
    }

    #[test]
    fn test_upsert_rejects_invalid_between() {
        let mut engine = AlertEngine::default();
        let bad = AlertThreshold::new("b", "cpc", Operator::Between, 3.0, Severity::Low).with_max_value(1.0);
        assert!(engine.upsert_threshold(bad).is_err());
        assert!(engine.thresholds().is_empty());
    }

    #[test]
    fn test_remove_threshold() {
        let mut engine = engine_with_cooldown(0);
        assert!(engine.remove_threshold("spend-cap").is_ok());
        assert_eq!(
            engine.remove_threshold("spend-cap").unwrap_err(),
            MonitorError::ThresholdNotFound("spend-cap".to_string())
        );
    }

    #[test]
    fn test_retention_evicts_resolved_first() {
        let mut engine = engine_with_cooldown(0).with_max_retained_alerts(2);

        let first = engine.evaluate(&spend(1500.0, t0()), t0()).triggered[0].alert.id.clone();
        engine.resolve(&first, t0()).unwrap();
        engine.evaluate(&spend(1500.0, t0()), t0());
        engine.evaluate(&spend(1500.0, t0()), t0());

        let alerts = engine.alerts(None);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.id != first));
    }

    #[test]
    fn test_alert_message() {
        let mut engine = engine_with_cooldown(0);
        let outcome = engine.evaluate(&spend(1500.0, t0()), t0());
        assert_eq!(outcome.triggered[0].alert.message, "spend-cap: spend is 1500.00 (> 1000.00)");
    }
}
