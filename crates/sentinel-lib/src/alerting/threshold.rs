//! User-defined alert thresholds and notification channels

use crate::error::{MonitorError, MonitorResult};
use crate::models::Severity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tolerance used by `eq` and `neq`
pub const EQUALITY_TOLERANCE: f64 = 0.01;

/// Comparison applied to a sample value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Neq,
    Between,
}

impl Operator {
    /// Evaluate `value` against the threshold bounds
    ///
    /// `between` is inclusive and fails closed when `max_value` is missing.
    pub fn evaluate(&self, value: f64, threshold: f64, max_value: Option<f64>) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Eq => (value - threshold).abs() < EQUALITY_TOLERANCE,
            Operator::Neq => (value - threshold).abs() >= EQUALITY_TOLERANCE,
            Operator::Between => match max_value {
                Some(max) => value >= threshold && value <= max,
                None => false,
            },
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Between => "between",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Gt => write!(f, "gt"),
            Operator::Lt => write!(f, "lt"),
            Operator::Eq => write!(f, "eq"),
            Operator::Neq => write!(f, "neq"),
            Operator::Between => write!(f, "between"),
        }
    }
}

/// Delivery mechanism of a notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Slack,
    Webhook,
    Push,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Email => write!(f, "email"),
            ChannelType::Slack => write!(f, "slack"),
            ChannelType::Webhook => write!(f, "webhook"),
            ChannelType::Push => write!(f, "push"),
        }
    }
}

/// A notification target attached to a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Channel specific settings (`url`, `recipients`, `device`, ...)
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl NotificationChannel {
    pub fn new(id: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            id: id.into(),
            channel_type,
            config: HashMap::new(),
            is_active: true,
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// An alert rule evaluated against incoming samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertThreshold {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub operator: Operator,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub cooldown_period_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trigger_count: u64,
    #[serde(default)]
    pub notification_channels: Vec<NotificationChannel>,
}

impl AlertThreshold {
    pub fn new(
        id: impl Into<String>,
        metric: impl Into<String>,
        operator: Operator,
        value: f64,
        severity: Severity,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            metric: metric.into(),
            operator,
            value,
            max_value: None,
            severity,
            is_active: true,
            cooldown_period_minutes: 0,
            last_triggered_at: None,
            trigger_count: 0,
            notification_channels: Vec::new(),
        }
    }

    pub fn with_max_value(mut self, max_value: f64) -> Self {
        self.max_value = Some(max_value);
        self
    }

    pub fn with_cooldown_minutes(mut self, minutes: i64) -> Self {
        self.cooldown_period_minutes = minutes;
        self
    }

    pub fn with_channel(mut self, channel: NotificationChannel) -> Self {
        self.notification_channels.push(channel);
        self
    }

    /// Check structural invariants before the threshold is stored
    pub fn validate(&self) -> MonitorResult<()> {
        let invalid = |reason: &str| MonitorError::InvalidThreshold {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if self.metric.trim().is_empty() {
            return Err(invalid("metric is empty"));
        }
        if !self.value.is_finite() {
            return Err(invalid("value is not finite"));
        }
        if self.cooldown_period_minutes < 0 {
            return Err(invalid("cooldown period is negative"));
        }
        if Duration::try_minutes(self.cooldown_period_minutes).is_none() {
            return Err(invalid("cooldown period is out of range"));
        }
        if let (Operator::Between, Some(max)) = (self.operator, self.max_value) {
            if max < self.value {
                return Err(invalid("max value is below value"));
            }
        }
        Ok(())
    }

    /// Whether the operator condition holds for `value`
    pub fn is_breached(&self, value: f64) -> bool {
        self.operator.evaluate(value, self.value, self.max_value)
    }

    /// Whether a breach at `now` falls inside the cooldown period
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered_at {
            None => false,
            // An unrepresentable cooldown never expires
            Some(last) => match Duration::try_minutes(self.cooldown_period_minutes) {
                Some(cooldown) => now - last < cooldown,
                None => true,
            },
        }
    }

    /// Channels that should receive notifications
    pub fn active_channels(&self) -> Vec<NotificationChannel> {
        self.notification_channels
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect()
    }
}
