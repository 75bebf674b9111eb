//! Core data models for the monitoring engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single metric observation produced by an external source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adset_id: Option<String>,
}

impl MetricSample {
    pub fn new(metric: impl Into<String>, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            metric: metric.into(),
            value,
            timestamp,
            campaign_id: None,
            adset_id: None,
        }
    }

    /// Attach a campaign reference
    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    /// Attach an ad set reference
    pub fn with_adset(mut self, adset_id: impl Into<String>) -> Self {
        self.adset_id = Some(adset_id.into());
        self
    }
}

/// Classification of a detected anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Spike,
    Drop,
    TrendChange,
    SeasonalDeviation,
    Outlier,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyType::Spike => write!(f, "spike"),
            AnomalyType::Drop => write!(f, "drop"),
            AnomalyType::TrendChange => write!(f, "trend_change"),
            AnomalyType::SeasonalDeviation => write!(f, "seasonal_deviation"),
            AnomalyType::Outlier => write!(f, "outlier"),
        }
    }
}

/// Severity shared by anomalies, thresholds and alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// An anomaly emitted by a detection model
///
/// Records are immutable once emitted; the detector only stores and forwards them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub metric: String,
    pub value: f64,
    pub expected_value: f64,
    /// Absolute deviation from the expected value, in percent
    pub deviation_score_pct: f64,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    /// Confidence in the range 0-100
    pub confidence: f64,
    /// Detection model that produced the record
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adset_id: Option<String>,
}

/// Kind of cross-metric pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    RecurringAnomaly,
    PerformanceCorrelation,
    SeasonalPattern,
    CampaignInterference,
}

impl std::fmt::Display for InsightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsightType::RecurringAnomaly => write!(f, "recurring_anomaly"),
            InsightType::PerformanceCorrelation => write!(f, "performance_correlation"),
            InsightType::SeasonalPattern => write!(f, "seasonal_pattern"),
            InsightType::CampaignInterference => write!(f, "campaign_interference"),
        }
    }
}

/// Expected business impact of an insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Positive,
    Negative,
    Neutral,
}

/// A pattern derived from the anomaly history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInsight {
    /// Stable identifier; two insights with the same id are the same insight
    pub id: String,
    pub insight_type: InsightType,
    pub confidence: f64,
    pub metrics: Vec<String>,
    pub timeframe: String,
    pub actionable: bool,
    pub recommendation: String,
    pub impact: Impact,
    pub discovered_at: DateTime<Utc>,
}
