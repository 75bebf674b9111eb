//! Performance monitoring engine for advertising metrics
//!
//! This crate provides the core functionality for:
//! - Metric ingestion into bounded per-metric series
//! - Anomaly detection with pluggable models and deduplication
//! - Pattern synthesis over the anomaly history
//! - Threshold alerting with cooldowns and notification dispatch
//! - A/B test significance
//! - Health checks and observability

pub mod alerting;
pub mod anomaly;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod patterns;
pub mod scheduler;
pub mod series;
pub mod significance;
pub mod source;
pub mod stats;

pub use engine::{
    DetectionOutcome, IngestReport, Monitor, MonitorConfig, MonitorEvent, MonitorStatus,
    RejectedSample,
};
pub use error::{MonitorError, MonitorResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use source::{ChannelMetricSource, MetricSource};
