//! Retained metric history
//!
//! Each metric keeps an ordered, append-only series bounded both by a
//! retention window (measured back from the newest sample) and by a hard
//! sample cap. The store also queues samples for the alert loop, which
//! evaluates every ingested sample exactly once.

use crate::error::{MonitorError, MonitorResult};
use crate::models::MetricSample;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default hard cap on samples retained per metric
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;

/// Default cap on samples waiting for alert evaluation
const MAX_PENDING_SAMPLES: usize = 10_000;

/// Dashboard time-range selectors mapped to retention windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl RetentionWindow {
    pub fn duration(&self) -> Duration {
        match self {
            RetentionWindow::OneHour => Duration::hours(1),
            RetentionWindow::SixHours => Duration::hours(6),
            RetentionWindow::OneDay => Duration::hours(24),
            RetentionWindow::SevenDays => Duration::days(7),
            RetentionWindow::ThirtyDays => Duration::days(30),
        }
    }
}

impl Default for RetentionWindow {
    fn default() -> Self {
        RetentionWindow::OneDay
    }
}

/// Time-ordered samples for a single metric
#[derive(Debug, Clone)]
pub struct HistoricalSeries {
    samples: VecDeque<MetricSample>,
    retention: Duration,
    max_samples: usize,
}

impl HistoricalSeries {
    pub fn new(retention: Duration, max_samples: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
            max_samples: max_samples.max(1),
        }
    }

    /// Append a sample, enforcing ordering and the retention bounds
    pub fn append(&mut self, sample: MetricSample) -> MonitorResult<()> {
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return Err(MonitorError::OutOfOrderSample {
                    metric: sample.metric,
                });
            }
        }

        let newest = sample.timestamp;
        self.samples.push_back(sample);
        self.expire(newest);
        Ok(())
    }

    fn expire(&mut self, newest: chrono::DateTime<chrono::Utc>) {
        let cutoff = newest - self.retention;
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }
}

/// Per-metric series plus the queue of samples awaiting alert evaluation
#[derive(Debug)]
pub struct MetricStore {
    series: HashMap<String, HistoricalSeries>,
    pending_alerts: VecDeque<MetricSample>,
    retention: Duration,
    max_samples: usize,
}

impl MetricStore {
    pub fn new(retention: Duration, max_samples: usize) -> Self {
        Self {
            series: HashMap::new(),
            pending_alerts: VecDeque::new(),
            retention,
            max_samples,
        }
    }

    /// Validate and append a sample to its metric's series
    pub fn ingest(&mut self, sample: MetricSample) -> MonitorResult<()> {
        if sample.metric.trim().is_empty() {
            return Err(MonitorError::InvalidSample {
                metric: sample.metric,
                reason: "metric name is empty".to_string(),
            });
        }
        if !sample.value.is_finite() {
            return Err(MonitorError::InvalidSample {
                metric: sample.metric,
                reason: format!("value {} is not finite", sample.value),
            });
        }

        let (retention, max_samples) = (self.retention, self.max_samples);
        self.series
            .entry(sample.metric.clone())
            .or_insert_with(|| HistoricalSeries::new(retention, max_samples))
            .append(sample.clone())?;

        if self.pending_alerts.len() >= MAX_PENDING_SAMPLES {
            self.pending_alerts.pop_front();
        }
        self.pending_alerts.push_back(sample);
        Ok(())
    }

    pub fn series(&self, metric: &str) -> Option<&HistoricalSeries> {
        self.series.get(metric)
    }

    /// Metric names in sorted order
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.series.keys().cloned().collect();
        names.sort();
        names
    }

    /// Take every sample not yet seen by the alert loop
    pub fn drain_pending(&mut self) -> Vec<MetricSample> {
        self.pending_alerts.drain(..).collect()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    pub fn total_samples(&self) -> usize {
        self.series.values().map(|s| s.len()).sum()
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(RetentionWindow::default().duration(), DEFAULT_MAX_SAMPLES)
    }
}
