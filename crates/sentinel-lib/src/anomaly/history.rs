//! Bounded anomaly history

use crate::models::AnomalyRecord;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Default number of anomalies retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Fixed-capacity ring buffer of anomalies, newest first
#[derive(Debug, Clone)]
pub struct AnomalyHistory {
    records: VecDeque<AnomalyRecord>,
    capacity: usize,
}

impl AnomalyHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a record at the front, evicting the oldest when full
    pub fn push(&mut self, record: AnomalyRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_back();
        }
        self.records.push_front(record);
    }

    /// Whether a record for `metric` exists within `window` of `timestamp`
    pub fn contains_near(&self, metric: &str, timestamp: DateTime<Utc>, window: Duration) -> bool {
        let window_ms = window.num_milliseconds();
        self.records.iter().any(|r| {
            r.metric == metric
                && (r.timestamp - timestamp).num_milliseconds().abs() <= window_ms
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnomalyRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<AnomalyRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AnomalyHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
