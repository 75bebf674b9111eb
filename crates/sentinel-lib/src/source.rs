//! Sources of incoming metric samples

use crate::models::MetricSample;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// A producer polled by the ingestion loop
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Samples that arrived since the previous poll
    async fn poll(&self) -> Result<Vec<MetricSample>>;
}

/// Source fed through an mpsc channel
///
/// Producers hold the sender half returned by [`ChannelMetricSource::new`].
pub struct ChannelMetricSource {
    rx: Mutex<mpsc::Receiver<MetricSample>>,
    max_batch: usize,
}

impl ChannelMetricSource {
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<MetricSample>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let source = Self {
            rx: Mutex::new(rx),
            max_batch: buffer.max(1),
        };
        (source, tx)
    }
}

#[async_trait]
impl MetricSource for ChannelMetricSource {
    async fn poll(&self) -> Result<Vec<MetricSample>> {
        let mut rx = self.rx.lock().await;
        let mut batch = Vec::new();
        while batch.len() < self.max_batch {
            match rx.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_poll_drains_buffered_samples() {
        let (source, tx) = ChannelMetricSource::new(16);
        tx.send(MetricSample::new("spend", 1.0, Utc::now())).await.unwrap();
        tx.send(MetricSample::new("clicks", 2.0, Utc::now())).await.unwrap();

        let batch = source.poll().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].metric, "spend");

        assert!(source.poll().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_after_sender_dropped() {
        let (source, tx) = ChannelMetricSource::new(4);
        tx.send(MetricSample::new("spend", 1.0, Utc::now())).await.unwrap();
        drop(tx);

        assert_eq!(source.poll().await.unwrap().len(), 1);
        assert!(source.poll().await.unwrap().is_empty());
    }
}
