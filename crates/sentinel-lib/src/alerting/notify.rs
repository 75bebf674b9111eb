//! Notification delivery for triggered alerts
//!
//! Delivery is fire-and-forget: every channel gets its own task with a
//! timeout and bounded retries, and a failing channel never affects the
//! others or the alert itself.

use super::engine::ActiveAlert;
use super::threshold::{ChannelType, NotificationChannel};
use crate::observability::MonitorMetrics;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_NOTIFY_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel '{channel}' is missing config key '{key}'")]
    MissingConfig { channel: String, key: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint rejected notification with status {0}")]
    Rejected(u16),

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),

    #[error("no notifier registered for channel type {0}")]
    Unsupported(ChannelType),
}

/// Delivers one alert to one channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &NotificationChannel, alert: &ActiveAlert) -> Result<(), NotifyError>;
}

/// Posts alerts to webhook and Slack endpoints
///
/// Both read the target from `config["url"]`. Webhooks receive the alert
/// as JSON; Slack receives `{"text": message}`.
pub struct HttpNotifier {
    client: Client,
}

impl HttpNotifier {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, channel: &NotificationChannel, alert: &ActiveAlert) -> Result<(), NotifyError> {
        let url = channel
            .config
            .get("url")
            .ok_or_else(|| NotifyError::MissingConfig {
                channel: channel.id.clone(),
                key: "url".to_string(),
            })?;

        let request = match channel.channel_type {
            ChannelType::Slack => self
                .client
                .post(url)
                .json(&serde_json::json!({ "text": alert.message })),
            ChannelType::Webhook => self.client.post(url).json(alert),
            other => return Err(NotifyError::Unsupported(other)),
        };

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        debug!(channel_id = %channel.id, alert_id = %alert.id, "Notification delivered");
        Ok(())
    }
}

/// Records email and push deliveries in the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel: &NotificationChannel, alert: &ActiveAlert) -> Result<(), NotifyError> {
        info!(
            event = "notification_sent",
            channel_id = %channel.id,
            channel_type = %channel.channel_type,
            recipients = channel.config.get("recipients").map(String::as_str).unwrap_or(""),
            alert_id = %alert.id,
            severity = %alert.severity,
            "{}",
            alert.message
        );
        Ok(())
    }
}

/// Routes alerts to the notifier for each channel type
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifiers: HashMap<ChannelType, Arc<dyn Notifier>>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
    metrics: MonitorMetrics,
}

impl NotificationDispatcher {
    /// Dispatcher with the HTTP notifier for webhook/Slack and the log
    /// notifier for email/push
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, NotifyError> {
        let http: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(timeout)?);
        let log: Arc<dyn Notifier> = Arc::new(LogNotifier);

        Ok(Self::empty(timeout, max_retries)
            .with_notifier(ChannelType::Webhook, http.clone())
            .with_notifier(ChannelType::Slack, http)
            .with_notifier(ChannelType::Email, log.clone())
            .with_notifier(ChannelType::Push, log))
    }

    /// Dispatcher without any registered notifiers
    pub fn empty(timeout: Duration, max_retries: u32) -> Self {
        Self {
            notifiers: HashMap::new(),
            timeout,
            max_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn with_notifier(mut self, channel_type: ChannelType, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.insert(channel_type, notifier);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Spawn one delivery task per active channel
    ///
    /// The handles are returned for callers that want to wait; the monitor
    /// drops them.
    pub fn dispatch(
        &self,
        channels: &[NotificationChannel],
        alert: &ActiveAlert,
    ) -> Vec<JoinHandle<Result<(), NotifyError>>> {
        channels
            .iter()
            .filter(|c| c.is_active)
            .map(|channel| {
                let dispatcher = self.clone();
                let channel = channel.clone();
                let alert = alert.clone();
                tokio::spawn(async move { dispatcher.deliver(&channel, &alert).await })
            })
            .collect()
    }

    async fn deliver(&self, channel: &NotificationChannel, alert: &ActiveAlert) -> Result<(), NotifyError> {
        let result = self.deliver_with_retry(channel, alert).await;

        if let Err(e) = &result {
            warn!(
                channel_id = %channel.id,
                channel_type = %channel.channel_type,
                alert_id = %alert.id,
                error = %e,
                "Notification delivery failed"
            );
            self.metrics
                .inc_notification_failures(&channel.channel_type.to_string());
        }
        result
    }

    async fn deliver_with_retry(
        &self,
        channel: &NotificationChannel,
        alert: &ActiveAlert,
    ) -> Result<(), NotifyError> {
        let notifier = self
            .notifiers
            .get(&channel.channel_type)
            .ok_or(NotifyError::Unsupported(channel.channel_type))?;

        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, notifier.send(channel, alert)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(()) => return Ok(()),
                // Configuration problems do not heal on retry
                Err(e @ (NotifyError::MissingConfig { .. } | NotifyError::Unsupported(_))) => {
                    return Err(e)
                }
                Err(e) if attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    debug!(
                        channel_id = %channel.id,
                        attempt = attempt + 1,
                        error = %e,
                        "Retrying notification"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::AlertStatus;
    use crate::models::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alert() -> ActiveAlert {
        ActiveAlert {
            id: "alert-1".to_string(),
            threshold_id: "spend-cap".to_string(),
            threshold_name: "Spend cap".to_string(),
            metric: "spend".to_string(),
            current_value: 1500.0,
            threshold_value: 1000.0,
            severity: Severity::High,
            message: "Spend cap: spend is 1500.00 (> 1000.00)".to_string(),
            triggered_at: chrono::Utc::now(),
            status: AlertStatus::Active,
            acknowledged_at: None,
            resolved_at: None,
            campaign_id: None,
        }
    }

    /// Fails a fixed number of times, then succeeds
    struct FlakyNotifier {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _: &NotificationChannel, _: &ActiveAlert) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(NotifyError::Rejected(503))
            } else {
                Ok(())
            }
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn send(&self, _: &NotificationChannel, _: &ActiveAlert) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_webhook_posts_alert_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "id": "alert-1",
                "thresholdId": "spend-cap",
                "status": "active"
            })))
            .with_status(200)
            .create_async()
            .await;

        let channel = NotificationChannel::new("hook", ChannelType::Webhook)
            .with_config("url", format!("{}/hook", server.url()));
        let notifier = HttpNotifier::new(Duration::from_secs(5)).unwrap();

        notifier.send(&channel, &alert()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_slack_posts_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/slack")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "text": "Spend cap: spend is 1500.00 (> 1000.00)"
            })))
            .with_status(200)
            .create_async()
            .await;

        let channel = NotificationChannel::new("ops", ChannelType::Slack)
            .with_config("url", format!("{}/slack", server.url()));
        let notifier = HttpNotifier::new(Duration::from_secs(5)).unwrap();

        notifier.send(&channel, &alert()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let channel = NotificationChannel::new("hook", ChannelType::Webhook)
            .with_config("url", format!("{}/hook", server.url()));
        let notifier = HttpNotifier::new(Duration::from_secs(5)).unwrap();

        assert!(matches!(
            notifier.send(&channel, &alert()).await,
            Err(NotifyError::Rejected(500))
        ));
    }

    #[tokio::test]
    async fn test_missing_url() {
        let notifier = HttpNotifier::new(Duration::from_secs(5)).unwrap();
        let channel = NotificationChannel::new("hook", ChannelType::Webhook);
        assert!(matches!(
            notifier.send(&channel, &alert()).await,
            Err(NotifyError::MissingConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_retries_until_success() {
        let flaky = Arc::new(FlakyNotifier {
            failures: 2,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = NotificationDispatcher::empty(Duration::from_secs(1), 2)
            .with_retry_backoff(Duration::from_millis(1))
            .with_notifier(ChannelType::Webhook, flaky.clone());

        let handles = dispatcher.dispatch(&[NotificationChannel::new("hook", ChannelType::Webhook)], &alert());
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatch_gives_up_after_retries() {
        let flaky = Arc::new(FlakyNotifier {
            failures: 10,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = NotificationDispatcher::empty(Duration::from_secs(1), 1)
            .with_retry_backoff(Duration::from_millis(1))
            .with_notifier(ChannelType::Webhook, flaky.clone());

        let handles = dispatcher.dispatch(&[NotificationChannel::new("hook", ChannelType::Webhook)], &alert());
        for handle in handles {
            assert!(handle.await.unwrap().is_err());
        }
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_others() {
        let ok = Arc::new(FlakyNotifier {
            failures: 0,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = NotificationDispatcher::empty(Duration::from_millis(20), 0)
            .with_notifier(ChannelType::Webhook, Arc::new(SlowNotifier))
            .with_notifier(ChannelType::Email, ok.clone());

        let channels = vec![
            NotificationChannel::new("slow", ChannelType::Webhook),
            NotificationChannel::new("mail", ChannelType::Email),
            NotificationChannel {
                is_active: false,
                ..NotificationChannel::new("off", ChannelType::Email)
            },
        ];
        let handles = dispatcher.dispatch(&channels, &alert());
        assert_eq!(handles.len(), 2);

        let results: Vec<_> = futures_join(handles).await;
        assert!(matches!(results[0], Err(NotifyError::Timeout(_))));
        assert!(results[1].is_ok());
        assert_eq!(ok.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_channel_type() {
        let dispatcher = NotificationDispatcher::empty(Duration::from_secs(1), 3);
        let handles = dispatcher.dispatch(&[NotificationChannel::new("p", ChannelType::Push)], &alert());
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Err(NotifyError::Unsupported(ChannelType::Push))));
        }
    }

    async fn futures_join(
        handles: Vec<JoinHandle<Result<(), NotifyError>>>,
    ) -> Vec<Result<(), NotifyError>> {
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }
}
