//! Threshold alerting
//!
//! This module provides:
//! - User-defined thresholds with comparison operators and cooldowns
//! - The alert lifecycle (active, acknowledged, resolved)
//! - Fire-and-forget delivery to notification channels

mod engine;
mod notify;
mod threshold;

pub use engine::{ActiveAlert, AlertEngine, AlertEvaluation, AlertStatus, TriggeredAlert};
pub use notify::{
    HttpNotifier, LogNotifier, NotificationDispatcher, Notifier, NotifyError,
    DEFAULT_NOTIFY_RETRIES, DEFAULT_NOTIFY_TIMEOUT,
};
pub use threshold::{AlertThreshold, ChannelType, NotificationChannel, Operator, EQUALITY_TOLERANCE};
