//! Daemon configuration
//!
//! Read from an optional file named by `SENTINEL_CONFIG_FILE` (format picked
//! by extension) and overlaid by `SENTINEL_*` environment variables. Every
//! field has a default, so an empty environment yields a working daemon.
//!
//! Detection models and thresholds are seeded from a separate JSON file
//! (`seed_file`) in the same camelCase shape the HTTP API uses.

use anyhow::{Context, Result};
use sentinel_lib::alerting::{AlertThreshold, DEFAULT_NOTIFY_RETRIES};
use sentinel_lib::anomaly::{DetectionModelConfig, DEFAULT_DEDUP_WINDOW_MINUTES, DEFAULT_HISTORY_CAPACITY};
use sentinel_lib::series::{RetentionWindow, DEFAULT_MAX_SAMPLES};
use sentinel_lib::MonitorConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_ENV: &str = "SENTINEL_CONFIG_FILE";
const ENV_PREFIX: &str = "SENTINEL";

#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    /// Instance name attached to log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Port for the HTTP API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_detection_interval")]
    pub detection_interval_secs: u64,

    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,

    #[serde(default = "default_retraining_interval")]
    pub retraining_interval_secs: u64,

    /// How far back each series keeps samples
    #[serde(default)]
    pub retention: RetentionWindow,

    #[serde(default = "default_max_samples")]
    pub max_samples_per_series: usize,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default = "default_dedup_window")]
    pub dedup_window_minutes: i64,

    /// Metrics scanned by detection; empty scans every ingested metric
    #[serde(default)]
    pub selected_metrics: Vec<String>,

    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,

    #[serde(default = "default_notify_retries")]
    pub notify_retries: u32,

    /// JSON file with seeded `models` and `thresholds`
    #[serde(default)]
    pub seed_file: Option<PathBuf>,

    #[serde(skip, default = "DetectionModelConfig::defaults")]
    pub models: Vec<DetectionModelConfig>,

    #[serde(skip)]
    pub thresholds: Vec<AlertThreshold>,
}

/// Contents of the seed file
#[derive(Debug, Clone, Deserialize)]
pub struct Seeds {
    #[serde(default = "DetectionModelConfig::defaults")]
    pub models: Vec<DetectionModelConfig>,
    #[serde(default)]
    pub thresholds: Vec<AlertThreshold>,
}

impl Seeds {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid seed file {}", path.display()))
    }
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "perf-sentinel".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_detection_interval() -> u64 {
    30
}

fn default_alert_interval() -> u64 {
    10
}

fn default_retraining_interval() -> u64 {
    3600
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_dedup_window() -> i64 {
    DEFAULT_DEDUP_WINDOW_MINUTES
}

fn default_notify_timeout() -> u64 {
    10
}

fn default_notify_retries() -> u32 {
    DEFAULT_NOTIFY_RETRIES
}

impl SentinelConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref().map(Path::new), None)
    }

    /// Load from an optional file and an environment map
    ///
    /// `env` replaces the process environment when given.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("selected_metrics")
            .source(env);

        let mut config: SentinelConfig = builder
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if let Some(path) = &config.seed_file {
            let seeds = Seeds::read(path)?;
            config.models = seeds.models;
            config.thresholds = seeds.thresholds;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.detection_interval_secs == 0 || self.alert_interval_secs == 0 {
            anyhow::bail!("loop intervals must be at least one second");
        }
        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be positive");
        }
        if chrono::Duration::try_minutes(self.dedup_window_minutes).is_none() {
            anyhow::bail!("dedup_window_minutes is out of range");
        }
        for model in &self.models {
            model
                .validate()
                .with_context(|| format!("Invalid seeded model '{}'", model.id))?;
        }
        for threshold in &self.thresholds {
            threshold
                .validate()
                .with_context(|| format!("Invalid seeded threshold '{}'", threshold.id))?;
        }
        Ok(())
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            instance: self.instance.clone(),
            detection_interval: Duration::from_secs(self.detection_interval_secs),
            alert_interval: Duration::from_secs(self.alert_interval_secs),
            retraining_interval: Duration::from_secs(self.retraining_interval_secs.max(1)),
            retention: self.retention.duration(),
            max_samples_per_series: self.max_samples_per_series,
            history_capacity: self.history_capacity,
            dedup_window: chrono::Duration::minutes(self.dedup_window_minutes),
            selected_metrics: self.selected_metrics.clone(),
            models: self.models.clone(),
            thresholds: self.thresholds.clone(),
            notify_timeout: Duration::from_secs(self.notify_timeout_secs),
            notify_retries: self.notify_retries,
            ..MonitorConfig::default()
        }
    }
}
