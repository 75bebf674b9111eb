//! perf-sentinel CLI
//!
//! A command-line tool for feeding metrics to the perf-sentinel daemon and
//! inspecting its anomalies, insights, alerts and detection models.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, anomalies, experiments, ingest, models, status};
use std::path::PathBuf;

/// perf-sentinel CLI
#[derive(Parser)]
#[command(name = "sentinelctl")]
#[command(author, version, about = "CLI for the perf-sentinel performance monitor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via SENTINEL_API_URL env var)
    #[arg(long, env = "SENTINEL_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show daemon status and component health
    Status,

    /// Push metric samples to the daemon
    Ingest {
        /// Metric name (e.g. ctr, spend, conversion_rate)
        #[arg(long, required_unless_present = "file", requires = "value")]
        metric: Option<String>,

        /// Observed value
        #[arg(long)]
        value: Option<f64>,

        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        timestamp: Option<String>,

        /// Campaign the sample belongs to
        #[arg(long)]
        campaign: Option<String>,

        /// JSON file with samples, either an array or {"samples": [...]}
        #[arg(long, conflicts_with = "metric")]
        file: Option<PathBuf>,
    },

    /// Inspect detected anomalies
    #[command(subcommand)]
    Anomalies(AnomalyCommands),

    /// Show discovered cross-metric patterns
    Insights,

    /// Inspect and manage alerts
    #[command(subcommand)]
    Alerts(AlertCommands),

    /// Inspect alert thresholds
    #[command(subcommand)]
    Thresholds(ThresholdCommands),

    /// Inspect and toggle detection models
    #[command(subcommand)]
    Models(ModelCommands),

    /// A/B experiment analysis
    #[command(subcommand)]
    Experiment(ExperimentCommands),

    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum AnomalyCommands {
    /// List anomalies, newest first
    List {
        /// Filter by metric
        #[arg(long, short)]
        metric: Option<String>,

        /// Maximum number of anomalies to show
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show anomaly counts by severity, type and metric
    Summary,
}

#[derive(Subcommand)]
pub enum AlertCommands {
    /// List alerts, newest first
    List {
        /// Filter by status (active, acknowledged, resolved)
        #[arg(long)]
        status: Option<String>,
    },

    /// Acknowledge an active alert
    Ack {
        /// Alert ID
        id: String,
    },

    /// Resolve an alert
    Resolve {
        /// Alert ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ThresholdCommands {
    /// List configured thresholds
    List,
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List detection models
    List {
        /// Show only active models
        #[arg(long)]
        active_only: bool,
    },

    /// Enable a detection model
    Enable {
        /// Model ID
        id: String,
    },

    /// Disable a detection model
    Disable {
        /// Model ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ExperimentCommands {
    /// Test whether treatment click-through differs from control
    Significance {
        /// Control impressions
        #[arg(long)]
        control_impressions: u64,

        /// Control clicks
        #[arg(long)]
        control_clicks: u64,

        /// Treatment impressions
        #[arg(long)]
        treatment_impressions: u64,

        /// Treatment clicks
        #[arg(long)]
        treatment_clicks: u64,

        /// Confidence level in percent
        #[arg(long, default_value_t = 95.0)]
        confidence: f64,

        /// Statistical power in percent
        #[arg(long, default_value_t = 80.0)]
        power: f64,

        /// Minimum detectable effect in percent
        #[arg(long, default_value_t = 10.0)]
        mde: f64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,

    /// Set a configuration value (api_url, default_format)
    Set {
        /// Configuration key
        key: String,

        /// New value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        output::print_error(&e.to_string());
        if verbose {
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {}", cause);
            }
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = config::Config::load()?;
    let format = cli
        .format
        .unwrap_or_else(|| output::OutputFormat::from_config(cfg.default_format.as_deref()));

    let command = match cli.command {
        Commands::Config(cmd) => return config_command(cmd, cfg),
        command => command,
    };

    // Initialize client
    let api_url = cfg.resolve_api_url(cli.api_url);
    if cli.verbose {
        output::print_info(&format!("Using API at {}", api_url));
    }
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match command {
        Commands::Status => status::show_status(&client, format).await?,
        Commands::Ingest {
            metric,
            value,
            timestamp,
            campaign,
            file,
        } => {
            let samples = match (file, metric, value) {
                (Some(path), _, _) => ingest::samples_from_file(&path)?,
                (None, Some(metric), Some(value)) => {
                    vec![ingest::sample_from_args(metric, value, timestamp, campaign)?]
                }
                _ => anyhow::bail!("Either --file or both --metric and --value are required"),
            };
            ingest::ingest(&client, samples, format).await?;
        }
        Commands::Anomalies(cmd) => match cmd {
            AnomalyCommands::List { metric, limit } => {
                anomalies::list_anomalies(&client, metric, limit, format).await?;
            }
            AnomalyCommands::Summary => anomalies::show_summary(&client, format).await?,
        },
        Commands::Insights => anomalies::list_insights(&client, format).await?,
        Commands::Alerts(cmd) => match cmd {
            AlertCommands::List { status } => alerts::list_alerts(&client, status, format).await?,
            AlertCommands::Ack { id } => alerts::acknowledge_alert(&client, &id, format).await?,
            AlertCommands::Resolve { id } => alerts::resolve_alert(&client, &id, format).await?,
        },
        Commands::Thresholds(ThresholdCommands::List) => {
            alerts::list_thresholds(&client, format).await?;
        }
        Commands::Models(cmd) => match cmd {
            ModelCommands::List { active_only } => {
                models::list_models(&client, active_only, format).await?;
            }
            ModelCommands::Enable { id } => {
                models::set_model_active(&client, &id, true, format).await?;
            }
            ModelCommands::Disable { id } => {
                models::set_model_active(&client, &id, false, format).await?;
            }
        },
        Commands::Experiment(ExperimentCommands::Significance {
            control_impressions,
            control_clicks,
            treatment_impressions,
            treatment_clicks,
            confidence,
            power,
            mde,
        }) => {
            let args = experiments::ExperimentArgs {
                control_impressions,
                control_clicks,
                treatment_impressions,
                treatment_clicks,
                confidence,
                power,
                mde,
            };
            experiments::significance(&client, args, format).await?;
        }
        // Handled before the client is built
        Commands::Config(_) => {}
    }

    Ok(())
}

fn config_command(cmd: ConfigCommands, mut cfg: config::Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            output::print_info(&format!(
                "Config file: {}",
                config::Config::config_path()?.display()
            ));
            output::print_json(&cfg);
        }
        ConfigCommands::Set { key, value } => {
            cfg.set(&key, &value)?;
            cfg.save()?;
            output::print_success(&format!("Set {} = {}", key, value));
        }
    }
    Ok(())
}
