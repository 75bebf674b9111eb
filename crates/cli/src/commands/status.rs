//! Daemon status and health

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, MonitorStatus};
use crate::output::{color_status, print_json, OutputFormat};

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: MonitorStatus = client.get("api/v1/status").await?;
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "status": status,
            "health": health,
        })),
        OutputFormat::Table => {
            let state = if status.running { "running" } else { "stopped" };
            println!("{}", "perf-sentinel".bold());
            println!("  State:          {}", color_status(state));
            println!("  Health:         {}", color_status(&health.status));
            println!("  Series:         {}", status.series);
            println!("  Samples:        {}", status.samples);
            println!("  Anomalies:      {}", status.anomalies);
            println!("  Insights:       {}", status.insights);
            println!("  Active alerts:  {}", status.active_alerts);
            println!("  Active models:  {}", status.active_models);
            println!("  Thresholds:     {}", status.thresholds);

            println!("\n{}", "Components".bold());
            for (name, component) in &health.components {
                match &component.message {
                    Some(msg) => println!(
                        "  {:<14}  {} ({})",
                        name,
                        color_status(&component.status),
                        msg
                    ),
                    None => println!("  {:<14}  {}", name, color_status(&component.status)),
                }
            }
        }
    }

    Ok(())
}
