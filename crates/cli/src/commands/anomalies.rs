//! Anomaly and insight commands

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{AnomalyList, AnomalySummary, ApiClient, InsightList};
use crate::output::{
    color_confidence, color_severity, format_pct, format_timestamp, print_info, print_json,
    print_table, truncate_id, OutputFormat,
};

/// Row for anomalies table
#[derive(Tabled, Serialize)]
struct AnomalyRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    timestamp: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Type")]
    anomaly_type: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Model")]
    model: String,
}

/// Row for insights table
#[derive(Tabled, Serialize)]
struct InsightRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    insight_type: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Impact")]
    impact: String,
    #[tabled(rename = "Recommendation")]
    recommendation: String,
}

/// Build the anomalies query path
pub fn anomalies_path(metric: Option<&str>, limit: Option<usize>) -> String {
    let mut params = Vec::new();
    if let Some(metric) = metric {
        params.push(format!("metric={}", metric));
    }
    if let Some(limit) = limit {
        params.push(format!("limit={}", limit));
    }

    if params.is_empty() {
        "api/v1/anomalies".to_string()
    } else {
        format!("api/v1/anomalies?{}", params.join("&"))
    }
}

pub async fn list_anomalies(
    client: &ApiClient,
    metric: Option<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let result: AnomalyList = client
        .get(&anomalies_path(metric.as_deref(), limit))
        .await?;

    match format {
        OutputFormat::Json => print_json(&result.anomalies),
        OutputFormat::Table => {
            let rows: Vec<AnomalyRow> = result
                .anomalies
                .iter()
                .map(|a| AnomalyRow {
                    id: truncate_id(&a.id),
                    timestamp: format_timestamp(&a.timestamp),
                    metric: a.metric.clone(),
                    value: format!("{:.2}", a.value),
                    expected: format!("{:.2}", a.expected_value),
                    deviation: format_pct(a.deviation_score_pct),
                    anomaly_type: a.anomaly_type.clone(),
                    severity: color_severity(&a.severity),
                    confidence: color_confidence(a.confidence),
                    model: a.model_id.clone(),
                })
                .collect();
            print_table(&rows, format);
            if !rows.is_empty() {
                println!("\nTotal: {} anomalies", result.total);
            }
        }
    }

    Ok(())
}

pub async fn show_summary(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let summary: AnomalySummary = client.get("api/v1/anomalies/summary").await?;

    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table => {
            println!("Total anomalies: {}", summary.total);
            if let Some(latest) = &summary.latest {
                println!("Latest:          {}", format_timestamp(latest));
            }
            for (title, counts) in [
                ("By severity", &summary.by_severity),
                ("By type", &summary.by_type),
                ("By metric", &summary.by_metric),
            ] {
                if counts.is_empty() {
                    continue;
                }
                println!("\n{}:", title);
                for (key, count) in counts {
                    println!("  {:<22} {}", key, count);
                }
            }
        }
    }

    Ok(())
}

pub async fn list_insights(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: InsightList = client.get("api/v1/insights").await?;

    match format {
        OutputFormat::Json => print_json(&result.insights),
        OutputFormat::Table => {
            if result.insights.is_empty() {
                print_info("No patterns discovered yet");
                return Ok(());
            }
            let rows: Vec<InsightRow> = result
                .insights
                .iter()
                .map(|i| InsightRow {
                    id: i.id.clone(),
                    insight_type: i.insight_type.clone(),
                    confidence: color_confidence(i.confidence),
                    impact: color_severity(&i.impact),
                    recommendation: i.recommendation.clone(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
