//! Alert and threshold commands

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{Alert, AlertList, ApiClient, ThresholdList};
use crate::output::{
    color_severity, color_status, format_timestamp, print_json, print_success, print_table,
    truncate_id, OutputFormat,
};

/// Row for alerts table
#[derive(Tabled, Serialize)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Triggered")]
    triggered_at: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Row for thresholds table
#[derive(Tabled, Serialize)]
struct ThresholdRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Cooldown")]
    cooldown: String,
    #[tabled(rename = "Triggers")]
    triggers: String,
    #[tabled(rename = "Active")]
    active: String,
}

pub async fn list_alerts(
    client: &ApiClient,
    status: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let path = match &status {
        Some(s) => format!("api/v1/alerts?status={}", s.to_lowercase()),
        None => "api/v1/alerts".to_string(),
    };
    let result: AlertList = client.get(&path).await?;

    match format {
        OutputFormat::Json => print_json(&result.alerts),
        OutputFormat::Table => {
            let rows: Vec<AlertRow> = result
                .alerts
                .iter()
                .map(|a| AlertRow {
                    id: truncate_id(&a.id),
                    triggered_at: format_timestamp(&a.triggered_at),
                    threshold: a.threshold_id.clone(),
                    severity: color_severity(&a.severity),
                    status: color_status(&a.status),
                    message: a.message.clone(),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

pub async fn acknowledge_alert(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let alert: Alert = client
        .post_empty(&format!("api/v1/alerts/{}/acknowledge", id))
        .await?;
    report_transition(&alert, "acknowledged", format);
    Ok(())
}

pub async fn resolve_alert(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let alert: Alert = client
        .post_empty(&format!("api/v1/alerts/{}/resolve", id))
        .await?;
    report_transition(&alert, "resolved", format);
    Ok(())
}

fn report_transition(alert: &Alert, verb: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(alert),
        OutputFormat::Table => {
            print_success(&format!("Alert {} {}", alert.id, verb));
            println!("{}", alert.message);
        }
    }
}

/// Human-readable threshold condition, e.g. `> 1000.00`
pub fn describe_condition(operator: &str, value: f64, max_value: Option<f64>) -> String {
    match (operator, max_value) {
        ("between", Some(max)) => format!("between {:.2} and {:.2}", value, max),
        ("gt", _) => format!("> {:.2}", value),
        ("lt", _) => format!("< {:.2}", value),
        ("eq", _) => format!("= {:.2}", value),
        ("neq", _) => format!("!= {:.2}", value),
        (op, _) => format!("{} {:.2}", op, value),
    }
}

pub async fn list_thresholds(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: ThresholdList = client.get("api/v1/thresholds").await?;

    match format {
        OutputFormat::Json => print_json(&result.thresholds),
        OutputFormat::Table => {
            let rows: Vec<ThresholdRow> = result
                .thresholds
                .iter()
                .map(|t| ThresholdRow {
                    id: t.id.clone(),
                    metric: t.metric.clone(),
                    condition: describe_condition(&t.operator, t.value, t.max_value),
                    severity: color_severity(&t.severity),
                    cooldown: format!("{}m", t.cooldown_period_minutes),
                    triggers: t.trigger_count.to_string(),
                    active: if t.is_active {
                        "✓".to_string()
                    } else {
                        "".to_string()
                    },
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
