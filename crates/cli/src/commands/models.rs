//! Detection model commands

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, Model, ModelList, ModelPatch};
use crate::output::{color_status, print_json, print_success, print_table, OutputFormat};

/// Row for models table
#[derive(Tabled, Serialize)]
struct ModelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Sensitivity")]
    sensitivity: String,
    #[tabled(rename = "Metrics")]
    metrics: String,
}

pub async fn list_models(client: &ApiClient, active_only: bool, format: OutputFormat) -> Result<()> {
    let result: ModelList = client.get("api/v1/models").await?;

    let filtered: Vec<_> = if active_only {
        result.models.into_iter().filter(|m| m.is_active).collect()
    } else {
        result.models
    };

    match format {
        OutputFormat::Json => print_json(&filtered),
        OutputFormat::Table => {
            let rows: Vec<ModelRow> = filtered
                .iter()
                .map(|m| ModelRow {
                    id: m.id.clone(),
                    name: m.name.clone(),
                    kind: m.kind.clone(),
                    status: color_status(if m.is_active { "enabled" } else { "disabled" }),
                    sensitivity: format!("{:.0}", m.sensitivity),
                    metrics: m.applicable_metrics.join(", "),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

pub async fn set_model_active(
    client: &ApiClient,
    id: &str,
    is_active: bool,
    format: OutputFormat,
) -> Result<()> {
    let model: Model = client
        .patch(&format!("api/v1/models/{}", id), &ModelPatch { is_active })
        .await?;

    match format {
        OutputFormat::Json => print_json(&model),
        OutputFormat::Table => {
            let verb = if model.is_active { "enabled" } else { "disabled" };
            print_success(&format!("Model {} {}", model.id, verb));
        }
    }

    Ok(())
}
