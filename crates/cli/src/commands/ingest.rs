//! Metric ingestion commands

use anyhow::{Context, Result};
use std::path::Path;

use crate::client::{ApiClient, IngestReport, IngestRequest, Sample};
use crate::output::{print_json, print_success, print_warning, OutputFormat};

/// Build a single sample from command-line arguments
pub fn sample_from_args(
    metric: String,
    value: f64,
    timestamp: Option<String>,
    campaign: Option<String>,
) -> Result<Sample> {
    let timestamp = match timestamp {
        Some(ts) => {
            chrono::DateTime::parse_from_rfc3339(&ts)
                .with_context(|| format!("Invalid RFC 3339 timestamp: {}", ts))?;
            ts
        }
        None => chrono::Utc::now().to_rfc3339(),
    };

    Ok(Sample {
        metric,
        value,
        timestamp,
        campaign_id: campaign,
    })
}

/// Read samples from a JSON file, either a bare array or `{"samples": [...]}`
pub fn samples_from_file(path: &Path) -> Result<Vec<Sample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(request) = serde_json::from_str::<IngestRequest>(&content) {
        return Ok(request.samples);
    }
    serde_json::from_str(&content).context("Failed to parse samples file")
}

pub async fn ingest(client: &ApiClient, samples: Vec<Sample>, format: OutputFormat) -> Result<()> {
    let report: IngestReport = client
        .post("api/v1/metrics", &IngestRequest { samples })
        .await?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            print_success(&format!("Accepted {} samples", report.accepted));
            for rejected in &report.rejected {
                print_warning(&format!(
                    "Rejected #{} ({}): {}",
                    rejected.index, rejected.metric, rejected.reason
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sample_from_args_validates_timestamp() {
        let sample = sample_from_args(
            "ctr".into(),
            1.5,
            Some("2024-06-04T10:00:00Z".into()),
            Some("camp-1".into()),
        )
        .unwrap();
        assert_eq!(sample.timestamp, "2024-06-04T10:00:00Z");
        assert_eq!(sample.campaign_id.as_deref(), Some("camp-1"));

        assert!(sample_from_args("ctr".into(), 1.5, Some("noon".into()), None).is_err());
    }

    #[test]
    fn test_samples_from_file_accepts_both_shapes() {
        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(
            wrapped,
            r#"{{"samples": [{{"metric": "spend", "value": 10.0, "timestamp": "2024-06-04T10:00:00Z"}}]}}"#
        )
        .unwrap();
        assert_eq!(samples_from_file(wrapped.path()).unwrap().len(), 1);

        let mut bare = tempfile::NamedTempFile::new().unwrap();
        write!(
            bare,
            r#"[{{"metric": "spend", "value": 10.0, "timestamp": "2024-06-04T10:00:00Z"}},
                {{"metric": "ctr", "value": 1.2, "timestamp": "2024-06-04T10:00:00Z", "campaignId": "c1"}}]"#
        )
        .unwrap();
        let samples = samples_from_file(bare.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].campaign_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_ingest_posts_samples() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/metrics")
            .match_body(mockito::Matcher::Regex(r#""metric":"spend""#.to_string()))
            .with_status(200)
            .with_body(r#"{"accepted": 1, "rejected": []}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let sample =
            sample_from_args("spend".into(), 10.0, Some("2024-06-04T10:00:00Z".into()), None)
                .unwrap();
        ingest(&client, vec![sample], OutputFormat::Json)
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
