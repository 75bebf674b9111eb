//! A/B experiment significance

use anyhow::Result;
use colored::Colorize;

use crate::client::{ApiClient, ExperimentRequest, SignificanceResult, Variant, VariantCounts};
use crate::output::{format_pct, print_json, OutputFormat};

/// Observed counts for a two-arm test
#[derive(Debug, Clone)]
pub struct ExperimentArgs {
    pub control_impressions: u64,
    pub control_clicks: u64,
    pub treatment_impressions: u64,
    pub treatment_clicks: u64,
    pub confidence: f64,
    pub power: f64,
    pub mde: f64,
}

impl ExperimentArgs {
    pub fn to_request(&self) -> Result<ExperimentRequest> {
        if self.control_clicks > self.control_impressions
            || self.treatment_clicks > self.treatment_impressions
        {
            anyhow::bail!("Clicks cannot exceed impressions");
        }

        Ok(ExperimentRequest {
            id: "cli".to_string(),
            name: "sentinelctl experiment".to_string(),
            confidence_level: self.confidence,
            power: self.power,
            min_detectable_effect_pct: self.mde,
            variants: vec![
                Variant {
                    id: "control".to_string(),
                    name: "Control".to_string(),
                    is_control: true,
                    metrics: VariantCounts {
                        impressions: self.control_impressions,
                        clicks: self.control_clicks,
                    },
                },
                Variant {
                    id: "treatment".to_string(),
                    name: "Treatment".to_string(),
                    is_control: false,
                    metrics: VariantCounts {
                        impressions: self.treatment_impressions,
                        clicks: self.treatment_clicks,
                    },
                },
            ],
        })
    }
}

pub async fn significance(client: &ApiClient, args: ExperimentArgs, format: OutputFormat) -> Result<()> {
    let request = args.to_request()?;
    let result: SignificanceResult = client
        .post("api/v1/experiments/significance", &request)
        .await?;

    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Table => {
            let verdict = if result.is_significant {
                "significant".green().bold().to_string()
            } else {
                "not significant".yellow().to_string()
            };
            println!("Result:          {}", verdict);
            if let Some(winner) = &result.winning_variant_id {
                println!("Winner:          {}", winner);
            }
            match result.current_p_value {
                Some(p) => println!("p-value:         {:.4}", p),
                None => println!("p-value:         n/a"),
            }
            println!("z-score:         {:.3}", result.z_score);
            println!("Control rate:    {}", format_pct(result.control_rate * 100.0));
            println!("Treatment rate:  {}", format_pct(result.treatment_rate * 100.0));
            println!("Relative lift:   {}", format_pct(result.relative_lift_pct));
            println!(
                "Sample size:     {} / {} ({})",
                result.current_sample_size,
                result.required_sample_size,
                format_pct(result.progress_pct)
            );
        }
    }

    Ok(())
}
