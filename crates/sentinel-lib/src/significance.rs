//! A/B test significance
//!
//! Click-through rates of one control and one treatment variant are
//! compared with a two-proportion z-test. Evaluation is a pure function of
//! the test definition.

use crate::error::{MonitorError, MonitorResult};
use crate::stats::{inverse_normal_cdf, two_proportion_z_test};
use serde::{Deserialize, Serialize};

fn default_confidence_level() -> f64 {
    95.0
}

fn default_power() -> f64 {
    80.0
}

fn default_min_detectable_effect_pct() -> f64 {
    10.0
}

/// Raw counters for one variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantMetrics {
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: f64,
}

impl VariantMetrics {
    /// Click-through rate, 0 without impressions
    pub fn click_rate(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.clicks as f64 / self.impressions as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ABTestVariant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_control: bool,
    #[serde(default)]
    pub metrics: VariantMetrics,
}

impl ABTestVariant {
    pub fn new(id: impl Into<String>, is_control: bool, impressions: u64, clicks: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            is_control,
            metrics: VariantMetrics {
                impressions,
                clicks,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ABTest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Percent, e.g. 95
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Percent, e.g. 80
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default = "default_min_detectable_effect_pct")]
    pub min_detectable_effect_pct: f64,
    pub variants: Vec<ABTestVariant>,
}

impl ABTest {
    pub fn new(id: impl Into<String>, variants: Vec<ABTestVariant>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            confidence_level: default_confidence_level(),
            power: default_power(),
            min_detectable_effect_pct: default_min_detectable_effect_pct(),
            variants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceResult {
    pub confidence: f64,
    pub power: f64,
    pub min_detectable_effect_pct: f64,
    /// Absent while either variant has no impressions
    pub current_p_value: Option<f64>,
    pub z_score: f64,
    pub is_significant: bool,
    pub winning_variant_id: Option<String>,
    pub control_rate: f64,
    pub treatment_rate: f64,
    pub relative_lift_pct: f64,
    /// Impressions needed across both variants; 0 when it cannot be estimated
    pub required_sample_size: u64,
    pub current_sample_size: u64,
    pub progress_pct: f64,
}

/// Stateless evaluator for A/B tests
#[derive(Debug, Clone, Copy, Default)]
pub struct SignificanceEngine;

impl SignificanceEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, test: &ABTest) -> MonitorResult<SignificanceResult> {
        validate_levels(test)?;
        let (control, treatment) = split_variants(test)?;

        let c = &control.metrics;
        let t = &treatment.metrics;
        let control_rate = c.click_rate();
        let treatment_rate = t.click_rate();

        let (p_value, z_score) = two_proportion_z_test(
            c.clicks as f64,
            c.impressions as f64,
            t.clicks as f64,
            t.impressions as f64,
        );

        let current_p_value = (c.impressions > 0 && t.impressions > 0).then_some(p_value);
        let alpha = 1.0 - test.confidence_level / 100.0;
        let is_significant = current_p_value.map_or(false, |p| p < alpha);

        let winning_variant_id = if !is_significant {
            None
        } else if treatment_rate > control_rate {
            Some(treatment.id.clone())
        } else {
            Some(control.id.clone())
        };

        let relative_lift_pct = if control_rate > 0.0 {
            (treatment_rate - control_rate) / control_rate * 100.0
        } else {
            0.0
        };

        let required_sample_size = required_sample_size(
            control_rate,
            test.min_detectable_effect_pct / 100.0,
            alpha,
            test.power / 100.0,
        );
        let current_sample_size = c.impressions + t.impressions;
        let progress_pct = if required_sample_size == 0 {
            0.0
        } else {
            (current_sample_size as f64 / required_sample_size as f64 * 100.0).min(100.0)
        };

        Ok(SignificanceResult {
            confidence: test.confidence_level,
            power: test.power,
            min_detectable_effect_pct: test.min_detectable_effect_pct,
            current_p_value,
            z_score,
            is_significant,
            winning_variant_id,
            control_rate,
            treatment_rate,
            relative_lift_pct,
            required_sample_size,
            current_sample_size,
            progress_pct,
        })
    }
}

fn validate_levels(test: &ABTest) -> MonitorResult<()> {
    let in_open_percent = |v: f64| v > 0.0 && v < 100.0;

    if !in_open_percent(test.confidence_level) {
        return Err(MonitorError::InvalidExperiment(format!(
            "confidence level {} must be between 0 and 100",
            test.confidence_level
        )));
    }
    if !in_open_percent(test.power) {
        return Err(MonitorError::InvalidExperiment(format!(
            "power {} must be between 0 and 100",
            test.power
        )));
    }
    if !test.min_detectable_effect_pct.is_finite() || test.min_detectable_effect_pct <= 0.0 {
        return Err(MonitorError::InvalidExperiment(
            "minimum detectable effect must be positive".to_string(),
        ));
    }
    Ok(())
}

fn split_variants(test: &ABTest) -> MonitorResult<(&ABTestVariant, &ABTestVariant)> {
    let controls: Vec<&ABTestVariant> = test.variants.iter().filter(|v| v.is_control).collect();
    let treatments: Vec<&ABTestVariant> = test.variants.iter().filter(|v| !v.is_control).collect();

    match (controls.as_slice(), treatments.as_slice()) {
        ([control], [treatment]) => Ok((control, treatment)),
        _ => Err(MonitorError::InvalidExperiment(format!(
            "expected exactly one control and one treatment, got {} and {}",
            controls.len(),
            treatments.len()
        ))),
    }
}

/// Total impressions (both variants) needed to detect a relative lift of
/// `mde` over `baseline` with a two-sided test
fn required_sample_size(baseline: f64, mde: f64, alpha: f64, power: f64) -> u64 {
    if baseline <= 0.0 {
        return 0;
    }
    let target = (baseline * (1.0 + mde)).min(1.0);
    let delta = target - baseline;
    if delta <= 0.0 {
        return 0;
    }

    let z_alpha = inverse_normal_cdf(1.0 - alpha / 2.0);
    let z_beta = inverse_normal_cdf(power);
    let variance = baseline * (1.0 - baseline) + target * (1.0 - target);
    let per_variant = ((z_alpha + z_beta).powi(2) * variance / delta.powi(2)).ceil();

    (per_variant as u64) * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctr_test(control_clicks: u64, treatment_clicks: u64) -> ABTest {
        ABTest::new(
            "headline",
            vec![
                ABTestVariant::new("control", true, 1000, control_clicks),
                ABTestVariant::new("treatment", false, 1000, treatment_clicks),
            ],
        )
    }

    #[test]
    fn test_significant_lift() {
        let result = SignificanceEngine::new().evaluate(&ctr_test(50, 80)).unwrap();

        let p = result.current_p_value.unwrap();
        assert!(p > 0.004 && p < 0.008, "p = {p}");
        assert!((result.z_score - 2.73).abs() < 0.05);
        assert!(result.is_significant);
        assert_eq!(result.winning_variant_id.as_deref(), Some("treatment"));
        assert!((result.control_rate - 0.05).abs() < 1e-12);
        assert!((result.treatment_rate - 0.08).abs() < 1e-12);
        assert!((result.relative_lift_pct - 60.0).abs() < 1e-9);
        assert_eq!(result.current_sample_size, 2000);
    }

    #[test]
    fn test_required_sample_size_and_progress() {
        let result = SignificanceEngine::new().evaluate(&ctr_test(50, 80)).unwrap();

        // 5% baseline, 10% relative lift, 95% confidence, 80% power
        assert!(
            (62_000..63_000).contains(&result.required_sample_size),
            "required = {}",
            result.required_sample_size
        );
        assert!(result.progress_pct > 3.0 && result.progress_pct < 3.5);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let engine = SignificanceEngine::new();
        let test = ctr_test(50, 80);
        assert_eq!(engine.evaluate(&test).unwrap(), engine.evaluate(&test).unwrap());
    }

    #[test]
    fn test_not_significant_has_no_winner() {
        let result = SignificanceEngine::new().evaluate(&ctr_test(50, 52)).unwrap();
        assert!(!result.is_significant);
        assert!(result.winning_variant_id.is_none());
    }

    #[test]
    fn test_control_can_win() {
        let result = SignificanceEngine::new().evaluate(&ctr_test(80, 50)).unwrap();
        assert!(result.is_significant);
        assert_eq!(result.winning_variant_id.as_deref(), Some("control"));
        assert!(result.relative_lift_pct < 0.0);
    }

    #[test]
    fn test_no_impressions_has_no_p_value() {
        let test = ABTest::new(
            "fresh",
            vec![
                ABTestVariant::new("control", true, 0, 0),
                ABTestVariant::new("treatment", false, 500, 20),
            ],
        );
        let result = SignificanceEngine::new().evaluate(&test).unwrap();

        assert!(result.current_p_value.is_none());
        assert!(!result.is_significant);
        assert_eq!(result.required_sample_size, 0);
        assert_eq!(result.progress_pct, 0.0);
    }

    #[test]
    fn test_variant_shape_is_validated() {
        let engine = SignificanceEngine::new();

        let two_controls = ABTest::new(
            "bad",
            vec![
                ABTestVariant::new("a", true, 10, 1),
                ABTestVariant::new("b", true, 10, 1),
            ],
        );
        assert!(matches!(
            engine.evaluate(&two_controls),
            Err(MonitorError::InvalidExperiment(_))
        ));

        let three_way = ABTest::new(
            "bad",
            vec![
                ABTestVariant::new("a", true, 10, 1),
                ABTestVariant::new("b", false, 10, 1),
                ABTestVariant::new("c", false, 10, 1),
            ],
        );
        assert!(engine.evaluate(&three_way).is_err());
    }

    #[test]
    fn test_confidence_level_is_validated() {
        let mut test = ctr_test(50, 80);
        test.confidence_level = 100.0;
        assert!(SignificanceEngine::new().evaluate(&test).is_err());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let json = r#"{
            "id": "t1",
            "variants": [
                {"id": "a", "name": "A", "isControl": true, "metrics": {"impressions": 100, "clicks": 5}},
                {"id": "b", "name": "B", "metrics": {"impressions": 100, "clicks": 9}}
            ]
        }"#;
        let test: ABTest = serde_json::from_str(json).unwrap();

        assert_eq!(test.confidence_level, 95.0);
        assert_eq!(test.power, 80.0);
        assert_eq!(test.min_detectable_effect_pct, 10.0);
        assert!(!test.variants[1].is_control);
        assert_eq!(test.variants[1].metrics.conversions, 0);
    }
}
