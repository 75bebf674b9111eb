//! Shared numeric primitives
//!
//! Every helper guards its own degenerate inputs (empty slices, zero variance,
//! zero totals) and returns a neutral value instead of failing, so an all-zero
//! metric series can never abort a detection cycle.

use serde::{Deserialize, Serialize};

/// Minimum pooled standard error used by the two-proportion test
const MIN_STANDARD_ERROR: f64 = 0.001;

/// Slope difference that marks a trend change point
const TREND_CHANGE_THRESHOLD: f64 = 0.1;

/// Default z-score threshold for outlier detection
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 2.5;

/// Default window for trend change detection
pub const DEFAULT_TREND_WINDOW: usize = 10;

// Abramowitz-Stegun 7.1.26 coefficients
const ERF_A1: f64 = 0.254829592;
const ERF_A2: f64 = -0.284496736;
const ERF_A3: f64 = 1.421413741;
const ERF_A4: f64 = -1.453152027;
const ERF_A5: f64 = 1.061405429;
const ERF_P: f64 = 0.3275911;

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 for fewer than two values
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Number of standard deviations `value` lies from `mean`
///
/// Returns 0 when `std_dev` is 0.
pub fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 0.0;
    }
    (value - mean) / std_dev
}

/// Flag every element whose |z-score| exceeds `threshold`
///
/// The whole slice is its own baseline, so one extreme value inflates the
/// standard deviation and can hide itself in a short series.
pub fn detect_outliers(values: &[f64], threshold: f64) -> Vec<bool> {
    let mean = mean(values);
    let std_dev = population_std_dev(values);

    values
        .iter()
        .map(|v| z_score(*v, mean, std_dev).abs() > threshold)
        .collect()
}

/// Trailing moving average
///
/// Index `i` averages `values[max(0, i - window + 1)..=i]`, so the first
/// `window - 1` entries use a shorter window.
pub fn moving_average(values: &[f64], window_size: usize) -> Vec<f64> {
    let window_size = window_size.max(1);

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window_size);
            mean(&values[start..=i])
        })
        .collect()
}

/// Direction of a detected trend change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Upward,
    Downward,
}

/// A point where the smoothed slope changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendChange {
    pub index: usize,
    pub direction: TrendDirection,
    pub before_slope: f64,
    pub after_slope: f64,
}

/// Detect trend change points on the moving average of `values`
///
/// For each index `i` in `[window, len - window)` the average slope of the
/// smoothed series over the preceding window is compared with the slope over
/// the following window.
pub fn detect_trend_change(values: &[f64], window_size: usize) -> Vec<TrendChange> {
    let window = window_size.max(1);
    if values.len() < window.saturating_mul(2) {
        return Vec::new();
    }

    let smoothed = moving_average(values, window);
    let span = window as f64;

    (window..values.len() - window)
        .filter_map(|i| {
            let before_slope = (smoothed[i] - smoothed[i - window]) / span;
            let after_slope = (smoothed[i + window] - smoothed[i]) / span;

            if (before_slope - after_slope).abs() > TREND_CHANGE_THRESHOLD {
                let direction = if after_slope > before_slope {
                    TrendDirection::Upward
                } else {
                    TrendDirection::Downward
                };
                Some(TrendChange {
                    index: i,
                    direction,
                    before_slope,
                    after_slope,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Error function, Abramowitz-Stegun rational approximation (|error| < 1.5e-7)
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + ERF_P * x);
    let y = 1.0
        - (((((ERF_A5 * t + ERF_A4) * t) + ERF_A3) * t + ERF_A2) * t + ERF_A1)
            * t
            * (-x * x).exp();

    sign * y
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Inverse of [`normal_cdf`] by bisection
///
/// Returns infinities for `p` outside `(0, 1)`.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (mut lo, mut hi) = (-8.0_f64, 8.0_f64);
    for _ in 0..100 {
        let mid = (lo + hi) / 2.0;
        if normal_cdf(mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

/// Two-sided two-proportion z-test
///
/// Uses the pooled rate for the standard error (clamped to
/// [`MIN_STANDARD_ERROR`]) and the observed difference for the statistic,
/// without continuity correction. Returns `(p_value, z_score)`; a zero total
/// on either side yields `(1.0, 0.0)`.
pub fn two_proportion_z_test(
    control_success: f64,
    control_total: f64,
    treatment_success: f64,
    treatment_total: f64,
) -> (f64, f64) {
    if control_total <= 0.0 || treatment_total <= 0.0 {
        return (1.0, 0.0);
    }

    let control_rate = control_success / control_total;
    let treatment_rate = treatment_success / treatment_total;
    let pooled = (control_success + treatment_success) / (control_total + treatment_total);

    let standard_error = (pooled * (1.0 - pooled) * (1.0 / control_total + 1.0 / treatment_total))
        .sqrt()
        .max(MIN_STANDARD_ERROR);

    let z = (treatment_rate - control_rate).abs() / standard_error;
    let p_value = 2.0 * (1.0 - normal_cdf(z.abs()));

    (p_value, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_constant_series_has_no_outliers() {
        for value in [0.0, 1.0, 100.0, -42.5] {
            let flags = detect_outliers(&vec![value; 50], DEFAULT_OUTLIER_THRESHOLD);
            assert!(flags.iter().all(|f| !f));
        }
    }

    #[test]
    fn test_detect_outliers_flags_extreme_value() {
        let mut values = vec![100.0; 30];
        values.push(400.0);

        let flags = detect_outliers(&values, 2.5);
        assert!(flags[30]);
        assert_eq!(flags.iter().filter(|f| **f).count(), 1);
    }

    #[test]
    fn test_z_score_zero_std_dev() {
        assert_eq!(z_score(10.0, 5.0, 0.0), 0.0);
        assert_close(z_score(7.0, 5.0, 2.0), 1.0, 1e-12);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(
            moving_average(&[10.0, 10.0, 10.0, 10.0], 2),
            vec![10.0, 10.0, 10.0, 10.0]
        );
        assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), vec![1.0, 1.5, 2.5, 3.5]);
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn test_trend_change_flat_series() {
        assert!(detect_trend_change(&vec![5.0; 40], 5).is_empty());
    }

    #[test]
    fn test_trend_change_detects_upturn() {
        let values: Vec<f64> = (0..40)
            .map(|i| if i < 20 { 0.0 } else { (i - 19) as f64 })
            .collect();

        let changes = detect_trend_change(&values, 5);
        assert!(!changes.is_empty());
        assert_eq!(changes[0].index, 16);
        assert!(changes
            .iter()
            .all(|c| c.direction == TrendDirection::Upward && (16..27).contains(&c.index)));
    }

    #[test]
    fn test_trend_change_short_series() {
        assert!(detect_trend_change(&[1.0, 2.0, 3.0], 10).is_empty());
    }

    #[test]
    fn test_trend_change_huge_window() {
        assert!(detect_trend_change(&vec![5.0; 30], usize::MAX).is_empty());
    }

    #[test]
    fn test_erf_values() {
        assert_close(erf(0.0), 0.0, 1e-6);
        assert_close(erf(1.0), 0.842_700_79, 1e-6);
        assert_close(erf(-1.0), -erf(1.0), 1e-12);
        assert_close(erf(3.0), 0.999_977_9, 1e-6);
    }

    #[test]
    fn test_normal_cdf() {
        assert_close(normal_cdf(0.0), 0.5, 1e-6);
        assert_close(normal_cdf(1.96), 0.975, 1e-3);
        assert_close(normal_cdf(-1.96), 0.025, 1e-3);
    }

    #[test]
    fn test_inverse_normal_cdf() {
        assert_close(inverse_normal_cdf(0.975), 1.96, 1e-2);
        assert_close(inverse_normal_cdf(0.8), 0.8416, 1e-3);
        assert_close(inverse_normal_cdf(0.5), 0.0, 1e-6);
        assert!(inverse_normal_cdf(0.0).is_infinite());
    }

    #[test]
    fn test_two_proportion_z_test_reference_case() {
        let (p_value, z) = two_proportion_z_test(50.0, 1000.0, 80.0, 1000.0);

        assert_close(z, 2.73, 0.05);
        assert!(p_value < 0.05);
        assert!(p_value > 0.004 && p_value < 0.008, "p = {p_value}");
    }

    #[test]
    fn test_two_proportion_z_test_is_symmetric() {
        let (p1, z1) = two_proportion_z_test(50.0, 1000.0, 80.0, 1000.0);
        let (p2, z2) = two_proportion_z_test(80.0, 1000.0, 50.0, 1000.0);
        assert_eq!(p1, p2);
        assert_eq!(z1, z2);
    }

    #[test]
    fn test_two_proportion_z_test_degenerate_inputs() {
        assert_eq!(two_proportion_z_test(0.0, 0.0, 5.0, 100.0), (1.0, 0.0));

        // All-zero conversions: standard error clamps instead of dividing by zero
        let (p_value, z) = two_proportion_z_test(0.0, 1000.0, 0.0, 1000.0);
        assert_eq!(z, 0.0);
        assert_close(p_value, 1.0, 1e-6);
    }
}
