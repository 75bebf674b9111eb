//! Cross-metric pattern synthesis
//!
//! Derives insights from the anomaly history after each detection cycle.
//! Insight ids are stable, so an insight is reported once and later
//! occurrences of the same pattern are recognized by id alone.

use crate::models::{AnomalyRecord, Impact, InsightType, PatternInsight};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use std::collections::HashSet;

/// Anomalies in one hour-of-day bucket needed for a recurring pattern
const RECURRING_HOUR_MIN_ANOMALIES: usize = 2;

/// Spend/conversion anomaly pairs needed for a correlation
const CORRELATION_MIN_PAIRS: usize = 2;

/// Maximum distance between correlated anomalies
const CORRELATION_WINDOW_MINUTES: i64 = 60;

/// Share of weekend anomalies needed for a weekend pattern
const WEEKEND_SHARE_THRESHOLD: f64 = 0.4;

pub const SPEND_METRIC: &str = "spend";
pub const CONVERSIONS_METRIC: &str = "conversions";

pub const CORRELATION_INSIGHT_ID: &str = "spend-conversion-correlation";
pub const WEEKEND_INSIGHT_ID: &str = "weekend-pattern";

/// Id of the recurring-hour insight for `hour`
pub fn recurring_hour_insight_id(hour: u32) -> String {
    format!("recurring-hour-{hour}")
}

/// Accumulates insights discovered across detection cycles
#[derive(Debug, Default)]
pub struct PatternSynthesizer {
    insights: Vec<PatternInsight>,
    seen: HashSet<String>,
}

impl PatternSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate every rule against `history` and keep the new insights
    ///
    /// Returns only insights whose id has not been reported before.
    pub fn synthesize<'a, I>(&mut self, history: I, now: DateTime<Utc>) -> Vec<PatternInsight>
    where
        I: IntoIterator<Item = &'a AnomalyRecord>,
    {
        let history: Vec<&AnomalyRecord> = history.into_iter().collect();
        if history.is_empty() {
            return Vec::new();
        }

        let candidates = [
            recurring_hour(&history, now),
            spend_conversion_correlation(&history, now),
            weekend_pattern(&history, now),
        ];

        let mut discovered = Vec::new();
        for insight in candidates.into_iter().flatten() {
            if self.seen.insert(insight.id.clone()) {
                self.insights.push(insight.clone());
                discovered.push(insight);
            }
        }
        discovered
    }

    /// Every insight discovered so far, oldest first
    pub fn insights(&self) -> &[PatternInsight] {
        &self.insights
    }
}

fn recurring_hour(history: &[&AnomalyRecord], now: DateTime<Utc>) -> Option<PatternInsight> {
    let mut buckets = [0usize; 24];
    for record in history {
        buckets[record.timestamp.hour() as usize] += 1;
    }

    // Earliest hour wins ties
    let (peak_hour, peak_count) = buckets
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |best, (hour, &count)| {
            if count > best.1 {
                (hour, count)
            } else {
                best
            }
        });

    if peak_count <= RECURRING_HOUR_MIN_ANOMALIES {
        return None;
    }

    let hour = peak_hour as u32;
    let mut metrics: Vec<String> = history
        .iter()
        .filter(|r| r.timestamp.hour() == hour)
        .map(|r| r.metric.clone())
        .collect();
    metrics.sort();
    metrics.dedup();

    Some(PatternInsight {
        id: recurring_hour_insight_id(hour),
        insight_type: InsightType::RecurringAnomaly,
        confidence: 85.0,
        metrics,
        timeframe: format!("{hour:02}:00-{hour:02}:59 UTC"),
        actionable: true,
        recommendation: format!(
            "{peak_count} anomalies cluster around {hour:02}:00 UTC. Review bid schedules and \
             budget pacing for that hour."
        ),
        impact: Impact::Negative,
        discovered_at: now,
    })
}

fn spend_conversion_correlation(
    history: &[&AnomalyRecord],
    now: DateTime<Utc>,
) -> Option<PatternInsight> {
    let window = Duration::minutes(CORRELATION_WINDOW_MINUTES);
    let spend: Vec<&&AnomalyRecord> = history.iter().filter(|r| r.metric == SPEND_METRIC).collect();
    let conversions: Vec<&&AnomalyRecord> = history
        .iter()
        .filter(|r| r.metric == CONVERSIONS_METRIC)
        .collect();

    let pairs = spend
        .iter()
        .map(|s| {
            conversions
                .iter()
                .filter(|c| (s.timestamp - c.timestamp).num_seconds().abs() <= window.num_seconds())
                .count()
        })
        .sum::<usize>();

    if pairs < CORRELATION_MIN_PAIRS {
        return None;
    }

    Some(PatternInsight {
        id: CORRELATION_INSIGHT_ID.to_string(),
        insight_type: InsightType::PerformanceCorrelation,
        confidence: 75.0,
        metrics: vec![SPEND_METRIC.to_string(), CONVERSIONS_METRIC.to_string()],
        timeframe: format!("within {CORRELATION_WINDOW_MINUTES} minutes"),
        actionable: true,
        recommendation: format!(
            "Spend and conversion anomalies occurred together {pairs} times. Check whether \
             budget changes are disrupting conversion tracking or audience delivery."
        ),
        impact: Impact::Negative,
        discovered_at: now,
    })
}

fn weekend_pattern(history: &[&AnomalyRecord], now: DateTime<Utc>) -> Option<PatternInsight> {
    let weekend = history
        .iter()
        .filter(|r| matches!(r.timestamp.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    let share = weekend as f64 / history.len() as f64;

    if share <= WEEKEND_SHARE_THRESHOLD {
        return None;
    }

    let mut metrics: Vec<String> = history.iter().map(|r| r.metric.clone()).collect();
    metrics.sort();
    metrics.dedup();

    Some(PatternInsight {
        id: WEEKEND_INSIGHT_ID.to_string(),
        insight_type: InsightType::SeasonalPattern,
        confidence: 80.0,
        metrics,
        timeframe: "weekends".to_string(),
        actionable: true,
        recommendation: format!(
            "{:.0}% of anomalies fall on weekends. Consider separate weekend budgets or \
             dayparting rules.",
            share * 100.0
        ),
        impact: Impact::Neutral,
        discovered_at: now,
    })
}
