//! Spike and decay classification over interest time series.
//!
//! These are threshold/windowing heuristics, not statistical tests: a
//! series qualifies when it was quiet before the window and loud inside
//! it. False positives and negatives are expected and acceptable; the
//! thresholds exist to rank operator attention, not to prove anything.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SpikeConfig;
use crate::types::{SeriesPoint, SpikePriority};

/// Why a series did not qualify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeRejection {
    NoRecentPoints,
    BaselineTooHigh,
    SpikeTooLow,
}

impl SpikeRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpikeRejection::NoRecentPoints => "no_recent_points",
            SpikeRejection::BaselineTooHigh => "baseline_too_high",
            SpikeRejection::SpikeTooLow => "spike_too_low",
        }
    }
}

/// Outcome of one spike analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeAnalysis {
    pub qualifies: bool,
    pub reason: Option<SpikeRejection>,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub priority: Option<SpikePriority>,
    pub spike_score: Option<f64>,
    pub baseline_max: Option<f64>,
    pub recent_max: Option<f64>,
}

impl SpikeAnalysis {
    fn rejected(
        reason: SpikeRejection,
        baseline_max: Option<f64>,
        recent_max: Option<f64>,
    ) -> Self {
        Self {
            qualifies: false,
            reason: Some(reason),
            first_seen_at: None,
            last_seen_at: None,
            priority: None,
            spike_score: None,
            baseline_max,
            recent_max,
        }
    }
}

/// Classify whether a series shows a qualifying new-demand spike.
pub fn analyze_spike(series: &[SeriesPoint], now: DateTime<Utc>, config: &SpikeConfig) -> SpikeAnalysis {
    let window_start = now - Duration::hours(config.window_hours);

    let (baseline, recent): (Vec<&SeriesPoint>, Vec<&SeriesPoint>) =
        series.iter().partition(|p| p.timestamp < window_start);

    let baseline_max = max_value(&baseline);
    let recent_max = max_value(&recent);

    if recent.is_empty() {
        return SpikeAnalysis::rejected(SpikeRejection::NoRecentPoints, baseline_max, None);
    }

    if let Some(bmax) = baseline_max {
        // Already popular before the window, so not "new".
        if bmax > config.baseline_max_allowed {
            return SpikeAnalysis::rejected(SpikeRejection::BaselineTooHigh, baseline_max, recent_max);
        }
    }

    let rmax = recent_max.unwrap_or(0.0);
    if rmax < config.min_spike_value {
        return SpikeAnalysis::rejected(SpikeRejection::SpikeTooLow, baseline_max, recent_max);
    }

    let qualifying: Vec<&&SeriesPoint> = recent
        .iter()
        .filter(|p| p.value >= config.min_spike_value)
        .collect();

    let first_seen = qualifying
        .first()
        .map(|p| p.timestamp)
        .or_else(|| recent.first().map(|p| p.timestamp));
    let last_seen = qualifying
        .last()
        .map(|p| p.timestamp)
        .or_else(|| recent.last().map(|p| p.timestamp));

    let priority = first_seen.map(|ts| {
        if now - ts <= Duration::hours(config.hot_window_hours) {
            SpikePriority::Hot
        } else {
            SpikePriority::Watch
        }
    });

    SpikeAnalysis {
        qualifies: true,
        reason: None,
        first_seen_at: first_seen,
        last_seen_at: last_seen,
        priority,
        spike_score: Some(round2(rmax)),
        baseline_max,
        recent_max,
    }
}

/// Decide whether a previously-detected spike has since faded.
///
/// An empty series is not decayed; neither is one whose latest point is
/// still above the decay ceiling. Otherwise the trailing decay window
/// decides: decayed iff nothing inside it (or, absent any such points,
/// the latest point) rises above the ceiling.
pub fn has_decayed(series: &[SeriesPoint], now: DateTime<Utc>, config: &SpikeConfig) -> bool {
    let Some(latest) = series.iter().max_by_key(|p| p.timestamp) else {
        return false;
    };

    if latest.value > config.decay_max_value {
        return false;
    }

    let window_start = now - Duration::hours(config.decay_window_hours);
    let trailing_max = max_value(
        &series
            .iter()
            .filter(|p| p.timestamp >= window_start)
            .collect::<Vec<_>>(),
    );

    match trailing_max {
        Some(max) => max <= config.decay_max_value,
        None => latest.value <= config.decay_max_value,
    }
}

fn max_value(points: &[&SeriesPoint]) -> Option<f64> {
    points
        .iter()
        .map(|p| p.value)
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(hours_ago: i64, value: f64, now: DateTime<Utc>) -> SeriesPoint {
        SeriesPoint {
            timestamp: now - Duration::hours(hours_ago),
            value,
        }
    }

    fn config() -> SpikeConfig {
        SpikeConfig {
            window_hours: 72,
            baseline_max_allowed: 10.0,
            min_spike_value: 20.0,
            hot_window_hours: 24,
            decay_window_hours: 24,
            decay_max_value: 10.0,
            new_keyword_window_hours: 72,
        }
    }

    #[test]
    fn qualifying_spike_with_quiet_baseline() {
        let now = Utc::now();
        let series = vec![point(80, 5.0, now), point(2, 40.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert!(analysis.qualifies);
        assert_eq!(analysis.spike_score, Some(40.0));
        assert_eq!(analysis.priority, Some(SpikePriority::Hot));
        assert_eq!(analysis.first_seen_at, Some(now - Duration::hours(2)));
        assert_eq!(analysis.last_seen_at, Some(now - Duration::hours(2)));
    }

    #[test]
    fn loud_baseline_rejects_regardless_of_recent_values() {
        let now = Utc::now();
        let series = vec![point(80, 15.0, now), point(2, 95.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert!(!analysis.qualifies);
        assert_eq!(analysis.reason, Some(SpikeRejection::BaselineTooHigh));
        assert_eq!(analysis.baseline_max, Some(15.0));
    }

    #[test]
    fn empty_recent_window_rejects() {
        let now = Utc::now();
        let series = vec![point(100, 50.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert_eq!(analysis.reason, Some(SpikeRejection::NoRecentPoints));
    }

    #[test]
    fn weak_recent_max_rejects() {
        let now = Utc::now();
        let series = vec![point(80, 3.0, now), point(5, 12.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert_eq!(analysis.reason, Some(SpikeRejection::SpikeTooLow));
        assert_eq!(analysis.recent_max, Some(12.0));
    }

    #[test]
    fn old_qualifying_point_gets_watch_priority() {
        let now = Utc::now();
        let series = vec![point(48, 30.0, now), point(1, 35.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert!(analysis.qualifies);
        // first qualifying point is 48h back, outside the 24h hot window
        assert_eq!(analysis.priority, Some(SpikePriority::Watch));
        assert_eq!(analysis.first_seen_at, Some(now - Duration::hours(48)));
        assert_eq!(analysis.last_seen_at, Some(now - Duration::hours(1)));
    }

    #[test]
    fn recent_point_inside_hot_window_gets_hot_priority() {
        let now = Utc::now();
        let series = vec![point(10, 25.0, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert_eq!(analysis.priority, Some(SpikePriority::Hot));
    }

    #[test]
    fn score_rounds_to_two_decimals() {
        let now = Utc::now();
        let series = vec![point(2, 33.3333, now)];

        let analysis = analyze_spike(&series, now, &config());
        assert_eq!(analysis.spike_score, Some(33.33));
    }

    #[test]
    fn empty_series_is_not_decayed() {
        assert!(!has_decayed(&[], Utc::now(), &config()));
    }

    #[test]
    fn latest_point_still_high_is_not_decayed() {
        let now = Utc::now();
        let series = vec![point(50, 40.0, now), point(1, 30.0, now)];
        assert!(!has_decayed(&series, now, &config()));
    }

    #[test]
    fn quiet_trailing_window_is_decayed() {
        let now = Utc::now();
        let series = vec![point(50, 40.0, now), point(10, 8.0, now), point(1, 5.0, now)];
        assert!(has_decayed(&series, now, &config()));
    }

    #[test]
    fn stale_series_with_low_latest_point_is_decayed() {
        let now = Utc::now();
        // no points inside the trailing window at all
        let series = vec![point(60, 40.0, now), point(30, 6.0, now)];
        assert!(has_decayed(&series, now, &config()));
    }

    #[test]
    fn high_point_inside_trailing_window_is_not_decayed() {
        let now = Utc::now();
        let series = vec![point(10, 30.0, now), point(1, 9.0, now)];
        assert!(!has_decayed(&series, now, &config()));
    }
}
