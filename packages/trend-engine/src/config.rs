use serde::{Deserialize, Serialize};

/// Thresholds for the spike/decay heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeConfig {
    /// Points older than this are baseline; newer ones are "recent".
    pub window_hours: i64,
    /// A baseline max above this means the term was already popular.
    pub baseline_max_allowed: f64,
    /// Recent max must reach this to qualify as a spike.
    pub min_spike_value: f64,
    /// First qualifying point within this window of now gets the hot bucket.
    pub hot_window_hours: i64,
    /// Trailing window inspected by the decay check.
    pub decay_window_hours: i64,
    /// Interest at/below this inside the decay window means the spike faded.
    pub decay_max_value: f64,
    /// A spike older than this (by its own first_seen) is no longer "new".
    pub new_keyword_window_hours: i64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            window_hours: 72,
            baseline_max_allowed: 10.0,
            min_spike_value: 20.0,
            hot_window_hours: 24,
            decay_window_hours: 24,
            decay_max_value: 10.0,
            new_keyword_window_hours: 72,
        }
    }
}

impl SpikeConfig {
    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = hours;
        self
    }

    pub fn with_baseline_max_allowed(mut self, value: f64) -> Self {
        self.baseline_max_allowed = value;
        self
    }

    pub fn with_min_spike_value(mut self, value: f64) -> Self {
        self.min_spike_value = value;
        self
    }

    pub fn with_hot_window_hours(mut self, hours: i64) -> Self {
        self.hot_window_hours = hours;
        self
    }
}

/// One market a run may expand into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Provider geo id, e.g. "US".
    pub locale: String,
    pub location_code: u32,
    pub language_code: String,
}

impl Market {
    pub fn new(locale: &str, location_code: u32, language_code: &str) -> Self {
        Self {
            locale: locale.to_string(),
            location_code,
            language_code: language_code.to_string(),
        }
    }
}

/// Knobs for the recursive fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Expansion stops once a task's depth reaches this.
    pub max_depth: u32,
    /// Rising entries below this relative value are ignored.
    pub min_rising_value: f64,
    /// Markets eligible for expansion; root tasks bypass this gate.
    pub markets: Vec<Market>,
    /// Timeframes seeded per keyword per market.
    pub timeframes: Vec<String>,
    /// Capacity of the classifier response cache.
    pub classifier_cache_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            min_rising_value: 50.0,
            markets: vec![Market::new("US", 2840, "en")],
            timeframes: vec!["past_7_days".to_string()],
            classifier_cache_capacity: 512,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_rising_value(mut self, value: f64) -> Self {
        self.min_rising_value = value;
        self
    }

    pub fn with_markets(mut self, markets: Vec<Market>) -> Self {
        self.markets = markets;
        self
    }

    pub fn with_timeframes(mut self, timeframes: Vec<String>) -> Self {
        self.timeframes = timeframes;
        self
    }

    /// Look up a configured market by its provider geo id.
    pub fn market_for(&self, locale: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.locale == locale)
    }
}
