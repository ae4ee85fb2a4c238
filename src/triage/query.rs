use serde::{Deserialize, Serialize};

pub const MIN_RESULTS: u32 = 5;
pub const MAX_RESULTS: u32 = 50;
pub const RESULTS_STEP: u32 = 5;

/// Recency window, rendered as a Gmail `newer_than:` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1d")]
    Day,
    #[default]
    #[serde(rename = "2d")]
    TwoDays,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    Week,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [Self::Day, Self::TwoDays, Self::ThreeDays, Self::Week];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "1d",
            Self::TwoDays => "2d",
            Self::ThreeDays => "3d",
            Self::Week => "7d",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Day => "Last 24 hours",
            Self::TwoDays => "Last 2 days",
            Self::ThreeDays => "Last 3 days",
            Self::Week => "Last week",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s.trim())
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Day => Self::TwoDays,
            Self::TwoDays => Self::ThreeDays,
            Self::ThreeDays => Self::Week,
            Self::Week => Self::Day,
        }
    }
}

/// User-facing search controls that compose into a Gmail query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub time_range: TimeRange,
    pub max_results: u32,
    pub filter: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            time_range: TimeRange::TwoDays,
            max_results: 10,
            filter: "category:primary".to_string(),
        }
    }
}

impl SearchSettings {
    pub fn new(time_range: TimeRange, max_results: u32, filter: &str) -> Self {
        Self {
            time_range,
            max_results: clamp_results(max_results),
            filter: filter.trim().to_string(),
        }
    }

    pub fn query(&self) -> String {
        let base = format!("is:unread newer_than:{}", self.time_range.as_str());
        if self.filter.is_empty() {
            base
        } else {
            format!("{base} {}", self.filter)
        }
    }

    pub fn more_results(&mut self) {
        self.max_results = clamp_results(self.max_results.saturating_add(RESULTS_STEP));
    }

    pub fn fewer_results(&mut self) {
        self.max_results = clamp_results(self.max_results.saturating_sub(RESULTS_STEP));
    }
}

pub fn clamp_results(n: u32) -> u32 {
    n.clamp(MIN_RESULTS, MAX_RESULTS)
}
