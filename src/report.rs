//! Report structures handed to formatters
//!
//! Everything here is plain data with `Serialize`; printing is up to the caller.
//! Statistics over an empty group are `None` (serialized as `null`) rather
//! than zero.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{stages::validator::RejectionTally, PatternType, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// `None` if either timestamp is outside chrono's representable range
    pub fn from_millis(start: i64, end: i64) -> Option<Self> {
        Some(Self {
            start: DateTime::from_timestamp_millis(start)?,
            end: DateTime::from_timestamp_millis(end)?,
        })
    }
}

/// count / mean / median / min / max of a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

/// Success rate of one tier within a (timeframe, pattern type) group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierStats {
    pub timeframe: Option<Timeframe>,
    pub pattern_type: PatternType,
    pub tier: f64,
    pub count_at_or_above: usize,
    pub total_count: usize,
    /// `count_at_or_above / total_count`, `None` when the group is empty
    pub success_rate: Option<f64>,
}

/// How soon after the breakout price crossed back through the open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrossingDelay {
    pub next_bar: usize,
    pub second_bar: usize,
    pub third_bar: usize,
    pub later: usize,
    /// Detected but never crossed within the lookahead
    pub never: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub pattern_type: PatternType,
    /// Detected events, crossing or not
    pub pattern_count: usize,
    /// Events that crossed the open and were measured
    pub result_count: usize,
    pub tiers: Vec<TierStats>,
    pub moves: Option<Summary>,
    pub percents: Option<Summary>,
    pub crossing_delay: CrossingDelay,
}

impl GroupReport {
    pub fn tier(&self, tier: f64) -> Option<&TierStats> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Success rate at `tier`; `None` for an unknown tier or an empty group
    pub fn success_rate(&self, tier: f64) -> Option<f64> {
        self.tier(tier)?.success_rate
    }

    /// No measured results, all statistics undefined
    pub fn is_undefined(&self) -> bool {
        self.result_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeReport {
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub date_range: Option<DateRange>,
    pub zero_range_count: usize,
    /// Distribution of `high - low` over the resampled candles
    pub ranges: Option<Summary>,
    pub groups: Vec<GroupReport>,
}

impl TimeframeReport {
    pub fn group(&self, pattern_type: PatternType) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.pattern_type == pattern_type)
    }
}

/// Base series audit: what came in and what was flagged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseSummary {
    pub candle_count: usize,
    pub date_range: Option<DateRange>,
    pub rejected: RejectionTally,
    pub zero_range_count: usize,
    /// Candles with `0 < range < tiny_range_threshold`
    pub tiny_range_count: usize,
    pub ranges: Option<Summary>,
    pub gap_count: usize,
    pub largest_gap_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub instrument: String,
    pub base: BaseSummary,
    pub timeframes: Vec<TimeframeReport>,
}

impl AnalysisReport {
    pub fn timeframe(&self, timeframe: Timeframe) -> Option<&TimeframeReport> {
        self.timeframes.iter().find(|t| t.timeframe == timeframe)
    }

    pub fn group(&self, timeframe: Timeframe, pattern_type: PatternType) -> Option<&GroupReport> {
        self.timeframe(timeframe)?.group(pattern_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range() {
        let r = DateRange::from_millis(0, 86_400_000).unwrap();
        assert_eq!(r.start.to_rfc3339(), "1970-01-01T00:00:00+00:00");
        assert_eq!(r.end.to_rfc3339(), "1970-01-02T00:00:00+00:00");
        assert!(DateRange::from_millis(0, i64::MAX).is_none());
    }
}
