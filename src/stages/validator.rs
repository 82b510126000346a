//! Validation of raw bars into a clean base series
//!
//! Each bar is checked on its own and counted under exactly one reason, in
//! priority order: missing data, `high < low`, open/close outside the range.
//! Those bars are dropped. Surviving bars are sorted; for duplicate timestamps
//! the last occurrence wins. Zero-range candles are tallied but kept, so
//! resampling still sees them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Candle, OHLCExt, Series, Timeframe, OHLC};

/// Why a candle was flagged
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingData,
    InvalidRange,
    InvalidRelationship,
    DuplicateTimestamp,
    /// Flag only: the candle stays in the series
    ZeroRange,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MissingData => "missing_data",
            RejectReason::InvalidRange => "invalid_range",
            RejectReason::InvalidRelationship => "invalid_relationship",
            RejectReason::DuplicateTimestamp => "duplicate_timestamp",
            RejectReason::ZeroRange => "zero_range",
        }
    }

    /// Whether a candle flagged with this reason is removed from the series
    #[inline]
    pub fn drops_candle(self) -> bool {
        !matches!(self, RejectReason::ZeroRange)
    }
}

/// Count of flagged candles per reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionTally(BTreeMap<RejectReason, usize>);

impl RejectionTally {
    pub fn record(&mut self, reason: RejectReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn count(&self, reason: RejectReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    /// Candles removed from the series
    pub fn dropped(&self) -> usize {
        self.0
            .iter()
            .filter(|(r, _)| r.drops_candle())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RejectReason, usize)> + '_ {
        self.0.iter().map(|(r, n)| (*r, *n))
    }
}

/// Stretch between two consecutive candles wider than the expected step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub from: i64,
    pub to: i64,
}

impl Gap {
    #[inline]
    pub fn len_ms(&self) -> i64 {
        self.to.saturating_sub(self.from)
    }
}

/// Output of [`Validator::validate`]
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub series: Series,
    pub rejected: RejectionTally,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    expected_step: Option<Timeframe>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report gaps wider than `step` between consecutive candles
    pub fn with_expected_step(step: Timeframe) -> Self {
        Self {
            expected_step: Some(step),
        }
    }

    pub fn validate<T, I>(&self, bars: I) -> Validation
    where
        T: OHLC,
        I: IntoIterator<Item = T>,
    {
        let mut rejected = RejectionTally::default();
        let mut kept: Vec<Candle> = Vec::new();

        for bar in bars {
            match bar.validated() {
                Ok(candle) => kept.push(candle),
                Err(reason) => rejected.record(reason),
            }
        }

        // stable: among equal timestamps, input order is preserved
        kept.sort_by_key(|c| c.timestamp);

        let mut candles: Vec<Candle> = Vec::with_capacity(kept.len());
        for candle in kept {
            match candles.last_mut() {
                Some(last) if last.timestamp == candle.timestamp => {
                    *last = candle;
                    rejected.record(RejectReason::DuplicateTimestamp);
                }
                _ => candles.push(candle),
            }
        }

        for candle in candles.iter().filter(|c| c.is_zero_range()) {
            debug!(timestamp = candle.timestamp, price = candle.high, "zero-range candle");
            rejected.record(RejectReason::ZeroRange);
        }

        let gaps = match self.expected_step {
            Some(step) => find_gaps(&candles, step),
            None => Vec::new(),
        };

        debug!(
            kept = candles.len(),
            dropped = rejected.dropped(),
            zero_range = rejected.count(RejectReason::ZeroRange),
            gaps = gaps.len(),
            "validated"
        );

        Validation {
            series: Series::from_sorted(None, candles),
            rejected,
            gaps,
        }
    }
}

/// Consecutive candles further apart than `step`
pub fn find_gaps(candles: &[Candle], step: Timeframe) -> Vec<Gap> {
    candles
        .windows(2)
        .filter(|w| w[1].timestamp.abs_diff(w[0].timestamp) > step.as_millis().unsigned_abs())
        .map(|w| Gap {
            from: w[0].timestamp,
            to: w[1].timestamp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RawCandle;

    const MIN: i64 = 60_000;

    #[test]
    fn test_empty_input() {
        let v = Validator::new().validate(Vec::<RawCandle>::new());
        assert!(v.series.is_empty());
        assert!(v.rejected.is_empty());
        assert!(v.gaps.is_empty());
    }

    #[test]
    fn test_reasons_tallied_once() {
        let bars = vec![
            RawCandle::new(0, 10.0, 11.0, 9.0, 10.5),
            RawCandle {
                timestamp: None,
                ..RawCandle::new(MIN, 10.0, 11.0, 9.0, 10.5)
            },
            // missing + inverted range counts as missing only
            RawCandle {
                close: None,
                ..RawCandle::new(2 * MIN, 10.0, 9.0, 11.0, 10.0)
            },
            RawCandle::new(3 * MIN, 10.0, 9.0, 11.0, 10.0),
            RawCandle::new(4 * MIN, 12.0, 11.0, 9.0, 10.0),
            RawCandle::new(5 * MIN, 10.0, 10.0, 10.0, 10.0),
        ];

        let v = Validator::new().validate(bars);
        assert_eq!(v.rejected.count(RejectReason::MissingData), 2);
        assert_eq!(v.rejected.count(RejectReason::InvalidRange), 1);
        assert_eq!(v.rejected.count(RejectReason::InvalidRelationship), 1);
        assert_eq!(v.rejected.count(RejectReason::ZeroRange), 1);
        assert_eq!(v.rejected.dropped(), 4);
        // zero-range candle is kept
        assert_eq!(v.series.len(), 2);
        assert_eq!(v.series.zero_range_count(), 1);
    }

    #[test]
    fn test_sorts_and_keeps_last_duplicate() {
        let bars = vec![
            Candle::new(2 * MIN, 3.0, 4.0, 2.0, 3.0),
            Candle::new(0, 1.0, 2.0, 0.5, 1.5),
            Candle::new(2 * MIN, 30.0, 40.0, 20.0, 30.0),
            Candle::new(MIN, 2.0, 3.0, 1.0, 2.0),
        ];

        let v = Validator::new().validate(bars);
        let ts: Vec<i64> = v.series.iter().map(|c| c.timestamp).collect();
        assert_eq!(ts, vec![0, MIN, 2 * MIN]);
        assert_eq!(v.series.get(2).unwrap().open, 30.0);
        assert_eq!(v.rejected.count(RejectReason::DuplicateTimestamp), 1);
    }

    #[test]
    fn test_duplicate_zero_range_not_double_counted() {
        let bars = vec![
            Candle::new(0, 5.0, 5.0, 5.0, 5.0),
            Candle::new(0, 5.0, 6.0, 4.0, 5.0),
        ];
        let v = Validator::new().validate(bars);
        assert_eq!(v.rejected.count(RejectReason::DuplicateTimestamp), 1);
        assert_eq!(v.rejected.count(RejectReason::ZeroRange), 0);
    }

    #[test]
    fn test_gap_audit() {
        let bars = vec![
            Candle::new(0, 1.0, 2.0, 0.5, 1.5),
            Candle::new(MIN, 1.0, 2.0, 0.5, 1.5),
            Candle::new(10 * MIN, 1.0, 2.0, 0.5, 1.5),
        ];
        let v = Validator::with_expected_step(Timeframe::M1).validate(bars);
        assert_eq!(v.gaps, vec![Gap { from: MIN, to: 10 * MIN }]);
        assert_eq!(v.gaps[0].len_ms(), 9 * MIN);
    }

    #[test]
    fn test_gap_audit_extreme_timestamps() {
        let bars = vec![
            Candle::new(i64::MIN + 1, 1.0, 2.0, 0.5, 1.5),
            Candle::new(i64::MAX, 1.0, 2.0, 0.5, 1.5),
        ];
        let v = Validator::with_expected_step(Timeframe::M1).validate(bars);
        assert_eq!(v.gaps.len(), 1);
        assert_eq!(v.gaps[0].len_ms(), i64::MAX);
    }
}
