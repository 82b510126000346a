//! 2U / 2D breakout detection
//!
//! A single-lookback sliding window over consecutive `(prior, current)`
//! pairs. Outside bars (higher high AND lower low) and inside bars classify
//! as neither.

use std::{iter::Enumerate, slice::Windows};

use serde::Serialize;

use crate::{Candle, OHLCExt, PatternType, Series, Timeframe, OHLC};

/// A detected 2U or 2D candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternEvent {
    pub pattern_type: PatternType,
    /// Position of the breakout candle in its series
    pub anchor_index: usize,
    pub timeframe: Option<Timeframe>,
    pub timestamp: i64,
    pub prior_candle_range: f64,
    pub prior_high: f64,
    pub prior_low: f64,
    /// Open of the breakout candle
    pub open_price: f64,
}

/// Classify `current` against `prior`.
///
/// 2U needs both a strictly higher high and a strictly higher low; 2D is the
/// mirror image. Zero-range candles are not filtered here.
#[inline]
pub fn classify<T: OHLC + ?Sized>(prior: &T, current: &T) -> Option<PatternType> {
    if current.high() > prior.high() && current.low() > prior.low() {
        Some(PatternType::TwoUp)
    } else if current.low() < prior.low() && current.high() < prior.high() {
        Some(PatternType::TwoDown)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternDetector {
    min_prior_range: f64,
}

impl PatternDetector {
    /// `min_prior_range` is an extra floor; a zero-range prior is always skipped
    pub fn new(min_prior_range: f64) -> Self {
        Self { min_prior_range }
    }

    /// Lazily scan `series` for 2U / 2D events, in series order
    pub fn scan<'a>(&self, series: &'a Series) -> Events<'a> {
        Events {
            pairs: series.candles().windows(2).enumerate(),
            timeframe: series.timeframe(),
            detector: *self,
        }
    }

    fn qualifies(&self, prior: &Candle, current: &Candle) -> bool {
        let prior_range = prior.range();
        prior_range > 0.0 && prior_range >= self.min_prior_range && !current.is_zero_range()
    }
}

/// Iterator returned by [`PatternDetector::scan`]
#[derive(Debug, Clone)]
pub struct Events<'a> {
    pairs: Enumerate<Windows<'a, Candle>>,
    timeframe: Option<Timeframe>,
    detector: PatternDetector,
}

impl Iterator for Events<'_> {
    type Item = PatternEvent;

    fn next(&mut self) -> Option<Self::Item> {
        for (i, pair) in self.pairs.by_ref() {
            let (prior, current) = (&pair[0], &pair[1]);
            if !self.detector.qualifies(prior, current) {
                continue;
            }
            if let Some(pattern_type) = classify(prior, current) {
                return Some(PatternEvent {
                    pattern_type,
                    anchor_index: i + 1,
                    timeframe: self.timeframe,
                    timestamp: current.timestamp,
                    prior_candle_range: prior.range(),
                    prior_high: prior.high,
                    prior_low: prior.low,
                    open_price: current.open,
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.pairs.size_hint().1)
    }
}
