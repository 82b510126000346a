//! Retracement measurement for detected breakouts
//!
//! Starting at the candle after the breakout, find the first candle that
//! trades back through the breakout open (below it for 2U, above it for 2D).
//! The move is the distance from the open to that candle's extreme. Events
//! that never cross are not measured at all.

use serde::Serialize;

use crate::{
    config::{RangeBasis, TierGrid},
    stages::detector::PatternEvent,
    Candle, PatternType,
};

/// Measured retracement of one event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetracementResult {
    pub event: PatternEvent,
    pub absolute_move: f64,
    pub percent_of_range: f64,
    /// Highest tier with `percent_of_range >= tier`
    pub tier_reached: Option<f64>,
    /// 1 when the very next candle crosses the open
    pub bars_to_cross: usize,
    pub crossed_at: i64,
}

impl RetracementResult {
    /// Whether this result counts toward `tier`
    #[inline]
    pub fn reaches(&self, tier: f64) -> bool {
        self.percent_of_range >= tier
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetracementMeasurer<'a> {
    tiers: &'a TierGrid,
    basis: RangeBasis,
    max_lookahead: Option<usize>,
}

impl<'a> RetracementMeasurer<'a> {
    pub fn new(tiers: &'a TierGrid) -> Self {
        Self {
            tiers,
            basis: RangeBasis::default(),
            max_lookahead: None,
        }
    }

    pub fn range_basis(mut self, basis: RangeBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn max_lookahead(mut self, bars: Option<usize>) -> Self {
        self.max_lookahead = bars;
        self
    }

    /// Percentage denominator for `event` under the configured basis
    pub fn denominator(&self, event: &PatternEvent) -> f64 {
        match (self.basis, event.pattern_type) {
            (RangeBasis::PriorRange, _) => event.prior_candle_range,
            (RangeBasis::Remaining, PatternType::TwoUp) => event.open_price - event.prior_low,
            (RangeBasis::Remaining, PatternType::TwoDown) => event.prior_high - event.open_price,
        }
    }

    /// Measure one event against the series it was detected in.
    ///
    /// Returns `None` if price never crosses the open within the lookahead,
    /// or if the denominator is not positive.
    pub fn measure(&self, candles: &[Candle], event: &PatternEvent) -> Option<RetracementResult> {
        let denominator = self.denominator(event);
        if !(denominator > 0.0 && denominator.is_finite()) {
            return None;
        }

        let following = candles.get(event.anchor_index + 1..)?;
        let horizon = self.max_lookahead.unwrap_or(usize::MAX);
        let open = event.open_price;

        let (offset, crossing) = following
            .iter()
            .take(horizon)
            .enumerate()
            .find(|(_, c)| match event.pattern_type {
                PatternType::TwoUp => c.low < open,
                PatternType::TwoDown => c.high > open,
            })?;

        let absolute_move = match event.pattern_type {
            PatternType::TwoUp => open - crossing.low,
            PatternType::TwoDown => crossing.high - open,
        };
        let percent_of_range = absolute_move / denominator * 100.0;

        Some(RetracementResult {
            event: *event,
            absolute_move,
            percent_of_range,
            tier_reached: self.tiers.tier_for(percent_of_range),
            bars_to_cross: offset + 1,
            crossed_at: crossing.timestamp,
        })
    }

    /// Measure every event, dropping the ones that never cross
    pub fn measure_all<'e>(
        &self,
        candles: &[Candle],
        events: impl IntoIterator<Item = &'e PatternEvent>,
    ) -> Vec<RetracementResult> {
        events
            .into_iter()
            .filter_map(|event| self.measure(candles, event))
            .collect()
    }
}
