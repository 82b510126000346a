//! # failtwo - Failed 2 retracement statistics
//!
//! Batch statistics for the "failed 2" price-action pattern over a historical
//! OHLC series: a candle breaks out of its predecessor (2U / 2D), then price
//! comes back through the breakout candle's open. The crate measures how far
//! that retracement travels relative to the prior candle's range and reports
//! success rates per percentage tier, for every configured timeframe.
//!
//! ## Quick Start
//!
//! ```rust
//! use failtwo::prelude::*;
//!
//! let analyzer = AnalyzerBuilder::new()
//!     .timeframes([Timeframe::M15, Timeframe::H4])
//!     .build()
//!     .unwrap();
//!
//! let bars: Vec<Candle> = vec![];
//! let report = analyzer.run("MNQ", bars);
//! assert_eq!(report.timeframes.len(), 2);
//! ```

pub mod config;
pub mod report;
pub mod stages;

pub mod prelude {
    pub use crate::{
        // Configuration
        config::{AnalysisConfig, RangeBasis, TierGrid},
        // Reports
        report::{
            AnalysisReport, BaseSummary, CrossingDelay, DateRange, GroupReport, Summary,
            TierStats, TimeframeReport,
        },
        // Stages
        stages::{
            aggregate::aggregate,
            detector::{classify, PatternDetector, PatternEvent},
            resampler::Resampler,
            retracement::{RetracementMeasurer, RetracementResult},
            validator::{Gap, RejectReason, RejectionTally, Validation, Validator},
        },
        // Parallel
        analyze_parallel,
        // Engine
        Analyzer,
        AnalyzerBuilder,
        // Errors
        AnalysisError,
        // Types
        Candle,
        PatternType,
        RawCandle,
        Result,
        Series,
        Timeframe,
        // Core traits
        OHLCExt,
        OHLC,
    };
}

use std::{fmt, str::FromStr};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::{AnalysisConfig, RangeBasis, TierGrid},
    report::{AnalysisReport, BaseSummary, DateRange, Summary, TimeframeReport},
    stages::{
        aggregate::{aggregate, summarize},
        detector::PatternDetector,
        resampler::Resampler,
        retracement::RetracementMeasurer,
        validator::{RejectReason, Validator},
    },
};

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Configuration errors. These are the only fatal failures: bad candles are
/// tallied by the validator and empty groups report undefined statistics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("No timeframes configured")]
    EmptyTimeframes,

    #[error("No tiers configured")]
    EmptyTiers,

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Fixed bucket width (must be > 0), stored in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeframe(i64);

impl Timeframe {
    pub const M1: Self = Self(MS_PER_MINUTE);
    pub const M15: Self = Self(15 * MS_PER_MINUTE);
    pub const M30: Self = Self(30 * MS_PER_MINUTE);
    pub const H1: Self = Self(MS_PER_HOUR);
    pub const H4: Self = Self(4 * MS_PER_HOUR);
    pub const H12: Self = Self(12 * MS_PER_HOUR);
    pub const D1: Self = Self(MS_PER_DAY);

    /// Create a new Timeframe, validating the width is > 0
    pub fn from_millis(millis: i64) -> Result<Self> {
        if millis <= 0 {
            return Err(AnalysisError::InvalidValue("Timeframe width must be > 0"));
        }
        Ok(Self(millis))
    }

    pub fn minutes(n: i64) -> Result<Self> {
        Self::scaled(n, MS_PER_MINUTE)
    }

    pub fn hours(n: i64) -> Result<Self> {
        Self::scaled(n, MS_PER_HOUR)
    }

    pub fn days(n: i64) -> Result<Self> {
        Self::scaled(n, MS_PER_DAY)
    }

    fn scaled(n: i64, unit: i64) -> Result<Self> {
        let millis = n
            .checked_mul(unit)
            .ok_or(AnalysisError::InvalidValue("Timeframe width overflows i64"))?;
        Self::from_millis(millis)
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Start of the bucket containing `timestamp`, aligned to `anchor`.
    ///
    /// Alignment is absolute: the result depends only on `timestamp`, `anchor`
    /// and the width, never on where a series happens to begin. Buckets that
    /// would start before `i64::MIN` are clamped to it.
    #[inline]
    pub fn bucket_start(self, timestamp: i64, anchor: i64) -> i64 {
        let ts = i128::from(timestamp);
        let offset = (ts - i128::from(anchor)).rem_euclid(i128::from(self.0));
        i64::try_from(ts - offset).unwrap_or(i64::MIN)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0;
        match ms {
            _ if ms % MS_PER_DAY == 0 => write!(f, "{}d", ms / MS_PER_DAY),
            _ if ms % MS_PER_HOUR == 0 => write!(f, "{}h", ms / MS_PER_HOUR),
            _ if ms % MS_PER_MINUTE == 0 => write!(f, "{}min", ms / MS_PER_MINUTE),
            _ if ms % MS_PER_SECOND == 0 => write!(f, "{}s", ms / MS_PER_SECOND),
            _ => write!(f, "{}ms", ms),
        }
    }
}

impl FromStr for Timeframe {
    type Err = AnalysisError;

    /// Accepts `<n><unit>` with unit one of `ms`, `s`, `m`/`min`, `h`, `d`
    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_ascii_lowercase();
        let split = label
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| AnalysisError::InvalidTimeframe(s.to_string()))?;
        let (digits, unit) = label.split_at(split);
        let n: i64 = digits
            .parse()
            .map_err(|_| AnalysisError::InvalidTimeframe(s.to_string()))?;
        let unit_ms = match unit {
            "ms" => 1,
            "s" | "sec" => MS_PER_SECOND,
            "m" | "min" => MS_PER_MINUTE,
            "h" | "hr" => MS_PER_HOUR,
            "d" => MS_PER_DAY,
            _ => return Err(AnalysisError::InvalidTimeframe(s.to_string())),
        };
        Self::scaled(n, unit_ms).map_err(|_| AnalysisError::InvalidTimeframe(s.to_string()))
    }
}

impl serde::Serialize for Timeframe {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Timeframe {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(d)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLC TRAITS
// ============================================================

/// Core input trait. Loaders implement this for whatever row type they parse.
///
/// A missing timestamp or a non-finite price is treated as missing data.
pub trait OHLC {
    fn timestamp(&self) -> Option<i64>;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn timestamp(&self) -> Option<i64> {
        (**self).timestamp()
    }

    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_zero_range(&self) -> bool {
        self.high() == self.low()
    }

    /// Check consistency in priority order: missing data, then `high < low`,
    /// then open/close outside `[low, high]`. Zero range is not a failure here.
    fn validated(&self) -> std::result::Result<Candle, RejectReason> {
        let (open, high, low, close) = (self.open(), self.high(), self.low(), self.close());
        let timestamp = match self.timestamp() {
            Some(ts) if [open, high, low, close].iter().all(|v| v.is_finite()) => ts,
            _ => return Err(RejectReason::MissingData),
        };
        if high < low {
            return Err(RejectReason::InvalidRange);
        }
        let within = low..=high;
        if !within.contains(&open) || !within.contains(&close) {
            return Err(RejectReason::InvalidRelationship);
        }
        Ok(Candle {
            timestamp,
            open,
            high,
            low,
            close,
        })
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

// ============================================================
// CANDLES AND SERIES
// ============================================================

/// A validated candle. Timestamp is Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }
}

impl OHLC for Candle {
    fn timestamp(&self) -> Option<i64> {
        Some(self.timestamp)
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }
}

/// Unvalidated input row where any field may be absent
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawCandle {
    pub timestamp: Option<i64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

impl RawCandle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp: Some(timestamp),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
        }
    }
}

impl From<Candle> for RawCandle {
    fn from(c: Candle) -> Self {
        Self::new(c.timestamp, c.open, c.high, c.low, c.close)
    }
}

impl OHLC for RawCandle {
    fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    fn open(&self) -> f64 {
        self.open.unwrap_or(f64::NAN)
    }

    fn high(&self) -> f64 {
        self.high.unwrap_or(f64::NAN)
    }

    fn low(&self) -> f64 {
        self.low.unwrap_or(f64::NAN)
    }

    fn close(&self) -> f64 {
        self.close.unwrap_or(f64::NAN)
    }
}

/// Time-ascending candles with unique timestamps.
///
/// `timeframe` is `None` for the validated base series, whose resolution is
/// whatever the loader supplied.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Series {
    timeframe: Option<Timeframe>,
    candles: Vec<Candle>,
}

impl Series {
    /// Caller guarantees ascending, unique timestamps.
    pub(crate) fn from_sorted(timeframe: Option<Timeframe>, candles: Vec<Candle>) -> Self {
        debug_assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        Self { timeframe, candles }
    }

    #[inline]
    pub fn timeframe(&self) -> Option<Timeframe> {
        self.timeframe
    }

    #[inline]
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    /// First and last timestamp
    pub fn span(&self) -> Option<(i64, i64)> {
        Some((self.candles.first()?.timestamp, self.candles.last()?.timestamp))
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let (start, end) = self.span()?;
        DateRange::from_millis(start, end)
    }

    pub fn zero_range_count(&self) -> usize {
        self.candles.iter().filter(|c| c.is_zero_range()).count()
    }

    /// Candles with `0 < range < threshold`
    pub fn tiny_range_count(&self, threshold: f64) -> usize {
        self.candles
            .iter()
            .filter(|c| c.range() > 0.0 && c.range() < threshold)
            .count()
    }

    /// Distribution of candle ranges, `None` for an empty series
    pub fn range_summary(&self) -> Option<Summary> {
        summarize(self.candles.iter().map(|c| c.range()))
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

// ============================================================
// PATTERN TYPES
// ============================================================

/// Breakout classification of a candle relative to its predecessor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PatternType {
    /// Higher high and higher low
    #[serde(rename = "2U")]
    TwoUp,
    /// Lower low and lower high
    #[serde(rename = "2D")]
    TwoDown,
}

impl PatternType {
    pub const ALL: [PatternType; 2] = [PatternType::TwoUp, PatternType::TwoDown];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            PatternType::TwoUp => "2U",
            PatternType::TwoDown => "2D",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================
// ANALYZER
// ============================================================

/// Full pipeline: validate, resample, detect, measure, aggregate.
///
/// Built through [`AnalyzerBuilder`], which rejects bad configuration before
/// any data is touched. [`Analyzer::run`] itself cannot fail.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn validator(&self) -> Validator {
        match self.config.base_step {
            Some(step) => Validator::with_expected_step(step),
            None => Validator::new(),
        }
    }

    pub fn resampler(&self) -> Resampler {
        Resampler::with_anchor(self.config.anchor_offset_ms)
    }

    pub fn detector(&self) -> PatternDetector {
        PatternDetector::new(self.config.min_prior_range)
    }

    pub fn measurer(&self) -> RetracementMeasurer<'_> {
        RetracementMeasurer::new(&self.config.tiers)
            .range_basis(self.config.range_basis)
            .max_lookahead(self.config.max_lookahead)
    }

    /// Run the whole pipeline over one instrument's raw bars.
    pub fn run<T, I>(&self, instrument: &str, bars: I) -> AnalysisReport
    where
        T: OHLC,
        I: IntoIterator<Item = T>,
    {
        let validation = self.validator().validate(bars);
        let dropped = validation.rejected.dropped();
        if dropped > 0 {
            warn!(
                instrument,
                dropped,
                kept = validation.series.len(),
                "dropped candles during validation"
            );
        }
        info!(
            instrument,
            candles = validation.series.len(),
            timeframes = self.config.timeframes.len(),
            "analyzing series"
        );

        let tiny_range_count = validation
            .series
            .tiny_range_count(self.config.tiny_range_threshold);
        if tiny_range_count > 0 {
            debug!(
                instrument,
                tiny_range_count,
                threshold = self.config.tiny_range_threshold,
                "tiny-range candles in base series"
            );
        }

        let timeframes = self.analyze_timeframes(&validation.series);

        AnalysisReport {
            instrument: instrument.to_string(),
            base: BaseSummary {
                candle_count: validation.series.len(),
                date_range: validation.series.date_range(),
                zero_range_count: validation.rejected.count(RejectReason::ZeroRange),
                tiny_range_count,
                ranges: validation.series.range_summary(),
                gap_count: validation.gaps.len(),
                largest_gap_ms: validation.gaps.iter().map(|g| g.len_ms()).max(),
                rejected: validation.rejected,
            },
            timeframes,
        }
    }

    /// Resample and analyze every configured timeframe from a validated base series.
    pub fn analyze_timeframes(&self, base: &Series) -> Vec<TimeframeReport> {
        let resampler = self.resampler();
        self.config
            .timeframes
            .par_iter()
            .map(|&timeframe| {
                let series = resampler.resample(base, timeframe);
                debug!(%timeframe, candles = series.len(), "resampled");
                self.analyze_series(timeframe, &series)
            })
            .collect()
    }

    /// Detect, measure and aggregate one already-resampled series.
    pub fn analyze_series(&self, timeframe: Timeframe, series: &Series) -> TimeframeReport {
        let events: Vec<_> = self.detector().scan(series).collect();
        let measurer = self.measurer();

        let groups = PatternType::ALL
            .par_iter()
            .map(|&pattern_type| {
                let group: Vec<_> = events
                    .iter()
                    .filter(|e| e.pattern_type == pattern_type)
                    .collect();
                let results = measurer.measure_all(series.candles(), group.iter().copied());
                debug!(
                    %timeframe,
                    %pattern_type,
                    events = group.len(),
                    results = results.len(),
                    "aggregated group"
                );
                aggregate(
                    Some(timeframe),
                    pattern_type,
                    group.len(),
                    &results,
                    &self.config.tiers,
                )
            })
            .collect();

        TimeframeReport {
            timeframe,
            candle_count: series.len(),
            date_range: series.date_range(),
            zero_range_count: series.zero_range_count(),
            ranges: series.range_summary(),
            groups,
        }
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Analyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration (e.g. one loaded from TOML)
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Replace the timeframe list
    pub fn timeframes(mut self, timeframes: impl IntoIterator<Item = Timeframe>) -> Self {
        self.config.timeframes = timeframes.into_iter().collect();
        self
    }

    pub fn add_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.config.timeframes.push(timeframe);
        self
    }

    pub fn tiers(mut self, tiers: TierGrid) -> Self {
        self.config.tiers = tiers;
        self
    }

    pub fn min_prior_range(mut self, value: f64) -> Self {
        self.config.min_prior_range = value;
        self
    }

    pub fn range_basis(mut self, basis: RangeBasis) -> Self {
        self.config.range_basis = basis;
        self
    }

    /// Bound the forward search for the crossing candle
    pub fn max_lookahead(mut self, bars: usize) -> Self {
        self.config.max_lookahead = Some(bars);
        self
    }

    /// Shift bucket alignment away from 00:00 UTC
    pub fn anchor_offset_ms(mut self, offset: i64) -> Self {
        self.config.anchor_offset_ms = offset;
        self
    }

    /// Expected spacing of base candles, enables the gap audit
    pub fn base_step(mut self, step: Timeframe) -> Self {
        self.config.base_step = Some(step);
        self
    }

    /// Upper bound (exclusive) of the tiny-range audit
    pub fn tiny_range_threshold(mut self, threshold: f64) -> Self {
        self.config.tiny_range_threshold = threshold;
        self
    }

    /// Build the analyzer
    pub fn build(self) -> Result<Analyzer> {
        Analyzer::new(self.config)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

/// Analyze several instruments in parallel. Reports come back in input order.
pub fn analyze_parallel<'a, T, I>(analyzer: &Analyzer, instruments: I) -> Vec<AnalysisReport>
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    instruments
        .into_par_iter()
        .map(|(instrument, bars)| analyzer.run(instrument, bars.iter()))
        .collect()
}

// ============================================================
// TESTS
// ============================================================
