//! Analysis configuration
//!
//! Everything that shapes a run lives in [`AnalysisConfig`]:
//! - which timeframes to resample into
//! - the tier grid used for success rates
//! - the retracement denominator and lookahead bound
//!
//! # Example
//!
//! ```rust
//! use failtwo::config::AnalysisConfig;
//!
//! let config = AnalysisConfig::from_toml_str(
//!   r#"
//!   timeframes = ["15min", "4h", "12h"]
//!   tiers = [50.0, 100.0, 150.0]
//!   "#,
//! )
//! .unwrap();
//! assert_eq!(config.timeframes.len(), 3);
//! assert_eq!(config.tiers.tier_for(120.0), Some(100.0));
//! ```

use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Result, Timeframe};

// ============================================================
// TIER GRID
// ============================================================

const DEFAULT_TIERS: [f64; 8] = [25.0, 50.0, 75.0, 100.0, 125.0, 150.0, 175.0, 200.0];

/// Ascending, deduplicated set of percentage thresholds (each > 0)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierGrid(Vec<f64>);

impl TierGrid {
  /// Build a grid from arbitrary tiers. Order and duplicates in the input don't matter.
  pub fn new(tiers: impl IntoIterator<Item = f64>) -> Result<Self> {
    let mut tiers: Vec<f64> = tiers.into_iter().collect();
    if tiers.is_empty() {
      return Err(AnalysisError::EmptyTiers);
    }
    if let Some(&bad) = tiers.iter().find(|t| !t.is_finite() || **t <= 0.0) {
      return Err(AnalysisError::OutOfRange { field: "tier", value: bad, min: 0.0, max: f64::MAX });
    }
    tiers.sort_by(f64::total_cmp);
    tiers.dedup();
    Ok(Self(tiers))
  }

  /// Generate `start, start + step, ..` up to and including `end`
  pub fn stepped(start: f64, end: f64, step: f64) -> Result<Self> {
    if !step.is_finite() || step <= 0.0 {
      return Err(AnalysisError::InvalidValue("tier step must be > 0"));
    }
    if !(start.is_finite() && end.is_finite()) || end < start {
      return Err(AnalysisError::InvalidValue("tier range must satisfy start <= end"));
    }
    let mut values = Vec::new();
    let mut v = start;
    while v <= end + f64::EPSILON {
      values.push(v);
      v += step;
    }
    Self::new(values)
  }

  #[inline]
  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
    self.0.iter().copied()
  }

  /// Highest tier not exceeding `percent`, or `None` below the lowest tier.
  /// Binary search over the ascending grid.
  pub fn tier_for(&self, percent: f64) -> Option<f64> {
    let idx = self.0.partition_point(|&t| t <= percent);
    idx.checked_sub(1).map(|i| self.0[i])
  }
}

impl Default for TierGrid {
  fn default() -> Self {
    Self(DEFAULT_TIERS.to_vec())
  }
}

impl<'de> Deserialize<'de> for TierGrid {
  fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
    let tiers = Vec::<f64>::deserialize(d)?;
    // an empty list is reported by `AnalysisConfig::validate` as `EmptyTiers`
    if tiers.is_empty() {
      return Ok(Self(tiers));
    }
    TierGrid::new(tiers).map_err(serde::de::Error::custom)
  }
}

// ============================================================
// RANGE BASIS
// ============================================================

/// Denominator used to turn an absolute retracement into a percentage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBasis {
  /// Full prior candle range, `prior.high - prior.low`
  #[default]
  PriorRange,
  /// Distance from the breakout open to the far side of the prior candle
  /// (`open - prior.low` for 2U, `prior.high - open` for 2D)
  Remaining,
}

// ============================================================
// ANALYSIS CONFIG
// ============================================================

const DEFAULT_TINY_RANGE: f64 = 0.01;

/// Recognized options for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
  /// Target timeframes, analyzed and reported in this order
  pub timeframes: Vec<Timeframe>,
  pub tiers: TierGrid,
  /// Prior candles with a smaller range are never used as a reference
  pub min_prior_range: f64,
  pub range_basis: RangeBasis,
  /// Bars to search for the crossing candle; `None` scans to the end of the series
  pub max_lookahead: Option<usize>,
  /// Bucket alignment relative to 00:00 UTC, in milliseconds
  pub anchor_offset_ms: i64,
  /// Expected spacing of base candles; enables the gap audit
  pub base_step: Option<Timeframe>,
  /// Base candles with `0 < range < tiny_range_threshold` are counted as tiny
  pub tiny_range_threshold: f64,
}

impl Default for AnalysisConfig {
  fn default() -> Self {
    Self {
      timeframes: vec![
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::H12,
      ],
      tiers: TierGrid::default(),
      min_prior_range: 0.0,
      range_basis: RangeBasis::default(),
      max_lookahead: None,
      anchor_offset_ms: 0,
      base_step: None,
      tiny_range_threshold: DEFAULT_TINY_RANGE,
    }
  }
}

impl AnalysisConfig {
  /// Parse and validate a TOML document. Missing keys take their defaults.
  pub fn from_toml_str(s: &str) -> Result<Self> {
    let config: Self = toml::from_str(s).map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.timeframes.is_empty() {
      return Err(AnalysisError::EmptyTimeframes);
    }
    for (i, tf) in self.timeframes.iter().enumerate() {
      if self.timeframes[..i].contains(tf) {
        return Err(AnalysisError::InvalidConfig(format!("duplicate timeframe {}", tf)));
      }
    }
    if self.tiers.is_empty() {
      return Err(AnalysisError::EmptyTiers);
    }
    if !self.min_prior_range.is_finite() || self.min_prior_range < 0.0 {
      return Err(AnalysisError::OutOfRange {
        field: "min_prior_range",
        value: self.min_prior_range,
        min: 0.0,
        max: f64::MAX,
      });
    }
    if self.max_lookahead == Some(0) {
      return Err(AnalysisError::InvalidValue("max_lookahead must be > 0"));
    }
    let day = Timeframe::D1.as_millis();
    if self.anchor_offset_ms.unsigned_abs() >= day.unsigned_abs() {
      return Err(AnalysisError::OutOfRange {
        field: "anchor_offset_ms",
        value: self.anchor_offset_ms as f64,
        min: -(day - 1) as f64,
        max: (day - 1) as f64,
      });
    }
    if !self.tiny_range_threshold.is_finite() || self.tiny_range_threshold < 0.0 {
      return Err(AnalysisError::OutOfRange {
        field: "tiny_range_threshold",
        value: self.tiny_range_threshold,
        min: 0.0,
        max: f64::MAX,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_grid() {
    let grid = TierGrid::default();
    assert_eq!(grid.len(), 8);
    assert_eq!(grid, TierGrid::stepped(25.0, 200.0, 25.0).unwrap());
  }

  #[test]
  fn test_grid_sorts_and_dedups() {
    let grid = TierGrid::new([100.0, 25.0, 50.0, 25.0]).unwrap();
    assert_eq!(grid.as_slice(), &[25.0, 50.0, 100.0]);
  }

  #[test]
  fn test_grid_rejects_bad_tiers() {
    assert_eq!(TierGrid::new(Vec::<f64>::new()), Err(AnalysisError::EmptyTiers));
    assert!(TierGrid::new([25.0, 0.0]).is_err());
    assert!(TierGrid::new([f64::NAN]).is_err());
    assert!(TierGrid::stepped(25.0, 200.0, 0.0).is_err());
    assert!(TierGrid::stepped(200.0, 25.0, 25.0).is_err());
  }

  #[test]
  fn test_tier_for() {
    let grid = TierGrid::default();
    assert_eq!(grid.tier_for(10.0), None);
    assert_eq!(grid.tier_for(25.0), Some(25.0));
    assert_eq!(grid.tier_for(99.9), Some(75.0));
    assert_eq!(grid.tier_for(128.57), Some(125.0));
    assert_eq!(grid.tier_for(500.0), Some(200.0));
    assert_eq!(grid.tier_for(f64::NAN), None);
  }

  #[test]
  fn test_from_toml_defaults() {
    let config = AnalysisConfig::from_toml_str("").unwrap();
    assert_eq!(config, AnalysisConfig::default());
  }

  #[test]
  fn test_from_toml_full() {
    let config = AnalysisConfig::from_toml_str(
      r#"
      timeframes = ["1h", "1d"]
      tiers = [50.0, 100.0]
      min_prior_range = 0.25
      range_basis = "remaining"
      max_lookahead = 3
      anchor_offset_ms = 3600000
      base_step = "1min"
      tiny_range_threshold = 0.25
      "#,
    )
    .unwrap();

    assert_eq!(config.timeframes, vec![Timeframe::H1, Timeframe::D1]);
    assert_eq!(config.tiers.as_slice(), &[50.0, 100.0]);
    assert_eq!(config.range_basis, RangeBasis::Remaining);
    assert_eq!(config.max_lookahead, Some(3));
    assert_eq!(config.base_step, Some(Timeframe::M1));
    assert_eq!(config.tiny_range_threshold, 0.25);
  }

  #[test]
  fn test_from_toml_rejects() {
    assert_eq!(
      AnalysisConfig::from_toml_str("timeframes = []"),
      Err(AnalysisError::EmptyTimeframes)
    );
    assert_eq!(AnalysisConfig::from_toml_str("tiers = []"), Err(AnalysisError::EmptyTiers));
    assert!(matches!(
      AnalysisConfig::from_toml_str("tiers = [0.0]"),
      Err(AnalysisError::InvalidConfig(_))
    ));
    assert!(matches!(
      AnalysisConfig::from_toml_str(r#"timeframes = ["4h", "4h"]"#),
      Err(AnalysisError::InvalidConfig(_))
    ));
    assert!(matches!(
      AnalysisConfig::from_toml_str(r#"timeframes = ["fortnight"]"#),
      Err(AnalysisError::InvalidConfig(_))
    ));
    assert!(matches!(
      AnalysisConfig::from_toml_str("unknown_key = 1"),
      Err(AnalysisError::InvalidConfig(_))
    ));
    assert!(matches!(
      AnalysisConfig::from_toml_str("max_lookahead = 0"),
      Err(AnalysisError::InvalidValue(_))
    ));
    assert!(matches!(
      AnalysisConfig::from_toml_str("tiny_range_threshold = -0.5"),
      Err(AnalysisError::OutOfRange { field: "tiny_range_threshold", .. })
    ));
  }

  #[test]
  fn test_anchor_offset_bounded_to_a_day() {
    let day = Timeframe::D1.as_millis();
    let with_anchor = |anchor_offset_ms| AnalysisConfig { anchor_offset_ms, ..AnalysisConfig::default() };

    assert!(with_anchor(day - 1).validate().is_ok());
    assert!(with_anchor(-(day - 1)).validate().is_ok());
    for bad in [day, -day, i64::MIN, i64::MAX] {
      assert!(
        matches!(
          with_anchor(bad).validate(),
          Err(AnalysisError::OutOfRange { field: "anchor_offset_ms", .. })
        ),
        "{bad}"
      );
    }
  }
}
