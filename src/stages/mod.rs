//! Pipeline stages
//!
//! Data flows strictly left to right, each stage producing an immutable
//! output for the next:
//!
//! - **validator**: raw bars to a clean, sorted base [`Series`](crate::Series) plus a rejection tally
//! - **resampler**: base series to fixed-width, calendar-aligned buckets
//! - **detector**: 2U / 2D breakouts over consecutive candle pairs
//! - **retracement**: how far price comes back through the breakout open
//! - **aggregate**: tier success rates and summary statistics per group

pub mod aggregate;
pub mod detector;
pub mod resampler;
pub mod retracement;
pub mod validator;
