//! Fixed-width resampling
//!
//! Buckets are aligned to an absolute anchor (00:00 UTC by default), so two
//! series covering overlapping dates always share bucket boundaries no matter
//! where each one starts. Empty buckets produce no candle.

use crate::{Candle, Series, Timeframe};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resampler {
    anchor_ms: i64,
}

impl Resampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Align buckets to `anchor_ms` instead of the epoch
    pub fn with_anchor(anchor_ms: i64) -> Self {
        Self { anchor_ms }
    }

    #[inline]
    pub fn bucket_start(&self, timestamp: i64, timeframe: Timeframe) -> i64 {
        timeframe.bucket_start(timestamp, self.anchor_ms)
    }

    /// Aggregate `series` into `timeframe` buckets.
    ///
    /// Open comes from the first candle in a bucket, close from the last,
    /// high/low are the extremes; the output timestamp is the bucket start.
    pub fn resample(&self, series: &Series, timeframe: Timeframe) -> Series {
        let mut out: Vec<Candle> = Vec::new();

        // input is ascending and bucket_start is monotonic, so buckets are contiguous
        for candle in series {
            let start = self.bucket_start(candle.timestamp, timeframe);
            match out.last_mut() {
                Some(bucket) if bucket.timestamp == start => {
                    bucket.high = bucket.high.max(candle.high);
                    bucket.low = bucket.low.min(candle.low);
                    bucket.close = candle.close;
                }
                _ => out.push(Candle {
                    timestamp: start,
                    ..*candle
                }),
            }
        }

        Series::from_sorted(Some(timeframe), out)
    }
}
