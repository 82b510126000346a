//! Per-group aggregation of retracement results
//!
//! A pure function of its input: tier success rates, summary statistics of
//! absolute and percentage moves, and crossing delay counts.

use crate::{
    config::TierGrid,
    report::{CrossingDelay, GroupReport, Summary, TierStats},
    stages::retracement::RetracementResult,
    PatternType, Timeframe,
};

/// Aggregate one (timeframe, pattern type) group.
///
/// `pattern_count` is the number of detected events, including those that
/// never crossed and so have no entry in `results`.
pub fn aggregate(
    timeframe: Option<Timeframe>,
    pattern_type: PatternType,
    pattern_count: usize,
    results: &[RetracementResult],
    tiers: &TierGrid,
) -> GroupReport {
    GroupReport {
        pattern_type,
        pattern_count,
        result_count: results.len(),
        tiers: tier_table(timeframe, pattern_type, results, tiers),
        moves: summarize(results.iter().map(|r| r.absolute_move)),
        percents: summarize(results.iter().map(|r| r.percent_of_range)),
        crossing_delay: crossing_delay(pattern_count, results),
    }
}

/// One row per tier, ascending
pub fn tier_table(
    timeframe: Option<Timeframe>,
    pattern_type: PatternType,
    results: &[RetracementResult],
    tiers: &TierGrid,
) -> Vec<TierStats> {
    let total_count = results.len();
    tiers
        .iter()
        .map(|tier| {
            let count_at_or_above = results.iter().filter(|r| r.reaches(tier)).count();
            TierStats {
                timeframe,
                pattern_type,
                tier,
                count_at_or_above,
                total_count,
                success_rate: (total_count > 0)
                    .then(|| count_at_or_above as f64 / total_count as f64),
            }
        })
        .collect()
}

/// `None` for an empty sample. Median of an even count averages the middle pair.
pub fn summarize(values: impl IntoIterator<Item = f64>) -> Option<Summary> {
    let mut values: Vec<f64> = values.into_iter().collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let count = values.len();
    let mid = count / 2;
    let median = if count % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };

    Some(Summary {
        count,
        mean: values.iter().sum::<f64>() / count as f64,
        median,
        min: values[0],
        max: values[count - 1],
    })
}

/// Bucket results by `bars_to_cross` (always >= 1). Events in `pattern_count`
/// without a result land in `never`.
pub fn crossing_delay(pattern_count: usize, results: &[RetracementResult]) -> CrossingDelay {
    let never = pattern_count.saturating_sub(results.len());
    results.iter().fold(
        CrossingDelay {
            never,
            ..CrossingDelay::default()
        },
        |mut acc, r| {
            match r.bars_to_cross {
                1 => acc.next_bar += 1,
                2 => acc.second_bar += 1,
                3 => acc.third_bar += 1,
                _ => acc.later += 1,
            }
            acc
        },
    )
}
