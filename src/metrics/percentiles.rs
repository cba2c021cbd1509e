//! Run-level order statistics over the retained `totalTime` buffer.
//!
//! Percentiles use the nearest-rank method: for `n` sorted values the
//! `p`-th percentile is the value at index `ceil(p / 100 * n) - 1`,
//! computed in integer arithmetic. The median is the conventional one
//! (mean of the two middle values when `n` is even), so `median` and `p50`
//! can differ by half a step on even-sized sets.

const PERCENT_DIVISOR: u64 = 100;
/// Turns the floor division into a ceiling.
const RANK_CEIL_OFFSET: u64 = PERCENT_DIVISOR - 1;

pub(crate) const PERCENTILE_P50: u64 = 50;
pub(crate) const PERCENTILE_P75: u64 = 75;
pub(crate) const PERCENTILE_P90: u64 = 90;
pub(crate) const PERCENTILE_P95: u64 = 95;
pub(crate) const PERCENTILE_P99: u64 = 99;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Percentiles {
    pub(crate) median: f64,
    pub(crate) p50: f64,
    pub(crate) p75: f64,
    pub(crate) p90: f64,
    pub(crate) p95: f64,
    pub(crate) p99: f64,
}

/// Sorts `values` in place and reads every percentile off it.
pub(crate) fn compute_percentiles(values: &mut [f64]) -> Percentiles {
    if values.is_empty() {
        return Percentiles::default();
    }
    values.sort_unstable_by(f64::total_cmp);

    Percentiles {
        median: median(values),
        p50: nearest_rank(values, PERCENTILE_P50),
        p75: nearest_rank(values, PERCENTILE_P75),
        p90: nearest_rank(values, PERCENTILE_P90),
        p95: nearest_rank(values, PERCENTILE_P95),
        p99: nearest_rank(values, PERCENTILE_P99),
    }
}

/// `sorted` must be ascending.
pub(crate) fn nearest_rank(sorted: &[f64], percentile: u64) -> f64 {
    let count = sorted.len() as u64;
    if count == 0 {
        return 0.0;
    }
    let rank = percentile
        .min(PERCENT_DIVISOR)
        .saturating_mul(count)
        .saturating_add(RANK_CEIL_OFFSET)
        .checked_div(PERCENT_DIVISOR)
        .unwrap_or(0);
    let index = rank.saturating_sub(1).min(count.saturating_sub(1));
    usize::try_from(index)
        .ok()
        .and_then(|idx| sorted.get(idx))
        .copied()
        .unwrap_or(0.0)
}

fn median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    let mid = len / 2;
    if len % 2 == 1 {
        return sorted.get(mid).copied().unwrap_or(0.0);
    }
    let upper = sorted.get(mid).copied().unwrap_or(0.0);
    let lower = sorted
        .get(mid.saturating_sub(1))
        .copied()
        .unwrap_or(upper);
    (lower + upper) / 2.0
}

/// Streaming mean and population standard deviation (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct RunningMoments {
    count: u64,
    mean: f64,
    sum_sq_diff: f64,
}

impl RunningMoments {
    pub(crate) fn push(&mut self, value: f64) {
        self.count = self.count.saturating_add(1);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_sq_diff += delta * (value - self.mean);
    }

    pub(crate) const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    pub(crate) fn stddev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_sq_diff / self.count as f64).max(0.0).sqrt()
    }
}
