use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::histogram::LatencyHistogram;
use super::percentiles::{RunningMoments, compute_percentiles};
use super::types::{
    AggregateReport, CacheStatus, ColdWarmComparison, PhaseTimings, RequestMeasurement, RunStats,
    Sample, TimeSeriesPoint,
};
use crate::http::ResponseCapture;
use crate::load::PhasePlan;

pub const DEFAULT_BUCKET_WIDTH: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_LIST_CAP: usize = 1000;
/// Percentile buffer cap for runs with no exact request count.
pub const DEFAULT_MAX_SAMPLES: usize = 1_000_000;

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub run_start: Instant,
    pub wall_start: DateTime<Utc>,
    /// Dispatch indices below this are the cold first wave.
    pub warm_exclusion: u64,
    pub sample_cap: usize,
    pub request_list_cap: usize,
    pub bucket_width: Duration,
    pub phase_plan: Option<Arc<PhasePlan>>,
}

impl AggregatorSettings {
    #[must_use]
    pub fn new(run_start: Instant) -> Self {
        Self {
            run_start,
            wall_start: Utc::now(),
            warm_exclusion: 1,
            sample_cap: DEFAULT_MAX_SAMPLES,
            request_list_cap: DEFAULT_REQUEST_LIST_CAP,
            bucket_width: DEFAULT_BUCKET_WIDTH,
            phase_plan: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    count: u64,
    success: u64,
    errors: u64,
    max_vus: u32,
    histogram: Option<LatencyHistogram>,
}

impl Bucket {
    fn new() -> Self {
        let histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                warn!("Failed to initialize bucket histogram: {}", err);
                None
            }
        };
        Self {
            count: 0,
            success: 0,
            errors: 0,
            max_vus: 0,
            histogram,
        }
    }
}

/// Folds the measurement stream of one run into statistics.
///
/// A single task owns the aggregator (see
/// [`setup_metrics_collector`](super::setup_metrics_collector)), so folds
/// are serialized without locking. Measurements may arrive in any index
/// order; bucket placement uses completion time only.
#[derive(Debug)]
pub struct Aggregator {
    settings: AggregatorSettings,
    requests: u64,
    success_count: u64,
    error_count: u64,
    timeout_count: u64,
    cache_hits: u64,
    cache_misses: u64,
    total_bytes: u64,
    ttfb_sum: f64,
    min: f64,
    max: f64,
    moments: RunningMoments,
    latencies: Vec<f64>,
    latencies_truncated: bool,
    status_codes: BTreeMap<u16, u64>,
    bottleneck: PhaseTimings,
    cold_start: Option<f64>,
    warm_sum: f64,
    warm_count: u64,
    buckets: BTreeMap<u64, Bucket>,
    last_completion: Option<Instant>,
    request_list: Vec<RequestMeasurement>,
    first_success: Option<ResponseCapture>,
    first_any: Option<ResponseCapture>,
    report: Option<AggregateReport>,
}

impl Aggregator {
    #[must_use]
    pub fn new(settings: AggregatorSettings) -> Self {
        let initial_capacity = settings.sample_cap.min(DEFAULT_REQUEST_LIST_CAP);
        Self {
            settings,
            requests: 0,
            success_count: 0,
            error_count: 0,
            timeout_count: 0,
            cache_hits: 0,
            cache_misses: 0,
            total_bytes: 0,
            ttfb_sum: 0.0,
            min: f64::INFINITY,
            max: 0.0,
            moments: RunningMoments::default(),
            latencies: Vec::with_capacity(initial_capacity),
            latencies_truncated: false,
            status_codes: BTreeMap::new(),
            bottleneck: PhaseTimings::default(),
            cold_start: None,
            warm_sum: 0.0,
            warm_count: 0,
            buckets: BTreeMap::new(),
            last_completion: None,
            request_list: Vec::new(),
            first_success: None,
            first_any: None,
            report: None,
        }
    }

    #[must_use]
    pub const fn requests(&self) -> u64 {
        self.requests
    }

    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.report.is_some()
    }

    /// Whether lanes should still capture response bodies.
    #[must_use]
    pub const fn wants_response(&self) -> bool {
        self.first_success.is_none() && self.report.is_none()
    }

    /// Adds one sample. Returns `false` (and drops the sample) once the
    /// aggregator has been finalized.
    pub fn fold(&mut self, sample: Sample) -> bool {
        if self.report.is_some() {
            debug!("Dropping sample {} after finalize", sample.measurement.index);
            return false;
        }
        let Sample {
            measurement,
            completed_at,
            active_vus,
            response,
        } = sample;
        let total_time = measurement.total_time;
        let is_error = measurement.is_error();

        self.requests = self.requests.saturating_add(1);
        if is_error {
            self.error_count = self.error_count.saturating_add(1);
        } else {
            self.success_count = self.success_count.saturating_add(1);
        }
        if measurement.is_timeout() {
            self.timeout_count = self.timeout_count.saturating_add(1);
        }
        match measurement.cache {
            CacheStatus::Hit => self.cache_hits = self.cache_hits.saturating_add(1),
            CacheStatus::Miss => self.cache_misses = self.cache_misses.saturating_add(1),
        }
        self.total_bytes = self
            .total_bytes
            .saturating_add(measurement.size.response_headers)
            .saturating_add(measurement.size.response_body);
        let status_count = self.status_codes.entry(measurement.status).or_insert(0);
        *status_count = status_count.saturating_add(1);

        self.ttfb_sum += measurement.ttfb;
        self.min = self.min.min(total_time);
        self.max = self.max.max(total_time);
        self.moments.push(total_time);
        self.bottleneck.accumulate(&measurement.timing);

        if self.latencies.len() < self.settings.sample_cap {
            self.latencies.push(total_time);
        } else if !self.latencies_truncated {
            self.latencies_truncated = true;
            warn!(
                "Percentile buffer full at {} samples; later requests only update counters",
                self.settings.sample_cap
            );
        }

        if self.cold_start.is_none() {
            self.cold_start = Some(total_time);
        }
        if measurement.index >= self.settings.warm_exclusion {
            self.warm_sum += total_time;
            self.warm_count = self.warm_count.saturating_add(1);
        }

        self.record_bucket(completed_at, total_time, is_error, active_vus);
        self.last_completion = Some(
            self.last_completion
                .map_or(completed_at, |last| last.max(completed_at)),
        );

        if let Some(response) = response {
            if !is_error && self.first_success.is_none() {
                self.first_success = Some(response);
            } else if self.first_any.is_none() {
                self.first_any = Some(response);
            }
        }

        if self.request_list.len() < self.settings.request_list_cap {
            self.request_list.push(measurement);
        }
        true
    }

    fn bucket_index(&self, at: Instant) -> u64 {
        let offset = at.saturating_duration_since(self.settings.run_start);
        let width_ms = self.settings.bucket_width.as_millis().max(1);
        u64::try_from(offset.as_millis().checked_div(width_ms).unwrap_or(0)).unwrap_or(u64::MAX)
    }

    fn record_bucket(&mut self, completed_at: Instant, total_time: f64, is_error: bool, vus: u32) {
        let index = self.bucket_index(completed_at);
        let bucket = self.buckets.entry(index).or_insert_with(Bucket::new);
        bucket.count = bucket.count.saturating_add(1);
        if is_error {
            bucket.errors = bucket.errors.saturating_add(1);
        } else {
            bucket.success = bucket.success.saturating_add(1);
        }
        bucket.max_vus = bucket.max_vus.max(vus);
        if let Some(histogram) = bucket.histogram.as_mut() {
            histogram.record_ms(total_time);
        }
    }

    /// Produces the final report. The first call freezes the aggregator;
    /// later calls return the same report.
    pub fn finalize(&mut self) -> AggregateReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        let report = AggregateReport {
            stats: self.build_stats(),
            time_series: self.build_time_series(),
            bottleneck: self.bottleneck,
            cold_warm: self.cold_warm(),
            requests: std::mem::take(&mut self.request_list),
            first_response: self.first_success.take().or_else(|| self.first_any.take()),
        };
        self.latencies = Vec::new();
        self.buckets.clear();
        self.report = Some(report.clone());
        report
    }

    fn elapsed(&self) -> Duration {
        self.last_completion.map_or(Duration::ZERO, |last| {
            last.saturating_duration_since(self.settings.run_start)
        })
    }

    fn build_stats(&mut self) -> RunStats {
        let requests = self.requests;
        let elapsed = self.elapsed();
        let elapsed_secs = elapsed.as_secs_f64();
        let percentiles = compute_percentiles(&mut self.latencies);
        let ratio = |count: u64| {
            if requests == 0 {
                0.0
            } else {
                count as f64 / requests as f64
            }
        };

        RunStats {
            requests,
            success_count: self.success_count,
            error_count: self.error_count,
            timeout_count: self.timeout_count,
            error_rate: ratio(self.error_count) * 100.0,
            rps: if elapsed_secs > 0.0 {
                requests as f64 / elapsed_secs
            } else {
                0.0
            },
            elapsed_ms: elapsed_secs * 1000.0,
            mean: self.moments.mean(),
            median: percentiles.median,
            min: if requests == 0 { 0.0 } else { self.min },
            max: self.max,
            stddev: self.moments.stddev(),
            p50: percentiles.p50,
            p75: percentiles.p75,
            p90: percentiles.p90,
            p95: percentiles.p95,
            p99: percentiles.p99,
            mean_ttfb: if requests == 0 {
                0.0
            } else {
                self.ttfb_sum / requests as f64
            },
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            cache_hit_rate: ratio(self.cache_hits),
            total_bytes: self.total_bytes,
            status_codes: self.status_codes.clone(),
            percentile_samples: self.latencies.len() as u64,
        }
    }

    fn build_time_series(&self) -> Vec<TimeSeriesPoint> {
        let Some(last_index) = self.buckets.keys().next_back().copied() else {
            return Vec::new();
        };
        let width = self.settings.bucket_width;
        let width_secs = width.as_secs_f64();
        let width_ms = u64::try_from(width.as_millis()).unwrap_or(u64::MAX);
        let plan = self.settings.phase_plan.as_deref();

        let mut points = Vec::with_capacity(usize::try_from(last_index).unwrap_or(0).saturating_add(1));
        let mut carried_vus = 0_u32;
        for index in 0..=last_index {
            let offset_ms = index.saturating_mul(width_ms);
            let offset = Duration::from_millis(offset_ms);
            let phase = plan.and_then(|plan| plan.phase_at(offset));
            let timestamp = i64::try_from(offset_ms)
                .ok()
                .and_then(TimeDelta::try_milliseconds)
                .and_then(|delta| self.settings.wall_start.checked_add_signed(delta))
                .unwrap_or(self.settings.wall_start);

            let point = match self.buckets.get(&index) {
                Some(bucket) => {
                    carried_vus = bucket.max_vus;
                    let quantile = |q: f64| {
                        bucket
                            .histogram
                            .as_ref()
                            .and_then(|histogram| histogram.value_at_ms(q))
                    };
                    TimeSeriesPoint {
                        time: offset_ms / 1000,
                        timestamp,
                        active_vus: bucket.max_vus,
                        rps: if width_secs > 0.0 {
                            bucket.count as f64 / width_secs
                        } else {
                            0.0
                        },
                        response_time_p50: quantile(0.5),
                        response_time_p95: quantile(0.95),
                        response_time_p99: quantile(0.99),
                        success_count: bucket.success,
                        error_count: bucket.errors,
                        phase,
                    }
                }
                None => {
                    let active_vus = plan.map_or(carried_vus, |plan| plan.vus_at(offset));
                    TimeSeriesPoint {
                        time: offset_ms / 1000,
                        timestamp,
                        active_vus,
                        rps: 0.0,
                        response_time_p50: None,
                        response_time_p95: None,
                        response_time_p99: None,
                        success_count: 0,
                        error_count: 0,
                        phase,
                    }
                }
            };
            points.push(point);
        }
        points
    }

    fn cold_warm(&self) -> ColdWarmComparison {
        let cold_start = self.cold_start.unwrap_or(0.0);
        let warm_avg = if self.warm_count == 0 {
            0.0
        } else {
            self.warm_sum / self.warm_count as f64
        };
        let cold_warm_ratio = if warm_avg > 0.0 {
            cold_start / warm_avg
        } else {
            0.0
        };
        ColdWarmComparison {
            cold_start,
            warm_avg,
            cold_warm_ratio,
        }
    }
}
