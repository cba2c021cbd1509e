use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::http::ResponseCapture;
use crate::load::PhaseKind;

/// Status recorded when no HTTP response was received.
pub const NETWORK_FAILURE_STATUS: u16 = 0;
/// Error text recorded when the per-request timeout fired.
pub const TIMEOUT_ERROR: &str = "timeout";

/// The single success/error rule used everywhere in a run.
#[must_use]
pub const fn is_error_status(status: u16) -> bool {
    status == NETWORK_FAILURE_STATUS || status >= 400
}

#[must_use]
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Time spent in each phase of a request, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub dns: f64,
    pub tcp: f64,
    pub tls: f64,
    pub wait: f64,
    pub download: f64,
}

impl PhaseTimings {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.dns + self.tcp + self.tls + self.wait + self.download
    }

    pub(crate) fn accumulate(&mut self, other: &PhaseTimings) {
        self.dns += other.dns;
        self.tcp += other.tcp;
        self.tls += other.tls;
        self.wait += other.wait;
        self.download += other.download;
    }

    /// Name of the phase holding the largest share.
    #[must_use]
    pub fn dominant(&self) -> Option<&'static str> {
        let phases = [
            ("dns", self.dns),
            ("tcp", self.tcp),
            ("tls", self.tls),
            ("wait", self.wait),
            ("download", self.download),
        ];
        phases
            .into_iter()
            .filter(|(_, value)| *value > 0.0)
            .max_by(|left, right| left.1.total_cmp(&right.1))
            .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSize {
    pub response_headers: u64,
    pub response_body: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    #[default]
    Miss,
}

/// One executed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeasurement {
    pub index: u64,
    pub status: u16,
    pub timing: PhaseTimings,
    pub total_time: f64,
    pub ttfb: f64,
    pub size: ResponseSize,
    pub cache: CacheStatus,
    pub error: Option<String>,
}

impl RequestMeasurement {
    /// A request that never produced a response. All elapsed time is
    /// attributed to `wait` after any recorded DNS time.
    #[must_use]
    pub fn failed(index: u64, dns: Duration, elapsed: Duration, error: String) -> Self {
        let dns = dns.min(elapsed);
        let timing = PhaseTimings {
            dns: duration_ms(dns),
            wait: duration_ms(elapsed.saturating_sub(dns)),
            ..PhaseTimings::default()
        };
        Self {
            index,
            status: NETWORK_FAILURE_STATUS,
            timing,
            total_time: duration_ms(elapsed),
            ttfb: duration_ms(elapsed),
            size: ResponseSize::default(),
            cache: CacheStatus::Miss,
            error: Some(error),
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        is_error_status(self.status)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}

/// A measurement on its way from a lane to the aggregator.
#[derive(Debug, Clone)]
pub struct Sample {
    pub measurement: RequestMeasurement,
    pub completed_at: Instant,
    pub active_vus: u32,
    pub response: Option<ResponseCapture>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub requests: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub timeout_count: u64,
    /// Percent, 0 to 100.
    pub error_rate: f64,
    pub rps: f64,
    pub elapsed_ms: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean_ttfb: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Fraction, 0 to 1.
    pub cache_hit_rate: f64,
    pub total_bytes: u64,
    pub status_codes: BTreeMap<u16, u64>,
    /// Number of totalTime values the percentiles were computed over.
    pub percentile_samples: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    /// Offset from run start, in seconds.
    pub time: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "activeVUs")]
    pub active_vus: u32,
    pub rps: f64,
    pub response_time_p50: Option<f64>,
    pub response_time_p95: Option<f64>,
    pub response_time_p99: Option<f64>,
    pub success_count: u64,
    pub error_count: u64,
    pub phase: Option<PhaseKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColdWarmComparison {
    pub cold_start: f64,
    pub warm_avg: f64,
    pub cold_warm_ratio: f64,
}

/// Everything the aggregator produces when a run ends.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    pub stats: RunStats,
    pub time_series: Vec<TimeSeriesPoint>,
    pub bottleneck: PhaseTimings,
    pub cold_warm: ColdWarmComparison,
    pub requests: Vec<RequestMeasurement>,
    pub first_response: Option<ResponseCapture>,
}
