//! Per-request measurements and their aggregation into run statistics.
mod aggregator;
mod collector;
mod histogram;
mod percentiles;
mod types;


pub use aggregator::{
    Aggregator, AggregatorSettings, DEFAULT_BUCKET_WIDTH, DEFAULT_MAX_SAMPLES,
    DEFAULT_REQUEST_LIST_CAP,
};
pub use collector::{SAMPLE_CHANNEL_CAPACITY, setup_metrics_collector};
pub use histogram::LatencyHistogram;
pub use types::{
    AggregateReport, CacheStatus, ColdWarmComparison, NETWORK_FAILURE_STATUS, PhaseTimings,
    RequestMeasurement, ResponseSize, RunStats, Sample, TIMEOUT_ERROR, TimeSeriesPoint,
    duration_ms, is_error_status,
};
