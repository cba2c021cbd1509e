use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info};

use crate::assertions::{AssertionContext, AssertionResult, AssertionRule, evaluate};
use crate::error::{AppError, AppResult};
use crate::http::{
    Environment, ExecutorFactory, ExecutorSettings, RequestFactory, RequestTemplate,
    ResponseCapture,
};
use crate::load::{DEFAULT_MAX_CONCURRENCY, LoadProfile, ProgressReporter, RunState, Scheduler};
use crate::metrics::{
    Aggregator, AggregatorSettings, ColdWarmComparison, DEFAULT_MAX_SAMPLES,
    DEFAULT_REQUEST_LIST_CAP, PhaseTimings, RequestMeasurement, RunStats,
    SAMPLE_CHANNEL_CAPACITY, TimeSeriesPoint, setup_metrics_collector,
};
use crate::shutdown::ShutdownReceiver;

/// Everything needed to start one load run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub template: RequestTemplate,
    pub environment: Environment,
    pub variables: BTreeMap<String, String>,
    pub strict_variables: bool,
    pub profile: LoadProfile,
    pub max_concurrency: usize,
    pub executor: ExecutorSettings,
    pub assertions: Vec<AssertionRule>,
    /// Percentile buffer cap for phased runs.
    pub max_samples: usize,
    pub request_list_cap: usize,
}

impl RunRequest {
    #[must_use]
    pub fn new(template: RequestTemplate, profile: LoadProfile) -> Self {
        Self {
            template,
            environment: Environment::default(),
            variables: BTreeMap::new(),
            strict_variables: false,
            profile,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            executor: ExecutorSettings::default(),
            assertions: Vec::new(),
            max_samples: DEFAULT_MAX_SAMPLES,
            request_list_cap: DEFAULT_REQUEST_LIST_CAP,
        }
    }

    fn sample_cap(&self) -> usize {
        self.profile.planned_requests().map_or(self.max_samples, |planned| {
            usize::try_from(planned).unwrap_or(self.max_samples)
        })
    }
}

/// Result of a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Not cancelled, at least one request, and every assertion passed.
    pub success: bool,
    pub cancelled: bool,
    pub state: RunState,
    pub stats: RunStats,
    pub time_series: Vec<TimeSeriesPoint>,
    pub bottleneck: PhaseTimings,
    pub first_response: Option<ResponseCapture>,
    pub requests: Vec<RequestMeasurement>,
    pub assertions: Vec<AssertionResult>,
    #[serde(rename = "assertions_passed")]
    pub assertions_passed: usize,
    #[serde(rename = "assertions_total")]
    pub assertions_total: usize,
    pub testing: ColdWarmComparison,
}

/// What a caller receives: a report, or a single top-level error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    Failed { error: String },
}

impl RunOutcome {
    #[must_use]
    pub fn from_result(result: AppResult<RunReport>) -> Self {
        match result {
            Ok(report) => RunOutcome::Completed(Box::new(report)),
            Err(err) => RunOutcome::Failed {
                error: err.to_string(),
            },
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Failed { .. } => None,
        }
    }
}

/// Runs one load test to completion or cancellation.
///
/// Configuration problems (unresolvable request, out-of-range profile,
/// executor construction) are reported before any request is sent. Once
/// running, per-request failures only show up in the statistics.
///
/// # Errors
///
/// Returns a configuration error for an invalid request or profile, an
/// HTTP error when a lane client cannot be built, or a join error if the
/// collector task panics.
pub async fn run_load_test(
    request: RunRequest,
    executors: &dyn ExecutorFactory,
    shutdown_rx: ShutdownReceiver,
    progress: ProgressReporter,
) -> AppResult<RunReport> {
    let requests = RequestFactory::new(
        request.template.clone(),
        request.environment.clone(),
        request.variables.clone(),
        request.strict_variables,
    )
    .inspect_err(|err| error!("Invalid request: {}", err))?;
    let scheduler = Scheduler::new(
        request.profile,
        request.max_concurrency,
        executors,
        Arc::new(requests),
    )?;

    let run_start = Instant::now();
    let mut settings = AggregatorSettings::new(run_start);
    settings.warm_exclusion = u64::try_from(scheduler.lane_count()).unwrap_or(u64::MAX);
    settings.sample_cap = request.sample_cap();
    settings.request_list_cap = request.request_list_cap;
    settings.phase_plan = scheduler.phase_plan().map(Arc::new);

    let (samples_tx, samples_rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
    let capture_wanted = Arc::new(AtomicBool::new(true));
    let collector = setup_metrics_collector(
        Aggregator::new(settings),
        samples_rx,
        Arc::clone(&capture_wanted),
    );

    info!("Load test against {} started", request.template.url);
    let outcome = scheduler
        .run(run_start, samples_tx, shutdown_rx, capture_wanted, progress)
        .await;
    let mut aggregator = collector.await.map_err(AppError::from)?;
    let aggregate = aggregator.finalize();

    let context =
        AssertionContext::from_response(aggregate.first_response.as_ref(), aggregate.stats.mean);
    let assertions = evaluate(&request.assertions, &context);
    let assertions_passed = assertions.iter().filter(|result| result.passed).count();
    let assertions_total = assertions.len();

    let success = !outcome.cancelled
        && aggregate.stats.requests > 0
        && assertions_passed == assertions_total;

    Ok(RunReport {
        success,
        cancelled: outcome.cancelled,
        state: if outcome.cancelled {
            RunState::Aborted
        } else {
            RunState::Completed
        },
        stats: aggregate.stats,
        time_series: aggregate.time_series,
        bottleneck: aggregate.bottleneck,
        first_response: aggregate.first_response,
        requests: aggregate.requests,
        assertions,
        assertions_passed,
        assertions_total,
        testing: aggregate.cold_warm,
    })
}
