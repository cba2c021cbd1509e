use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{Barrier, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::plan::PhasePlan;
use super::profile::{LoadProfile, PhaseKind};
use super::progress::{ProgressReporter, RunProgress, RunState, estimate_phased_total};
use crate::error::AppResult;
use crate::http::{ExecutorFactory, RequestExecutor, RequestFactory};
use crate::metrics::{RequestMeasurement, Sample};
use crate::shutdown::{ShutdownReceiver, is_shutdown};

/// How often the phased controller re-evaluates the lane count.
const CONTROL_TICK: Duration = Duration::from_millis(50);
/// How often flat runs publish progress.
const PROGRESS_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct RunCounters {
    dispatched: AtomicU64,
    completed: AtomicU64,
    active: AtomicU32,
}

impl RunCounters {
    fn snapshot(&self, state: RunState, total_estimate: u64, elapsed: Duration) -> RunProgress {
        RunProgress {
            state,
            completed_count: self.completed.load(Ordering::Relaxed),
            total_estimate,
            active_vus: self.active.load(Ordering::Relaxed),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// What a lane needs to issue requests and report them.
#[derive(Clone)]
struct Lane {
    id: usize,
    executor: Arc<dyn RequestExecutor>,
    requests: Arc<RequestFactory>,
    samples_tx: mpsc::Sender<Sample>,
    shutdown_rx: ShutdownReceiver,
    counters: Arc<RunCounters>,
    capture_wanted: Arc<AtomicBool>,
}

impl Lane {
    /// Issues one request and hands the measurement to the collector.
    /// Returns `false` when the collector is gone.
    async fn run_one(&self) -> bool {
        let index = self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        let capture = self.capture_wanted.load(Ordering::Relaxed);
        let (measurement, response) = match self.requests.spec_for(index, self.id) {
            Ok(spec) => {
                let execution = self.executor.execute(index, &spec, capture).await;
                (execution.measurement, execution.response)
            }
            Err(err) => (
                RequestMeasurement::failed(
                    index,
                    Duration::ZERO,
                    Duration::ZERO,
                    format!("resolve failed: {}", err),
                ),
                None,
            ),
        };
        let sample = Sample {
            measurement,
            completed_at: Instant::now(),
            active_vus: self.counters.active.load(Ordering::Relaxed),
            response,
        };
        if self.samples_tx.send(sample).await.is_err() {
            return false;
        }
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn stopping(&self) -> bool {
        is_shutdown(&self.shutdown_rx)
    }
}

struct PhasedLane {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub cancelled: bool,
    pub elapsed: Duration,
    pub dispatched: u64,
    pub completed: u64,
}

/// Drives virtual-user lanes according to a [`LoadProfile`].
pub struct Scheduler {
    profile: LoadProfile,
    max_concurrency: usize,
    executors: Vec<Arc<dyn RequestExecutor>>,
    requests: Arc<RequestFactory>,
}

impl Scheduler {
    /// Validates the profile and builds one executor per lane the profile
    /// can reach, so nothing is sent if any of them fails.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the profile is out of bounds, or
    /// the factory's error when a lane executor cannot be built.
    pub fn new(
        profile: LoadProfile,
        max_concurrency: usize,
        factory: &dyn ExecutorFactory,
        requests: Arc<RequestFactory>,
    ) -> AppResult<Self> {
        profile.validate(max_concurrency)?;
        let lanes = profile.peak_lanes().min(max_concurrency);
        let executors = (0..lanes)
            .map(|lane| factory.lane_executor(lane))
            .collect::<AppResult<Vec<_>>>()?;
        debug!("Prepared {} lane executors", executors.len());
        Ok(Self {
            profile,
            max_concurrency,
            executors,
            requests,
        })
    }

    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn phase_plan(&self) -> Option<PhasePlan> {
        match &self.profile {
            LoadProfile::Phased(phased) => Some(PhasePlan::new(phased)),
            LoadProfile::Flat { .. } => None,
        }
    }

    /// Runs the profile to completion or cancellation. `run_start` is the
    /// zero point of the phase timeline. `samples_tx` is dropped once the
    /// last lane finishes so the collector can drain.
    pub async fn run(
        self,
        run_start: Instant,
        samples_tx: mpsc::Sender<Sample>,
        shutdown_rx: ShutdownReceiver,
        capture_wanted: Arc<AtomicBool>,
        progress: ProgressReporter,
    ) -> ScheduleOutcome {
        let executors = self.executors;
        let counters = Arc::new(RunCounters::default());
        let lanes: Vec<Lane> = executors
            .into_iter()
            .enumerate()
            .map(|(id, executor)| Lane {
                id,
                executor,
                requests: Arc::clone(&self.requests),
                samples_tx: samples_tx.clone(),
                shutdown_rx: shutdown_rx.clone(),
                counters: Arc::clone(&counters),
                capture_wanted: Arc::clone(&capture_wanted),
            })
            .collect();
        drop(samples_tx);

        let started = run_start;
        let cancelled = match self.profile {
            LoadProfile::Flat {
                concurrency,
                iterations,
            } => {
                info!(
                    "Starting flat run: {} VUs x {} iterations",
                    concurrency, iterations
                );
                run_flat(lanes, iterations, &counters, &progress, &shutdown_rx, started).await
            }
            LoadProfile::Phased(phased) => {
                let plan = PhasePlan::new(&phased);
                info!(
                    "Starting phased run: {:?} planned, peak {} VUs",
                    plan.total_duration(),
                    plan.peak_vus()
                );
                run_phased(
                    lanes,
                    &plan,
                    self.max_concurrency,
                    &counters,
                    &progress,
                    &shutdown_rx,
                    started,
                )
                .await
            }
        };

        let elapsed = started.elapsed();
        let completed = counters.completed.load(Ordering::Relaxed);
        let final_state = if cancelled {
            RunState::Aborted
        } else {
            RunState::Completed
        };
        progress.publish(counters.snapshot(final_state, completed, elapsed));
        info!(
            "Run {} after {:?} with {} requests",
            final_state.as_str(),
            elapsed,
            completed
        );

        ScheduleOutcome {
            cancelled,
            elapsed,
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            completed,
        }
    }
}

/// Every lane waits on a shared barrier, then issues `iterations`
/// back-to-back requests. Returns whether the run was cancelled.
async fn run_flat(
    lanes: Vec<Lane>,
    iterations: u64,
    counters: &Arc<RunCounters>,
    progress: &ProgressReporter,
    shutdown_rx: &ShutdownReceiver,
    started: Instant,
) -> bool {
    let total = u64::try_from(lanes.len())
        .unwrap_or(u64::MAX)
        .saturating_mul(iterations);
    let barrier = Arc::new(Barrier::new(lanes.len()));
    let handles: Vec<JoinHandle<()>> = lanes
        .into_iter()
        .map(|lane| {
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                lane.counters.active.fetch_add(1, Ordering::Relaxed);
                for _ in 0..iterations {
                    if lane.stopping() || !lane.run_one().await {
                        break;
                    }
                }
                lane.counters.active.fetch_sub(1, Ordering::Relaxed);
                debug!("Lane {} finished", lane.id);
            })
        })
        .collect();

    progress.publish(counters.snapshot(RunState::Running, total, started.elapsed()));
    let mut ticker = interval(PROGRESS_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let all_lanes = join_all(handles);
    tokio::pin!(all_lanes);
    loop {
        tokio::select! {
            results = &mut all_lanes => {
                log_lane_failures(results);
                break;
            }
            _ = ticker.tick() => {
                progress.publish(counters.snapshot(RunState::Running, total, started.elapsed()));
            }
        }
    }

    is_shutdown(shutdown_rx) && counters.completed.load(Ordering::Relaxed) < total
}

/// Re-evaluates the target lane count every tick, starting new lanes or
/// stopping the most recently started ones. Stopped lanes finish their
/// in-flight request and only become idle once their task has ended, so
/// a lane never runs two tasks at once. Returns whether the run was
/// cancelled.
async fn run_phased(
    lanes: Vec<Lane>,
    plan: &PhasePlan,
    max_concurrency: usize,
    counters: &Arc<RunCounters>,
    progress: &ProgressReporter,
    shutdown_rx: &ShutdownReceiver,
    started: Instant,
) -> bool {
    let planned_ms = u64::try_from(plan.total_duration().as_millis()).unwrap_or(u64::MAX);
    let mut idle: Vec<Lane> = lanes.into_iter().rev().collect();
    let mut active: Vec<(Lane, PhasedLane)> = Vec::new();
    let mut draining: Vec<(Lane, JoinHandle<()>)> = Vec::new();
    let mut current_phase: Option<PhaseKind> = None;
    let mut cancelled = false;

    let mut ticker = interval(CONTROL_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let elapsed = started.elapsed();
        if is_shutdown(shutdown_rx) {
            cancelled = true;
            break;
        }
        if elapsed >= plan.total_duration() {
            break;
        }

        let phase = plan.phase_at(elapsed);
        if phase != current_phase {
            if let Some(kind) = phase {
                info!("Entering phase {} at {:?}", kind.as_str(), elapsed);
            }
            current_phase = phase;
        }

        let (finished, still_draining): (Vec<_>, Vec<_>) = draining
            .into_iter()
            .partition(|(_, handle)| handle.is_finished());
        draining = still_draining;
        for (lane, handle) in finished {
            if let Err(err) = handle.await {
                warn!("Lane {} task failed: {}", lane.id, err);
            }
            idle.push(lane);
        }

        let target = usize::try_from(plan.vus_at(elapsed))
            .unwrap_or(usize::MAX)
            .min(max_concurrency);
        while active.len() < target {
            let Some(lane) = idle.pop() else {
                debug!(
                    "Target {} waits on {} draining lane(s)",
                    target,
                    draining.len()
                );
                break;
            };
            let stop = Arc::new(AtomicBool::new(false));
            let handle = spawn_phased_lane(lane.clone(), Arc::clone(&stop));
            active.push((lane, PhasedLane { stop, handle }));
        }
        while active.len() > target {
            let Some((lane, running)) = active.pop() else {
                break;
            };
            running.stop.store(true, Ordering::Relaxed);
            draining.push((lane, running.handle));
        }

        let state = phase.map_or(RunState::Running, RunState::from_phase);
        let completed = counters.completed.load(Ordering::Relaxed);
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let estimate = estimate_phased_total(completed, elapsed_ms, planned_ms);
        progress.publish(counters.snapshot(state, estimate, elapsed));
    }

    for (_, running) in &active {
        running.stop.store(true, Ordering::Relaxed);
    }
    drop(idle);
    let handles = draining
        .into_iter()
        .map(|(_, handle)| handle)
        .chain(active.into_iter().map(|(_, running)| running.handle));
    log_lane_failures(join_all(handles).await);
    cancelled
}

fn spawn_phased_lane(lane: Lane, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        lane.counters.active.fetch_add(1, Ordering::Relaxed);
        debug!("Lane {} started", lane.id);
        while !stop.load(Ordering::Relaxed) && !lane.stopping() {
            if !lane.run_one().await {
                break;
            }
        }
        lane.counters.active.fetch_sub(1, Ordering::Relaxed);
        debug!("Lane {} stopped", lane.id);
    })
}

fn log_lane_failures(results: Vec<Result<(), tokio::task::JoinError>>) {
    for result in results {
        if let Err(err) = result {
            warn!("Lane task failed: {}", err);
        }
    }
}
