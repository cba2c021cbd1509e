//! In-process executors for scheduler, chain and engine tests.
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};
use crate::http::{Execution, ExecutorFactory, RequestExecutor, RequestSpec, ResponseCapture};
use crate::metrics::{CacheStatus, PhaseTimings, RequestMeasurement, ResponseSize, duration_ms};

/// Status and body for one request; status `0` simulates a network failure.
pub(crate) type Responder = dyn Fn(&RequestSpec) -> (u16, String) + Send + Sync;

/// Answers every request from a closure after a fixed delay and records
/// what it was asked to send.
pub(crate) struct ScriptedExecutor {
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicU64,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    urls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub(crate) fn new<F>(delay: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&RequestSpec) -> (u16, String) + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            delay,
            calls: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok(delay: Duration) -> Arc<Self> {
        Self::new(delay, |_| (200, "{\"ok\":true}".to_owned()))
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, index: u64, spec: &RequestSpec, capture: bool) -> Execution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(spec.url.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (status, body) = (self.responder)(spec);
        if status == 0 {
            return Execution {
                measurement: RequestMeasurement::failed(
                    index,
                    Duration::ZERO,
                    self.delay,
                    "connection refused".to_owned(),
                ),
                response: None,
            };
        }
        let total = duration_ms(self.delay);
        let measurement = RequestMeasurement {
            index,
            status,
            timing: PhaseTimings {
                wait: total,
                ..PhaseTimings::default()
            },
            total_time: total,
            ttfb: total,
            size: ResponseSize {
                response_headers: 0,
                response_body: body.len() as u64,
            },
            cache: CacheStatus::Miss,
            error: None,
        };
        let response = capture.then(|| ResponseCapture {
            status,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
            body,
        });
        Execution {
            measurement,
            response,
        }
    }
}

/// Shares one [`ScriptedExecutor`] across every lane.
pub(crate) struct ScriptedFactory {
    pub(crate) executor: Arc<ScriptedExecutor>,
    pub(crate) lanes_built: AtomicU64,
}

impl ScriptedFactory {
    pub(crate) fn new(executor: Arc<ScriptedExecutor>) -> Arc<Self> {
        Arc::new(Self {
            executor,
            lanes_built: AtomicU64::new(0),
        })
    }
}

impl ExecutorFactory for ScriptedFactory {
    fn lane_executor(&self, _lane: usize) -> AppResult<Arc<dyn RequestExecutor>> {
        self.lanes_built.fetch_add(1, Ordering::SeqCst);
        let executor: Arc<dyn RequestExecutor> = self.executor.clone();
        Ok(executor)
    }
}

pub(crate) fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: std::future::Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}
