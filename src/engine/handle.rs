use std::sync::Arc;

use tokio::task::JoinHandle;

use super::run::{RunOutcome, RunReport, RunRequest, run_load_test};
use crate::error::{AppError, AppResult};
use crate::http::{ExecutorFactory, HttpExecutorFactory};
use crate::load::{ProgressReceiver, ProgressReporter};
use crate::shutdown::{ShutdownSender, request_shutdown, shutdown_channel};

/// A run executing in the background.
#[derive(Debug)]
pub struct RunHandle {
    shutdown_tx: ShutdownSender,
    progress_rx: ProgressReceiver,
    task: JoinHandle<AppResult<RunReport>>,
}

impl RunHandle {
    /// Stops lanes from issuing new requests; the run still finishes with
    /// a partial report.
    pub fn cancel(&self) {
        request_shutdown(&self.shutdown_tx);
    }

    #[must_use]
    pub fn progress(&self) -> ProgressReceiver {
        self.progress_rx.clone()
    }

    #[must_use]
    pub fn shutdown_sender(&self) -> ShutdownSender {
        self.shutdown_tx.clone()
    }

    /// # Errors
    ///
    /// Returns the run's configuration error, or a join error if the run
    /// task panicked.
    pub async fn join(self) -> AppResult<RunReport> {
        self.task.await.map_err(AppError::from)?
    }

    pub async fn outcome(self) -> RunOutcome {
        RunOutcome::from_result(self.join().await)
    }
}

/// Starts a run on the current tokio runtime using real HTTP lanes.
#[must_use]
pub fn spawn_run(request: RunRequest) -> RunHandle {
    let factory = Arc::new(HttpExecutorFactory::new(request.executor.clone()));
    spawn_run_with(request, factory)
}

/// Starts a run on the current tokio runtime with the given executors.
#[must_use]
pub fn spawn_run_with(request: RunRequest, executors: Arc<dyn ExecutorFactory>) -> RunHandle {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let (progress, progress_rx) = ProgressReporter::new();
    let task = tokio::spawn(async move {
        run_load_test(request, executors.as_ref(), shutdown_rx, progress).await
    });
    RunHandle {
        shutdown_tx,
        progress_rx,
        task,
    }
}
