use tracing::{info, warn};

use crate::shutdown::{ShutdownSender, request_shutdown};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Turns Ctrl+C (and SIGTERM on unix) into a cancellation request. The task
/// exits on the first signal, or when the run finishes and the flag is
/// raised by someone else.
pub fn setup_signal_shutdown_handler(shutdown_tx: &ShutdownSender) -> tokio::task::JoinHandle<()> {
    let shutdown_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut shutdown_rx = shutdown_tx.subscribe();
        let already_stopping = async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = already_stopping => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, finishing in-flight requests");
                    request_shutdown(&shutdown_tx);
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    info!("SIGTERM received, finishing in-flight requests");
                    request_shutdown(&shutdown_tx);
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = already_stopping => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, finishing in-flight requests");
                    request_shutdown(&shutdown_tx);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::shutdown::shutdown_channel;
    use std::future::Future;
    use std::time::Duration;

    const SIGNAL_HANDLER_SETTLE: Duration = Duration::from_millis(10);
    const SHUTDOWN_HANDLER_TIMEOUT: Duration = Duration::from_secs(1);

    fn run_async_test<F>(future: F) -> AppResult<()>
    where
        F: Future<Output = AppResult<()>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
        runtime.block_on(future)
    }

    #[test]
    fn signal_handler_exits_when_run_already_stopping() -> AppResult<()> {
        run_async_test(async {
            let (shutdown_tx, _shutdown_rx) = shutdown_channel();
            let handle = setup_signal_shutdown_handler(&shutdown_tx);

            tokio::time::sleep(SIGNAL_HANDLER_SETTLE).await;
            request_shutdown(&shutdown_tx);

            tokio::time::timeout(SHUTDOWN_HANDLER_TIMEOUT, handle)
                .await
                .map_err(|err| {
                    AppError::validation(format!("Timed out waiting for shutdown handler: {}", err))
                })?
                .map_err(|err| {
                    AppError::validation(format!("Shutdown task join error: {}", err))
                })?;
            Ok(())
        })
    }
}
