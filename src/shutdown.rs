use tokio::sync::watch;

/// Cooperative cancellation flag shared by the scheduler, every lane and
/// the signal handlers. `true` means "stop issuing new requests".
pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

/// Raises the flag. Works whether or not any receiver is still alive.
pub fn request_shutdown(shutdown_tx: &ShutdownSender) {
    shutdown_tx.send_replace(true);
}

#[must_use]
pub fn is_shutdown(shutdown_rx: &ShutdownReceiver) -> bool {
    *shutdown_rx.borrow()
}
