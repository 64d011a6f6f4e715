//! Broadcast shutdown signal for pipeline workers.

use tokio::sync::watch;

/// Result of an operation that can be interrupted by a shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    /// The operation completed normally.
    Ok(T),
    /// A shutdown was requested, carrying whatever was collected before it.
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn should_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

/// Receiver side of the shutdown signal.
pub type ShutdownRx = watch::Receiver<()>;

/// Sender side of the shutdown signal.
///
/// Receivers obtained through [`ShutdownTx::subscribe`] see the signal exactly once, whenever
/// they subscribed.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    pub fn new(tx: watch::Sender<()>) -> Self {
        Self(tx)
    }

    /// Notifies every receiver that the pipeline should stop.
    ///
    /// Fails when no receiver is alive, which means nothing is left to stop.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a shutdown channel.
///
/// The returned receiver starts with the initial value marked as seen, like every receiver
/// created later through [`ShutdownTx::subscribe`].
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx::new(tx), rx)
}
