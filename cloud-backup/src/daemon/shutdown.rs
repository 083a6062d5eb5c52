//! Shutdown handling for SIGTERM and SIGINT.
//!
//! A signal during a run is an abnormal stop: the run's cancellation token
//! fires, remaining workers stop and the run does not finalize.

use std::io;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Signal that ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Shutdown coordinator
pub struct ShutdownCoordinator {
    cancel: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Token that fires on shutdown
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for SIGINT or SIGTERM, then cancel the token
    pub async fn wait_for_signal(&self) -> io::Result<ShutdownSignal> {
        #[cfg(unix)]
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        #[cfg(unix)]
        let terminate = async move {
            terminate.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let received = tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                warn!("Received SIGINT (Ctrl+C), stopping the run");
                ShutdownSignal::Interrupt
            }
            _ = terminate => {
                warn!("Received SIGTERM, stopping the run");
                ShutdownSignal::Terminate
            }
        };

        self.trigger();
        Ok(received)
    }

    /// Cancel the run without a signal
    pub fn trigger(&self) {
        self.cancel.cancel();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
