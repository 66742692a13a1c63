//! Shutdown coordinator with statum state machine
//!
//! Waits for the interrupt signal, stops the input pipeline and closes the serial link.
//!
//! # State Machine
//!
//! ```text
//! Running ──(signal)──► Closing ──(link closed)──► Terminated (exit code 0)
//! ```
//!
//! An exchange still in flight is not waited for. Closing marks the link closed before it
//! takes the link lock, so the running drain gives up after its current read. The close
//! itself may wait for that read and runs on the blocking pool.

use crate::grbl::SerialLink;
use statum::{machine, state};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Failed to listen for interrupt signal: {0}")]
    SignalError(#[from] std::io::Error),
}

#[state]
#[derive(Debug, Clone)]
pub enum ShutdownState {
    Running,
    Closing,
    Terminated,
}

#[machine]
#[derive(Debug)]
pub struct ShutdownCoordinator<S: ShutdownState> {
    // Connection to close on the way out
    link: SerialLink,

    // Cancels the sampler so it stops polling the device
    token: CancellationToken,
}

impl ShutdownCoordinator<Running> {
    pub fn create(link: SerialLink, token: CancellationToken) -> Self {
        info!("Shutdown coordinator watching {}", link.name());
        Self::new(link, token)
    }

    /// Waits for `signal` and starts closing
    ///
    /// Production passes `tokio::signal::ctrl_c()`.
    pub async fn wait_for_signal<F>(
        self,
        signal: F,
    ) -> Result<ShutdownCoordinator<Closing>, ShutdownError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        signal.await?;
        info!("Interrupt received, shutting down");
        self.token.cancel();
        Ok(self.transition())
    }

    /// Full Running → Terminated sequence
    pub async fn run<F>(self, signal: F) -> Result<ShutdownCoordinator<Terminated>, ShutdownError>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let closing = self.wait_for_signal(signal).await?;
        Ok(closing.close_transport().await)
    }
}

impl ShutdownCoordinator<Closing> {
    pub async fn close_transport(self) -> ShutdownCoordinator<Terminated> {
        info!("Closing connection");
        let link = self.link.clone();
        match tokio::task::spawn_blocking(move || link.close()).await {
            Ok(true) => {}
            Ok(false) => warn!("Connection to {} was already closed", self.link.name()),
            Err(e) => error!("Close task for {} failed: {}", self.link.name(), e),
        }
        self.transition()
    }
}

impl ShutdownCoordinator<Terminated> {
    pub fn exit_code(&self) -> i32 {
        0
    }
}
