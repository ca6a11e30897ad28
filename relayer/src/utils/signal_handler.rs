use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Why a relayer process is stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ShutdownSignal {
    #[strum(serialize = "SIGTERM")]
    Terminate,
    #[strum(serialize = "SIGINT")]
    Interrupt,
    #[strum(serialize = "SIGQUIT")]
    Quit,
    /// A worker or publisher loop stopped on its own.
    #[strum(serialize = "INTERNAL")]
    Internal,
}

/// Waits for an OS signal or an internal stop request and drives the graceful shutdown.
pub struct SignalHandler {
    received: Option<ShutdownSignal>,
    internal: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self { received: None, internal: Arc::new(Notify::new()) }
    }

    /// Handle a component can use to stop the whole process.
    pub fn shutdown_trigger(&self) -> Arc<Notify> {
        self.internal.clone()
    }

    pub async fn wait_for_shutdown(&mut self) -> Result<ShutdownSignal> {
        let signal = self.wait_for_signal().await?;
        self.received = Some(signal);
        info!(signal = %signal, "Shutdown requested");
        Ok(signal)
    }

    #[cfg(unix)]
    async fn wait_for_signal(&self) -> Result<ShutdownSignal> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigquit = signal(SignalKind::quit())?;

        Ok(tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = sigquit.recv() => {
                warn!("Force quit requested");
                ShutdownSignal::Quit
            }
            _ = self.internal.notified() => {
                warn!("A relayer component stopped, shutting the process down");
                ShutdownSignal::Internal
            }
        })
    }

    #[cfg(not(unix))]
    async fn wait_for_signal(&self) -> Result<ShutdownSignal> {
        Ok(tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                ShutdownSignal::Interrupt
            }
            _ = self.internal.notified() => ShutdownSignal::Internal,
        })
    }

    /// Run `shutdown_fn` with a deadline. A SIGQUIT that outlives the deadline exits the process.
    pub async fn handle_graceful_shutdown<F, Fut>(&self, shutdown_fn: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let signal = self.received.unwrap_or(ShutdownSignal::Interrupt);
        info!(signal = %signal, timeout_secs = timeout.as_secs(), "Starting graceful shutdown");

        match tokio::time::timeout(timeout, shutdown_fn()).await {
            Ok(Ok(())) => {
                info!("Graceful shutdown completed");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Graceful shutdown failed");
                Err(e)
            }
            Err(_) if signal == ShutdownSignal::Quit => {
                error!("Graceful shutdown timed out after SIGQUIT, exiting");
                std::process::exit(1);
            }
            Err(_) => {
                error!(timeout_secs = timeout.as_secs(), "Graceful shutdown timed out, in-flight jobs will be redelivered");
                Err(anyhow!("Shutdown timeout exceeded"))
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
