//! Cooperative stop request shared between the signal adapter and the sampler loop.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Requests a stop. Cheap to clone; only sets a flag and posts a wake-up.
#[derive(Clone, Debug)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Sender<()>,
}

/// Observed by the sampler loop at the top of each iteration.
#[derive(Clone, Debug)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    wake: Receiver<()>,
}

pub fn channel() -> (StopHandle, StopToken) {
    let stopped = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded(1);
    (
        StopHandle {
            stopped: Arc::clone(&stopped),
            wake: tx,
        },
        StopToken { stopped, wake: rx },
    )
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Full means a wake-up is already pending
        let _ = self.wake.try_send(());
    }
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `timeout`, returning early once a stop is requested.
    /// Returns whether a stop has been requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            // Every handle is gone, nobody can wake us any more
            Err(RecvTimeoutError::Disconnected) => std::thread::sleep(timeout),
        }
        self.is_stopped()
    }
}

/// Installs the interrupt (and, on unix, terminate) listeners and forwards the
/// first one received to `handle`. Registration happens before returning so
/// no early signal falls through to the default handler.
pub fn listen(handle: StopHandle) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("Interrupt signal received, stopping..."),
                _ = sigterm.recv() => info!("Terminate signal received, stopping..."),
            }
            handle.stop();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt signal received, stopping...");
                    handle.stop();
                }
                Err(err) => tracing::error!("Failed to listen for Ctrl+C: {}", err),
            }
        }))
    }
}
