use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::types::types::{BridgeError, DownloadError, MegaError};

/// "Operation complete" handshake between SDK callbacks and the waiting
/// orchestrator.
///
/// Each [`arm`](Self::arm) installs a fresh single-use sender; the first
/// [`raise`](Self::raise) after that consumes it. Raising while nothing is
/// armed is a no-op, so late callbacks from a previous step are harmless.
#[derive(Default)]
pub struct CompletionSignal {
    slot: Mutex<Option<oneshot::Sender<()>>>,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the signal for a new step and return the receiving end.
    pub fn arm(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Returns `true` if this call released a waiting step.
    pub fn raise(&self) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn disarm(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Runs SDK calls one at a time and waits for each to be reported complete.
///
/// `perform` borrows the executor mutably, so two steps can never be in
/// flight on the same executor.
pub struct AsyncExecutor {
    signal: Arc<CompletionSignal>,
    step_timeout: Option<Duration>,
}

impl AsyncExecutor {
    pub fn new(step_timeout: Option<Duration>) -> Self {
        Self {
            signal: Arc::new(CompletionSignal::new()),
            step_timeout,
        }
    }

    /// Handle for the listener that will raise completion.
    pub fn signal(&self) -> Arc<CompletionSignal> {
        Arc::clone(&self.signal)
    }

    /// Start `operation` and wait until a callback raises the signal.
    ///
    /// A synchronous SDK error is returned without waiting.
    pub async fn perform<F>(&mut self, operation: F) -> Result<(), DownloadError>
    where
        F: FnOnce() -> Result<(), MegaError>,
    {
        let rx = self.signal.arm();
        if let Err(e) = operation() {
            self.signal.disarm();
            return Err(e.into());
        }

        match self.step_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(BridgeError::SignalClosed.into()),
                Err(_) => {
                    self.signal.disarm();
                    log::warn!("sdk step timed out after {:?}", limit);
                    Err(BridgeError::TimedOut(limit).into())
                }
            },
            None => rx.await.map_err(|_| DownloadError::from(BridgeError::SignalClosed)),
        }
    }

    /// Blocking variant of [`perform`](Self::perform) for callers outside an
    /// async runtime. Must not be called from within one. The step timeout
    /// is not applied here.
    pub fn perform_blocking<F>(&mut self, operation: F) -> Result<(), DownloadError>
    where
        F: FnOnce() -> Result<(), MegaError>,
    {
        let rx = self.signal.arm();
        if let Err(e) = operation() {
            self.signal.disarm();
            return Err(e.into());
        }
        rx.blocking_recv()
            .map_err(|_| DownloadError::from(BridgeError::SignalClosed))
    }
}
