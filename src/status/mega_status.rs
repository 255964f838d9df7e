use std::sync::Arc;

use crate::host::observer::TaskListener;
use crate::listener::app_listener::MegaAppListener;
use crate::status::snapshot::{eta_secs, progress_percent, StatusSnapshot};
use crate::types::types::AttemptPhase;

/// A status dashboard entry.
pub trait DownloadStatus: Send + Sync {
    fn uid(&self) -> u64;
    fn gid(&self) -> String;
    fn name(&self) -> String;
    fn size(&self) -> u64;
    fn processed_bytes(&self) -> u64;
    fn speed(&self) -> u64;
    fn phase(&self) -> AttemptPhase;

    /// Request cancellation of the underlying download.
    fn cancel(&self);

    fn progress(&self) -> f64 {
        progress_percent(self.processed_bytes(), self.size())
    }

    fn eta_secs(&self) -> f64 {
        eta_secs(self.processed_bytes(), self.size(), self.speed())
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            uid: self.uid(),
            gid: self.gid(),
            name: self.name(),
            size: self.size(),
            downloaded_bytes: self.processed_bytes(),
            speed: self.speed(),
            progress: self.progress(),
            eta_secs: self.eta_secs(),
            phase: self.phase(),
        }
    }
}

/// Dashboard entry backed by the live state of a [`MegaAppListener`].
pub struct MegaDownloadStatus {
    listener: Arc<MegaAppListener>,
    task: Arc<dyn TaskListener>,
}

impl MegaDownloadStatus {
    pub fn new(listener: Arc<MegaAppListener>, task: Arc<dyn TaskListener>) -> Self {
        Self { listener, task }
    }
}

impl DownloadStatus for MegaDownloadStatus {
    fn uid(&self) -> u64 {
        self.task.uid()
    }

    fn gid(&self) -> String {
        self.listener.state().gid().to_string()
    }

    fn name(&self) -> String {
        self.listener.state().name().to_string()
    }

    fn size(&self) -> u64 {
        self.listener.state().size()
    }

    fn processed_bytes(&self) -> u64 {
        self.listener.state().downloaded_bytes()
    }

    fn speed(&self) -> u64 {
        self.listener.state().speed()
    }

    fn phase(&self) -> AttemptPhase {
        self.listener.state().phase()
    }

    fn cancel(&self) {
        self.listener.cancel_download();
    }
}
