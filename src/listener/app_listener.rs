use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::bridge::executor::CompletionSignal;
use crate::host::observer::TaskListener;
use crate::listener::state::DownloadState;
use crate::sdk::api::CloudApi;
use crate::sdk::events::{SdkEvent, SdkListener};
use crate::types::types::{AttemptPhase, MegaError, Request, RequestKind, TransferInfo};

/// Root node name the SDK reports for a full account login.
const ACCOUNT_ROOT_NAME: &str = "cloud drive";

pub const CANCELLED_BY_USER: &str = "Download Canceled by user";

/// Turns SDK callbacks for one download attempt into state updates, host
/// notifications and completion signals.
///
/// | Event                     | Effect                                          |
/// |---------------------------|-------------------------------------------------|
/// | request finished, error   | record error, raise                             |
/// | login finished            | issue fetch-nodes, keep waiting                 |
/// | fetch-nodes finished      | capture root; raise unless it is the account root |
/// | public node finished      | capture node, raise                             |
/// | request temporary error   | cancel + notify once, raise                     |
/// | transfer update           | record progress, or abort if cancelled          |
/// | transfer finished         | notify completion on expected target, raise     |
/// | transfer temporary error  | ignore if queued/retrying, else cancel + notify |
pub struct MegaAppListener {
    state: Arc<DownloadState>,
    signal: Arc<CompletionSignal>,
    task: Arc<dyn TaskListener>,
    runtime: Handle,
    pending: Mutex<Vec<JoinHandle<()>>>,
    last_transfer: Mutex<Option<TransferInfo>>,
}

impl MegaAppListener {
    pub fn new(
        state: Arc<DownloadState>,
        signal: Arc<CompletionSignal>,
        task: Arc<dyn TaskListener>,
        runtime: Handle,
    ) -> Self {
        Self {
            state,
            signal,
            task,
            runtime,
            pending: Mutex::new(Vec::new()),
            last_transfer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<DownloadState> {
        &self.state
    }

    /// Cancel on behalf of the user. The SDK transfer itself is aborted by
    /// the next progress callback that observes the flag.
    pub fn cancel_download(&self) {
        if self.state.mark_cancelled() {
            log::info!("cancelling download {}", self.state.gid());
            self.state.set_phase(AttemptPhase::Cancelled);
            self.forward_error(CANCELLED_BY_USER.to_string());
        }
    }

    /// Give up on a transfer the orchestrator stopped waiting for: tell the
    /// host (unless it already heard about a cancel or failure) and abort
    /// the last transfer the SDK reported.
    pub fn abandon_transfer(&self, api: &dyn CloudApi, reason: &str) {
        log::warn!("abandoning download {}: {}", self.state.gid(), reason);
        self.state.set_error(reason);
        self.state.set_phase(AttemptPhase::Failed);
        if self.state.mark_cancelled() {
            self.forward_error(reason.to_string());
        }
        let last = self
            .last_transfer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(transfer) = last {
            api.cancel_transfer(&transfer);
        }
    }

    /// Wait for every host notification spawned so far.
    pub async fn flush_notifications(&self) {
        let handles: Vec<_> = std::mem::take(
            &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                log::error!("host notification task failed: {}", e);
            }
        }
    }

    fn on_request_finish(&self, api: &dyn CloudApi, request: Request, error: MegaError) {
        if !error.is_ok() {
            log::error!("request {:?} failed: {}", request.kind, error);
            self.fail(error.to_string());
            return;
        }

        // The handle is done once an error is recorded; only release the
        // waiting step.
        if let Some(recorded) = self.state.error() {
            log::warn!(
                "ignoring {:?} finish after error: {}",
                request.kind,
                recorded
            );
            self.signal.raise();
            return;
        }

        match request.kind {
            RequestKind::Login => {
                if let Err(e) = api.fetch_nodes() {
                    log::error!("fetch nodes rejected: {}", e);
                    self.fail(e.to_string());
                    return;
                }
            }
            RequestKind::GetPublicNode => {
                self.state.set_public_node(request.public_node);
            }
            RequestKind::FetchNodes => {
                log::info!("Fetching root node.");
                let root = api.root_node();
                if let Some(node) = &root {
                    log::info!("Node name: {}", node.name);
                }
                self.state.set_node(root);
            }
            _ => {}
        }

        // Login and fetch-nodes form one step; it only ends early once a
        // concrete node other than the account root is known.
        let gating = matches!(request.kind, RequestKind::Login | RequestKind::FetchNodes);
        let usable_node = self
            .state
            .node()
            .is_some_and(|n| !n.name.to_lowercase().contains(ACCOUNT_ROOT_NAME));
        if !gating || usable_node {
            self.signal.raise();
        }
    }

    fn on_request_temporary_error(&self, request: Request, error: MegaError) {
        log::error!("request {:?} temporary error: {}", request.kind, error);
        if self.state.mark_cancelled() {
            self.forward_error(format!("RequestTempError: {}", error));
        }
        self.state.set_error(error.to_string());
        self.state.set_phase(AttemptPhase::Failed);
        self.signal.raise();
    }

    fn on_transfer_update(&self, api: &dyn CloudApi, transfer: TransferInfo) {
        self.remember(&transfer);
        if self.state.is_cancelled() {
            api.cancel_transfer(&transfer);
            self.signal.raise();
            return;
        }
        self.state
            .record_progress(transfer.speed, transfer.transferred_bytes);
    }

    fn on_transfer_finish(&self, transfer: TransferInfo, error: MegaError) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handle_transfer_finish(transfer, error)
        }));
        if outcome.is_err() {
            log::error!("panic while handling transfer finish");
        }
    }

    fn handle_transfer_finish(&self, transfer: TransferInfo, error: MegaError) {
        if self.state.is_cancelled() {
            self.state.set_phase(AttemptPhase::Cancelled);
            self.signal.raise();
            return;
        }

        if !error.is_ok() {
            log::error!("transfer of {} failed: {}", transfer.file_name, error);
            self.state.set_error(error.to_string());
            if self.state.mark_cancelled() {
                self.forward_error(format!(
                    "TransferError: {} ({})",
                    error, transfer.file_name
                ));
            }
            self.state.set_phase(AttemptPhase::Failed);
            self.signal.raise();
            return;
        }

        if transfer.finished
            && (transfer.folder_transfer || transfer.file_name == self.state.name())
        {
            self.state
                .record_progress(0, transfer.transferred_bytes);
            self.state.set_phase(AttemptPhase::Completed);
            let task = Arc::clone(&self.task);
            self.spawn_notification(async move { task.on_download_complete().await });
            self.signal.raise();
        }
    }

    fn on_transfer_temporary_error(&self, transfer: TransferInfo, error: MegaError) {
        log::error!(
            "transfer error in file {} (tag {}): {}",
            transfer.file_name,
            transfer.tag,
            error
        );
        // Sometimes the SDK cannot stream a node and reports a temporary
        // failure while the transfer is still queued or retrying.
        if transfer.state.is_transient() {
            self.remember(&transfer);
            return;
        }

        self.state.set_error(error.to_string());
        if self.state.mark_cancelled() {
            self.forward_error(format!(
                "TransferTempError: {} ({})",
                error, transfer.file_name
            ));
        }
        self.state.set_phase(AttemptPhase::Failed);
        self.signal.raise();
    }

    fn remember(&self, transfer: &TransferInfo) {
        *self
            .last_transfer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(transfer.clone());
    }

    fn fail(&self, error: String) {
        self.state.set_error(error);
        self.state.set_phase(AttemptPhase::Failed);
        self.signal.raise();
    }

    fn forward_error(&self, message: String) {
        let task = Arc::clone(&self.task);
        self.spawn_notification(async move { task.on_download_error(&message).await });
    }

    fn spawn_notification<F>(&self, notification: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(notification);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

impl SdkListener for MegaAppListener {
    fn on_event(&self, api: &dyn CloudApi, event: SdkEvent) {
        match event {
            SdkEvent::RequestFinish { request, error } => {
                self.on_request_finish(api, request, error)
            }
            SdkEvent::RequestTemporaryError { request, error } => {
                self.on_request_temporary_error(request, error)
            }
            SdkEvent::TransferUpdate(transfer) => self.on_transfer_update(api, transfer),
            SdkEvent::TransferFinish { transfer, error } => {
                self.on_transfer_finish(transfer, error)
            }
            SdkEvent::TransferTemporaryError { transfer, error } => {
                self.on_transfer_temporary_error(transfer, error)
            }
        }
    }
}
