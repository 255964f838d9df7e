use std::path::Path;
use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::runtime::Handle;

use crate::bridge::executor::AsyncExecutor;
use crate::config::{MegaConfig, FOLDER_USER_AGENT, MAIN_USER_AGENT};
use crate::host::observer::{Messenger, TaskListener};
use crate::listener::app_listener::MegaAppListener;
use crate::listener::state::DownloadState;
use crate::sdk::api::{ApiFactory, CloudApi, ListenerRegistration};
use crate::sdk::events::SdkListener;
use crate::status::mega_status::MegaDownloadStatus;
use crate::status::registry::StatusRegistry;
use crate::types::types::{AttemptPhase, DownloadError, LinkKind, Node};

/// Length of the tracking id shown on the status dashboard.
const GID_LEN: usize = 8;

/// One download request as handed over by the host.
pub struct DownloadRequest<'a> {
    pub link: &'a str,
    pub kind: LinkKind,
    pub path: &'a Path,
    /// Overrides the node name when set and non-empty.
    pub name: Option<&'a str>,
}

/// Per-attempt pieces shared by the steps of `add_download`.
struct Attempt {
    state: Arc<DownloadState>,
    listener: Arc<MegaAppListener>,
    task: Arc<dyn TaskListener>,
}

impl Attempt {
    fn sdk_listener(&self) -> Arc<dyn SdkListener> {
        Arc::clone(&self.listener) as Arc<dyn SdkListener>
    }
}

/// Drives one cloud download from link to finished transfer.
pub struct MegaDownloader {
    config: MegaConfig,
    api_factory: Arc<dyn ApiFactory>,
    messenger: Arc<dyn Messenger>,
    registry: StatusRegistry,
}

impl MegaDownloader {
    pub fn new(
        config: MegaConfig,
        api_factory: Arc<dyn ApiFactory>,
        messenger: Arc<dyn Messenger>,
        registry: StatusRegistry,
    ) -> Self {
        Self {
            config,
            api_factory,
            messenger,
            registry,
        }
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    /// Run the full lifecycle (login → resolve → transfer) for one link.
    ///
    /// Returns the phase the attempt ended in. Failures before the transfer
    /// (including a rejected or timed out login/lookup) are reported to the
    /// chat before the error is returned; transfer failures, timeouts and
    /// cancellation reach the host through `TaskListener::on_download_error`. Every host notification has been
    /// delivered by the time this returns.
    pub async fn add_download(
        &self,
        request: DownloadRequest<'_>,
        task: Arc<dyn TaskListener>,
    ) -> Result<AttemptPhase, DownloadError> {
        let mut executor = AsyncExecutor::new(self.config.step_timeout());
        let state = Arc::new(DownloadState::new());
        let listener = Arc::new(MegaAppListener::new(
            Arc::clone(&state),
            executor.signal(),
            Arc::clone(&task),
            Handle::current(),
        ));
        let attempt = Attempt {
            state,
            listener,
            task,
        };

        // Listener registrations live inside `drive` and are dropped,
        // deregistering the listener, before notifications are flushed.
        let result = self.drive(&attempt, &request, &mut executor).await;
        if result.is_err() {
            attempt.state.set_phase(AttemptPhase::Failed);
        }
        attempt.listener.flush_notifications().await;
        let phase = attempt.state.phase();
        log::info!("download {} ended: {}", attempt.state.gid(), phase);
        result.map(|_| phase)
    }

    async fn drive(
        &self,
        attempt: &Attempt,
        request: &DownloadRequest<'_>,
        executor: &mut AsyncExecutor,
    ) -> Result<(), DownloadError> {
        let state = &attempt.state;
        let api = self.api_factory.create(&self.config.api_key, MAIN_USER_AGENT);
        let _main = ListenerRegistration::register(Arc::clone(&api), attempt.sdk_listener());

        if let Some((email, password)) = self.config.credentials() {
            state.set_phase(AttemptPhase::AwaitingLogin);
            log::info!("logging in as {}", email);
            let login = executor.perform(|| api.login(email, password)).await;
            self.resolution_step(attempt, login).await?;
            if let Some(error) = state.error() {
                return self.abort(attempt, error).await;
            }
        }

        state.set_phase(AttemptPhase::AwaitingNodeResolution);
        let mut _folder: Option<ListenerRegistration> = None;
        let node = match request.kind {
            LinkKind::File => {
                let lookup = executor.perform(|| api.get_public_node(request.link)).await;
                self.resolution_step(attempt, lookup).await?;
                state.public_node()
            }
            LinkKind::Folder => {
                let folder_api = self
                    .api_factory
                    .create(&self.config.api_key, FOLDER_USER_AGENT);
                let registration =
                    ListenerRegistration::register(Arc::clone(&folder_api), attempt.sdk_listener());
                let login = executor
                    .perform(|| folder_api.login_to_folder(request.link))
                    .await;
                self.resolution_step(attempt, login).await?;
                let authorized = match (state.error(), state.node()) {
                    (None, Some(node)) => folder_api.authorize_node(&node),
                    _ => None,
                };
                _folder = Some(registration);
                authorized
            }
        };

        let node = match (state.error(), node) {
            (Some(error), _) => return self.abort(attempt, error).await,
            (None, None) => {
                let reason = match request.kind {
                    LinkKind::File => "Failed to resolve public node",
                    LinkKind::Folder => "Failed to authorize folder node",
                };
                return self.abort(attempt, reason.to_string()).await;
            }
            (None, Some(node)) => node,
        };
        state.set_phase(AttemptPhase::Resolved);

        self.start_transfer(attempt, request, executor, &node, &api).await
    }

    async fn start_transfer(
        &self,
        attempt: &Attempt,
        request: &DownloadRequest<'_>,
        executor: &mut AsyncExecutor,
        node: &Node,
        api: &Arc<dyn CloudApi>,
    ) -> Result<(), DownloadError> {
        let state = &attempt.state;
        let task = &attempt.task;

        tokio::fs::create_dir_all(request.path)
            .await
            .map_err(DownloadError::Disk)?;

        let custom_name = request.name.filter(|n| !n.is_empty());
        let name = custom_name.unwrap_or(node.name.as_str()).to_string();
        let gid = generate_gid();
        log::info!("starting download {} ({})", name, gid);
        state.set_values(name, api.size(node), gid)?;

        let status = MegaDownloadStatus::new(Arc::clone(&attempt.listener), Arc::clone(task));
        self.registry.insert(task.uid(), Arc::new(status));
        task.on_download_start().await;
        self.messenger.send_status_message(task.message()).await;

        state.set_phase(AttemptPhase::Transferring);
        let transfer = executor
            .perform(|| api.start_download(node, request.path, custom_name))
            .await;
        if let Err(e) = &transfer {
            // on_download_start already went out.
            attempt.listener.abandon_transfer(&**api, &e.to_string());
        }
        transfer
    }

    /// A login or lookup step that was rejected or timed out still has to
    /// reach the chat.
    async fn resolution_step(
        &self,
        attempt: &Attempt,
        result: Result<(), DownloadError>,
    ) -> Result<(), DownloadError> {
        if let Err(e) = &result {
            self.report(attempt, &e.to_string()).await;
        }
        result
    }

    async fn abort(&self, attempt: &Attempt, error: String) -> Result<(), DownloadError> {
        self.report(attempt, &error).await;
        Err(DownloadError::Resolution(error))
    }

    async fn report(&self, attempt: &Attempt, error: &str) {
        log::error!("aborting download: {}", error);
        attempt.state.set_phase(AttemptPhase::Failed);
        self.messenger.send_message(error, attempt.task.message()).await;
    }
}

/// Random alphanumeric tracking id.
pub fn generate_gid() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GID_LEN)
        .map(char::from)
        .collect()
}
