#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use async_trait::async_trait;

use mega_bridge::config::FOLDER_USER_AGENT;
use mega_bridge::{
    ApiFactory, CloudApi, MegaError, MessageRef, Messenger, Node, Request, RequestKind, SdkEvent,
    SdkListener, TaskListener, TransferInfo, TransferState,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sdk_error(code: i32, description: &str) -> MegaError {
    MegaError::new(code, description)
}

// ---------------------------------------------------------------
// Scripted SDK
// ---------------------------------------------------------------

/// What a fake client handle does when each call is made.
pub struct Script {
    pub login_error: Option<MegaError>,
    /// Name of the root node reported after fetch-nodes.
    pub root_name: String,
    /// Extra requests the SDK finishes on its own after fetch-nodes.
    pub after_fetch_nodes: Vec<RequestKind>,
    pub public_node: Option<Node>,
    pub public_node_error: Option<MegaError>,
    pub folder_login_error: Option<MegaError>,
    pub authorize: bool,
    pub size: u64,
    /// File name the transfer reports.
    pub transfer_name: String,
    pub folder_transfer: bool,
    /// Cumulative byte counts, one progress update each.
    pub updates: Vec<u64>,
    /// Temporary errors raised before the first progress update.
    pub temp_errors: Vec<TransferState>,
    pub finish_error: Option<MegaError>,
    /// Blocks the transfer thread after the first update until released.
    pub gate: Option<std_mpsc::Receiver<()>>,
    /// Suppress the terminal transfer event.
    pub skip_finish: bool,
    /// Reject `start_download` synchronously with this error.
    pub reject_start: Option<MegaError>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            login_error: None,
            root_name: "Cloud Drive".to_string(),
            after_fetch_nodes: vec![RequestKind::Other(31)],
            public_node: None,
            public_node_error: None,
            folder_login_error: None,
            authorize: true,
            size: 0,
            transfer_name: String::new(),
            folder_transfer: false,
            updates: Vec::new(),
            temp_errors: Vec::new(),
            finish_error: None,
            gate: None,
            skip_finish: false,
            reject_start: None,
        }
    }
}

impl Script {
    pub fn public_file(name: &str, size: u64) -> Self {
        Self {
            public_node: Some(Node::new(42, name, false)),
            size,
            transfer_name: name.to_string(),
            updates: vec![size / 4, size / 2, size],
            ..Self::default()
        }
    }

    pub fn folder(name: &str, size: u64) -> Self {
        Self {
            root_name: name.to_string(),
            after_fetch_nodes: Vec::new(),
            size,
            transfer_name: name.to_string(),
            folder_transfer: true,
            updates: vec![size / 2, size],
            ..Self::default()
        }
    }
}

pub struct FakeApi {
    me: Weak<FakeApi>,
    pub user_agent: String,
    script: Mutex<Script>,
    listeners: Mutex<Vec<Arc<dyn SdkListener>>>,
    calls: Mutex<Vec<String>>,
    cancel_requests: AtomicUsize,
    nodes_fetched: AtomicBool,
}

impl FakeApi {
    pub fn new(user_agent: &str, script: Script) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            user_agent: user_agent.to_string(),
            script: Mutex::new(script),
            listeners: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            cancel_requests: AtomicUsize::new(0),
            nodes_fetched: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn cancel_requests(&self) -> usize {
        self.cancel_requests.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// Deliver `events` in order from a separate thread, like the SDK's
    /// worker thread would.
    fn dispatch(&self, events: Vec<SdkEvent>) {
        let api = self.me.upgrade().expect("fake api alive");
        thread::spawn(move || {
            for event in events {
                api.emit(event);
            }
        });
    }

    fn emit(&self, event: SdkEvent) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_event(self, event.clone());
        }
    }

    fn transfer(&self, state: TransferState, bytes: u64, finished: bool) -> TransferInfo {
        let script = self.script.lock().unwrap();
        TransferInfo {
            tag: 7,
            file_name: script.transfer_name.clone(),
            state,
            speed: 1024,
            transferred_bytes: bytes,
            total_bytes: script.size,
            finished,
            folder_transfer: script.folder_transfer,
        }
    }

    fn run_transfer(self: Arc<Self>) {
        let (updates, temp_errors, gate, finish_error, skip_finish) = {
            let mut script = self.script.lock().unwrap();
            (
                script.updates.clone(),
                script.temp_errors.clone(),
                script.gate.take(),
                script.finish_error.clone(),
                script.skip_finish,
            )
        };

        for state in temp_errors {
            let transfer = self.transfer(state, 0, false);
            self.emit(SdkEvent::TransferTemporaryError {
                transfer,
                error: sdk_error(-3, "Request failed, retrying"),
            });
        }

        let mut last = 0;
        for (i, bytes) in updates.into_iter().enumerate() {
            if self.cancel_requests() > 0 {
                break;
            }
            last = bytes;
            self.emit(SdkEvent::TransferUpdate(
                self.transfer(TransferState::Active, bytes, false),
            ));
            if i == 0 {
                if let Some(gate) = &gate {
                    let _ = gate.recv();
                }
            }
        }

        if skip_finish {
            return;
        }

        let (state, error) = if self.cancel_requests() > 0 {
            (TransferState::Cancelled, sdk_error(-13, "Incomplete"))
        } else if let Some(error) = finish_error {
            (TransferState::Failed, error)
        } else {
            (TransferState::Completed, MegaError::ok())
        };
        self.emit(SdkEvent::TransferFinish {
            transfer: self.transfer(state, last, true),
            error,
        });
    }
}

impl CloudApi for FakeApi {
    fn login(&self, email: &str, _password: &str) -> Result<(), MegaError> {
        self.record(format!("login:{}", email));
        let error = self.script.lock().unwrap().login_error.clone();
        self.dispatch(vec![SdkEvent::RequestFinish {
            request: Request::new(RequestKind::Login),
            error: error.unwrap_or_else(MegaError::ok),
        }]);
        Ok(())
    }

    fn fetch_nodes(&self) -> Result<(), MegaError> {
        self.record("fetch_nodes");
        self.nodes_fetched.store(true, Ordering::SeqCst);
        let extra = self.script.lock().unwrap().after_fetch_nodes.clone();
        let mut events = vec![SdkEvent::RequestFinish {
            request: Request::new(RequestKind::FetchNodes),
            error: MegaError::ok(),
        }];
        events.extend(extra.into_iter().map(|kind| SdkEvent::RequestFinish {
            request: Request::new(kind),
            error: MegaError::ok(),
        }));
        self.dispatch(events);
        Ok(())
    }

    fn get_public_node(&self, link: &str) -> Result<(), MegaError> {
        self.record(format!("get_public_node:{}", link));
        let (node, error) = {
            let script = self.script.lock().unwrap();
            (script.public_node.clone(), script.public_node_error.clone())
        };
        let request = match node {
            Some(node) => Request::public_node(node),
            None => Request::new(RequestKind::GetPublicNode),
        };
        self.dispatch(vec![SdkEvent::RequestFinish {
            request,
            error: error.unwrap_or_else(MegaError::ok),
        }]);
        Ok(())
    }

    fn login_to_folder(&self, link: &str) -> Result<(), MegaError> {
        self.record(format!("login_to_folder:{}", link));
        let error = self.script.lock().unwrap().folder_login_error.clone();
        self.dispatch(vec![SdkEvent::RequestFinish {
            request: Request::new(RequestKind::Login),
            error: error.unwrap_or_else(MegaError::ok),
        }]);
        Ok(())
    }

    fn root_node(&self) -> Option<Node> {
        if !self.nodes_fetched.load(Ordering::SeqCst) {
            return None;
        }
        let name = self.script.lock().unwrap().root_name.clone();
        Some(Node::new(1, name, true))
    }

    fn authorize_node(&self, node: &Node) -> Option<Node> {
        self.record(format!("authorize_node:{}", node.name));
        if self.script.lock().unwrap().authorize {
            Some(Node::new(node.handle + 100, node.name.clone(), node.is_folder))
        } else {
            None
        }
    }

    fn size(&self, _node: &Node) -> u64 {
        self.script.lock().unwrap().size
    }

    fn start_download(
        &self,
        node: &Node,
        _local_path: &Path,
        custom_name: Option<&str>,
    ) -> Result<(), MegaError> {
        self.record(format!(
            "start_download:{}:{}",
            node.name,
            custom_name.unwrap_or("")
        ));
        if let Some(error) = self.script.lock().unwrap().reject_start.clone() {
            return Err(error);
        }
        let api = self.me.upgrade().expect("fake api alive");
        thread::spawn(move || api.run_transfer());
        Ok(())
    }

    fn cancel_transfer(&self, transfer: &TransferInfo) {
        self.record(format!("cancel_transfer:{}", transfer.tag));
        self.cancel_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn add_listener(&self, listener: Arc<dyn SdkListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn SdkListener>) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }
}

/// Hands out one fake handle per user agent.
pub struct FakeFactory {
    main: Mutex<Option<Script>>,
    folder: Mutex<Option<Script>>,
    created: Mutex<Vec<Arc<FakeApi>>>,
}

impl FakeFactory {
    pub fn new(main: Script) -> Arc<Self> {
        Self::with_folder(main, Script::default())
    }

    pub fn with_folder(main: Script, folder: Script) -> Arc<Self> {
        Arc::new(Self {
            main: Mutex::new(Some(main)),
            folder: Mutex::new(Some(folder)),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> Vec<Arc<FakeApi>> {
        self.created.lock().unwrap().clone()
    }

    pub fn main_api(&self) -> Arc<FakeApi> {
        self.created()
            .into_iter()
            .find(|api| api.user_agent != FOLDER_USER_AGENT)
            .expect("main api created")
    }

    pub fn folder_api(&self) -> Option<Arc<FakeApi>> {
        self.created()
            .into_iter()
            .find(|api| api.user_agent == FOLDER_USER_AGENT)
    }
}

impl ApiFactory for FakeFactory {
    fn create(&self, _app_key: &str, user_agent: &str) -> Arc<dyn CloudApi> {
        let slot = if user_agent == FOLDER_USER_AGENT {
            &self.folder
        } else {
            &self.main
        };
        let script = slot.lock().unwrap().take().unwrap_or_default();
        let api = FakeApi::new(user_agent, script);
        self.created.lock().unwrap().push(Arc::clone(&api));
        api
    }
}

// ---------------------------------------------------------------
// Recording host
// ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Start,
    Complete,
    Error(String),
}

pub struct RecordingTask {
    uid: u64,
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingTask {
    pub fn new(uid: u64) -> Arc<Self> {
        Arc::new(Self {
            uid,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Error(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TaskListener for RecordingTask {
    fn uid(&self) -> u64 {
        self.uid
    }

    fn message(&self) -> MessageRef {
        MessageRef {
            chat_id: -100,
            message_id: self.uid as i64,
        }
    }

    async fn on_download_start(&self) {
        self.events.lock().unwrap().push(HostEvent::Start);
    }

    async fn on_download_complete(&self) {
        self.events.lock().unwrap().push(HostEvent::Complete);
    }

    async fn on_download_error(&self, error: &str) {
        self.events
            .lock()
            .unwrap()
            .push(HostEvent::Error(error.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    messages: Mutex<Vec<(String, MessageRef)>>,
    status_posts: AtomicUsize,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn status_posts(&self) -> usize {
        self.status_posts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, text: &str, reply_to: MessageRef) {
        self.messages
            .lock()
            .unwrap()
            .push((text.to_string(), reply_to));
    }

    async fn send_status_message(&self, _reply_to: MessageRef) {
        self.status_posts.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------
// Listener-level stub (no threads, no scripted callbacks)
// ---------------------------------------------------------------

/// Records the follow-up calls a listener makes from inside callbacks.
#[derive(Default)]
pub struct StubApi {
    pub root: Mutex<Option<Node>>,
    pub fetch_nodes_calls: AtomicUsize,
    pub cancelled: AtomicUsize,
    pub reject_fetch_nodes: AtomicBool,
}

impl StubApi {
    pub fn with_root(name: &str) -> Self {
        let stub = Self::default();
        *stub.root.lock().unwrap() = Some(Node::new(1, name, true));
        stub
    }
}

impl CloudApi for StubApi {
    fn login(&self, _email: &str, _password: &str) -> Result<(), MegaError> {
        Ok(())
    }

    fn fetch_nodes(&self) -> Result<(), MegaError> {
        self.fetch_nodes_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_fetch_nodes.load(Ordering::SeqCst) {
            return Err(sdk_error(-11, "Access denied"));
        }
        Ok(())
    }

    fn get_public_node(&self, _link: &str) -> Result<(), MegaError> {
        Ok(())
    }

    fn login_to_folder(&self, _link: &str) -> Result<(), MegaError> {
        Ok(())
    }

    fn root_node(&self) -> Option<Node> {
        self.root.lock().unwrap().clone()
    }

    fn authorize_node(&self, node: &Node) -> Option<Node> {
        Some(node.clone())
    }

    fn size(&self, _node: &Node) -> u64 {
        0
    }

    fn start_download(
        &self,
        _node: &Node,
        _local_path: &Path,
        _custom_name: Option<&str>,
    ) -> Result<(), MegaError> {
        Ok(())
    }

    fn cancel_transfer(&self, _transfer: &TransferInfo) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }

    fn add_listener(&self, _listener: Arc<dyn SdkListener>) {}

    fn remove_listener(&self, _listener: &Arc<dyn SdkListener>) {}
}

pub fn transfer(name: &str, state: TransferState, bytes: u64, finished: bool) -> TransferInfo {
    TransferInfo {
        tag: 1,
        file_name: name.to_string(),
        state,
        speed: 2048,
        transferred_bytes: bytes,
        total_bytes: 4096,
        finished,
        folder_transfer: false,
    }
}
