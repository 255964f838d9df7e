use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SDK result code meaning the request succeeded.
pub const API_OK: i32 = 0;

/// Opaque reference to a file or folder in the cloud account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub handle: u64,
    pub name: String,
    pub is_folder: bool,
}

impl Node {
    pub fn new(handle: u64, name: impl Into<String>, is_folder: bool) -> Self {
        Self {
            handle,
            name: name.into(),
            is_folder,
        }
    }
}

/// Kind of an asynchronous SDK request, as reported back in callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Login,
    FetchNodes,
    GetPublicNode,
    CancelTransfer,
    Other(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kind: RequestKind,
    /// Set by the SDK on a finished `GetPublicNode` request.
    pub public_node: Option<Node>,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            public_node: None,
        }
    }

    pub fn public_node(node: Node) -> Self {
        Self {
            kind: RequestKind::GetPublicNode,
            public_node: Some(node),
        }
    }
}

/// Transfer lifecycle states, with the SDK's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    None = 0,
    Queued = 1,
    Active = 2,
    Paused = 3,
    Retrying = 4,
    Completing = 5,
    Completed = 6,
    Cancelled = 7,
    Failed = 8,
}

impl TransferState {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TransferState::Queued,
            2 => TransferState::Active,
            3 => TransferState::Paused,
            4 => TransferState::Retrying,
            5 => TransferState::Completing,
            6 => TransferState::Completed,
            7 => TransferState::Cancelled,
            8 => TransferState::Failed,
            _ => TransferState::None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Queued and retrying transfers report temporary errors that must not
    /// tear down the transfer queue.
    pub fn is_transient(self) -> bool {
        matches!(self, TransferState::Queued | TransferState::Retrying)
    }
}

/// Snapshot of a transfer as handed to listener callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInfo {
    pub tag: i32,
    pub file_name: String,
    pub state: TransferState,
    /// Bytes per second.
    pub speed: u64,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
    pub finished: bool,
    pub folder_transfer: bool,
}

/// Error record reported by the SDK, both in callbacks and for calls that
/// fail synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct MegaError {
    pub code: i32,
    pub description: String,
}

impl MegaError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(API_OK, "No error")
    }

    pub fn is_ok(&self) -> bool {
        self.code == API_OK
    }
}

/// How the caller classified the link being downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    File,
    Folder,
}

/// Position of one download attempt in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptPhase {
    Idle,
    AwaitingLogin,
    AwaitingNodeResolution,
    Resolved,
    Transferring,
    Completed,
    Failed,
    Cancelled,
}

impl AttemptPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptPhase::Completed | AttemptPhase::Failed | AttemptPhase::Cancelled
        )
    }
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttemptPhase::Idle => "Idle",
            AttemptPhase::AwaitingLogin => "Logging in",
            AttemptPhase::AwaitingNodeResolution => "Resolving",
            AttemptPhase::Resolved => "Resolved",
            AttemptPhase::Transferring => "Downloading",
            AttemptPhase::Completed => "Completed",
            AttemptPhase::Failed => "Failed",
            AttemptPhase::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("sdk step did not complete within {0:?}")]
    TimedOut(Duration),
    #[error("completion signal dropped before it was raised")]
    SignalClosed,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("sdk call failed: {0}")]
    Sdk(#[from] MegaError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("node resolution failed: {0}")]
    Resolution(String),
    #[error("disk error: {0}")]
    Disk(#[source] std::io::Error),
    #[error("download values already set for gid {0}")]
    AlreadyInitialised(String),
}
