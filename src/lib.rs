//! Bridges a callback-driven cloud-storage SDK to a host bot's download flow.
//!
//! The SDK reports every request and transfer through listener callbacks on
//! its own thread. [`MegaDownloader`] runs the login → node resolution →
//! transfer steps one at a time through an [`AsyncExecutor`], while a
//! [`MegaAppListener`] turns the callbacks into live status, host
//! notifications and step completion.

pub mod bridge;
pub mod config;
pub mod downloader;
pub mod host;
pub mod listener;
pub mod sdk;
pub mod status;
pub mod types;

pub use bridge::executor::{AsyncExecutor, CompletionSignal};
pub use config::{ConfigError, MegaConfig};
pub use downloader::mega_downloader::{DownloadRequest, MegaDownloader};
pub use host::observer::{MessageRef, Messenger, TaskListener};
pub use listener::app_listener::MegaAppListener;
pub use listener::state::DownloadState;
pub use sdk::api::{ApiFactory, CloudApi, ListenerRegistration};
pub use sdk::events::{SdkEvent, SdkListener};
pub use status::mega_status::{DownloadStatus, MegaDownloadStatus};
pub use status::registry::StatusRegistry;
pub use status::snapshot::{format_bytes, format_speed, StatusSnapshot};
pub use types::types::{
    AttemptPhase, BridgeError, DownloadError, LinkKind, MegaError, Node, Request, RequestKind,
    TransferInfo, TransferState,
};
