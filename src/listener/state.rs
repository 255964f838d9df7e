use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::types::types::{AttemptPhase, DownloadError, Node};

/// Target of the transfer, fixed once the node is resolved.
#[derive(Debug, Clone)]
struct TransferTarget {
    name: String,
    size: u64,
    gid: String,
}

/// Live state of one download attempt.
///
/// Written from the SDK callback thread (and by `mark_cancelled` from the
/// host); read by the status dashboard. Progress counters use relaxed
/// atomics and are only eventually consistent, which is fine for display.
/// Fields the orchestrator acts on (`node`, `public_node`, `error`) are
/// written before the completion signal is raised, so they are visible once
/// a step returns.
pub struct DownloadState {
    target: OnceLock<TransferTarget>,
    bytes_transferred: AtomicU64,
    speed: AtomicU64,
    cancelled: AtomicBool,
    node: RwLock<Option<Node>>,
    public_node: RwLock<Option<Node>>,
    error: RwLock<Option<String>>,
    phase: RwLock<AttemptPhase>,
}

impl Default for DownloadState {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadState {
    pub fn new() -> Self {
        Self {
            target: OnceLock::new(),
            bytes_transferred: AtomicU64::new(0),
            speed: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            node: RwLock::new(None),
            public_node: RwLock::new(None),
            error: RwLock::new(None),
            phase: RwLock::new(AttemptPhase::Idle),
        }
    }

    /// Fix name, size and tracking id. Can only succeed once per attempt.
    pub fn set_values(&self, name: String, size: u64, gid: String) -> Result<(), DownloadError> {
        self.target
            .set(TransferTarget { name, size, gid })
            .map_err(|_| DownloadError::AlreadyInitialised(self.gid().to_string()))
    }

    pub fn name(&self) -> &str {
        self.target.get().map(|t| t.name.as_str()).unwrap_or("")
    }

    /// Expected total size in bytes.
    pub fn size(&self) -> u64 {
        self.target.get().map(|t| t.size).unwrap_or(0)
    }

    pub fn gid(&self) -> &str {
        self.target.get().map(|t| t.gid.as_str()).unwrap_or("")
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Relaxed)
    }

    /// Bytes per second, as last reported by the SDK.
    pub fn speed(&self) -> u64 {
        self.speed.load(Ordering::Relaxed)
    }

    pub fn record_progress(&self, speed: u64, transferred: u64) {
        self.speed.store(speed, Ordering::Relaxed);
        self.bytes_transferred.store(transferred, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Set the cancelled flag. Returns `true` only for the call that
    /// actually flipped it.
    pub fn mark_cancelled(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn node(&self) -> Option<Node> {
        read(&self.node).clone()
    }

    pub fn set_node(&self, node: Option<Node>) {
        *write(&self.node) = node;
    }

    pub fn public_node(&self) -> Option<Node> {
        read(&self.public_node).clone()
    }

    pub fn set_public_node(&self, node: Option<Node>) {
        *write(&self.public_node) = node;
    }

    pub fn error(&self) -> Option<String> {
        read(&self.error).clone()
    }

    pub fn set_error(&self, error: impl Into<String>) {
        *write(&self.error) = Some(error.into());
    }

    pub fn phase(&self) -> AttemptPhase {
        *read(&self.phase)
    }

    /// Terminal phases are sticky.
    pub fn set_phase(&self, phase: AttemptPhase) {
        let mut current = write(&self.phase);
        if !current.is_terminal() {
            *current = phase;
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
