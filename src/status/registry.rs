use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::status::mega_status::DownloadStatus;
use crate::status::snapshot::StatusSnapshot;

/// Status dashboard: every running download, keyed by task uid.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct StatusRegistry {
    entries: Arc<RwLock<BTreeMap<u64, Arc<dyn DownloadStatus>>>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry previously registered under `uid`, if any.
    pub fn insert(
        &self,
        uid: u64,
        status: Arc<dyn DownloadStatus>,
    ) -> Option<Arc<dyn DownloadStatus>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uid, status)
    }

    pub fn get(&self, uid: u64) -> Option<Arc<dyn DownloadStatus>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&uid)
            .cloned()
    }

    pub fn remove(&self, uid: u64) -> Option<Arc<dyn DownloadStatus>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&uid)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of all entries, ordered by uid.
    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|status| status.snapshot())
            .collect()
    }
}
