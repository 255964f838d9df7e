use std::path::Path;
use std::sync::Arc;

use crate::sdk::events::SdkListener;
use crate::types::types::{MegaError, Node, TransferInfo};

/// One client handle of the cloud SDK.
///
/// Every request method only *starts* work: the SDK finishes it on its own
/// worker thread and reports back through the registered [`SdkListener`]s.
/// An `Err` return means the call was rejected synchronously and no callback
/// will follow.
pub trait CloudApi: Send + Sync {
    fn login(&self, email: &str, password: &str) -> Result<(), MegaError>;
    fn fetch_nodes(&self) -> Result<(), MegaError>;
    fn get_public_node(&self, link: &str) -> Result<(), MegaError>;
    fn login_to_folder(&self, link: &str) -> Result<(), MegaError>;

    /// Root of whatever the handle is logged into, once nodes are fetched.
    fn root_node(&self) -> Option<Node>;

    /// Converts a node obtained through a folder login into one the main
    /// session can download. `None` if the SDK refuses.
    fn authorize_node(&self, node: &Node) -> Option<Node>;

    /// Total size in bytes of a node (recursive for folders).
    fn size(&self, node: &Node) -> u64;

    fn start_download(
        &self,
        node: &Node,
        local_path: &Path,
        custom_name: Option<&str>,
    ) -> Result<(), MegaError>;

    fn cancel_transfer(&self, transfer: &TransferInfo);

    fn add_listener(&self, listener: Arc<dyn SdkListener>);
    fn remove_listener(&self, listener: &Arc<dyn SdkListener>);
}

/// Builds SDK client handles.
pub trait ApiFactory: Send + Sync {
    fn create(&self, app_key: &str, user_agent: &str) -> Arc<dyn CloudApi>;
}

/// Keeps a listener registered on a client handle for as long as it lives.
pub struct ListenerRegistration {
    api: Arc<dyn CloudApi>,
    listener: Arc<dyn SdkListener>,
}

impl ListenerRegistration {
    pub fn register(api: Arc<dyn CloudApi>, listener: Arc<dyn SdkListener>) -> Self {
        api.add_listener(Arc::clone(&listener));
        Self { api, listener }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.api.remove_listener(&self.listener);
    }
}
