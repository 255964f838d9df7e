use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat message that requested a download; replies and status messages are
/// attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Host-side listener for one download task.
///
/// Lifecycle:
/// - `on_download_start` is called once, after the node is resolved and the
///   status record is registered.
/// - `on_download_complete` is called once when the transfer finishes with
///   the expected target.
/// - `on_download_error` is called on the first failure or cancellation.
#[async_trait]
pub trait TaskListener: Send + Sync + 'static {
    /// Key of this task's entry in the status dashboard.
    fn uid(&self) -> u64;

    fn message(&self) -> MessageRef;

    async fn on_download_start(&self);

    async fn on_download_complete(&self);

    async fn on_download_error(&self, error: &str);
}

/// Outbound chat operations of the host bot. Best effort: implementations
/// log their own delivery failures.
#[async_trait]
pub trait Messenger: Send + Sync + 'static {
    async fn send_message(&self, text: &str, reply_to: MessageRef);

    /// Post (or refresh) the status dashboard for the chat of `reply_to`.
    async fn send_status_message(&self, reply_to: MessageRef);
}
