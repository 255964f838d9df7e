use crate::sdk::api::CloudApi;
use crate::types::types::{MegaError, Request, TransferInfo};

/// Callback events delivered by the SDK, one variant per listener hook.
#[derive(Debug, Clone)]
pub enum SdkEvent {
    RequestFinish {
        request: Request,
        error: MegaError,
    },
    RequestTemporaryError {
        request: Request,
        error: MegaError,
    },
    /// Fires many times per second while a transfer runs.
    TransferUpdate(TransferInfo),
    TransferFinish {
        transfer: TransferInfo,
        error: MegaError,
    },
    TransferTemporaryError {
        transfer: TransferInfo,
        error: MegaError,
    },
}

/// Receiver of SDK callbacks.
///
/// Called on the SDK's worker thread with the handle that produced the
/// event, so follow-up requests can be issued from inside the callback.
/// Implementations must not block.
pub trait SdkListener: Send + Sync {
    fn on_event(&self, api: &dyn CloudApi, event: SdkEvent);
}
