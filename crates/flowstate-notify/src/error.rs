use flowstate_core::FlowstateError;
use thiserror::Error;

/// Everything that can go wrong between the stream and the desktop.
///
/// None of these are fatal to the host: the listener logs them and either
/// drops the one message or goes idle for the rest of the session.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("native notifications are not available here")]
    CapabilityUnavailable,

    #[error("notification permission denied")]
    PermissionDenied,

    #[error("malformed notification: {0}")]
    Decode(#[from] FlowstateError),

    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("notification stream error: {0}")]
    Transport(String),

    #[error("platform error: {0}")]
    Platform(String),
}
