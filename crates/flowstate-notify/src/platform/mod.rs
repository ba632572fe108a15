pub mod desktop;
pub mod mock;

use async_trait::async_trait;
use flowstate_core::PermissionState;

use crate::NotifyError;

pub use desktop::DesktopPlatform;
pub use mock::{MockPlatform, PermissionGate};

/// Trait for the platform-level notification capability.
///
/// Each platform encapsulates:
/// - Whether native notifications exist at all in this environment
/// - How permission is queried and, if needed, requested from the user
/// - How a single notification is shown
///
/// The trait does NOT handle:
/// - Caching the permission outcome (handled by `PermissionSession`)
/// - Decoding stream payloads (handled by the listener)
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Human-readable platform name for logging.
    fn name(&self) -> &str;

    /// Check whether native notifications are available. `Ok(false)` is the
    /// normal answer when running without a notification server.
    async fn probe(&self) -> Result<bool, NotifyError>;

    /// Non-interactive check of the current permission.
    async fn is_permission_granted(&self) -> Result<bool, NotifyError>;

    /// Ask the user. Interactive; callers must not repeat it within a session.
    async fn request_permission(&self) -> Result<PermissionState, NotifyError>;

    /// Show one notification.
    async fn send_notification(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}
