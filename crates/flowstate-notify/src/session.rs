use std::sync::Arc;

use flowstate_core::PermissionState;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::platform::NotificationPlatform;

/// Notification permission for one user session.
///
/// Cloning shares the state: every listener mounted with a clone sees the
/// same cached answer, so the user is prompted at most once per session.
/// Nothing here is global; create a fresh session to start over.
#[derive(Clone, Default)]
pub struct PermissionSession {
    state: Arc<Mutex<PermissionState>>,
}

impl PermissionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session whose outcome is already known.
    pub fn with_state(state: PermissionState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn current(&self) -> PermissionState {
        *self.state.lock().await
    }

    /// Settle the permission, consulting the platform only when the session
    /// has no answer yet.
    ///
    /// Concurrent callers queue on the session lock, so two listeners
    /// mounting together still produce a single prompt. Platform errors
    /// count as a denial for the rest of the session.
    pub async fn resolve(&self, platform: &dyn NotificationPlatform) -> PermissionState {
        let mut state = self.state.lock().await;
        if state.is_settled() {
            return *state;
        }

        let granted = match platform.is_permission_granted().await {
            Ok(granted) => granted,
            Err(e) => {
                warn!("{} permission query failed: {e}", platform.name());
                false
            }
        };

        *state = if granted {
            PermissionState::Granted
        } else {
            match platform.request_permission().await {
                Ok(PermissionState::Unknown) => PermissionState::Denied,
                Ok(answer) => answer,
                Err(e) => {
                    warn!("{} permission request failed: {e}", platform.name());
                    PermissionState::Denied
                }
            }
        };
        info!("notification permission {}", *state);
        *state
    }
}
