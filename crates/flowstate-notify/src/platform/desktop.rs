//! Native desktop notifications.
//!
//! - **macOS**: `osascript` AppleScript `display notification`
//! - **Windows / Linux / BSD**: the `notify_rust` crate
//!
//! Desktop platforms have no permission prompt of their own, so consent is
//! either given up front (`--allow-notifications`) or asked for once on the
//! controlling terminal.

use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use flowstate_core::PermissionState;
use tracing::info;

use super::NotificationPlatform;
use crate::NotifyError;

const DEFAULT_TITLE: &str = "Flowstate";

pub struct DesktopPlatform {
    app_name: String,
    preapproved: bool,
    timeout_ms: u32,
}

impl DesktopPlatform {
    pub fn new(app_name: &str, preapproved: bool, timeout_ms: u32) -> Self {
        Self {
            app_name: app_name.to_string(),
            preapproved,
            timeout_ms,
        }
    }
}

fn display_title(title: &str) -> &str {
    if title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        title
    }
}

/// Escape a string for embedding inside an AppleScript double-quoted string.
/// Backslashes go first so the later replacements are not double-escaped.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl NotificationPlatform for DesktopPlatform {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn probe(&self) -> Result<bool, NotifyError> {
        probe_notification_server().await
    }

    async fn is_permission_granted(&self) -> Result<bool, NotifyError> {
        Ok(self.preapproved)
    }

    async fn request_permission(&self) -> Result<PermissionState, NotifyError> {
        if !std::io::stdin().is_terminal() {
            info!("no terminal to ask for notification permission; pass --allow-notifications to enable");
            return Ok(PermissionState::Denied);
        }
        let prompt = format!("Allow {} to show desktop notifications? [y/N] ", self.app_name);
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            stderr.write_all(prompt.as_bytes())?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| NotifyError::Platform(format!("prompt task: {e}")))?
        .map_err(|e| NotifyError::Platform(format!("read answer: {e}")))?;
        Ok(PermissionState::from(is_affirmative(&answer)))
    }

    async fn send_notification(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        show(&self.app_name, display_title(title), body, self.timeout_ms).await
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
async fn probe_notification_server() -> Result<bool, NotifyError> {
    let info = tokio::task::spawn_blocking(notify_rust::get_server_information)
        .await
        .map_err(|e| NotifyError::Platform(format!("probe task: {e}")))?;
    match info {
        Ok(server) => {
            tracing::debug!("notification server: {} {}", server.name, server.version);
            Ok(true)
        }
        Err(e) => {
            tracing::debug!("no notification server on the session bus: {e}");
            Ok(false)
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
async fn probe_notification_server() -> Result<bool, NotifyError> {
    Ok(true)
}

#[cfg(not(target_os = "macos"))]
async fn show(app_name: &str, title: &str, body: &str, timeout_ms: u32) -> Result<(), NotifyError> {
    let (app_name, title, body) = (app_name.to_string(), title.to_string(), body.to_string());
    tokio::task::spawn_blocking(move || {
        notify_rust::Notification::new()
            .appname(&app_name)
            .summary(&title)
            .body(&body)
            .timeout(notify_rust::Timeout::Milliseconds(timeout_ms))
            .show()
            .map(|_| ())
    })
    .await
    .map_err(|e| NotifyError::Delivery(format!("notification task: {e}")))?
    .map_err(|e| NotifyError::Delivery(e.to_string()))
}

/// macOS controls how long the banner stays up, so `timeout_ms` is unused.
#[cfg(target_os = "macos")]
async fn show(_app_name: &str, title: &str, body: &str, _timeout_ms: u32) -> Result<(), NotifyError> {
    let script = format!(
        r#"display notification "{}" with title "{}""#,
        applescript_escape(body),
        applescript_escape(title),
    );
    let output = tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .output()
        .await
        .map_err(|e| NotifyError::Delivery(format!("osascript: {e}")))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(NotifyError::Delivery(format!(
            "osascript exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}
