use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlowstateError;

/// Why a task run wants the user's attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AwaitingInput,
    Completed,
    Failed,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AwaitingInput => "awaiting_input",
            NotificationKind::Completed => "completed",
            NotificationKind::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "awaiting_input" => Some(NotificationKind::AwaitingInput),
            "completed" => Some(NotificationKind::Completed),
            "failed" => Some(NotificationKind::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single notification pushed over `/api/notifications/stream`.
///
/// Transient: decoded from one stream event and handed straight to the
/// platform sink. The wire format uses `type` for the kind and camelCase
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub task_run_id: String,
    pub project_id: String,
    pub issue_id: String,
}

impl NotificationRequest {
    /// Decode one event payload.
    pub fn from_json(data: &str) -> Result<Self, FlowstateError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Reject requests that would render as an empty notification.
    pub fn validate(&self) -> Result<(), FlowstateError> {
        if self.title.trim().is_empty() {
            return Err(FlowstateError::InvalidInput("title must not be empty".into()));
        }
        if self.task_run_id.is_empty() {
            return Err(FlowstateError::InvalidInput(
                "taskRunId must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Server acknowledgement for a published notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub id: String,
    /// Number of stream subscribers the request was handed to.
    pub delivered: usize,
    pub published_at: DateTime<Utc>,
}
