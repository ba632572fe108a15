use async_trait::async_trait;
use flowstate_core::notification::{NotificationRequest, PublishReceipt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Abstraction over the notification endpoints of a flowstate server.
///
/// Runners publish through this trait; the desktop listener reads the
/// stream side through `HttpService::notification_stream`.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;
    async fn publish_notification(
        &self,
        request: &NotificationRequest,
    ) -> Result<PublishReceipt, ServiceError>;
}
