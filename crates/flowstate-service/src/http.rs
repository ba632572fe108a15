use async_trait::async_trait;
use bytes::Bytes;
use flowstate_core::notification::{NotificationRequest, PublishReceipt};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{header, Client, RequestBuilder, StatusCode};

use crate::{NotificationService, ServiceError};

/// Raw body of `/api/notifications/stream`, chunked as it arrives.
pub type NotificationByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Async HTTP client for the notification endpoints.
/// Connects to a running flowstate-server.
#[derive(Clone)]
pub struct HttpService {
    base_url: String,
    client: Client,
    api_key: Option<String>,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            api_key: None,
        }
    }

    pub fn with_api_key(base_url: &str, key: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            api_key: Some(key),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    /// Open the server-sent event stream of notification requests.
    ///
    /// Resolves once the server has answered with a success status; the
    /// returned stream then yields body chunks until the connection drops.
    pub async fn notification_stream(&self) -> Result<NotificationByteStream, ServiceError> {
        let builder = self
            .client
            .get(format!("{}/api/notifications/stream", self.base_url))
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache");
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error_with_status(status, resp).await);
        }
        Ok(resp.bytes_stream().boxed())
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        let builder = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);
        let resp = self
            .with_auth(builder)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        handle_response(resp).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::InvalidInput(msg)
        }
        StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(msg),
        _ => ServiceError::Internal(msg),
    }
}

#[async_trait]
impl NotificationService for HttpService {
    /// Health endpoint is NOT authenticated.
    async fn health_check(&self) -> Result<(), ServiceError> {
        let resp = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::Internal(format!(
                "health check failed: {}",
                resp.status()
            )))
        }
    }

    async fn publish_notification(
        &self,
        request: &NotificationRequest,
    ) -> Result<PublishReceipt, ServiceError> {
        self.post_json("/api/notifications", request).await
    }
}
