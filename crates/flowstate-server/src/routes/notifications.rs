use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use flowstate_core::notification::NotificationRequest;
use futures::Stream;
use serde_json::{json, Value};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", post(publish_notification))
        .route("/api/notifications/stream", get(notification_stream))
}

async fn publish_notification(
    State(state): State<AppState>,
    body: Result<Json<NotificationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    // Malformed or mistyped bodies get the same 400 shape as failed validation.
    let Json(body) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.body_text() })),
        )
    })?;
    body.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
    })?;
    state
        .hub
        .publish(&body)
        .map(|receipt| (StatusCode::ACCEPTED, Json(json!(receipt))))
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        })
}

async fn notification_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.hub.subscribe();
    info!(
        "notification stream opened ({} subscriber(s))",
        state.hub.subscriber_count()
    );
    let stream = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(published) => Some(Ok::<_, Infallible>(Event::default()
            .id(published.id.as_str())
            .data(published.data.as_str()))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("notification stream lagged, skipped {skipped} message(s)");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
