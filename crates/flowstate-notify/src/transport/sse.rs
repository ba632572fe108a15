use std::time::Duration;

use eventsource_stream::Eventsource;
use flowstate_service::HttpService;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{NotificationTransport, Subscription, TransportEvent};
use crate::NotifyError;

/// How the SSE transport behaves after the connection drops.
///
/// Delays double from `initial_delay` up to `max_delay` and reset once a
/// connection is established again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub enabled: bool,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based), or `None`
    /// when reconnecting is off.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.min(16));
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

/// Reads `/api/notifications/stream` from a flowstate server.
pub struct SseTransport {
    service: HttpService,
    policy: ReconnectPolicy,
}

impl SseTransport {
    pub fn new(service: HttpService, policy: ReconnectPolicy) -> Self {
        Self { service, policy }
    }
}

impl NotificationTransport for SseTransport {
    fn subscribe(&self, events: mpsc::Sender<TransportEvent>) -> Subscription {
        let token = CancellationToken::new();
        let task = tokio::spawn(pump(
            self.service.clone(),
            self.policy.clone(),
            events,
            token.clone(),
        ));
        Subscription::new(token).with_task(task)
    }
}

/// How a single connection ended.
enum StreamEnd {
    /// Server closed the response body.
    Closed,
    /// Nobody is reading events anymore.
    ListenerGone,
}

async fn pump(
    service: HttpService,
    policy: ReconnectPolicy,
    events: mpsc::Sender<TransportEvent>,
    token: CancellationToken,
) {
    let mut attempt = 0u32;
    loop {
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = read_stream(&service, &events, &mut attempt) => outcome,
        };
        let reason = match outcome {
            Ok(StreamEnd::ListenerGone) => return,
            Ok(StreamEnd::Closed) => "server closed the stream".to_string(),
            Err(e) => e.to_string(),
        };
        if events.send(TransportEvent::Error(reason)).await.is_err() {
            return;
        }

        let Some(delay) = policy.delay_for(attempt) else {
            debug!("reconnect disabled, notification stream stays closed");
            return;
        };
        attempt = attempt.saturating_add(1);
        info!("reconnecting notification stream in {}s", delay.as_secs_f32());
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn read_stream(
    service: &HttpService,
    events: &mpsc::Sender<TransportEvent>,
    attempt: &mut u32,
) -> Result<StreamEnd, NotifyError> {
    let body = service
        .notification_stream()
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?;
    *attempt = 0;
    debug!("notification stream connected to {}", service.base_url());
    if events.send(TransportEvent::Open).await.is_err() {
        return Ok(StreamEnd::ListenerGone);
    }

    let mut stream = body.eventsource();
    while let Some(item) = stream.next().await {
        let event = item.map_err(|e| NotifyError::Transport(e.to_string()))?;
        // Named events are not notification requests.
        if !event.event.is_empty() && event.event != "message" {
            debug!("ignoring `{}` event on notification stream", event.event);
            continue;
        }
        if events.send(TransportEvent::Message(event.data)).await.is_err() {
            return Ok(StreamEnd::ListenerGone);
        }
    }
    Ok(StreamEnd::Closed)
}
