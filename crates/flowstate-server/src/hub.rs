use std::sync::Arc;

use chrono::Utc;
use flowstate_core::notification::{NotificationRequest, PublishReceipt};
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of notifications buffered per subscriber before a slow
/// stream starts skipping.
pub const DEFAULT_CAPACITY: usize = 256;

/// A notification as it goes out on the wire: the SSE event id plus the
/// already-encoded JSON payload.
#[derive(Debug, Clone)]
pub struct PublishedNotification {
    pub id: String,
    pub data: String,
}

/// Fan-out point between publishers (task runners) and open
/// `/api/notifications/stream` connections.
///
/// Publishing never blocks and never fails for lack of listeners; a
/// notification published while nobody is connected is simply dropped.
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Arc<PublishedNotification>>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(
        &self,
        request: &NotificationRequest,
    ) -> Result<PublishReceipt, serde_json::Error> {
        let published = PublishedNotification {
            id: uuid::Uuid::new_v4().to_string(),
            data: serde_json::to_string(request)?,
        };
        let id = published.id.clone();
        // Err only means there are no receivers right now.
        let delivered = self.tx.send(Arc::new(published)).unwrap_or(0);
        debug!(
            "published {} notification {id} for run {} to {delivered} subscriber(s)",
            request.kind, request.task_run_id
        );
        Ok(PublishReceipt {
            id,
            delivered,
            published_at: Utc::now(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PublishedNotification>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
