use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{NotificationTransport, Subscription, TransportEvent};

#[derive(Default)]
struct MockTransportState {
    subscribes: usize,
    open: usize,
    peak_open: usize,
    next_id: u64,
    /// Id and sender of the most recent live subscription.
    live: Option<(u64, mpsc::Sender<TransportEvent>)>,
}

/// An in-memory transport for tests. Tests push events with [`emit`];
/// they only reach a subscriber that has not been disposed.
///
/// [`emit`]: MockTransport::emit
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockTransportState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Total `subscribe` calls so far.
    pub fn subscribe_count(&self) -> usize {
        self.state().subscribes
    }

    pub fn is_open(&self) -> bool {
        self.state().open > 0
    }

    /// Highest number of simultaneously open subscriptions seen.
    pub fn peak_open(&self) -> usize {
        self.state().peak_open
    }

    /// Deliver `event` to the live subscriber. Returns false when there is
    /// none (never subscribed, disposed, or the reader went away).
    pub async fn emit(&self, event: TransportEvent) -> bool {
        let tx = self.state().live.as_ref().map(|(_, tx)| tx.clone());
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub async fn emit_message(&self, data: &str) -> bool {
        self.emit(TransportEvent::Message(data.to_string())).await
    }
}

impl NotificationTransport for MockTransport {
    fn subscribe(&self, events: mpsc::Sender<TransportEvent>) -> Subscription {
        let id = {
            let mut state = self.state();
            state.subscribes += 1;
            state.open += 1;
            state.peak_open = state.peak_open.max(state.open);
            state.next_id += 1;
            let id = state.next_id;
            state.live = Some((id, events));
            id
        };
        let shared = self.state.clone();
        Subscription::new(CancellationToken::new()).on_close(move || {
            let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
            state.open = state.open.saturating_sub(1);
            if matches!(state.live, Some((live_id, _)) if live_id == id) {
                state.live = None;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_until_disposed() {
        let transport = MockTransport::new();
        assert!(!transport.emit_message("before").await);

        let (tx, mut rx) = mpsc::channel(4);
        let sub = transport.subscribe(tx);
        assert!(transport.is_open());
        assert!(transport.emit_message("hello").await);
        assert_eq!(rx.recv().await, Some(TransportEvent::Message("hello".into())));

        sub.dispose();
        assert!(!transport.is_open());
        assert!(!transport.emit_message("after").await);
        assert_eq!(transport.subscribe_count(), 1);
        assert_eq!(transport.peak_open(), 1);
    }
}
