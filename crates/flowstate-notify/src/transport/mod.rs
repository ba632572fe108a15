pub mod mock;
pub mod sse;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use mock::MockTransport;
pub use sse::{ReconnectPolicy, SseTransport};

/// One thing that happened on the push stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is up (sent again after every reconnect).
    Open,
    /// Raw data payload of one event.
    Message(String),
    /// The connection failed or dropped.
    Error(String),
}

/// A source of server-pushed notification events.
///
/// `subscribe` must be called from within a tokio runtime. Events are sent
/// in the order the server produced them until the returned subscription
/// is disposed.
pub trait NotificationTransport: Send + Sync {
    fn subscribe(&self, events: mpsc::Sender<TransportEvent>) -> Subscription;
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Handle to an open stream subscription.
///
/// Closing is synchronous and idempotent: the pump task is cancelled and
/// aborted and the close hook runs before `dispose` returns. Dropping the
/// handle closes it too.
pub struct Subscription {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    on_close: Option<CloseHook>,
}

impl Subscription {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            task: None,
            on_close: None,
        }
    }

    /// Abort `task` when the subscription closes.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Run `hook` once when the subscription closes.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn dispose(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
