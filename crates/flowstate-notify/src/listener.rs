//! Bridges the server's notification stream to native notifications.
//!
//! Startup runs on a spawned task: probe the platform, settle permission
//! through the session, then open exactly one stream subscription. Every
//! step after a suspension point re-checks the cancellation token, so a
//! listener unmounted mid-startup never connects on its own behalf.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use flowstate_core::NotificationRequest;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::platform::NotificationPlatform;
use crate::session::PermissionSession;
use crate::transport::{NotificationTransport, Subscription, TransportEvent};
use crate::NotifyError;

/// Events buffered between the transport and the sink.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    CapabilityUnavailable,
    PermissionDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Starting,
    AwaitingPermission,
    /// Subscribed, and the stream is open as far as the transport has said.
    Listening,
    /// Stream dropped; the transport may be waiting to reconnect.
    Reconnecting,
    Disabled(DisabledReason),
    Closed,
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerStatus::Starting => f.write_str("starting"),
            ListenerStatus::AwaitingPermission => f.write_str("awaiting permission"),
            ListenerStatus::Listening => f.write_str("listening"),
            ListenerStatus::Reconnecting => f.write_str("reconnecting"),
            ListenerStatus::Disabled(DisabledReason::CapabilityUnavailable) => {
                f.write_str("disabled (notifications unavailable)")
            }
            ListenerStatus::Disabled(DisabledReason::PermissionDenied) => {
                f.write_str("disabled (permission denied)")
            }
            ListenerStatus::Closed => f.write_str("closed"),
        }
    }
}

type ConnectionSlot = Arc<Mutex<Option<Subscription>>>;

fn lock_slot(slot: &ConnectionSlot) -> MutexGuard<'_, Option<Subscription>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Never overwrite `Closed`: teardown may race with a startup step.
fn set_status(status: &watch::Sender<ListenerStatus>, next: ListenerStatus) {
    status.send_if_modified(|current| {
        if *current == ListenerStatus::Closed || *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// Forwards server-pushed notification requests to the platform sink.
#[derive(Clone)]
pub struct NotificationListener {
    platform: Arc<dyn NotificationPlatform>,
    transport: Arc<dyn NotificationTransport>,
    session: PermissionSession,
}

/// How startup ended when it did not fail.
enum Startup {
    Listening(mpsc::Receiver<TransportEvent>),
    TornDown,
}

impl NotificationListener {
    pub fn new(
        platform: Arc<dyn NotificationPlatform>,
        transport: Arc<dyn NotificationTransport>,
        session: PermissionSession,
    ) -> Self {
        Self {
            platform,
            transport,
            session,
        }
    }

    /// Start the listener. Returns immediately; startup continues on a
    /// spawned task. Must be called from within a tokio runtime.
    pub fn mount(&self) -> MountedListener {
        let token = CancellationToken::new();
        let slot: ConnectionSlot = Arc::new(Mutex::new(None));
        let (status_tx, status_rx) = watch::channel(ListenerStatus::Starting);
        let status_tx = Arc::new(status_tx);

        let this = self.clone();
        tokio::spawn({
            let token = token.clone();
            let slot = slot.clone();
            let status = status_tx.clone();
            async move { this.run(token, slot, status).await }
        });

        MountedListener {
            token,
            slot,
            status_tx,
            status_rx,
        }
    }

    async fn run(
        self,
        token: CancellationToken,
        slot: ConnectionSlot,
        status: Arc<watch::Sender<ListenerStatus>>,
    ) {
        let events = match self.start(&token, &slot, &status).await {
            Ok(Startup::Listening(events)) => events,
            Ok(Startup::TornDown) => {
                debug!("listener unmounted during startup");
                return;
            }
            Err(e) => {
                let reason = match e {
                    NotifyError::PermissionDenied => DisabledReason::PermissionDenied,
                    _ => DisabledReason::CapabilityUnavailable,
                };
                info!("desktop notifications off for this session: {e}");
                set_status(&status, ListenerStatus::Disabled(reason));
                return;
            }
        };

        self.listen(events, &token, &status).await;

        // Stream ended on its own (or we were torn down): release it here too.
        if let Some(subscription) = lock_slot(&slot).take() {
            subscription.dispose();
        }
        set_status(&status, ListenerStatus::Closed);
    }

    async fn start(
        &self,
        token: &CancellationToken,
        slot: &ConnectionSlot,
        status: &watch::Sender<ListenerStatus>,
    ) -> Result<Startup, NotifyError> {
        let probe = tokio::select! {
            _ = token.cancelled() => return Ok(Startup::TornDown),
            probe = self.platform.probe() => probe,
        };
        match probe {
            Ok(true) => {}
            Ok(false) => return Err(NotifyError::CapabilityUnavailable),
            Err(e) => {
                debug!("{} capability probe failed: {e}", self.platform.name());
                return Err(NotifyError::CapabilityUnavailable);
            }
        }
        if token.is_cancelled() {
            return Ok(Startup::TornDown);
        }

        set_status(status, ListenerStatus::AwaitingPermission);
        // Not raced against the token: the answer belongs to the session and
        // is recorded even if this instance is gone by the time it arrives.
        let permission = self.session.resolve(self.platform.as_ref()).await;
        if token.is_cancelled() {
            return Ok(Startup::TornDown);
        }
        if !permission.is_granted() {
            return Err(NotifyError::PermissionDenied);
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        {
            let mut connection = lock_slot(slot);
            // Teardown cancels before taking this lock, so checking under it
            // closes the window between the check and the subscribe.
            if token.is_cancelled() {
                return Ok(Startup::TornDown);
            }
            if let Some(previous) = connection.take() {
                previous.dispose();
            }
            *connection = Some(self.transport.subscribe(tx));
        }
        set_status(status, ListenerStatus::Listening);
        info!("listening for task notifications");
        Ok(Startup::Listening(rx))
    }

    async fn listen(
        &self,
        mut events: mpsc::Receiver<TransportEvent>,
        token: &CancellationToken,
        status: &watch::Sender<ListenerStatus>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("notification stream ended");
                        return;
                    }
                },
            };
            match event {
                TransportEvent::Open => {
                    debug!("notification stream open");
                    set_status(status, ListenerStatus::Listening);
                }
                TransportEvent::Error(e) => {
                    warn!("{}", NotifyError::Transport(e));
                    set_status(status, ListenerStatus::Reconnecting);
                }
                TransportEvent::Message(data) => self.deliver(&data, token).await,
            }
        }
    }

    async fn deliver(&self, data: &str, token: &CancellationToken) {
        let request = match NotificationRequest::from_json(data) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping message: {}", NotifyError::from(e));
                return;
            }
        };
        if token.is_cancelled() {
            return;
        }
        debug!(
            "{} notification for run {} (project {}, issue {})",
            request.kind, request.task_run_id, request.project_id, request.issue_id
        );
        if let Err(e) = self
            .platform
            .send_notification(&request.title, &request.body)
            .await
        {
            warn!("dropping notification for run {}: {e}", request.task_run_id);
        }
    }
}

/// A mounted listener. Unmounting (explicitly or by drop) closes the
/// stream connection before returning.
pub struct MountedListener {
    token: CancellationToken,
    slot: ConnectionSlot,
    status_tx: Arc<watch::Sender<ListenerStatus>>,
    status_rx: watch::Receiver<ListenerStatus>,
}

impl MountedListener {
    pub fn status(&self) -> watch::Receiver<ListenerStatus> {
        self.status_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        lock_slot(&self.slot).is_some()
    }

    pub fn unmount(self) {}

    fn teardown(&mut self) {
        self.token.cancel();
        if let Some(subscription) = lock_slot(&self.slot).take() {
            subscription.dispose();
            debug!("notification stream closed");
        }
        self.status_tx.send_replace(ListenerStatus::Closed);
    }
}

impl Drop for MountedListener {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use flowstate_core::PermissionState;

    use super::*;
    use crate::platform::MockPlatform;
    use crate::transport::MockTransport;

    const BUILD_DONE: &str = r#"{"type":"completed","title":"Build done","body":"Task X finished","taskRunId":"t1","projectId":"p1","issueId":"i1"}"#;

    fn listener(
        platform: &Arc<MockPlatform>,
        transport: &MockTransport,
        session: &PermissionSession,
    ) -> NotificationListener {
        NotificationListener::new(
            platform.clone(),
            Arc::new(transport.clone()),
            session.clone(),
        )
    }

    async fn wait_for(mounted: &MountedListener, want: ListenerStatus) {
        let mut status = mounted.status();
        tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == want))
            .await
            .expect("status never reached")
            .expect("status channel closed");
    }

    /// Let every spawned task run until idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_never_connects() {
        for platform in [MockPlatform::unavailable(), MockPlatform::probe_error("no dbus")] {
            let platform = Arc::new(platform);
            let transport = MockTransport::new();
            let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();

            wait_for(
                &mounted,
                ListenerStatus::Disabled(DisabledReason::CapabilityUnavailable),
            )
            .await;
            assert_eq!(platform.probes(), 1);
            assert_eq!(platform.permission_queries(), 0);
            assert_eq!(transport.subscribe_count(), 0);
            assert!(!mounted.is_connected());
            mounted.unmount();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn granted_permission_connects_without_prompt() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();

        wait_for(&mounted, ListenerStatus::Listening).await;
        assert_eq!(platform.permission_requests(), 0);
        assert_eq!(transport.subscribe_count(), 1);
        assert!(mounted.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_prompt_is_not_repeated_within_session() {
        let platform = Arc::new(MockPlatform::prompting(PermissionState::Denied));
        let transport = MockTransport::new();
        let session = PermissionSession::new();

        let first = listener(&platform, &transport, &session).mount();
        wait_for(&first, ListenerStatus::Disabled(DisabledReason::PermissionDenied)).await;
        first.unmount();

        let second = listener(&platform, &transport, &session).mount();
        wait_for(&second, ListenerStatus::Disabled(DisabledReason::PermissionDenied)).await;

        assert_eq!(platform.permission_requests(), 1);
        assert_eq!(transport.subscribe_count(), 0);
        assert_eq!(session.current().await, PermissionState::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn granted_prompt_connects() {
        let platform = Arc::new(MockPlatform::prompting(PermissionState::Granted));
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();

        wait_for(&mounted, ListenerStatus::Listening).await;
        assert_eq!(platform.permission_requests(), 1);
        assert_eq!(transport.subscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn well_formed_message_reaches_sink_once() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;

        assert!(transport.emit_message(BUILD_DONE).await);
        settle().await;

        assert_eq!(
            platform.sent(),
            vec![("Build done".to_string(), "Task X finished".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_message_is_dropped_and_listening_continues() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;

        assert!(transport.emit_message("this is not json").await);
        assert!(transport.emit_message(r#"{"type":"completed"}"#).await);
        assert!(transport.emit_message(BUILD_DONE).await);
        settle().await;

        assert_eq!(platform.sent().len(), 1);
        assert_eq!(platform.sent()[0].0, "Build done");
        assert_eq!(*mounted.status().borrow(), ListenerStatus::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_delivered_in_order() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;

        for title in ["one", "two", "three"] {
            let payload = BUILD_DONE.replace("Build done", title);
            assert!(transport.emit_message(&payload).await);
        }
        settle().await;

        let titles: Vec<String> = platform.sent().into_iter().map(|(t, _)| t).collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_failure_keeps_stream_open() {
        let platform = Arc::new(MockPlatform::granted().failing_sends());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;

        assert!(transport.emit_message(BUILD_DONE).await);
        settle().await;
        assert!(platform.sent().is_empty());
        assert!(transport.is_open());

        platform.set_failing_sends(false);
        assert!(transport.emit_message(BUILD_DONE).await);
        settle().await;
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_does_not_stop_listening() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;

        assert!(transport.emit(TransportEvent::Error("connection reset".into())).await);
        wait_for(&mounted, ListenerStatus::Reconnecting).await;
        assert!(mounted.is_connected());

        assert!(transport.emit(TransportEvent::Open).await);
        wait_for(&mounted, ListenerStatus::Listening).await;
        assert!(transport.emit_message(BUILD_DONE).await);
        settle().await;

        assert_eq!(platform.sent().len(), 1);
        assert_eq!(*mounted.status().borrow(), ListenerStatus::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_closes_connection_and_stops_delivery() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        wait_for(&mounted, ListenerStatus::Listening).await;
        let status = mounted.status();

        mounted.unmount();
        assert!(!transport.is_open());
        assert_eq!(*status.borrow(), ListenerStatus::Closed);

        assert!(!transport.emit_message(BUILD_DONE).await);
        settle().await;
        assert!(platform.sent().is_empty());
        assert_eq!(transport.peak_open(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_during_permission_prompt_never_connects() {
        let (platform, gate) = MockPlatform::prompting(PermissionState::Granted).hold_permission();
        let platform = Arc::new(platform);
        let transport = MockTransport::new();
        let session = PermissionSession::new();
        let mounted = listener(&platform, &transport, &session).mount();

        wait_for(&mounted, ListenerStatus::AwaitingPermission).await;
        settle().await;
        assert_eq!(platform.permission_requests(), 1);

        let status = mounted.status();
        mounted.unmount();
        gate.release();
        settle().await;

        assert_eq!(transport.subscribe_count(), 0);
        assert!(platform.sent().is_empty());
        assert_eq!(*status.borrow(), ListenerStatus::Closed);
        // The user's answer still counts for the session.
        assert_eq!(session.current().await, PermissionState::Granted);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_before_probe_completes_is_quiet() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let mounted = listener(&platform, &transport, &PermissionSession::new()).mount();
        // Tear down before the startup task has run at all.
        drop(mounted);
        settle().await;
        assert_eq!(transport.subscribe_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remount_opens_fresh_single_connection() {
        let platform = Arc::new(MockPlatform::granted());
        let transport = MockTransport::new();
        let session = PermissionSession::new();

        let first = listener(&platform, &transport, &session).mount();
        wait_for(&first, ListenerStatus::Listening).await;
        first.unmount();

        let second = listener(&platform, &transport, &session).mount();
        wait_for(&second, ListenerStatus::Listening).await;

        assert_eq!(transport.subscribe_count(), 2);
        assert_eq!(transport.peak_open(), 1);
        // Session already granted: the platform is not asked again.
        assert_eq!(platform.permission_queries(), 1);
    }
}
