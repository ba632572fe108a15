use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowstate_core::PermissionState;
use tokio::sync::Notify;

use super::NotificationPlatform;
use crate::NotifyError;

/// Releases a permission request that a [`MockPlatform`] is holding open.
#[derive(Clone)]
pub struct PermissionGate {
    notify: Arc<Notify>,
}

impl PermissionGate {
    pub fn release(&self) {
        self.notify.notify_one();
    }
}

/// A scripted platform for tests: fixed probe and permission answers,
/// records every notification it is asked to show.
pub struct MockPlatform {
    probe: Result<bool, String>,
    already_granted: bool,
    answer: PermissionState,
    fail_sends: AtomicBool,
    gate: Option<Arc<Notify>>,
    probes: AtomicUsize,
    permission_queries: AtomicUsize,
    permission_requests: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockPlatform {
    fn with(probe: Result<bool, String>, already_granted: bool, answer: PermissionState) -> Self {
        Self {
            probe,
            already_granted,
            answer,
            fail_sends: AtomicBool::new(false),
            gate: None,
            probes: AtomicUsize::new(0),
            permission_queries: AtomicUsize::new(0),
            permission_requests: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Available, permission already granted.
    pub fn granted() -> Self {
        Self::with(Ok(true), true, PermissionState::Granted)
    }

    /// Available, not yet granted; the prompt answers with `answer`.
    pub fn prompting(answer: PermissionState) -> Self {
        Self::with(Ok(true), false, answer)
    }

    /// Probe reports no notification capability.
    pub fn unavailable() -> Self {
        Self::with(Ok(false), false, PermissionState::Denied)
    }

    /// Probe itself fails.
    pub fn probe_error(msg: &str) -> Self {
        Self::with(Err(msg.to_string()), false, PermissionState::Denied)
    }

    /// Make every `send_notification` call fail.
    pub fn failing_sends(self) -> Self {
        self.fail_sends.store(true, Ordering::SeqCst);
        self
    }

    /// Hold `request_permission` open until the returned gate is released.
    pub fn hold_permission(mut self) -> (Self, PermissionGate) {
        let notify = Arc::new(Notify::new());
        self.gate = Some(notify.clone());
        (self, PermissionGate { notify })
    }

    pub fn set_failing_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn permission_queries(&self) -> usize {
        self.permission_queries.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    /// Every (title, body) pair shown so far, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl NotificationPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> Result<bool, NotifyError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probe.clone().map_err(NotifyError::Platform)
    }

    async fn is_permission_granted(&self) -> Result<bool, NotifyError> {
        self.permission_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.already_granted)
    }

    async fn request_permission(&self) -> Result<PermissionState, NotifyError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.answer)
    }

    async fn send_notification(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("mock sink rejected notification".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
