use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use flowstate_notify::config::NotifyConfig;
use flowstate_notify::platform::DesktopPlatform;
use flowstate_notify::shutdown::{shutdown_runtime, SHUTDOWN_GRACE};
use flowstate_notify::transport::SseTransport;
use flowstate_notify::{ListenerStatus, NotificationListener, PermissionSession};
use flowstate_service::NotificationService;
use tracing::{info, warn};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = NotifyConfig::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(config));
    // A consent prompt may still be blocked on stdin.
    shutdown_runtime(runtime, SHUTDOWN_GRACE);
    result
}

async fn run(config: NotifyConfig) -> Result<()> {
    info!("flowstate-notify starting");
    info!("server: {}", config.server_url);

    let service = config.service();
    if let Err(e) = service.health_check().await {
        // Not fatal: the transport keeps trying per the reconnect policy.
        warn!("server not reachable yet: {e}");
    }

    let platform = Arc::new(DesktopPlatform::new(
        "flowstate",
        config.allow_notifications,
        config.notification_timeout_ms,
    ));
    let transport = Arc::new(SseTransport::new(service, config.reconnect_policy()));
    let listener = NotificationListener::new(platform, transport, PermissionSession::new());

    let mounted = listener.mount();
    let mut status = mounted.status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                info!("listener {current}");
                if matches!(current, ListenerStatus::Disabled(_) | ListenerStatus::Closed) {
                    break;
                }
            }
        }
    }
    mounted.unmount();
    Ok(())
}
