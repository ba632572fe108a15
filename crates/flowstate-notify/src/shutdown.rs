use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::info;

/// How long blocking work (a consent prompt waiting on stdin, a D-Bus
/// call) gets to finish once the listener is unmounted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Shut the runtime down without waiting on blocking tasks past `grace`.
///
/// Dropping a runtime joins its blocking pool with no deadline, so a prompt
/// still reading stdin would keep the process alive until the user hits
/// Enter.
pub fn shutdown_runtime(runtime: Runtime, grace: Duration) {
    info!("shutting down runtime");
    runtime.shutdown_timeout(grace);
}
