pub mod auth;
pub mod hub;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use auth::AuthConfig;
use hub::NotificationHub;

pub use routes::build_router;

pub async fn serve(
    listener: TcpListener,
    hub: NotificationHub,
    auth: Option<Arc<AuthConfig>>,
) -> Result<()> {
    let app = routes::build_router(hub, auth);
    axum::serve(listener, app).await?;
    Ok(())
}
