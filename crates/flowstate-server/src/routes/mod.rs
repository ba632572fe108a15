pub mod health;
pub mod notifications;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::hub::NotificationHub;

pub struct InnerAppState {
    pub hub: NotificationHub,
    pub auth: Option<Arc<AuthConfig>>,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(hub: NotificationHub, auth: Option<Arc<AuthConfig>>) -> Router {
    let state = Arc::new(InnerAppState { hub, auth });

    let public = Router::new().merge(health::routes());

    let protected = Router::new()
        .merge(notifications::routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The desktop shell loads the UI from its own origin and reads the
    // stream cross-origin.
    public
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
