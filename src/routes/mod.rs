pub mod api;
pub mod webhooks;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::handlers;
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Combine the public, webhook and protected routers around `state`.
pub fn create_app(state: Arc<AppState>) -> Router {
    let protected_routes = api::create_api_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(handlers::api::health_check))
        .merge(webhooks::create_webhook_router())
        .merge(protected_routes)
        .with_state(state)
}
