use axum::{Router, routing::post};
use tower_http::trace::TraceLayer;

use crate::core::transport::twiml::{POLL_PATH, RECORDING_CALLBACK_PATH};
use crate::handlers::webhooks;
use crate::state::AppState;
use std::sync::Arc;

/// Create the telephony webhook router
///
/// These routes are called by the provider and are not behind API-secret auth.
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(POLL_PATH, post(webhooks::voice_poll))
        .route(RECORDING_CALLBACK_PATH, post(webhooks::recording_callback))
        .route("/status", post(webhooks::call_status))
        .layer(TraceLayer::new_for_http())
}
