use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::core::transport::{LISTEN_PATH, SAY_TEXT_PATH};
use crate::handlers::{calls, control, recording};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Note: Authentication middleware is applied by [`super::create_app`]
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Driver-to-transport control calls
        .route(SAY_TEXT_PATH, post(control::say_text))
        .route(LISTEN_PATH, post(control::listen_to_user))
        // Introspection
        .route("/calls", get(calls::list_calls))
        .route(
            "/get-recording-url/{call_id}",
            get(recording::get_recording_url),
        )
        .layer(TraceLayer::new_for_http())
}
