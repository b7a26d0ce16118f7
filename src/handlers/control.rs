//! Driver-to-transport control endpoints
//!
//! `POST /say-text` and `POST /listen-to-user` are what [`HttpControlPlane`] calls.
//! They only touch the instruction queue and recording state; the next poll delivers
//! the instruction.
//!
//! [`HttpControlPlane`]: crate::core::transport::HttpControlPlane

use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

use crate::core::session::Instruction;
use crate::core::transport::{ControlAck, ListenRequest, SayTextRequest};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

fn require_call_id(call_sid: &str) -> AppResult<&str> {
    let call_id = call_sid.trim();
    if call_id.is_empty() {
        return Err(AppError::BadRequest("call_sid is required".to_string()));
    }
    Ok(call_id)
}

/// Queue an utterance for a call
pub async fn say_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SayTextRequest>,
) -> AppResult<Json<ControlAck>> {
    let call_id = require_call_id(&request.call_sid)?;
    state
        .registry
        .enqueue(call_id, Instruction::utter(request.text.as_str()))?;
    info!(call_id = %call_id, text = %request.text, "Text enqueued");
    Ok(Json(ControlAck::success("Text enqueued")))
}

/// Start capturing the caller's answer ahead of any queued speech
pub async fn listen_to_user(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ListenRequest>,
) -> AppResult<Json<ControlAck>> {
    let call_id = require_call_id(&request.call_sid)?;
    state.registry.begin_recording(call_id)?;
    info!(call_id = %call_id, "Recording initiated");
    Ok(Json(ControlAck::success("Recording initiated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_call_id() {
        assert_eq!(require_call_id(" CA1 ").unwrap(), "CA1");
        assert!(matches!(require_call_id(""), Err(AppError::BadRequest(_))));
    }
}
