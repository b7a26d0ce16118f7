//! Telephony provider webhooks
//!
//! - `POST /voice` - poll for the next directive of a call
//! - `POST /recording-callback` - a capture finished
//! - `POST /status` - the call changed status
//!
//! All three receive `application/x-www-form-urlencoded` bodies and never block: the
//! poll handler answers from whatever is queued right now.

use axum::{
    Form,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::core::session::{Instruction, RecordingHandle};
use crate::core::transport::twiml;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Statuses after which the provider sends nothing more for the call.
const TERMINAL_STATUSES: [&str; 5] = ["completed", "failed", "busy", "no-answer", "canceled"];

#[derive(Debug, Default, Deserialize)]
pub struct PollForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordingCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration")]
    pub recording_duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

fn twiml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], body).into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Poll for the next directive of a call
///
/// The first poll for an unseen call creates its session, which starts the interview.
/// Every poll pops at most one instruction. Delivering an utterance or a recording
/// directive sets the session's speech signal; an empty queue yields a pause followed
/// by a redirect back here.
pub async fn voice_poll(State(state): State<Arc<AppState>>, Form(form): Form<PollForm>) -> Response {
    let Some(call_id) = non_empty(form.call_sid) else {
        warn!("Poll without CallSid, hanging up");
        return twiml_response(twiml::hangup());
    };

    let session = match state.registry.get_or_create(&call_id) {
        Ok(session) => session,
        Err(e) => {
            info!(call_id = %call_id, error = %e, "Poll for an ended call, hanging up");
            return twiml_response(twiml::hangup());
        }
    };

    let next = state.registry.dequeue_next(&call_id);
    match state.renderer.poll_reply(next.as_ref()) {
        Ok(body) => {
            match &next {
                Some(Instruction::Utter(text)) => {
                    debug!(call_id = %call_id, text = %text, "Delivering utterance");
                    session.speech.set();
                }
                Some(Instruction::StartRecording) => {
                    debug!(call_id = %call_id, "Delivering recording directive");
                    session.speech.set();
                }
                None => debug!(call_id = %call_id, "Queue empty, pausing"),
            }
            twiml_response(body)
        }
        Err(e) => {
            error!(call_id = %call_id, error = %e, "Cannot render directive, hanging up");
            twiml_response(twiml::hangup())
        }
    }
}

/// A capture finished
///
/// `CallSid`, `RecordingUrl` and `RecordingDuration` are all required; a callback
/// missing any of them is rejected without touching the call.
pub async fn recording_callback(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RecordingCallbackForm>,
) -> AppResult<Response> {
    let (Some(call_id), Some(url), Some(duration)) = (
        non_empty(form.call_sid),
        non_empty(form.recording_url),
        non_empty(form.recording_duration),
    ) else {
        warn!("Recording callback with missing fields rejected");
        return Err(AppError::BadRequest("Missing recording data".to_string()));
    };

    let duration_secs: u32 = duration.parse().map_err(|_| {
        warn!(call_id = %call_id, duration = %duration, "Recording callback with invalid duration");
        AppError::BadRequest(format!("Invalid RecordingDuration '{duration}'"))
    })?;

    info!(call_id = %call_id, url = %url, duration_secs, "Recording completed");
    state
        .registry
        .complete_recording(&call_id, RecordingHandle { url, duration_secs });

    let body = match state.renderer.redirect_to_poll() {
        Ok(body) => body,
        Err(e) => {
            error!(call_id = %call_id, error = %e, "Cannot redirect after recording, hanging up");
            twiml::hangup()
        }
    };
    Ok(twiml_response(body))
}

/// The call changed status
///
/// A terminal status tears down the session and cancels its driver.
pub async fn call_status(
    State(state): State<Arc<AppState>>,
    Form(form): Form<StatusForm>,
) -> StatusCode {
    let (Some(call_id), Some(status)) = (non_empty(form.call_sid), non_empty(form.call_status))
    else {
        warn!("Status callback with missing fields ignored");
        return StatusCode::OK;
    };

    info!(call_id = %call_id, status = %status, "Call status changed");
    if TERMINAL_STATUSES.contains(&status.as_str()) && state.registry.remove(&call_id) {
        info!(call_id = %call_id, "Call ended, session cleaned up");
    }
    StatusCode::OK
}
