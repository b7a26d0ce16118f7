use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CallSummary {
    pub call_id: String,
    /// Zero-based phase the driver is on
    pub phase: usize,
    pub total_phases: usize,
    pub age_secs: u64,
    pub pending_instructions: usize,
    pub recording: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CallsResponse {
    pub count: usize,
    pub calls: Vec<CallSummary>,
}

/// List live call sessions with their progress
pub async fn list_calls(State(state): State<Arc<AppState>>) -> Json<CallsResponse> {
    let total_phases = state.script.phase_count();
    let mut calls: Vec<CallSummary> = state
        .registry
        .sessions()
        .into_iter()
        .map(|session| {
            let call_id = session.id().to_string();
            CallSummary {
                phase: session.phase(),
                total_phases,
                age_secs: session.age().as_secs(),
                pending_instructions: state.registry.pending_instructions(&call_id),
                recording: state.registry.recording_state(&call_id).as_str(),
                call_id,
            }
        })
        .collect();
    calls.sort_by(|a, b| a.call_id.cmp(&b.call_id));

    Json(CallsResponse {
        count: calls.len(),
        calls,
    })
}
