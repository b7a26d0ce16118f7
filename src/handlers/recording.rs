use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::core::session::RecordingState;
use crate::state::AppState;

/// Recording lookup result, tagged by `status`
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordingLookup {
    Ready { recording_url: String },
    Processing { message: String },
    Failed { message: String },
    NotFound { message: String },
}

impl From<RecordingState> for RecordingLookup {
    fn from(state: RecordingState) -> Self {
        match state {
            RecordingState::Ready(handle) => Self::Ready {
                recording_url: handle.url,
            },
            RecordingState::Pending => Self::Processing {
                message: "Recording still pending.".to_string(),
            },
            RecordingState::Failed => Self::Failed {
                message: "Recording did not become available in time.".to_string(),
            },
            RecordingState::Absent => Self::NotFound {
                message: "No recording found or initiated for this Call SID.".to_string(),
            },
        }
    }
}

/// Look up the latest capture of a call
pub async fn get_recording_url(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Json<RecordingLookup> {
    let recording = state.registry.recording_state(&call_id);
    debug!(call_id = %call_id, state = recording.as_str(), "Recording lookup");
    Json(recording.into())
}
