//! Recording state for the capture of one answer.

use parking_lot::Mutex;
use serde::Serialize;

/// Retrieval handle reported by the transport once a capture finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingHandle {
    /// Where the audio content can be fetched from
    pub url: String,
    /// Length of the capture in seconds
    pub duration_secs: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecordingState {
    #[default]
    Absent,
    Pending,
    Ready(RecordingHandle),
    Failed,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Pending => "pending",
            Self::Ready(_) => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Lock-guarded [`RecordingState`] cell shared by the driver and the webhook handlers.
#[derive(Debug, Default)]
pub struct RecordingSlot {
    state: Mutex<RecordingState>,
}

impl RecordingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new capture was requested; any previous result is discarded.
    pub fn begin(&self) {
        *self.state.lock() = RecordingState::Pending;
    }

    pub fn complete(&self, handle: RecordingHandle) {
        *self.state.lock() = RecordingState::Ready(handle);
    }

    /// Give up on a pending capture. A result that already arrived is kept.
    ///
    /// Returns `true` if the state moved to [`RecordingState::Failed`].
    pub fn fail_pending(&self) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, RecordingState::Pending) {
            *state = RecordingState::Failed;
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> RecordingState {
        self.state.lock().clone()
    }

    pub fn reset(&self) {
        *self.state.lock() = RecordingState::Absent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> RecordingHandle {
        RecordingHandle {
            url: "https://api.example.com/rec/RE1".to_string(),
            duration_secs: 4,
        }
    }

    #[test]
    fn test_lifecycle() {
        let slot = RecordingSlot::new();
        assert_eq!(slot.snapshot(), RecordingState::Absent);

        slot.begin();
        assert_eq!(slot.snapshot(), RecordingState::Pending);

        slot.complete(handle());
        assert_eq!(slot.snapshot(), RecordingState::Ready(handle()));
    }

    #[test]
    fn test_fail_only_moves_pending() {
        let slot = RecordingSlot::new();
        assert!(!slot.fail_pending());

        slot.begin();
        assert!(slot.fail_pending());
        assert_eq!(slot.snapshot(), RecordingState::Failed);

        slot.begin();
        slot.complete(handle());
        assert!(!slot.fail_pending());
        assert_eq!(slot.snapshot().as_str(), "ready");
    }

    #[test]
    fn test_begin_discards_previous_result() {
        let slot = RecordingSlot::new();
        slot.complete(handle());
        slot.begin();
        assert_eq!(slot.snapshot(), RecordingState::Pending);
    }
}
