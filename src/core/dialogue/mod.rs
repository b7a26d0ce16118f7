//! Interview dialogue
//!
//! - `script` - what is said: greeting, per-phase questions, retry and closing lines
//! - `state` - transcript and phase owned by one call's driver
//! - `driver` - the phase state machine running on top of the transport facade
//! - `launcher` - starts a driver for every new call session

pub mod driver;
pub mod launcher;
pub mod script;
pub mod state;

pub use driver::{
    Collaborators, DialogueDriver, DialoguePolicy, DriverOutcome, EndReason, RetryFallback,
    TurnFailure,
};
pub use launcher::InterviewLauncher;
pub use script::{InterviewScript, PhaseScript, ScriptError};
pub use state::{ConversationState, Speaker, TranscriptLine};
