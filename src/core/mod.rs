pub mod artifacts;
pub mod collaborators;
pub mod dialogue;
pub mod session;
pub mod transport;

pub use artifacts::SessionArtifacts;
pub use collaborators::{
    AnswerValidator, ApplicantProfile, CollaboratorError, InterviewRecord, ProfileExtractor,
    Transcriber, TranscriptSink, Verdict,
};
pub use dialogue::{
    Collaborators, DialogueDriver, DialoguePolicy, DriverOutcome, InterviewLauncher,
    InterviewScript, RetryFallback,
};
pub use session::{CallRegistry, CallSession, DriverLauncher, Instruction, RecordingHandle};
pub use transport::{CallIo, CallTransport, TransportError, TransportTimeouts, TwimlRenderer};
