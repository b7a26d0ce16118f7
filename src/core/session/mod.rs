//! Call-session coordination primitives
//!
//! - `signal` - single-slot rendezvous signal with clear-on-consume semantics
//! - `queue` - per-call instruction queue with priority insertion for recordings
//! - `recording` - per-call recording state
//! - `registry` - process-wide call session registry owning creation and teardown

pub mod queue;
pub mod recording;
pub mod registry;
pub mod signal;

pub use queue::{Instruction, InstructionQueue};
pub use recording::{RecordingHandle, RecordingSlot, RecordingState};
pub use registry::{CallChannel, CallRegistry, CallSession, DriverLauncher, RegistryError};
pub use signal::{Signal, SignalError};
