//! Telephony transport boundary
//!
//! - `twiml` - webhook reply documents (say, record, pause, hang up)
//! - `control` - driver-to-transport control plane (HTTP self-calls or in-process)
//! - `telephony` - provider REST API (call termination, recording download)
//! - `facade` - per-call `speak` / `listen` / `hang_up` used by the dialogue driver

pub mod control;
pub mod error;
pub mod facade;
pub mod telephony;
pub mod twiml;

pub use control::{
    ControlAck, ControlPlane, HttpControlPlane, LISTEN_PATH, ListenRequest, LocalControlPlane,
    SAY_TEXT_PATH, SayTextRequest,
};
pub use error::{TransportError, TransportResult};
pub use facade::{CallIo, CallTransport, TransportTimeouts};
pub use telephony::{DEFAULT_TWILIO_API_BASE_URL, TelephonyApi, TwilioApi, TwilioCredentials};
pub use twiml::{DirectiveSettings, TwimlRenderer};
