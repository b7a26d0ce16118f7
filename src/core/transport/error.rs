use std::time::Duration;

use thiserror::Error;

use crate::core::session::{RegistryError, SignalError};

/// Errors raised between the dialogue driver and the telephony transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No public base URL is configured, so no instruction can ever reach the caller
    #[error("public base URL is not configured")]
    MissingBaseUrl,

    #[error("telephony credentials are not configured")]
    MissingCredentials,

    #[error("call {0} is no longer active")]
    CallEnded(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response ({status}): {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("control request rejected: {0}")]
    Rejected(String),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { waited: Duration, what: &'static str },

    #[error("call session cancelled")]
    Cancelled,

    #[error("recording failed before it became available")]
    RecordingFailed,

    #[error("artifact I/O failed: {0}")]
    Io(String),

    #[error("failed to render directive: {0}")]
    Render(String),
}

impl TransportError {
    /// Errors after which no further instruction can be delivered for the call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingBaseUrl | Self::CallEnded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn from_signal(err: SignalError, what: &'static str) -> Self {
        match err {
            SignalError::Cancelled => Self::Cancelled,
            SignalError::TimedOut(waited) => Self::Timeout { waited, what },
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<RegistryError> for TransportError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CallEnded(id) => Self::CallEnded(id),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TransportError::MissingBaseUrl.is_fatal());
        assert!(TransportError::CallEnded("CA1".into()).is_fatal());
        assert!(!TransportError::Network("reset".into()).is_fatal());
        assert!(!TransportError::Cancelled.is_fatal());
    }

    #[test]
    fn test_from_signal() {
        assert!(TransportError::from_signal(SignalError::Cancelled, "speech").is_cancelled());
        let err = TransportError::from_signal(
            SignalError::TimedOut(Duration::from_secs(2)),
            "speech delivery",
        );
        assert_eq!(
            err.to_string(),
            "timed out after 2s waiting for speech delivery"
        );
    }
}
