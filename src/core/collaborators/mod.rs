//! External collaborators of the dialogue driver
//!
//! Every collaborator is a single-shot call behind a trait so the driver can be run
//! against real providers or test doubles:
//!
//! | Trait | Contract | Provider |
//! |-------|----------|----------|
//! | [`Transcriber`] | audio file -> text | RTZR batch STT, optionally corrected by OpenAI |
//! | [`AnswerValidator`] | question + answer -> [`Verdict`] | OpenAI chat completion |
//! | [`ProfileExtractor`] | transcript -> [`ApplicantProfile`] | OpenAI chat completion |
//! | [`TranscriptSink`] | finished interview -> downstream pipeline | JSON files |

pub mod openai;
pub mod rtzr;
pub mod sink;
pub mod tags;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::dialogue::TranscriptLine;

pub use openai::{
    CorrectingTranscriber, OpenAiChat, OpenAiConfig, OpenAiProfileExtractor, OpenAiValidator,
};
pub use rtzr::{RtzrConfig, RtzrTranscriber};
pub use sink::FileTranscriptSink;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider reported failure: {0}")]
    Failed(String),

    #[error("gave up after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Outcome of validating one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_valid: bool,
    /// What is missing from the answer when it is not valid
    #[serde(default)]
    pub message: String,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: String::new(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// Structured job-seeker profile extracted from a finished interview.
///
/// Model replies are loosely typed, so every field deserializes leniently: `null`
/// becomes empty, a bare string stands in for a one-item list, and `age` accepts
/// text such as `"67세"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantProfile {
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::age")]
    pub age: Option<u32>,
    #[serde(deserialize_with = "lenient::text")]
    pub location: String,
    #[serde(deserialize_with = "lenient::text")]
    pub available_time: String,
    #[serde(deserialize_with = "lenient::list")]
    pub license: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub preferred_field: Vec<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub health_condition: String,
    #[serde(deserialize_with = "lenient::text")]
    pub career: String,
    #[serde(deserialize_with = "lenient::text")]
    pub education: String,
    /// Region category derived from `location`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_tag: Option<String>,
    /// Job-field categories derived from `preferred_field`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_field_tag: Vec<String>,
}

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(scalar)
                .collect::<Vec<_>>()
                .join(", "),
            other => scalar(other).unwrap_or_default(),
        })
    }

    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(items) => items.into_iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        })
    }

    /// First run of digits, so `"67세"` and `"만 67살"` both read as 67.
    pub fn age<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok(),
            _ => None,
        })
    }
}

/// Everything handed downstream when an interview ends.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewRecord {
    pub call_id: String,
    /// Directory holding this call's recordings
    pub artifact_dir: PathBuf,
    pub history: Vec<TranscriptLine>,
    pub profile: ApplicantProfile,
    /// Whether every phase got an accepted answer
    pub completed: bool,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file. An empty string means nothing intelligible was said.
    async fn transcribe(&self, audio: &Path) -> CollaboratorResult<String>;
}

#[async_trait]
pub trait AnswerValidator: Send + Sync {
    /// Judge `answer` to `question` against the phase's `rubric`.
    async fn validate(
        &self,
        rubric: &str,
        question: &str,
        answer: &str,
    ) -> CollaboratorResult<Verdict>;
}

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    async fn extract(&self, history: &[TranscriptLine]) -> CollaboratorResult<ApplicantProfile>;
}

#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn emit(&self, record: &InterviewRecord) -> CollaboratorResult<()>;
}

/// Stand-in for a collaborator whose credentials are missing.
///
/// Every call fails with [`CollaboratorError::NotConfigured`], which the driver
/// absorbs like any other collaborator failure.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl Transcriber for Unconfigured {
    async fn transcribe(&self, _audio: &Path) -> CollaboratorResult<String> {
        Err(CollaboratorError::NotConfigured(self.0))
    }
}

#[async_trait]
impl AnswerValidator for Unconfigured {
    async fn validate(&self, _: &str, _: &str, _: &str) -> CollaboratorResult<Verdict> {
        Err(CollaboratorError::NotConfigured(self.0))
    }
}

#[async_trait]
impl ProfileExtractor for Unconfigured {
    async fn extract(&self, _history: &[TranscriptLine]) -> CollaboratorResult<ApplicantProfile> {
        Err(CollaboratorError::NotConfigured(self.0))
    }
}
