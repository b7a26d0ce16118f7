//! Interview script
//!
//! Everything the driver says comes from an [`InterviewScript`]: the greeting, one
//! question per phase, and the fixed lines used around validation, retries and the end
//! of the call. Scripts load from YAML; [`InterviewScript::default`] is the built-in
//! Korean job-seeker interview.
//!
//! ```yaml
//! greeting:
//!   - "안녕하세요."
//! phases:
//!   - question: "성함이 어떻게 되시나요?"
//!     rubric: "이름이 포함되어 있으면 유효합니다."
//! ```
//!
//! Keys that are left out fall back to the built-in defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Failed to read script file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse script file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid script: {0}")]
    Invalid(String),
}

/// One question slot of the interview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseScript {
    pub question: String,
    /// Validation instructions for this phase; the script-wide rubric when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
}

impl PhaseScript {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            rubric: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewScript {
    pub greeting: Vec<String>,
    pub phases: Vec<PhaseScript>,
    /// Rubric used by phases without their own
    pub rubric: String,
    /// Spoken when no usable answer was captured
    pub apology: String,
    /// Spoken before the validator's explanation on a negative verdict
    pub insufficient_prefix: String,
    /// Spoken instead of an explanation when the validator gave none
    pub retry_prompt: String,
    /// Spoken between phases
    pub transition: String,
    /// Spoken when a phase is skipped after too many attempts
    pub skip_notice: String,
    /// Spoken before hanging up after too many attempts
    pub give_up: String,
    pub closing: String,
    pub farewell: String,
    /// Appended to the transcript when the conversation ends
    pub end_marker: String,
    /// Marker recorded in place of an answer for a skipped phase
    pub unanswered_marker: String,
    /// Instructions for the profile extractor
    pub extraction_prompt: String,
}

impl Default for InterviewScript {
    fn default() -> Self {
        let phases = [
            "어르신, 먼저 성함이 어떻게 되시나요?",
            "올해 연세가 어떻게 되시나요?",
            "현재 살고 계신 지역은 어디인가요? 시나 구 단위로 말씀해주세요.",
            "일하실 수 있는 요일과 시간대를 말씀해주세요.",
            "가지고 계신 자격증이나 면허가 있으시면 말씀해주세요. 없으시면 없다고 말씀해주세요.",
            "어떤 분야의 일을 하고 싶으신가요?",
            "현재 건강 상태는 어떠신가요? 일하시는 데 불편한 점이 있으시면 말씀해주세요.",
            "예전에 어떤 일을 하셨는지 주요 경력을 말씀해주세요.",
            "마지막으로 최종 학력을 말씀해주세요.",
        ]
        .into_iter()
        .map(PhaseScript::new)
        .collect();

        Self {
            greeting: vec![
                "안녕하세요. 어르신의 구직을 도와드리기 위해 몇 가지 질문을 드리겠습니다."
                    .to_string(),
                "질문에 대한 답변은 가능한 구체적으로 말씀해주실 수록 최적의 구직 정보를 제공받으실 수 있습니다."
                    .to_string(),
                "그럼 시작하겠습니다.".to_string(),
            ],
            phases,
            rubric: "당신은 고령자 구직 상담원의 질문에 대한 답변이 충분한지 판단합니다. \
                     답변이 질문에서 요구한 정보를 담고 있으면 유효합니다. \
                     '없다'처럼 명확한 부정 답변도 유효합니다. \
                     유효하지 않다면 어떤 정보가 더 필요한지 어르신께 드릴 한 문장으로 설명하세요."
                .to_string(),
            apology: "죄송합니다. 음성이 잘 들리지 않았어요. 다시 한 번 천천히 말씀해주시겠어요?"
                .to_string(),
            insufficient_prefix: "어르신, 말씀주신 내용이 충분하지 않은 것 같아요.".to_string(),
            retry_prompt: "다시 한 번 말씀해주시겠어요?".to_string(),
            transition: "감사합니다. 다음 질문으로 넘어가겠습니다.".to_string(),
            skip_notice: "이 질문은 나중에 다시 여쭙겠습니다.".to_string(),
            give_up: "죄송합니다. 지금은 상담을 계속하기 어려울 것 같아요. 다음에 다시 연락드리겠습니다."
                .to_string(),
            closing: "모든 질문에 대한 답변이 끝나셨습니다. 어르신의 답변을 바탕으로 최적의 구직 정보를 빠른 시일 내에 메세지로 전달해드리겠습니다. 감사합니다."
                .to_string(),
            farewell: "어르신, 대화가 종료되었습니다.".to_string(),
            end_marker: "[대화 종료]".to_string(),
            unanswered_marker: "[답변 없음]".to_string(),
            extraction_prompt: "다음은 고령자 구직 상담 통화 내용입니다. 대화에서 구직자의 정보를 추출하세요."
                .to_string(),
        }
    }
}

impl InterviewScript {
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ScriptError> {
        let script: Self = serde_yaml::from_str(contents)?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.phases.is_empty() {
            return Err(ScriptError::Invalid(
                "at least one phase is required".to_string(),
            ));
        }
        if let Some(index) = self
            .phases
            .iter()
            .position(|p| p.question.trim().is_empty())
        {
            return Err(ScriptError::Invalid(format!(
                "phase {index} has an empty question"
            )));
        }
        Ok(())
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn is_last(&self, phase: usize) -> bool {
        phase + 1 >= self.phases.len()
    }

    pub fn question(&self, phase: usize) -> &str {
        &self.phases[phase].question
    }

    pub fn rubric(&self, phase: usize) -> &str {
        self.phases[phase].rubric.as_deref().unwrap_or(&self.rubric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script() {
        let script = InterviewScript::default();
        assert_eq!(script.phase_count(), 9);
        assert_eq!(script.greeting.len(), 3);
        assert!(script.validate().is_ok());
        assert!(script.is_last(8));
        assert!(!script.is_last(7));
        assert_eq!(script.rubric(0), script.rubric);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let script = InterviewScript::from_yaml(
            r#"
phases:
  - question: "Q0"
  - question: "Q1"
    rubric: "must mention a city"
apology: "sorry"
"#,
        )
        .unwrap();

        assert_eq!(script.phase_count(), 2);
        assert_eq!(script.question(1), "Q1");
        assert_eq!(script.rubric(1), "must mention a city");
        assert_eq!(script.rubric(0), InterviewScript::default().rubric);
        assert_eq!(script.apology, "sorry");
        assert_eq!(script.transition, InterviewScript::default().transition);
    }

    #[test]
    fn test_rejects_empty_phases() {
        assert!(matches!(
            InterviewScript::from_yaml("phases: []"),
            Err(ScriptError::Invalid(_))
        ));
        assert!(matches!(
            InterviewScript::from_yaml("phases:\n  - question: \"  \""),
            Err(ScriptError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "phases:\n  - question: \"Q\"\n").unwrap();
        assert_eq!(InterviewScript::from_file(&path).unwrap().phase_count(), 1);

        assert!(matches!(
            InterviewScript::from_file(&dir.path().join("missing.yaml")),
            Err(ScriptError::Read { .. })
        ));
    }
}
