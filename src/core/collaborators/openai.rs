//! OpenAI chat-completion collaborators
//!
//! One [`OpenAiChat`] client is shared by:
//! - [`OpenAiValidator`] - judges an answer against the phase rubric
//! - [`OpenAiProfileExtractor`] - turns the transcript into an [`ApplicantProfile`],
//!   optionally tagging region and job-field categories
//! - [`CorrectingTranscriber`] - cleans up raw speech-to-text output

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::tags::TagKind;
use super::{
    AnswerValidator, ApplicantProfile, CollaboratorError, CollaboratorResult, ProfileExtractor,
    Transcriber, Verdict,
};
use crate::core::dialogue::TranscriptLine;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const CORRECTION_SYSTEM_PROMPT: &str = "당신은 한국어 문장을 교정하는 도우미입니다.";
const CLASSIFIER_SYSTEM_PROMPT: &str = "당신은 입력을 주어진 대분류 중 하나로 분류하는 도우미입니다.";
const DEFAULT_CORRECTION_PROMPT: &str = "다음은 음성 인식으로 받아 적은 문장입니다. 의미는 바꾸지 말고 맞춤법과 띄어쓰기만 자연스럽게 고쳐서 교정된 문장만 출력해주세요.";

const VALIDATION_FORMAT: &str = "반드시 JSON 객체 {\"is_valid\": boolean, \"message\": string} 형식으로만 답하세요. \
     message에는 답변이 유효하지 않은 경우 부족한 정보를 설명하세요.";

const PROFILE_FORMAT: &str = "반드시 JSON 객체로만 답하세요. 키: name(string), age(integer), location(string), \
     available_time(string), license(string 배열), preferred_field(string 배열), \
     health_condition(string), career(string), education(string). 알 수 없는 값은 빈 문자열 또는 빈 배열로 두세요.";

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Drop for OpenAiConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

/// Options for one completion request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Ask for a JSON object reply
    pub json: bool,
}

/// Minimal chat-completions client.
pub struct OpenAiChat {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChat {
    pub fn new(config: OpenAiConfig) -> CollaboratorResult<Self> {
        if config.api_key.is_empty() {
            return Err(CollaboratorError::NotConfigured("openai"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CollaboratorError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a system + user exchange and return the assistant's reply text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> CollaboratorResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: options
                .json
                .then(|| serde_json::json!({"type": "json_object"})),
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<OpenAiErrorResponse>(&body) {
                Ok(err) => format!("{} ({})", err.error.message, err.error.error_type),
                Err(_) => body,
            };
            return Err(CollaboratorError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CollaboratorError::Malformed("completion has no content".to_string()))
    }

    /// Complete and parse the reply as JSON.
    pub async fn complete_json<T: serde::de::DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
    ) -> CollaboratorResult<T> {
        let reply = self
            .complete(
                system,
                user,
                CompletionOptions {
                    temperature: Some(0.0),
                    json: true,
                    ..Default::default()
                },
            )
            .await?;
        Ok(serde_json::from_str(strip_code_fence(&reply))?)
    }
}

/// Models occasionally wrap JSON in a Markdown fence despite the response format.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

// =============================================================================
// Answer validation
// =============================================================================

pub struct OpenAiValidator {
    chat: Arc<OpenAiChat>,
}

impl OpenAiValidator {
    pub fn new(chat: Arc<OpenAiChat>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl AnswerValidator for OpenAiValidator {
    async fn validate(
        &self,
        rubric: &str,
        question: &str,
        answer: &str,
    ) -> CollaboratorResult<Verdict> {
        let system = format!("{rubric}\n\n{VALIDATION_FORMAT}");
        let user = format!("질문: {question} \n답변: {answer}");
        let verdict: Verdict = self.chat.complete_json(&system, &user).await?;
        debug!(is_valid = verdict.is_valid, "Answer validated");
        Ok(verdict)
    }
}

// =============================================================================
// Profile extraction
// =============================================================================

pub struct OpenAiProfileExtractor {
    chat: Arc<OpenAiChat>,
    prompt: String,
    tagging: bool,
}

impl OpenAiProfileExtractor {
    pub fn new(chat: Arc<OpenAiChat>, prompt: impl Into<String>, tagging: bool) -> Self {
        Self {
            chat,
            prompt: prompt.into(),
            tagging,
        }
    }

    async fn classify(&self, kind: TagKind, input: &str) -> Option<String> {
        match self
            .chat
            .complete(
                CLASSIFIER_SYSTEM_PROMPT,
                &kind.prompt(input),
                CompletionOptions {
                    temperature: Some(0.0),
                    max_tokens: Some(16),
                    json: false,
                },
            )
            .await
        {
            Ok(reply) => kind.resolve(&reply),
            Err(e) => {
                warn!(?kind, error = %e, "Tag classification failed");
                None
            }
        }
    }

    async fn tag(&self, profile: &mut ApplicantProfile) {
        if !profile.location.trim().is_empty() {
            profile.location_tag = self.classify(TagKind::Region, &profile.location).await;
        }
        let mut field_tags = Vec::with_capacity(profile.preferred_field.len());
        for field in profile.preferred_field.iter().filter(|f| !f.trim().is_empty()) {
            if let Some(tag) = self.classify(TagKind::Field, field).await {
                field_tags.push(tag);
            }
        }
        profile.preferred_field_tag = field_tags;
    }
}

#[async_trait]
impl ProfileExtractor for OpenAiProfileExtractor {
    async fn extract(&self, history: &[TranscriptLine]) -> CollaboratorResult<ApplicantProfile> {
        let system = format!("{}\n\n{PROFILE_FORMAT}", self.prompt);
        let conversation = history
            .iter()
            .map(TranscriptLine::render)
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!("대화 내용 : {conversation}");

        let mut profile: ApplicantProfile = self.chat.complete_json(&system, &user).await?;
        if self.tagging {
            self.tag(&mut profile).await;
        }
        Ok(profile)
    }
}

// =============================================================================
// Transcript correction
// =============================================================================

/// Wraps a [`Transcriber`] and runs its output through a correction pass.
///
/// A failed correction keeps the raw transcript.
pub struct CorrectingTranscriber<T> {
    inner: T,
    chat: Arc<OpenAiChat>,
    prompt: String,
}

impl<T: Transcriber> CorrectingTranscriber<T> {
    pub fn new(inner: T, chat: Arc<OpenAiChat>, prompt: Option<String>) -> Self {
        Self {
            inner,
            chat,
            prompt: prompt.unwrap_or_else(|| DEFAULT_CORRECTION_PROMPT.to_string()),
        }
    }
}

#[async_trait]
impl<T: Transcriber> Transcriber for CorrectingTranscriber<T> {
    async fn transcribe(&self, audio: &Path) -> CollaboratorResult<String> {
        let raw = self.inner.transcribe(audio).await?;
        if raw.trim().is_empty() {
            return Ok(raw);
        }

        let user = format!("{}\n\"{}\"", self.prompt, raw);
        match self
            .chat
            .complete(
                CORRECTION_SYSTEM_PROMPT,
                &user,
                CompletionOptions {
                    temperature: Some(0.3),
                    max_tokens: Some(256),
                    json: false,
                },
            )
            .await
        {
            Ok(corrected) if !corrected.is_empty() => Ok(corrected.trim_matches('"').to_string()),
            Ok(_) => Ok(raw),
            Err(e) => {
                warn!(error = %e, "Transcript correction failed, keeping raw text");
                Ok(raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dialogue::Speaker;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat(server: &MockServer) -> Arc<OpenAiChat> {
        Arc::new(
            OpenAiChat::new(OpenAiConfig {
                api_key: "sk-test".to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
                base_url: server.uri(),
                timeout: Duration::from_secs(5),
            })
            .unwrap(),
        )
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    #[test]
    fn test_empty_key_is_not_configured() {
        let result = OpenAiChat::new(OpenAiConfig {
            api_key: String::new(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(CollaboratorError::NotConfigured(_))));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_validator_parses_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(completion(
                r#"{"is_valid": false, "message": "나이를 말씀해주세요."}"#,
            ))
            .mount(&server)
            .await;

        let validator = OpenAiValidator::new(chat(&server));
        let verdict = validator
            .validate("rubric", "연세가 어떻게 되세요?", "글쎄요")
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::invalid("나이를 말씀해주세요."));
    }

    #[tokio::test]
    async fn test_validator_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit reached", "type": "requests"}
            })))
            .mount(&server)
            .await;

        let validator = OpenAiValidator::new(chat(&server));
        let err = validator.validate("r", "q", "a").await.unwrap_err();
        match err {
            CollaboratorError::Provider { status, message } => {
                assert_eq!(status, 429);
                assert!(message.contains("Rate limit reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validator_rejects_malformed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion("sure, looks valid"))
            .mount(&server)
            .await;

        let validator = OpenAiValidator::new(chat(&server));
        assert!(matches!(
            validator.validate("r", "q", "a").await,
            Err(CollaboratorError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_extractor_without_tagging() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(completion(
                r#"{"name": "김영희", "age": 68, "location": "수원", "preferred_field": ["요양"]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = OpenAiProfileExtractor::new(chat(&server), "extract", false);
        let history = vec![
            TranscriptLine::new(Speaker::Ai, "성함이 어떻게 되세요?"),
            TranscriptLine::new(Speaker::User, "김영희입니다"),
        ];
        let profile = extractor.extract(&history).await.unwrap();
        assert_eq!(profile.name, "김영희");
        assert_eq!(profile.age, Some(68));
        assert_eq!(profile.location_tag, None);
    }

    #[tokio::test]
    async fn test_correction_failure_keeps_raw_text() {
        struct Fixed;

        #[async_trait]
        impl Transcriber for Fixed {
            async fn transcribe(&self, _audio: &Path) -> CollaboratorResult<String> {
                Ok("안녕 하세요".to_string())
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transcriber = CorrectingTranscriber::new(Fixed, chat(&server), None);
        let text = transcriber.transcribe(Path::new("a.wav")).await.unwrap();
        assert_eq!(text, "안녕 하세요");
    }

    #[tokio::test]
    async fn test_correction_applies() {
        struct Fixed;

        #[async_trait]
        impl Transcriber for Fixed {
            async fn transcribe(&self, _audio: &Path) -> CollaboratorResult<String> {
                Ok("안녕 하세요".to_string())
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"temperature": 0.3, "max_tokens": 256})))
            .respond_with(completion("\"안녕하세요\""))
            .mount(&server)
            .await;

        let transcriber = CorrectingTranscriber::new(Fixed, chat(&server), None);
        let text = transcriber.transcribe(Path::new("a.wav")).await.unwrap();
        assert_eq!(text, "안녕하세요");
    }
}
