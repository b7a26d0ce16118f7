//! Shared fixtures for the integration tests: a test configuration and in-memory
//! stand-ins for the telephony API and the collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use parking_lot::Mutex;
use tower::util::ServiceExt;

use interview_gateway::config::{AuthApiSecret, ControlMode, ServerConfig};
use interview_gateway::core::collaborators::{
    AnswerValidator, ApplicantProfile, CollaboratorResult, InterviewRecord, ProfileExtractor,
    Transcriber, TranscriptSink, Verdict,
};
use interview_gateway::core::dialogue::{
    Collaborators, InterviewScript, PhaseScript, RetryFallback, TranscriptLine,
};
use interview_gateway::core::transport::{TelephonyApi, TransportResult};
use interview_gateway::{AppState, routes};

pub const BASE_URL: &str = "https://voice.example.com";

pub fn test_config(recordings_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        public_base_url: Some(BASE_URL.to_string()),
        control_mode: ControlMode::Local,
        control_timeout: Duration::from_secs(5),
        twilio_account_sid: Some("AC123".to_string()),
        twilio_auth_token: Some("token".to_string()),
        twilio_api_base_url: "https://api.twilio.com".to_string(),
        say_voice: "alice".to_string(),
        say_language: "ko-KR".to_string(),
        record_max_length_secs: 20,
        record_finish_on_key: "#".to_string(),
        pause_length_secs: 1,
        speech_timeout: Duration::from_secs(5),
        recording_timeout: Duration::from_secs(5),
        recording_poll_timeout: Duration::from_secs(2),
        recording_poll_interval: Duration::from_millis(20),
        max_retries_per_phase: 3,
        retry_fallback: RetryFallback::EndCall,
        recordings_dir: recordings_dir.to_path_buf(),
        script_path: None,
        openai_api_key: None,
        openai_model: "gpt-4o-mini".to_string(),
        openai_base_url: "https://api.openai.com/v1".to_string(),
        transcript_correction: false,
        profile_tagging: false,
        rtzr_api_id: None,
        rtzr_api_key: None,
        rtzr_base_url: "https://openapi.vito.ai/v1".to_string(),
        auth_api_secrets: vec![AuthApiSecret {
            id: "driver".to_string(),
            secret: "control-secret".to_string(),
        }],
        auth_required: false,
        rate_limit_requests_per_second: 100000,
        rate_limit_burst_size: 100,
    }
}

pub fn two_phase_script() -> Arc<InterviewScript> {
    let mut script = InterviewScript::default();
    script.greeting = vec!["welcome".to_string()];
    script.phases = vec![PhaseScript::new("Q0"), PhaseScript::new("Q1")];
    script.transition = "next".to_string();
    script.closing = "thanks".to_string();
    script.farewell = "bye".to_string();
    Arc::new(script)
}

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
pub struct FakeTelephony {
    pub terminated: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl TelephonyApi for FakeTelephony {
    async fn terminate_call(&self, call_id: &str) -> TransportResult<()> {
        self.terminated.lock().push(call_id.to_string());
        Ok(())
    }

    async fn download_recording(&self, url: &str, dest: &Path) -> TransportResult<u64> {
        let audio = b"RIFF0000WAVE";
        tokio::fs::write(dest, audio).await?;
        self.downloads
            .lock()
            .push((url.to_string(), dest.to_path_buf()));
        Ok(audio.len() as u64)
    }
}

/// Answers "answer 1", "answer 2", ... in order.
#[derive(Default)]
pub struct CountingTranscriber {
    count: Mutex<u32>,
}

#[async_trait]
impl Transcriber for CountingTranscriber {
    async fn transcribe(&self, audio: &Path) -> CollaboratorResult<String> {
        assert!(audio.exists(), "transcriber got a missing file");
        let mut count = self.count.lock();
        *count += 1;
        Ok(format!("answer {}", *count))
    }
}

/// Returns queued verdicts, then accepts everything.
#[derive(Default)]
pub struct QueuedValidator {
    pub verdicts: Mutex<VecDeque<Verdict>>,
}

#[async_trait]
impl AnswerValidator for QueuedValidator {
    async fn validate(&self, _: &str, _: &str, _: &str) -> CollaboratorResult<Verdict> {
        Ok(self.verdicts.lock().pop_front().unwrap_or_else(Verdict::valid))
    }
}

pub struct NameExtractor;

#[async_trait]
impl ProfileExtractor for NameExtractor {
    async fn extract(&self, history: &[TranscriptLine]) -> CollaboratorResult<ApplicantProfile> {
        Ok(ApplicantProfile {
            name: history
                .iter()
                .find(|line| line.text.starts_with("answer"))
                .map(|line| line.text.clone())
                .unwrap_or_default(),
            ..Default::default()
        })
    }
}

#[derive(Default)]
pub struct CapturingSink {
    pub records: Mutex<Vec<InterviewRecord>>,
}

#[async_trait]
impl TranscriptSink for CapturingSink {
    async fn emit(&self, record: &InterviewRecord) -> CollaboratorResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct TestGateway {
    pub state: Arc<AppState>,
    pub app: Router,
    pub telephony: Arc<FakeTelephony>,
    pub validator: Arc<QueuedValidator>,
    pub sink: Arc<CapturingSink>,
}

pub fn gateway(config: ServerConfig, script: Arc<InterviewScript>) -> TestGateway {
    let telephony = Arc::new(FakeTelephony::default());
    let validator = Arc::new(QueuedValidator::default());
    let sink = Arc::new(CapturingSink::default());
    let collaborators = Collaborators {
        transcriber: Arc::new(CountingTranscriber::default()),
        validator: validator.clone(),
        extractor: Arc::new(NameExtractor),
        sink: sink.clone(),
    };

    let state = AppState::assemble(config, script, collaborators, telephony.clone())
        .expect("state should assemble");
    let app = routes::create_app(state.clone());

    TestGateway {
        state,
        app,
        telephony,
        validator,
        sink,
    }
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&body).to_string())
}

/// Act as the provider: poll and answer recordings until the gateway hangs up.
///
/// Returns every `<Say>` text delivered, in order.
pub async fn drive_call(gw: &TestGateway, call_id: &str, max_polls: usize) -> Vec<String> {
    drive_call_with_silence(gw, call_id, max_polls, &[]).await
}

/// Like [`drive_call`], but the caller stays silent on the listed (1-based) recordings:
/// the provider falls through to the redirect without calling the action URL.
pub async fn drive_call_with_silence(
    gw: &TestGateway,
    call_id: &str,
    max_polls: usize,
    silent: &[usize],
) -> Vec<String> {
    let mut said = Vec::new();
    let mut recordings = 0;

    for _ in 0..max_polls {
        if gw.telephony.terminated.lock().iter().any(|id| id == call_id) {
            break;
        }

        let (status, body) = post_form(&gw.app, "/voice", &format!("CallSid={call_id}")).await;
        assert_eq!(status, StatusCode::OK);

        if body.contains("<Hangup") {
            break;
        } else if let Some(text) = extract_say(&body) {
            said.push(text);
        } else if body.contains("<Record") {
            recordings += 1;
            if silent.contains(&recordings) {
                continue;
            }
            let (status, _) = post_form(
                &gw.app,
                "/recording-callback",
                &format!(
                    "CallSid={call_id}&RecordingUrl=https%3A%2F%2Fapi.twilio.com%2Frec%2FRE{recordings}&RecordingDuration=3"
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        } else {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
    said
}

fn extract_say(body: &str) -> Option<String> {
    let start = body.find("<Say")?;
    let open_end = start + body[start..].find('>')? + 1;
    let close = open_end + body[open_end..].find("</Say>")?;
    Some(body[open_end..close].to_string())
}

pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}
