//! RTZR (VITO) batch speech-to-text client
//!
//! # Protocol
//!
//! 1. `POST /authenticate` with form `client_id` / `client_secret` returns a bearer
//!    token. Tokens are cached and renewed ahead of expiry.
//! 2. `POST /transcribe` multipart `file` + `config` JSON returns a job `id`.
//! 3. `GET /transcribe/{id}` until `status` is `completed` (utterances joined with a
//!    space) or `failed`. `transcribing` keeps polling.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroize;

use super::{CollaboratorError, CollaboratorResult, Transcriber};

pub const DEFAULT_RTZR_BASE_URL: &str = "https://openapi.vito.ai/v1";

#[derive(Clone)]
pub struct RtzrConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub model_name: String,
    pub language: String,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Lifetime assumed for a fresh token
    pub token_lifetime: Duration,
    /// Renew this long before the assumed expiry
    pub token_refresh_margin: Duration,
    pub request_timeout: Duration,
}

impl RtzrConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: DEFAULT_RTZR_BASE_URL.to_string(),
            model_name: "sommers".to_string(),
            language: "ko".to_string(),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
            token_lifetime: Duration::from_secs(3000),
            token_refresh_margin: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl std::fmt::Debug for RtzrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtzrConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl Drop for RtzrConfig {
    fn drop(&mut self) {
        self.client_secret.zeroize();
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    results: Option<JobResults>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JobResults {
    #[serde(default)]
    utterances: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
struct Utterance {
    #[serde(default)]
    msg: String,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl Drop for CachedToken {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

pub struct RtzrTranscriber {
    client: Client,
    config: RtzrConfig,
    token: Mutex<Option<CachedToken>>,
}

impl RtzrTranscriber {
    pub fn new(config: RtzrConfig) -> CollaboratorResult<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(CollaboratorError::NotConfigured("rtzr"));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| CollaboratorError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> CollaboratorResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + self.config.token_refresh_margin < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let response = self
            .client
            .post(self.url("/authenticate"))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;
        let auth: AuthResponse = parse_json(response).await?;

        debug!("Obtained RTZR access token");
        *cached = Some(CachedToken {
            token: auth.access_token.clone(),
            expires_at: Instant::now() + self.config.token_lifetime,
        });
        Ok(auth.access_token)
    }

    async fn submit(&self, audio: &Path, token: &str) -> CollaboratorResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| CollaboratorError::Malformed(format!("Invalid MIME type: {e}")))?;
        let job_config = serde_json::json!({
            "model_name": self.config.model_name,
            "language": self.config.language,
        });
        let form = Form::new()
            .part("file", part)
            .text("config", job_config.to_string());

        let response = self
            .client
            .post(self.url("/transcribe"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let submitted: SubmitResponse = parse_json(response).await?;
        Ok(submitted.id)
    }

    async fn poll(&self, job_id: &str, token: &str) -> CollaboratorResult<String> {
        let deadline = Instant::now() + self.config.poll_timeout;
        let url = self.url(&format!("/transcribe/{job_id}"));

        loop {
            let response = self.client.get(&url).bearer_auth(token).send().await?;
            let job: JobResponse = parse_json(response).await?;

            match job.status.as_str() {
                "completed" => {
                    let text = job
                        .results
                        .unwrap_or_default()
                        .utterances
                        .iter()
                        .map(|u| u.msg.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    return Ok(text.trim().to_string());
                }
                "failed" => {
                    return Err(CollaboratorError::Failed(
                        job.message.unwrap_or_else(|| "transcription failed".to_string()),
                    ));
                }
                "transcribing" => {}
                other => {
                    return Err(CollaboratorError::Malformed(format!(
                        "unknown transcription status: {other}"
                    )));
                }
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(CollaboratorError::Timeout(self.config.poll_timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl Transcriber for RtzrTranscriber {
    async fn transcribe(&self, audio: &Path) -> CollaboratorResult<String> {
        let token = self.access_token().await?;
        let job_id = self.submit(audio, &token).await?;
        debug!(job_id, "Transcription job submitted");

        let text = self.poll(&job_id, &token).await?;
        info!(job_id, chars = text.chars().count(), "Transcription complete");
        Ok(text)
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> CollaboratorResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(CollaboratorError::Provider {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(serde_json::from_str(&body)?)
}
