use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values given here override
/// environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8001
///
/// telephony:
///   public_base_url: "https://voice.example.com"
///   control_mode: "http"
///   twilio_account_sid: "AC..."
///   twilio_auth_token: "..."
///
/// directives:
///   voice: "alice"
///   language: "ko-KR"
///   record_max_length_secs: 20
///   finish_on_key: "#"
///
/// dialogue:
///   speech_timeout_seconds: 120
///   recording_timeout_seconds: 90
///   recording_poll_timeout_seconds: 30
///   recording_poll_interval_ms: 500
///   max_retries_per_phase: 3
///   retry_fallback: "end_call"
///
/// interview:
///   recordings_dir: "/var/lib/interview/recordings"
///   script_path: "/etc/interview/script.yaml"
///
/// providers:
///   openai_api_key: "sk-..."
///   openai_model: "gpt-4o-mini"
///   transcript_correction: true
///   rtzr_api_id: "..."
///   rtzr_api_key: "..."
///
/// auth:
///   required: true
///   api_secrets:
///     - id: "driver"
///       secret: "your-api-secret"
///
/// security:
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub telephony: Option<TelephonyYaml>,
    pub directives: Option<DirectivesYaml>,
    pub dialogue: Option<DialogueYaml>,
    pub interview: Option<InterviewYaml>,
    pub providers: Option<ProvidersYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Telephony provider and callback settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelephonyYaml {
    pub public_base_url: Option<String>,
    pub control_mode: Option<String>,
    pub control_timeout_seconds: Option<u64>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_base_url: Option<String>,
}

/// Directive rendering from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DirectivesYaml {
    pub voice: Option<String>,
    pub language: Option<String>,
    pub record_max_length_secs: Option<u32>,
    pub finish_on_key: Option<String>,
    pub pause_length_secs: Option<u32>,
}

/// Dialogue timing and retry policy from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DialogueYaml {
    pub speech_timeout_seconds: Option<u64>,
    pub recording_timeout_seconds: Option<u64>,
    pub recording_poll_timeout_seconds: Option<u64>,
    pub recording_poll_interval_ms: Option<u64>,
    pub max_retries_per_phase: Option<u32>,
    pub retry_fallback: Option<String>,
}

/// Artifact storage and script location from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InterviewYaml {
    pub recordings_dir: Option<String>,
    pub script_path: Option<String>,
}

/// Collaborator credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub transcript_correction: Option<bool>,
    pub profile_tagging: Option<bool>,
    pub rtzr_api_id: Option<String>,
    pub rtzr_api_key: Option<String>,
    pub rtzr_base_url: Option<String>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    /// Preferred multi-secret form. If non-empty, it takes precedence over api_secret.
    pub api_secrets: Vec<AuthApiSecretYaml>,
    /// Legacy single-secret alias. Ignored when api_secrets is non-empty.
    pub api_secret: Option<String>,
}

/// API secret authentication entry in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Rate limiting from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}
