//! Configuration module for the interview gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use interview_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::dialogue::{DialoguePolicy, RetryFallback};
use crate::core::transport::{DirectiveSettings, TransportTimeouts};

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("{0}")]
    Validation(String),
}

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// How the dialogue driver reaches the transport's control endpoints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// POST to `/say-text` and `/listen-to-user` on the public base URL
    #[default]
    Http,
    /// Write to the in-process registry directly
    Local,
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "Invalid control mode '{other}', expected http or local"
            )),
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Telephony settings (public base URL, Twilio credentials, control mode)
/// - Directive rendering and dialogue timing
/// - Collaborator credentials (OpenAI, RTZR)
/// - Authentication and rate limiting
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // Telephony
    /// Externally reachable base URL the provider calls back into (`SERVER_URL`)
    pub public_base_url: Option<String>,
    pub control_mode: ControlMode,
    pub control_timeout: Duration,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_base_url: String,

    // Directive rendering
    pub say_voice: String,
    pub say_language: String,
    pub record_max_length_secs: u32,
    pub record_finish_on_key: String,
    pub pause_length_secs: u32,

    // Dialogue timing
    pub speech_timeout: Duration,
    pub recording_timeout: Duration,
    pub recording_poll_timeout: Duration,
    pub recording_poll_interval: Duration,
    pub max_retries_per_phase: u32,
    pub retry_fallback: RetryFallback,

    // Artifacts and script
    pub recordings_dir: PathBuf,
    /// Interview script YAML; the built-in script when unset
    pub script_path: Option<PathBuf>,

    // Collaborators
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Run transcripts through an OpenAI correction pass
    pub transcript_correction: bool,
    /// Map location and preferred field onto fixed categories
    pub profile_tagging: bool,
    pub rtzr_api_id: Option<String>,
    pub rtzr_api_key: Option<String>,
    pub rtzr_base_url: String,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.twilio_auth_token {
            token.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.rtzr_api_key {
            key.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults) only
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values (loaded in main.rs at startup)
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Returns true if at least one API secret entry is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Find the API secret identifier that matches a bearer token
    pub fn find_api_secret_id(&self, token: &str) -> Option<&str> {
        crate::auth::match_api_secret_id(token, &self.auth_api_secrets)
    }

    /// Secret the HTTP control plane presents to this server's control endpoints
    pub fn control_secret(&self) -> Option<String> {
        self.auth_api_secrets.first().map(|s| s.secret.clone())
    }

    pub fn directive_settings(&self) -> DirectiveSettings {
        DirectiveSettings {
            voice: self.say_voice.clone(),
            language: self.say_language.clone(),
            record_max_length_secs: self.record_max_length_secs,
            finish_on_key: self.record_finish_on_key.clone(),
            pause_length_secs: self.pause_length_secs,
        }
    }

    pub fn transport_timeouts(&self) -> TransportTimeouts {
        TransportTimeouts {
            speech: self.speech_timeout,
            recording: self.recording_timeout,
            recording_poll: self.recording_poll_timeout,
            recording_poll_interval: self.recording_poll_interval,
        }
    }

    pub fn dialogue_policy(&self) -> DialoguePolicy {
        DialoguePolicy {
            max_retries_per_phase: self.max_retries_per_phase,
            fallback: self.retry_fallback,
        }
    }

    /// Human-readable summary with every secret redacted
    pub fn redacted_summary(&self) -> String {
        fn mask(value: &Option<String>) -> &'static str {
            match value {
                Some(v) if !v.is_empty() => "<set>",
                _ => "<unset>",
            }
        }

        let lines = [
            format!("address: {}", self.address()),
            format!("tls: {}", self.is_tls_enabled()),
            format!(
                "public_base_url: {}",
                self.public_base_url.as_deref().unwrap_or("<unset>")
            ),
            format!("control_mode: {}", self.control_mode),
            format!(
                "twilio_account_sid: {}",
                self.twilio_account_sid.as_deref().unwrap_or("<unset>")
            ),
            format!("twilio_auth_token: {}", mask(&self.twilio_auth_token)),
            format!("twilio_api_base_url: {}", self.twilio_api_base_url),
            format!("say: voice={} language={}", self.say_voice, self.say_language),
            format!(
                "record: max_length={}s finish_on_key={}",
                self.record_max_length_secs, self.record_finish_on_key
            ),
            format!(
                "timeouts: speech={:?} recording={:?} poll={:?} every {:?}",
                self.speech_timeout,
                self.recording_timeout,
                self.recording_poll_timeout,
                self.recording_poll_interval
            ),
            format!(
                "retries: max={} fallback={:?}",
                self.max_retries_per_phase, self.retry_fallback
            ),
            format!("recordings_dir: {}", self.recordings_dir.display()),
            format!(
                "script: {}",
                self.script_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<built-in>".to_string())
            ),
            format!("openai_api_key: {}", mask(&self.openai_api_key)),
            format!("openai_model: {}", self.openai_model),
            format!("rtzr_api_id: {}", mask(&self.rtzr_api_id)),
            format!("rtzr_api_key: {}", mask(&self.rtzr_api_key)),
            format!(
                "auth: required={} secrets={}",
                self.auth_required,
                self.auth_api_secrets.len()
            ),
            format!(
                "rate_limit: {}/s burst {}",
                self.rate_limit_requests_per_second, self.rate_limit_burst_size
            ),
        ];
        lines.join("\n")
    }
}

pub(crate) fn parse_auth_api_secrets_json(json_str: &str) -> Result<Vec<AuthApiSecret>, ConfigError> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> =
        serde_json::from_str(json_str).map_err(|e| ConfigError::InvalidValue {
            key: "AUTH_API_SECRETS_JSON",
            message: e.to_string(),
        })?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}
