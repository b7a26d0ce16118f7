//! Environment variable layer of the configuration.

use super::utils::{env_bool, env_parse, env_string};
use super::{AuthApiSecret, ConfigError, parse_auth_api_secrets_json};

/// Every variable the gateway reads.
pub(crate) const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "TLS_ENABLED",
    "TLS_CERT_PATH",
    "TLS_KEY_PATH",
    "SERVER_URL",
    "CONTROL_MODE",
    "CONTROL_TIMEOUT_SECS",
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "TWILIO_API_BASE_URL",
    "SAY_VOICE",
    "SAY_LANGUAGE",
    "RECORD_MAX_LENGTH_SECS",
    "RECORD_FINISH_ON_KEY",
    "PAUSE_LENGTH_SECS",
    "SPEECH_TIMEOUT_SECS",
    "RECORDING_TIMEOUT_SECS",
    "RECORDING_POLL_TIMEOUT_SECS",
    "RECORDING_POLL_INTERVAL_MS",
    "MAX_RETRIES_PER_PHASE",
    "RETRY_FALLBACK",
    "RECORDINGS_DIR",
    "INTERVIEW_SCRIPT_PATH",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "TRANSCRIPT_CORRECTION",
    "PROFILE_TAGGING",
    "RTZR_API_ID",
    "RTZR_API_KEY",
    "RTZR_BASE_URL",
    "AUTH_REQUIRED",
    "AUTH_API_SECRETS_JSON",
    "AUTH_API_SECRET",
    "AUTH_API_SECRET_ID",
    "RATE_LIMIT_REQUESTS_PER_SECOND",
    "RATE_LIMIT_BURST_SIZE",
];

/// Values read from the environment; `None` means unset.
#[derive(Debug, Default)]
pub(crate) struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_enabled: Option<bool>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,

    pub public_base_url: Option<String>,
    pub control_mode: Option<String>,
    pub control_timeout_secs: Option<u64>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_api_base_url: Option<String>,

    pub say_voice: Option<String>,
    pub say_language: Option<String>,
    pub record_max_length_secs: Option<u32>,
    pub record_finish_on_key: Option<String>,
    pub pause_length_secs: Option<u32>,

    pub speech_timeout_secs: Option<u64>,
    pub recording_timeout_secs: Option<u64>,
    pub recording_poll_timeout_secs: Option<u64>,
    pub recording_poll_interval_ms: Option<u64>,
    pub max_retries_per_phase: Option<u32>,
    pub retry_fallback: Option<String>,

    pub recordings_dir: Option<String>,
    pub script_path: Option<String>,

    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub transcript_correction: Option<bool>,
    pub profile_tagging: Option<bool>,
    pub rtzr_api_id: Option<String>,
    pub rtzr_api_key: Option<String>,
    pub rtzr_base_url: Option<String>,

    pub auth_required: Option<bool>,
    pub auth_api_secrets: Vec<AuthApiSecret>,

    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_string("HOST"),
            port: env_parse("PORT")?,
            tls_enabled: env_bool("TLS_ENABLED")?,
            tls_cert_path: env_string("TLS_CERT_PATH"),
            tls_key_path: env_string("TLS_KEY_PATH"),

            public_base_url: env_string("SERVER_URL"),
            control_mode: env_string("CONTROL_MODE"),
            control_timeout_secs: env_parse("CONTROL_TIMEOUT_SECS")?,
            twilio_account_sid: env_string("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: env_string("TWILIO_AUTH_TOKEN"),
            twilio_api_base_url: env_string("TWILIO_API_BASE_URL"),

            say_voice: env_string("SAY_VOICE"),
            say_language: env_string("SAY_LANGUAGE"),
            record_max_length_secs: env_parse("RECORD_MAX_LENGTH_SECS")?,
            record_finish_on_key: env_string("RECORD_FINISH_ON_KEY"),
            pause_length_secs: env_parse("PAUSE_LENGTH_SECS")?,

            speech_timeout_secs: env_parse("SPEECH_TIMEOUT_SECS")?,
            recording_timeout_secs: env_parse("RECORDING_TIMEOUT_SECS")?,
            recording_poll_timeout_secs: env_parse("RECORDING_POLL_TIMEOUT_SECS")?,
            recording_poll_interval_ms: env_parse("RECORDING_POLL_INTERVAL_MS")?,
            max_retries_per_phase: env_parse("MAX_RETRIES_PER_PHASE")?,
            retry_fallback: env_string("RETRY_FALLBACK"),

            recordings_dir: env_string("RECORDINGS_DIR"),
            script_path: env_string("INTERVIEW_SCRIPT_PATH"),

            openai_api_key: env_string("OPENAI_API_KEY"),
            openai_model: env_string("OPENAI_MODEL"),
            openai_base_url: env_string("OPENAI_BASE_URL"),
            transcript_correction: env_bool("TRANSCRIPT_CORRECTION")?,
            profile_tagging: env_bool("PROFILE_TAGGING")?,
            rtzr_api_id: env_string("RTZR_API_ID"),
            rtzr_api_key: env_string("RTZR_API_KEY"),
            rtzr_base_url: env_string("RTZR_BASE_URL"),

            auth_required: env_bool("AUTH_REQUIRED")?,
            auth_api_secrets: load_auth_api_secrets()?,

            rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")?,
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE")?,
        })
    }
}

/// `AUTH_API_SECRETS_JSON` wins over the single `AUTH_API_SECRET` form.
fn load_auth_api_secrets() -> Result<Vec<AuthApiSecret>, ConfigError> {
    if let Some(json) = env_string("AUTH_API_SECRETS_JSON") {
        return parse_auth_api_secrets_json(&json);
    }
    Ok(env_string("AUTH_API_SECRET")
        .map(|secret| {
            vec![AuthApiSecret {
                id: env_string("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
                secret,
            }]
        })
        .unwrap_or_default())
}

/// Remove every variable the gateway reads.
#[cfg(test)]
pub(crate) fn clear_all() {
    for key in ENV_KEYS {
        unsafe {
            std::env::remove_var(key);
        }
    }
}
