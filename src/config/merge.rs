//! Merge the environment layer with YAML overrides and apply defaults.

use std::path::PathBuf;
use std::time::Duration;

use super::env::EnvConfig;
use super::yaml::YamlConfig;
use super::{AuthApiSecret, ConfigError, ControlMode, ServerConfig, TlsConfig};
use crate::core::collaborators::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::core::collaborators::rtzr::DEFAULT_RTZR_BASE_URL;
use crate::core::dialogue::RetryFallback;
use crate::core::transport::{DEFAULT_TWILIO_API_BASE_URL, DirectiveSettings, TransportTimeouts};
use crate::utils::normalize_base_url;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8001;
const DEFAULT_CONTROL_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECORDINGS_DIR: &str = "recordings";
const DEFAULT_MAX_RETRIES_PER_PHASE: u32 = 3;
const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// Build the final configuration: YAML > environment > defaults.
pub(crate) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let env = EnvConfig::load()?;
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let telephony = yaml.telephony.unwrap_or_default();
    let directives = yaml.directives.unwrap_or_default();
    let dialogue = yaml.dialogue.unwrap_or_default();
    let interview = yaml.interview.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let auth = yaml.auth.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let directive_defaults = DirectiveSettings::default();
    let timeout_defaults = TransportTimeouts::default();

    // TLS: YAML section wins as a whole when it enables TLS
    let tls_yaml = server.tls.unwrap_or_default();
    let tls_enabled = tls_yaml.enabled.or(env.tls_enabled).unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = tls_yaml.cert_path.or(env.tls_cert_path);
        let key_path = tls_yaml.key_path.or(env.tls_key_path);
        match (cert_path, key_path) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            _ => {
                return Err(ConfigError::Validation(
                    "TLS is enabled but cert_path and key_path are not both set".to_string(),
                ));
            }
        }
    } else {
        None
    };

    let public_base_url = telephony
        .public_base_url
        .or(env.public_base_url)
        .map(|raw| {
            normalize_base_url(&raw).map_err(|e| ConfigError::InvalidValue {
                key: "SERVER_URL",
                message: e.to_string(),
            })
        })
        .transpose()?;

    let control_mode = telephony
        .control_mode
        .or(env.control_mode)
        .map(|raw| {
            raw.parse::<ControlMode>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "CONTROL_MODE",
                    message,
                })
        })
        .transpose()?
        .unwrap_or_default();

    let retry_fallback = dialogue
        .retry_fallback
        .or(env.retry_fallback)
        .map(|raw| {
            raw.parse::<RetryFallback>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "RETRY_FALLBACK",
                    message,
                })
        })
        .transpose()?
        .unwrap_or_default();

    let auth_api_secrets = if !auth.api_secrets.is_empty() {
        auth.api_secrets
            .into_iter()
            .map(|entry| AuthApiSecret {
                id: entry.id,
                secret: entry.secret,
            })
            .collect()
    } else if let Some(secret) = auth.api_secret {
        vec![AuthApiSecret {
            id: "default".to_string(),
            secret,
        }]
    } else {
        env.auth_api_secrets
    };

    let secs = |yaml: Option<u64>, env: Option<u64>, default: Duration| {
        yaml.or(env).map(Duration::from_secs).unwrap_or(default)
    };

    Ok(ServerConfig {
        host: server
            .host
            .or(env.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
        tls,

        public_base_url,
        control_mode,
        control_timeout: secs(
            telephony.control_timeout_seconds,
            env.control_timeout_secs,
            Duration::from_secs(DEFAULT_CONTROL_TIMEOUT_SECS),
        ),
        twilio_account_sid: telephony.twilio_account_sid.or(env.twilio_account_sid),
        twilio_auth_token: telephony.twilio_auth_token.or(env.twilio_auth_token),
        twilio_api_base_url: telephony
            .twilio_api_base_url
            .or(env.twilio_api_base_url)
            .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE_URL.to_string()),

        say_voice: directives
            .voice
            .or(env.say_voice)
            .unwrap_or(directive_defaults.voice.clone()),
        say_language: directives
            .language
            .or(env.say_language)
            .unwrap_or(directive_defaults.language.clone()),
        record_max_length_secs: directives
            .record_max_length_secs
            .or(env.record_max_length_secs)
            .unwrap_or(directive_defaults.record_max_length_secs),
        record_finish_on_key: directives
            .finish_on_key
            .or(env.record_finish_on_key)
            .unwrap_or(directive_defaults.finish_on_key.clone()),
        pause_length_secs: directives
            .pause_length_secs
            .or(env.pause_length_secs)
            .unwrap_or(directive_defaults.pause_length_secs),

        speech_timeout: secs(
            dialogue.speech_timeout_seconds,
            env.speech_timeout_secs,
            timeout_defaults.speech,
        ),
        recording_timeout: secs(
            dialogue.recording_timeout_seconds,
            env.recording_timeout_secs,
            timeout_defaults.recording,
        ),
        recording_poll_timeout: secs(
            dialogue.recording_poll_timeout_seconds,
            env.recording_poll_timeout_secs,
            timeout_defaults.recording_poll,
        ),
        recording_poll_interval: dialogue
            .recording_poll_interval_ms
            .or(env.recording_poll_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(timeout_defaults.recording_poll_interval),
        max_retries_per_phase: dialogue
            .max_retries_per_phase
            .or(env.max_retries_per_phase)
            .unwrap_or(DEFAULT_MAX_RETRIES_PER_PHASE),
        retry_fallback,

        recordings_dir: PathBuf::from(
            interview
                .recordings_dir
                .or(env.recordings_dir)
                .unwrap_or_else(|| DEFAULT_RECORDINGS_DIR.to_string()),
        ),
        script_path: interview.script_path.or(env.script_path).map(PathBuf::from),

        openai_api_key: providers.openai_api_key.or(env.openai_api_key),
        openai_model: providers
            .openai_model
            .or(env.openai_model)
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        openai_base_url: providers
            .openai_base_url
            .or(env.openai_base_url)
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        transcript_correction: providers
            .transcript_correction
            .or(env.transcript_correction)
            .unwrap_or(false),
        profile_tagging: providers
            .profile_tagging
            .or(env.profile_tagging)
            .unwrap_or(true),
        rtzr_api_id: providers.rtzr_api_id.or(env.rtzr_api_id),
        rtzr_api_key: providers.rtzr_api_key.or(env.rtzr_api_key),
        rtzr_base_url: providers
            .rtzr_base_url
            .or(env.rtzr_base_url)
            .unwrap_or_else(|| DEFAULT_RTZR_BASE_URL.to_string()),

        auth_api_secrets,
        auth_required: auth.required.or(env.auth_required).unwrap_or(false),

        rate_limit_requests_per_second: security
            .rate_limit_requests_per_second
            .or(env.rate_limit_requests_per_second)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
        rate_limit_burst_size: security
            .rate_limit_burst_size
            .or(env.rate_limit_burst_size)
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::clear_all;
    use crate::config::yaml::{AuthYaml, TelephonyYaml};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_only() {
        clear_all();
        unsafe {
            std::env::set_var("SERVER_URL", "https://voice.example.com/");
            std::env::set_var("CONTROL_MODE", "local");
            std::env::set_var("RECORDING_POLL_INTERVAL_MS", "250");
        }

        let config = merge_config(None).unwrap();
        assert_eq!(
            config.public_base_url.as_deref(),
            Some("https://voice.example.com")
        );
        assert_eq!(config.control_mode, ControlMode::Local);
        assert_eq!(config.recording_poll_interval, Duration::from_millis(250));
        assert_eq!(config.say_language, "ko-KR");

        clear_all();
    }

    #[test]
    #[serial]
    fn test_yaml_secrets_replace_env_secrets() {
        clear_all();
        unsafe {
            std::env::set_var("AUTH_API_SECRET", "from-env");
        }

        let yaml = YamlConfig {
            auth: Some(AuthYaml {
                api_secret: Some("from-yaml".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.auth_api_secrets.len(), 1);
        assert_eq!(config.auth_api_secrets[0].secret, "from-yaml");

        clear_all();
    }

    #[test]
    #[serial]
    fn test_invalid_base_url_rejected() {
        clear_all();

        let yaml = YamlConfig {
            telephony: Some(TelephonyYaml {
                public_base_url: Some("ftp://voice.example.com".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            merge_config(Some(yaml)),
            Err(ConfigError::InvalidValue {
                key: "SERVER_URL",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_tls_requires_both_paths() {
        clear_all();
        unsafe {
            std::env::set_var("TLS_ENABLED", "true");
            std::env::set_var("TLS_CERT_PATH", "/certs/cert.pem");
        }

        assert!(matches!(
            merge_config(None),
            Err(ConfigError::Validation(_))
        ));

        clear_all();
    }
}
