use super::{ConfigError, ServerConfig};

/// Checks that need the merged configuration as a whole.
pub(crate) fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_auth_required(config)?;
    validate_auth_api_secrets(config)?;
    validate_recording_poll(config)?;
    validate_retries(config)?;
    Ok(())
}

fn validate_auth_required(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.auth_required && config.auth_api_secrets.is_empty() {
        return Err(ConfigError::Validation(
            "Authentication is required but no API secrets are configured. \
             Set AUTH_API_SECRET or AUTH_API_SECRETS_JSON, or auth.api_secrets in YAML"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_auth_api_secrets(config: &ServerConfig) -> Result<(), ConfigError> {
    for (index, entry) in config.auth_api_secrets.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "API secret entry {index} has an empty id"
            )));
        }
        if entry.secret.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "API secret '{}' is empty",
                entry.id
            )));
        }
    }
    Ok(())
}

fn validate_recording_poll(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.recording_poll_interval.is_zero() {
        return Err(ConfigError::Validation(
            "recording poll interval must be greater than zero".to_string(),
        ));
    }
    if config.recording_poll_interval >= config.recording_poll_timeout {
        return Err(ConfigError::Validation(format!(
            "recording poll interval ({:?}) must be shorter than the poll timeout ({:?})",
            config.recording_poll_interval, config.recording_poll_timeout
        )));
    }
    Ok(())
}

fn validate_retries(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.max_retries_per_phase == 0 {
        return Err(ConfigError::Validation(
            "max_retries_per_phase must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::clear_all;
    use crate::config::merge::merge_config;
    use crate::config::AuthApiSecret;
    use serial_test::serial;
    use std::time::Duration;

    fn base_config() -> ServerConfig {
        clear_all();
        merge_config(None).unwrap()
    }

    #[test]
    #[serial]
    fn test_defaults_are_valid() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    #[serial]
    fn test_poll_interval_must_be_shorter_than_timeout() {
        let mut config = base_config();
        config.recording_poll_interval = Duration::from_secs(30);
        assert!(validate_config(&config).is_err());

        config.recording_poll_interval = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    #[serial]
    fn test_zero_retries_rejected() {
        let mut config = base_config();
        config.max_retries_per_phase = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    #[serial]
    fn test_empty_secret_rejected() {
        let mut config = base_config();
        config.auth_api_secrets = vec![AuthApiSecret {
            id: "driver".to_string(),
            secret: " ".to_string(),
        }];
        assert!(validate_config(&config).is_err());
    }
}
