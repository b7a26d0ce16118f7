use std::str::FromStr;

use super::ConfigError;

/// Parse a boolean flag the way operators write them in env files.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read an environment variable, treating blank values as unset.
pub(crate) fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable.
pub(crate) fn env_parse<T>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key,
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}

pub(crate) fn env_bool(key: &'static str) -> Result<Option<bool>, ConfigError> {
    env_string(key)
        .map(|raw| {
            parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key,
                message: format!("'{raw}' is not a boolean"),
            })
        })
        .transpose()
}
