//! URL helpers for the public callback base address
//!
//! The telephony provider reaches this service through a public base URL. Every
//! callback address handed to the provider (recording callback, poll redirect) and every
//! self-call made by the HTTP control plane is built from it, so it is normalized once at
//! configuration time:
//! - scheme must be `http` or `https`
//! - a host is required
//! - query strings and fragments are rejected
//! - trailing slashes are removed

use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a base URL
#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("Base URL must not carry a query or fragment")]
    UnexpectedSuffix,
}

/// Validate `raw` as a base URL and return it without trailing slashes.
///
/// # Example
/// ```rust,ignore
/// use interview_gateway::utils::normalize_base_url;
///
/// assert_eq!(
///     normalize_base_url("https://abc.ngrok.app/").unwrap(),
///     "https://abc.ngrok.app"
/// );
/// assert!(normalize_base_url("ftp://abc.ngrok.app").is_err());
/// ```
pub fn normalize_base_url(raw: &str) -> Result<String, UrlError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost);
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(UrlError::UnexpectedSuffix);
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Join a normalized base URL and an absolute route path.
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Whether `candidate` points at the same scheme, host and port as `reference`.
///
/// Unparseable input never matches.
pub fn same_origin(candidate: &str, reference: &str) -> bool {
    match (Url::parse(candidate), Url::parse(reference)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://abc.ngrok.app/").unwrap(),
            "https://abc.ngrok.app"
        );
        assert_eq!(
            normalize_base_url("  http://localhost:3000//  ").unwrap(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_normalize_keeps_path_prefix() {
        assert_eq!(
            normalize_base_url("https://example.com/interview/").unwrap(),
            "https://example.com/interview"
        );
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(matches!(
            normalize_base_url("not-a-url"),
            Err(UrlError::InvalidFormat(_))
        ));
        assert_eq!(
            normalize_base_url("ftp://example.com"),
            Err(UrlError::UnsupportedScheme("ftp".to_string()))
        );
        assert_eq!(
            normalize_base_url("https://example.com/?a=1"),
            Err(UrlError::UnexpectedSuffix)
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(
            join_path("https://example.com", "/voice"),
            "https://example.com/voice"
        );
        assert_eq!(
            join_path("https://example.com/", "recording-callback"),
            "https://example.com/recording-callback"
        );
    }

    #[test]
    fn test_same_origin() {
        assert!(same_origin(
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1",
            "https://api.twilio.com"
        ));
        assert!(!same_origin(
            "https://evil.example.com/rec",
            "https://api.twilio.com"
        ));
        assert!(!same_origin("http://api.twilio.com/rec", "https://api.twilio.com"));
        assert!(!same_origin("garbage", "https://api.twilio.com"));
    }
}
