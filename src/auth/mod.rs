//! API-secret authentication for the control endpoints.

use subtle::ConstantTimeEq;

use crate::config::AuthApiSecret;

/// Authentication context inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// Identifier of the matched API secret; `None` when auth is disabled
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// Find the id of the secret matching `token`.
///
/// Every configured secret is compared in constant time, so the time taken does not
/// reveal which entry (if any) matched.
pub fn match_api_secret_id<'a>(token: &str, secrets: &'a [AuthApiSecret]) -> Option<&'a str> {
    let mut matched = None;
    for entry in secrets {
        let equal: bool = token.as_bytes().ct_eq(entry.secret.as_bytes()).into();
        if equal && matched.is_none() {
            matched = Some(entry.id.as_str());
        }
    }
    matched
}
