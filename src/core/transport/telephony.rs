//! Telephony provider REST API
//!
//! Two operations are needed outside the webhook flow: terminating a live call and
//! fetching the audio behind a recording URL. [`TwilioApi`] implements both against
//! the Twilio 2010-04-01 REST API with HTTP basic auth.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use super::error::{TransportError, TransportResult};
use crate::utils::same_origin;

pub const DEFAULT_TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

#[async_trait]
pub trait TelephonyApi: Send + Sync {
    /// Ask the provider to end the call.
    async fn terminate_call(&self, call_id: &str) -> TransportResult<()>;

    /// Stream the audio behind `url` into `dest`, returning the number of bytes written.
    ///
    /// `dest` does not exist afterwards unless the whole body was written.
    async fn download_recording(&self, url: &str, dest: &Path) -> TransportResult<u64>;
}

/// Account credentials for the Twilio REST API.
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

impl Drop for TwilioCredentials {
    fn drop(&mut self) {
        self.auth_token.zeroize();
    }
}

pub struct TwilioApi {
    client: Client,
    api_base_url: String,
    credentials: Option<TwilioCredentials>,
}

impl TwilioApi {
    pub fn new(
        api_base_url: impl Into<String>,
        credentials: Option<TwilioCredentials>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn call_url(&self, account_sid: &str, call_id: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base_url, account_sid, call_id
        )
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> TransportResult<u64> {
        let mut request = self.client.get(url);
        // Credentials only go to the provider's own origin.
        if let Some(creds) = &self.credentials {
            if same_origin(url, &self.api_base_url) {
                request = request.basic_auth(&creds.account_sid, Some(&creds.auth_token));
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl TelephonyApi for TwilioApi {
    async fn terminate_call(&self, call_id: &str) -> TransportResult<()> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or(TransportError::MissingCredentials)?;

        let response = self
            .client
            .post(self.call_url(&creds.account_sid, call_id))
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!(call_id, "Call termination accepted by provider");
        Ok(())
    }

    async fn download_recording(&self, url: &str, dest: &Path) -> TransportResult<u64> {
        debug!(url, dest = %dest.display(), "Downloading recording");
        match self.fetch_to_file(url, dest).await {
            Ok(bytes) => Ok(bytes),
            Err(err) => {
                match tokio::fs::remove_file(dest).await {
                    Ok(()) => debug!(dest = %dest.display(), "Removed partial recording"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(dest = %dest.display(), error = %e, "Failed to remove partial recording")
                    }
                }
                Err(err)
            }
        }
    }
}
