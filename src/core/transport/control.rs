//! Driver-to-transport control plane
//!
//! The dialogue driver never touches a call's instruction queue directly. It asks a
//! [`ControlPlane`] to enqueue speech or begin a capture, and the control plane is
//! answerable for getting that instruction into the queue the poll webhook drains.
//!
//! Two implementations are provided:
//! - [`HttpControlPlane`] posts to this service's own `/say-text` and
//!   `/listen-to-user` endpoints over the public base URL. This is the deployment
//!   shape where the control endpoints may also be driven by an external process.
//! - [`LocalControlPlane`] writes straight into the in-process [`CallRegistry`].
//!
//! Both report [`TransportError::MissingBaseUrl`] when no public base URL is
//! configured: without it the provider can never be told what to do next.

use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{TransportError, TransportResult};
use crate::core::session::{CallRegistry, Instruction};
use crate::utils::join_path;

pub const SAY_TEXT_PATH: &str = "/say-text";
pub const LISTEN_PATH: &str = "/listen-to-user";

/// Request body of `POST /say-text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SayTextRequest {
    pub call_sid: String,
    pub text: String,
}

/// Request body of `POST /listen-to-user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenRequest {
    pub call_sid: String,
}

/// Acknowledgement returned by both control endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlAck {
    pub status: String,
    pub message: String,
}

impl ControlAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Queue `text` to be spoken on the call.
    async fn enqueue_speech(&self, call_id: &str, text: &str) -> TransportResult<()>;

    /// Ask the transport to start capturing the caller's next answer.
    async fn begin_listen(&self, call_id: &str) -> TransportResult<()>;
}

// =============================================================================
// HTTP control plane
// =============================================================================

pub struct HttpControlPlane {
    client: Client,
    base_url: Option<String>,
    api_secret: Option<String>,
}

impl HttpControlPlane {
    pub fn new(
        base_url: Option<String>,
        api_secret: Option<String>,
        timeout: Duration,
    ) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_secret,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> TransportResult<()> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(TransportError::MissingBaseUrl)?;

        let mut request = self.client.post(join_path(base, path)).json(body);
        if let Some(secret) = &self.api_secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let ack: ControlAck = serde_json::from_str(&text)
            .map_err(|e| TransportError::Rejected(format!("malformed acknowledgement: {e}")))?;
        if !ack.is_success() {
            return Err(TransportError::Rejected(ack.message));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn enqueue_speech(&self, call_id: &str, text: &str) -> TransportResult<()> {
        debug!(call_id, "Posting speech to control endpoint");
        self.post(
            SAY_TEXT_PATH,
            &SayTextRequest {
                call_sid: call_id.to_string(),
                text: text.to_string(),
            },
        )
        .await
    }

    async fn begin_listen(&self, call_id: &str) -> TransportResult<()> {
        debug!(call_id, "Posting listen request to control endpoint");
        self.post(
            LISTEN_PATH,
            &ListenRequest {
                call_sid: call_id.to_string(),
            },
        )
        .await
    }
}

// =============================================================================
// In-process control plane
// =============================================================================

/// Writes instructions straight into the registry.
///
/// Holds a weak reference: the registry owns the driver launcher, which owns this.
pub struct LocalControlPlane {
    registry: Weak<CallRegistry>,
    base_url: Option<String>,
}

impl LocalControlPlane {
    pub fn new(registry: Weak<CallRegistry>, base_url: Option<String>) -> Self {
        Self { registry, base_url }
    }

    fn registry(&self, call_id: &str) -> TransportResult<std::sync::Arc<CallRegistry>> {
        if self.base_url.is_none() {
            return Err(TransportError::MissingBaseUrl);
        }
        self.registry
            .upgrade()
            .ok_or_else(|| TransportError::CallEnded(call_id.to_string()))
    }
}

#[async_trait]
impl ControlPlane for LocalControlPlane {
    async fn enqueue_speech(&self, call_id: &str, text: &str) -> TransportResult<()> {
        self.registry(call_id)?
            .enqueue(call_id, Instruction::utter(text))?;
        Ok(())
    }

    async fn begin_listen(&self, call_id: &str) -> TransportResult<()> {
        self.registry(call_id)?.begin_recording(call_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::core::session::{CallSession, DriverLauncher};

    struct NoopLauncher;

    impl DriverLauncher for NoopLauncher {
        fn launch(&self, _session: Arc<CallSession>) -> tokio::task::JoinHandle<()> {
            tokio::spawn(async {})
        }
    }

    #[tokio::test]
    async fn test_http_enqueue_speech_posts_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/say-text"))
            .and(header("authorization", "Bearer s3cret"))
            .and(body_json(serde_json::json!({"call_sid": "CA1", "text": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "message": "ok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let control = HttpControlPlane::new(
            Some(server.uri()),
            Some("s3cret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        control.enqueue_speech("CA1", "hello").await.unwrap();
    }

    #[tokio::test]
    async fn test_http_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/listen-to-user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let control = HttpControlPlane::new(Some(server.uri()), None, Duration::from_secs(5))
            .unwrap();
        let err = control.begin_listen("CA1").await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::UnexpectedStatus { status: 401, .. }
        ));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_http_missing_base_url_is_fatal() {
        let control = HttpControlPlane::new(None, None, Duration::from_secs(5)).unwrap();
        let err = control.enqueue_speech("CA1", "hello").await.unwrap_err();
        assert!(matches!(err, TransportError::MissingBaseUrl));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_local_plane_writes_into_registry() {
        let registry = Arc::new(CallRegistry::new(Arc::new(NoopLauncher)));
        let control = LocalControlPlane::new(
            Arc::downgrade(&registry),
            Some("https://example.com".to_string()),
        );

        control.enqueue_speech("CA1", "hello").await.unwrap();
        control.begin_listen("CA1").await.unwrap();

        assert_eq!(
            registry.dequeue_next("CA1"),
            Some(Instruction::StartRecording)
        );
        assert_eq!(registry.dequeue_next("CA1"), Some(Instruction::utter("hello")));
    }

    #[tokio::test]
    async fn test_local_plane_without_base_url() {
        let registry = Arc::new(CallRegistry::new(Arc::new(NoopLauncher)));
        let control = LocalControlPlane::new(Arc::downgrade(&registry), None);

        let err = control.enqueue_speech("CA1", "hello").await.unwrap_err();
        assert!(matches!(err, TransportError::MissingBaseUrl));
        assert!(registry.dequeue_next("CA1").is_none());
    }
}
