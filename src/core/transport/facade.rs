//! Per-call transport facade
//!
//! [`CallTransport`] is the only thing the dialogue driver talks to. It turns
//! `speak`, `listen` and `hang_up` into control-plane requests and then blocks on the
//! matching rendezvous signal of the call session:
//!
//! ```text
//! speak:  clear(speech)    -> enqueue Utter          -> wait(speech)
//! listen: clear(recording) -> enqueue StartRecording -> wait(recording)
//!         -> poll recording state until Ready -> download to USER_{n}.wav
//! ```
//!
//! Signals are cleared before the request goes out, never between the request and the
//! wait, so a webhook that fires immediately is still observed.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::control::ControlPlane;
use super::error::{TransportError, TransportResult};
use super::telephony::TelephonyApi;
use crate::core::artifacts::SessionArtifacts;
use crate::core::session::{CallSession, RecordingHandle, RecordingState};

/// Bounds on every suspension point of the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// How long `speak` waits for the provider to pick the utterance up
    pub speech: Duration,
    /// How long `listen` waits for the recording callback
    pub recording: Duration,
    /// How long `listen` polls for a ready recording after the callback
    pub recording_poll: Duration,
    pub recording_poll_interval: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            speech: Duration::from_secs(120),
            recording: Duration::from_secs(90),
            recording_poll: Duration::from_secs(30),
            recording_poll_interval: Duration::from_millis(500),
        }
    }
}

/// Operations the dialogue driver performs against the caller.
#[async_trait]
pub trait CallIo: Send + Sync {
    /// Say `text` and wait until the provider has taken it.
    async fn speak(&self, text: &str) -> TransportResult<()>;

    /// Capture the caller's answer for `phase` and return the local audio file.
    async fn listen(&self, phase: usize) -> TransportResult<PathBuf>;

    /// End the call. Returns whether the provider accepted the request.
    async fn hang_up(&self) -> bool;
}

pub struct CallTransport {
    session: Arc<CallSession>,
    control: Arc<dyn ControlPlane>,
    telephony: Arc<dyn TelephonyApi>,
    artifacts: SessionArtifacts,
    timeouts: TransportTimeouts,
    hung_up: AtomicBool,
}

impl CallTransport {
    pub fn new(
        session: Arc<CallSession>,
        control: Arc<dyn ControlPlane>,
        telephony: Arc<dyn TelephonyApi>,
        artifacts: SessionArtifacts,
        timeouts: TransportTimeouts,
    ) -> Self {
        Self {
            session,
            control,
            telephony,
            artifacts,
            timeouts,
            hung_up: AtomicBool::new(false),
        }
    }

    pub fn artifacts(&self) -> &SessionArtifacts {
        &self.artifacts
    }

    /// Run a control request, abandoning it if the session is torn down.
    async fn control_request<F>(&self, request: F) -> TransportResult<()>
    where
        F: std::future::Future<Output = TransportResult<()>> + Send,
    {
        tokio::select! {
            result = request => result,
            _ = self.session.cancel_token().cancelled() => Err(TransportError::Cancelled),
        }
    }

    /// Poll the recording state until it is ready, failed, or the poll bound elapses.
    async fn await_ready_recording(&self) -> TransportResult<RecordingHandle> {
        let recording = &self.session.channel().recording;
        let cancel = self.session.cancel_token();
        let deadline = Instant::now() + self.timeouts.recording_poll;

        loop {
            match recording.snapshot() {
                RecordingState::Ready(handle) => return Ok(handle),
                RecordingState::Failed => return Err(TransportError::RecordingFailed),
                RecordingState::Pending | RecordingState::Absent => {}
            }

            if Instant::now() >= deadline {
                recording.fail_pending();
                return Err(TransportError::Timeout {
                    waited: self.timeouts.recording_poll,
                    what: "recording to become ready",
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.timeouts.recording_poll_interval) => {}
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
            }
        }
    }
}

#[async_trait]
impl CallIo for CallTransport {
    async fn speak(&self, text: &str) -> TransportResult<()> {
        let call_id = self.session.id();
        self.session.speech.clear();
        self.control_request(self.control.enqueue_speech(call_id, text))
            .await?;

        self.session
            .speech
            .wait_timeout(self.session.cancel_token(), self.timeouts.speech)
            .await
            .map_err(|e| TransportError::from_signal(e, "speech delivery"))?;

        debug!(call_id, "Utterance delivered");
        Ok(())
    }

    async fn listen(&self, phase: usize) -> TransportResult<PathBuf> {
        let call_id = self.session.id();
        self.session.recording_ready.clear();
        self.control_request(self.control.begin_listen(call_id))
            .await?;

        if let Err(e) = self
            .session
            .recording_ready
            .wait_timeout(self.session.cancel_token(), self.timeouts.recording)
            .await
        {
            self.session.channel().recording.fail_pending();
            return Err(TransportError::from_signal(e, "recording callback"));
        }

        let handle = self.await_ready_recording().await?;
        info!(
            call_id,
            phase,
            duration_secs = handle.duration_secs,
            "Recording ready"
        );

        self.artifacts.ensure().await?;
        let dest = self.artifacts.answer_path(phase);
        let bytes = tokio::select! {
            result = self.telephony.download_recording(&handle.url, &dest) => result?,
            _ = self.session.cancel_token().cancelled() => {
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(TransportError::Cancelled);
            }
        };

        debug!(call_id, phase, bytes, path = %dest.display(), "Recording downloaded");
        Ok(dest)
    }

    async fn hang_up(&self) -> bool {
        if self.hung_up.load(Ordering::Acquire) {
            return true;
        }

        let call_id = self.session.id();
        match self.telephony.terminate_call(call_id).await {
            Ok(()) => {
                self.hung_up.store(true, Ordering::Release);
                info!(call_id, "Hung up");
                true
            }
            Err(e) => {
                warn!(call_id, error = %e, "Hang-up request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    use crate::core::session::{CallRegistry, DriverLauncher};
    use crate::core::transport::control::LocalControlPlane;

    struct NoopLauncher;

    impl DriverLauncher for NoopLauncher {
        fn launch(&self, _session: Arc<CallSession>) -> tokio::task::JoinHandle<()> {
            tokio::spawn(async {})
        }
    }

    #[derive(Default)]
    struct FakeTelephony {
        terminations: AtomicUsize,
        fail_terminate: bool,
        fail_download: bool,
    }

    #[async_trait]
    impl TelephonyApi for FakeTelephony {
        async fn terminate_call(&self, _call_id: &str) -> TransportResult<()> {
            self.terminations.fetch_add(1, Ordering::SeqCst);
            if self.fail_terminate {
                Err(TransportError::Network("refused".into()))
            } else {
                Ok(())
            }
        }

        async fn download_recording(&self, _url: &str, dest: &Path) -> TransportResult<u64> {
            if self.fail_download {
                return Err(TransportError::UnexpectedStatus {
                    status: 500,
                    body: String::new(),
                });
            }
            tokio::fs::write(dest, b"RIFF").await?;
            Ok(4)
        }
    }

    fn timeouts() -> TransportTimeouts {
        TransportTimeouts {
            speech: Duration::from_millis(300),
            recording: Duration::from_millis(300),
            recording_poll: Duration::from_millis(200),
            recording_poll_interval: Duration::from_millis(10),
        }
    }

    struct Harness {
        registry: Arc<CallRegistry>,
        session: Arc<CallSession>,
        transport: Arc<CallTransport>,
        telephony: Arc<FakeTelephony>,
        _dir: tempfile::TempDir,
    }

    fn harness(telephony: FakeTelephony) -> Harness {
        let registry = Arc::new(CallRegistry::new(Arc::new(NoopLauncher)));
        let session = registry.get_or_create("CA1").unwrap();
        let control = Arc::new(LocalControlPlane::new(
            Arc::downgrade(&registry),
            Some("https://example.com".to_string()),
        ));
        let telephony = Arc::new(telephony);
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(CallTransport::new(
            session.clone(),
            control,
            telephony.clone(),
            SessionArtifacts::for_call(dir.path(), "CA1"),
            timeouts(),
        ));
        Harness {
            registry,
            session,
            transport,
            telephony,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_speak_waits_for_delivery() {
        let h = harness(FakeTelephony::default());

        let speaking = {
            let transport = h.transport.clone();
            tokio::spawn(async move { transport.speak("hello").await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!speaking.is_finished());
        assert_eq!(
            h.registry.dequeue_next("CA1"),
            Some(crate::core::session::Instruction::utter("hello"))
        );
        h.session.speech.set();

        speaking.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stale_speech_wakeup_is_discarded() {
        let h = harness(FakeTelephony::default());
        h.session.speech.set();

        let err = h.transport.speak("hello").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_listen_downloads_ready_recording() {
        let h = harness(FakeTelephony::default());

        let listening = {
            let transport = h.transport.clone();
            tokio::spawn(async move { transport.listen(0).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            h.registry.recording_state("CA1"),
            RecordingState::Pending
        );
        h.registry.complete_recording(
            "CA1",
            RecordingHandle {
                url: "https://api.twilio.com/rec/RE1".into(),
                duration_secs: 3,
            },
        );

        let path = listening.await.unwrap().unwrap();
        assert!(path.ends_with("USER_0001.wav"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_listen_timeout_marks_recording_failed() {
        let h = harness(FakeTelephony::default());

        let err = h.transport.listen(0).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert_eq!(h.registry.recording_state("CA1"), RecordingState::Failed);
    }

    #[tokio::test]
    async fn test_listen_download_failure_leaves_no_file() {
        let h = harness(FakeTelephony {
            fail_download: true,
            ..Default::default()
        });
        let listening = {
            let transport = h.transport.clone();
            tokio::spawn(async move { transport.listen(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.registry.complete_recording(
            "CA1",
            RecordingHandle {
                url: "https://api.twilio.com/rec/RE1".into(),
                duration_secs: 3,
            },
        );

        let err = listening.await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedStatus { .. }));
        assert!(!h.transport.artifacts().answer_path(2).exists());
    }

    #[tokio::test]
    async fn test_remove_cancels_blocked_speak() {
        let h = harness(FakeTelephony::default());

        let speaking = {
            let transport = h.transport.clone();
            tokio::spawn(async move { transport.speak("hello").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.registry.remove("CA1");

        let err = tokio::time::timeout(Duration::from_secs(1), speaking)
            .await
            .expect("speak must not hang after removal")
            .unwrap()
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_hang_up_is_idempotent() {
        let h = harness(FakeTelephony::default());

        assert!(h.transport.hang_up().await);
        assert!(h.transport.hang_up().await);
        assert_eq!(h.telephony.terminations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hang_up_failure_is_reported_not_retried() {
        let h = harness(FakeTelephony {
            fail_terminate: true,
            ..Default::default()
        });

        assert!(!h.transport.hang_up().await);
        assert_eq!(h.telephony.terminations.load(Ordering::SeqCst), 1);
    }
}
