//! Call session registry.
//!
//! The registry is the single owner of every per-call resource:
//!
//! - a [`CallChannel`] (instruction queue + recording state), created lazily by whichever
//!   request touches the call id first, because a control request may race the session's
//!   own creation
//! - a [`CallSession`] (rendezvous signals, cancellation token, driver task), created on the
//!   first transport poll for an unseen call id
//!
//! Each call is guarded by its own locks; unrelated calls never contend on a shared mutex.
//! [`CallRegistry::remove`] tears both down as a unit and cancels the driver, so a task
//! blocked on the call's signals wakes with a cancellation outcome instead of hanging.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{Instruction, InstructionQueue};
use super::recording::{RecordingHandle, RecordingSlot, RecordingState};
use super::signal::Signal;

/// How long a terminated call id is remembered so late requests cannot resurrect it.
const ENDED_CALL_RETENTION: Duration = Duration::from_secs(600);

/// Grace period for a cancelled driver before its task is aborted outright.
const DRIVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The transport already reported a terminal status for this call
    #[error("call {0} has already ended")]
    CallEnded(String),
}

// =============================================================================
// Per-call state
// =============================================================================

/// Transport-facing state of one call: what to deliver next and what was captured.
#[derive(Debug, Default)]
pub struct CallChannel {
    pub queue: InstructionQueue,
    pub recording: RecordingSlot,
}

/// Live state of one phone call from pickup to termination.
pub struct CallSession {
    id: String,
    channel: Arc<CallChannel>,
    /// Set when an utterance or recording directive has been handed to the transport
    pub speech: Signal,
    /// Set when the transport reports a finished capture
    pub recording_ready: Signal,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
    phase: AtomicUsize,
    created_at: Instant,
}

impl std::fmt::Debug for CallSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSession")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl CallSession {
    fn new(id: String, channel: Arc<CallChannel>) -> Self {
        Self {
            id,
            channel,
            speech: Signal::new(),
            recording_ready: Signal::new(),
            cancel: CancellationToken::new(),
            driver: Mutex::new(None),
            phase: AtomicUsize::new(0),
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel(&self) -> &Arc<CallChannel> {
        &self.channel
    }

    /// Token cancelled when the session is removed from the registry.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Phase the driver is currently on. Published by the driver, read by handlers.
    pub fn phase(&self) -> usize {
        self.phase.load(Ordering::Relaxed)
    }

    pub fn publish_phase(&self, phase: usize) {
        self.phase.store(phase, Ordering::Relaxed);
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn has_driver(&self) -> bool {
        self.driver.lock().is_some()
    }

    fn attach_driver(&self, handle: JoinHandle<()>) {
        *self.driver.lock() = Some(handle);
    }

    fn take_driver(&self) -> Option<JoinHandle<()>> {
        self.driver.lock().take()
    }
}

/// Starts the dialogue driver for a freshly created session.
pub trait DriverLauncher: Send + Sync {
    fn launch(&self, session: Arc<CallSession>) -> JoinHandle<()>;
}

// =============================================================================
// Registry
// =============================================================================

/// Process-wide mapping from call id to its session and channel.
pub struct CallRegistry {
    sessions: DashMap<String, Arc<CallSession>>,
    channels: DashMap<String, Arc<CallChannel>>,
    ended: DashMap<String, Instant>,
    launcher: Arc<dyn DriverLauncher>,
}

impl CallRegistry {
    pub fn new(launcher: Arc<dyn DriverLauncher>) -> Self {
        Self {
            sessions: DashMap::new(),
            channels: DashMap::new(),
            ended: DashMap::new(),
            launcher,
        }
    }

    /// Return the session for `call_id`, creating it and launching its driver if unseen.
    ///
    /// Concurrent callers for the same id observe the same session; the driver is launched
    /// exactly once.
    pub fn get_or_create(&self, call_id: &str) -> Result<Arc<CallSession>, RegistryError> {
        self.ensure_live(call_id)?;
        self.admit(call_id)
    }

    /// Insert-or-fetch half of [`get_or_create`](Self::get_or_create).
    ///
    /// A terminal status may land between the liveness check and the insert; the
    /// fresh session is then withdrawn before its driver is launched.
    fn admit(&self, call_id: &str) -> Result<Arc<CallSession>, RegistryError> {
        let (session, created) = match self.sessions.entry(call_id.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(CallSession::new(
                    call_id.to_string(),
                    self.channel_or_create(call_id),
                ));
                entry.insert(session.clone());
                (session, true)
            }
        };

        if !created {
            return Ok(session);
        }

        if self.has_ended(call_id) {
            self.sessions
                .remove_if(call_id, |_, current| Arc::ptr_eq(current, &session));
            self.channels.remove_if(call_id, |_, channel| {
                Arc::ptr_eq(channel, session.channel())
            });
            session.cancel.cancel();
            warn!(call_id = %call_id, "Call ended while its session was being created");
            return Err(RegistryError::CallEnded(call_id.to_string()));
        }

        info!(call_id = %call_id, "New call session created, launching dialogue driver");
        let handle = self.launcher.launch(session.clone());
        session.attach_driver(handle);
        Ok(session)
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.get(call_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.contains_key(call_id)
    }

    /// Tear down every resource owned by `call_id` and cancel its driver.
    ///
    /// Returns `true` if a session or channel existed.
    pub fn remove(&self, call_id: &str) -> bool {
        let now = Instant::now();
        self.ended
            .retain(|_, ended_at| now.duration_since(*ended_at) < ENDED_CALL_RETENTION);
        self.ended.insert(call_id.to_string(), now);

        let channel = self.channels.remove(call_id).map(|(_, channel)| channel);
        if let Some(channel) = &channel {
            channel.queue.clear();
            channel.recording.reset();
        }

        let session = self.sessions.remove(call_id).map(|(_, session)| session);
        if let Some(session) = &session {
            session.cancel.cancel();
            if let Some(handle) = session.take_driver() {
                reap_driver(call_id.to_string(), handle);
            }
            info!(
                call_id = %call_id,
                age_secs = session.age().as_secs(),
                "Call session removed, driver cancelled"
            );
        }

        session.is_some() || channel.is_some()
    }

    /// Whether the transport already reported this call as terminated.
    pub fn has_ended(&self, call_id: &str) -> bool {
        self.ended.contains_key(call_id)
    }

    // -------------------------------------------------------------------------
    // Instruction queue
    // -------------------------------------------------------------------------

    /// Append an utterance, or prepend a recording request, to the call's queue.
    pub fn enqueue(&self, call_id: &str, instruction: Instruction) -> Result<(), RegistryError> {
        self.ensure_live(call_id)?;
        debug!(call_id = %call_id, instruction = ?instruction, "Enqueue instruction");
        self.channel_or_create(call_id).queue.enqueue(instruction);
        Ok(())
    }

    /// Pop the next instruction for `call_id`. Never blocks.
    pub fn dequeue_next(&self, call_id: &str) -> Option<Instruction> {
        self.channels
            .get(call_id)
            .and_then(|channel| channel.queue.dequeue_next())
    }

    pub fn pending_instructions(&self, call_id: &str) -> usize {
        self.channels
            .get(call_id)
            .map(|channel| channel.queue.len())
            .unwrap_or(0)
    }

    // -------------------------------------------------------------------------
    // Recording state
    // -------------------------------------------------------------------------

    /// Mark a capture as requested and queue the recording directive ahead of speech.
    pub fn begin_recording(&self, call_id: &str) -> Result<(), RegistryError> {
        self.ensure_live(call_id)?;
        let channel = self.channel_or_create(call_id);
        channel.recording.begin();
        channel.queue.enqueue(Instruction::StartRecording);
        Ok(())
    }

    /// Store a finished capture and wake the driver waiting for it.
    ///
    /// Returns `false` when the capture was dropped: the call has ended, or nothing
    /// is known about it.
    pub fn complete_recording(&self, call_id: &str, handle: RecordingHandle) -> bool {
        if self.has_ended(call_id) {
            warn!(call_id = %call_id, "Recording completed after the call ended, ignoring");
            return false;
        }

        let session = self.get(call_id);
        let existing = self
            .channels
            .get(call_id)
            .map(|entry| entry.value().clone());
        let channel = match (existing, &session) {
            (Some(channel), _) => channel,
            (None, Some(_)) => self.channel_or_create(call_id),
            (None, None) => {
                warn!(call_id = %call_id, "Recording completed for an unknown call, ignoring");
                return false;
            }
        };

        channel.recording.complete(handle);
        match session {
            Some(session) => session.recording_ready.set(),
            None => warn!(
                call_id = %call_id,
                "Recording completed for a call without a live session"
            ),
        }
        true
    }

    pub fn recording_state(&self, call_id: &str) -> RecordingState {
        self.channels
            .get(call_id)
            .map(|channel| channel.recording.snapshot())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Snapshot of live sessions.
    pub fn sessions(&self) -> Vec<Arc<CallSession>> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn channel_or_create(&self, call_id: &str) -> Arc<CallChannel> {
        self.channels
            .entry(call_id.to_string())
            .or_insert_with(|| Arc::new(CallChannel::default()))
            .clone()
    }

    fn ensure_live(&self, call_id: &str) -> Result<(), RegistryError> {
        if self.ended.contains_key(call_id) {
            Err(RegistryError::CallEnded(call_id.to_string()))
        } else {
            Ok(())
        }
    }
}

/// Wait for a cancelled driver to run its cleanup path; abort it if it overstays.
fn reap_driver(call_id: String, mut handle: JoinHandle<()>) {
    if handle.is_finished() {
        return;
    }
    tokio::spawn(async move {
        if tokio::time::timeout(DRIVER_SHUTDOWN_GRACE, &mut handle)
            .await
            .is_err()
        {
            warn!(
                call_id = %call_id,
                "Dialogue driver ignored cancellation, aborting task"
            );
            handle.abort();
        }
    });
}
