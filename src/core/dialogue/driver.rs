//! Interview dialogue driver
//!
//! Runs one call's interview as a sequential state machine over the [`CallIo`]
//! facade:
//!
//! ```text
//! Init -> Ask(phase) -> Validate(phase) -> Advance -> Ask(phase + 1)
//!            |   ^            |
//!            v   |            +-> Complete (last phase)
//!          Retry(phase) <-----+
//! ```
//!
//! - `Ask` speaks the question, captures and transcribes the answer. No usable answer
//!   means an apology and `Retry` without validation.
//! - `Validate` records the question/answer pair and consults the validator. A negative
//!   verdict is explained to the caller and leads to `Retry`, which removes that pair.
//! - `phase` only moves in `Advance`.
//! - Failed attempts per phase are bounded; past the bound the configured
//!   [`RetryFallback`] applies.
//!
//! Every suspension point races the session's cancellation token. Once it fires the
//! driver stops talking to the caller and hands whatever was collected to the sink.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::script::InterviewScript;
use super::state::ConversationState;
use crate::core::collaborators::{
    AnswerValidator, CollaboratorError, InterviewRecord, ProfileExtractor, Transcriber,
    TranscriptSink, Verdict,
};
use crate::core::session::CallSession;
use crate::core::transport::{CallIo, TransportError};

// =============================================================================
// Policy and outcomes
// =============================================================================

/// What happens when a phase runs out of attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryFallback {
    /// Record the phase as unanswered and move on
    SkipPhase,
    /// Apologise and hang up
    #[default]
    EndCall,
}

impl std::str::FromStr for RetryFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip_phase" | "skip" => Ok(Self::SkipPhase),
            "end_call" | "end" => Ok(Self::EndCall),
            other => Err(format!(
                "Invalid retry fallback '{other}', expected skip_phase or end_call"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialoguePolicy {
    /// Re-asks allowed per phase before the fallback applies
    pub max_retries_per_phase: u32,
    pub fallback: RetryFallback,
}

impl Default for DialoguePolicy {
    fn default() -> Self {
        Self {
            max_retries_per_phase: 3,
            fallback: RetryFallback::EndCall,
        }
    }
}

/// Why a single turn produced no answer to validate.
#[derive(Debug)]
pub enum TurnFailure {
    /// The call can no longer be driven (no public base URL, call gone)
    Configuration(TransportError),
    Transport(TransportError),
    Timeout(TransportError),
    /// Transcript came back empty
    NoAnswer,
    Collaborator(CollaboratorError),
    Cancelled,
}

impl From<TransportError> for TurnFailure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            e if e.is_fatal() => Self::Configuration(e),
            e @ (TransportError::Timeout { .. } | TransportError::RecordingFailed) => {
                Self::Timeout(e)
            }
            e => Self::Transport(e),
        }
    }
}

impl std::fmt::Display for TurnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Timeout(e) => write!(f, "timeout: {e}"),
            Self::NoAnswer => write!(f, "no answer"),
            Self::Collaborator(e) => write!(f, "collaborator: {e}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    RetriesExhausted,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    /// Every phase was answered (or skipped) and the closing was delivered
    Completed { phases: usize, skipped: usize },
    /// The driver ended the call early
    Ended { phase: usize, reason: EndReason },
    /// The session was torn down underneath the driver
    Cancelled { phase: usize },
}

/// Collaborators the driver consults.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub validator: Arc<dyn AnswerValidator>,
    pub extractor: Arc<dyn ProfileExtractor>,
    pub sink: Arc<dyn TranscriptSink>,
}

// =============================================================================
// Driver
// =============================================================================

enum Step {
    Init,
    Ask,
    Validate(String),
    Retry { trim: bool },
    Advance,
    Complete,
    Abort(EndReason),
}

/// Reasons to leave the step loop early.
enum Interrupt {
    Cancelled,
    Fatal(TransportError),
}

pub struct DialogueDriver {
    io: Arc<dyn CallIo>,
    collaborators: Collaborators,
    script: Arc<InterviewScript>,
    policy: DialoguePolicy,
    cancel: CancellationToken,
    artifact_dir: PathBuf,
    session: Option<Arc<CallSession>>,
    state: ConversationState,
    failures: u32,
    skipped: usize,
}

impl DialogueDriver {
    pub fn new(
        call_id: impl Into<String>,
        io: Arc<dyn CallIo>,
        collaborators: Collaborators,
        script: Arc<InterviewScript>,
        policy: DialoguePolicy,
        cancel: CancellationToken,
        artifact_dir: PathBuf,
    ) -> Self {
        Self {
            io,
            collaborators,
            script,
            policy,
            cancel,
            artifact_dir,
            session: None,
            state: ConversationState::new(call_id),
            failures: 0,
            skipped: 0,
        }
    }

    /// Publish phase progress on `session` for introspection.
    pub fn with_session(mut self, session: Arc<CallSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Drive the interview to a terminal outcome.
    pub async fn run(mut self) -> DriverOutcome {
        info!(call_id = %self.state.call_id, phases = self.script.phase_count(), "Interview started");
        let mut step = Step::Init;

        loop {
            let next = match step {
                Step::Init => self.greet().await,
                Step::Ask => self.ask().await,
                Step::Validate(answer) => self.validate(answer).await,
                Step::Retry { trim } => self.retry(trim).await,
                Step::Advance => self.advance().await,
                Step::Complete => return self.complete().await,
                Step::Abort(reason) => return self.abort(reason).await,
            };

            step = match next {
                Ok(step) => step,
                Err(Interrupt::Cancelled) => return self.cancelled().await,
                Err(Interrupt::Fatal(e)) => {
                    error!(call_id = %self.state.call_id, error = %e, "Call cannot be driven any further");
                    Step::Abort(EndReason::Configuration)
                }
            };
        }
    }

    // -------------------------------------------------------------------------
    // Steps
    // -------------------------------------------------------------------------

    async fn greet(&mut self) -> Result<Step, Interrupt> {
        let script = self.script.clone();
        for line in &script.greeting {
            self.say(line).await?;
            self.state.record_greeting(line);
        }
        Ok(Step::Ask)
    }

    async fn ask(&mut self) -> Result<Step, Interrupt> {
        let phase = self.state.phase;
        let script = self.script.clone();
        let question = script.question(phase);
        debug!(call_id = %self.state.call_id, phase, attempt = self.failures + 1, "Asking");

        if let Err(e) = self.io.speak(question).await {
            return self.turn_failed(e.into()).await;
        }

        let audio = match self.io.listen(phase).await {
            Ok(path) => path,
            Err(e) => return self.turn_failed(e.into()).await,
        };

        let transcriber = self.collaborators.transcriber.clone();
        let answer = match self.guard(transcriber.transcribe(&audio)).await? {
            Ok(text) => text,
            Err(e) => return self.turn_failed(TurnFailure::Collaborator(e)).await,
        };

        if answer.trim().is_empty() {
            return self.turn_failed(TurnFailure::NoAnswer).await;
        }

        info!(call_id = %self.state.call_id, phase, answer = %answer, "Answer captured");
        Ok(Step::Validate(answer))
    }

    async fn validate(&mut self, answer: String) -> Result<Step, Interrupt> {
        let phase = self.state.phase;
        let script = self.script.clone();
        let question = script.question(phase);
        self.state.record_exchange(question, &answer);

        let validator = self.collaborators.validator.clone();
        let verdict = match self
            .guard(validator.validate(script.rubric(phase), question, &answer))
            .await?
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(call_id = %self.state.call_id, phase, error = %e, "Validation failed, treating answer as insufficient");
                Verdict::invalid("")
            }
        };

        if verdict.is_valid {
            debug!(call_id = %self.state.call_id, phase, "Answer accepted");
            return Ok(if script.is_last(phase) {
                Step::Complete
            } else {
                Step::Advance
            });
        }

        let explanation = if verdict.message.trim().is_empty() {
            script.retry_prompt.as_str()
        } else {
            verdict.message.trim()
        };
        info!(call_id = %self.state.call_id, phase, reason = %explanation, "Answer rejected");
        self.say(&format!("{} {}", script.insufficient_prefix, explanation))
            .await?;
        Ok(Step::Retry { trim: true })
    }

    async fn retry(&mut self, trim: bool) -> Result<Step, Interrupt> {
        if trim {
            self.state.discard_last_exchange();
        }
        self.failures += 1;

        if self.failures <= self.policy.max_retries_per_phase {
            return Ok(Step::Ask);
        }

        let phase = self.state.phase;
        warn!(
            call_id = %self.state.call_id,
            phase,
            failures = self.failures,
            fallback = ?self.policy.fallback,
            "Phase retries exhausted"
        );

        match self.policy.fallback {
            RetryFallback::EndCall => Ok(Step::Abort(EndReason::RetriesExhausted)),
            RetryFallback::SkipPhase => {
                let script = self.script.clone();
                self.state
                    .record_unanswered(script.question(phase), &script.unanswered_marker);
                self.skipped += 1;
                self.say(&script.skip_notice).await?;
                Ok(if script.is_last(phase) {
                    Step::Complete
                } else {
                    Step::Advance
                })
            }
        }
    }

    async fn advance(&mut self) -> Result<Step, Interrupt> {
        self.state.advance();
        self.failures = 0;
        if let Some(session) = &self.session {
            session.publish_phase(self.state.phase);
        }
        debug!(call_id = %self.state.call_id, phase = self.state.phase, "Advanced");

        let script = self.script.clone();
        self.say(&script.transition).await?;
        Ok(Step::Ask)
    }

    async fn complete(mut self) -> DriverOutcome {
        let script = self.script.clone();
        // The interview is over either way; a hang-up from the caller only cuts the
        // closing lines short.
        if self.say(&script.closing).await.is_ok() {
            let _ = self.say(&script.farewell).await;
        }
        self.state.record_end(&script.end_marker);
        self.io.hang_up().await;

        let outcome = DriverOutcome::Completed {
            phases: script.phase_count(),
            skipped: self.skipped,
        };
        info!(call_id = %self.state.call_id, ?outcome, "Interview complete");
        let completed = self.skipped == 0;
        self.hand_off(completed).await;
        outcome
    }

    async fn abort(mut self, reason: EndReason) -> DriverOutcome {
        let script = self.script.clone();
        if reason == EndReason::RetriesExhausted {
            let _ = self.say(&script.give_up).await;
        }
        self.state.record_end(&script.end_marker);
        self.io.hang_up().await;

        let outcome = DriverOutcome::Ended {
            phase: self.state.phase,
            reason,
        };
        warn!(call_id = %self.state.call_id, ?outcome, "Interview ended early");
        if self.state.has_answers() {
            self.hand_off(false).await;
        }
        outcome
    }

    async fn cancelled(self) -> DriverOutcome {
        let outcome = DriverOutcome::Cancelled {
            phase: self.state.phase,
        };
        info!(
            call_id = %self.state.call_id,
            phase = self.state.phase,
            history = self.state.history.len(),
            "Call session removed, stopping interview"
        );
        if self.state.has_answers() {
            self.hand_off(false).await;
        }
        outcome
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Speak a line that is not itself a question.
    ///
    /// Non-fatal delivery failures are logged and the conversation continues.
    async fn say(&self, text: &str) -> Result<(), Interrupt> {
        match self.io.speak(text).await {
            Ok(()) => Ok(()),
            Err(TransportError::Cancelled) => Err(Interrupt::Cancelled),
            Err(e) if e.is_fatal() => Err(Interrupt::Fatal(e)),
            Err(e) => {
                warn!(call_id = %self.state.call_id, error = %e, "Utterance not delivered");
                Ok(())
            }
        }
    }

    /// Absorb a failed turn into an apology and a retry.
    async fn turn_failed(&mut self, failure: TurnFailure) -> Result<Step, Interrupt> {
        match failure {
            TurnFailure::Cancelled => Err(Interrupt::Cancelled),
            TurnFailure::Configuration(e) => Err(Interrupt::Fatal(e)),
            failure => {
                warn!(
                    call_id = %self.state.call_id,
                    phase = self.state.phase,
                    failure = %failure,
                    "Turn failed"
                );
                let script = self.script.clone();
                self.say(&script.apology).await?;
                Ok(Step::Retry { trim: false })
            }
        }
    }

    /// Race a collaborator call against session teardown.
    async fn guard<T>(&self, work: impl Future<Output = T>) -> Result<T, Interrupt> {
        tokio::select! {
            value = work => Ok(value),
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
        }
    }

    /// Extract the profile and emit the record.
    ///
    /// Runs on its own task so it survives the driver task being aborted once the
    /// session is reaped.
    async fn hand_off(self, completed: bool) {
        let extractor = self.collaborators.extractor.clone();
        let sink = self.collaborators.sink.clone();
        let call_id = self.state.call_id.clone();
        let history = self.state.history;
        let artifact_dir = self.artifact_dir;

        let task = tokio::spawn(async move {
            let profile = match extractor.extract(&history).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(call_id = %call_id, error = %e, "Profile extraction failed, using empty profile");
                    Default::default()
                }
            };
            let record = InterviewRecord {
                call_id,
                artifact_dir,
                history,
                profile,
                completed,
            };
            if let Err(e) = sink.emit(&record).await {
                error!(call_id = %record.call_id, error = %e, "Failed to hand off interview record");
            }
        });

        if let Err(e) = task.await {
            error!(error = %e, "Interview hand-off task failed");
        }
    }
}
