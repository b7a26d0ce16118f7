//! Shared application state
//!
//! [`AppState`] owns the call registry and the directive renderer the webhook handlers
//! use. Building it wires every call's driver to its collaborators:
//!
//! ```text
//! AppState
//!   ├── ServerConfig
//!   ├── TwimlRenderer
//!   └── CallRegistry ── InterviewLauncher ── ControlPlane (http | local)
//!                                          ├── TwilioApi
//!                                          └── Collaborators
//! ```
//!
//! Collaborators without credentials are replaced by placeholders that fail every
//! request, so the gateway still answers webhooks with incomplete configuration.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ControlMode, ServerConfig};
use crate::core::collaborators::{
    AnswerValidator, CollaboratorError, CorrectingTranscriber, FileTranscriptSink, OpenAiChat,
    OpenAiConfig, OpenAiProfileExtractor, OpenAiValidator, ProfileExtractor, RtzrConfig,
    RtzrTranscriber, Transcriber, Unconfigured,
};
use crate::core::dialogue::{Collaborators, InterviewLauncher, InterviewScript, ScriptError};
use crate::core::session::CallRegistry;
use crate::core::transport::{
    ControlPlane, HttpControlPlane, LocalControlPlane, TelephonyApi, TransportError, TwilioApi,
    TwilioCredentials, TwimlRenderer,
};

const OPENAI_TIMEOUT: Duration = Duration::from_secs(30);
const TELEPHONY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to load interview script: {0}")]
    Script(#[from] ScriptError),

    #[error("Failed to initialise telephony transport: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to initialise collaborator: {0}")]
    Collaborator(#[from] CollaboratorError),
}

pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<CallRegistry>,
    pub renderer: TwimlRenderer,
    pub script: Arc<InterviewScript>,
}

impl AppState {
    /// Build the state from configuration, loading the script and collaborators it names.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, StartupError> {
        let script = Arc::new(load_script(&config)?);
        let collaborators = build_collaborators(&config, &script)?;

        let credentials = match (&config.twilio_account_sid, &config.twilio_auth_token) {
            (Some(sid), Some(token)) => Some(TwilioCredentials {
                account_sid: sid.clone(),
                auth_token: token.clone(),
            }),
            _ => {
                warn!("Twilio credentials not configured, calls cannot be terminated from the gateway");
                None
            }
        };
        let telephony: Arc<dyn TelephonyApi> = Arc::new(TwilioApi::new(
            config.twilio_api_base_url.clone(),
            credentials,
            TELEPHONY_TIMEOUT,
        )?);

        Self::assemble(config, script, collaborators, telephony)
    }

    /// Build the state around explicit collaborators and telephony API.
    pub fn assemble(
        config: ServerConfig,
        script: Arc<InterviewScript>,
        collaborators: Collaborators,
        telephony: Arc<dyn TelephonyApi>,
    ) -> Result<Arc<Self>, StartupError> {
        if config.public_base_url.is_none() {
            warn!("SERVER_URL is not configured, every call will be hung up");
        }

        let http_control: Option<Arc<dyn ControlPlane>> = match config.control_mode {
            ControlMode::Http => Some(Arc::new(HttpControlPlane::new(
                config.public_base_url.clone(),
                config.control_secret(),
                config.control_timeout,
            )?)),
            ControlMode::Local => None,
        };

        let base_url = config.public_base_url.clone();
        let policy = config.dialogue_policy();
        let timeouts = config.transport_timeouts();
        let recordings_dir = config.recordings_dir.clone();
        let launcher_script = script.clone();

        let registry = Arc::new_cyclic(|registry| {
            let control = http_control
                .unwrap_or_else(|| Arc::new(LocalControlPlane::new(registry.clone(), base_url)));
            let launcher = InterviewLauncher::new(
                control,
                telephony,
                collaborators,
                launcher_script,
                policy,
                timeouts,
                recordings_dir,
            );
            CallRegistry::new(Arc::new(launcher))
        });

        let renderer = TwimlRenderer::new(config.public_base_url.clone(), config.directive_settings());

        info!(
            control_mode = %config.control_mode,
            phases = script.phase_count(),
            recordings_dir = %config.recordings_dir.display(),
            "Application state initialised"
        );

        Ok(Arc::new(Self {
            config,
            registry,
            renderer,
            script,
        }))
    }
}

pub fn load_script(config: &ServerConfig) -> Result<InterviewScript, ScriptError> {
    match &config.script_path {
        Some(path) => {
            info!(path = %path.display(), "Loading interview script");
            InterviewScript::from_file(path)
        }
        None => Ok(InterviewScript::default()),
    }
}

fn build_collaborators(
    config: &ServerConfig,
    script: &InterviewScript,
) -> Result<Collaborators, StartupError> {
    let chat = match config.openai_api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Some(Arc::new(OpenAiChat::new(OpenAiConfig {
            api_key: key.to_string(),
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.clone(),
            timeout: OPENAI_TIMEOUT,
        })?)),
        None => {
            warn!("OPENAI_API_KEY not configured, answers cannot be validated");
            None
        }
    };

    let rtzr = match (&config.rtzr_api_id, &config.rtzr_api_key) {
        (Some(id), Some(key)) => {
            let mut rtzr_config = RtzrConfig::new(id.clone(), key.clone());
            rtzr_config.base_url = config.rtzr_base_url.clone();
            Some(RtzrTranscriber::new(rtzr_config)?)
        }
        _ => {
            warn!("RTZR credentials not configured, answers cannot be transcribed");
            None
        }
    };

    let transcriber: Arc<dyn Transcriber> = match (rtzr, &chat) {
        (Some(rtzr), Some(chat)) if config.transcript_correction => {
            Arc::new(CorrectingTranscriber::new(rtzr, chat.clone(), None))
        }
        (Some(rtzr), _) => Arc::new(rtzr),
        (None, _) => Arc::new(Unconfigured("rtzr")),
    };

    let validator: Arc<dyn AnswerValidator> = match &chat {
        Some(chat) => Arc::new(OpenAiValidator::new(chat.clone())),
        None => Arc::new(Unconfigured("openai")),
    };

    let extractor: Arc<dyn ProfileExtractor> = match &chat {
        Some(chat) => Arc::new(OpenAiProfileExtractor::new(
            chat.clone(),
            script.extraction_prompt.clone(),
            config.profile_tagging,
        )),
        None => Arc::new(Unconfigured("openai")),
    };

    Ok(Collaborators {
        transcriber,
        validator,
        extractor,
        sink: Arc::new(FileTranscriptSink::new()),
    })
}
