//! TwiML directive rendering
//!
//! Every webhook reply handed back to the telephony provider is one of four
//! documents:
//!
//! | Directive | Document |
//! |-----------|----------|
//! | speak | `<Say>` then `<Redirect>` back to the poll endpoint |
//! | start recording | `<Record action=".../recording-callback">` |
//! | wait | `<Pause>` then `<Redirect>` back to the poll endpoint |
//! | hang up | `<Hangup/>` |
//!
//! All but the hang-up need the public base URL. When it is missing the renderer
//! reports [`TransportError::MissingBaseUrl`] and the caller falls back to
//! [`hangup`].

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::error::{TransportError, TransportResult};
use crate::core::session::Instruction;
use crate::utils::join_path;

/// Route the provider polls for the next directive.
pub const POLL_PATH: &str = "/voice";
/// Route the provider reports finished recordings to.
pub const RECORDING_CALLBACK_PATH: &str = "/recording-callback";

/// Hang-up document, usable without any configuration.
pub const HANGUP_TWIML: &str =
    r#"<?xml version="1.0" encoding="UTF-8"?><Response><Hangup/></Response>"#;

/// Provider-side rendering knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveSettings {
    pub voice: String,
    pub language: String,
    pub record_max_length_secs: u32,
    pub finish_on_key: String,
    pub pause_length_secs: u32,
}

impl Default for DirectiveSettings {
    fn default() -> Self {
        Self {
            voice: "alice".to_string(),
            language: "ko-KR".to_string(),
            record_max_length_secs: 20,
            finish_on_key: "#".to_string(),
            pause_length_secs: 10,
        }
    }
}

/// Renders webhook replies for one deployment.
#[derive(Debug, Clone)]
pub struct TwimlRenderer {
    base_url: Option<String>,
    settings: DirectiveSettings,
}

impl TwimlRenderer {
    /// `base_url` must already be normalized (no trailing slash).
    pub fn new(base_url: Option<String>, settings: DirectiveSettings) -> Self {
        Self { base_url, settings }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn settings(&self) -> &DirectiveSettings {
        &self.settings
    }

    /// Reply to a poll: the next instruction, or a pause-and-repoll when there is none.
    pub fn poll_reply(&self, next: Option<&Instruction>) -> TransportResult<String> {
        match next {
            Some(Instruction::Utter(text)) => self.say(text),
            Some(Instruction::StartRecording) => self.record(),
            None => self.pause(),
        }
    }

    pub fn say(&self, text: &str) -> TransportResult<String> {
        let poll_url = self.url_for(POLL_PATH)?;
        let mut doc = Document::new()?;
        doc.element(
            "Say",
            &[
                ("voice", self.settings.voice.as_str()),
                ("language", self.settings.language.as_str()),
            ],
            text,
        )?;
        doc.element("Redirect", &[], &poll_url)?;
        doc.finish()
    }

    /// Record the answer, then fall through to the poll when no action request is made.
    pub fn record(&self) -> TransportResult<String> {
        let action = self.url_for(RECORDING_CALLBACK_PATH)?;
        let poll_url = self.url_for(POLL_PATH)?;
        let max_length = self.settings.record_max_length_secs.to_string();
        let mut doc = Document::new()?;
        doc.empty(
            "Record",
            &[
                ("action", action.as_str()),
                ("maxLength", max_length.as_str()),
                ("finishOnKey", self.settings.finish_on_key.as_str()),
                ("trim", "trim-silence"),
                ("playBeep", "true"),
            ],
        )?;
        doc.element("Redirect", &[], &poll_url)?;
        doc.finish()
    }

    pub fn pause(&self) -> TransportResult<String> {
        let poll_url = self.url_for(POLL_PATH)?;
        let length = self.settings.pause_length_secs.to_string();
        let mut doc = Document::new()?;
        doc.empty("Pause", &[("length", length.as_str())])?;
        doc.element("Redirect", &[], &poll_url)?;
        doc.finish()
    }

    /// Reply to a recording callback: go back to polling.
    pub fn redirect_to_poll(&self) -> TransportResult<String> {
        let poll_url = self.url_for(POLL_PATH)?;
        let mut doc = Document::new()?;
        doc.element("Redirect", &[], &poll_url)?;
        doc.finish()
    }

    fn url_for(&self, path: &str) -> TransportResult<String> {
        self.base_url
            .as_deref()
            .map(|base| join_path(base, path))
            .ok_or(TransportError::MissingBaseUrl)
    }
}

/// The hang-up document.
pub fn hangup() -> String {
    HANGUP_TWIML.to_string()
}

// =============================================================================
// Document builder
// =============================================================================

struct Document {
    writer: Writer<Vec<u8>>,
}

impl Document {
    fn new() -> TransportResult<Self> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(render_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("Response")))
            .map_err(render_error)?;
        Ok(Self { writer })
    }

    fn element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> TransportResult<()> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Start(start))
            .map_err(render_error)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(render_error)?;
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(render_error)?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> TransportResult<()> {
        let start = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.writer
            .write_event(Event::Empty(start))
            .map_err(render_error)?;
        Ok(())
    }

    fn finish(mut self) -> TransportResult<String> {
        self.writer
            .write_event(Event::End(BytesEnd::new("Response")))
            .map_err(render_error)?;
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| TransportError::Render(e.to_string()))
    }
}

fn render_error(err: impl std::fmt::Display) -> TransportError {
    TransportError::Render(err.to_string())
}
