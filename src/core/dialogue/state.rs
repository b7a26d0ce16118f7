//! Conversation state threaded through the dialogue driver.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Ai,
    User,
    /// Markers that were never spoken
    System,
}

/// One line of the interview transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    /// `AI : ...`, `User : ...`, or the bare text of a marker.
    pub fn render(&self) -> String {
        match self.speaker {
            Speaker::Ai => format!("AI : {}", self.text),
            Speaker::User => format!("User : {}", self.text),
            Speaker::System => self.text.clone(),
        }
    }
}

/// Owned exclusively by the driver of one call.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub call_id: String,
    /// Zero-based index of the current question
    pub phase: usize,
    pub history: Vec<TranscriptLine>,
    pub last_response: String,
}

impl ConversationState {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            ..Default::default()
        }
    }

    pub fn record_greeting(&mut self, line: &str) {
        self.history.push(TranscriptLine::new(Speaker::Ai, line));
    }

    /// Append one question/answer pair.
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.history.push(TranscriptLine::new(Speaker::Ai, question));
        self.history.push(TranscriptLine::new(Speaker::User, answer));
        self.last_response = answer.to_string();
    }

    /// Drop the pair added by the failed attempt.
    ///
    /// Only a trailing question/answer pair is removed; returns whether one was.
    pub fn discard_last_exchange(&mut self) -> bool {
        let len = self.history.len();
        let is_pair = len >= 2
            && self.history[len - 2].speaker == Speaker::Ai
            && self.history[len - 1].speaker == Speaker::User;
        if is_pair {
            self.history.truncate(len - 2);
        }
        is_pair
    }

    pub fn advance(&mut self) {
        self.phase += 1;
    }

    pub fn record_unanswered(&mut self, question: &str, marker: &str) {
        self.history.push(TranscriptLine::new(Speaker::Ai, question));
        self.history.push(TranscriptLine::new(Speaker::System, marker));
    }

    pub fn record_end(&mut self, marker: &str) {
        self.history.push(TranscriptLine::new(Speaker::System, marker));
    }

    /// Whether the caller has answered anything yet.
    pub fn has_answers(&self) -> bool {
        self.history.iter().any(|l| l.speaker == Speaker::User)
    }
}
