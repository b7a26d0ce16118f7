//! Per-call instruction queue.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

/// One directive awaiting delivery to the telephony transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Instruction {
    /// Speak the text to the caller
    Utter(String),
    /// Begin capturing the caller's answer
    StartRecording,
}

impl Instruction {
    pub fn utter(text: impl Into<String>) -> Self {
        Self::Utter(text.into())
    }

    /// Recording pre-empts any utterance still waiting in the queue.
    fn is_priority(&self) -> bool {
        matches!(self, Self::StartRecording)
    }
}

/// FIFO of pending instructions with front insertion for [`Instruction::StartRecording`].
///
/// Never blocks: both ends take a short lock and return immediately.
#[derive(Debug, Default)]
pub struct InstructionQueue {
    items: Mutex<VecDeque<Instruction>>,
}

impl InstructionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, instruction: Instruction) {
        let mut items = self.items.lock();
        if instruction.is_priority() {
            items.push_front(instruction);
        } else {
            items.push_back(instruction);
        }
    }

    pub fn dequeue_next(&self) -> Option<Instruction> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterances_are_fifo() {
        let queue = InstructionQueue::new();
        queue.enqueue(Instruction::utter("A"));
        queue.enqueue(Instruction::utter("B"));

        assert_eq!(queue.dequeue_next(), Some(Instruction::utter("A")));
        assert_eq!(queue.dequeue_next(), Some(Instruction::utter("B")));
        assert_eq!(queue.dequeue_next(), None);
    }

    #[test]
    fn test_start_recording_jumps_the_queue() {
        let queue = InstructionQueue::new();
        queue.enqueue(Instruction::utter("A"));
        queue.enqueue(Instruction::StartRecording);

        assert_eq!(queue.dequeue_next(), Some(Instruction::StartRecording));
        assert_eq!(queue.dequeue_next(), Some(Instruction::utter("A")));
    }

    #[test]
    fn test_empty_queue_returns_none() {
        let queue = InstructionQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue_next(), None);
    }

    #[test]
    fn test_clear_drops_pending() {
        let queue = InstructionQueue::new();
        queue.enqueue(Instruction::utter("A"));
        queue.enqueue(Instruction::StartRecording);
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_instruction_serializes_tagged() {
        let json = serde_json::to_value(Instruction::utter("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "utter", "text": "hi"}));

        let json = serde_json::to_value(Instruction::StartRecording).unwrap();
        assert_eq!(json, serde_json::json!({"type": "start_recording"}));
    }
}
