//! Incremental decoding of a token-streamed agent reply.
//!
//! The transport delivers line-oriented fragments (`data: {json}`) whose
//! `text` payloads concatenate into either plain prose or one envelope
//! object. The decoder is an explicit state machine: it accumulates text,
//! re-attempts a full-structure parse on every fragment, and settles on a
//! terminal state when a `done` or `error` control fragment arrives.

use serde::Deserialize;

use super::envelope::{parse_envelope, MessageEnvelope};

/// Wire shape of one stream fragment. `text` extends the reply buffer;
/// `done: true` and `error` are the two terminal control signals.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StreamEvent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodeState {
    /// Fragments are accumulating; no valid envelope yet.
    #[default]
    Accumulating,
    /// A complete envelope has parsed; later fragments may still refine it.
    Resolved,
    /// Stream ended successfully; the last emitted view is final.
    Done,
    /// Stream ended with an explicit error fragment.
    Failed,
}

impl DecodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Final view of one decoded message.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedMessage {
    /// Plain-text projection of everything that accumulated. Present even
    /// when the reply never became structured data.
    pub content: String,
    pub envelope: Option<MessageEnvelope>,
    pub error: Option<String>,
}

/// Reconstructs one [`MessageEnvelope`] from a live fragment stream.
///
/// Feeding the same fragment sequence twice yields the same final state, so
/// a transport replay is safe.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    line_buffer: String,
    content: String,
    envelope: Option<MessageEnvelope>,
    error: Option<String>,
    state: DecodeState,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn envelope(&self) -> Option<&MessageEnvelope> {
        self.envelope.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Feed raw transport bytes. Chunks may split lines (and JSON tokens)
    /// anywhere; only completed lines are interpreted.
    pub fn push_chunk(&mut self, chunk: &str) {
        self.line_buffer.push_str(chunk);
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            self.process_line(line.trim());
        }
    }

    /// Flush a trailing line that never got its newline (transport closed).
    pub fn finish(&mut self) {
        if self.line_buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.line_buffer);
        self.process_line(line.trim());
    }

    /// Apply one already-parsed fragment. Fragments after a terminal state
    /// are ignored.
    pub fn apply_event(&mut self, event: StreamEvent) {
        if self.state.is_terminal() {
            return;
        }

        if let Some(text) = event.text {
            self.content.push_str(&text);
            // Re-attempt the full parse on every extension; keep the last
            // valid envelope if this extension broke it mid-token.
            if let Some(envelope) = parse_envelope(&self.content) {
                self.envelope = Some(envelope);
                self.state = DecodeState::Resolved;
            }
        }

        if let Some(message) = event.error {
            // Additive: accumulated text stays visible alongside the error.
            self.error = Some(message);
            self.state = DecodeState::Failed;
            return;
        }

        if event.done == Some(true) {
            self.state = DecodeState::Done;
        }
    }

    pub fn into_message(self) -> DecodedMessage {
        DecodedMessage { content: self.content, envelope: self.envelope, error: self.error }
    }

    fn process_line(&mut self, line: &str) {
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        // Fragments that fail structural parsing are skipped, not fatal:
        // packet boundaries can land anywhere.
        let Ok(event) = serde_json::from_str::<StreamEvent>(payload.trim()) else {
            return;
        };
        self.apply_event(event);
    }
}
