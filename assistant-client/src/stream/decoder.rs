//! Incremental decoder for the chatbot's blank-line separated event stream.
//!
//! Chunks may split records, lines or UTF-8 sequences anywhere; feeding the
//! same bytes in any chunking yields the same events.

use serde::Deserialize;

use crate::models::CompleteEvent;

const RECORD_SEPARATOR: &str = "\n\n";
const DATA_PREFIX: &str = "data:";

/// A protocol event recovered from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    SessionId(String),
    Complete(Box<CompleteEvent>),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEvent {
    SessionId {
        #[serde(default, deserialize_with = "crate::models::wire::lenient")]
        session_id: Option<String>,
    },
    Complete(CompleteEvent),
}

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: String,
    /// Tail of an incomplete UTF-8 sequence from the previous chunk.
    pending: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.decode_utf8(chunk);

        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(end) = self.buffer.find(RECORD_SEPARATOR) {
            let record: String = self.buffer.drain(..end + RECORD_SEPARATOR.len()).collect();
            if let Some(event) = parse_record(&record[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// End of stream. An unterminated trailing record is dropped.
    pub fn finish(self) {
        if !self.buffer.trim().is_empty() || !self.pending.is_empty() {
            tracing::debug!(
                trailing_bytes = self.buffer.len() + self.pending.len(),
                "Discarding unterminated stream record"
            );
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn parse_record(record: &str) -> Option<StreamEvent> {
    let payload = record
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<RawEvent>(&payload) {
        Ok(RawEvent::SessionId { session_id }) => session_id
            .filter(|id| !id.is_empty())
            .map(StreamEvent::SessionId),
        Ok(RawEvent::Complete(event)) => Some(StreamEvent::Complete(Box::new(event))),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping undecodable stream record");
            None
        }
    }
}
