//! Telemetry Module for the stream sanitizer
//!
//! Stream terminations and discarded text are reported as structured JSON
//! log lines through the `log` facade, so any collector attached to the
//! host's logger can pick them up.

use log::{info, warn};
use serde::Serialize;

/// Sanitizer event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizeEventType {
    /// A stop sequence ended the stream
    StopSequence,
    /// A reasoning prefix ended the stream
    ReasoningPrefix,
    /// The decoder ended while the stream was still open
    DecoderEnded,
}

/// Sanitizer event for logging
#[derive(Debug, Clone, Serialize)]
pub struct SanitizeEvent {
    /// Event type
    pub event_type: SanitizeEventType,
    /// Stream / request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    /// Finish reason reported to the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Stop sequence or phrase that matched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    /// Fragments received
    pub fragments: usize,
    /// Visible bytes emitted
    pub emitted_bytes: usize,
    /// Withheld bytes dropped at close
    pub discarded_bytes: usize,
    /// Whether the stream closed inside an unterminated tag region
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unterminated_tag: bool,
}

impl SanitizeEvent {
    /// Create an event with empty counters
    pub fn new(event_type: SanitizeEventType) -> Self {
        Self {
            event_type,
            stream_id: None,
            finish_reason: None,
            matched: None,
            fragments: 0,
            emitted_bytes: 0,
            discarded_bytes: 0,
            unterminated_tag: false,
        }
    }

    /// Set stream ID
    pub fn with_stream_id(mut self, id: Option<&str>) -> Self {
        self.stream_id = id.map(str::to_string);
        self
    }

    /// Set finish reason
    pub fn with_finish_reason(mut self, reason: &str) -> Self {
        self.finish_reason = Some(reason.to_string());
        self
    }

    /// Set matched stop sequence or phrase
    pub fn with_matched(mut self, matched: &str) -> Self {
        self.matched = Some(matched.to_string());
        self
    }

    /// Copy counters from the stream statistics
    pub fn with_counts(mut self, fragments: usize, emitted_bytes: usize, discarded_bytes: usize) -> Self {
        self.fragments = fragments;
        self.emitted_bytes = emitted_bytes;
        self.discarded_bytes = discarded_bytes;
        self
    }

    /// Mark a close inside an unterminated tag region
    pub fn with_unterminated_tag(mut self, unterminated: bool) -> Self {
        self.unterminated_tag = unterminated;
        self
    }

    /// Log the event
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                // Heuristic truncation; worth auditing for false positives
                SanitizeEventType::ReasoningPrefix => {
                    warn!("[STREAM-SANITIZER] {}", json);
                }
                _ => {
                    info!("[STREAM-SANITIZER] {}", json);
                }
            },
            Err(e) => {
                warn!("Failed to serialize sanitizer event: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SanitizeEvent::new(SanitizeEventType::StopSequence)
            .with_stream_id(Some("req-123"))
            .with_finish_reason("stop")
            .with_matched("<|eot_id|>")
            .with_counts(3, 11, 0);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"stop_sequence\""));
        assert!(json.contains("req-123"));
        assert!(json.contains("<|eot_id|>"));
        assert!(json.contains("\"emitted_bytes\":11"));
        assert!(!json.contains("unterminated_tag"));
    }

    #[test]
    fn test_optional_fields_skipped() {
        let event = SanitizeEvent::new(SanitizeEventType::DecoderEnded)
            .with_stream_id(None)
            .with_unterminated_tag(true);

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("stream_id"));
        assert!(!json.contains("matched"));
        assert!(json.contains("\"unterminated_tag\":true"));
    }
}
