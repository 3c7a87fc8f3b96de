//! Configuration module for the stream sanitizer
//!
//! Configuration is supplied by the serving layer (usually as JSON) once at
//! startup, validated once, and then shared read-only by every stream.

use serde::Deserialize;
use thiserror::Error;

use crate::streaming::{PrefixSet, StopSet, TagPair};

/// Raw sanitizer configuration as supplied by the serving layer
#[derive(Clone, Debug, Deserialize)]
pub struct SanitizerConfig {
    /// Strings that terminate generation when they appear in the output
    #[serde(default = "default_stop_sequences")]
    pub stop_sequences: Vec<String>,

    /// Marker opening an elided thinking region
    #[serde(default = "default_think_start")]
    pub think_start: String,

    /// Marker closing an elided thinking region
    #[serde(default = "default_think_end")]
    pub think_end: String,

    /// Phrases that indicate the model started narrating its reasoning
    #[serde(default = "default_reasoning_prefixes")]
    pub reasoning_prefixes: Vec<String>,

    /// Whether to emit structured telemetry events on stream termination
    #[serde(default = "default_log_events")]
    pub log_events: bool,
}

/// Chat-template control tokens that must never reach the client
fn default_stop_sequences() -> Vec<String> {
    vec![
        "<end_of_turn>".to_string(),
        "<start_of_turn>".to_string(),
        "<|end|>".to_string(),
        "<|start|>".to_string(),
        "<|eot_id|>".to_string(),
    ]
}

fn default_think_start() -> String {
    "<think>".to_string()
}

fn default_think_end() -> String {
    "</think>".to_string()
}

fn default_reasoning_prefixes() -> Vec<String> {
    vec![
        "Let me think".to_string(),
        "Let's think".to_string(),
        "Okay, so the user".to_string(),
        "The user is asking".to_string(),
        "The user wants".to_string(),
        "First, I need to".to_string(),
    ]
}

fn default_log_events() -> bool {
    true
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            stop_sequences: default_stop_sequences(),
            think_start: default_think_start(),
            think_end: default_think_end(),
            reasoning_prefixes: default_reasoning_prefixes(),
            log_events: default_log_events(),
        }
    }
}

impl SanitizerConfig {
    /// Parse configuration from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str =
            std::str::from_utf8(bytes).map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        serde_json::from_str(config_str).map_err(|e| ConfigError::InvalidJson(e.to_string()))
    }

    /// Validate the configuration and build the immutable per-stream settings.
    ///
    /// Fails fast on any invariant violation so that streams never have to
    /// re-check their configuration.
    pub fn compile(&self) -> Result<StreamSettings, ConfigError> {
        Ok(StreamSettings {
            stop_set: StopSet::new(self.stop_sequences.iter().cloned())?,
            tag_pair: TagPair::new(self.think_start.clone(), self.think_end.clone())?,
            prefix_set: PrefixSet::new(self.reasoning_prefixes.iter().cloned())?,
            log_events: self.log_events,
        })
    }
}

/// Validated settings consumed by [`crate::SanitizingStream`]
#[derive(Clone, Debug)]
pub struct StreamSettings {
    /// Stop sequences
    pub stop_set: StopSet,
    /// Thinking-region markers
    pub tag_pair: TagPair,
    /// Reasoning-prefix phrases
    pub prefix_set: PrefixSet,
    /// Whether streams emit telemetry events
    pub log_events: bool,
}

impl StreamSettings {
    /// Assemble settings from already-validated parts
    pub fn new(stop_set: StopSet, tag_pair: TagPair, prefix_set: PrefixSet) -> Self {
        Self {
            stop_set,
            tag_pair,
            prefix_set,
            log_events: default_log_events(),
        }
    }

    /// Toggle telemetry event emission
    pub fn with_log_events(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("stop sequence at index {0} is empty")]
    EmptyStopSequence(usize),
    #[error("tag marker must not be empty")]
    EmptyTagMarker,
    #[error("tag start and end markers are identical: '{0}'")]
    IdenticalTagMarkers(String),
    #[error("reasoning prefix at index {0} is empty")]
    EmptyReasoningPrefix(usize),
}
