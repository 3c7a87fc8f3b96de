//! Sanitizing Stream
//!
//! Per-request orchestrator. Each fragment flows through
//! `TagStripper -> Matcher -> PrefixGuard`; tag content therefore never
//! takes part in stop-sequence or prefix detection, and a stop sequence
//! inside a tag region is not detected.
//!
//! One instance per request. Methods take `&mut self`, so an instance is
//! never driven from two places at once; dropping it is the only teardown.

use log::{debug, trace};
use serde::Serialize;

use crate::config::{ConfigError, SanitizerConfig, StreamSettings};
use crate::streaming::{GuardOutcome, Matcher, PrefixGuard, TagStripper, Utf8Buffer};
use crate::telemetry::{SanitizeEvent, SanitizeEventType};

/// Why a stream ended, as reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A stop sequence or reasoning prefix fired, or the decoder stopped naturally
    Stop,
    /// The decoder hit its length limit while the stream was open
    Length,
    /// Input stopped before anything fired
    Cancelled,
}

impl FinishReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// End-of-decoder signal supplied by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderEnd {
    /// The decoder finished on its own (EOS token, upstream stop)
    Natural,
    /// The decoder's token limit was reached
    Length,
    /// The caller gave up (client disconnect, abort)
    Cancelled,
}

impl DecoderEnd {
    /// Map an upstream `finish_reason` hint to an end signal
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some("length") => DecoderEnd::Length,
            Some("cancelled") | Some("abort") => DecoderEnd::Cancelled,
            _ => DecoderEnd::Natural,
        }
    }

    fn finish_reason(self) -> FinishReason {
        match self {
            DecoderEnd::Natural => FinishReason::Stop,
            DecoderEnd::Length => FinishReason::Length,
            DecoderEnd::Cancelled => FinishReason::Cancelled,
        }
    }
}

/// Output of one `advance` / `finish` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutput {
    /// Visible text ready to send, if any
    pub text: Option<String>,
    /// Set exactly once, on the call that closed the stream
    pub finish_reason: Option<FinishReason>,
}

impl StreamOutput {
    fn open(text: String) -> Self {
        Self {
            text: (!text.is_empty()).then_some(text),
            finish_reason: None,
        }
    }

    fn closed(text: String, reason: FinishReason) -> Self {
        Self {
            text: (!text.is_empty()).then_some(text),
            finish_reason: Some(reason),
        }
    }

    /// Check if this output closed the stream
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Visible text, empty when none
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Per-stream counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Fragments accepted while open
    pub fragments: usize,
    /// Visible bytes emitted
    pub emitted_bytes: usize,
    /// Withheld bytes dropped at close
    pub discarded_bytes: usize,
}

/// Stateful sanitizer for one generation request
pub struct SanitizingStream {
    stripper: TagStripper,
    matcher: Matcher,
    guard: PrefixGuard,
    utf8: Utf8Buffer,
    /// Whether any visible output has been produced yet
    emitted_any: bool,
    /// Terminal condition reached; further input is ignored
    finished: bool,
    finish_reason: Option<FinishReason>,
    stream_id: Option<String>,
    log_events: bool,
    stats: StreamStats,
}

impl SanitizingStream {
    /// Create a stream from validated settings
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            stripper: TagStripper::new(settings.tag_pair.clone()),
            matcher: Matcher::new(settings.stop_set.clone()),
            guard: PrefixGuard::new(settings.prefix_set.clone()),
            utf8: Utf8Buffer::new(),
            emitted_any: false,
            finished: false,
            finish_reason: None,
            stream_id: None,
            log_events: settings.log_events,
            stats: StreamStats::default(),
        }
    }

    /// Validate a raw configuration and create a stream from it
    pub fn from_config(config: &SanitizerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.compile()?))
    }

    /// Attach a request ID used in telemetry
    pub fn with_stream_id(mut self, id: impl Into<String>) -> Self {
        self.stream_id = Some(id.into());
        self
    }

    /// Process one decoder fragment.
    pub fn advance(&mut self, fragment: &str) -> StreamOutput {
        if self.finished {
            trace!("[stream={}] ignoring fragment after close", self.id());
            return StreamOutput::default();
        }
        self.stats.fragments += 1;

        let visible = self.stripper.advance(fragment);
        self.pass_visible(&visible)
    }

    /// Process one chunk of raw decoder bytes.
    ///
    /// Multi-byte characters split across chunks are reassembled first.
    pub fn advance_bytes(&mut self, chunk: &[u8]) -> StreamOutput {
        if self.finished {
            return StreamOutput::default();
        }
        let text = self.utf8.push(chunk);
        self.advance(&text)
    }

    /// Signal the end of the decoder output.
    ///
    /// A trailing partial tag marker outside any tag region can no longer
    /// complete, so on a natural or length end it goes through stop matching
    /// and the prefix guard as plain text. Stop-sequence carry and content of
    /// an unterminated tag region are discarded. Text withheld only by the
    /// prefix guard is released unless the stream was cancelled. No-op once
    /// the stream is closed.
    pub fn finish(&mut self, end: DecoderEnd) -> StreamOutput {
        if self.finished {
            return StreamOutput::default();
        }

        let mut discarded = self.utf8.discard();

        let mut released = String::new();
        if end != DecoderEnd::Cancelled && !self.stripper.is_inside_tag() {
            let partial = self.stripper.take_partial();
            let output = self.pass_visible(&partial);
            if output.is_final() {
                self.stats.discarded_bytes += discarded;
                return output;
            }
            released = output.text.unwrap_or_default();
        }

        discarded += self.matcher.discard_carry() + self.stripper.discard_partial();
        self.stats.discarded_bytes += discarded;
        if discarded > 0 {
            debug!(
                "[stream={}] discarding {} withheld bytes at end of decoder output",
                self.id(),
                discarded
            );
        }
        if self.stripper.is_inside_tag() {
            debug!(
                "[stream={}] decoder ended inside an unterminated tag region",
                self.id()
            );
        }

        let tail = match end {
            DecoderEnd::Cancelled => {
                let held = self.guard.flush();
                self.stats.discarded_bytes += held.len();
                String::new()
            }
            DecoderEnd::Natural | DecoderEnd::Length => self.guard.flush(),
        };

        let mut output = self.close(tail, end.finish_reason());
        self.report(SanitizeEventType::DecoderEnded, None);
        if !released.is_empty() {
            released.push_str(output.text());
            output.text = Some(released);
        }
        output
    }

    /// Check if the stream is closed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reason the stream closed with, once closed
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    /// Whether any visible text has been emitted
    pub fn emitted_any(&self) -> bool {
        self.emitted_any
    }

    /// Whether the stream is currently inside a tag region
    pub fn in_tag(&self) -> bool {
        self.stripper.is_inside_tag()
    }

    /// Text withheld by the matcher as a possible stop-sequence start
    pub fn carry(&self) -> &str {
        self.matcher.carry()
    }

    /// Counters accumulated over the stream's lifetime
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Request ID attached with `with_stream_id`
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Run tag-free text through stop matching and the prefix guard
    fn pass_visible(&mut self, visible: &str) -> StreamOutput {
        let matched = self.matcher.advance(visible);

        match self.guard.check(&matched.safe, self.emitted_any) {
            GuardOutcome::Triggered {
                truncated, phrase, ..
            } => {
                debug!(
                    "[stream={}] reasoning prefix '{}' detected, closing",
                    self.id(),
                    phrase
                );
                let output = self.close(truncated, FinishReason::Stop);
                self.report(SanitizeEventType::ReasoningPrefix, Some(&phrase));
                output
            }
            GuardOutcome::Pass(mut text) => match matched.hit {
                Some(hit) => {
                    debug!(
                        "[stream={}] stop sequence '{}' detected, closing",
                        self.id(),
                        hit.sequence
                    );
                    // No phrase can complete past the stop point
                    text.push_str(&self.guard.flush());
                    let output = self.close(text, FinishReason::Stop);
                    self.report(SanitizeEventType::StopSequence, Some(&hit.sequence));
                    output
                }
                None => {
                    self.record_emitted(&text);
                    StreamOutput::open(text)
                }
            },
        }
    }

    fn id(&self) -> &str {
        self.stream_id.as_deref().unwrap_or("-")
    }

    fn close(&mut self, text: String, reason: FinishReason) -> StreamOutput {
        self.finished = true;
        self.finish_reason = Some(reason);
        self.record_emitted(&text);
        StreamOutput::closed(text, reason)
    }

    fn record_emitted(&mut self, text: &str) {
        if !text.is_empty() {
            self.emitted_any = true;
            self.stats.emitted_bytes += text.len();
        }
    }

    fn report(&self, event_type: SanitizeEventType, matched: Option<&str>) {
        if !self.log_events {
            return;
        }

        let mut event = SanitizeEvent::new(event_type)
            .with_stream_id(self.stream_id.as_deref())
            .with_counts(
                self.stats.fragments,
                self.stats.emitted_bytes,
                self.stats.discarded_bytes,
            )
            .with_unterminated_tag(self.stripper.is_inside_tag());

        if let Some(reason) = self.finish_reason {
            event = event.with_finish_reason(reason.as_str());
        }
        if let Some(m) = matched {
            event = event.with_matched(m);
        }

        event.emit();
    }
}
