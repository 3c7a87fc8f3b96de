//! Non-streaming completions
//!
//! A full completion is sanitized by running it through a fresh stream as a
//! single fragment, so both paths apply exactly the same rules.

use crate::config::StreamSettings;
use crate::sanitizer::{DecoderEnd, FinishReason, SanitizingStream};

/// Sanitized completion text plus the reason it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedCompletion {
    /// Visible text with surrounding whitespace trimmed; may be empty
    pub content: String,
    pub finish_reason: FinishReason,
}

impl SanitizedCompletion {
    /// Check if nothing visible is left; the caller decides on a fallback
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Sanitize a complete decoder output.
///
/// `upstream_hint` is the decoder's own `finish_reason`, if it reported one.
pub fn sanitize_completion(
    text: &str,
    settings: &StreamSettings,
    upstream_hint: Option<&str>,
) -> SanitizedCompletion {
    let mut stream = SanitizingStream::new(settings);
    let mut content = String::with_capacity(text.len());

    let first = stream.advance(text);
    content.push_str(first.text());
    let finish_reason = match first.finish_reason {
        Some(reason) => reason,
        None => {
            let last = stream.finish(DecoderEnd::from_hint(upstream_hint));
            content.push_str(last.text());
            last.finish_reason.unwrap_or(FinishReason::Stop)
        }
    };

    SanitizedCompletion {
        content: content.trim().to_string(),
        finish_reason,
    }
}
