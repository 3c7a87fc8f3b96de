//! Stream sanitizer for LLM decoder output
//!
//! Turns the raw fragments produced by a decoder into clean output
//! fragments for an OpenAI-style streaming response:
//! - stop sequences are enforced even when split across fragments
//! - `<think>`-style regions are elided, including split and unterminated tags
//! - narrated reasoning openers cut the visible output short
//!
//! The engine is pure text-in/text-out; transport and framing belong to the
//! caller.
//!
//! ```
//! use stream_sanitizer::{DecoderEnd, SanitizerConfig, SanitizingStream};
//!
//! let settings = SanitizerConfig::default().compile().unwrap();
//! let mut stream = SanitizingStream::new(&settings);
//!
//! let mut out = String::new();
//! for fragment in ["Hello", " there<end_", "of_turn>ignored"] {
//!     out.push_str(stream.advance(fragment).text());
//! }
//! out.push_str(stream.finish(DecoderEnd::Natural).text());
//! assert_eq!(out, "Hello there");
//! ```

pub mod completion;
pub mod config;
pub mod sanitizer;
pub mod streaming;
pub mod telemetry;

pub use completion::{sanitize_completion, SanitizedCompletion};
pub use config::{ConfigError, SanitizerConfig, StreamSettings};
pub use sanitizer::{DecoderEnd, FinishReason, SanitizingStream, StreamOutput, StreamStats};
pub use streaming::{PrefixSet, StopSet, TagPair};
