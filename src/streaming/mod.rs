//! Streaming stages for fragment-by-fragment sanitization
//!
//! Each stage keeps only the state needed to resume on the next fragment:
//! - Tag stripping (think regions, split markers)
//! - Stop-sequence matching with partial-match carry
//! - Reasoning-prefix guarding
//! - UTF-8 reassembly for raw byte input

pub mod matcher;
pub mod prefix_guard;
pub mod tag_stripper;
pub mod utf8_buffer;

pub use matcher::{MatchOutcome, Matcher, StopHit, StopSet};
pub use prefix_guard::{GuardOutcome, PrefixGuard, PrefixSet};
pub use tag_stripper::{TagPair, TagState, TagStripper};
pub use utf8_buffer::Utf8Buffer;
