//! Incremental Stop-Sequence Matching
//!
//! Stop sequences can straddle fragment boundaries. The matcher never
//! releases text that is, or could still become, part of a stop sequence:
//! a trailing partial match is carried over and re-scanned together with
//! the next fragment.

use crate::config::ConfigError;

/// Ordered set of distinct, non-empty stop sequences
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopSet {
    sequences: Vec<String>,
}

impl StopSet {
    /// Build a stop set, rejecting empty entries and collapsing duplicates
    pub fn new<I, S>(sequences: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for (index, sequence) in sequences.into_iter().enumerate() {
            let sequence = sequence.into();
            if sequence.is_empty() {
                return Err(ConfigError::EmptyStopSequence(index));
            }
            if !unique.contains(&sequence) {
                unique.push(sequence);
            }
        }
        Ok(Self { sequences: unique })
    }

    /// Configured sequences in configuration order
    pub fn sequences(&self) -> &[String] {
        &self.sequences
    }

    /// Find the earliest full occurrence of any stop sequence.
    ///
    /// Sequences starting at the same offset resolve to the first configured.
    pub fn earliest_match(&self, buffer: &str) -> Option<StopHit> {
        let mut best: Option<StopHit> = None;

        for (index, sequence) in self.sequences.iter().enumerate() {
            if let Some(position) = buffer.find(sequence.as_str()) {
                if best.as_ref().is_none_or(|hit| position < hit.position) {
                    best = Some(StopHit {
                        sequence_index: index,
                        sequence: sequence.clone(),
                        position,
                    });
                }
            }
        }

        best
    }
}

/// Details of a stop-sequence hit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopHit {
    /// Index of the sequence in the stop set
    pub sequence_index: usize,
    /// The sequence that matched
    pub sequence: String,
    /// Byte offset of the match inside the scanned candidate (`carry ++ input`)
    pub position: usize,
}

/// Result of advancing the matcher by one fragment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Text proven free of any stop sequence
    pub safe: String,
    /// Set when a stop sequence was found; the stream is done
    pub hit: Option<StopHit>,
}

impl MatchOutcome {
    /// Check if a stop sequence ended the stream
    pub fn is_hit(&self) -> bool {
        self.hit.is_some()
    }
}

/// Stateful stop-sequence matcher for one stream
#[derive(Clone, Debug)]
pub struct Matcher {
    stop_set: StopSet,
    /// Retained suffix that may still grow into a stop sequence
    carry: String,
}

impl Matcher {
    /// Create a matcher with an empty carry
    pub fn new(stop_set: StopSet) -> Self {
        Self {
            stop_set,
            carry: String::new(),
        }
    }

    /// Scan `carry ++ text`, releasing the safe prefix.
    ///
    /// On a hit the carry is dropped along with everything from the match on.
    pub fn advance(&mut self, text: &str) -> MatchOutcome {
        let mut candidate = std::mem::take(&mut self.carry);
        candidate.push_str(text);

        if let Some(hit) = self.stop_set.earliest_match(&candidate) {
            candidate.truncate(hit.position);
            return MatchOutcome {
                safe: candidate,
                hit: Some(hit),
            };
        }

        let split = partial_tail_start(
            &candidate,
            self.stop_set.sequences().iter().map(String::as_str),
        );
        self.carry = candidate.split_off(split);

        MatchOutcome {
            safe: candidate,
            hit: None,
        }
    }

    /// Text currently withheld as a possible stop-sequence start
    pub fn carry(&self) -> &str {
        &self.carry
    }

    /// Drop the carry, returning how many bytes were withheld
    pub fn discard_carry(&mut self) -> usize {
        let len = self.carry.len();
        self.carry.clear();
        len
    }
}

/// Start offset of the longest suffix of `buffer` that is a proper prefix of
/// any of `patterns`; `buffer.len()` when no suffix qualifies.
///
/// Only `char` boundaries are considered, so the split is always valid.
pub(crate) fn partial_tail_start<'a, I>(buffer: &str, patterns: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let buffer_len = buffer.len();
    let mut best = buffer_len;

    for pattern in patterns {
        if pattern.len() <= 1 || buffer_len == 0 {
            continue;
        }

        let max_len = buffer_len.min(pattern.len() - 1);
        for len in (1..=max_len).rev() {
            let start = buffer_len - len;
            if start >= best {
                break;
            }
            if !buffer.is_char_boundary(start) {
                continue;
            }
            if pattern.starts_with(&buffer[start..]) {
                best = start;
                break;
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(sequences: &[&str]) -> Matcher {
        Matcher::new(StopSet::new(sequences.iter().copied()).unwrap())
    }

    #[test]
    fn test_empty_candidate() {
        let mut m = matcher(&["STOP"]);
        let outcome = m.advance("");
        assert_eq!(outcome.safe, "");
        assert!(!outcome.is_hit());
        assert_eq!(m.carry(), "");
    }

    #[test]
    fn test_no_match_passes_everything() {
        let mut m = matcher(&["STOP"]);
        let outcome = m.advance("hello world");
        assert_eq!(outcome.safe, "hello world");
        assert_eq!(m.carry(), "");
    }

    #[test]
    fn test_full_match_truncates() {
        let mut m = matcher(&["STOP"]);
        let outcome = m.advance("Hello STOP more");
        assert_eq!(outcome.safe, "Hello ");
        let hit = outcome.hit.unwrap();
        assert_eq!(hit.sequence, "STOP");
        assert_eq!(hit.position, 6);
    }

    #[test]
    fn test_partial_tail_is_carried() {
        let mut m = matcher(&["STOP"]);
        let outcome = m.advance("Hello ST");
        assert_eq!(outcome.safe, "Hello ");
        assert!(!outcome.is_hit());
        assert_eq!(m.carry(), "ST");
    }

    #[test]
    fn test_cross_fragment_match() {
        let mut m = matcher(&["STOP"]);
        assert_eq!(m.advance("Hello wor").safe, "Hello wor");
        let outcome = m.advance("ldST");
        assert_eq!(outcome.safe, "ld");
        let outcome = m.advance("OP tail");
        assert_eq!(outcome.safe, "");
        assert!(outcome.is_hit());
    }

    #[test]
    fn test_broken_partial_is_released() {
        let mut m = matcher(&["STOP"]);
        assert_eq!(m.advance("ST").safe, "");
        let outcome = m.advance("AR");
        assert_eq!(outcome.safe, "STAR");
        assert_eq!(m.carry(), "");
    }

    #[test]
    fn test_earliest_occurrence_wins() {
        let mut m = matcher(&["<|end|>", "END"]);
        let outcome = m.advance("a END b <|end|>");
        assert_eq!(outcome.safe, "a ");
        assert_eq!(outcome.hit.unwrap().sequence, "END");
    }

    #[test]
    fn test_tie_resolves_to_first_configured() {
        let mut m = matcher(&["<|e", "<|end|>"]);
        let hit = m.advance("x<|end|>").hit.unwrap();
        assert_eq!(hit.sequence_index, 0);
        assert_eq!(hit.position, 1);
    }

    #[test]
    fn test_prefix_sequence_still_detected() {
        // "AB" is a prefix of "ABC"; the full match of "AB" beats retention
        let mut m = matcher(&["ABC", "AB"]);
        let outcome = m.advance("xxAB");
        assert_eq!(outcome.safe, "xx");
        assert_eq!(outcome.hit.unwrap().sequence, "AB");
    }

    #[test]
    fn test_longest_partial_across_sequences() {
        let mut m = matcher(&["<end_of_turn>", "<|eot_id|>"]);
        let outcome = m.advance("answer<|eot");
        assert_eq!(outcome.safe, "answer");
        assert_eq!(m.carry(), "<|eot");
    }

    #[test]
    fn test_multibyte_boundaries() {
        let mut m = matcher(&["é!"]);
        let outcome = m.advance("café");
        assert_eq!(outcome.safe, "caf");
        assert_eq!(m.carry(), "é");
        let outcome = m.advance("!");
        assert!(outcome.is_hit());
        assert_eq!(outcome.safe, "");
    }

    #[test]
    fn test_discard_carry() {
        let mut m = matcher(&["END"]);
        m.advance("contains EN");
        assert_eq!(m.discard_carry(), 2);
        assert_eq!(m.carry(), "");
    }

    #[test]
    fn test_stop_set_validation() {
        assert_eq!(
            StopSet::new(["a", ""]).unwrap_err(),
            ConfigError::EmptyStopSequence(1)
        );
        let set = StopSet::new(["x", "y", "x"]).unwrap();
        assert_eq!(set.sequences(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_partial_tail_start() {
        assert_eq!(partial_tail_start("abc", ["cd"]), 2);
        assert_eq!(partial_tail_start("abc", ["xyz"]), 3);
        assert_eq!(partial_tail_start("abc", ["bcd", "cde"]), 1);
        // Single-character patterns never leave a proper-prefix tail
        assert_eq!(partial_tail_start("abc", ["c"]), 3);
    }
}
