//! Reasoning-Prefix Guard
//!
//! Heuristic cut-off for models that start narrating their own reasoning.
//! A phrase triggers when the visible output opens with it, or when it
//! starts a new line. False positives are accepted.
//!
//! The guard withholds the smallest tail that could still change its
//! decision (a partial phrase, trailing whitespace), so the result does not
//! depend on how the input was fragmented.

use super::matcher::partial_tail_start;
use crate::config::ConfigError;

/// Ordered reasoning-prefix phrases; earlier phrases win ties
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrefixSet {
    phrases: Vec<String>,
    /// `"\n" + phrase` for each phrase, same order
    line_markers: Vec<String>,
}

impl PrefixSet {
    /// Build a phrase set, rejecting empty phrases
    pub fn new<I, S>(phrases: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for (index, phrase) in phrases.into_iter().enumerate() {
            let phrase = phrase.into();
            if phrase.is_empty() {
                return Err(ConfigError::EmptyReasoningPrefix(index));
            }
            set.line_markers.push(format!("\n{}", phrase));
            set.phrases.push(phrase);
        }
        Ok(set)
    }

    /// An empty set disables the guard
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Earliest trigger in `buffer` as `(offset, phrase index)`.
    ///
    /// `at_stream_start` enables the whole-buffer prefix check.
    fn earliest_trigger(&self, buffer: &str, at_stream_start: bool) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;

        for (index, (phrase, marker)) in self.phrases.iter().zip(&self.line_markers).enumerate() {
            let offset = if at_stream_start && buffer.starts_with(phrase.as_str()) {
                Some(0)
            } else {
                buffer.find(marker.as_str())
            };

            if let Some(offset) = offset {
                if best.is_none_or(|(current, _)| offset < current) {
                    best = Some((offset, index));
                }
            }
        }

        best
    }
}

/// Decision for one guard check
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    /// No phrase found; the text may be emitted
    Pass(String),
    /// A phrase fired; `truncated` is all that may still be emitted
    Triggered {
        truncated: String,
        phrase: String,
        offset: usize,
    },
}

impl GuardOutcome {
    /// Check if a phrase fired
    pub fn is_triggered(&self) -> bool {
        matches!(self, GuardOutcome::Triggered { .. })
    }
}

/// Stateful prefix guard for one stream
#[derive(Clone, Debug)]
pub struct PrefixGuard {
    prefixes: PrefixSet,
    /// Not-yet-emitted visible text
    held: String,
}

impl PrefixGuard {
    /// Create a guard with nothing withheld
    pub fn new(prefixes: PrefixSet) -> Self {
        Self {
            prefixes,
            held: String::new(),
        }
    }

    /// Append `text` to the not-yet-emitted buffer and check it.
    ///
    /// `emitted_any` tells whether the stream has already produced visible
    /// output; the opening-phrase check only applies before that.
    pub fn check(&mut self, text: &str, emitted_any: bool) -> GuardOutcome {
        self.held.push_str(text);

        if self.prefixes.is_empty() {
            return GuardOutcome::Pass(std::mem::take(&mut self.held));
        }

        let at_stream_start = !emitted_any;
        if let Some((offset, index)) = self.prefixes.earliest_trigger(&self.held, at_stream_start) {
            let truncated = self.held[..offset].trim_end().to_string();
            self.held.clear();
            return GuardOutcome::Triggered {
                truncated,
                phrase: self.prefixes.phrases[index].clone(),
                offset,
            };
        }

        // Still possibly the opening of a phrase: keep everything
        if at_stream_start
            && self
                .prefixes
                .phrases
                .iter()
                .any(|phrase| phrase.starts_with(self.held.as_str()))
        {
            return GuardOutcome::Pass(String::new());
        }

        let mut hold = partial_tail_start(
            &self.held,
            self.prefixes.line_markers.iter().map(String::as_str),
        );

        // Trailing whitespace stays with the tail so a later trigger can trim it
        if let Some((idx, _)) = self.held[..hold]
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_whitespace())
            .last()
        {
            hold = idx;
        }

        let tail = self.held.split_off(hold);
        GuardOutcome::Pass(std::mem::replace(&mut self.held, tail))
    }

    /// Release everything withheld; used when no phrase can arrive anymore
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.held)
    }

    /// Text currently withheld
    pub fn held(&self) -> &str {
        &self.held
    }
}
