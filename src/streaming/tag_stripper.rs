//! Thinking-Tag Elision
//!
//! Two-state machine removing everything between a start and end marker.
//! Markers may be split across fragments: a trailing partial marker is
//! withheld and completed (or released) by the next fragment.

use super::matcher::partial_tail_start;
use crate::config::ConfigError;

/// Start/end markers delimiting an elided region
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagPair {
    start: String,
    end: String,
}

impl TagPair {
    /// Build a pair; both markers must be non-empty and distinct
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, ConfigError> {
        let start = start.into();
        let end = end.into();

        if start.is_empty() || end.is_empty() {
            return Err(ConfigError::EmptyTagMarker);
        }
        if start == end {
            return Err(ConfigError::IdenticalTagMarkers(start));
        }

        Ok(Self { start, end })
    }

    /// Marker opening a region
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Marker closing a region
    pub fn end(&self) -> &str {
        &self.end
    }
}

/// Stripper state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagState {
    /// Outside any tag region; text is visible
    #[default]
    Normal,
    /// Between start and end marker; text is discarded
    InsideTag,
}

/// Stateful tag stripper for one stream
#[derive(Clone, Debug)]
pub struct TagStripper {
    pair: TagPair,
    state: TagState,
    /// Trailing text that may be the beginning of the marker being searched for
    partial: String,
    /// Number of regions entered so far
    regions: usize,
}

impl TagStripper {
    /// Create a stripper in the `Normal` state
    pub fn new(pair: TagPair) -> Self {
        Self {
            pair,
            state: TagState::Normal,
            partial: String::new(),
            regions: 0,
        }
    }

    /// Consume a fragment and return the visible part of it.
    ///
    /// Loops until the fragment is exhausted, so one fragment may open and
    /// close several regions.
    pub fn advance(&mut self, text: &str) -> String {
        let mut input = std::mem::take(&mut self.partial);
        input.push_str(text);

        let mut visible = String::with_capacity(input.len());
        let mut rest = input.as_str();

        loop {
            let marker = match self.state {
                TagState::Normal => self.pair.start.as_str(),
                TagState::InsideTag => self.pair.end.as_str(),
            };

            match rest.find(marker) {
                Some(pos) => {
                    if self.state == TagState::Normal {
                        visible.push_str(&rest[..pos]);
                        self.state = TagState::InsideTag;
                        self.regions += 1;
                    } else {
                        self.state = TagState::Normal;
                    }
                    rest = &rest[pos + marker.len()..];
                }
                None => {
                    let hold = partial_tail_start(rest, [marker]);
                    if self.state == TagState::Normal {
                        visible.push_str(&rest[..hold]);
                    }
                    self.partial = rest[hold..].to_string();
                    break;
                }
            }
        }

        visible
    }

    /// Current state
    pub fn state(&self) -> TagState {
        self.state
    }

    /// Check if the stripper is inside a tag region
    pub fn is_inside_tag(&self) -> bool {
        self.state == TagState::InsideTag
    }

    /// Withheld partial marker text
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Number of tag regions opened so far
    pub fn regions(&self) -> usize {
        self.regions
    }

    /// Hand out withheld partial marker text.
    ///
    /// Once no more input can arrive the partial can never complete a
    /// marker, so outside a region it is ordinary visible text.
    pub fn take_partial(&mut self) -> String {
        std::mem::take(&mut self.partial)
    }

    /// Drop withheld partial marker text, returning its length
    pub fn discard_partial(&mut self) -> usize {
        let len = self.partial.len();
        self.partial.clear();
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripper() -> TagStripper {
        TagStripper::new(TagPair::new("<t>", "</t>").unwrap())
    }

    #[test]
    fn test_passthrough() {
        let mut s = stripper();
        assert_eq!(s.advance("plain text"), "plain text");
        assert_eq!(s.state(), TagState::Normal);
    }

    #[test]
    fn test_region_within_fragment() {
        let mut s = stripper();
        assert_eq!(s.advance("a<t>hidden</t>b<t>x</t>c"), "abc");
        assert!(!s.is_inside_tag());
        assert_eq!(s.regions(), 2);
    }

    #[test]
    fn test_region_across_fragments() {
        let mut s = stripper();
        assert_eq!(s.advance("before <t>hid"), "before ");
        assert!(s.is_inside_tag());
        assert_eq!(s.advance("den</t> after"), " after");
        assert!(!s.is_inside_tag());
    }

    #[test]
    fn test_split_start_marker() {
        let mut s = stripper();
        assert_eq!(s.advance("abc<"), "abc");
        assert_eq!(s.partial(), "<");
        assert_eq!(s.advance("t>secret</t>ok"), "ok");
    }

    #[test]
    fn test_split_end_marker() {
        let mut s = stripper();
        assert_eq!(s.advance("<t>secret</"), "");
        assert_eq!(s.advance("t>visible"), "visible");
    }

    #[test]
    fn test_false_partial_is_released() {
        let mut s = stripper();
        assert_eq!(s.advance("a <"), "a ");
        assert_eq!(s.advance(" b"), "< b");
    }

    #[test]
    fn test_unterminated_region() {
        let mut s = stripper();
        assert_eq!(s.advance("answer<t>thinking forever"), "answer");
        assert_eq!(s.advance(" and ever"), "");
        assert!(s.is_inside_tag());
    }

    #[test]
    fn test_every_split_point() {
        let input = "x<t>y</t>z<t>w";
        for split in 0..=input.len() {
            let mut s = stripper();
            let mut out = s.advance(&input[..split]);
            out.push_str(&s.advance(&input[split..]));
            assert_eq!(out, "xz", "split at {}", split);
            assert!(s.is_inside_tag());
        }
    }

    #[test]
    fn test_take_partial() {
        let mut s = stripper();
        assert_eq!(s.advance("if a </"), "if a ");
        assert_eq!(s.take_partial(), "</");
        assert_eq!(s.partial(), "");
        assert_eq!(s.discard_partial(), 0);
    }

    #[test]
    fn test_tag_pair_validation() {
        let pair = TagPair::new("<think>", "</think>").unwrap();
        assert_eq!(pair.start(), "<think>");
        assert_eq!(pair.end(), "</think>");

        assert_eq!(TagPair::new("", "</t>").unwrap_err(), ConfigError::EmptyTagMarker);
        assert!(matches!(
            TagPair::new("|", "|").unwrap_err(),
            ConfigError::IdenticalTagMarkers(_)
        ));
    }
}
