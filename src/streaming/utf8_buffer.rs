//! UTF-8 Boundary Handler
//!
//! Decoders that stream raw token bytes can split a multi-byte character
//! across two chunks. This module holds the incomplete trailing sequence
//! until the next chunk completes it, and turns everything else into text.
//!
//! A UTF-8 character can be 1-4 bytes:
//! - 1 byte:  0xxxxxxx (ASCII)
//! - 2 bytes: 110xxxxx 10xxxxxx
//! - 3 bytes: 1110xxxx 10xxxxxx 10xxxxxx
//! - 4 bytes: 11110xxx 10xxxxxx 10xxxxxx 10xxxxxx

/// Reassembles text from byte chunks split at arbitrary positions.
#[derive(Clone, Debug, Default)]
pub struct Utf8Buffer {
    /// Incomplete trailing sequence from the previous chunk (at most 3 bytes)
    leftover: [u8; 4],
    leftover_len: usize,
}

impl Utf8Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, prepending any leftover bytes from the previous one.
    ///
    /// An incomplete sequence at the end of the chunk is kept back; invalid
    /// bytes decode to U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut bytes = Vec::with_capacity(self.leftover_len + chunk.len());
        bytes.extend_from_slice(&self.leftover[..self.leftover_len]);
        bytes.extend_from_slice(chunk);
        self.leftover_len = 0;

        let valid_end = Self::find_valid_boundary(&bytes);
        let tail = &bytes[valid_end..];
        self.leftover[..tail.len()].copy_from_slice(tail);
        self.leftover_len = tail.len();

        match std::str::from_utf8(&bytes[..valid_end]) {
            Ok(text) => text.to_string(),
            Err(_) => String::from_utf8_lossy(&bytes[..valid_end]).into_owned(),
        }
    }

    /// Check if byte is a UTF-8 continuation byte (10xxxxxx)
    #[inline]
    pub fn is_continuation(byte: u8) -> bool {
        (byte & 0b11000000) == 0b10000000
    }

    /// Get expected length of UTF-8 sequence from first byte
    #[inline]
    pub fn sequence_length(first_byte: u8) -> usize {
        match first_byte {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1, // Invalid, treat as single byte
        }
    }

    /// End of the decodable region: the start of an incomplete trailing
    /// sequence, or `bytes.len()` when the chunk ends on a boundary.
    fn find_valid_boundary(bytes: &[u8]) -> usize {
        let mut i = bytes.len();
        while i > 0 && i > bytes.len().saturating_sub(4) {
            i -= 1;
            if !Self::is_continuation(bytes[i]) {
                let expected_len = Self::sequence_length(bytes[i]);
                if bytes.len() - i < expected_len {
                    return i;
                }
                break;
            }
        }

        bytes.len()
    }

    /// Number of bytes waiting for completion
    pub fn pending_len(&self) -> usize {
        self.leftover_len
    }

    /// Drop any incomplete sequence, returning how many bytes were held
    pub fn discard(&mut self) -> usize {
        std::mem::take(&mut self.leftover_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(b"Hello, World!"), "Hello, World!");
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_split_emoji() {
        let mut buf = Utf8Buffer::new();

        // 🦀 is F0 9F A6 80 in UTF-8
        let emoji = "🦀".as_bytes();
        assert_eq!(emoji.len(), 4);

        assert_eq!(buf.push(&[b'H', b'i', b' ', 0xF0, 0x9F]), "Hi ");
        assert_eq!(buf.pending_len(), 2);

        assert_eq!(buf.push(&[0xA6, 0x80, b'!']), "🦀!");
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buf = Utf8Buffer::new();
        let mut out = String::new();
        for b in "naïve café 🦀".bytes() {
            out.push_str(&buf.push(&[b]));
        }
        assert_eq!(out, "naïve café 🦀");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_discard_incomplete() {
        let mut buf = Utf8Buffer::new();
        assert_eq!(buf.push(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(buf.discard(), 2);
        assert_eq!(buf.push(b"y"), "y");
    }

    #[test]
    fn test_sequence_length() {
        assert_eq!(Utf8Buffer::sequence_length(b'A'), 1);
        assert_eq!(Utf8Buffer::sequence_length(0xC3), 2);
        assert_eq!(Utf8Buffer::sequence_length(0xE2), 3);
        assert_eq!(Utf8Buffer::sequence_length(0xF0), 4);
    }

    #[test]
    fn test_is_continuation() {
        assert!(!Utf8Buffer::is_continuation(b'A'));
        assert!(Utf8Buffer::is_continuation(0x80));
        assert!(Utf8Buffer::is_continuation(0xBF));
        assert!(!Utf8Buffer::is_continuation(0xC0));
    }
}
