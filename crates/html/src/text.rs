//! Char-offset helpers.
//!
//! Boundary-point offsets inside text nodes count Unicode scalar values, so
//! every slice goes through these conversions instead of byte indexing.

#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `char_offset`-th char, clamped to `s.len()`.
pub fn char_to_byte(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Substring between two char offsets (clamped, `start > end` yields "").
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let a = char_to_byte(s, start);
    let b = char_to_byte(s, end);
    &s[a..b]
}

/// HTML-ish whitespace test used for "is this selection blank".
pub fn is_blank(s: &str) -> bool {
    s.chars().all(|c| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_by_chars_not_bytes() {
        let s = "héllo wörld";
        assert_eq!(char_len(s), 11);
        assert_eq!(char_slice(s, 1, 5), "éllo");
        assert_eq!(char_slice(s, 6, 99), "wörld");
        assert_eq!(char_slice(s, 4, 2), "");
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t\u{a0}"));
        assert!(!is_blank(" a "));
    }
}
