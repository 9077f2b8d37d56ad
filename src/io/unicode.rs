//! Unicode and line utilities for text processing.
//!
//! Every component counts lines the same way: a line is a
//! `'\n'`-separated piece of the content and empty content has no lines.
//! Joining the pieces of a line range with `'\n'` reproduces the source.

use unicode_segmentation::UnicodeSegmentation;

/// Finds a valid UTF-8 character boundary at or before the given position.
///
/// # Examples
///
/// ```
/// use codesplit::io::find_char_boundary;
///
/// let s = "Hello 世界";
/// assert_eq!(find_char_boundary(s, 6), 6); // Before '世'
/// assert_eq!(find_char_boundary(s, 7), 6); // Middle of '世', backs up
/// ```
#[must_use]
pub const fn find_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let bytes = s.as_bytes();
    let mut boundary = pos;
    // UTF-8 continuation bytes start with 10xxxxxx (0x80-0xBF)
    while boundary > 0 && (bytes[boundary] & 0xC0) == 0x80 {
        boundary -= 1;
    }
    boundary
}

/// Splits content into lines.
///
/// # Examples
///
/// ```
/// use codesplit::io::split_lines;
///
/// assert!(split_lines("").is_empty());
/// assert_eq!(split_lines("a\nb"), vec!["a", "b"]);
/// assert_eq!(split_lines("a\n"), vec!["a", ""]);
/// ```
#[must_use]
pub fn split_lines(content: &str) -> Vec<&str> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split('\n').collect()
}

/// Counts lines using the same rules as [`split_lines`].
#[must_use]
pub fn line_count(content: &str) -> usize {
    if content.is_empty() {
        0
    } else {
        content.bytes().filter(|&b| b == b'\n').count() + 1
    }
}

/// Joins the 1-based inclusive line range `start..=end` of `lines`.
///
/// Out-of-range bounds are clamped.
#[must_use]
pub fn join_lines(lines: &[&str], start: usize, end: usize) -> String {
    if lines.is_empty() || start == 0 || start > end || start > lines.len() {
        return String::new();
    }
    let end = end.min(lines.len());
    lines[start - 1..end].join("\n")
}

/// Splits a string into slices of at most `max_bytes`, cutting at grapheme
/// cluster boundaries where possible.
///
/// A cluster wider than `max_bytes` (a long ZWJ emoji sequence, say) is cut
/// at char boundaries instead. Only a single char wider than `max_bytes`
/// can still produce an oversized slice.
///
/// # Examples
///
/// ```
/// use codesplit::io::unicode::grapheme_slices;
///
/// let slices = grapheme_slices("abcdefg", 3);
/// assert_eq!(slices, vec!["abc", "def", "g"]);
/// ```
#[must_use]
pub fn grapheme_slices(s: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(1);
    let mut slices = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (offset, grapheme) in s.grapheme_indices(true) {
        if grapheme.len() > max_bytes {
            if end > start {
                slices.push(&s[start..end]);
            }
            start = offset;
            for (i, c) in grapheme.char_indices() {
                let at = offset + i;
                if at > start && at + c.len_utf8() - start > max_bytes {
                    slices.push(&s[start..at]);
                    start = at;
                }
            }
            end = offset + grapheme.len();
            continue;
        }
        if end > start && offset + grapheme.len() - start > max_bytes {
            slices.push(&s[start..end]);
            start = offset;
        }
        end = offset + grapheme.len();
    }
    if end > start {
        slices.push(&s[start..end]);
    }

    slices
}
