//! Offsets, regions and line/column conversion

use std::fmt;

/// A half-open byte range `[start, end)` in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "region start after end");
        Self { start, end }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Half-open containment: `start <= offset < end`.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn encloses(&self, other: &Region) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn text<'t>(&self, text: &'t str) -> &'t str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Line start table for a document snapshot.
///
/// Columns handed in and out are UTF-16 code units, as LSP positions are.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Zero-based line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts.get(line).copied().unwrap_or(self.len)
    }

    /// Byte column of `offset` within its line.
    pub fn column_of(&self, offset: usize) -> usize {
        offset - self.line_start(self.line_of(offset))
    }

    /// Converts a byte offset into `(line, utf16 column)`.
    pub fn position_of(&self, text: &str, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = self.line_of(offset);
        let start = self.line_start(line);
        let column: usize = text
            .get(start..offset)
            .map(|s| s.chars().map(char::len_utf16).sum())
            .unwrap_or(0);
        (line as u32, column as u32)
    }

    /// Converts `(line, utf16 column)` into a byte offset, clamping to the line end.
    pub fn offset_of(&self, text: &str, line: u32, column: u32) -> usize {
        let line = line as usize;
        if line >= self.line_starts.len() {
            return self.len;
        }
        let start = self.line_start(line);
        let end = self
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        let line_text = text.get(start..end).unwrap_or("");
        start + utf16_pos_to_byte_index(line_text, column as usize).unwrap_or(line_text.len())
    }
}

/// Largest char boundary of `text` at or before `offset`.
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Convert an LSP UTF-16 character position to a UTF-8 byte index within `line`.
pub fn utf16_pos_to_byte_index(line: &str, utf16_col: usize) -> Option<usize> {
    let mut utf16_count = 0usize;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count == utf16_col {
            return Some(byte_idx);
        }
        utf16_count += ch.len_utf16();
    }
    if utf16_count == utf16_col {
        Some(line.len())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_char_boundary() {
        let text = "a: 日本";
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 4), 3);
        assert_eq!(floor_char_boundary(text, 5), 3);
        assert_eq!(floor_char_boundary(text, 6), 6);
        assert_eq!(floor_char_boundary(text, 100), text.len());
    }

    #[test]
    fn test_region_half_open() {
        let r = Region::new(2, 5);
        assert!(!r.contains(1));
        assert!(r.contains(2));
        assert!(r.contains(4));
        assert!(!r.contains(5));
        assert!(!Region::empty(3).contains(3));
    }

    #[test]
    fn test_line_index_round_trip_positions() {
        let text = "a: 1\nbb: 2\n\nccc: 3";
        let index = LineIndex::new(text);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.position_of(text, 0), (0, 0));
        assert_eq!(index.position_of(text, 5), (1, 0));
        assert_eq!(index.position_of(text, 7), (1, 2));
        assert_eq!(index.position_of(text, 11), (2, 0));
        assert_eq!(index.offset_of(text, 3, 2), 14);
        assert_eq!(index.offset_of(text, 1, 99), 10);
        assert_eq!(index.offset_of(text, 42, 0), text.len());
    }

    #[test]
    fn test_utf16_columns() {
        let text = "k: 世界\nx: y";
        let index = LineIndex::new(text);
        assert_eq!(index.position_of(text, 6), (0, 4));
        assert_eq!(index.offset_of(text, 0, 4), 6);
        assert_eq!(utf16_pos_to_byte_index("Hi 👋", 5), Some(7));
        assert_eq!(utf16_pos_to_byte_index("Hello", 100), None);
    }
}
