//! Raw template text with its mapping back to source points.

use soy_position_tracking::{Point, SourceLocation};
use std::sync::Arc;

/// The payload of a raw-text node.
///
/// The outer parser strips comments and joins lines, so the text held here
/// is generally not a contiguous slice of the original file. Every byte
/// boundary therefore carries the source [`Point`] it came from, and the
/// indices where inter-node whitespace was stripped are recorded so the
/// HTML rewriter can treat them as attribute separators.
///
/// Offsets are byte-indexed; indices that fall inside a multi-byte
/// character map to that character's starting point.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextData {
    text: String,
    /// `text.len() + 1` points: one per byte boundary, plus the boundary
    /// after the final byte.
    offsets: Arc<[Point]>,
    /// Sorted byte indices where surrounding whitespace was stripped.
    missing_ws: Arc<[usize]>,
}

impl RawTextData {
    /// Builds raw text from already-computed boundary points.
    ///
    /// # Panics
    ///
    /// Panics in debug mode unless `offsets.len() == text.len() + 1`.
    pub fn new(
        text: impl Into<String>,
        offsets: impl Into<Arc<[Point]>>,
        missing_ws: impl Into<Arc<[usize]>>,
    ) -> Self {
        let text = text.into();
        let offsets = offsets.into();
        debug_assert_eq!(offsets.len(), text.len() + 1, "RawTextData: offset table size");
        let missing_ws = missing_ws.into();
        debug_assert!(missing_ws.windows(2).all(|w| w[0] < w[1]), "RawTextData: unsorted ws");
        Self { text, offsets, missing_ws }
    }

    /// Builds raw text that really is a contiguous run of source starting
    /// at `start`, computing the boundary points by walking the text.
    pub fn from_source(text: impl Into<String>, start: Point) -> Self {
        let text = text.into();
        let mut offsets = Vec::with_capacity(text.len() + 1);
        let mut at = start;
        for ch in text.chars() {
            for _ in 0..ch.len_utf8() {
                offsets.push(at);
            }
            at = at.advanced_by(ch);
        }
        offsets.push(at);
        Self { text, offsets: offsets.into(), missing_ws: Arc::from([]) }
    }

    /// The same text with joined-whitespace boundaries recorded.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `missing_ws` is unsorted or out of range.
    pub fn with_missing_whitespace(self, missing_ws: Vec<usize>) -> Self {
        debug_assert!(missing_ws.iter().all(|&i| i <= self.text.len()));
        debug_assert!(missing_ws.windows(2).all(|w| w[0] < w[1]));
        Self { missing_ws: missing_ws.into(), ..self }
    }

    /// The text itself.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte length of the text.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True for the empty text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The source point of the byte boundary at `index`.
    ///
    /// `index == len()` yields the point just past the final character.
    pub fn location_of(&self, index: usize) -> Point {
        self.offsets[index]
    }

    /// The point of the last character before `end`, for inclusive spans.
    pub fn last_point_before(&self, end: usize) -> Point {
        match self.text[..end].char_indices().next_back() {
            Some((i, _)) => self.offsets[i],
            None => self.offsets[0],
        }
    }

    /// The inclusive location of the byte range `start..end` within `file`.
    pub fn location_in(&self, file: &Arc<str>, start: usize, end: usize) -> SourceLocation {
        SourceLocation::new(
            Arc::clone(file),
            self.location_of(start),
            self.last_point_before(end),
        )
    }

    /// True if inter-node whitespace was stripped at byte boundary `index`.
    pub fn missing_whitespace_at(&self, index: usize) -> bool {
        self.missing_ws.binary_search(&index).is_ok()
    }

    /// The sorted stripped-whitespace boundaries.
    pub fn missing_whitespace(&self) -> &[usize] {
        &self.missing_ws
    }

    /// Cuts out `start..end` with its offsets and whitespace points intact.
    pub fn substring(&self, start: usize, end: usize) -> RawTextData {
        debug_assert!(start <= end && end <= self.text.len(), "RawTextData: substring bounds");
        let missing: Vec<usize> = self
            .missing_ws
            .iter()
            .filter(|&&i| i >= start && i <= end)
            .map(|&i| i - start)
            .collect();
        RawTextData {
            text: self.text[start..end].to_string(),
            offsets: self.offsets[start..=end].into(),
            missing_ws: missing.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_source_walks_lines() {
        let raw = RawTextData::from_source("ab\ncd", Point::new(3, 5));
        assert_eq!(raw.location_of(0), Point::new(3, 5));
        assert_eq!(raw.location_of(2), Point::new(3, 7)); // the newline itself
        assert_eq!(raw.location_of(3), Point::new(4, 1));
        assert_eq!(raw.location_of(5), Point::new(4, 3)); // past the end
    }

    #[test]
    fn substring_preserves_points() {
        let raw = RawTextData::from_source("hello world", Point::new(1, 1));
        let sub = raw.substring(6, 11);
        assert_eq!(sub.text(), "world");
        assert_eq!(sub.location_of(0), Point::new(1, 7));
        assert_eq!(sub.last_point_before(sub.len()), Point::new(1, 11));
    }

    #[test]
    fn multibyte_boundaries_map_to_char_start() {
        let raw = RawTextData::from_source("aéb", Point::new(1, 1));
        // 'é' is two bytes starting at index 1
        assert_eq!(raw.location_of(1), Point::new(1, 2));
        assert_eq!(raw.location_of(2), Point::new(1, 2));
        assert_eq!(raw.location_of(3), Point::new(1, 3));
    }

    #[test]
    fn missing_whitespace_shifts_with_substring() {
        let base = RawTextData::from_source("a=bc=d", Point::new(1, 1));
        let raw = RawTextData::new(
            base.text().to_string(),
            Arc::clone(&base.offsets),
            vec![2usize, 5usize],
        );
        assert!(raw.missing_whitespace_at(2));
        assert!(!raw.missing_whitespace_at(3));

        let sub = raw.substring(2, 6);
        assert!(sub.missing_whitespace_at(0));
        assert!(sub.missing_whitespace_at(3));
    }
}
