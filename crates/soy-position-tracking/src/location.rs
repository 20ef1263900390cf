//! Source locations: a file path plus a begin/end point pair.

use crate::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A contiguous region of a source file.
///
/// Locations are immutable and cheap to clone; the file path is shared via
/// `Arc`. The region is inclusive on both ends, matching how diagnostics
/// underline source text.
///
/// # Example
///
/// ```
/// use soy_position_tracking::{Point, SourceLocation};
///
/// let file = SourceLocation::new("greeting.soy", Point::new(1, 1), Point::new(1, 10));
/// let tail = file.with_span(Point::new(1, 4), Point::new(1, 10));
/// assert_eq!(file.extend(&tail).begin, Point::new(1, 1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Path of the file this location points into.
    pub file_path: Arc<str>,
    /// First point covered, inclusive.
    pub begin: Point,
    /// Last point covered, inclusive.
    pub end: Point,
}

impl SourceLocation {
    /// Creates a location covering `begin..=end` in `file_path`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `begin > end` for known points.
    pub fn new(file_path: impl Into<Arc<str>>, begin: Point, end: Point) -> Self {
        debug_assert!(
            !begin.is_known() || !end.is_known() || begin <= end,
            "SourceLocation: begin {begin} after end {end}"
        );
        Self { file_path: file_path.into(), begin, end }
    }

    /// A location for a single point.
    pub fn point(file_path: impl Into<Arc<str>>, at: Point) -> Self {
        Self::new(file_path, at, at)
    }

    /// The unknown location, carried by synthesized nodes.
    pub fn unknown() -> Self {
        Self { file_path: Arc::from("unknown"), begin: Point::UNKNOWN, end: Point::UNKNOWN }
    }

    /// Returns true unless either endpoint is unknown.
    pub fn is_known(&self) -> bool {
        self.begin.is_known() && self.end.is_known()
    }

    /// A new location in the same file with the given endpoints.
    pub fn with_span(&self, begin: Point, end: Point) -> Self {
        Self::new(Arc::clone(&self.file_path), begin, end)
    }

    /// A single-point location in the same file.
    pub fn at_point(&self, at: Point) -> Self {
        self.with_span(at, at)
    }

    /// The smallest location covering both `self` and `other`.
    ///
    /// The two locations must be in the same file; an unknown side yields
    /// the other side unchanged.
    pub fn extend(&self, other: &SourceLocation) -> Self {
        debug_assert_eq!(
            self.file_path, other.file_path,
            "SourceLocation::extend across files"
        );
        if !self.is_known() {
            return other.clone();
        }
        if !other.is_known() {
            return self.clone();
        }
        self.with_span(self.begin.min(other.begin), self.end.max(other.end))
    }

    /// Returns true if `at` falls inside this location.
    pub fn contains(&self, at: Point) -> bool {
        self.begin <= at && at <= self.end
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(f, "{}:{}", self.file_path, self.begin)
        } else {
            write!(f, "{}:{}-{}", self.file_path, self.begin, self.end)
        }
    }
}
