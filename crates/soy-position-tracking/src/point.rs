//! Line/column points within a single file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column position in a source file.
///
/// Both coordinates are 1-based; `(0, 0)` is the unknown point, used for
/// synthesized nodes that have no textual origin. Points are totally ordered
/// within a file: first by line, then by column.
///
/// # Example
///
/// ```
/// use soy_position_tracking::Point;
///
/// let a = Point::new(3, 1);
/// let b = Point::new(3, 14);
/// assert!(a < b);
/// assert!(a.is_known());
/// assert!(!Point::UNKNOWN.is_known());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Point {
    /// 1-based line number; 0 means unknown.
    pub line: u32,
    /// 1-based column number; 0 means unknown.
    pub column: u32,
}

impl Point {
    /// The unknown point, carried by synthesized nodes.
    pub const UNKNOWN: Point = Point { line: 0, column: 0 };

    /// The first point of any file.
    pub const FIRST: Point = Point { line: 1, column: 1 };

    /// Creates a new point.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if exactly one coordinate is zero; unknown
    /// points must be unknown in both.
    #[inline]
    pub fn new(line: u32, column: u32) -> Self {
        debug_assert!(
            (line == 0) == (column == 0),
            "Point: half-unknown point ({line}, {column})"
        );
        Self { line, column }
    }

    /// Returns true unless this is [`Point::UNKNOWN`].
    #[inline]
    pub const fn is_known(&self) -> bool {
        self.line != 0
    }

    /// The point one column to the right.
    #[inline]
    pub fn next_column(&self) -> Point {
        Point { line: self.line, column: self.column + 1 }
    }

    /// The first column of the following line.
    #[inline]
    pub fn next_line(&self) -> Point {
        Point { line: self.line + 1, column: 1 }
    }

    /// Advances this point across one character of source text.
    ///
    /// A newline moves to the next line, anything else to the next column.
    /// Tabs count as a single column; diagnostics render the source line, so
    /// visual alignment is the renderer's problem.
    #[inline]
    pub fn advanced_by(&self, ch: char) -> Point {
        if ch == '\n' { self.next_line() } else { self.next_column() }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "?:?")
        }
    }
}
