//! Source location types for the Soy compiler.
//!
//! This crate provides the foundational position types used throughout the
//! compiler for tracking where a construct came from. Unlike byte-span
//! tracking, locations here are file/line/column triples: template raw text
//! is re-joined and re-split by rewrite passes, so byte offsets into the
//! original file stop being contiguous long before diagnostics are rendered.
//!
//! Two types matter:
//!
//! - [`Point`]: a line/column pair, 1-based, totally ordered within a file.
//! - [`SourceLocation`]: a file path plus a begin and end point. Immutable
//!   and cheap to clone (the path is reference-counted).

mod location;
mod point;

pub use location::SourceLocation;
pub use point::Point;
