//! Error reporting for the Soy compiler front-end.
//!
//! Parsing never fails with a `Result`: entry points report diagnostics
//! through an [`ErrorReporter`] and return sentinel AST nodes, so a single
//! malformed expression degrades one subtree instead of aborting the file.
//!
//! The reporter supports *checkpointing*: a pass snapshots the error count
//! at a block boundary and later asks whether anything new was reported.
//! The HTML rewriter leans on this for its error-explosion guard (restore
//! the block's starting state when the block produced errors) and for its
//! transactional edit buffer (discard a template's edits when the template
//! produced errors).
//!
//! # Example
//!
//! ```
//! use soy_diagnostics_codes::SoyErrorKind;
//! use soy_error::ErrorReporter;
//! use soy_position_tracking::SourceLocation;
//!
//! let mut errs = ErrorReporter::new();
//! let cp = errs.checkpoint();
//! assert!(!errs.errors_since(cp));
//!
//! errs.report(SourceLocation::unknown(), SoyErrorKind::ExpectedAttributeValue);
//! assert!(errs.errors_since(cp));
//! ```

use soy_diagnostics_codes::{Severity, SoyErrorKind};
use soy_position_tracking::SourceLocation;
use thiserror::Error;

/// A reported diagnostic: where, what, and how bad.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {severity}: {kind} [{code}]", severity = .kind.severity(), code = .kind.code())]
pub struct SoyError {
    /// Where the problem is.
    pub location: SourceLocation,
    /// What the problem is, with its message payload.
    pub kind: SoyErrorKind,
}

impl SoyError {
    /// The stable code string of the underlying kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// The severity of the underlying kind.
    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

/// An opaque marker for "the reporter's state at some earlier moment".
///
/// Obtained from [`ErrorReporter::checkpoint`]; only meaningful for the
/// reporter that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Collects diagnostics in source order for one file.
///
/// One reporter per file; passes share it mutably. Warnings are recorded
/// alongside errors but do not count for [`errors_since`](Self::errors_since),
/// so a warning never triggers recovery paths meant for real failures.
#[derive(Debug, Default)]
pub struct ErrorReporter {
    reports: Vec<SoyError>,
    error_count: usize,
}

impl ErrorReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic at `location`.
    pub fn report(&mut self, location: SourceLocation, kind: SoyErrorKind) {
        if kind.severity() == Severity::Error {
            self.error_count += 1;
        }
        self.reports.push(SoyError { location, kind });
    }

    /// Snapshots the current error count.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.error_count)
    }

    /// Returns true if any *error* (not warning) was reported after `cp`.
    pub fn errors_since(&self, cp: Checkpoint) -> bool {
        self.error_count > cp.0
    }

    /// Returns true if any error was reported at all.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// All diagnostics reported so far, in source order of reporting.
    pub fn reports(&self) -> &[SoyError] {
        &self.reports
    }

    /// Consumes the reporter, yielding its diagnostics.
    pub fn into_reports(self) -> Vec<SoyError> {
        self.reports
    }
}
