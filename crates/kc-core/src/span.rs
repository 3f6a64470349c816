//! Source locations and the non-fatal diagnostics accumulator.
//!
//! `loc` in §6 is `(filename, (line0, col0), (line1, col1))`; `Span` mirrors
//! that shape directly so every IR node can carry one verbatim.

use std::fmt;

use crate::symbol::Ident;

/// A zero-based `(line, column)` position.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

/// A source span: a file plus a half-open `[start, end)` position range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: Ident,
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(file: Ident, start: Pos, end: Pos) -> Self {
        Self { file, start, end }
    }

    /// A placeholder span for synthesized code that has no source origin
    /// (compiler-generated constructor functions, materialized wrapper types).
    pub fn synthetic() -> Self {
        Self {
            file: Ident::NONE,
            start: Pos::default(),
            end: Pos::default(),
        }
    }
}

/// Severity of a single diagnostic entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// One user-visible diagnostic: `(loc, message)` per §6, tagged with a severity.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, span, message: message.into() }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, span, message: message.into() }
    }
}

/// Process-wide, per-pass error accumulator (§5, §7).
///
/// A pass is successful iff `is_empty()` holds when it returns; callers
/// (the `Compilation` driver, §4.I) check this between passes instead of
/// failing fast on the first diagnostic, so a single run can surface every
/// error a pass found rather than just the first.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.entries.push(diag);
    }

    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::error(span, message));
    }

    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Diagnostic::warning(span, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        !self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.entries {
            // `span.file` is `Ident::NONE` for synthesized spans (no source
            // file to name); fall back to its `Display` rather than the
            // id-only `as_u32`, which panics on an id-less identifier.
            let file = if d.span.file.is_none() { "<synthetic>".to_string() } else { d.span.file.to_string() };
            writeln!(f, "{}:{}: {}: {}", file, d.span.start, d.severity, d.message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displaying_a_synthetic_span_does_not_panic() {
        let mut diags = Diagnostics::new();
        diags.error(Span::synthetic(), "boom");
        let rendered = diags.to_string();
        assert!(rendered.contains("<synthetic>"));
        assert!(rendered.contains("boom"));
    }

    #[test]
    fn is_empty_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning(Span::synthetic(), "heads up");
        assert!(diags.is_empty());
        assert_eq!(diags.error_count(), 0);
    }
}
