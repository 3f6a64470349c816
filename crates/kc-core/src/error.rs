//! The fatal error taxonomy (§7 "Ambient error taxonomy").
//!
//! `CompileError` is for conditions that abort a pass outright — a
//! precondition the driver is supposed to guarantee turned out false, or an
//! internal invariant broke. Everything a source program can trigger through
//! ordinary misuse (an unbound record field, a non-exhaustive match, an
//! unmangleable duplicate signature) is reported through `Diagnostics`
//! instead and does not stop the pass from finishing; see `span::Diagnostics`.

use thiserror::Error;

use crate::span::Span;

/// Fatal, pass-aborting errors, one variant per §7 error kind. A
/// `Result<_, CompileError>` return from a pass means the pass could not
/// produce output at all, as opposed to producing output alongside a
/// non-empty `Diagnostics`.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("{span:?}: syntax error: {message}")]
    Syntax { span: Span, message: String },

    #[error("{span:?}: type error: {message}")]
    Type { span: Span, message: String },

    #[error("{span:?}: pattern-match error: {message}")]
    PatternMatch { span: Span, message: String },

    /// Unknown symbol, cyclic record definition, non-existent record field,
    /// or a cyclic module-import dependency (§5: "a cycle is a compile
    /// error"). Module cycles carry no single span; `span` is `None` and
    /// `message` names every cycle member.
    #[error("{}: name resolution error: {message}", span.map(|s| format!("{s:?}")).unwrap_or_else(|| \"<module graph>\".to_string()))]
    NameResolution { span: Option<Span>, message: String },

    #[error("internal compiler error: {invariant}")]
    Internal { span: Option<Span>, invariant: String },
}

impl CompileError {
    /// Construct the "cyclic module dependency" flavor of `NameResolution`
    /// described in §4.I / §5, naming every member of the cycle.
    pub fn module_cycle(modules: &[String]) -> Self {
        CompileError::NameResolution {
            span: None,
            message: format!("cyclic module dependency: {}", modules.join(", ")),
        }
    }

    /// The source span most relevant to this error, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Syntax { span, .. }
            | CompileError::Type { span, .. }
            | CompileError::PatternMatch { span, .. } => Some(*span),
            CompileError::NameResolution { span, .. } => *span,
            CompileError::Internal { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_error_without_span_formats() {
        let e = CompileError::Internal { span: None, invariant: "table out of sync".into() };
        assert!(e.to_string().contains("table out of sync"));
        assert!(e.span().is_none());
    }

    #[test]
    fn module_cycle_names_every_member() {
        let e = CompileError::module_cycle(&["a".into(), "b".into()]);
        assert!(e.to_string().contains("a, b"));
        assert!(matches!(e, CompileError::NameResolution { span: None, .. }));
    }
}
