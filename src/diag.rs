//! Diagnostics reported by the text front-end.
//!
//! The assembler does not abort on the first recoverable defect:
//! it reports diagnostics to a [`Log`] sink and continues with a best-effort
//! substitute, so a single run surfaces as many errors as possible.

use std::fmt;

/// How severe a diagnostic is.
/// Assembly fails when any diagnostic of severity `Error` was reported.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Warning,
    Error,
}

/// The kind of defect a diagnostic reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DiagnosticKind {
    /// A text-format parse or assembly failure: bad token, unexpected
    /// S-expression, unknown instruction mnemonic, numeric literal out of
    /// range.
    Syntax,
    /// An identifier use has no matching definition in its index space.
    UnresolvedIdentifier,
    /// An identifier is defined twice in the same index space.
    DuplicateIdentifier,
    /// An inline type use disagrees with the referenced type.
    TypeMismatch,
    /// A structural rule of the module was violated: bad initializer
    /// expression, invalid index, limits violation.
    Validation,
}

/// A single reported defect, with its position in the source text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    severity: Severity,
    message: String,
    line: usize,
    column: usize,
}

impl Diagnostic {
    /// Creates a new diagnostic of severity `Error`.
    pub fn error(kind: DiagnosticKind, message: String, line: usize, column: usize) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Error,
            message,
            line,
            column,
        }
    }

    /// Creates a new diagnostic of severity `Warning`.
    pub fn warning(kind: DiagnosticKind, message: String, line: usize, column: usize) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Warning,
            message,
            line,
            column,
        }
    }

    /// The kind of defect reported.
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    /// The severity of the diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The human-readable description of the defect.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The 1-based source line of the defect.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1-based source column of the defect.
    pub fn column(&self) -> usize {
        self.column
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {:?}: {}",
            self.line, self.column, self.kind, self.message
        )
    }
}

/// A sink for diagnostics.
/// The pretty-printing subsystem lives outside the core;
/// the assembler only requires something that accepts reports.
pub trait Log {
    /// Accepts a reported diagnostic.
    fn report(&mut self, diagnostic: Diagnostic);
}

/// A log that collects diagnostics into a vector.
#[derive(Debug, Default)]
pub struct VecLog {
    diagnostics: Vec<Diagnostic>,
}

impl VecLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        VecLog::default()
    }

    /// The diagnostics reported so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when any diagnostic of severity `Error` was reported.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity() == Severity::Error)
    }

    /// Consumes the log, returning the collected diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl Log for VecLog {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_flag_the_log() {
        let mut log = VecLog::new();

        log.report(Diagnostic::warning(
            DiagnosticKind::Syntax,
            "odd spacing".to_string(),
            1,
            1,
        ));
        assert!(!log.has_errors());

        log.report(Diagnostic::error(
            DiagnosticKind::UnresolvedIdentifier,
            "unknown function $foo".to_string(),
            2,
            5,
        ));
        assert!(log.has_errors());
        assert_eq!(log.diagnostics().len(), 2);
    }

    #[test]
    fn diagnostics_render_with_position() {
        let diagnostic = Diagnostic::error(
            DiagnosticKind::Syntax,
            "unexpected token".to_string(),
            3,
            7,
        );

        assert_eq!(diagnostic.to_string(), "3:7: Syntax: unexpected token");
    }
}
