//! Diagnostics shared across every pipeline stage.
//!
//! Shape is carried over from the teacher's lint findings (`Severity`,
//! `LintDiagnostic`) generalized from "a single lint rule fired" to
//! "any stage of the pipeline has something to say about a location."

use std::fmt;

use crate::source::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    /// LSP's `DiagnosticSeverity` numbering: 1 = Error, 2 = Warning.
    pub fn to_lsp_severity(self) -> u8 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
            expected: None,
            actual: None,
            suggestion: None,
        }
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location,
            expected: None,
            actual: None,
            suggestion: None,
        }
    }

    pub fn with_types(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Downgrade an error to a warning, used when cross-module checking is
    /// incomplete and the build should continue for partial diagnosis.
    pub fn downgrade(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.location)?;
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            write!(f, " (expected `{}`, found `{}`)", expected, actual)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " — help: {}", suggestion)?;
        }
        Ok(())
    }
}

/// Renders a caret pointing at the offending column, under a line of the
/// original source, for terminal diagnostic output.
pub fn render_caret(source_line: &str, column: u32) -> String {
    let padding = " ".repeat(column.saturating_sub(1) as usize);
    format!("{}\n{}^", source_line, padding)
}

/// Renders a full CLI report for every diagnostic against one source file:
/// `path:line:column: severity: message`, the offending source line with a
/// caret under the column, an expected/found pair when present, and a
/// suggestion when present.
pub fn render_report(path: &std::path::Path, source: &str, diagnostics: &[Diagnostic]) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut out = String::new();
    for d in diagnostics {
        out.push_str(&format!(
            "{}:{}: {}: {}\n",
            path.display(),
            d.location,
            d.severity,
            d.message
        ));
        if let Some(source_line) = lines.get((d.location.line.saturating_sub(1)) as usize) {
            out.push_str(&render_caret(source_line, d.location.column));
            out.push('\n');
        }
        if let (Some(expected), Some(actual)) = (&d.expected, &d.actual) {
            out.push_str(&format!("  expected `{}`, found `{}`\n", expected, actual));
        }
        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  help: {}\n", suggestion));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsp_severity_numbering() {
        assert_eq!(Severity::Error.to_lsp_severity(), 1);
        assert_eq!(Severity::Warning.to_lsp_severity(), 2);
    }

    #[test]
    fn downgrade_changes_severity_only() {
        let d = Diagnostic::error("boom", SourceLocation::new(1, 1)).downgrade();
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.message, "boom");
    }

    #[test]
    fn display_includes_expected_and_actual() {
        let d = Diagnostic::error("type mismatch", SourceLocation::new(3, 7))
            .with_types("int", "string");
        let rendered = d.to_string();
        assert!(rendered.contains("expected `int`"));
        assert!(rendered.contains("found `string`"));
    }

    #[test]
    fn caret_aligns_with_column() {
        let rendered = render_caret("let x = 1", 5);
        assert_eq!(rendered, "let x = 1\n    ^");
    }

    #[test]
    fn report_includes_path_line_and_caret() {
        let source = "fn g() -> int { return \"hi\" }";
        let d = Diagnostic::error("type mismatch", SourceLocation::new(1, 17))
            .with_types("int", "string");
        let report = render_report(std::path::Path::new("g.home"), source, &[d]);
        assert!(report.contains("g.home:1:17: error: type mismatch"));
        assert!(report.contains(source));
        assert!(report.contains("expected `int`, found `string`"));
    }
}
