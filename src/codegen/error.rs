//! Code generation error types.

use crate::source::SourceLocation;

/// Error type for code generation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeGenError {
    /// An AST shape not yet lowered: generic instantiation bodies,
    /// `async`/`await` execution, struct-by-value arguments beyond what
    /// fits in a register.
    UnsupportedFeature { what: String, location: SourceLocation },
    /// Hard cap of 256 locals per function exceeded.
    TooManyVariables { function: String, location: SourceLocation },
    /// The checker should have rejected this; reaching codegen means an
    /// internal invariant was violated, not a user-facing diagnostic.
    UndefinedVariable { name: String, location: SourceLocation },
}

impl std::fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeGenError::UnsupportedFeature { what, location } => {
                write!(f, "{}: unsupported in codegen at {}", what, location)
            }
            CodeGenError::TooManyVariables { function, location } => {
                write!(f, "function `{}` declares more than 256 locals at {}", function, location)
            }
            CodeGenError::UndefinedVariable { name, location } => {
                write!(f, "internal error: undefined variable `{}` reached codegen at {}", name, location)
            }
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<&CodeGenError> for crate::diagnostics::Diagnostic {
    fn from(err: &CodeGenError) -> Self {
        let location = match err {
            CodeGenError::UnsupportedFeature { location, .. }
            | CodeGenError::TooManyVariables { location, .. }
            | CodeGenError::UndefinedVariable { location, .. } => *location,
        };
        crate::diagnostics::Diagnostic::error(err.to_string(), location)
    }
}
