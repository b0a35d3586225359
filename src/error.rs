//! Error and diagnostic types for dsprust.

use thiserror::Error;

/// Error type for dsprust operations.
#[derive(Debug, Error)]
pub enum DspError {
    /// An argument fails a required convexity/concavity/affinity check.
    #[error("Curvature error: {0}")]
    Curvature(String),

    /// Expression or problem is outside the disciplined saddle-point ruleset.
    #[error("Not a disciplined saddle problem: {0}")]
    NotDsp(String),

    /// A variable is used outside its extremum scope, or a non-local
    /// variable is bound by an extremum.
    #[error("Scope error: {0}")]
    Scope(String),

    /// Affine-map extraction was invoked on a non-affine expression.
    #[error("Expression is not affine: {0}")]
    NonAffine(String),

    /// Layout lookup of a variable that was never registered.
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Numeric evaluation with a missing variable value.
    #[error("Variable `{0}` has no value")]
    UnsetValue(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Solver failure status (infeasible, unbounded, numerical trouble).
    #[error("Solver error: {0}")]
    Solver(String),

    /// Invalid problem specification.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),
}

/// Result type for dsprust operations.
pub type Result<T> = std::result::Result<T, DspError>;

/// Kinds of recoverable diagnostics emitted during atom construction
/// and compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A non-negativity assumption was not certified by sign analysis;
    /// an implicit constraint was attached instead.
    ImplicitDomain,
}

/// A structured diagnostic record. Diagnostics are collected into lists
/// returned alongside compiled programs, never logged globally.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn implicit_domain(message: impl Into<String>) -> Self {
        Diagnostic {
            kind: DiagnosticKind::ImplicitDomain,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::UnsetValue("x".to_string());
        assert_eq!(err.to_string(), "Variable `x` has no value");

        let err = DspError::ShapeMismatch {
            expected: "(2)".to_string(),
            got: "(3)".to_string(),
        };
        assert!(err.to_string().contains("expected (2)"));
    }

    #[test]
    fn test_diagnostic() {
        let d = Diagnostic::implicit_domain("weights may be negative");
        assert_eq!(d.kind, DiagnosticKind::ImplicitDomain);
    }
}
