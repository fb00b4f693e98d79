//! Error types for parsing and math operations.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::expr::Variable;

/// Result type alias for math operations.
pub type MathResult<T> = Result<T, MathError>;

/// User text that does not denote a whitelisted expression.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("{message}")]
#[diagnostic(code(calcbot::parse))]
pub struct ParseError {
    pub message: String,
    #[source_code]
    pub src: String,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, src: &str, start: usize, len: usize) -> Self {
        Self {
            message: message.into(),
            src: src.to_string(),
            span: (start, len).into(),
        }
    }

    /// Byte offset of the offending input.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

/// Math operation error types.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
pub enum MathError {
    /// Expression text failed to parse
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    /// Parameter is structurally valid text but not an acceptable value
    #[error("{message}")]
    #[diagnostic(code(calcbot::validation))]
    Validation { message: String },

    /// The integrator has no rule for this integrand
    #[error("no closed-form antiderivative found for {expression} with respect to {variable}")]
    #[diagnostic(
        code(calcbot::no_closed_form),
        help("try splitting the integrand into simpler terms")
    )]
    NoClosedForm {
        expression: String,
        variable: Variable,
    },

    /// A definite integral whose integrand is not integrable between the bounds
    #[error("integral diverges on {interval}")]
    #[diagnostic(
        code(calcbot::divergent),
        help("split the interval at the singular point")
    )]
    Divergent { interval: String },

    /// Numeric evaluation hit an unbound variable or a non-real value
    #[error("cannot evaluate: {message}")]
    #[diagnostic(code(calcbot::evaluation))]
    Evaluation { message: String },
}

impl MathError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an evaluation error.
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }
}
