//! Error type definitions for the predicate engine.
//!
//! Layered the way a larger application's error hierarchy is: a leaf error
//! per concern (`LangError`, `ValidationError`), and a top-level
//! [`EngineError`] that collects them plus the "this should never happen if
//! the API is used correctly" cases.

use thiserror::Error;

/// A single lex/parse diagnostic, tagged with its position in the source
/// text so several can be collected and reported together instead of
/// stopping at the first one.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LangError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedChar { ch: char, position: usize },

    #[error("unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("unexpected token '{found}' at position {position}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        position: usize,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("trailing input after a complete expression: '{remainder}'")]
    TrailingInput { remainder: String },
}

/// Semantic validation errors: the tree parsed fine but violates an
/// operator's invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid operand for '{operator}': {detail}")]
    BadOperand { operator: String, detail: String },

    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// Top-level engine error: wraps the above, plus API-misuse errors that
/// are the caller's responsibility to avoid.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error(transparent)]
    Lang(#[from] LangError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("predicate set has no compiled plan; call compile_ast() first")]
    NotCompiled,

    #[error("predicate set is finalized and accepts no further predicates")]
    FinalizedSet,

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl EngineError {
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
