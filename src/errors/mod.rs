//! Error Categories
//!
//! - [`LangError`] — lexing/parsing failures, tagged with a source position
//! - [`ValidationError`] — a syntactically valid tree that is semantically
//!   invalid (bad operand to `contains`/`matches`, invalid regex)
//! - [`EngineError`] — programmer misuse of the public API (evaluating a
//!   predicate that failed validation, mutating a finalized set)
//!
//! # Usage
//!
//! ```
//! use predicate_set::errors::EngineError;
//!
//! fn describe(err: &EngineError) -> String {
//!     err.to_string()
//! }
//! ```

pub mod types;
pub use types::*;

pub type LangResult<T> = Result<T, LangError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type EngineResult<T> = Result<T, EngineError>;
