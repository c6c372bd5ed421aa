//! The predicate language's lexer and recursive-descent parser. Treated as
//! an ordinary front-end component: it is not part of the optimizing core,
//! just a well-typed producer of [`crate::ast::Node`] trees and collected
//! diagnostics.

pub mod lexer;
pub mod parser;

pub use lexer::{tokenize, Token};
pub use parser::Parser;
