//! Domain-specific rewrites that exploit an assumed truth value of one
//! sibling expression (the "pivot") to simplify the others that share its
//! left-hand literal.

pub mod compare;
pub mod contains;
