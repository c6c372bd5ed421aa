//! The public front-end wrapper: holds the original source text, parses it
//! once, and exposes evaluation/analysis against a document. Sits outside
//! the optimizing core, but a complete crate needs a concrete, standalone
//! way to use a single predicate without building a whole set.

use std::collections::HashMap;

use crate::ast::{self, EvalContext, NodeRef};
use crate::document::Document;
use crate::errors::{LangError, ValidationError};
use crate::lang::Parser;
use crate::resolver::{DocumentResolver, LiteralResolver};

/// The diagnostics bag exposed by [`Predicate::errors`]: every parse and
/// validation error as a message, plus a pattern-keyed map of regex
/// literals that failed to compile.
#[derive(Debug, Clone, Default)]
pub struct PredicateErrors {
    pub errors: Vec<String>,
    pub regex: HashMap<String, String>,
}

/// A single parsed predicate.
pub struct Predicate {
    source: String,
    ast: Option<NodeRef>,
    errors: Vec<LangError>,
    validation_errors: Vec<ValidationError>,
    regex_errors: HashMap<String, String>,
    resolver: Box<dyn LiteralResolver>,
}

impl Predicate {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let (ast, errors, regex_errors) = Parser::new(&source).parse();
        let ast = ast.filter(|_| errors.is_empty());

        let validation_errors = match &ast {
            Some(ast) => ast::validate(ast).err().into_iter().collect(),
            None => Vec::new(),
        };

        Self {
            source,
            ast,
            errors,
            validation_errors,
            regex_errors: regex_errors.into_iter().collect(),
            resolver: Box::new(DocumentResolver::new()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.ast.is_some()
            && self.errors.is_empty()
            && self.validation_errors.is_empty()
            && self.regex_errors.is_empty()
    }

    pub fn parse_errors(&self) -> &[LangError] {
        &self.errors
    }

    pub fn validation_errors(&self) -> &[ValidationError] {
        &self.validation_errors
    }

    /// The full diagnostics bag: parse and validation errors as messages,
    /// plus the regex-compile-failure map.
    pub fn errors(&self) -> PredicateErrors {
        let errors = self
            .errors
            .iter()
            .map(ToString::to_string)
            .chain(self.validation_errors.iter().map(ToString::to_string))
            .collect();
        PredicateErrors { errors, regex: self.regex_errors.clone() }
    }

    pub fn ast(&self) -> Option<&NodeRef> {
        self.ast.as_ref()
    }

    /// Swap in a custom resolver, e.g. one with registered named constants.
    pub fn set_resolver(&mut self, resolver: impl LiteralResolver + 'static) {
        self.resolver = Box::new(resolver);
    }

    pub fn evaluate(&self, doc: &Document) -> bool {
        let Some(ast) = &self.ast else { return false };
        let mut ctx = EvalContext::new(doc, self.resolver.as_ref());
        ast::evaluate_top(ast, &mut ctx)
    }

    /// Evaluate with failure-trace collection turned on; returns the
    /// result and, when it was false, the human-readable reasons.
    pub fn analyze(&self, doc: &Document) -> (bool, Vec<String>) {
        let Some(ast) = &self.ast else {
            return (false, vec!["predicate failed to parse".to_string()]);
        };
        let mut ctx = EvalContext::new(doc, self.resolver.as_ref());
        ctx.set_analyze(true);
        let result = ast::analyze_top(ast, &mut ctx);
        (result, ctx.failed().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_predicate_evaluates() {
        let p = Predicate::new("name is 'Jack'");
        assert!(p.is_valid());
        let doc = Document::from_str(r#"{"name":"Jack"}"#).unwrap();
        assert!(p.evaluate(&doc));
        let doc2 = Document::from_str(r#"{"name":"Jill"}"#).unwrap();
        assert!(!p.evaluate(&doc2));
    }

    #[test]
    fn invalid_predicate_reports_errors() {
        let p = Predicate::new("name is");
        assert!(!p.is_valid());
        assert!(!p.parse_errors().is_empty());
    }

    #[test]
    fn semantically_invalid_operand_is_rejected() {
        let p = Predicate::new("name matches 5");
        assert!(!p.is_valid());
        assert!(!p.validation_errors().is_empty());
        assert!(p.parse_errors().is_empty());
    }

    #[test]
    fn bad_contains_operand_is_rejected() {
        let p = Predicate::new("name contains true");
        assert!(!p.is_valid());
        assert!(p
            .validation_errors()
            .iter()
            .any(|e| matches!(e, ValidationError::BadOperand { operator, .. } if operator == "contains")));
    }

    #[test]
    fn invalid_regex_surfaces_in_the_regex_map() {
        let p = Predicate::new("server matches '('");
        assert!(!p.is_valid());
        let errors = p.errors();
        assert!(errors.regex.contains_key("("));
        assert!(p.validation_errors().is_empty());
    }
}
