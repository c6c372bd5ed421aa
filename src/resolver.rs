//! Resolves an identifier name appearing in a predicate to a runtime
//! [`Value`], either by looking it up in the document or, for names
//! registered ahead of time, by returning a fixed constant.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::ast::Value;
use crate::document::Document;

/// Host applications can swap in their own resolution strategy via
/// `Predicate::set_resolver`; the default is plain/dotted-path document
/// lookup plus a table of user-registered constants.
pub trait LiteralResolver: Send + Sync {
    fn resolve(&self, doc: &Document, name: &str) -> Value;

    /// Resolve a name without a document, for names that are known ahead
    /// of evaluation (used by the canonicalizer's static-resolution pass).
    fn static_resolve(&self, name: &str) -> Option<Value>;
}

#[derive(Default)]
pub struct DocumentResolver {
    constants: RwLock<HashMap<String, Value>>,
}

impl DocumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_constant(&self, name: impl Into<String>, value: Value) {
        self.constants.write().unwrap().insert(name.into(), value);
    }
}

impl LiteralResolver for DocumentResolver {
    fn resolve(&self, doc: &Document, name: &str) -> Value {
        if let Some(v) = self.constants.read().unwrap().get(name) {
            return v.clone();
        }
        match doc.get_path(name) {
            Some(json) => Value::from(json),
            None => Value::Undefined,
        }
    }

    fn static_resolve(&self, name: &str) -> Option<Value> {
        self.constants.read().unwrap().get(name).cloned()
    }
}
