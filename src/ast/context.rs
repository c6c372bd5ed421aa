//! Evaluation context threaded through a single `evaluate`/`analyze` call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ast::value::Value;
use crate::ast::PredicateHandle;
use crate::document::Document;
use crate::resolver::LiteralResolver;

static NEXT_PREDICATE_ID: AtomicU64 = AtomicU64::new(1);

/// A predicate's identity inside a [`crate::predicate_set::OptimizedPredicateSet`].
///
/// Cheap to clone (an `Arc`'d source string plus a stable id), `Hash`/`Eq`
/// on the id so it can live in a `HashSet` alongside its source predicates.
#[derive(Debug, Clone)]
pub struct PredicateHandle {
    id: u64,
    source: Arc<str>,
}

impl PredicateHandle {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_PREDICATE_ID.fetch_add(1, Ordering::Relaxed),
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for PredicateHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for PredicateHandle {}
impl std::hash::Hash for PredicateHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Per-evaluation scratch state: caches repeated literal lookups and
/// repeated subexpression results within one `evaluate` call, counts how
/// many times each cached node was reached (used by `analyze`), and
/// collects matches pushed by `Node::PushResult` leaves.
pub struct EvalContext<'a> {
    pub doc: &'a Document,
    pub resolver: &'a dyn LiteralResolver,
    literal_cache: HashMap<String, Value>,
    subexpr_cache: HashMap<usize, bool>,
    cache_reach: HashMap<usize, u64>,
    push_reach: u64,
    failed: Vec<String>,
    /// When false, short-circuit logical evaluation still happens but
    /// reach-counting/failure collection (used by `analyze`) is skipped.
    analyze: bool,
    matches: Vec<PredicateHandle>,
}

impl<'a> EvalContext<'a> {
    pub fn new(doc: &'a Document, resolver: &'a dyn LiteralResolver) -> Self {
        Self {
            doc,
            resolver,
            literal_cache: HashMap::new(),
            subexpr_cache: HashMap::new(),
            cache_reach: HashMap::new(),
            push_reach: 0,
            failed: Vec::new(),
            analyze: false,
            matches: Vec::new(),
        }
    }

    pub fn resolve_literal(&mut self, name: &str) -> Value {
        if let Some(v) = self.literal_cache.get(name) {
            return v.clone();
        }
        let v = self.resolver.resolve(self.doc, name);
        self.literal_cache.insert(name.to_string(), v.clone());
        v
    }

    pub fn cached_result(&self, id: usize) -> Option<bool> {
        self.subexpr_cache.get(&id).copied()
    }

    pub fn store_cached_result(&mut self, id: usize, value: bool) {
        self.subexpr_cache.insert(id, value);
    }

    /// Record that a `Cached` node with this id was reached during
    /// evaluation, whether or not it was a cache hit.
    pub fn note_cache_reach(&mut self, id: usize) {
        *self.cache_reach.entry(id).or_insert(0) += 1;
    }

    pub fn note_push_reach(&mut self) {
        self.push_reach += 1;
    }

    pub fn push_match(&mut self, handle: PredicateHandle) {
        self.matches.push(handle);
    }

    pub fn push_reach_count(&self) -> u64 {
        self.push_reach
    }

    pub fn into_matches(self) -> Vec<PredicateHandle> {
        self.matches
    }

    /// Runs `f` with analyze bookkeeping disabled, restoring the previous
    /// setting afterwards. Used by the optimizer's constant-folding passes,
    /// which must not pollute the reach counters of a real evaluation.
    pub fn with_analyze_off<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let prev = self.analyze;
        self.analyze = false;
        let result = f(self);
        self.analyze = prev;
        result
    }

    pub fn set_analyze(&mut self, on: bool) {
        self.analyze = on;
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyze
    }

    pub fn record_failed(&mut self, predicate_source: &str) {
        if self.analyze {
            self.failed.push(predicate_source.to_string());
        }
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn reach_count(&self, id: usize) -> u64 {
        self.cache_reach.get(&id).copied().unwrap_or(0)
    }
}
