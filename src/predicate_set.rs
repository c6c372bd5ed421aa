//! Predicate sets: a naive sequential implementation (the reference
//! behavior every optimization must match) and the optimizing
//! implementation this crate exists to build.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{self, EvalContext, Node, NodeRef, PredicateHandle};
use crate::config::RefactorSettings;
use crate::document::Document;
use crate::engine::cache::insert_caches;
use crate::engine::canonicalize::resolve_statics;
use crate::engine::compact::compact;
use crate::engine::optimizer::optimize;
use crate::engine::refactor::{prepare, recursive_refactor};
use crate::errors::EngineError;
use crate::predicate::Predicate;
use crate::resolver::{DocumentResolver, LiteralResolver};

/// Naive predicate set: evaluates every predicate independently,
/// sequentially. No optimization, but it is the ground truth the
/// optimized set's output must always agree with.
#[derive(Default)]
pub struct PredicateSet {
    predicates: Vec<Predicate>,
    finalized: bool,
}

impl PredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, p: Predicate) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::FinalizedSet);
        }
        if !p.is_valid() {
            return Err(EngineError::invalid_predicate(p.source().to_string()));
        }
        self.predicates.push(p);
        Ok(())
    }

    pub fn update(&mut self, preds: impl IntoIterator<Item = Predicate>) -> Result<(), EngineError> {
        for p in preds {
            self.add(p)?;
        }
        Ok(())
    }

    pub fn evaluate(&self, doc: &Document) -> Vec<&str> {
        self.predicates
            .iter()
            .filter(|p| p.evaluate(doc))
            .map(|p| p.source())
            .collect()
    }

    /// Enters the terminal state: further `add`/`update` calls fail with
    /// `FinalizedSet`. The naive set has no compiled plan or per-predicate
    /// AST to drop, so this is otherwise a no-op.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn description(&self) -> String {
        format!("PredicateSet {{ predicates: {}, finalized: {} }}", self.predicates.len(), self.finalized)
    }
}

/// The optimizing predicate set: merges every predicate into one AST,
/// canonicalizes and statically resolves it, rewrites sibling comparisons
/// against a chosen pivot, peephole-optimizes, and finally runs CSE
/// compaction — then evaluates every predicate in a single pass.
pub struct OptimizedPredicateSet {
    sources: HashSet<String>,
    entries: Vec<(PredicateHandle, NodeRef)>,
    resolver: Box<dyn LiteralResolver>,
    settings: RefactorSettings,
    compiled: Option<NodeRef>,
    finalized: bool,
    predicate_count: usize,
}

impl Default for OptimizedPredicateSet {
    fn default() -> Self {
        Self::new(RefactorSettings::default())
    }
}

impl OptimizedPredicateSet {
    pub fn new(settings: RefactorSettings) -> Self {
        Self {
            sources: HashSet::new(),
            entries: Vec::new(),
            resolver: Box::new(DocumentResolver::new()),
            settings,
            compiled: None,
            finalized: false,
            predicate_count: 0,
        }
    }

    pub fn set_resolver(&mut self, resolver: impl LiteralResolver + 'static) {
        self.resolver = Box::new(resolver);
        self.compiled = None;
    }

    /// Updates the set with a new predicate. Invalidates the compiled
    /// plan; interleaving `add`/`evaluate` recompiles on the next call.
    /// Fails with `FinalizedSet` once `finalize` has been called.
    pub fn add(&mut self, p: Predicate) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::FinalizedSet);
        }
        if !p.is_valid() {
            return Err(EngineError::invalid_predicate(p.source().to_string()));
        }
        if self.sources.insert(p.source().to_string()) {
            let ast = p.ast().expect("validated above").clone();
            self.entries.push((PredicateHandle::new(p.source()), ast));
            self.compiled = None;
            self.predicate_count += 1;
        }
        Ok(())
    }

    pub fn update(&mut self, preds: impl IntoIterator<Item = Predicate>) -> Result<(), EngineError> {
        for p in preds {
            self.add(p)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forces (re)compilation of the merged plan. Must be called after any
    /// change to the set if callers want the cost paid up front rather
    /// than on the next `evaluate`.
    ///
    /// An empty set compiles to `Constant(true)`: there is nothing to
    /// refactor, and vacuously every predicate (there are none) matches.
    /// Otherwise runs the full pipeline: canonicalize/static-resolve/
    /// peephole-optimize each predicate, refactor the group around shared
    /// pivots, static-resolve and peephole-optimize again (the refactor
    /// pass can shrink literal sets and fold new constants into reach), CSE
    /// compaction, and finally cache-node insertion over whatever the
    /// compactor left shared.
    pub fn compile_ast(&mut self) {
        if self.entries.is_empty() {
            self.compiled = Some(Rc::new(Node::ConstantBool(true)));
            return;
        }
        let prepared = prepare(self.entries.clone(), self.resolver.as_ref(), &self.settings);
        let refactored = recursive_refactor(prepared, &self.settings, 0);
        let resolved = resolve_statics(&refactored, self.resolver.as_ref());
        let reoptimized = optimize(&resolved, self.settings.max_opt_pass, self.settings.min_change);
        let compacted = compact(&reoptimized);
        self.compiled = Some(insert_caches(&compacted));
    }

    fn ensure_compiled(&mut self) {
        if self.compiled.is_none() {
            self.compile_ast();
        }
    }

    pub fn evaluate(&mut self, doc: &Document) -> Vec<String> {
        self.ensure_compiled();
        let tree = self.compiled.as_ref().expect("just compiled");
        let mut ctx = EvalContext::new(doc, self.resolver.as_ref());
        ast::eval_value(tree, &mut ctx);
        ctx.into_matches().into_iter().map(|h| h.source().to_string()).collect()
    }

    /// Same as `evaluate`, but with failure-trace collection turned on;
    /// returns the matched predicate sources plus, for every predicate that
    /// did not match, a human-readable reason.
    pub fn analyze(&mut self, doc: &Document) -> (Vec<String>, Vec<String>) {
        self.ensure_compiled();
        let tree = self.compiled.as_ref().expect("just compiled");
        let mut ctx = EvalContext::new(doc, self.resolver.as_ref());
        ctx.set_analyze(true);
        ast::eval_value(tree, &mut ctx);
        let failed = ctx.failed().to_vec();
        let matches = ctx.into_matches().into_iter().map(|h| h.source().to_string()).collect();
        (matches, failed)
    }

    /// Enters the terminal state: compiles if needed, drops the
    /// per-predicate ASTs (only the merged compiled plan is needed to keep
    /// evaluating), and forbids further mutation.
    pub fn finalize(&mut self) {
        self.ensure_compiled();
        self.entries.clear();
        self.sources.clear();
        self.finalized = true;
    }

    pub fn description(&self) -> String {
        let nodes = self.compiled.as_ref().map(crate::engine::optimizer::node_count);
        format!(
            "OptimizedPredicateSet {{ predicates: {}, compiled_nodes: {:?}, finalized: {} }}",
            self.predicate_count, nodes, self.finalized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Document {
        Document::from_str(json).unwrap()
    }

    #[test]
    fn naive_and_optimized_sets_agree() {
        let sources = [
            "name is 'Jack'",
            "age > 20",
            "age > 40",
            "age > 60",
            "gender is 'Male' and age > 30",
        ];

        let mut naive = PredicateSet::new();
        naive.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();

        let mut optimized = OptimizedPredicateSet::default();
        optimized.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();

        for (name, age, gender) in [("Jack", 50, "Male"), ("Jill", 10, "Female"), ("Jack", 25, "Female")] {
            let d = doc(&format!(r#"{{"name":"{name}","age":{age},"gender":"{gender}"}}"#));
            let mut naive_matches: Vec<String> = naive.evaluate(&d).into_iter().map(String::from).collect();
            let mut optimized_matches = optimized.evaluate(&d);
            naive_matches.sort();
            optimized_matches.sort();
            assert_eq!(naive_matches, optimized_matches, "mismatch for {d:?}");
        }
    }

    #[test]
    fn contains_scenario_matches_all_three() {
        let sources = ["{1 2 3} contains x", "{2 3 4} contains x", "{3 4 5} contains x"];
        let mut optimized = OptimizedPredicateSet::default();
        optimized.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();
        let d = doc(r#"{"x":3}"#);
        let mut matches = optimized.evaluate(&d);
        matches.sort();
        let mut expected: Vec<String> = sources.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(matches, expected);
    }

    #[test]
    fn empty_collection_contains_is_false() {
        let mut optimized = OptimizedPredicateSet::default();
        optimized.add(Predicate::new("errors contains 'disk'")).unwrap();
        assert!(optimized.evaluate(&doc(r#"{"errors":["disk full","cpu"]}"#)).len() == 1);
        assert!(optimized.evaluate(&doc(r#"{"errors":[]}"#)).is_empty());
    }

    #[test]
    fn empty_set_compiles_to_always_true() {
        let mut optimized = OptimizedPredicateSet::default();
        assert!(optimized.evaluate(&doc(r#"{}"#)).is_empty());
        optimized.compile_ast();
        assert!(matches!(optimized.compiled.as_deref(), Some(Node::ConstantBool(true))));
    }

    #[test]
    fn finalize_rejects_further_mutation() {
        let mut optimized = OptimizedPredicateSet::default();
        optimized.add(Predicate::new("age > 20")).unwrap();
        optimized.finalize();
        let err = optimized.add(Predicate::new("age > 30")).unwrap_err();
        assert!(matches!(err, EngineError::FinalizedSet));
        // Evaluation against the already-compiled plan keeps working.
        assert_eq!(optimized.evaluate(&doc(r#"{"age":25}"#)), vec!["age > 20".to_string()]);
    }

    #[test]
    fn analyze_reports_failure_reasons_for_unmatched_predicates() {
        let mut optimized = OptimizedPredicateSet::default();
        optimized.add(Predicate::new("age > 20")).unwrap();
        let (matches, failed) = optimized.analyze(&doc(r#"{"age":10}"#));
        assert!(matches.is_empty());
        assert_eq!(failed.len(), 1);
        assert!(failed[0].contains("age > 20"));
    }
}
