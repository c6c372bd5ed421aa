//! End-to-end scenarios and cross-cutting invariants for compiled
//! predicate sets, run against the public crate API rather than any
//! internal module.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use predicate_set::ast::Value;
use predicate_set::config::RefactorSettings;
use predicate_set::document::Document;
use predicate_set::predicate::Predicate;
use predicate_set::predicate_set::OptimizedPredicateSet;
use predicate_set::resolver::LiteralResolver;

fn doc(json: &str) -> Document {
    Document::from_str(json).unwrap()
}

fn set_of(sources: &[&str]) -> OptimizedPredicateSet {
    let mut set = OptimizedPredicateSet::default();
    set.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();
    set
}

#[test]
fn name_equality_matches_exactly_one() {
    let mut set = set_of(&["name is 'Jack'", "name is 'Jill'"]);
    let matches = set.evaluate(&doc(r#"{"name":"Jill"}"#));
    assert_eq!(matches, vec!["name is 'Jill'".to_string()]);
}

#[test]
fn median_pivot_resolves_age_thresholds() {
    let mut set = set_of(&["age > 20", "age > 40", "age > 60"]);
    let mut matches = set.evaluate(&doc(r#"{"age":50}"#));
    matches.sort();
    let mut expected = vec!["age > 20".to_string(), "age > 40".to_string()];
    expected.sort();
    assert_eq!(matches, expected);
}

/// A resolver that counts how many times each literal name is actually
/// looked up, wrapping a plain document lookup. Holds its counts behind an
/// `Arc` so a clone can be kept by the test after the resolver itself is
/// moved into the set.
#[derive(Clone, Default)]
struct CountingResolver {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl CountingResolver {
    fn count(&self, name: &str) -> u64 {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl LiteralResolver for CountingResolver {
    fn resolve(&self, doc: &Document, name: &str) -> Value {
        *self.counts.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
        match doc.get_path(name) {
            Some(json) => Value::from(json),
            None => Value::Undefined,
        }
    }

    fn static_resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

#[test]
fn shared_literal_is_resolved_once_per_evaluation() {
    let mut set = set_of(&["gender is 'M' and age > 30", "gender is 'F' and age > 30"]);

    let resolver = CountingResolver::default();
    let handle = resolver.clone();
    set.set_resolver(resolver);

    let matches = set.evaluate(&doc(r#"{"gender":"M","age":40}"#));
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0], "gender is 'M' and age > 30");
    assert_eq!(handle.count("gender"), 1, "gender should be resolved once, not once per predicate");
}

#[test]
fn contains_rewrite_matches_all_three_shared_sets() {
    let mut set = set_of(&["{1 2 3} contains x", "{2 3 4} contains x", "{3 4 5} contains x"]);
    let mut matches = set.evaluate(&doc(r#"{"x":3}"#));
    matches.sort();
    let mut expected: Vec<String> =
        ["{1 2 3} contains x", "{2 3 4} contains x", "{3 4 5} contains x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    expected.sort();
    assert_eq!(matches, expected);
}

#[test]
fn empty_list_never_contains_anything() {
    let mut set = set_of(&["errors contains 'disk'"]);
    assert_eq!(set.evaluate(&doc(r#"{"errors":["disk full","cpu"]}"#)).len(), 1);
    assert!(set.evaluate(&doc(r#"{"errors":[]}"#)).is_empty());
}

#[test]
fn regex_matches_against_server_name() {
    let mut set = set_of(&["server matches '^web-[0-9]+$'"]);
    assert_eq!(set.evaluate(&doc(r#"{"server":"web-12"}"#)).len(), 1);
    assert!(set.evaluate(&doc(r#"{"server":"db-1"}"#)).is_empty());
}

#[test]
fn invalid_regex_surfaces_in_the_regex_diagnostics_map() {
    let p = Predicate::new("server matches '('");
    assert!(!p.is_valid());
    assert!(p.errors().regex.contains_key("("));
}

#[test]
fn naive_and_optimized_sets_agree_across_refactor_presets() {
    let sources = [
        "name is 'Jack'",
        "age > 20",
        "age > 40",
        "age > 60",
        "gender is 'Male' and age > 30",
        "{1 2 3} contains x",
        "{2 3 4} contains x",
    ];
    let docs = [
        r#"{"name":"Jack","age":50,"gender":"Male","x":3}"#,
        r#"{"name":"Jill","age":10,"gender":"Female","x":9}"#,
        r#"{"age":65,"gender":"Male","x":2}"#,
    ];

    for settings in [
        RefactorSettings::minimum(),
        RefactorSettings::shallow(),
        RefactorSettings::deep(),
        RefactorSettings::extreme(),
    ] {
        let mut naive = predicate_set::predicate_set::PredicateSet::new();
        naive.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();

        let mut optimized = OptimizedPredicateSet::new(settings);
        optimized.update(sources.iter().map(|s| Predicate::new(*s))).unwrap();

        for d in &docs {
            let document = doc(d);
            let mut naive_matches: Vec<String> =
                naive.evaluate(&document).into_iter().map(String::from).collect();
            let mut optimized_matches = optimized.evaluate(&document);
            naive_matches.sort();
            optimized_matches.sort();
            assert_eq!(naive_matches, optimized_matches, "mismatch for {document:?}");
        }
    }
}
