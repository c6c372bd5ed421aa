//! The refactor loop: repeatedly pick the literal most shared across a
//! group of predicates as a pivot, assume it true, rewrite every sibling
//! comparison that the assumption settles, and split the group into a
//! pivot-true branch (rewritten, usually much simpler) and a pivot-false
//! branch (left untouched) — recursing into each until no pivot clears
//! `min_select` or `max_depth` is reached.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::ast::{CompareOp, LiteralSetItem, Node, NodeRef, PredicateHandle};
use crate::config::RefactorSettings;
use crate::engine::canonicalize::canonicalize;
use crate::engine::merge::merge;
use crate::engine::optimizer::optimize;
use crate::engine::rewrite::compare::{compare_rewrite, select_rewrite_expression};
use crate::engine::rewrite::contains::{
    contains_rewrite, contains_rewrite_assumed_false, select_rewrite_expression as select_contains_pivot,
    ContainsRewrite,
};
use crate::engine::tiler::{pred, tile};

type Predicates = Vec<(PredicateHandle, NodeRef)>;

/// Count, per literal name, how many eligible comparisons/contains
/// reference it across the whole group — the candidate pool for picking a
/// pivot.
fn count_candidates(predicates: &Predicates) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for (_, ast) in predicates {
        collect_literal_refs(ast, &mut counts);
    }
    counts
}

fn collect_literal_refs(node: &NodeRef, counts: &mut HashMap<String, usize>) {
    match node.as_ref() {
        Node::Compare { left, .. } => {
            if let Node::Literal(name) = left.as_ref() {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        Node::Contains { left, right } => {
            if let Node::Literal(name) = left.as_ref() {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
            if let Node::Literal(name) = right.as_ref() {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        _ => {}
    }
    for child in node.children() {
        collect_literal_refs(&child, counts);
    }
}

/// Pick the literal with the highest candidate count, ties broken by
/// first-seen name so compiling the same set twice is deterministic.
fn pick_pivot_literal(counts: &HashMap<String, usize>, min_select: usize) -> Option<String> {
    counts
        .iter()
        .filter(|(_, &count)| count >= min_select)
        .max_by(|(name_a, count_a), (name_b, count_b)| {
            count_a.cmp(count_b).then_with(|| name_b.cmp(name_a))
        })
        .map(|(name, _)| name.clone())
}

/// Collect every numeric `Compare` whose left side is `literal`, across the
/// whole group, to feed [`select_rewrite_expression`].
fn numeric_compares_on(predicates: &Predicates, literal: &str) -> Vec<(CompareOp, f64)> {
    let mut found = Vec::new();
    fn walk(node: &NodeRef, literal: &str, out: &mut Vec<(CompareOp, f64)>) {
        if let Node::Compare { op, left, right } = node.as_ref() {
            if matches!(left.as_ref(), Node::Literal(n) if n == literal) {
                if let Node::Number(v) = right.as_ref() {
                    out.push((*op, *v));
                }
            }
        }
        for child in node.children() {
            walk(&child, literal, out);
        }
    }
    for (_, ast) in predicates {
        walk(ast, literal, &mut found);
    }
    found
}

fn literal_sets_on(predicates: &Predicates, literal: &str) -> Vec<Vec<LiteralSetItem>> {
    let mut found = Vec::new();
    fn walk(node: &NodeRef, literal: &str, out: &mut Vec<Vec<LiteralSetItem>>) {
        if let Node::Contains { left, right } = node.as_ref() {
            if matches!(right.as_ref(), Node::Literal(n) if n == literal) {
                if let Node::LiteralSet(items) = left.as_ref() {
                    out.push(items.clone());
                }
            }
        }
        for child in node.children() {
            walk(&child, literal, out);
        }
    }
    for (_, ast) in predicates {
        walk(ast, literal, &mut found);
    }
    found
}

/// Rewrite `ast` given that `literal pivot_op pivot_value` has been assumed
/// to equal `assumed`, replacing every settled sibling comparison/contains
/// on `literal` with its resolved boolean constant. The assumed-false case
/// for a compare pivot is just the assumed-true case of its negated
/// operator (`age > 40` assumed false is exactly `age <= 40` assumed true);
/// contains has its own assumed-false set algebra ([`contains_rewrite_assumed_false`]).
fn rewrite_with_assumption(
    ast: &NodeRef,
    literal: &str,
    pivot_op: CompareOp,
    pivot_value: f64,
    pivot_set: Option<&[LiteralSetItem]>,
    assumed: bool,
) -> NodeRef {
    let effective_op = if assumed { pivot_op } else { pivot_op.negate() };
    tile(
        ast,
        &[&pred(|n| matches!(n.as_ref(), Node::Compare { .. } | Node::Contains { .. }))],
        &mut |n| match n.as_ref() {
            Node::Compare { op, left, right } if matches!(left.as_ref(), Node::Literal(name) if name == literal) => {
                let Node::Number(sibling_value) = right.as_ref() else { return None };
                compare_rewrite(effective_op, pivot_value, *op, *sibling_value)
                    .map(|b| Rc::new(Node::ConstantBool(b)) as NodeRef)
            }
            Node::Contains { left, right } if matches!(right.as_ref(), Node::Literal(name) if name == literal) => {
                let (Node::LiteralSet(sibling), Some(pivot_set)) = (left.as_ref(), pivot_set) else {
                    return None;
                };
                let rewrite =
                    if assumed { contains_rewrite(pivot_set, sibling) } else { contains_rewrite_assumed_false(pivot_set, sibling) };
                Some(match rewrite {
                    ContainsRewrite::AlwaysTrue => Rc::new(Node::ConstantBool(true)),
                    ContainsRewrite::AlwaysFalse => Rc::new(Node::ConstantBool(false)),
                    ContainsRewrite::Intersected(items) => Rc::new(Node::Contains {
                        left: Rc::new(Node::LiteralSet(items)),
                        right: right.clone(),
                    }),
                    ContainsRewrite::NegatedRemainder(items) => Rc::new(Node::Negate(Rc::new(Node::Contains {
                        left: Rc::new(Node::LiteralSet(items)),
                        right: right.clone(),
                    }))),
                })
            }
            _ => None,
        },
    )
}

/// Build the merged, evaluate-in-one-pass tree for a group of predicates,
/// recursively splitting on the best available pivot until none clears
/// `min_select` or `max_depth` is reached.
pub fn recursive_refactor(predicates: Predicates, settings: &RefactorSettings, depth: usize) -> NodeRef {
    if predicates.is_empty() {
        return Rc::new(Node::ConstantBool(false));
    }
    if depth >= settings.max_depth {
        return merge(&predicates);
    }

    let counts = count_candidates(&predicates);
    let Some(pivot_literal) = pick_pivot_literal(&counts, settings.min_select) else {
        return merge(&predicates);
    };

    let numeric = numeric_compares_on(&predicates, &pivot_literal);
    let sets = literal_sets_on(&predicates, &pivot_literal);

    if let Some(pivot_value) = select_rewrite_expression(&numeric) {
        let (pivot_op, _) = numeric
            .iter()
            .find(|(_, v)| *v == pivot_value)
            .copied()
            .unwrap_or((CompareOp::Gt, pivot_value));

        debug!(pivot_literal, pivot_value, depth, "selected compare pivot");

        let guard = Rc::new(Node::Compare {
            op: pivot_op,
            left: Rc::new(Node::Literal(pivot_literal.clone())),
            right: Rc::new(Node::Number(pivot_value)),
        });

        let mut affected: Predicates = Vec::new();
        let mut unaffected: Predicates = Vec::new();
        for (handle, ast) in predicates {
            if numeric_compares_on(&[(handle.clone(), ast.clone())], &pivot_literal).is_empty() {
                unaffected.push((handle, ast));
            } else {
                affected.push((handle, ast));
            }
        }

        let true_branch: Predicates = affected
            .iter()
            .map(|(handle, ast)| {
                let rewritten = rewrite_with_assumption(ast, &pivot_literal, pivot_op, pivot_value, None, true);
                (handle.clone(), optimize(&rewritten, settings.max_opt_pass, settings.min_change))
            })
            .collect();
        let false_branch: Predicates = affected
            .iter()
            .map(|(handle, ast)| {
                let rewritten = rewrite_with_assumption(ast, &pivot_literal, pivot_op, pivot_value, None, false);
                (handle.clone(), optimize(&rewritten, settings.max_opt_pass, settings.min_change))
            })
            .collect();

        let true_tree = recursive_refactor(true_branch, settings, depth + 1);
        let false_tree = recursive_refactor(false_branch, settings, depth + 1);

        let split = Rc::new(Node::Branch {
            expr: guard,
            when_true: Some(true_tree),
            when_false: Some(false_tree),
        });

        return if unaffected.is_empty() {
            split
        } else {
            Rc::new(Node::Both(merge(&unaffected), split))
        };
    }

    if let Some(best_idx) = select_contains_pivot(&sets, settings.min_density) {
        let pivot_set = sets[best_idx].clone();
        debug!(pivot_literal, depth, set_len = pivot_set.len(), "selected contains pivot");

        let guard = Rc::new(Node::Contains {
            left: Rc::new(Node::LiteralSet(pivot_set.clone())),
            right: Rc::new(Node::Literal(pivot_literal.clone())),
        });

        let mut affected: Predicates = Vec::new();
        let mut unaffected: Predicates = Vec::new();
        for (handle, ast) in predicates {
            if literal_sets_on(&[(handle.clone(), ast.clone())], &pivot_literal).is_empty() {
                unaffected.push((handle, ast));
            } else {
                affected.push((handle, ast));
            }
        }

        let true_branch: Predicates = affected
            .iter()
            .map(|(handle, ast)| {
                let rewritten =
                    rewrite_with_assumption(ast, &pivot_literal, CompareOp::Is, 0.0, Some(&pivot_set), true);
                (handle.clone(), optimize(&rewritten, settings.max_opt_pass, settings.min_change))
            })
            .collect();
        let false_branch: Predicates = affected
            .iter()
            .map(|(handle, ast)| {
                let rewritten =
                    rewrite_with_assumption(ast, &pivot_literal, CompareOp::Is, 0.0, Some(&pivot_set), false);
                (handle.clone(), optimize(&rewritten, settings.max_opt_pass, settings.min_change))
            })
            .collect();

        let true_tree = recursive_refactor(true_branch, settings, depth + 1);
        let false_tree = recursive_refactor(false_branch, settings, depth + 1);

        let split = Rc::new(Node::Branch {
            expr: guard,
            when_true: Some(true_tree),
            when_false: Some(false_tree),
        });

        return if unaffected.is_empty() {
            split
        } else {
            Rc::new(Node::Both(merge(&unaffected), split))
        };
    }

    merge(&predicates)
}

/// Canonicalize, statically resolve, and peephole-optimize every
/// predicate before handing the group to [`recursive_refactor`].
pub fn prepare(
    predicates: Predicates,
    resolver: &dyn crate::resolver::LiteralResolver,
    settings: &RefactorSettings,
) -> Predicates {
    predicates
        .into_iter()
        .map(|(handle, ast)| {
            let canonical = canonicalize(&ast);
            let resolved = crate::engine::canonicalize::resolve_statics(&canonical, resolver);
            let optimized = optimize(&resolved, settings.max_opt_pass, settings.min_change);
            (handle, optimized)
        })
        .collect()
}
