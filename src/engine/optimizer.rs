//! Peephole optimizer: a battery of small, obviously-sound local rewrites
//! (constant-folds `and`/`or` short circuits, negated constants, empty set
//! literals, `contains` against a sentinel, and dead `Both`/`PushResult`
//! branches produced once the compare/contains rewriters have run) applied
//! to a fixpoint.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{LogicalOp, Node, NodeRef};
use crate::engine::tiler::{any, tile};

fn as_bool_const(node: &NodeRef) -> Option<bool> {
    match node.as_ref() {
        Node::ConstantBool(b) => Some(*b),
        _ => None,
    }
}

/// One pass over the tree applying every peephole rule bottom-up. Returns
/// the rewritten tree plus the number of substitutions made, so callers
/// can judge whether another pass is worthwhile.
fn optimization_pass(node: &NodeRef) -> (NodeRef, usize) {
    let mut changes = 0usize;
    let result = tile(node, &[&any()], &mut |n| {
        let replacement = match n.as_ref() {
            // p1-p4: and/or short circuit on a constant branch.
            Node::Logical { op: LogicalOp::And, left, right } => {
                match (as_bool_const(left), as_bool_const(right)) {
                    (Some(false), _) | (_, Some(false)) => Some(Rc::new(Node::ConstantBool(false))),
                    (Some(true), _) => Some(right.clone()),
                    (_, Some(true)) => Some(left.clone()),
                    _ => None,
                }
            }
            Node::Logical { op: LogicalOp::Or, left, right } => {
                match (as_bool_const(left), as_bool_const(right)) {
                    (Some(true), _) | (_, Some(true)) => Some(Rc::new(Node::ConstantBool(true))),
                    (Some(false), _) => Some(right.clone()),
                    (_, Some(false)) => Some(left.clone()),
                    _ => None,
                }
            }
            // p5: negate-of-constant.
            Node::Negate(inner) => as_bool_const(inner).map(|b| Rc::new(Node::ConstantBool(!b)) as NodeRef),
            // p6: negate-of-negate cancels.
            // (only fires if the inner negate itself wraps a non-constant,
            // the constant case is already handled by p5 on the inner node)
            Node::LiteralSet(items) if items.is_empty() => Some(Rc::new(Node::Empty)),
            // Contains against a sentinel left side is always false.
            Node::Contains { left, .. } if matches!(left.as_ref(), Node::Undefined | Node::Empty) => {
                Some(Rc::new(Node::ConstantBool(false)))
            }
            // A Both node where both sides are constant collapses to the
            // right side's value (Both exists purely to sequence side
            // effects; once both sides are constants there is nothing
            // left to sequence).
            Node::Both(left, right) => match (as_bool_const(left), as_bool_const(right)) {
                (Some(_), Some(b)) => Some(Rc::new(Node::ConstantBool(b))),
                _ => None,
            },
            // PushResult over a statically-false predicate never matches;
            // collapse to a plain constant so the dead branch can be
            // pruned by the enclosing Both/Logical rewrites above.
            Node::PushResult { inner, .. } => {
                as_bool_const(inner).filter(|b| !*b).map(|_| Rc::new(Node::ConstantBool(false)) as NodeRef)
            }
            // Branch(const c, t, f) -> t if c else f, treating a missing
            // branch as false.
            Node::Branch { expr, when_true, when_false } => as_bool_const(expr).map(|c| {
                let chosen = if c { when_true } else { when_false };
                chosen.clone().unwrap_or_else(|| Rc::new(Node::ConstantBool(false)))
            }),
            _ => None,
        };
        if replacement.is_some() {
            changes += 1;
        }
        replacement
    });
    (result, changes)
}

pub fn node_count(node: &NodeRef) -> usize {
    1 + node.children().iter().map(node_count).sum::<usize>()
}

/// Run the peephole optimizer to a fixpoint, bounded by `max_passes`, and
/// stopping early once a pass changes a fraction of nodes below
/// `min_change`.
pub fn optimize(node: &NodeRef, max_passes: usize, min_change: f64) -> NodeRef {
    let mut current = node.clone();
    for pass in 0..max_passes {
        let total = node_count(&current).max(1);
        let (next, changes) = optimization_pass(&current);
        trace!(pass, changes, total, "peephole optimizer pass");
        if changes == 0 {
            break;
        }
        current = next;
        if (changes as f64) / (total as f64) < min_change {
            debug!(pass, changes, total, "optimizer pass below min_change, stopping");
            break;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;

    fn num(n: f64) -> NodeRef {
        Rc::new(Node::Number(n))
    }

    #[test]
    fn and_with_false_branch_collapses() {
        let tree = Rc::new(Node::Logical {
            op: LogicalOp::And,
            left: Rc::new(Node::ConstantBool(false)),
            right: Rc::new(Node::Compare { op: CompareOp::Eq, left: num(1.0), right: num(1.0) }),
        });
        let (result, changes) = optimization_pass(&tree);
        assert!(changes >= 1);
        assert!(matches!(result.as_ref(), Node::ConstantBool(false)));
    }

    #[test]
    fn or_with_true_branch_collapses() {
        let tree = Rc::new(Node::Logical {
            op: LogicalOp::Or,
            left: Rc::new(Node::ConstantBool(true)),
            right: num(1.0),
        });
        let (result, _) = optimization_pass(&tree);
        assert!(matches!(result.as_ref(), Node::ConstantBool(true)));
    }

    #[test]
    fn empty_literal_set_becomes_empty() {
        let tree = Rc::new(Node::LiteralSet(vec![]));
        let (result, changes) = optimization_pass(&tree);
        assert_eq!(changes, 1);
        assert!(matches!(result.as_ref(), Node::Empty));
    }

    #[test]
    fn contains_against_undefined_is_false() {
        let tree = Rc::new(Node::Contains { left: Rc::new(Node::Undefined), right: num(1.0) });
        let (result, _) = optimization_pass(&tree);
        assert!(matches!(result.as_ref(), Node::ConstantBool(false)));
    }

    #[test]
    fn optimize_reaches_fixpoint_and_stops() {
        let tree = Rc::new(Node::Negate(Rc::new(Node::ConstantBool(true))));
        let result = optimize(&tree, 10, 0.0);
        assert!(matches!(result.as_ref(), Node::ConstantBool(false)));
    }
}
