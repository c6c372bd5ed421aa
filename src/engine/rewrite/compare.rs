//! Compare-rewrite: given a pivot comparison `literal OP value` that has
//! been assumed true, simplify a sibling comparison on the same literal.
//!
//! Two families are handled, matching the source's `equality_rewrite` and
//! `order_rewrite`: when the pivot is an equality comparison, the literal's
//! value is pinned, so every sibling equality/order comparison on it
//! collapses to a plain boolean constant. When the pivot is an order
//! comparison, only siblings whose threshold is provably implied or
//! contradicted by the pivot's bound collapse; anything that depends on
//! the literal's exact value (which the pivot alone does not fix) is left
//! unchanged.

use std::collections::HashMap;

use crate::ast::{CompareOp, Node, NodeRef};

/// Picks the value most worth assuming true across a group of sibling
/// comparisons on the same literal: the mode for equality comparisons
/// (the value checked most often), the median for order comparisons on
/// numeric literals (the value that bisects the group, maximizing how
/// many siblings a single assumption can simplify).
pub fn select_rewrite_expression(values: &[(CompareOp, f64)]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let equality: Vec<f64> = values
        .iter()
        .filter(|(op, _)| op.is_equality())
        .map(|(_, v)| *v)
        .collect();
    if !equality.is_empty() {
        return Some(mode(&equality));
    }

    let mut ordered: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    ordered.sort_by(|a, b| a.partial_cmp(b).unwrap());
    Some(median(&ordered))
}

fn mode(values: &[f64]) -> f64 {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let key = v.to_bits();
        let entry = counts.entry(key).or_insert((v, 0));
        entry.1 += 1;
    }
    counts
        .values()
        .max_by_key(|(_, count)| *count)
        .map(|(v, _)| *v)
        .unwrap_or(values[0])
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Rewrite a sibling equality/order comparison `literal sibling_op
/// sibling_value`, given that `literal pivot_op pivot_value` has been
/// assumed true. Returns `Some(bool)` when the sibling's truth value is
/// now fully determined, `None` when it cannot be simplified further.
pub fn compare_rewrite(
    pivot_op: CompareOp,
    pivot_value: f64,
    sibling_op: CompareOp,
    sibling_value: f64,
) -> Option<bool> {
    if pivot_op.is_equality() {
        return equality_rewrite(pivot_op, pivot_value, sibling_op, sibling_value);
    }
    order_rewrite(pivot_op, pivot_value, sibling_op, sibling_value)
}

/// The pivot pins the literal to an exact value (or excludes one); every
/// sibling comparison can now be evaluated directly against that pinned
/// value.
fn equality_rewrite(
    pivot_op: CompareOp,
    pivot_value: f64,
    sibling_op: CompareOp,
    sibling_value: f64,
) -> Option<bool> {
    if pivot_op.is_negated() {
        // Pivot only excludes one value; that's not enough to pin the
        // literal for anything except the identical equality check.
        if sibling_op.is_equality() && sibling_value == pivot_value {
            return Some(sibling_op.is_negated());
        }
        return None;
    }

    match sibling_op {
        CompareOp::Eq | CompareOp::Is => Some(sibling_value == pivot_value),
        CompareOp::NotEq | CompareOp::IsNot => Some(sibling_value != pivot_value),
        CompareOp::Lt => Some(pivot_value < sibling_value),
        CompareOp::LtEq => Some(pivot_value <= sibling_value),
        CompareOp::Gt => Some(pivot_value > sibling_value),
        CompareOp::GtEq => Some(pivot_value >= sibling_value),
    }
}

/// The pivot only bounds the literal (`literal > pivot_value`), so a
/// sibling collapses only when that bound alone settles it: a
/// same-direction sibling with an equal-or-looser threshold is implied; a
/// sibling that directly contradicts the direction at or past the pivot's
/// threshold is excluded. Anything that needs the literal's exact value
/// (equality, or a threshold strictly inside the pivot's open range) is
/// left for the caller to re-test at evaluation time.
fn order_rewrite(
    pivot_op: CompareOp,
    pivot_value: f64,
    sibling_op: CompareOp,
    sibling_value: f64,
) -> Option<bool> {
    use CompareOp::*;

    let pivot_is_lower_bound = matches!(pivot_op, Gt | GtEq);
    let pivot_inclusive = matches!(pivot_op, GtEq | LtEq);

    match sibling_op {
        Gt | GtEq if pivot_is_lower_bound => {
            let sibling_inclusive = matches!(sibling_op, GtEq);
            if sibling_value < pivot_value
                || (sibling_value == pivot_value && (pivot_inclusive || !sibling_inclusive))
            {
                Some(true)
            } else {
                None
            }
        }
        Lt | LtEq if !pivot_is_lower_bound => {
            let sibling_inclusive = matches!(sibling_op, LtEq);
            if sibling_value > pivot_value
                || (sibling_value == pivot_value && (pivot_inclusive || !sibling_inclusive))
            {
                Some(true)
            } else {
                None
            }
        }
        // Opposite direction: the pivot's bound directly contradicts a
        // sibling bound at or beyond it.
        Lt | LtEq if pivot_is_lower_bound => {
            if sibling_value <= pivot_value && !(sibling_value == pivot_value && matches!(sibling_op, LtEq) && pivot_inclusive) {
                Some(false)
            } else {
                None
            }
        }
        Gt | GtEq if !pivot_is_lower_bound => {
            if sibling_value >= pivot_value && !(sibling_value == pivot_value && matches!(sibling_op, GtEq) && pivot_inclusive) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Extract `(op, value)` from a `Compare` node whose left side is the
/// shared pivot literal and whose right side is a numeric constant, for
/// feeding into [`select_rewrite_expression`]/[`compare_rewrite`].
pub fn as_numeric_compare(node: &NodeRef) -> Option<(CompareOp, f64)> {
    match node.as_ref() {
        Node::Compare { op, right, .. } => match right.as_ref() {
            Node::Number(n) => Some((*op, *n)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_pivot_decides_every_sibling() {
        // age is 30 assumed true
        assert_eq!(equality_rewrite(CompareOp::Is, 30.0, CompareOp::Gt, 20.0), Some(true));
        assert_eq!(equality_rewrite(CompareOp::Is, 30.0, CompareOp::Gt, 40.0), Some(false));
        assert_eq!(equality_rewrite(CompareOp::Is, 30.0, CompareOp::Eq, 30.0), Some(true));
        assert_eq!(equality_rewrite(CompareOp::Is, 30.0, CompareOp::NotEq, 30.0), Some(false));
    }

    #[test]
    fn order_pivot_implies_same_direction_looser_sibling() {
        // age > 40 assumed true implies age > 20
        assert_eq!(order_rewrite(CompareOp::Gt, 40.0, CompareOp::Gt, 20.0), Some(true));
    }

    #[test]
    fn order_pivot_excludes_opposite_direction_sibling() {
        // age > 40 assumed true excludes age < 20
        assert_eq!(order_rewrite(CompareOp::Gt, 40.0, CompareOp::Lt, 20.0), Some(false));
    }

    #[test]
    fn order_pivot_cannot_decide_tighter_same_direction_sibling() {
        // age > 20 assumed true says nothing about age > 40
        assert_eq!(order_rewrite(CompareOp::Gt, 20.0, CompareOp::Gt, 40.0), None);
    }

    #[test]
    fn median_pivot_picked_for_order_group() {
        let values = [(CompareOp::Gt, 20.0), (CompareOp::Gt, 40.0), (CompareOp::Gt, 60.0)];
        assert_eq!(select_rewrite_expression(&values), Some(40.0));
    }

    #[test]
    fn mode_pivot_picked_for_equality_group() {
        let values = [(CompareOp::Is, 1.0), (CompareOp::Is, 1.0), (CompareOp::Is, 2.0)];
        assert_eq!(select_rewrite_expression(&values), Some(1.0));
    }
}
