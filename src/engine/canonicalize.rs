//! Canonicalizes comparison operand order so that structurally-equivalent
//! predicates (`age > 30` and `30 < age`) produce the same AST shape, and
//! statically resolves `Literal` names that the caller's resolver can
//! answer without a document (e.g. named constants).

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{CompareOp, Node, NodeRef, Value};
use crate::engine::tiler::{pred, tile};
use crate::resolver::LiteralResolver;

fn literal_key(node: &NodeRef) -> Option<&str> {
    match node.as_ref() {
        Node::Literal(name) => Some(name.as_str()),
        _ => None,
    }
}

fn static_value_key(node: &NodeRef) -> Option<String> {
    match node.as_ref() {
        Node::Number(n) => Some(format!("{n:020}")),
        Node::ConstantStr(s) => Some(s.clone()),
        Node::ConstantBool(b) => Some(b.to_string()),
        Node::ConstantNull => Some(String::new()),
        _ => None,
    }
}

/// Decide whether `left`/`right` should swap (and the operator flip to
/// match) to reach canonical order. Rules, in priority order: a static
/// operand never sits left of a non-static one; between two non-static
/// operands, order by identifier name; between two static operands, order
/// by ascending value.
fn should_swap(left: &NodeRef, right: &NodeRef) -> bool {
    let left_static = left.is_static();
    let right_static = right.is_static();

    if left_static != right_static {
        return left_static;
    }

    if !left_static {
        if let (Some(a), Some(b)) = (literal_key(left), literal_key(right)) {
            return a > b;
        }
        return false;
    }

    match (static_value_key(left), static_value_key(right)) {
        (Some(a), Some(b)) => a.cmp(&b) == Ordering::Greater,
        _ => false,
    }
}

/// Canonicalize every `Compare` node's operand order in the tree.
pub fn canonicalize(node: &NodeRef) -> NodeRef {
    tile(
        node,
        &[&pred(|n| matches!(n.as_ref(), Node::Compare { .. }))],
        &mut |n| {
            let Node::Compare { op, left, right } = n.as_ref() else {
                return None;
            };
            if !should_swap(left, right) {
                return None;
            }
            Some(Rc::new(Node::Compare {
                op: flip_for_swap(*op),
                left: right.clone(),
                right: left.clone(),
            }))
        },
    )
}

fn flip_for_swap(op: CompareOp) -> CompareOp {
    op.flip()
}

/// Replace every `Literal` whose name the resolver can answer statically
/// (e.g. a registered named constant) with the resolved constant node.
/// Names the resolver cannot answer remain `Literal` and are resolved
/// per-document at evaluation time, same as before.
pub fn resolve_statics(node: &NodeRef, resolver: &dyn LiteralResolver) -> NodeRef {
    tile(
        node,
        &[&pred(|n| matches!(n.as_ref(), Node::Literal(_)))],
        &mut |n| {
            let Node::Literal(name) = n.as_ref() else {
                return None;
            };
            resolver.static_resolve(name).map(|v| Rc::new(value_to_const(v)))
        },
    )
}

fn value_to_const(v: Value) -> Node {
    match v {
        Value::Str(s) => Node::ConstantStr(s),
        Value::Num(n) => Node::Number(n),
        Value::Bool(b) => Node::ConstantBool(b),
        Value::Null => Node::ConstantNull,
        Value::Undefined => Node::Undefined,
        Value::Empty => Node::Empty,
        Value::List(items) => Node::LiteralSet(
            items
                .into_iter()
                .filter_map(|i| match i {
                    Value::Num(n) => Some(crate::ast::LiteralSetItem::Num(n)),
                    Value::Str(s) => Some(crate::ast::LiteralSetItem::Str(s)),
                    _ => None,
                })
                .collect(),
        ),
        Value::Regex(_) => Node::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DocumentResolver;

    fn compare(op: CompareOp, left: Node, right: Node) -> NodeRef {
        Rc::new(Node::Compare { op, left: Rc::new(left), right: Rc::new(right) })
    }

    #[test]
    fn static_moves_to_the_right_and_operator_flips() {
        let tree = compare(CompareOp::Lt, Node::Number(30.0), Node::Literal("age".into()));
        let result = canonicalize(&tree);
        match result.as_ref() {
            Node::Compare { op, left, right } => {
                assert!(matches!(left.as_ref(), Node::Literal(name) if name == "age"));
                assert!(matches!(right.as_ref(), Node::Number(n) if *n == 30.0));
                assert_eq!(*op, CompareOp::Gt);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn idempotent_on_already_canonical_tree() {
        let tree = compare(CompareOp::Gt, Node::Literal("age".into()), Node::Number(30.0));
        let once = canonicalize(&tree);
        let twice = canonicalize(&once);
        assert!(matches!(
            (once.as_ref(), twice.as_ref()),
            (Node::Compare { op: a, .. }, Node::Compare { op: b, .. }) if a == b
        ));
    }

    #[test]
    fn resolves_registered_constant_statically() {
        let resolver = DocumentResolver::new();
        resolver.register_constant("THRESHOLD", Value::Num(10.0));
        let tree = compare(CompareOp::Gt, Node::Literal("THRESHOLD".into()), Node::Number(1.0));
        let resolved = resolve_statics(&tree, &resolver);
        match resolved.as_ref() {
            Node::Compare { left, .. } => assert!(matches!(left.as_ref(), Node::Number(n) if *n == 10.0)),
            other => panic!("unexpected {other:?}"),
        }
    }
}
