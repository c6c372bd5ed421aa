//! Merges many predicate ASTs into a single tree that can be evaluated in
//! one pass, and the structural-identity key (`node_name`) used both by
//! the CSE compactor and by the refactorer's pivot-counting step.

use std::rc::Rc;

use crate::ast::{CompareOp, LiteralSetItem, LogicalOp, Node, NodeRef, PredicateHandle};

/// A hashable structural identity for a node: two nodes with the same
/// `NodeName` are guaranteed to evaluate identically against any document
/// (ignoring merge-only bookkeeping nodes, which have no stable identity
/// of their own and return `None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeName {
    Literal(String),
    LiteralSet(Vec<String>),
    Number(u64),
    ConstantStr(String),
    ConstantBool(bool),
    ConstantNull,
    Regex(String),
    Undefined,
    Empty,
    Negate(Box<NodeName>),
    Compare(CompareOp, Box<NodeName>, Box<NodeName>),
    Logical(LogicalOp, Box<NodeName>, Box<NodeName>),
    Contains(Box<NodeName>, Box<NodeName>),
    Matches(Box<NodeName>, Box<NodeName>),
}

pub fn node_name(node: &NodeRef) -> Option<NodeName> {
    Some(match node.as_ref() {
        Node::Literal(s) => NodeName::Literal(s.clone()),
        Node::Number(n) => NodeName::Number(n.to_bits()),
        Node::ConstantStr(s) => NodeName::ConstantStr(s.clone()),
        Node::ConstantBool(b) => NodeName::ConstantBool(*b),
        Node::ConstantNull => NodeName::ConstantNull,
        Node::LiteralSet(items) => {
            let mut keys: Vec<String> = items
                .iter()
                .map(|i| match i {
                    LiteralSetItem::Num(n) => format!("n:{n}"),
                    LiteralSetItem::Str(s) => format!("s:{s}"),
                })
                .collect();
            keys.sort();
            NodeName::LiteralSet(keys)
        }
        Node::RegexLit(r) => NodeName::Regex(r.source.clone()),
        Node::Undefined => NodeName::Undefined,
        Node::Empty => NodeName::Empty,
        Node::Negate(inner) => NodeName::Negate(Box::new(node_name(inner)?)),
        Node::Compare { op, left, right } => {
            NodeName::Compare(*op, Box::new(node_name(left)?), Box::new(node_name(right)?))
        }
        Node::Logical { op, left, right } => {
            NodeName::Logical(*op, Box::new(node_name(left)?), Box::new(node_name(right)?))
        }
        Node::Contains { left, right } => {
            NodeName::Contains(Box::new(node_name(left)?), Box::new(node_name(right)?))
        }
        Node::Matches { left, right } => {
            NodeName::Matches(Box::new(node_name(left)?), Box::new(node_name(right)?))
        }
        // Merge-only scaffolding has no structural identity of its own.
        Node::Cached { .. } | Node::Both(_, _) | Node::PushResult { .. } | Node::Branch { .. } => return None,
    })
}

/// Wraps each predicate's AST in a `PushResult` leaf and chains them with
/// `Both` nodes so a single tree walk evaluates every predicate and
/// collects every match.
pub fn merge(predicates: &[(PredicateHandle, NodeRef)]) -> NodeRef {
    let mut iter = predicates.iter().rev();
    let Some((last_handle, last_ast)) = iter.next() else {
        return Rc::new(Node::ConstantBool(false));
    };
    let mut tree = Rc::new(Node::PushResult { inner: last_ast.clone(), handle: last_handle.clone() });
    for (handle, ast) in iter {
        let pushed = Rc::new(Node::PushResult { inner: ast.clone(), handle: handle.clone() });
        tree = Rc::new(Node::Both(pushed, tree));
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::PredicateHandle;

    #[test]
    fn identical_subtrees_share_a_name() {
        let a: NodeRef = Rc::new(Node::Compare {
            op: CompareOp::Gt,
            left: Rc::new(Node::Literal("age".into())),
            right: Rc::new(Node::Number(30.0)),
        });
        let b = a.clone();
        assert_eq!(node_name(&a), node_name(&b));
    }

    #[test]
    fn merge_chains_via_both_and_push_result() {
        let h1 = PredicateHandle::new("a = 1");
        let h2 = PredicateHandle::new("b = 2");
        let ast = Rc::new(Node::ConstantBool(true));
        let merged = merge(&[(h1, ast.clone()), (h2, ast)]);
        assert!(matches!(merged.as_ref(), Node::Both(_, _)));
    }
}
