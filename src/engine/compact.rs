//! CSE compactor: replaces structurally-identical subtrees with a shared
//! `Rc` to the first one seen, so duplicate work collapses to duplicate
//! pointers instead of duplicate evaluation.

use std::collections::HashMap;

use crate::ast::NodeRef;
use crate::engine::merge::node_name;
use crate::engine::tiler::{any, tile};

pub fn compact(node: &NodeRef) -> NodeRef {
    let mut cache: HashMap<_, NodeRef> = HashMap::new();
    tile(node, &[&any()], &mut |n| {
        let name = node_name(n)?;
        if let Some(existing) = cache.get(&name) {
            if std::rc::Rc::ptr_eq(existing, n) {
                return None;
            }
            return Some(existing.clone());
        }
        cache.insert(name, n.clone());
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompareOp, Node};
    use std::rc::Rc;

    #[test]
    fn duplicate_subtrees_collapse_to_one_rc() {
        let make = || {
            Rc::new(Node::Compare {
                op: CompareOp::Gt,
                left: Rc::new(Node::Literal("age".into())),
                right: Rc::new(Node::Number(30.0)),
            })
        };
        let tree = Rc::new(Node::Negate(Rc::new(Node::Compare {
            op: CompareOp::Eq,
            left: make(),
            right: make(),
        })));
        let compacted = compact(&tree);
        if let Node::Negate(inner) = compacted.as_ref() {
            if let Node::Compare { left, right, .. } = inner.as_ref() {
                assert!(Rc::ptr_eq(left, right));
                return;
            }
        }
        panic!("unexpected shape");
    }
}
