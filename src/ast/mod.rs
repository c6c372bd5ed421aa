//! The predicate AST: node representation, runtime values, and evaluation.

pub mod context;
pub mod node;
pub mod value;

pub use context::{EvalContext, PredicateHandle};
pub use node::{CompareOp, CompiledRegex, LiteralSetItem, LogicalOp, Node, NodeRef};
pub use value::Value;

use crate::errors::ValidationError;

/// Evaluate a node to its runtime [`Value`]. Logical operators short
/// circuit; `Both`/`PushResult`/`Cached` are only meaningful at the top of
/// a merged tree and are handled by [`evaluate_top`].
pub fn eval_value(node: &NodeRef, ctx: &mut EvalContext) -> Value {
    match node.as_ref() {
        Node::Literal(name) => ctx.resolve_literal(name),
        Node::Number(n) => Value::Num(*n),
        Node::ConstantStr(s) => Value::Str(s.clone()),
        Node::ConstantBool(b) => Value::Bool(*b),
        Node::ConstantNull => Value::Null,
        Node::LiteralSet(items) => Value::List(
            items
                .iter()
                .map(|i| match i {
                    LiteralSetItem::Num(n) => Value::Num(*n),
                    LiteralSetItem::Str(s) => Value::Str(s.clone()),
                })
                .collect(),
        ),
        Node::RegexLit(r) => Value::Regex(r.regex.clone()),
        Node::Undefined => Value::Undefined,
        Node::Empty => Value::Empty,

        Node::Negate(inner) => Value::Bool(!eval_value(inner, ctx).is_truthy()),

        Node::Compare { op, left, right } => {
            Value::Bool(eval_compare(*op, &eval_value(left, ctx), &eval_value(right, ctx)))
        }

        Node::Logical { op, left, right } => {
            let l = eval_value(left, ctx).is_truthy();
            let result = match op {
                LogicalOp::And => l && eval_value(right, ctx).is_truthy(),
                LogicalOp::Or => l || eval_value(right, ctx).is_truthy(),
            };
            Value::Bool(result)
        }

        Node::Contains { left, right } => {
            Value::Bool(eval_contains(&eval_value(left, ctx), &eval_value(right, ctx)))
        }

        Node::Matches { left, right } => {
            let haystack = eval_value(left, ctx);
            let pattern = eval_value(right, ctx);
            Value::Bool(eval_matches(&haystack, &pattern))
        }

        Node::Cached { id, inner } => {
            ctx.note_cache_reach(*id);
            if let Some(cached) = ctx.cached_result(*id) {
                return Value::Bool(cached);
            }
            let result = eval_value(inner, ctx).is_truthy();
            ctx.store_cached_result(*id, result);
            Value::Bool(result)
        }

        Node::Both(a, b) => {
            eval_value(a, ctx);
            eval_value(b, ctx)
        }

        Node::Branch { expr, when_true, when_false } => {
            let take_true = eval_value(expr, ctx).is_truthy();
            let branch = if take_true { when_true } else { when_false };
            match branch {
                Some(child) => eval_value(child, ctx),
                None => Value::Bool(false),
            }
        }

        Node::PushResult { inner, handle } => {
            ctx.note_push_reach();
            let matched = eval_value(inner, ctx).is_truthy();
            if matched {
                ctx.push_match(handle.clone());
            } else if ctx.is_analyzing() {
                let reason = failure_info(inner, ctx).unwrap_or_else(|| "condition evaluated to false".to_string());
                ctx.record_failed(&format!("{}: {}", handle.source(), reason));
            }
            Value::Bool(matched)
        }
    }
}

/// Human-readable label for a node, used to build `analyze` failure
/// reasons; not a full pretty-printer, just enough to name the operand a
/// reader would recognize from the source predicate.
fn describe(node: &NodeRef) -> String {
    match node.as_ref() {
        Node::Literal(name) => name.clone(),
        Node::Number(n) => n.to_string(),
        Node::ConstantStr(s) => format!("'{s}'"),
        Node::ConstantBool(b) => b.to_string(),
        Node::ConstantNull => "null".to_string(),
        Node::LiteralSet(_) => "{..}".to_string(),
        Node::RegexLit(r) => format!("/{}/", r.source),
        Node::Undefined => "undefined".to_string(),
        Node::Empty => "empty".to_string(),
        Node::Negate(inner) => format!("not {}", describe(inner)),
        _ => "<expr>".to_string(),
    }
}

fn op_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq | CompareOp::Is => "is",
        CompareOp::NotEq | CompareOp::IsNot => "is not",
        CompareOp::Lt => "<",
        CompareOp::LtEq => "<=",
        CompareOp::Gt => ">",
        CompareOp::GtEq => ">=",
    }
}

/// Find a human-readable reason a subtree evaluated false, for `analyze`
/// mode (4.A). Re-evaluates the failing subtree under a scoped guard
/// ([`EvalContext::with_analyze_off`]) so this diagnostic pass does not
/// itself append further trace entries; caches already populated by the
/// real evaluation (literal/subexpression) make the re-evaluation cheap.
fn failure_info(node: &NodeRef, ctx: &mut EvalContext) -> Option<String> {
    ctx.with_analyze_off(|ctx| match node.as_ref() {
        Node::Compare { op, left, right } => {
            let lv = eval_value(left, ctx);
            let rv = eval_value(right, ctx);
            if eval_compare(*op, &lv, &rv) {
                None
            } else {
                Some(format!(
                    "{} {} {} is false ({:?} vs {:?})",
                    describe(left),
                    op_symbol(*op),
                    describe(right),
                    lv,
                    rv
                ))
            }
        }
        Node::Contains { left, right } => {
            let lv = eval_value(left, ctx);
            let rv = eval_value(right, ctx);
            if eval_contains(&lv, &rv) {
                None
            } else {
                Some(format!("{} does not contain {:?}", describe(left), rv))
            }
        }
        Node::Matches { left, right } => {
            let lv = eval_value(left, ctx);
            let rv = eval_value(right, ctx);
            if eval_matches(&lv, &rv) {
                None
            } else {
                Some(format!("{} does not match {}", describe(left), describe(right)))
            }
        }
        Node::Negate(inner) => {
            if eval_value(inner, ctx).is_truthy() {
                Some(format!("not ({}) is false", describe(inner)))
            } else {
                None
            }
        }
        Node::Logical { op: LogicalOp::And, left, right } => {
            if !eval_value(left, ctx).is_truthy() {
                Some(failure_info(left, ctx).unwrap_or_else(|| format!("{} is false", describe(left))))
            } else if !eval_value(right, ctx).is_truthy() {
                Some(failure_info(right, ctx).unwrap_or_else(|| format!("{} is false", describe(right))))
            } else {
                None
            }
        }
        _ => None,
    })
}

/// Evaluate a node at the root of a single predicate's tree, collapsing to
/// a plain boolean. Evaluation is total: every predicate evaluates to
/// `true` or `false`, never an error.
pub fn evaluate_top(node: &NodeRef, ctx: &mut EvalContext) -> bool {
    eval_value(node, ctx).is_truthy()
}

/// Like [`evaluate_top`], but when the result is false and `ctx` has
/// analyze mode on, also records a human-readable failure reason. Standalone
/// predicates have no enclosing `PushResult` to do this for them (that only
/// happens inside a merged [`crate::predicate_set::OptimizedPredicateSet`]
/// tree), so callers that evaluate a single predicate's root directly go
/// through this instead.
pub fn analyze_top(node: &NodeRef, ctx: &mut EvalContext) -> bool {
    let result = eval_value(node, ctx).is_truthy();
    if !result && ctx.is_analyzing() {
        let reason = failure_info(node, ctx).unwrap_or_else(|| "condition evaluated to false".to_string());
        ctx.record_failed(&reason);
    }
    result
}

fn eval_compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    if op.is_equality() {
        let eq = left == right;
        return if op.is_negated() { !eq } else { eq };
    }
    match value::partial_order(left, right) {
        None => false,
        Some(ord) => match op {
            CompareOp::Lt => ord == std::cmp::Ordering::Less,
            CompareOp::LtEq => ord != std::cmp::Ordering::Greater,
            CompareOp::Gt => ord == std::cmp::Ordering::Greater,
            CompareOp::GtEq => ord != std::cmp::Ordering::Less,
            _ => unreachable!(),
        },
    }
}

fn eval_contains(left: &Value, right: &Value) -> bool {
    if left.is_sentinel() {
        return false;
    }
    match left {
        Value::List(items) => items.iter().any(|item| match (item, right) {
            (Value::Str(s), Value::Str(needle)) => s.contains(needle.as_str()),
            _ => item == right,
        }),
        Value::Str(s) => match right {
            Value::Str(needle) => s.contains(needle.as_str()),
            _ => false,
        },
        _ => false,
    }
}

fn eval_matches(haystack: &Value, pattern: &Value) -> bool {
    if haystack.is_sentinel() {
        return false;
    }
    let (Value::Str(s), Value::Regex(re)) = (haystack, pattern) else {
        return false;
    };
    re.is_match(s)
}

/// Semantic validation performed once, at parse/compile time (not on every
/// evaluation): `contains`'s right side must be a literal set or constant,
/// `matches`'s right side must be a regex.
pub fn validate(node: &NodeRef) -> Result<(), ValidationError> {
    match node.as_ref() {
        Node::Contains { right, .. } => {
            if !matches!(
                right.as_ref(),
                Node::LiteralSet(_) | Node::ConstantStr(_) | Node::Number(_) | Node::Literal(_)
            ) {
                return Err(ValidationError::BadOperand {
                    operator: "contains".to_string(),
                    detail: "right-hand side must be a literal set or constant".to_string(),
                });
            }
        }
        Node::Matches { right, .. } => {
            // A `ConstantStr`/`Literal` right side means the parser already
            // tried to compile it as a regex and failed; that failure is
            // reported through the regex diagnostics map, not as a second,
            // redundant bad-operand error here.
            if !matches!(right.as_ref(), Node::RegexLit(_) | Node::ConstantStr(_) | Node::Literal(_)) {
                return Err(ValidationError::BadOperand {
                    operator: "matches".to_string(),
                    detail: "right-hand side must be a regular expression".to_string(),
                });
            }
        }
        _ => {}
    }
    for child in node.children() {
        validate(&child)?;
    }
    Ok(())
}
