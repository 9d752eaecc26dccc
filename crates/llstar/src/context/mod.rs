//! # Semantic Context
//!
//! Boolean conditions over predicates: the guard under which an alternative
//! stays viable in a lookahead state.
//!
//! A [`SemanticContext`] is an immutable tree over predicate leaves, `&&`,
//! `||`, `!`, `true` and `false`. Every constructor returns a canonical
//! form:
//!
//! - `true`/`false` operands are absorbed or short-circuit the operator,
//! - nested `&&`/`||` are flattened,
//! - operands are sorted by structural order and deduplicated,
//! - `x && !x` is `false` and `x || !x` is `true`,
//! - `x || (x && y)` is `x` and `x && (x || y)` is `x`,
//! - `!!x` is `x`.
//!
//! Canonical forms make structural equality a usable stand-in for semantic
//! equality, which is what lets the automaton builder merge configuration
//! sets. The [`ContextInterner`] shares structurally equal trees.
//!
//! ```rust
//! use llstar::context::SemanticContext;
//! use llstar::grammar::{Expr, GrammarBuilder, GrammarKind};
//!
//! let grammar = GrammarBuilder::new("T", GrammarKind::Parser)
//!     .rule("a", Expr::choice([
//!         Expr::seq([Expr::pred("p"), Expr::token("A")]),
//!         Expr::seq([Expr::pred("q"), Expr::token("A")]),
//!     ]))
//!     .build()
//!     .unwrap();
//! let mut leaves = grammar.predicates().map(|p| SemanticContext::predicate(p.clone()));
//! let p = leaves.next().unwrap();
//! let q = leaves.next().unwrap();
//!
//! assert_eq!(p.and(&q), q.and(&p));
//! assert!(p.and(&p.not()).is_never());
//! assert_eq!(p.or(&p.and(&q)), p);
//! assert_eq!(p.and(&q).to_string(), "p && q");
//! ```

mod interner;

pub use interner::ContextInterner;

use crate::grammar::Predicate;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, LazyLock};

static ALWAYS: LazyLock<SemanticContext> =
    LazyLock::new(|| SemanticContext(Arc::new(ContextNode::True)));
static NEVER: LazyLock<SemanticContext> =
    LazyLock::new(|| SemanticContext(Arc::new(ContextNode::False)));

/// Node of a context tree. Variant order is part of the structural order.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextNode {
    False,
    True,
    Predicate(Arc<Predicate>),
    Not(SemanticContext),
    And(Box<[SemanticContext]>),
    Or(Box<[SemanticContext]>),
}

/// An immutable, cheaply clonable semantic context in canonical form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SemanticContext(Arc<ContextNode>);

impl SemanticContext {
    /// The `true` context: no condition.
    #[must_use]
    pub fn always() -> Self {
        ALWAYS.clone()
    }

    /// The `false` context: never viable.
    #[must_use]
    pub fn never() -> Self {
        NEVER.clone()
    }

    /// A single predicate leaf.
    #[must_use]
    pub fn predicate(predicate: Arc<Predicate>) -> Self {
        Self(Arc::new(ContextNode::Predicate(predicate)))
    }

    #[must_use]
    pub fn node(&self) -> &ContextNode {
        &self.0
    }

    #[must_use]
    pub fn is_always(&self) -> bool {
        matches!(*self.0, ContextNode::True)
    }

    #[must_use]
    pub fn is_never(&self) -> bool {
        matches!(*self.0, ContextNode::False)
    }

    /// Whether both handles point at the same tree.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self::all([self.clone(), other.clone()])
    }

    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self::any([self.clone(), other.clone()])
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(&self) -> Self {
        match &*self.0 {
            ContextNode::True => Self::never(),
            ContextNode::False => Self::always(),
            ContextNode::Not(inner) => inner.clone(),
            _ => Self(Arc::new(ContextNode::Not(self.clone()))),
        }
    }

    /// Canonical conjunction of all operands. Empty input is `true`.
    pub fn all(operands: impl IntoIterator<Item = Self>) -> Self {
        let mut ops: SmallVec<[Self; 4]> = SmallVec::new();
        for op in operands {
            match &*op.0 {
                ContextNode::False => return Self::never(),
                ContextNode::True => {}
                ContextNode::And(inner) => ops.extend(inner.iter().cloned()),
                _ => ops.push(op),
            }
        }
        match normalize(ops, Junction::And) {
            Normalized::Collapsed => Self::never(),
            Normalized::Operands(ops) => build(ops, Junction::And),
        }
    }

    /// Canonical disjunction of all operands. Empty input is `false`.
    pub fn any(operands: impl IntoIterator<Item = Self>) -> Self {
        let mut ops: SmallVec<[Self; 4]> = SmallVec::new();
        for op in operands {
            match &*op.0 {
                ContextNode::True => return Self::always(),
                ContextNode::False => {}
                ContextNode::Or(inner) => ops.extend(inner.iter().cloned()),
                _ => ops.push(op),
            }
        }
        match normalize(ops, Junction::Or) {
            Normalized::Collapsed => Self::always(),
            Normalized::Operands(ops) => build(ops, Junction::Or),
        }
    }

    /// Evaluates the context with short-circuiting: operands are visited in
    /// canonical order and evaluation stops as soon as the result is known.
    pub fn eval<F>(&self, eval_leaf: &mut F) -> bool
    where
        F: FnMut(&Predicate) -> bool + ?Sized,
    {
        match &*self.0 {
            ContextNode::True => true,
            ContextNode::False => false,
            ContextNode::Predicate(p) => eval_leaf(p.as_ref()),
            ContextNode::Not(inner) => !inner.eval(eval_leaf),
            ContextNode::And(ops) => ops.iter().all(|op| op.eval(eval_leaf)),
            ContextNode::Or(ops) => ops.iter().any(|op| op.eval(eval_leaf)),
        }
    }

    /// Predicate leaves in canonical order, duplicates included.
    #[must_use]
    pub fn predicates(&self) -> Vec<&Arc<Predicate>> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Arc<Predicate>>) {
        match &*self.0 {
            ContextNode::True | ContextNode::False => {}
            ContextNode::Predicate(p) => out.push(p),
            ContextNode::Not(inner) => inner.collect_predicates(out),
            ContextNode::And(ops) | ContextNode::Or(ops) => {
                for op in ops.iter() {
                    op.collect_predicates(out);
                }
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Junction {
    And,
    Or,
}

enum Normalized {
    /// The operands annihilate: `false` for `&&`, `true` for `||`.
    Collapsed,
    Operands(SmallVec<[SemanticContext; 4]>),
}

fn normalize(mut ops: SmallVec<[SemanticContext; 4]>, junction: Junction) -> Normalized {
    ops.sort_unstable();
    ops.dedup();

    // `!x` next to `x`, or next to the flattened operands of `x` when `x` is
    // a junction of the same kind.
    let complement = ops.iter().any(|op| {
        let ContextNode::Not(inner) = &*op.0 else {
            return false;
        };
        match (&*inner.0, junction) {
            (ContextNode::And(parts), Junction::And) | (ContextNode::Or(parts), Junction::Or) => {
                parts.iter().all(|part| ops.binary_search(part).is_ok())
            }
            _ => ops.binary_search(inner).is_ok(),
        }
    });
    if complement {
        return Normalized::Collapsed;
    }

    // Absorption: drop a nested junction of the other kind that shares an
    // operand with this one.
    let absorbed: SmallVec<[bool; 4]> = ops
        .iter()
        .map(|op| {
            let nested = match (&*op.0, junction) {
                (ContextNode::Or(inner), Junction::And)
                | (ContextNode::And(inner), Junction::Or) => inner,
                _ => return false,
            };
            nested.iter().any(|x| ops.binary_search(x).is_ok())
        })
        .collect();
    let ops = ops
        .into_iter()
        .zip(absorbed)
        .filter_map(|(op, absorbed)| (!absorbed).then_some(op))
        .collect();
    Normalized::Operands(ops)
}

fn build(mut ops: SmallVec<[SemanticContext; 4]>, junction: Junction) -> SemanticContext {
    match ops.len() {
        0 => match junction {
            Junction::And => SemanticContext::always(),
            Junction::Or => SemanticContext::never(),
        },
        1 => ops.swap_remove(0),
        _ => {
            let ops: Box<[SemanticContext]> = ops.into_iter().collect();
            SemanticContext(Arc::new(match junction {
                Junction::And => ContextNode::And(ops),
                Junction::Or => ContextNode::Or(ops),
            }))
        }
    }
}

impl fmt::Debug for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SemanticContext({self})")
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn operand(f: &mut fmt::Formatter<'_>, op: &SemanticContext) -> fmt::Result {
            match &*op.0 {
                ContextNode::And(_) | ContextNode::Or(_) => write!(f, "({op})"),
                _ => write!(f, "{op}"),
            }
        }

        match &*self.0 {
            ContextNode::True => f.write_str("true"),
            ContextNode::False => f.write_str("false"),
            ContextNode::Predicate(p) => f.write_str(p.text()),
            ContextNode::Not(inner) => {
                f.write_str("!")?;
                match &*inner.0 {
                    ContextNode::Predicate(p) if is_simple(p.text()) => f.write_str(p.text()),
                    _ => write!(f, "({inner})"),
                }
            }
            ContextNode::And(ops) | ContextNode::Or(ops) => {
                let sep = if matches!(&*self.0, ContextNode::And(_)) {
                    " && "
                } else {
                    " || "
                };
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    operand(f, op)?;
                }
                Ok(())
            }
        }
    }
}

fn is_simple(text: &str) -> bool {
    text.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{PredicateId, PredicateMode};

    fn leaf(id: u32, text: &str) -> SemanticContext {
        SemanticContext::predicate(Arc::new(Predicate::new(
            PredicateId(id),
            text.into(),
            PredicateMode::Validating,
            "r".into(),
            None,
        )))
    }

    #[test]
    fn test_true_false_absorption() {
        let p = leaf(0, "p");
        assert_eq!(p.and(&SemanticContext::always()), p);
        assert!(p.and(&SemanticContext::never()).is_never());
        assert!(p.or(&SemanticContext::always()).is_always());
        assert_eq!(p.or(&SemanticContext::never()), p);
    }

    #[test]
    fn test_flatten_sort_dedup() {
        let (p, q, r) = (leaf(0, "p"), leaf(1, "q"), leaf(2, "r"));
        let left = p.and(&q).and(&r);
        let right = r.and(&q.and(&p)).and(&q);
        assert_eq!(left, right);
        assert_eq!(left.to_string(), "p && q && r");
    }

    #[test]
    fn test_complements() {
        let p = leaf(0, "p");
        assert!(p.and(&p.not()).is_never());
        assert!(p.or(&p.not()).is_always());
        assert_eq!(p.not().not(), p);

        let (q, r) = (leaf(1, "q"), leaf(2, "r"));
        let both = q.and(&r);
        assert!(both.and(&both.not()).is_never());
        let either = q.or(&r);
        assert!(either.or(&either.not()).is_always());
    }

    #[test]
    fn test_absorption() {
        let (p, q) = (leaf(0, "p"), leaf(1, "q"));
        assert_eq!(p.or(&p.and(&q)), p);
        assert_eq!(p.and(&p.or(&q)), p);
    }

    #[test]
    fn test_empty_junctions() {
        assert!(SemanticContext::all([]).is_always());
        assert!(SemanticContext::any([]).is_never());
    }

    #[test]
    fn test_eval_short_circuits() {
        let (p, q) = (leaf(0, "p"), leaf(1, "q"));
        let mut seen = Vec::new();
        let result = p.and(&q).eval(&mut |pred: &Predicate| {
            seen.push(pred.text().to_string());
            false
        });
        assert!(!result);
        assert_eq!(seen, vec!["p"]);

        seen.clear();
        let result = p.or(&q).eval(&mut |pred: &Predicate| {
            seen.push(pred.text().to_string());
            true
        });
        assert!(result);
        assert_eq!(seen, vec!["p"]);
    }

    #[test]
    fn test_display_nests() {
        let (p, q, r) = (leaf(0, "p"), leaf(1, "q"), leaf(2, "n<2"));
        assert_eq!(p.and(&q).or(&r).to_string(), "n<2 || (p && q)");
        assert_eq!(r.not().to_string(), "!(n<2)");
        assert_eq!(p.not().to_string(), "!p");
    }

    #[test]
    fn test_predicates_lists_leaves() {
        let (p, q) = (leaf(0, "p"), leaf(1, "q"));
        let either = p.or(&q.not());
        let texts: Vec<_> = either.predicates().iter().map(|p| p.text()).collect();
        assert_eq!(texts, vec!["p", "q"]);
    }
}
