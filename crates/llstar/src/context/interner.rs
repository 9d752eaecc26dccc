use super::{ContextNode, SemanticContext};
use crate::grammar::Predicate;
use hashbrown::HashSet;
use std::sync::Arc;

/// Content-addressed store of semantic contexts.
///
/// Structurally equal contexts built through the same interner share one
/// allocation, so the many configurations of a lookahead state that carry
/// the same guard point at the same tree. Each decision build owns its own
/// interner; nothing here is shared between threads.
#[derive(Debug, Default)]
pub struct ContextInterner {
    contexts: HashSet<SemanticContext, ahash::RandomState>,
}

impl ContextInterner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared copy of `context`, storing it if it is new.
    pub fn intern(&mut self, context: SemanticContext) -> SemanticContext {
        if matches!(context.node(), ContextNode::True) {
            return SemanticContext::always();
        }
        if matches!(context.node(), ContextNode::False) {
            return SemanticContext::never();
        }
        if let Some(existing) = self.contexts.get(&context) {
            return existing.clone();
        }
        self.contexts.insert(context.clone());
        context
    }

    pub fn leaf(&mut self, predicate: &Arc<Predicate>) -> SemanticContext {
        self.intern(SemanticContext::predicate(Arc::clone(predicate)))
    }

    pub fn and(&mut self, a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if b.is_always() || a.ptr_eq(b) {
            return a.clone();
        }
        if a.is_always() {
            return b.clone();
        }
        self.intern(a.and(b))
    }

    pub fn or(&mut self, a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if b.is_never() || a.ptr_eq(b) {
            return a.clone();
        }
        if a.is_never() {
            return b.clone();
        }
        self.intern(a.or(b))
    }

    pub fn not(&mut self, a: &SemanticContext) -> SemanticContext {
        self.intern(a.not())
    }

    /// Number of distinct non-constant contexts stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{PredicateId, PredicateMode};

    fn predicate(id: u32, text: &str) -> Arc<Predicate> {
        Arc::new(Predicate::new(
            PredicateId(id),
            text.into(),
            PredicateMode::Validating,
            "r".into(),
            None,
        ))
    }

    #[test]
    fn test_equal_contexts_share_storage() {
        let mut interner = ContextInterner::new();
        let p = interner.leaf(&predicate(0, "p"));
        let q = interner.leaf(&predicate(1, "q"));

        let pq = interner.and(&p, &q);
        let qp = interner.and(&q, &p);
        assert!(pq.ptr_eq(&qp));
        assert_eq!(interner.len(), 3);
    }

    #[test]
    fn test_constants_are_not_stored() {
        let mut interner = ContextInterner::new();
        let p = interner.leaf(&predicate(0, "p"));
        let never = interner.and(&p, &p.not());
        assert!(never.is_never());
        assert!(interner.or(&p, &SemanticContext::always()).is_always());
        assert_eq!(interner.len(), 1);
    }
}
