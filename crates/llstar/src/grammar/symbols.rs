//! Name resolution for rules and tokens.
//!
//! Names are interned once while the grammar is built; afterwards the table
//! is frozen into a [`RodeoReader`] so that a finished grammar can be shared
//! across analysis threads.

use super::{RuleId, TokenType, MIN_TOKEN_TYPE};
use hashbrown::HashMap;
use lasso::{Rodeo, RodeoReader, Spur};

/// Read-only symbol table of a built grammar.
#[derive(Debug)]
pub struct SymbolTable {
    names: RodeoReader,
    token_types: HashMap<Spur, TokenType, ahash::RandomState>,
    rules: HashMap<Spur, RuleId, ahash::RandomState>,
    /// Display name per token type, indexed by `type - MIN_TOKEN_TYPE`.
    token_names: Vec<Spur>,
}

impl SymbolTable {
    /// Token type of a token name, or of a quoted literal such as `'begin'`.
    #[must_use]
    pub fn resolve_token_type(&self, name: &str) -> Option<TokenType> {
        let key = self.names.get(name)?;
        self.token_types.get(&key).copied()
    }

    #[must_use]
    pub fn is_rule_defined(&self, name: &str) -> bool {
        self.rule(name).is_some()
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<RuleId> {
        let key = self.names.get(name)?;
        self.rules.get(&key).copied()
    }

    /// Primary name of a token type.
    #[must_use]
    pub fn token_name(&self, token_type: TokenType) -> Option<&str> {
        let index = token_type.checked_sub(MIN_TOKEN_TYPE)? as usize;
        self.token_names
            .get(index)
            .map(|key| self.names.resolve(key))
    }

    /// All token names in token type order.
    pub fn token_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.token_names.iter().map(|key| self.names.resolve(key))
    }

    /// Highest assigned token type, or `MIN_TOKEN_TYPE - 1` when there are none.
    #[must_use]
    pub fn max_token_type(&self) -> TokenType {
        MIN_TOKEN_TYPE + self.token_names.len() as TokenType - 1
    }
}

/// Mutable side of the table used by the grammar builder.
#[derive(Debug, Default)]
pub(crate) struct SymbolTableBuilder {
    names: Rodeo,
    token_types: HashMap<Spur, TokenType, ahash::RandomState>,
    rules: HashMap<Spur, RuleId, ahash::RandomState>,
    token_names: Vec<Spur>,
}

impl SymbolTableBuilder {
    /// Defines a token if it is not known yet and returns its type.
    pub(crate) fn define_token(&mut self, name: &str) -> TokenType {
        let key = self.names.get_or_intern(name);
        if let Some(&existing) = self.token_types.get(&key) {
            return existing;
        }
        let token_type = MIN_TOKEN_TYPE + self.token_names.len() as TokenType;
        self.token_names.push(key);
        self.token_types.insert(key, token_type);
        token_type
    }

    /// Makes `alias` resolve to an existing token type without giving it a
    /// type of its own.
    pub(crate) fn alias_token(&mut self, alias: &str, token_type: TokenType) {
        let key = self.names.get_or_intern(alias);
        self.token_types.entry(key).or_insert(token_type);
    }

    pub(crate) fn token_type(&self, name: &str) -> Option<TokenType> {
        let key = self.names.get(name)?;
        self.token_types.get(&key).copied()
    }

    /// Registers a rule name. Returns `false` when the name is taken.
    pub(crate) fn define_rule(&mut self, name: &str, id: RuleId) -> bool {
        let key = self.names.get_or_intern(name);
        if self.rules.contains_key(&key) {
            return false;
        }
        self.rules.insert(key, id);
        true
    }

    pub(crate) fn rule(&self, name: &str) -> Option<RuleId> {
        let key = self.names.get(name)?;
        self.rules.get(&key).copied()
    }

    pub(crate) fn rule_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rules.keys().map(|key| self.names.resolve(key))
    }

    pub(crate) fn max_token_type(&self) -> TokenType {
        MIN_TOKEN_TYPE + self.token_names.len() as TokenType - 1
    }

    pub(crate) fn finish(self) -> SymbolTable {
        SymbolTable {
            names: self.names.into_reader(),
            token_types: self.token_types,
            rules: self.rules,
            token_names: self.token_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_numbered_from_min_type() {
        let mut builder = SymbolTableBuilder::default();
        assert_eq!(builder.define_token("A"), MIN_TOKEN_TYPE);
        assert_eq!(builder.define_token("B"), MIN_TOKEN_TYPE + 1);
        assert_eq!(builder.define_token("A"), MIN_TOKEN_TYPE);

        let table = builder.finish();
        assert_eq!(table.token_names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(table.max_token_type(), MIN_TOKEN_TYPE + 1);
        assert_eq!(table.token_name(MIN_TOKEN_TYPE + 1), Some("B"));
        assert_eq!(table.token_name(1), None);
    }

    #[test]
    fn test_alias_resolves_without_new_type() {
        let mut builder = SymbolTableBuilder::default();
        let b = builder.define_token("B");
        builder.alias_token("'('", b);

        let table = builder.finish();
        assert_eq!(table.resolve_token_type("'('"), Some(b));
        assert_eq!(table.token_names().count(), 1);
    }

    #[test]
    fn test_rule_redefinition_is_refused() {
        let mut builder = SymbolTableBuilder::default();
        assert!(builder.define_rule("a", RuleId(0)));
        assert!(!builder.define_rule("a", RuleId(1)));

        let table = builder.finish();
        assert_eq!(table.rule("a"), Some(RuleId(0)));
        assert!(!table.is_rule_defined("b"));
    }
}
