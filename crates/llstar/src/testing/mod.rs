//! # Testing Utilities
//!
//! [`ScriptedHost`] is a small [`SemanticHost`] whose predicates and actions
//! are written in a tiny script language instead of host code. It is enough
//! to express the guards and effects grammar tests need.
//!
//! ## Predicates
//!
//! - `true`, `false`
//! - a flag name: `p`
//! - a comparison of counters or integers: `n<2`, `i >= 3`, `n == m`
//! - negation, optionally parenthesized: `!p`, `!(n<2)`
//!
//! ## Actions
//!
//! Statements separated by `;`:
//!
//! - `print:TEXT` appends `TEXT` to the output; `print:$n` appends the value
//!   of counter `n`
//! - `n++`, `n--`
//! - `set:p=true`, `set:n=3`

use crate::grammar::{Action, Predicate};
use crate::runtime::{PredicateEvaluator, SemanticHost};
use compact_str::CompactString;
use hashbrown::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ScriptedHost {
    flags: HashMap<CompactString, bool, ahash::RandomState>,
    counters: HashMap<CompactString, i64, ahash::RandomState>,
    output: String,
    evaluated: Vec<CompactString>,
}

impl ScriptedHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_flag(mut self, name: &str, value: bool) -> Self {
        self.set_flag(name, value);
        self
    }

    #[must_use]
    pub fn with_counter(mut self, name: &str, value: i64) -> Self {
        self.set_counter(name, value);
        self
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.into(), value);
    }

    pub fn set_counter(&mut self, name: &str, value: i64) {
        self.counters.insert(name.into(), value);
    }

    /// Unset flags are false.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Unset counters are zero.
    #[must_use]
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    /// Everything printed by actions so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Texts of the predicates evaluated so far, in order. Predicates the
    /// engine resolved on its own never show up here.
    #[must_use]
    pub fn evaluated(&self) -> &[CompactString] {
        &self.evaluated
    }

    pub fn clear_evaluated(&mut self) {
        self.evaluated.clear();
    }

    /// Evaluates a predicate script against the current state.
    #[must_use]
    pub fn test(&self, script: &str) -> bool {
        let script = script.trim();
        if let Some(negated) = script.strip_prefix('!') {
            return !self.test(negated);
        }
        if let Some(inner) = enclosed(script) {
            return self.test(inner);
        }
        match script {
            "true" => return true,
            "false" => return false,
            _ => {}
        }
        for op in ["<=", ">=", "==", "!=", "<", ">"] {
            if let Some((lhs, rhs)) = script.split_once(op) {
                let (lhs, rhs) = (self.value(lhs), self.value(rhs));
                return match op {
                    "<=" => lhs <= rhs,
                    ">=" => lhs >= rhs,
                    "==" => lhs == rhs,
                    "!=" => lhs != rhs,
                    "<" => lhs < rhs,
                    _ => lhs > rhs,
                };
            }
        }
        self.flag(script)
    }

    /// Runs an action script.
    pub fn run(&mut self, script: &str) {
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some(text) = statement.strip_prefix("print:") {
                match text.strip_prefix('$') {
                    Some(counter) => {
                        let value = self.counter(counter);
                        self.output.push_str(&value.to_string());
                    }
                    None => self.output.push_str(text),
                }
            } else if let Some(assignment) = statement.strip_prefix("set:") {
                let Some((name, value)) = assignment.split_once('=') else {
                    debug!(statement, "malformed assignment ignored");
                    continue;
                };
                let (name, value) = (name.trim(), value.trim());
                match value {
                    "true" => self.set_flag(name, true),
                    "false" => self.set_flag(name, false),
                    _ => match value.parse() {
                        Ok(number) => self.set_counter(name, number),
                        Err(_) => debug!(statement, "non-numeric counter value ignored"),
                    },
                }
            } else if let Some(name) = statement.strip_suffix("++") {
                let value = self.counter(name.trim()) + 1;
                self.set_counter(name.trim(), value);
            } else if let Some(name) = statement.strip_suffix("--") {
                let value = self.counter(name.trim()) - 1;
                self.set_counter(name.trim(), value);
            } else {
                debug!(statement, "unknown action statement ignored");
            }
        }
    }

    fn value(&self, operand: &str) -> i64 {
        let mut operand = operand.trim();
        while let Some(inner) = enclosed(operand) {
            operand = inner.trim();
        }
        operand
            .parse()
            .unwrap_or_else(|_| self.counter(operand))
    }
}

/// Inside of `text` when one pair of parentheses spans all of it.
fn enclosed(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

impl PredicateEvaluator for ScriptedHost {
    fn eval(&mut self, predicate: &Predicate) -> bool {
        self.evaluated.push(predicate.text().into());
        self.test(predicate.text())
    }
}

impl SemanticHost for ScriptedHost {
    fn execute(&mut self, action: &Action) {
        self.run(action.text());
    }
}
