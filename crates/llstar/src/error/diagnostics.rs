//! # Diagnostics Channel
//!
//! Notifications the engine sends while it analyzes grammars and predicts
//! alternatives. They never change what the engine does: a report is fired
//! and forgotten.
//!
//! Two implementations are provided:
//!
//! - [`TracingDiagnostics`] logs every report through `tracing`.
//! - [`DiagnosticQueue`] collects reports so callers (and tests) can inspect
//!   them afterwards.
//!
//! The module also hosts the name suggestion helper used by grammar errors.

use crate::grammar::{AltId, DecisionId};
use compact_str::CompactString;
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

/// Receiver of ambiguity warnings and predicate failures.
///
/// Called from analysis worker threads as well as from recognizers, hence
/// `Send + Sync` and `&self` receivers.
pub trait Diagnostics: Send + Sync {
    /// Several alternatives were viable with nothing to tell them apart;
    /// `chosen` was taken.
    fn report_ambiguity(&self, decision: DecisionId, chosen: AltId, candidates: &[AltId]);

    /// A decision failed because every candidate predicate was false.
    fn report_predicate_failure(&self, rule: &str, predicate: &str);
}

/// A recorded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Ambiguity {
        decision: DecisionId,
        chosen: AltId,
        candidates: Vec<AltId>,
    },
    PredicateFailure {
        rule: CompactString,
        predicate: CompactString,
    },
}

/// Logs reports: ambiguities at `warn`, predicate failures at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report_ambiguity(&self, decision: DecisionId, chosen: AltId, candidates: &[AltId]) {
        warn!(
            decision = decision.0,
            chosen = chosen.0,
            ?candidates,
            "ambiguous decision resolved to lowest alternative"
        );
    }

    fn report_predicate_failure(&self, rule: &str, predicate: &str) {
        error!(rule, predicate, "predicate validation failed");
    }
}

/// Collects reports in arrival order.
#[derive(Debug, Default)]
pub struct DiagnosticQueue {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    #[must_use]
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Removes and returns everything reported so far.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    #[must_use]
    pub fn ambiguities(&self) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter(|d| matches!(d, Diagnostic::Ambiguity { .. }))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn predicate_failures(&self) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter(|d| matches!(d, Diagnostic::PredicateFailure { .. }))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A panicking reporter cannot leave the vector half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Diagnostics for DiagnosticQueue {
    fn report_ambiguity(&self, decision: DecisionId, chosen: AltId, candidates: &[AltId]) {
        self.lock().push(Diagnostic::Ambiguity {
            decision,
            chosen,
            candidates: candidates.to_vec(),
        });
    }

    fn report_predicate_failure(&self, rule: &str, predicate: &str) {
        self.lock().push(Diagnostic::PredicateFailure {
            rule: rule.into(),
            predicate: predicate.into(),
        });
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for &D {
    fn report_ambiguity(&self, decision: DecisionId, chosen: AltId, candidates: &[AltId]) {
        (**self).report_ambiguity(decision, chosen, candidates);
    }

    fn report_predicate_failure(&self, rule: &str, predicate: &str) {
        (**self).report_predicate_failure(rule, predicate);
    }
}

/// Closest name to `actual` among `candidates`, if any is similar enough.
pub fn did_you_mean<'a>(
    actual: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<CompactString> {
    let actual_lower = actual.to_lowercase();
    let threshold = 0.6;

    candidates
        .into_iter()
        .filter(|candidate| *candidate != actual)
        .map(|candidate| {
            let similarity = string_similarity(&actual_lower, &candidate.to_lowercase());
            (candidate, similarity)
        })
        .filter(|(_, similarity)| *similarity >= threshold)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| CompactString::from(candidate))
}

/// Similarity in `0.0..=1.0` derived from the Levenshtein distance.
fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    1.0 - previous[b.len()] as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_records_in_order() {
        let queue = DiagnosticQueue::new();
        queue.report_ambiguity(DecisionId(2), AltId(1), &[AltId(1), AltId(2)]);
        queue.report_predicate_failure("a", "false");

        assert_eq!(queue.ambiguities().len(), 1);
        assert_eq!(
            queue.predicate_failures(),
            vec![Diagnostic::PredicateFailure {
                rule: "a".into(),
                predicate: "false".into(),
            }]
        );
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reference_forwards() {
        let queue = DiagnosticQueue::new();
        let forwarded: &dyn Diagnostics = &&queue;
        forwarded.report_predicate_failure("r", "p");
        assert_eq!(queue.entries().len(), 1);
    }

    #[test]
    fn test_did_you_mean() {
        let names = ["expression", "statement", "term"];
        assert_eq!(
            did_you_mean("expresion", names).as_deref(),
            Some("expression")
        );
        assert_eq!(did_you_mean("zzz", names), None);
    }

    #[test]
    fn test_string_similarity_bounds() {
        assert!((string_similarity("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!(string_similarity("abc", "xyz").abs() < f64::EPSILON);
        assert!(string_similarity("kitten", "sitting") > 0.5);
    }
}
