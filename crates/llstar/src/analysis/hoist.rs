//! Predicate hoisting: turns the configurations of a state that lookahead
//! cannot split any further into a [`Resolution`].

use super::automaton::{Candidate, Resolution};
use super::builder::Configuration;
use crate::context::{ContextInterner, SemanticContext};
use crate::grammar::{AltId, DecisionInfo};
use std::collections::BTreeMap;

/// Resolves the alternatives predicted by `configs`.
///
/// The guard of an alternative is the disjunction of the contexts of all of
/// its configurations: it is viable if any path to it is. Alternatives whose
/// guard is `false` drop out; alternatives with a `true` guard are
/// unpredicated. Returns `None` when nothing is viable.
pub(crate) fn resolve<'c>(
    info: &DecisionInfo,
    configs: impl IntoIterator<Item = &'c Configuration>,
    interner: &mut ContextInterner,
) -> Option<Resolution> {
    let mut guards: BTreeMap<AltId, SemanticContext> = BTreeMap::new();
    for config in configs {
        let guard = guards
            .entry(config.alt)
            .or_insert_with(SemanticContext::never);
        *guard = interner.or(guard, &config.context);
    }

    let exit = info.exit_alt();
    let candidates: Vec<Candidate> = guards
        .into_iter()
        .filter(|(_, guard)| !guard.is_never())
        .map(|(alt, guard)| Candidate {
            alt,
            context: (!guard.is_always()).then_some(guard),
            exit_branch: Some(alt) == exit,
        })
        .collect();

    match candidates.as_slice() {
        [] => None,
        [only] if only.context.is_none() => Some(Resolution::Unique(only.alt)),
        _ if candidates.iter().all(|c| c.context.is_none()) => Some(Resolution::Ambiguous {
            chosen: candidates[0].alt,
            alternatives: candidates.iter().map(|c| c.alt).collect(),
        }),
        _ => Some(Resolution::Predicated(candidates)),
    }
}
