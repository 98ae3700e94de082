//! Pairwise intersection of two norms.

use std::collections::BTreeMap;

use crate::config::GeneralisationMode;
use crate::norm::{Description, Norm, NormId};
use crate::taxonomy::DescriptionLanguage;

use super::{merge_proposals, GeneralisationProposal, GeneralisationReasoner};

/// What two preconditions share and where they differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormIntersection {
    /// Predicates on which both agree (in deep mode, up to subsumption; the
    /// more specific term is kept).
    pub intersection: Description,
    /// Predicates on which they differ, with each side's term if present.
    pub difference: BTreeMap<String, (Option<String>, Option<String>)>,
    /// Common generalisation, when one exists within the step.
    pub parent: Option<Description>,
}

fn mscg(language: &DescriptionLanguage, predicate: &str, a: &str, b: &str) -> Option<String> {
    if a == b {
        return Some(a.to_string());
    }
    language
        .taxonomy(predicate)?
        .most_specific_common_generalisation(a, b)
        .map(str::to_string)
}

/// Intersects two preconditions.
///
/// A parent exists iff the preconditions constrain the same predicates, they
/// differ on at least one and at most `step` predicates, every predicate has
/// a common generalisation, and the result differs from both inputs.
#[must_use]
pub fn intersect(
    a: &Description,
    b: &Description,
    language: &DescriptionLanguage,
    mode: GeneralisationMode,
    step: usize,
) -> NormIntersection {
    let mut out = NormIntersection::default();

    for (predicate, ta) in a.iter() {
        match b.get(predicate) {
            Some(tb) if ta == tb => out.intersection.insert(predicate, ta),
            Some(tb) => {
                let shared = match mode {
                    GeneralisationMode::Shallow => None,
                    GeneralisationMode::Deep => match mscg(language, predicate, ta, tb) {
                        Some(g) if g == ta => Some(tb),
                        Some(g) if g == tb => Some(ta),
                        _ => None,
                    },
                };
                match shared {
                    Some(specific) => out.intersection.insert(predicate, specific),
                    None => {
                        out.difference
                            .insert(predicate.to_string(), (Some(ta.to_string()), Some(tb.to_string())));
                    }
                }
            }
            None => {
                out.difference
                    .insert(predicate.to_string(), (Some(ta.to_string()), None));
            }
        }
    }
    for (predicate, tb) in b.iter() {
        if a.get(predicate).is_none() {
            out.difference
                .insert(predicate.to_string(), (None, Some(tb.to_string())));
        }
    }

    if out.difference.is_empty() || out.difference.len() > step || !a.same_predicates(b) {
        return out;
    }
    let mut parent = Description::new();
    for (predicate, ta) in a.iter() {
        let Some(tb) = b.get(predicate) else { return out };
        let Some(g) = mscg(language, predicate, ta, tb) else { return out };
        parent.insert(predicate, g);
    }
    if parent != *a && parent != *b {
        out.parent = Some(parent);
    }
    out
}

/// Proposes the common parent of every pair of candidates that regulate the
/// same action the same way.
#[derive(Debug, Clone)]
pub struct IntersectionReasoner {
    mode: GeneralisationMode,
    step: usize,
}

impl IntersectionReasoner {
    /// Reasoner bridging at most `step` differing predicates.
    #[must_use]
    pub fn new(mode: GeneralisationMode, step: usize) -> Self {
        Self { mode, step }
    }
}

impl GeneralisationReasoner for IntersectionReasoner {
    fn name(&self) -> &'static str {
        "intersection"
    }

    fn proposals(
        &mut self,
        candidates: &[(NormId, Norm)],
        language: &DescriptionLanguage,
    ) -> Vec<GeneralisationProposal> {
        let mut raw = Vec::new();
        for (i, (id_a, a)) in candidates.iter().enumerate() {
            for (id_b, b) in &candidates[i + 1..] {
                if !a.same_postcondition(b) {
                    continue;
                }
                let result = intersect(&a.precondition, &b.precondition, language, self.mode, self.step);
                if let Some(parent) = result.parent {
                    let parent = a.with_precondition(parent);
                    raw.push((parent.clone(), *id_a));
                    raw.push((parent, *id_b));
                }
            }
        }
        merge_proposals(raw)
    }
}
