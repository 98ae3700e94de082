//! Generalisation reasoners.
//!
//! Both reasoners are pure over the vocabulary and the norms they are given;
//! they only propose. The engine decides whether a proposal is materialised.

pub mod context_tree;
pub mod intersection;

pub use context_tree::{ContextTree, ContextTreeReasoner, PotentialGeneralisation};
pub use intersection::{intersect, IntersectionReasoner, NormIntersection};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::norm::{Norm, NormId};
use crate::taxonomy::DescriptionLanguage;

/// A broader norm that could replace `children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralisationProposal {
    /// The broader norm.
    pub parent: Norm,
    /// Norms the parent would generalise, ascending.
    pub children: Vec<NormId>,
}

/// Turns generalisable norms into generalisation proposals.
pub trait GeneralisationReasoner: fmt::Debug {
    /// Short stable identifier for logging.
    fn name(&self) -> &'static str;

    /// Proposals over `candidates` (active generalisable norms, ascending by
    /// id). Proposals come out ordered by parent norm.
    fn proposals(
        &mut self,
        candidates: &[(NormId, Norm)],
        language: &DescriptionLanguage,
    ) -> Vec<GeneralisationProposal>;
}

/// Merges proposals that share a parent, ordered by parent.
fn merge_proposals(raw: impl IntoIterator<Item = (Norm, NormId)>) -> Vec<GeneralisationProposal> {
    let mut by_parent: BTreeMap<Norm, BTreeSet<NormId>> = BTreeMap::new();
    for (parent, child) in raw {
        by_parent.entry(parent).or_default().insert(child);
    }
    by_parent
        .into_iter()
        .map(|(parent, children)| GeneralisationProposal {
            parent,
            children: children.into_iter().collect(),
        })
        .collect()
}
