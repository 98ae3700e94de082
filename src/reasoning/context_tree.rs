//! Context-tree expansion of single norms.
//!
//! Every precondition has parents (one predicate moved one level up its
//! taxonomy) and specialisations (one predicate moved one level down). The
//! tree remembers each potential parent once, together with the sibling
//! preconditions it would cover, no matter how many norms reached it.

use std::collections::{BTreeMap, BTreeSet};

use crate::norm::{Description, Norm, NormId};
use crate::taxonomy::DescriptionLanguage;

use super::{merge_proposals, GeneralisationProposal, GeneralisationReasoner};

/// A parent precondition and the preconditions directly below it along one
/// predicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PotentialGeneralisation {
    /// The more general precondition.
    pub parent: Description,
    /// Predicate generalised.
    pub predicate: String,
    /// Every precondition one term below `parent` along `predicate`.
    pub children: BTreeSet<Description>,
}

/// Preconditions one level more general, with the predicate generalised.
#[must_use]
pub fn parent_preconditions(description: &Description, language: &DescriptionLanguage) -> Vec<(String, Description)> {
    let mut out = Vec::new();
    for (predicate, term) in description.iter() {
        let Some(parent) = language.taxonomy(predicate).and_then(|t| t.parent(term)) else {
            continue;
        };
        let mut generalised = description.clone();
        generalised.insert(predicate, parent);
        out.push((predicate.to_string(), generalised));
    }
    out
}

/// Preconditions one level more specific along `predicate`.
#[must_use]
pub fn child_preconditions_along(
    description: &Description,
    predicate: &str,
    language: &DescriptionLanguage,
) -> BTreeSet<Description> {
    let (Some(term), Some(taxonomy)) = (description.get(predicate), language.taxonomy(predicate)) else {
        return BTreeSet::new();
    };
    taxonomy
        .children(term)
        .into_iter()
        .map(|child| {
            let mut specialised = description.clone();
            specialised.insert(predicate, child);
            specialised
        })
        .collect()
}

/// Preconditions one level more specific along any predicate.
#[must_use]
pub fn child_preconditions(description: &Description, language: &DescriptionLanguage) -> BTreeSet<Description> {
    description
        .predicates()
        .flat_map(|p| child_preconditions_along(description, p, language))
        .collect()
}

/// Deduplicated store of potential generalisations.
#[derive(Debug, Clone, Default)]
pub struct ContextTree {
    entries: BTreeMap<(Description, String), BTreeSet<Description>>,
}

impl ContextTree {
    /// Empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every potential parent of `description`.
    ///
    /// Returns the parents as `(parent, predicate)` keys; an already known
    /// entry is reused.
    pub fn expand(&mut self, description: &Description, language: &DescriptionLanguage) -> Vec<(Description, String)> {
        let mut keys = Vec::new();
        for (predicate, parent) in parent_preconditions(description, language) {
            let key = (parent, predicate);
            if !self.entries.contains_key(&key) {
                let children = child_preconditions_along(&key.0, &key.1, language);
                self.entries.insert(key.clone(), children);
            }
            keys.push(key);
        }
        keys
    }

    /// Known potential generalisations covering `description`.
    #[must_use]
    pub fn parents(&self, description: &Description) -> Vec<PotentialGeneralisation> {
        self.entries
            .iter()
            .filter(|(_, children)| children.contains(description))
            .map(|((parent, predicate), children)| PotentialGeneralisation {
                parent: parent.clone(),
                predicate: predicate.clone(),
                children: children.clone(),
            })
            .collect()
    }

    /// Preconditions one level below `description`.
    #[must_use]
    pub fn specialisations(&self, description: &Description, language: &DescriptionLanguage) -> BTreeSet<Description> {
        child_preconditions(description, language)
    }

    /// Children recorded under `(parent, predicate)`.
    #[must_use]
    pub fn get(&self, parent: &Description, predicate: &str) -> Option<&BTreeSet<Description>> {
        self.entries.get(&(parent.clone(), predicate.to_string()))
    }

    /// Number of potential generalisations recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Proposes a parent once at least two of its children are candidates.
#[derive(Debug, Clone, Default)]
pub struct ContextTreeReasoner {
    tree: ContextTree,
}

impl ContextTreeReasoner {
    /// Reasoner with an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Potential generalisations seen so far.
    #[must_use]
    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }
}

impl GeneralisationReasoner for ContextTreeReasoner {
    fn name(&self) -> &'static str {
        "context_tree"
    }

    fn proposals(
        &mut self,
        candidates: &[(NormId, Norm)],
        language: &DescriptionLanguage,
    ) -> Vec<GeneralisationProposal> {
        let mut raw = Vec::new();
        for (_, norm) in candidates {
            for (parent, predicate) in self.tree.expand(&norm.precondition, language) {
                let Some(children) = self.tree.get(&parent, &predicate) else {
                    continue;
                };
                let covered: Vec<NormId> = candidates
                    .iter()
                    .filter(|(_, c)| c.same_postcondition(norm) && children.contains(&c.precondition))
                    .map(|(id, _)| *id)
                    .collect();
                if covered.len() >= 2 {
                    let parent = norm.with_precondition(parent);
                    raw.extend(covered.into_iter().map(|id| (parent.clone(), id)));
                }
            }
        }
        merge_proposals(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;
    use crate::taxonomy::Taxonomy;

    fn language() -> DescriptionLanguage {
        let front = Taxonomy::new("front", "*")
            .with_term("vehicle", "*")
            .and_then(|t| t.with_term("car", "vehicle"))
            .and_then(|t| t.with_term("bike", "vehicle"))
            .and_then(|t| t.with_term("nothing", "*"))
            .unwrap();
        DescriptionLanguage::new().with(front).unwrap()
    }

    fn front(term: &str) -> Description {
        Description::new().with("front", term)
    }

    #[test]
    fn parents_and_children_move_one_level() {
        let lang = language();
        let parents = parent_preconditions(&front("car"), &lang);
        assert_eq!(parents, vec![("front".to_string(), front("vehicle"))]);
        assert!(parent_preconditions(&front("*"), &lang).is_empty());

        let children = child_preconditions(&front("*"), &lang);
        assert_eq!(children, BTreeSet::from([front("vehicle"), front("nothing")]));
        assert!(child_preconditions(&front("car"), &lang).is_empty());
    }

    #[test]
    fn entries_are_shared_across_norms() {
        let lang = language();
        let mut tree = ContextTree::new();
        let from_car = tree.expand(&front("car"), &lang);
        let from_bike = tree.expand(&front("bike"), &lang);
        assert_eq!(from_car, from_bike);
        assert_eq!(tree.len(), 1);

        let potentials = tree.parents(&front("bike"));
        assert_eq!(potentials.len(), 1);
        assert_eq!(potentials[0].parent, front("vehicle"));
        assert_eq!(potentials[0].children.len(), 2);
        assert!(tree.parents(&front("nothing")).is_empty());
        assert_eq!(tree.specialisations(&front("vehicle"), &lang).len(), 2);
    }

    #[test]
    fn reasoner_needs_two_siblings() {
        let lang = language();
        let mut reasoner = ContextTreeReasoner::new();
        let car = (NodeId::new(1), Norm::prohibition(front("car"), "Go"));
        let bike = (NodeId::new(2), Norm::prohibition(front("bike"), "Go"));
        let other_action = (NodeId::new(3), Norm::prohibition(front("bike"), "Stop"));

        assert!(reasoner.proposals(&[car.clone(), other_action.clone()], &lang).is_empty());

        let proposals = reasoner.proposals(&[car, bike, other_action], &lang);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].parent, Norm::prohibition(front("vehicle"), "Go"));
        assert_eq!(proposals[0].children, vec![NodeId::new(1), NodeId::new(2)]);
        assert_eq!(reasoner.tree().len(), 1);
    }
}
