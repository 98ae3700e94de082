//! The normative network: every norm ever proposed and how they relate.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use crate::error::ExecutionError;
use crate::norm::{Description, Norm, NormId};
use crate::taxonomy::DescriptionLanguage;
use crate::utility::{Dimension, EvaluationKey, Goal};

use super::{Network, NodeAttribute};

/// Generalisation hierarchy over norms plus the substitutability relation.
///
/// Dereferences to the underlying [`Network`] for the structural, activation,
/// attribute and utility operations.
#[derive(Debug, Clone)]
pub struct NormativeNetwork {
    nodes: Network<Norm>,
    substitutable: BTreeMap<NormId, BTreeSet<NormId>>,
}

impl NormativeNetwork {
    /// Creates an empty network evaluating every dimension for every goal.
    #[must_use]
    pub fn new(goals: &[Goal], default_score: f64, capacity: usize) -> Self {
        let keys = EvaluationKey::cross(&Dimension::ALL, goals);
        Self {
            nodes: Network::new(keys, default_score, capacity),
            substitutable: BTreeMap::new(),
        }
    }

    /// Records that `a` and `b` can stand in for each other.
    ///
    /// The relation is symmetric; both norms are tagged `Substitutable`.
    /// Neither norm's activation changes.
    pub fn mark_substitutable(&mut self, a: NormId, b: NormId) -> Result<(), ExecutionError> {
        self.nodes.get(a)?;
        self.nodes.get(b)?;
        if a == b {
            return Ok(());
        }
        self.substitutable.entry(a).or_default().insert(b);
        self.substitutable.entry(b).or_default().insert(a);
        self.nodes.add_attribute(a, NodeAttribute::Substitutable)?;
        self.nodes.add_attribute(b, NodeAttribute::Substitutable)?;
        Ok(())
    }

    /// Returns true if `a` and `b` were marked substitutable, in either order.
    #[must_use]
    pub fn are_substitutable(&self, a: NormId, b: NormId) -> bool {
        self.substitutable.get(&a).is_some_and(|s| s.contains(&b))
    }

    /// Norms recorded as substitutes of `id`, ascending.
    #[must_use]
    pub fn substitutes_of(&self, id: NormId) -> Vec<NormId> {
        self.substitutable
            .get(&id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every substitutable pair once, lower id first.
    #[must_use]
    pub fn substitutable_pairs(&self) -> Vec<(NormId, NormId)> {
        self.substitutable
            .iter()
            .flat_map(|(a, bs)| bs.iter().filter(move |b| a < *b).map(move |b| (*a, *b)))
            .collect()
    }

    /// Norms that apply to an agent perceiving `context`, ascending. With
    /// `represented_only` unset, dormant norms are included.
    #[must_use]
    pub fn applicable_norms(
        &self,
        context: &Description,
        language: &DescriptionLanguage,
        represented_only: bool,
    ) -> Vec<NormId> {
        let pool = if represented_only {
            self.nodes.represented_nodes()
        } else {
            self.nodes.ids().collect()
        };
        pool.into_iter()
            .filter(|id| {
                self.nodes
                    .get(*id)
                    .is_ok_and(|n| n.applies_to(context, language))
            })
            .collect()
    }

    /// Returns true if any represented norm applies to `context`.
    #[must_use]
    pub fn is_regulated(&self, context: &Description, language: &DescriptionLanguage) -> bool {
        !self.applicable_norms(context, language, true).is_empty()
    }
}

impl Deref for NormativeNetwork {
    type Target = Network<Norm>;

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

impl DerefMut for NormativeNetwork {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NodeId;
    use crate::taxonomy::Taxonomy;

    fn language() -> DescriptionLanguage {
        let front = Taxonomy::new("front", "*")
            .with_term("car", "*")
            .and_then(|t| t.with_term("nothing", "*"))
            .unwrap();
        DescriptionLanguage::new().with(front).unwrap()
    }

    fn norm(term: &str) -> Norm {
        Norm::prohibition(Description::new().with("front", term), "Go")
    }

    #[test]
    fn tracks_both_dimensions_per_goal() {
        let net = NormativeNetwork::new(&[Goal::new("a"), Goal::new("b")], 0.5, 5);
        assert_eq!(net.evaluation_keys().len(), 4);
    }

    #[test]
    fn substitutability_is_symmetric() {
        let mut net = NormativeNetwork::new(&[Goal::new("g")], 0.5, 5);
        let a = net.add(norm("car"));
        let b = net.add(norm("nothing"));
        net.mark_substitutable(a, b).unwrap();

        assert!(net.are_substitutable(a, b));
        assert!(net.are_substitutable(b, a));
        assert!(net.has_attribute(a, NodeAttribute::Substitutable));
        assert!(net.has_attribute(b, NodeAttribute::Substitutable));
        assert_eq!(net.substitutable_pairs(), vec![(a, b)]);
        assert_eq!(net.substitutes_of(b), vec![a]);
        assert!(!net.is_active(a));

        assert!(net.mark_substitutable(a, NodeId::new(42)).is_err());
    }

    #[test]
    fn applicable_norms_are_represented_only() {
        let lang = language();
        let mut net = NormativeNetwork::new(&[Goal::new("g")], 0.5, 5);
        let specific = net.add(norm("car"));
        let general = net.add(norm("*"));
        net.add_generalisation(specific, general).unwrap();

        let context = Description::new().with("front", "car");
        assert!(net.applicable_norms(&context, &lang, true).is_empty());
        assert_eq!(net.applicable_norms(&context, &lang, false), vec![specific, general]);

        net.activate(general).unwrap();
        assert_eq!(net.applicable_norms(&context, &lang, true), vec![specific, general]);
        assert!(net.is_regulated(&context, &lang));

        let free = Description::new().with("front", "nothing");
        assert_eq!(net.applicable_norms(&free, &lang, true), vec![general]);
    }
}
