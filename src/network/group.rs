//! Norm groups: joint compliance outcomes of two norms.
//!
//! When two norms apply at the same time to two agents that perceive each
//! other, the pair of compliances observed is a `NormGroup`. Each unordered
//! norm pair has at most four groups (FF, FI, IF, II), collected in a
//! `NormGroupCombination`. Groups are evaluated like norms, on
//! Effectiveness only, and feed substitutability detection.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::norm::{NormCompliance, NormId};
use crate::utility::{Dimension, EvaluationKey, Goal};

use super::{Network, NetworkNode, NodeId};

/// One observed `(compliance, compliance)` outcome for a norm pair.
///
/// Always stored in canonical order: the lower norm id comes first and the
/// compliances follow their norms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormGroup {
    norm_a: NormId,
    compliance_a: NormCompliance,
    norm_b: NormId,
    compliance_b: NormCompliance,
}

impl NormGroup {
    /// Creates a group; the pair is put in canonical order.
    #[must_use]
    pub fn new(
        norm_a: NormId,
        compliance_a: NormCompliance,
        norm_b: NormId,
        compliance_b: NormCompliance,
    ) -> Self {
        if norm_a <= norm_b {
            Self { norm_a, compliance_a, norm_b, compliance_b }
        } else {
            Self {
                norm_a: norm_b,
                compliance_a: compliance_b,
                norm_b: norm_a,
                compliance_b: compliance_a,
            }
        }
    }

    /// Norm with the lower id.
    #[must_use]
    pub const fn norm_a(&self) -> NormId {
        self.norm_a
    }

    /// Norm with the higher id.
    #[must_use]
    pub const fn norm_b(&self) -> NormId {
        self.norm_b
    }

    /// How `norm_a` was complied with.
    #[must_use]
    pub const fn compliance_a(&self) -> NormCompliance {
        self.compliance_a
    }

    /// How `norm_b` was complied with.
    #[must_use]
    pub const fn compliance_b(&self) -> NormCompliance {
        self.compliance_b
    }

    /// The unordered norm pair, lower id first.
    #[must_use]
    pub const fn pair(&self) -> (NormId, NormId) {
        (self.norm_a, self.norm_b)
    }

    /// Canonical name, e.g. `NG(N1:F,N4:I)`.
    #[must_use]
    pub fn name(&self) -> String {
        format!(
            "NG(N{}:{},N{}:{})",
            self.norm_a,
            self.compliance_a.code(),
            self.norm_b,
            self.compliance_b.code()
        )
    }
}

impl fmt::Display for NormGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl NetworkNode for NormGroup {
    fn label(&self) -> String {
        self.name()
    }
}

/// The (at most) four groups of one norm pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormGroupCombination {
    norm_a: NormId,
    norm_b: NormId,
    cells: [[Option<NodeId>; 2]; 2],
}

impl NormGroupCombination {
    /// Empty combination of a norm pair, in either order.
    #[must_use]
    pub fn new(norm_a: NormId, norm_b: NormId) -> Self {
        let (norm_a, norm_b) = if norm_a <= norm_b { (norm_a, norm_b) } else { (norm_b, norm_a) };
        Self {
            norm_a,
            norm_b,
            cells: [[None; 2]; 2],
        }
    }

    /// The norm pair, lower id first.
    #[must_use]
    pub const fn pair(&self) -> (NormId, NormId) {
        (self.norm_a, self.norm_b)
    }

    /// Fills the cell of `group` with `id`.
    ///
    /// Returns `false`, leaving the combination untouched, if the group
    /// belongs to another pair or its cell is already occupied.
    pub fn insert(&mut self, group: &NormGroup, id: NodeId) -> bool {
        if group.pair() != self.pair() {
            return false;
        }
        let cell = &mut self.cells[group.compliance_a.index()][group.compliance_b.index()];
        if cell.is_some() {
            return false;
        }
        *cell = Some(id);
        true
    }

    /// Group id for `(compliance of norm_a, compliance of norm_b)`.
    #[must_use]
    pub fn get(&self, compliance_a: NormCompliance, compliance_b: NormCompliance) -> Option<NodeId> {
        self.cells[compliance_a.index()][compliance_b.index()]
    }

    /// Number of populated cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Returns true if no outcome has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once all four outcomes have been observed.
    #[must_use]
    pub fn contains_all_combinations(&self) -> bool {
        self.len() == 4
    }
}

/// Generalisation hierarchy over norm groups plus the pair index.
///
/// Dereferences to the underlying [`Network`].
#[derive(Debug, Clone)]
pub struct NormGroupNetwork {
    nodes: Network<NormGroup>,
    combinations: BTreeMap<(NormId, NormId), NormGroupCombination>,
}

impl NormGroupNetwork {
    /// Creates an empty network evaluating Effectiveness for every goal.
    #[must_use]
    pub fn new(goals: &[Goal], default_score: f64, capacity: usize) -> Self {
        let keys = EvaluationKey::cross(&[Dimension::Effectiveness], goals);
        Self {
            nodes: Network::new(keys, default_score, capacity),
            combinations: BTreeMap::new(),
        }
    }

    /// Returns the group for an observed outcome, creating it if needed.
    ///
    /// A newly created group is registered in its pair's combination and
    /// activated. The boolean is true when the group was created.
    pub fn observe(
        &mut self,
        norm_a: NormId,
        compliance_a: NormCompliance,
        norm_b: NormId,
        compliance_b: NormCompliance,
    ) -> Result<(NodeId, bool), ExecutionError> {
        let group = NormGroup::new(norm_a, compliance_a, norm_b, compliance_b);
        if let Some(id) = self.nodes.id_of(&group) {
            return Ok((id, false));
        }
        let id = self.nodes.add(group);
        self.nodes.activate(id)?;
        self.combinations
            .entry(group.pair())
            .or_insert_with(|| NormGroupCombination::new(group.norm_a, group.norm_b))
            .insert(&group, id);
        Ok((id, true))
    }

    /// Combination of a norm pair, in either order.
    #[must_use]
    pub fn combination(&self, a: NormId, b: NormId) -> Option<&NormGroupCombination> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.combinations.get(&key)
    }

    /// All combinations, ordered by norm pair.
    pub fn combinations(&self) -> impl Iterator<Item = &NormGroupCombination> {
        self.combinations.values()
    }
}

impl Deref for NormGroupNetwork {
    type Target = Network<NormGroup>;

    fn deref(&self) -> &Self::Target {
        &self.nodes
    }
}

impl DerefMut for NormGroupNetwork {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NormCompliance::{Fulfilled as F, Infringed as I};

    fn id(n: u64) -> NormId {
        NodeId::new(n)
    }

    #[test]
    fn groups_are_canonical() {
        let g1 = NormGroup::new(id(4), F, id(1), I);
        let g2 = NormGroup::new(id(1), I, id(4), F);
        assert_eq!(g1, g2);
        assert_eq!(g1.name(), "NG(N1:I,N4:F)");
        assert_eq!(g1.pair(), (id(1), id(4)));
    }

    #[test]
    fn combination_cells_are_never_overwritten() {
        let mut combo = NormGroupCombination::new(id(2), id(1));
        let ff = NormGroup::new(id(1), F, id(2), F);
        assert!(combo.insert(&ff, NodeId::new(10)));
        assert!(!combo.insert(&ff, NodeId::new(11)));
        assert_eq!(combo.get(F, F), Some(NodeId::new(10)));

        let foreign = NormGroup::new(id(1), F, id(3), F);
        assert!(!combo.insert(&foreign, NodeId::new(12)));
        assert_eq!(combo.len(), 1);
    }

    #[test]
    fn combination_completes_with_four_cells() {
        let mut combo = NormGroupCombination::new(id(1), id(2));
        let mut next = 1;
        for ca in NormCompliance::ALL {
            for cb in NormCompliance::ALL {
                assert!(!combo.contains_all_combinations());
                combo.insert(&NormGroup::new(id(1), ca, id(2), cb), NodeId::new(next));
                next += 1;
            }
        }
        assert!(combo.contains_all_combinations());
        assert_eq!(combo.len(), 4);
    }

    #[test]
    fn observe_creates_and_activates_once() {
        let mut net = NormGroupNetwork::new(&[Goal::new("g")], 0.5, 10);
        let (first, created) = net.observe(id(1), F, id(2), I).unwrap();
        assert!(created);
        assert!(net.is_active(first));

        let (again, created) = net.observe(id(2), I, id(1), F).unwrap();
        assert!(!created);
        assert_eq!(first, again);
        assert_eq!(net.len(), 1);
        assert_eq!(net.evaluation_keys().len(), 1);

        let combo = net.combination(id(2), id(1)).unwrap();
        assert_eq!(combo.get(F, I), Some(first));
        assert!(!combo.contains_all_combinations());
        assert_eq!(net.combinations().count(), 1);
    }
}
