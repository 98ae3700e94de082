//! Per-tick compliance bookkeeping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::NodeId;
use crate::norm::NormCompliance;
use crate::utility::Goal;

/// How applications of one norm turned out during one tick, for one goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormComplianceOutcomes {
    /// Fulfilled, yet a conflict followed.
    pub fulfilled_conflict: u32,
    /// Fulfilled and no conflict followed.
    pub fulfilled_no_conflict: u32,
    /// Infringed and a conflict followed.
    pub infringed_conflict: u32,
    /// Infringed, yet no conflict followed.
    pub infringed_no_conflict: u32,
}

impl NormComplianceOutcomes {
    /// Counts one application.
    pub fn record(&mut self, compliance: NormCompliance, conflict: bool) {
        let slot = match (compliance, conflict) {
            (NormCompliance::Fulfilled, true) => &mut self.fulfilled_conflict,
            (NormCompliance::Fulfilled, false) => &mut self.fulfilled_no_conflict,
            (NormCompliance::Infringed, true) => &mut self.infringed_conflict,
            (NormCompliance::Infringed, false) => &mut self.infringed_no_conflict,
        };
        *slot += 1;
    }

    /// Fulfilments, with or without conflict.
    #[must_use]
    pub const fn fulfilments(&self) -> u32 {
        self.fulfilled_conflict + self.fulfilled_no_conflict
    }

    /// Infringements, with or without conflict.
    #[must_use]
    pub const fn infringements(&self) -> u32 {
        self.infringed_conflict + self.infringed_no_conflict
    }

    /// Share of fulfilments that avoided a conflict; `None` without
    /// fulfilments.
    #[must_use]
    pub fn effectiveness_reward(&self) -> Option<f64> {
        ratio(self.fulfilled_no_conflict, self.fulfilments())
    }

    /// Share of infringements that led to a conflict; `None` without
    /// infringements.
    #[must_use]
    pub fn necessity_reward(&self) -> Option<f64> {
        ratio(self.infringed_conflict, self.infringements())
    }
}

/// Conflict counts of one norm group during one tick, for one goal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcomes {
    /// Observations followed by a conflict.
    pub conflict: u32,
    /// Observations without conflict.
    pub no_conflict: u32,
}

impl GroupOutcomes {
    /// Counts one joint observation.
    pub fn record(&mut self, conflict: bool) {
        if conflict {
            self.conflict += 1;
        } else {
            self.no_conflict += 1;
        }
    }

    /// All observations.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.conflict + self.no_conflict
    }

    /// Share of joint observations without conflict.
    #[must_use]
    pub fn effectiveness_reward(&self) -> Option<f64> {
        ratio(self.no_conflict, self.total())
    }
}

fn ratio(part: u32, whole: u32) -> Option<f64> {
    (whole > 0).then(|| f64::from(part) / f64::from(whole))
}

/// Outcomes of one tick, keyed by node and goal in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeTable<O> {
    rows: BTreeMap<NodeId, BTreeMap<Goal, O>>,
}

impl<O> Default for OutcomeTable<O> {
    fn default() -> Self {
        Self { rows: BTreeMap::new() }
    }
}

impl<O: Default> OutcomeTable<O> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome cell of `(node, goal)`, created empty on first access.
    pub fn entry(&mut self, node: NodeId, goal: &Goal) -> &mut O {
        self.rows
            .entry(node)
            .or_default()
            .entry(goal.clone())
            .or_default()
    }

    /// Outcome cell of `(node, goal)`, if anything was recorded.
    #[must_use]
    pub fn get(&self, node: NodeId, goal: &Goal) -> Option<&O> {
        self.rows.get(&node)?.get(goal)
    }

    /// Every cell, by node then goal.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Goal, &O)> {
        self.rows
            .iter()
            .flat_map(|(node, goals)| goals.iter().map(move |(goal, o)| (*node, goal, o)))
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of nodes with at least one outcome.
    #[must_use]
    pub fn nodes(&self) -> usize {
        self.rows.len()
    }
}
