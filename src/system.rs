//! What the engine emits each tick.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::network::NormativeNetwork;
use crate::norm::{Description, Modality, NormId};

/// A norm currently in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatedNorm {
    /// Node id in the normative network.
    pub id: NormId,
    /// `N<id>`.
    pub name: String,
    /// Situations the norm applies in.
    pub precondition: Description,
    /// Prohibition or obligation.
    pub modality: Modality,
    /// Regulated action.
    pub action: String,
}

impl fmt::Display for RegulatedNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: <{}, {}({})>", self.name, self.precondition, self.modality, self.action)
    }
}

/// Every represented norm, by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormativeSystem {
    norms: Vec<RegulatedNorm>,
}

impl NormativeSystem {
    /// Snapshot of the represented norms of `network`.
    pub fn from_network(network: &NormativeNetwork) -> Result<Self, ExecutionError> {
        let mut norms = Vec::new();
        for id in network.represented_nodes() {
            let norm = network.get(id)?;
            norms.push(RegulatedNorm {
                id,
                name: format!("N{id}"),
                precondition: norm.precondition.clone(),
                modality: norm.modality,
                action: norm.action.clone(),
            });
        }
        Ok(Self { norms })
    }

    /// Regulated norms, ascending id.
    #[must_use]
    pub fn norms(&self) -> &[RegulatedNorm] {
        &self.norms
    }

    /// Ids of the regulated norms, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<NormId> {
        self.norms.iter().map(|n| n.id).collect()
    }

    /// Returns true if norm `id` is in force.
    #[must_use]
    pub fn contains(&self, id: NormId) -> bool {
        self.norms.iter().any(|n| n.id == id)
    }

    /// Number of norms in force.
    #[must_use]
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    /// Returns true if no norm is in force.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }
}

/// A generalisation applied during adaptation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generalisation {
    /// Norm now representing the children.
    pub parent: NormId,
    /// Norms deactivated under the parent.
    pub children: Vec<NormId>,
}

/// A substitutable pair resolved by deactivating one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    /// Member left active.
    pub kept: NormId,
    /// Member deactivated.
    pub removed: NormId,
}

/// Everything one tick changed, plus the resulting normative system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Norms in force after the tick.
    pub normative_system: NormativeSystem,
    /// Conflicts detected across goals and transitions.
    pub conflicts: usize,
    /// Norms added to the network.
    pub norms_created: Vec<NormId>,
    /// Norms put in force, new or not.
    pub activated: Vec<NormId>,
    /// Norms taken out of force.
    pub deactivated: Vec<NormId>,
    /// Generalisations applied.
    pub generalisations: Vec<Generalisation>,
    /// Norms specialised into their children.
    pub specialisations: Vec<NormId>,
    /// Pairs newly found substitutable.
    pub substitutable_pairs: Vec<(NormId, NormId)>,
    /// Substitutable pairs resolved.
    pub substitutions: Vec<Substitution>,
    /// Steps rolled back after an error.
    pub failed_steps: Vec<String>,
}

impl TickReport {
    /// Empty report of tick `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// Returns true if the tick changed no activation state.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.activated.is_empty() && self.deactivated.is_empty()
    }
}

/// Reports convergence once the normative system and the conflict count stay
/// unchanged for a number of consecutive ticks.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker {
    required: usize,
    last: Option<(NormativeSystem, usize)>,
    stable_ticks: usize,
}

impl ConvergenceTracker {
    /// Tracker requiring `required` unchanged ticks; zero counts as one.
    #[must_use]
    pub fn new(required: usize) -> Self {
        Self {
            required: required.max(1),
            last: None,
            stable_ticks: 0,
        }
    }

    /// Feeds one tick; returns true once converged.
    pub fn observe(&mut self, report: &TickReport) -> bool {
        let current = (report.normative_system.clone(), report.conflicts);
        if self.last.as_ref() == Some(&current) {
            self.stable_ticks += 1;
        } else {
            self.stable_ticks = 0;
            self.last = Some(current);
        }
        self.has_converged()
    }

    /// Returns true once enough unchanged ticks were seen.
    #[must_use]
    pub fn has_converged(&self) -> bool {
        self.stable_ticks >= self.required
    }

    /// Consecutive ticks without change so far.
    #[must_use]
    pub const fn stable_ticks(&self) -> usize {
        self.stable_ticks
    }

    /// Forgets everything observed.
    pub fn reset(&mut self) {
        self.last = None;
        self.stable_ticks = 0;
    }
}
