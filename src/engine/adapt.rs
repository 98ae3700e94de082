//! Structural adaptation operators over the normative network.

use tracing::debug;

use crate::error::ExecutionError;
use crate::network::{NodeAttribute, NormativeNetwork};
use crate::norm::NormId;
use crate::reasoning::GeneralisationProposal;
use crate::system::{Generalisation, Substitution};

/// Activates a norm and drops the evaluative tags of its previous life.
pub fn activate_norm(network: &mut NormativeNetwork, id: NormId) -> Result<(), ExecutionError> {
    network.activate(id)?;
    for tag in NodeAttribute::EVALUATIVE {
        network.remove_attribute(id, tag)?;
    }
    Ok(())
}

/// Returns true if a norm was judged to perform badly.
#[must_use]
pub fn is_underperforming(network: &NormativeNetwork, id: NormId) -> bool {
    network.has_attribute(id, NodeAttribute::Ineffective) || network.has_attribute(id, NodeAttribute::Unnecessary)
}

/// Deactivates `id` and activates every child left unrepresented.
///
/// Returns the activated children; a leaf is simply deactivated.
pub fn specialise(network: &mut NormativeNetwork, id: NormId) -> Result<Vec<NormId>, ExecutionError> {
    network.deactivate(id)?;
    let mut activated = Vec::new();
    for child in network.children(id) {
        if !network.is_represented(child)? {
            activate_norm(network, child)?;
            activated.push(child);
        }
    }
    Ok(activated)
}

/// Result of applying one generalisation proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralisationOutcome {
    /// The applied generalisation.
    pub record: Generalisation,
    /// True if the parent norm was new to the network.
    pub parent_created: bool,
    /// True if the parent was not active before.
    pub parent_activated: bool,
}

/// Materialises a proposal: adds the parent, records the edges, activates
/// the parent and deactivates the children.
///
/// Children that are no longer active are left out; fewer than two left,
/// or a parent already judged to under-perform, skips the proposal.
pub fn generalise(
    network: &mut NormativeNetwork,
    proposal: &GeneralisationProposal,
) -> Result<Option<GeneralisationOutcome>, ExecutionError> {
    let children: Vec<NormId> = proposal
        .children
        .iter()
        .copied()
        .filter(|c| network.is_active(*c))
        .collect();
    if children.len() < 2 {
        return Ok(None);
    }
    let existing = network.id_of(&proposal.parent);
    if let Some(parent) = existing {
        if is_underperforming(network, parent) {
            debug!(%parent, "skipping generalisation into under-performing norm");
            return Ok(None);
        }
    }
    let parent = network.add(proposal.parent.clone());
    for child in &children {
        network.add_generalisation(*child, parent)?;
    }
    let parent_activated = !network.is_active(parent);
    if parent_activated {
        activate_norm(network, parent)?;
    }
    for child in &children {
        network.deactivate(*child)?;
    }
    Ok(Some(GeneralisationOutcome {
        record: Generalisation { parent, children },
        parent_created: existing.is_none(),
        parent_activated,
    }))
}

/// Deactivates the weaker member of an active substitutable pair.
///
/// The member with the lower overall utility goes; on a tie the higher id
/// goes. Nothing happens unless both are active.
pub fn resolve_substitution(
    network: &mut NormativeNetwork,
    a: NormId,
    b: NormId,
) -> Result<Option<Substitution>, ExecutionError> {
    if !(network.is_active(a) && network.is_active(b)) {
        return Ok(None);
    }
    let ua = network.utility(a)?.overall_average();
    let ub = network.utility(b)?.overall_average();
    let (kept, removed) = if ua < ub {
        (b, a)
    } else if ub < ua {
        (a, b)
    } else {
        (a.min(b), a.max(b))
    };
    network.deactivate(removed)?;
    Ok(Some(Substitution { kept, removed }))
}
