//! Generalisation hierarchies.
//!
//! `Network<T>` is an arena of nodes addressed by stable `NodeId`s. Content,
//! activation state, attribute tags and utility live in the node entry; the
//! parent/child adjacency lives in separate index tables keyed by id. Both the
//! normative network and the norm-group network are built on top of it.
//!
//! Nodes are never removed. A node is *represented* when it is active or when
//! one of its strict ancestors is active.

pub mod group;
pub mod normative;

pub use group::{NormGroup, NormGroupCombination, NormGroupNetwork};
pub use normative::NormativeNetwork;

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::utility::{EvaluationKey, Utility};

/// Stable identifier of a node inside one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by one network instance. Ids start at 1.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    /// Allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused id.
    pub fn allocate(&mut self) -> NodeId {
        self.last += 1;
        NodeId(self.last)
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub const fn allocated(&self) -> u64 {
        self.last
    }
}

/// Activation state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// In force.
    Active,
    /// Kept for its history, not in force on its own.
    Inactive,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// Advisory classification tag.
///
/// Every tag has a dual; assigning a tag removes its dual so a node never
/// carries both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttribute {
    /// Fulfilling the norm avoids conflicts.
    Effective,
    /// Fulfilling the norm does not avoid conflicts.
    Ineffective,
    /// Infringing the norm leads to conflicts.
    Necessary,
    /// Infringing the norm is harmless.
    Unnecessary,
    /// Good enough on every slot to be merged into a broader norm.
    Generalisable,
    /// Below the generalisation boundary on some slot.
    NotGeneralisable,
    /// Has a substitute that regulates equally well.
    Substitutable,
    /// Judged against another norm and found not redundant.
    NotSubstitutable,
}

impl NodeAttribute {
    /// The tag this one excludes.
    #[must_use]
    pub const fn dual(self) -> Self {
        match self {
            Self::Effective => Self::Ineffective,
            Self::Ineffective => Self::Effective,
            Self::Necessary => Self::Unnecessary,
            Self::Unnecessary => Self::Necessary,
            Self::Generalisable => Self::NotGeneralisable,
            Self::NotGeneralisable => Self::Generalisable,
            Self::Substitutable => Self::NotSubstitutable,
            Self::NotSubstitutable => Self::Substitutable,
        }
    }

    /// Tags derived from performance statistics. They go stale whenever the
    /// node's utility is reset.
    pub const EVALUATIVE: [Self; 6] = [
        Self::Effective,
        Self::Ineffective,
        Self::Necessary,
        Self::Unnecessary,
        Self::Generalisable,
        Self::NotGeneralisable,
    ];
}

impl fmt::Display for NodeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Effective => "effective",
            Self::Ineffective => "ineffective",
            Self::Necessary => "necessary",
            Self::Unnecessary => "unnecessary",
            Self::Generalisable => "generalisable",
            Self::NotGeneralisable => "not_generalisable",
            Self::Substitutable => "substitutable",
            Self::NotSubstitutable => "not_substitutable",
        };
        write!(f, "{s}")
    }
}

/// Anything that can be placed in a network.
pub trait NetworkNode: Clone + Eq + Hash + fmt::Debug {
    /// Human-readable label for logs.
    fn label(&self) -> String;
}

#[derive(Debug, Clone)]
struct NodeEntry<T> {
    content: T,
    state: NodeState,
    attributes: BTreeSet<NodeAttribute>,
    utility: Utility,
}

/// Arena-backed generalisation hierarchy.
#[derive(Debug, Clone)]
pub struct Network<T: NetworkNode> {
    ids: IdAllocator,
    nodes: BTreeMap<NodeId, NodeEntry<T>>,
    by_content: HashMap<T, NodeId>,
    parents: BTreeMap<NodeId, BTreeSet<NodeId>>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    evaluation_keys: Vec<EvaluationKey>,
    default_score: f64,
    capacity: usize,
}

impl<T: NetworkNode> Network<T> {
    /// Creates an empty network whose nodes track `evaluation_keys`.
    #[must_use]
    pub fn new(evaluation_keys: Vec<EvaluationKey>, default_score: f64, capacity: usize) -> Self {
        Self {
            ids: IdAllocator::new(),
            nodes: BTreeMap::new(),
            by_content: HashMap::new(),
            parents: BTreeMap::new(),
            children: BTreeMap::new(),
            evaluation_keys,
            default_score,
            capacity,
        }
    }

    /// Inserts `content` unless an equal node already exists.
    ///
    /// New nodes start inactive with a fresh utility. Returns the id of the
    /// (new or existing) node.
    pub fn add(&mut self, content: T) -> NodeId {
        if let Some(id) = self.by_content.get(&content) {
            return *id;
        }
        let id = self.ids.allocate();
        let utility = Utility::new(self.evaluation_keys.iter().cloned(), self.default_score, self.capacity);
        self.by_content.insert(content.clone(), id);
        self.nodes.insert(
            id,
            NodeEntry {
                content,
                state: NodeState::Inactive,
                attributes: BTreeSet::new(),
                utility,
            },
        );
        id
    }

    fn entry(&self, id: NodeId) -> Result<&NodeEntry<T>, ExecutionError> {
        self.nodes.get(&id).ok_or(ExecutionError::NodeNotFound { id })
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry<T>, ExecutionError> {
        self.nodes.get_mut(&id).ok_or(ExecutionError::NodeNotFound { id })
    }

    /// Content of a node.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn get(&self, id: NodeId) -> Result<&T, ExecutionError> {
        Ok(&self.entry(id)?.content)
    }

    /// Id of the node holding `content`, if any.
    #[must_use]
    pub fn id_of(&self, content: &T) -> Option<NodeId> {
        self.by_content.get(content).copied()
    }

    /// Returns true if a node holds `content`.
    #[must_use]
    pub fn contains(&self, content: &T) -> bool {
        self.by_content.contains_key(content)
    }

    /// Returns true if a node carries `id`.
    #[must_use]
    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes ever added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &T)> {
        self.nodes.iter().map(|(id, e)| (*id, &e.content))
    }

    /// All ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Slots every node's utility tracks.
    #[must_use]
    pub fn evaluation_keys(&self) -> &[EvaluationKey] {
        &self.evaluation_keys
    }

    // -- activation -------------------------------------------------------

    /// Activation state of a node.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn state(&self, id: NodeId) -> Result<NodeState, ExecutionError> {
        Ok(self.entry(id)?.state)
    }

    /// Returns true if the node exists and is active.
    #[must_use]
    pub fn is_active(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|e| e.state == NodeState::Active)
    }

    /// Flips the activation state. Ancestry is untouched.
    pub fn set_state(&mut self, id: NodeId, state: NodeState) -> Result<(), ExecutionError> {
        self.entry_mut(id)?.state = state;
        Ok(())
    }

    /// Activates a node and resets its utility.
    ///
    /// A rule re-entering force does so in a different context (other siblings
    /// may be active now), so its old performance history is discarded.
    pub fn activate(&mut self, id: NodeId) -> Result<(), ExecutionError> {
        let entry = self.entry_mut(id)?;
        entry.state = NodeState::Active;
        entry.utility.reset();
        Ok(())
    }

    /// Takes a node out of force. Its utility is kept.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn deactivate(&mut self, id: NodeId) -> Result<(), ExecutionError> {
        self.set_state(id, NodeState::Inactive)
    }

    // -- structure --------------------------------------------------------

    /// Records that `parent` generalises `child`.
    ///
    /// Does not change any activation state. Returns `false` if the edge was
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for unknown ids and `CycleDetected` if `child`
    /// is `parent` or one of its ancestors.
    pub fn add_generalisation(&mut self, child: NodeId, parent: NodeId) -> Result<bool, ExecutionError> {
        self.entry(child)?;
        self.entry(parent)?;
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(ExecutionError::CycleDetected { child, parent });
        }
        let added = self.parents.entry(child).or_default().insert(parent);
        self.children.entry(parent).or_default().insert(child);
        Ok(added)
    }

    /// Direct children (nodes this one generalises), ascending.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.children
            .get(&id)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Direct parents, ascending.
    #[must_use]
    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.parents
            .get(&id)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns true if the node has no children.
    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children.get(&id).map_or(true, BTreeSet::is_empty)
    }

    /// All strict ancestors.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> BTreeSet<NodeId> {
        Self::walk(&self.parents, id)
    }

    /// All strict descendants.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> BTreeSet<NodeId> {
        Self::walk(&self.children, id)
    }

    fn walk(edges: &BTreeMap<NodeId, BTreeSet<NodeId>>, start: NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(start);
        while let Some(current) = queue.pop_front() {
            if let Some(next) = edges.get(&current) {
                for n in next {
                    if seen.insert(*n) {
                        queue.push_back(*n);
                    }
                }
            }
        }
        seen
    }

    /// Active, or generalised by an active ancestor.
    pub fn is_represented(&self, id: NodeId) -> Result<bool, ExecutionError> {
        if self.entry(id)?.state == NodeState::Active {
            return Ok(true);
        }
        Ok(self.ancestors(id).into_iter().any(|a| self.is_active(a)))
    }

    /// Ids of every represented node, ascending.
    #[must_use]
    pub fn represented_nodes(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| self.is_represented(*id).unwrap_or(false))
            .collect()
    }

    /// Ids of every node that is neither active nor under an active ancestor.
    #[must_use]
    pub fn not_represented_nodes(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|id| !self.is_represented(*id).unwrap_or(true))
            .collect()
    }

    /// Ids of the active nodes, ascending.
    #[must_use]
    pub fn active_nodes(&self) -> Vec<NodeId> {
        self.ids().filter(|id| self.is_active(*id)).collect()
    }

    /// Ids of the inactive nodes, ascending.
    #[must_use]
    pub fn inactive_nodes(&self) -> Vec<NodeId> {
        self.ids().filter(|id| !self.is_active(*id)).collect()
    }

    // -- attributes -------------------------------------------------------

    /// Tags a node, dropping the tag's dual.
    pub fn add_attribute(&mut self, id: NodeId, attribute: NodeAttribute) -> Result<(), ExecutionError> {
        let entry = self.entry_mut(id)?;
        entry.attributes.remove(&attribute.dual());
        entry.attributes.insert(attribute);
        Ok(())
    }

    /// Drops a tag if present.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn remove_attribute(&mut self, id: NodeId, attribute: NodeAttribute) -> Result<(), ExecutionError> {
        self.entry_mut(id)?.attributes.remove(&attribute);
        Ok(())
    }

    /// Tags of a node.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn attributes(&self, id: NodeId) -> Result<&BTreeSet<NodeAttribute>, ExecutionError> {
        Ok(&self.entry(id)?.attributes)
    }

    /// Returns true if the node exists and carries `attribute`.
    #[must_use]
    pub fn has_attribute(&self, id: NodeId, attribute: NodeAttribute) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|e| e.attributes.contains(&attribute))
    }

    // -- utility ----------------------------------------------------------

    /// Utility of a node.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn utility(&self, id: NodeId) -> Result<&Utility, ExecutionError> {
        Ok(&self.entry(id)?.utility)
    }

    /// Mutable utility of a node.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NodeNotFound` for an unknown id.
    pub fn utility_mut(&mut self, id: NodeId) -> Result<&mut Utility, ExecutionError> {
        Ok(&mut self.entry_mut(id)?.utility)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::norm::{Description, Norm};
    use crate::utility::{Dimension, Goal};

    fn network() -> Network<Norm> {
        let keys = EvaluationKey::cross(&Dimension::ALL, &[Goal::new("g")]);
        Network::new(keys, 0.5, 10)
    }

    fn norm(term: &str) -> Norm {
        Norm::prohibition(Description::new().with("front", term), "Go")
    }

    fn eff() -> EvaluationKey {
        EvaluationKey::new(Dimension::Effectiveness, Goal::new("g"))
    }

    #[test]
    fn add_is_idempotent_and_ids_are_monotonic() {
        let mut net = network();
        let a = net.add(norm("car"));
        let again = net.add(norm("car"));
        let b = net.add(norm("nothing"));
        assert_eq!(a, again);
        assert_eq!(a, NodeId::new(1));
        assert_eq!(b, NodeId::new(2));
        assert_eq!(net.len(), 2);
        assert_eq!(net.state(a).unwrap(), NodeState::Inactive);
    }

    #[test]
    fn separate_networks_allocate_independently() {
        let mut one = network();
        let mut two = network();
        one.add(norm("car"));
        one.add(norm("nothing"));
        assert_eq!(two.add(norm("*")), NodeId::new(1));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let mut net = network();
        let ghost = NodeId::new(99);
        assert!(matches!(net.get(ghost), Err(ExecutionError::NodeNotFound { .. })));
        assert!(net.activate(ghost).is_err());
        assert!(net.is_represented(ghost).is_err());
        assert!(!net.is_active(ghost));
    }

    #[test]
    fn generalisation_rejects_cycles() {
        let mut net = network();
        let child = net.add(norm("car"));
        let parent = net.add(norm("*"));
        let top = net.add(norm("top"));
        assert!(net.add_generalisation(child, parent).unwrap());
        assert!(!net.add_generalisation(child, parent).unwrap());
        net.add_generalisation(parent, top).unwrap();

        assert!(matches!(
            net.add_generalisation(top, child),
            Err(ExecutionError::CycleDetected { .. })
        ));
        assert!(net.add_generalisation(child, child).is_err());
        assert!(!net.ancestors(child).contains(&child));
        assert_eq!(net.ancestors(child).len(), 2);
        assert_eq!(net.descendants(top).len(), 2);
    }

    #[test]
    fn representation_follows_ancestors() {
        let mut net = network();
        let child = net.add(norm("car"));
        let parent = net.add(norm("*"));
        net.add_generalisation(child, parent).unwrap();

        assert!(!net.is_represented(child).unwrap());
        assert_eq!(net.not_represented_nodes(), vec![child, parent]);

        net.activate(parent).unwrap();
        assert!(net.is_represented(child).unwrap());
        assert!(!net.is_active(child));
        assert_eq!(net.represented_nodes(), vec![child, parent]);
        assert_eq!(net.active_nodes(), vec![parent]);
        assert_eq!(net.inactive_nodes(), vec![child]);

        net.deactivate(parent).unwrap();
        assert!(net.represented_nodes().is_empty());
        assert!(net.is_leaf(child));
        assert!(!net.is_leaf(parent));
        assert_eq!(net.children(parent), vec![child]);
        assert_eq!(net.parents(child), vec![parent]);
    }

    #[test]
    fn attribute_duals_are_exclusive() {
        let mut net = network();
        let id = net.add(norm("car"));
        net.add_attribute(id, NodeAttribute::Effective).unwrap();
        net.add_attribute(id, NodeAttribute::Necessary).unwrap();
        net.add_attribute(id, NodeAttribute::Ineffective).unwrap();

        assert!(net.has_attribute(id, NodeAttribute::Ineffective));
        assert!(!net.has_attribute(id, NodeAttribute::Effective));
        assert!(net.has_attribute(id, NodeAttribute::Necessary));

        net.remove_attribute(id, NodeAttribute::Necessary).unwrap();
        assert_eq!(net.attributes(id).unwrap().len(), 1);
    }

    #[test]
    fn activation_resets_utility() {
        let mut net = network();
        let id = net.add(norm("car"));
        net.activate(id).unwrap();
        net.utility_mut(id).unwrap().set_score(&eff(), 0.9).unwrap();
        assert!(net.utility(id).unwrap().is_evaluated());

        net.deactivate(id).unwrap();
        assert!(net.utility(id).unwrap().is_evaluated());

        net.activate(id).unwrap();
        assert!(!net.utility(id).unwrap().is_evaluated());
        assert_eq!(net.utility(id).unwrap().score(&eff()).unwrap(), 0.5);
    }

    #[test]
    fn dual_of_dual_is_identity() {
        for attr in NodeAttribute::EVALUATIVE {
            assert_eq!(attr.dual().dual(), attr);
            assert_ne!(attr.dual(), attr);
        }
    }
}
