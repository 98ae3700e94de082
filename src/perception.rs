//! Perception boundary.
//!
//! The environment, its sensors and its conflict predicates are supplied by
//! the integrator. The engine only sees views through `DomainFunctions`; a
//! view itself is an opaque type parameter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::norm::Description;
use crate::utility::Goal;

/// Identifier of an agent in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Identifier of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(pub u64);

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sensor-{}", self.0)
    }
}

/// Consecutive views perceived by one sensor, keyed by time step.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransition<V> {
    sensor: SensorId,
    views: BTreeMap<u64, V>,
}

impl<V> ViewTransition<V> {
    /// Empty transition of one sensor.
    #[must_use]
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            views: BTreeMap::new(),
        }
    }

    /// Adds the view at `step`.
    #[must_use]
    pub fn with_view(mut self, step: u64, view: V) -> Self {
        self.views.insert(step, view);
        self
    }

    /// Adds or replaces the view at `step`.
    pub fn insert(&mut self, step: u64, view: V) {
        self.views.insert(step, view);
    }

    /// Sensor that perceived the views.
    #[must_use]
    pub const fn sensor(&self) -> SensorId {
        self.sensor
    }

    /// View at `step`, if perceived.
    #[must_use]
    pub fn view(&self, step: u64) -> Option<&V> {
        self.views.get(&step)
    }

    /// Time steps covered, ascending.
    pub fn steps(&self) -> impl Iterator<Item = u64> + '_ {
        self.views.keys().copied()
    }

    /// Latest step: the outcome being judged.
    #[must_use]
    pub fn target_step(&self) -> Option<u64> {
        self.views.keys().next_back().copied()
    }

    /// Step immediately before the target: the situation agents acted in.
    #[must_use]
    pub fn source_step(&self) -> Option<u64> {
        self.views.keys().rev().nth(1).copied()
    }

    /// Latest step strictly before `step`.
    #[must_use]
    pub fn step_before(&self, step: u64) -> Option<u64> {
        self.views.range(..step).next_back().map(|(s, _)| *s)
    }

    /// Number of views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if no view was perceived.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// A goal-violating situation.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict<V> {
    goal: Goal,
    agents: Vec<AgentId>,
    time_step: u64,
    transition: ViewTransition<V>,
}

impl<V> Conflict<V> {
    /// Creates a conflict observed at `time_step` of `transition`.
    ///
    /// The conflicting agents are kept sorted and deduplicated.
    #[must_use]
    pub fn new(goal: Goal, mut agents: Vec<AgentId>, time_step: u64, transition: ViewTransition<V>) -> Self {
        agents.sort_unstable();
        agents.dedup();
        Self {
            goal,
            agents,
            time_step,
            transition,
        }
    }

    /// Violated goal.
    #[must_use]
    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    /// Conflicting agents, ascending.
    #[must_use]
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// Step at which the conflict was observed.
    #[must_use]
    pub const fn time_step(&self) -> u64 {
        self.time_step
    }

    /// Transition the conflict was found in.
    #[must_use]
    pub fn transition(&self) -> &ViewTransition<V> {
        &self.transition
    }

    /// Step of the situation that led into the conflict.
    #[must_use]
    pub fn source_step(&self) -> Option<u64> {
        self.transition.step_before(self.time_step)
    }

    /// View of the situation that led into the conflict.
    #[must_use]
    pub fn source_view(&self) -> Option<&V> {
        self.source_step().and_then(|s| self.transition.view(s))
    }

    /// Returns true if `agent` is one of the conflicting agents.
    #[must_use]
    pub fn involves(&self, agent: AgentId) -> bool {
        self.agents.binary_search(&agent).is_ok()
    }
}

/// Domain knowledge supplied by the integrator.
pub trait DomainFunctions {
    /// Opaque snapshot of the environment.
    type View: Clone;

    /// Returns true if the description could ever be observed.
    ///
    /// Used to reject generalisations that describe impossible situations.
    fn is_consistent(&self, _description: &Description) -> bool {
        true
    }

    /// Agents present in a view, ascending.
    fn agents(&self, view: &Self::View) -> Vec<AgentId>;

    /// What `agent` perceives in `view`.
    fn agent_context(&self, agent: AgentId, view: &Self::View) -> Option<Description>;

    /// Actions `agent` performed between the source and target views.
    fn agent_actions(&self, agent: AgentId, transition: &ViewTransition<Self::View>) -> Vec<String>;

    /// New conflicts for `goal` in the transition.
    fn conflicts(&self, goal: &Goal, transition: &ViewTransition<Self::View>) -> Vec<Conflict<Self::View>>;

    /// New conflicts for `goal` involving `agent`.
    fn agent_conflicts(
        &self,
        goal: &Goal,
        transition: &ViewTransition<Self::View>,
        agent: AgentId,
    ) -> Vec<Conflict<Self::View>> {
        self.conflicts(goal, transition)
            .into_iter()
            .filter(|c| c.involves(agent))
            .collect()
    }

    /// Returns true if `agent` is in conflict for `goal` in `view`.
    fn has_conflict(&self, view: &Self::View, agent: AgentId, goal: &Goal) -> bool;

    /// Agents that `agent` perceives in `view`. Defaults to none, which
    /// disables joint (norm group) evaluation.
    fn perceived_agents(&self, _agent: AgentId, _view: &Self::View) -> Vec<AgentId> {
        Vec::new()
    }
}

/// A source of one view transition per tick.
pub trait Sensor<V> {
    /// Identifier used in logs.
    fn id(&self) -> SensorId;

    /// Transition observed at `tick`, if the sensor saw anything.
    fn perceive(&mut self, tick: u64) -> Option<ViewTransition<V>>;
}

/// Collection of sensors polled once per tick.
pub struct Monitor<V> {
    sensors: Vec<Box<dyn Sensor<V>>>,
}

impl<V> Default for Monitor<V> {
    fn default() -> Self {
        Self { sensors: Vec::new() }
    }
}

impl<V> fmt::Debug for Monitor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("sensors", &self.sensors.iter().map(|s| s.id()).collect::<Vec<_>>())
            .finish()
    }
}

impl<V> Monitor<V> {
    /// Monitor without sensors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sensor; sensors are polled in registration order.
    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor<V>>) {
        self.sensors.push(sensor);
    }

    /// Number of sensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Returns true if no sensor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Polls every sensor in registration order.
    pub fn perceive(&mut self, tick: u64) -> Vec<ViewTransition<V>> {
        self.sensors
            .iter_mut()
            .filter_map(|s| s.perceive(tick))
            .collect()
    }
}
