//! The norm synthesis engine.
//!
//! One `tick` runs the whole cycle: detect conflicts, generate norms, judge
//! compliance, update utilities, classify and adapt, then emit the normative
//! system. Every step that mutates state runs against a checkpoint and is
//! rolled back if it fails, so a failed step leaves the networks as they
//! were before it started.

pub mod adapt;
pub mod strategy;

pub use strategy::Strategy;

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, debug_span, info, warn};

use crate::cbr::{CaseBase, CbrNormGenerator};
use crate::config::{Settings, StrategyKind};
use crate::error::{ExecutionError, SynthesisResult, ValidationError};
use crate::evaluation::{blend, classify_utility, GroupOutcomes, NormComplianceOutcomes, OutcomeTable};
use crate::network::{NodeAttribute, NormGroupNetwork, NormativeNetwork};
use crate::norm::{Norm, NormCompliance, NormId};
use crate::perception::{AgentId, Conflict, DomainFunctions, Monitor, ViewTransition};
use crate::system::{ConvergenceTracker, NormativeSystem, TickReport};
use crate::taxonomy::DescriptionLanguage;
use crate::utility::{Dimension, EvaluationKey, Goal, Utility};

/// Builder for [`NormSynthesisEngine`].
#[derive(Debug, Clone)]
pub struct NormSynthesisEngineBuilder<D> {
    settings: Settings,
    language: DescriptionLanguage,
    domain: Option<D>,
    strategy: Option<StrategyKind>,
}

impl<D> Default for NormSynthesisEngineBuilder<D> {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            language: DescriptionLanguage::new(),
            domain: None,
            strategy: None,
        }
    }
}

impl<D: DomainFunctions> NormSynthesisEngineBuilder<D> {
    /// Builder with default settings and an empty language.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the vocabulary norm preconditions are written in.
    #[must_use]
    pub fn language(mut self, language: DescriptionLanguage) -> Self {
        self.language = language;
        self
    }

    /// Sets the domain functions. Required.
    #[must_use]
    pub fn domain(mut self, domain: D) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Overrides the strategy named in the settings.
    #[must_use]
    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    ///
    /// Returns `MissingStrategy` when neither the builder nor the settings
    /// name a strategy, `MissingDomain` without domain functions, and any
    /// settings validation error.
    pub fn build(self) -> Result<NormSynthesisEngine<D>, ValidationError> {
        self.settings.validate()?;
        let kind = self
            .strategy
            .or(self.settings.strategy)
            .ok_or(ValidationError::MissingStrategy)?;
        let domain = self.domain.ok_or(ValidationError::MissingDomain)?;

        let s = &self.settings;
        let normative = NormativeNetwork::new(&s.goals, s.default_utility, s.performance_window);
        let groups = NormGroupNetwork::new(&s.goals, s.default_utility, s.performance_window);
        let generator = CbrNormGenerator::new(s.default_utility);
        let rng = StdRng::seed_from_u64(s.seed);
        let strategy = Strategy::new(kind, s);
        info!(strategy = kind.name(), goals = s.goals.len(), seed = s.seed, "engine built");

        Ok(NormSynthesisEngine {
            settings: self.settings,
            language: self.language,
            domain,
            strategy,
            normative,
            groups,
            generator,
            rng,
            tick: 0,
        })
    }
}

/// State a step may touch besides the normative network, which every step
/// mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scope {
    groups: bool,
    generator: bool,
}

impl Scope {
    const NORMATIVE: Self = Self {
        groups: false,
        generator: false,
    };
    const GENERATION: Self = Self {
        groups: false,
        generator: true,
    };

    /// Evaluation refreshes case scores and, when tracked, norm groups.
    const fn evaluation(groups: bool) -> Self {
        Self { groups, generator: true }
    }
}

/// Copy of the state within a step's scope, taken before it runs.
struct Checkpoint {
    normative: NormativeNetwork,
    groups: Option<NormGroupNetwork>,
    generator: Option<CbrNormGenerator>,
    report: TickReport,
}

/// Norms that applied to one agent and how the agent complied.
type Applications = BTreeMap<AgentId, Vec<(NormId, NormCompliance)>>;

/// Synchronous norm synthesis engine over a domain `D`.
pub struct NormSynthesisEngine<D: DomainFunctions> {
    settings: Settings,
    language: DescriptionLanguage,
    domain: D,
    strategy: Strategy,
    normative: NormativeNetwork,
    groups: NormGroupNetwork,
    generator: CbrNormGenerator,
    rng: StdRng,
    tick: u64,
}

impl<D: DomainFunctions> NormSynthesisEngine<D> {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> NormSynthesisEngineBuilder<D> {
        NormSynthesisEngineBuilder::new()
    }

    /// Every norm proposed so far.
    #[must_use]
    pub fn normative_network(&self) -> &NormativeNetwork {
        &self.normative
    }

    /// Norm groups observed so far; empty unless the strategy tracks them.
    #[must_use]
    pub fn norm_group_network(&self) -> &NormGroupNetwork {
        &self.groups
    }

    /// Cases remembered by the norm generator.
    #[must_use]
    pub fn case_base(&self) -> &CaseBase {
        self.generator.case_base()
    }

    /// Validated settings the engine runs with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Vocabulary norm preconditions are written in.
    #[must_use]
    pub fn language(&self) -> &DescriptionLanguage {
        &self.language
    }

    /// Strategy the engine was built with.
    #[must_use]
    pub const fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Number of ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Convergence tracker requiring `convergence_ticks` unchanged ticks.
    #[must_use]
    pub fn convergence_tracker(&self) -> ConvergenceTracker {
        ConvergenceTracker::new(self.settings.convergence_ticks)
    }

    /// Current normative system, without running a tick.
    pub fn normative_system(&self) -> SynthesisResult<NormativeSystem> {
        Ok(NormativeSystem::from_network(&self.normative)?)
    }

    /// Polls `monitor` for the next tick and runs it.
    pub fn tick_from_monitor(&mut self, monitor: &mut Monitor<D::View>) -> SynthesisResult<TickReport> {
        let transitions = monitor.perceive(self.tick + 1);
        self.tick(&transitions)
    }

    /// Runs one full cycle over the tick's view transitions.
    ///
    /// Per-step failures are logged, rolled back and listed in
    /// `TickReport::failed_steps`; they do not fail the tick.
    pub fn tick(&mut self, transitions: &[ViewTransition<D::View>]) -> SynthesisResult<TickReport> {
        self.tick += 1;
        let span = debug_span!("tick", tick = self.tick, strategy = self.strategy.kind().name());
        let _enter = span.enter();

        let mut report = TickReport::new(self.tick);
        let conflicts = self.detect_conflicts(transitions);
        report.conflicts = conflicts.len();

        let evaluation = Scope::evaluation(self.strategy.tracks_substitutability());
        self.transactional("generate", Scope::GENERATION, &mut report, |engine, report| {
            engine.generate(&conflicts, report)
        });
        self.transactional("evaluate", evaluation, &mut report, |engine, _| engine.evaluate(transitions));
        self.transactional("classify", Scope::NORMATIVE, &mut report, Self::classify);
        self.transactional("adapt", Scope::NORMATIVE, &mut report, Self::adapt);

        report.normative_system = NormativeSystem::from_network(&self.normative)?;
        debug!(
            norms = report.normative_system.len(),
            conflicts = report.conflicts,
            created = report.norms_created.len(),
            activated = report.activated.len(),
            deactivated = report.deactivated.len(),
            "tick complete"
        );
        Ok(report)
    }

    /// Runs `step` against a checkpoint of the state in `scope`.
    ///
    /// State outside the scope is neither copied nor restored, so `run` must
    /// not mutate it.
    fn transactional<F>(&mut self, step: &'static str, scope: Scope, report: &mut TickReport, run: F)
    where
        F: FnOnce(&mut Self, &mut TickReport) -> SynthesisResult<()>,
    {
        let checkpoint = Checkpoint {
            normative: self.normative.clone(),
            groups: scope.groups.then(|| self.groups.clone()),
            generator: scope.generator.then(|| self.generator.clone()),
            report: report.clone(),
        };
        if let Err(error) = run(self, report) {
            warn!(step, %error, "step failed, rolling back");
            self.normative = checkpoint.normative;
            if let Some(groups) = checkpoint.groups {
                self.groups = groups;
            }
            if let Some(generator) = checkpoint.generator {
                self.generator = generator;
            }
            *report = checkpoint.report;
            report.failed_steps.push(step.to_string());
        }
    }

    fn detect_conflicts(&self, transitions: &[ViewTransition<D::View>]) -> Vec<Conflict<D::View>> {
        let mut conflicts = Vec::new();
        for goal in &self.settings.goals {
            for transition in transitions {
                conflicts.extend(self.domain.conflicts(goal, transition));
            }
        }
        if !conflicts.is_empty() {
            debug!(count = conflicts.len(), "conflicts detected");
        }
        conflicts
    }

    fn generate(&mut self, conflicts: &[Conflict<D::View>], report: &mut TickReport) -> SynthesisResult<()> {
        for conflict in conflicts {
            let generated =
                self.generator
                    .generate_norms(conflict, &self.domain, &self.language, &self.normative, &mut self.rng);
            for norm in generated.norms {
                match self.normative.id_of(&norm) {
                    None => {
                        let id = self.normative.add(norm);
                        adapt::activate_norm(&mut self.normative, id)?;
                        info!(norm = %id, content = %self.normative.get(id)?, goal = %conflict.goal(), "norm created");
                        report.norms_created.push(id);
                        report.activated.push(id);
                    }
                    Some(id) if !self.normative.is_represented(id)? => {
                        adapt::activate_norm(&mut self.normative, id)?;
                        info!(norm = %id, "norm reactivated");
                        report.activated.push(id);
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, transitions: &[ViewTransition<D::View>]) -> SynthesisResult<()> {
        let mut norm_outcomes: OutcomeTable<NormComplianceOutcomes> = OutcomeTable::new();
        let mut group_outcomes: OutcomeTable<GroupOutcomes> = OutcomeTable::new();

        for transition in transitions {
            let (Some(source_step), Some(target_step)) = (transition.source_step(), transition.target_step()) else {
                continue;
            };
            let (Some(source), Some(target)) = (transition.view(source_step), transition.view(target_step)) else {
                continue;
            };

            let mut applications: Applications = BTreeMap::new();
            for agent in self.domain.agents(source) {
                let Some(context) = self.domain.agent_context(agent, source) else {
                    continue;
                };
                let applicable = self.normative.applicable_norms(&context, &self.language, true);
                if applicable.is_empty() {
                    continue;
                }
                let actions = self.domain.agent_actions(agent, transition);
                let in_conflict: Vec<bool> = self
                    .settings
                    .goals
                    .iter()
                    .map(|goal| self.domain.has_conflict(target, agent, goal))
                    .collect();

                let mut judged = Vec::with_capacity(applicable.len());
                for id in applicable {
                    let compliance = self.normative.get(id)?.compliance(&actions);
                    for (goal, conflict) in self.settings.goals.iter().zip(&in_conflict) {
                        norm_outcomes.entry(id, goal).record(compliance, *conflict);
                    }
                    judged.push((id, compliance));
                }
                applications.insert(agent, judged);
            }

            if self.strategy.tracks_substitutability() {
                self.observe_groups(&applications, source, target, &mut group_outcomes)?;
            }
        }

        self.update_scores(&norm_outcomes, &group_outcomes)?;
        Ok(())
    }

    /// Records the joint outcome of every pair of distinct norms applied to
    /// two agents that perceive each other.
    fn observe_groups(
        &mut self,
        applications: &Applications,
        source: &D::View,
        target: &D::View,
        outcomes: &mut OutcomeTable<GroupOutcomes>,
    ) -> SynthesisResult<()> {
        for (&x, norms_x) in applications {
            let seen_by_x: BTreeSet<AgentId> = self.domain.perceived_agents(x, source).into_iter().collect();
            for y in seen_by_x.into_iter().filter(|y| *y > x) {
                let Some(norms_y) = applications.get(&y) else {
                    continue;
                };
                if !self.domain.perceived_agents(y, source).contains(&x) {
                    continue;
                }
                let in_conflict: Vec<bool> = self
                    .settings
                    .goals
                    .iter()
                    .map(|g| self.domain.has_conflict(target, x, g) || self.domain.has_conflict(target, y, g))
                    .collect();
                for &(n, cn) in norms_x {
                    for &(m, cm) in norms_y {
                        if n == m {
                            continue;
                        }
                        let (group, created) = self.groups.observe(n, cn, m, cm)?;
                        if created {
                            debug!(group = %self.groups.get(group)?, "norm group created");
                        }
                        for (goal, conflict) in self.settings.goals.iter().zip(&in_conflict) {
                            outcomes.entry(group, goal).record(*conflict);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn update_scores(
        &mut self,
        norms: &OutcomeTable<NormComplianceOutcomes>,
        groups: &OutcomeTable<GroupOutcomes>,
    ) -> SynthesisResult<()> {
        let rate = self.settings.learning_rate;
        for (id, goal, outcomes) in norms.iter() {
            let utility = self.normative.utility_mut(id)?;
            if let Some(reward) = outcomes.effectiveness_reward() {
                apply_reward(utility, &EvaluationKey::new(Dimension::Effectiveness, goal.clone()), reward, rate)?;
            }
            if let Some(reward) = outcomes.necessity_reward() {
                apply_reward(utility, &EvaluationKey::new(Dimension::Necessity, goal.clone()), reward, rate)?;
            }
        }
        for (id, goal, outcomes) in groups.iter() {
            if let Some(reward) = outcomes.effectiveness_reward() {
                let utility = self.groups.utility_mut(id)?;
                apply_reward(utility, &EvaluationKey::new(Dimension::Effectiveness, goal.clone()), reward, rate)?;
            }
        }

        let normative = &self.normative;
        let goals = &self.settings.goals;
        self.generator
            .case_base_mut()
            .refresh_scores(|norm| effectiveness_of(normative, norm, goals));
        Ok(())
    }

    fn classify(&mut self, report: &mut TickReport) -> SynthesisResult<()> {
        for id in self.normative.active_nodes() {
            let classification = classify_utility(self.strategy.classifier(), self.normative.utility(id)?, &self.settings)?;
            for tag in classification.tags {
                if !self.normative.has_attribute(id, tag) {
                    debug!(norm = %id, %tag, "classified");
                }
                self.normative.add_attribute(id, tag)?;
            }
        }

        if let Some(detector) = self.strategy.detector() {
            for ((a, b), substitutable) in detector.assess_all(&self.groups, &self.normative, &self.settings)? {
                if substitutable {
                    self.normative.mark_substitutable(a, b)?;
                    info!(norm_a = %a, norm_b = %b, "norms substitutable");
                    report.substitutable_pairs.push((a, b));
                    continue;
                }
                // a norm with any substitute keeps its Substitutable tag
                for id in [a, b] {
                    if self.normative.substitutes_of(id).is_empty()
                        && !self.normative.has_attribute(id, NodeAttribute::NotSubstitutable)
                    {
                        debug!(norm = %id, "classified not substitutable");
                        self.normative.add_attribute(id, NodeAttribute::NotSubstitutable)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn adapt(&mut self, report: &mut TickReport) -> SynthesisResult<()> {
        for id in self.normative.active_nodes() {
            if !self.normative.is_active(id) || !adapt::is_underperforming(&self.normative, id) {
                continue;
            }
            let activated = adapt::specialise(&mut self.normative, id)?;
            info!(norm = %id, children = ?activated, "norm specialised");
            report.specialisations.push(id);
            report.deactivated.push(id);
            report.activated.extend(activated);
        }

        let mut candidates: Vec<(NormId, Norm)> = Vec::new();
        for id in self.normative.active_nodes() {
            if self.normative.has_attribute(id, NodeAttribute::Generalisable) {
                candidates.push((id, self.normative.get(id)?.clone()));
            }
        }
        if candidates.len() >= 2 {
            let proposals = self.strategy.reasoner_mut().proposals(&candidates, &self.language);
            for proposal in proposals {
                if !self.domain.is_consistent(&proposal.parent.precondition) {
                    debug!(parent = %proposal.parent, "inconsistent generalisation skipped");
                    continue;
                }
                let Some(outcome) = adapt::generalise(&mut self.normative, &proposal)? else {
                    continue;
                };
                let g = outcome.record;
                info!(parent = %g.parent, children = ?g.children, "norms generalised");
                if outcome.parent_created {
                    report.norms_created.push(g.parent);
                }
                if outcome.parent_activated {
                    report.activated.push(g.parent);
                }
                report.deactivated.extend(g.children.iter().copied());
                report.generalisations.push(g);
            }
        }

        for (a, b) in self.normative.substitutable_pairs() {
            if let Some(s) = adapt::resolve_substitution(&mut self.normative, a, b)? {
                info!(kept = %s.kept, removed = %s.removed, "substitutable norm deactivated");
                report.deactivated.push(s.removed);
                report.substitutions.push(s);
            }
        }
        Ok(())
    }
}

fn apply_reward(utility: &mut Utility, key: &EvaluationKey, reward: f64, rate: f64) -> Result<(), ExecutionError> {
    let score = blend(utility.score(key)?, reward, rate);
    utility.set_score(key, score)
}

/// Mean Effectiveness score average of a norm over the goals it was
/// evaluated for.
fn effectiveness_of(network: &NormativeNetwork, norm: &Norm, goals: &[Goal]) -> Option<f64> {
    let utility = network.utility(network.id_of(norm)?).ok()?;
    let scores: Vec<f64> = goals
        .iter()
        .filter_map(|g| {
            utility
                .score_average(&EvaluationKey::new(Dimension::Effectiveness, g.clone()))
                .ok()
        })
        .collect();
    if scores.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = scores.len() as f64;
    Some(scores.iter().sum::<f64>() / n)
}
