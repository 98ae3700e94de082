//! Turning one conflict into candidate norms.

use rand::Rng;
use tracing::debug;

use crate::network::NormativeNetwork;
use crate::norm::Norm;
use crate::perception::{Conflict, DomainFunctions};
use crate::taxonomy::DescriptionLanguage;

use super::{CaseBase, CaseDescription, CaseId};

/// Why a generation call produced what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// An identical case was found and its best solution reused.
    Retrieved(CaseId),
    /// A fresh norm was synthesised and stored under a case.
    Synthesised(CaseId),
    /// The conflict has no view before its time step.
    NoSource,
    /// The conflict lists no agents.
    NoResponsibleAgent,
    /// A represented norm already covers the responsible agent.
    AlreadyRegulated,
    /// The chosen agent performed no action.
    NoActions,
    /// The chosen agent perceived nothing a norm could be conditioned on.
    EmptyContext,
}

/// Result of [`CbrNormGenerator::generate_norms`]. An empty norm list is a
/// valid "nothing to do" answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedNorms {
    /// Candidate norms; empty when nothing should be added.
    pub norms: Vec<Norm>,
    /// How the norms were obtained.
    pub outcome: GenerationOutcome,
}

impl GeneratedNorms {
    fn nothing(outcome: GenerationOutcome) -> Self {
        Self {
            norms: Vec::new(),
            outcome,
        }
    }

    /// Returns true if no norm was proposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }
}

/// Case-based norm generator owning the case base.
#[derive(Debug, Clone)]
pub struct CbrNormGenerator {
    case_base: CaseBase,
}

impl CbrNormGenerator {
    /// Creates a generator with an empty case base whose solutions start at
    /// `default_score`.
    #[must_use]
    pub fn new(default_score: f64) -> Self {
        Self {
            case_base: CaseBase::new(default_score),
        }
    }

    /// Every case seen so far.
    #[must_use]
    pub fn case_base(&self) -> &CaseBase {
        &self.case_base
    }

    /// Mutable access, used to rescore solutions after evaluation.
    pub fn case_base_mut(&mut self) -> &mut CaseBase {
        &mut self.case_base
    }

    /// Builds the case description of a conflict from the source contexts of
    /// its agents. Agents without a context are left out.
    pub fn describe<D: DomainFunctions>(conflict: &Conflict<D::View>, domain: &D) -> Option<CaseDescription> {
        let source = conflict.source_view()?;
        let contexts = conflict
            .agents()
            .iter()
            .filter_map(|agent| domain.agent_context(*agent, source))
            .collect();
        Some(CaseDescription::new(conflict.goal().clone(), contexts))
    }

    /// Proposes norms that would have avoided `conflict`.
    ///
    /// An identical remembered case yields its best solution. Otherwise one
    /// conflicting agent is picked at random and the prohibition of one of
    /// its actions under its source context is synthesised, unless a
    /// represented norm already applies to that context.
    pub fn generate_norms<D, R>(
        &mut self,
        conflict: &Conflict<D::View>,
        domain: &D,
        language: &DescriptionLanguage,
        network: &NormativeNetwork,
        rng: &mut R,
    ) -> GeneratedNorms
    where
        D: DomainFunctions,
        R: Rng,
    {
        let Some(description) = Self::describe(conflict, domain) else {
            return GeneratedNorms::nothing(GenerationOutcome::NoSource);
        };

        if let Some(case) = self.case_base.find_identical(&description) {
            // same goal and agent contexts, so the stored norms fit as they are
            if let Some(best) = case.best_solution().filter(|s| !s.is_empty()) {
                debug!(case = %case.id(), norms = best.norms().len(), "reusing solution");
                return GeneratedNorms {
                    norms: best.norms().to_vec(),
                    outcome: GenerationOutcome::Retrieved(case.id()),
                };
            }
        }

        let Some(source) = conflict.source_view() else {
            return GeneratedNorms::nothing(GenerationOutcome::NoSource);
        };
        let agents = conflict.agents();
        if agents.is_empty() {
            return GeneratedNorms::nothing(GenerationOutcome::NoResponsibleAgent);
        }
        let agent = agents[rng.gen_range(0..agents.len())];
        let context = domain.agent_context(agent, source).unwrap_or_default();

        if network.is_regulated(&context, language) {
            debug!(%agent, %context, "context already regulated");
            return GeneratedNorms::nothing(GenerationOutcome::AlreadyRegulated);
        }

        let actions = domain.agent_actions(agent, conflict.transition());
        if actions.is_empty() {
            return GeneratedNorms::nothing(GenerationOutcome::NoActions);
        }
        let action = &actions[rng.gen_range(0..actions.len())];

        if context.is_empty() {
            return GeneratedNorms::nothing(GenerationOutcome::EmptyContext);
        }

        let norm = Norm::prohibition(context, action.clone());
        let case = self.case_base.add(description, vec![norm.clone()]);
        debug!(%case, %agent, %norm, "synthesised norm");
        GeneratedNorms {
            norms: vec![norm],
            outcome: GenerationOutcome::Synthesised(case),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::norm::Description;
    use crate::perception::{AgentId, SensorId, ViewTransition};
    use crate::taxonomy::Taxonomy;
    use crate::utility::Goal;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// View: per agent, (near_car term, actions taken).
    type View = Vec<(&'static str, Vec<&'static str>)>;

    struct Toy;

    impl DomainFunctions for Toy {
        type View = View;

        fn agents(&self, view: &View) -> Vec<AgentId> {
            (0..view.len() as u64).map(AgentId).collect()
        }

        fn agent_context(&self, agent: AgentId, view: &View) -> Option<Description> {
            let (term, _) = view.get(agent.0 as usize)?;
            if term.is_empty() {
                return Some(Description::new());
            }
            Some(Description::new().with("near_car", *term))
        }

        fn agent_actions(&self, agent: AgentId, vt: &ViewTransition<View>) -> Vec<String> {
            let Some(step) = vt.source_step() else { return Vec::new() };
            vt.view(step)
                .and_then(|v| v.get(agent.0 as usize))
                .map(|(_, actions)| actions.iter().map(|a| (*a).to_string()).collect())
                .unwrap_or_default()
        }

        fn conflicts(&self, _goal: &Goal, _vt: &ViewTransition<View>) -> Vec<Conflict<View>> {
            Vec::new()
        }

        fn has_conflict(&self, _view: &View, _agent: AgentId, _goal: &Goal) -> bool {
            false
        }
    }

    fn language() -> DescriptionLanguage {
        let near = Taxonomy::new("near_car", "*")
            .with_term("yes", "*")
            .and_then(|t| t.with_term("no", "*"))
            .unwrap();
        DescriptionLanguage::new().with(near).unwrap()
    }

    fn conflict(view: View, agents: Vec<AgentId>) -> Conflict<View> {
        let vt = ViewTransition::new(SensorId(1))
            .with_view(1, view)
            .with_view(2, Vec::new());
        Conflict::new(Goal::new("g"), agents, 2, vt)
    }

    fn network() -> NormativeNetwork {
        NormativeNetwork::new(&[Goal::new("g")], 0.5, 10)
    }

    #[test]
    fn synthesises_one_prohibition() {
        let mut generator = CbrNormGenerator::new(0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let c = conflict(vec![("yes", vec!["Go"])], vec![AgentId(0)]);
        let out = generator.generate_norms(&c, &Toy, &language(), &network(), &mut rng);

        let expected = Norm::prohibition(Description::new().with("near_car", "yes"), "Go");
        assert_eq!(out.norms, vec![expected]);
        assert!(matches!(out.outcome, GenerationOutcome::Synthesised(_)));
        assert_eq!(generator.case_base().len(), 1);
    }

    #[test]
    fn identical_conflict_reuses_case() {
        let mut generator = CbrNormGenerator::new(0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let c = conflict(vec![("yes", vec!["Go"])], vec![AgentId(0)]);
        let first = generator.generate_norms(&c, &Toy, &language(), &network(), &mut rng);
        let second = generator.generate_norms(&c, &Toy, &language(), &network(), &mut rng);

        assert_eq!(first.norms, second.norms);
        assert!(matches!(second.outcome, GenerationOutcome::Retrieved(_)));
        assert_eq!(generator.case_base().len(), 1);
    }

    #[test]
    fn identical_case_from_other_agents_is_reused_unchanged() {
        let mut generator = CbrNormGenerator::new(0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let first = conflict(vec![("yes", vec!["Go"])], vec![AgentId(0)]);
        let stored = generator.generate_norms(&first, &Toy, &language(), &network(), &mut rng);

        // another agent, another view, but the same context behind the conflict
        let second = conflict(vec![("no", vec!["Stop"]), ("yes", vec!["Go"])], vec![AgentId(1)]);
        let out = generator.generate_norms(&second, &Toy, &language(), &network(), &mut rng);

        let description = CbrNormGenerator::describe(&second, &Toy).unwrap();
        let case = generator.case_base().find_identical(&description).unwrap();
        assert_eq!(out.outcome, GenerationOutcome::Retrieved(case.id()));
        assert_eq!(out.norms, case.best_solution().unwrap().norms());
        assert_eq!(out.norms, stored.norms);
    }

    #[test]
    fn regulated_context_aborts() {
        let mut generator = CbrNormGenerator::new(0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = network();
        let general = net.add(Norm::prohibition(Description::new().with("near_car", "*"), "Go"));
        net.activate(general).unwrap();

        let c = conflict(vec![("yes", vec!["Go"])], vec![AgentId(0)]);
        let out = generator.generate_norms(&c, &Toy, &language(), &net, &mut rng);
        assert!(out.is_empty());
        assert_eq!(out.outcome, GenerationOutcome::AlreadyRegulated);
        assert!(generator.case_base().is_empty());
    }

    #[test]
    fn non_results_are_empty() {
        let mut generator = CbrNormGenerator::new(0.5);
        let mut rng = StdRng::seed_from_u64(1);
        let lang = language();
        let net = network();

        let no_agent = conflict(vec![("yes", vec!["Go"])], vec![]);
        assert_eq!(
            generator.generate_norms(&no_agent, &Toy, &lang, &net, &mut rng).outcome,
            GenerationOutcome::NoResponsibleAgent
        );

        let idle = conflict(vec![("yes", vec![])], vec![AgentId(0)]);
        assert_eq!(
            generator.generate_norms(&idle, &Toy, &lang, &net, &mut rng).outcome,
            GenerationOutcome::NoActions
        );

        let blind = conflict(vec![("", vec!["Go"])], vec![AgentId(0)]);
        assert_eq!(
            generator.generate_norms(&blind, &Toy, &lang, &net, &mut rng).outcome,
            GenerationOutcome::EmptyContext
        );

        let vt = ViewTransition::new(SensorId(1)).with_view(2, vec![("yes", vec!["Go"])]);
        let sourceless = Conflict::new(Goal::new("g"), vec![AgentId(0)], 2, vt);
        assert_eq!(
            generator.generate_norms(&sourceless, &Toy, &lang, &net, &mut rng).outcome,
            GenerationOutcome::NoSource
        );
        assert!(generator.case_base().is_empty());
    }
}
