//! A small traffic domain shared by the integration tests.
//!
//! Every car sees what is in front of it. Going while something is in front
//! is a collision. Cars obey the represented norms that apply to them, except
//! on the ticks a `TrafficSim` marks as disobedient.

#![allow(dead_code)]

use normsynth::{
    AgentId, Conflict, Description, DescriptionLanguage, DomainFunctions, Goal, Modality, NormSynthesisEngine,
    NormativeNetwork, SensorId, Settings, StrategyKind, Taxonomy, TickReport, ViewTransition,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub context: Description,
    pub action: &'static str,
    pub collided: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Road {
    pub cars: Vec<Car>,
}

#[derive(Debug, Clone, Copy)]
pub struct Traffic;

impl DomainFunctions for Traffic {
    type View = Road;

    fn agents(&self, view: &Road) -> Vec<AgentId> {
        (0..view.cars.len() as u64).map(AgentId).collect()
    }

    fn agent_context(&self, agent: AgentId, view: &Road) -> Option<Description> {
        view.cars.get(agent.0 as usize).map(|c| c.context.clone())
    }

    fn agent_actions(&self, agent: AgentId, transition: &ViewTransition<Road>) -> Vec<String> {
        transition
            .source_step()
            .and_then(|s| transition.view(s))
            .and_then(|v| v.cars.get(agent.0 as usize))
            .map(|c| vec![c.action.to_string()])
            .unwrap_or_default()
    }

    fn conflicts(&self, goal: &Goal, transition: &ViewTransition<Road>) -> Vec<Conflict<Road>> {
        let Some(step) = transition.target_step() else {
            return Vec::new();
        };
        let Some(view) = transition.view(step) else {
            return Vec::new();
        };
        let crashed: Vec<AgentId> = self
            .agents(view)
            .into_iter()
            .filter(|a| self.has_conflict(view, *a, goal))
            .collect();
        if crashed.is_empty() {
            return Vec::new();
        }
        vec![Conflict::new(goal.clone(), crashed, step, transition.clone())]
    }

    fn has_conflict(&self, view: &Road, agent: AgentId, _goal: &Goal) -> bool {
        view.cars.get(agent.0 as usize).is_some_and(|c| c.collided)
    }

    fn perceived_agents(&self, agent: AgentId, view: &Road) -> Vec<AgentId> {
        self.agents(view).into_iter().filter(|a| *a != agent).collect()
    }
}

/// `front`: `*` > {vehicle > {car, bike}, nothing}; `near_car`: `*` > {yes, no}.
pub fn language() -> DescriptionLanguage {
    let front = Taxonomy::new("front", "*")
        .with_term("vehicle", "*")
        .and_then(|t| t.with_term("car", "vehicle"))
        .and_then(|t| t.with_term("bike", "vehicle"))
        .and_then(|t| t.with_term("nothing", "*"))
        .unwrap();
    let near_car = Taxonomy::new("near_car", "*")
        .with_term("yes", "*")
        .and_then(|t| t.with_term("no", "*"))
        .unwrap();
    DescriptionLanguage::new()
        .with(front)
        .and_then(|l| l.with(near_car))
        .unwrap()
}

pub fn front(term: &str) -> Description {
    Description::new().with("front", term)
}

fn collides(context: &Description, action: &str) -> bool {
    action == "Go" && (matches!(context.get("front"), Some("car" | "bike")) || context.get("near_car") == Some("yes"))
}

/// Transition from `step - 1` (contexts and actions) to `step` (collisions).
pub fn transition(cars: &[(Description, &'static str)], step: u64) -> ViewTransition<Road> {
    let source = Road {
        cars: cars
            .iter()
            .map(|(context, action)| Car {
                context: context.clone(),
                action: *action,
                collided: false,
            })
            .collect(),
    };
    let target = Road {
        cars: source
            .cars
            .iter()
            .map(|c| Car {
                collided: collides(&c.context, c.action),
                ..c.clone()
            })
            .collect(),
    };
    ViewTransition::new(SensorId(1))
        .with_view(step - 1, source)
        .with_view(step, target)
}

/// Transition with the collisions given per car instead of derived.
pub fn scripted(cars: &[(Description, &'static str, bool)], step: u64) -> ViewTransition<Road> {
    let road = |collided: fn(bool) -> bool| Road {
        cars: cars
            .iter()
            .map(|(context, action, crash)| Car {
                context: context.clone(),
                action: *action,
                collided: collided(*crash),
            })
            .collect(),
    };
    ViewTransition::new(SensorId(1))
        .with_view(step - 1, road(|_| false))
        .with_view(step, road(|crash| crash))
}

/// Replays the same situations every tick.
#[derive(Debug, Clone)]
pub struct TrafficSim {
    pub situations: Vec<Description>,
    /// Every car with `(step + index) % n == 0` ignores the norms.
    pub disobey_every: Option<u64>,
}

impl TrafficSim {
    pub fn obedient() -> Self {
        Self {
            situations: vec![front("car"), front("bike"), front("nothing")],
            disobey_every: None,
        }
    }

    pub fn unruly(n: u64) -> Self {
        Self {
            disobey_every: Some(n),
            ..Self::obedient()
        }
    }

    fn action(
        &self,
        step: u64,
        index: u64,
        context: &Description,
        network: &NormativeNetwork,
        language: &DescriptionLanguage,
    ) -> &'static str {
        if self.disobey_every.is_some_and(|n| (step + index) % n == 0) {
            return "Go";
        }
        let prohibited = network
            .applicable_norms(context, language, true)
            .into_iter()
            .filter_map(|id| network.get(id).ok())
            .any(|n| n.modality == Modality::Prohibition && n.action == "Go");
        if prohibited {
            "Stop"
        } else {
            "Go"
        }
    }

    pub fn step(&self, step: u64, network: &NormativeNetwork, language: &DescriptionLanguage) -> ViewTransition<Road> {
        let cars: Vec<(Description, &'static str)> = self
            .situations
            .iter()
            .zip(0u64..)
            .map(|(context, index)| (context.clone(), self.action(step, index, context, network, language)))
            .collect();
        transition(&cars, step)
    }
}

pub fn engine(strategy: StrategyKind, seed: u64) -> NormSynthesisEngine<Traffic> {
    init_tracing();
    NormSynthesisEngine::builder()
        .settings(Settings {
            seed,
            ..Settings::default()
        })
        .language(language())
        .domain(Traffic)
        .strategy(strategy)
        .build()
        .unwrap()
}

/// Runs `ticks` ticks of `sim` and returns every report.
pub fn run(engine: &mut NormSynthesisEngine<Traffic>, sim: &TrafficSim, ticks: u64) -> Vec<TickReport> {
    let mut reports = Vec::new();
    for _ in 0..ticks {
        let vt = sim.step(engine.ticks() + 1, engine.normative_network(), engine.language());
        reports.push(engine.tick(&[vt]).unwrap());
    }
    reports
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
