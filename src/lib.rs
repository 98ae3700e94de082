//! # normsynth - online norm synthesis for multi-agent systems
//!
//! normsynth watches a multi-agent system tick by tick and keeps a set of
//! norms (prohibitions and obligations over agent actions) that steers the
//! agents away from conflicts.
//!
//! ## Core Concepts
//!
//! - **Norm**: `<precondition, modality(action)>` where the precondition is a
//!   description over a taxonomy-backed language
//! - **Normative network**: every norm ever created, linked by generalisation;
//!   the represented nodes form the normative system
//! - **Utility**: per-goal effectiveness and necessity scores with a sliding
//!   performance range
//! - **Strategy**: IRON, SIMON, LION or XSIMON, selecting the generalisation
//!   reasoner, the classification policy and substitutability detection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use normsynth::{NormSynthesisEngine, Settings, StrategyKind};
//!
//! let mut engine = NormSynthesisEngine::builder()
//!     .settings(Settings::from_json_str(&config)?)
//!     .language(language)
//!     .domain(MyDomain::new())
//!     .strategy(StrategyKind::Simon)
//!     .build()?;
//!
//! let report = engine.tick(&transitions)?;
//! for norm in report.normative_system.norms() {
//!     println!("{norm}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Vocabulary
pub mod error;
pub mod norm;
pub mod taxonomy;
pub mod utility;

// State
pub mod cbr;
pub mod config;
pub mod network;
pub mod perception;
pub mod system;

// Reasoning and the tick cycle
pub mod engine;
pub mod evaluation;
pub mod reasoning;

pub use cbr::{CaseBase, CaseDescription, CaseId, CbrNormGenerator, GenerationOutcome};
pub use config::{Boundaries, GeneralisationMode, Settings, StrategyKind, SubstitutabilitySettings};
pub use engine::{NormSynthesisEngine, NormSynthesisEngineBuilder};
pub use error::{ExecutionError, SynthesisError, SynthesisResult, ValidationError};
pub use network::{NodeAttribute, NodeId, NodeState, NormGroupNetwork, NormativeNetwork};
pub use norm::{Description, Modality, Norm, NormCompliance, NormId};
pub use perception::{AgentId, Conflict, DomainFunctions, Monitor, Sensor, SensorId, ViewTransition};
pub use system::{ConvergenceTracker, NormativeSystem, RegulatedNorm, TickReport};
pub use taxonomy::{DescriptionLanguage, Taxonomy};
pub use utility::{Dimension, EvaluationKey, Goal, PerformanceRange, Utility};
