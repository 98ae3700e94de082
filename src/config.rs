//! Engine settings.
//!
//! Settings are plain serde data so integrators can load them from JSON. They
//! must be validated before an engine is built; `from_json_str` does both.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::utility::{Dimension, EvaluationKey, Goal};

/// Which synthesis strategy drives classification and adaptation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Pairwise intersection, average-based classification.
    Iron,
    /// Pairwise intersection, boundary-based classification.
    Simon,
    /// Context-tree generalisation, boundary-based classification.
    Lion,
    /// SIMON plus substitutability detection over norm groups.
    Xsimon,
}

impl StrategyKind {
    /// Short stable identifier for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Iron => "iron",
            Self::Simon => "simon",
            Self::Lion => "lion",
            Self::Xsimon => "xsimon",
        }
    }
}

/// How the intersection reasoner compares two differing terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneralisationMode {
    /// Differing terms are simply different.
    Shallow,
    /// Terms related by subsumption count as shared.
    Deep,
}

/// Classification thresholds of one `(dimension, goal)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries {
    /// Scores above this make a norm a generalisation candidate.
    pub generalisation: f64,
    /// Scores below this make a norm a specialisation candidate.
    pub specialisation: f64,
    /// Hysteresis margin around both boundaries.
    pub epsilon: f64,
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            generalisation: 0.7,
            specialisation: 0.3,
            epsilon: 0.05,
        }
    }
}

impl Boundaries {
    fn validate(&self, context: &str) -> Result<(), ValidationError> {
        unit_interval(&format!("{context}.generalisation"), self.generalisation)?;
        unit_interval(&format!("{context}.specialisation"), self.specialisation)?;
        unit_interval(&format!("{context}.epsilon"), self.epsilon)?;
        Ok(())
    }
}

/// Boundaries that replace the defaults for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryOverride {
    /// Dimension of the overridden slot.
    pub dimension: Dimension,
    /// Goal of the overridden slot.
    pub goal: Goal,
    /// Boundaries used instead of the defaults.
    pub boundaries: Boundaries,
}

/// Parameters of the substitutability test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstitutabilitySettings {
    /// Fewer aligned samples than this never count as similar.
    pub min_samples: usize,
    /// Maximum Minkowski (p = 2) distance between similar series.
    pub threshold: f64,
    /// Number of most recent samples compared.
    pub window: usize,
}

impl Default for SubstitutabilitySettings {
    fn default() -> Self {
        Self {
            min_samples: 25,
            threshold: 1.5,
            window: 50,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed of the engine's random source.
    pub seed: u64,
    /// System goals norms are evaluated against.
    pub goals: Vec<Goal>,
    /// Initial score of every evaluation slot.
    pub default_utility: f64,
    /// Weight of a new reward in the score update.
    pub learning_rate: f64,
    /// Sliding window size of performance ranges.
    pub performance_window: usize,
    /// Strategy; must be set here or on the engine builder.
    pub strategy: Option<StrategyKind>,
    /// How intersection reasoning chooses parents.
    pub generalisation_mode: GeneralisationMode,
    /// Maximum number of differing predicates a generalisation may bridge.
    pub generalisation_step: usize,
    /// Boundaries of every slot without an override.
    pub default_boundaries: Boundaries,
    /// Per-slot boundary overrides.
    pub boundaries: Vec<BoundaryOverride>,
    /// Samples a slot needs before it is classified.
    pub min_evaluations: usize,
    /// Unchanged ticks after which a run counts as converged.
    pub convergence_ticks: usize,
    /// Norm group comparison parameters.
    pub substitutability: SubstitutabilitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0,
            goals: vec![Goal::new("no-conflicts")],
            default_utility: 0.5,
            learning_rate: 0.1,
            performance_window: 50,
            strategy: None,
            generalisation_mode: GeneralisationMode::Deep,
            generalisation_step: 1,
            default_boundaries: Boundaries::default(),
            boundaries: Vec::new(),
            min_evaluations: 5,
            convergence_ticks: 100,
            substitutability: SubstitutabilitySettings::default(),
        }
    }
}

impl Settings {
    /// Parses and validates settings from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Parse` for malformed JSON and any error from
    /// [`Settings::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ValidationError> {
        let settings: Self = serde_json::from_str(json).map_err(|e| ValidationError::Parse {
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates settings.
    ///
    /// This must be called before constructing an engine.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.goals.is_empty() {
            return Err(ValidationError::NoGoals);
        }
        for (i, goal) in self.goals.iter().enumerate() {
            if goal.name().trim().is_empty() {
                return Err(invalid("goal names cannot be empty"));
            }
            if self.goals[..i].contains(goal) {
                return Err(invalid(format!("goal '{goal}' configured twice")));
            }
        }
        unit_interval("default_utility", self.default_utility)?;
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(ValidationError::OutOfRange {
                field: "learning_rate".to_string(),
                value: self.learning_rate,
                min: f64::EPSILON,
                max: 1.0,
            });
        }
        if self.performance_window == 0 {
            return Err(invalid("performance_window must be > 0"));
        }
        if self.generalisation_step == 0 {
            return Err(invalid("generalisation_step must be > 0"));
        }
        if self.min_evaluations == 0 {
            return Err(invalid("min_evaluations must be > 0"));
        }
        if self.convergence_ticks == 0 {
            return Err(invalid("convergence_ticks must be > 0"));
        }
        self.default_boundaries.validate("default_boundaries")?;
        for o in &self.boundaries {
            if !self.goals.contains(&o.goal) {
                return Err(invalid(format!("boundaries configured for unknown goal '{}'", o.goal)));
            }
            o.boundaries.validate(&format!("boundaries[{}/{}]", o.dimension, o.goal))?;
        }
        let sub = &self.substitutability;
        if sub.min_samples == 0 {
            return Err(invalid("substitutability.min_samples must be > 0"));
        }
        if sub.window < sub.min_samples {
            return Err(invalid("substitutability.window must be >= min_samples"));
        }
        if !(sub.threshold.is_finite() && sub.threshold >= 0.0) {
            return Err(invalid("substitutability.threshold must be a non-negative number"));
        }
        Ok(())
    }

    /// Boundaries of one slot: the override if configured, else the defaults.
    #[must_use]
    pub fn boundaries_for(&self, key: &EvaluationKey) -> Boundaries {
        self.boundaries
            .iter()
            .find(|o| o.dimension == key.dimension && o.goal == key.goal)
            .map_or(self.default_boundaries, |o| o.boundaries)
    }

    /// Builder-style override of one slot's boundaries.
    #[must_use]
    pub fn with_boundaries(mut self, dimension: Dimension, goal: Goal, boundaries: Boundaries) -> Self {
        self.boundaries
            .retain(|o| !(o.dimension == dimension && o.goal == goal));
        self.boundaries.push(BoundaryOverride {
            dimension,
            goal,
            boundaries,
        });
        self
    }
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidSettings {
        reason: reason.into(),
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}
