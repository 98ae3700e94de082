//! Multi-dimensional utility of networks nodes.
//!
//! A node is scored along evaluation dimensions, once per system goal. Each
//! `(dimension, goal)` pair owns its own score and `PerformanceRange`.

mod performance;

pub use performance::PerformanceRange;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// A system goal the norms are meant to protect (e.g. "no collisions").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goal(String);

impl Goal {
    /// Creates a goal.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Goal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evaluation dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Fulfilling the norm avoids conflicts.
    Effectiveness,
    /// Infringing the norm leads to conflicts.
    Necessity,
}

impl Dimension {
    /// Both dimensions, Effectiveness first.
    pub const ALL: [Self; 2] = [Self::Effectiveness, Self::Necessity];
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Effectiveness => write!(f, "effectiveness"),
            Self::Necessity => write!(f, "necessity"),
        }
    }
}

/// One `(dimension, goal)` evaluation slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvaluationKey {
    /// What is measured.
    pub dimension: Dimension,
    /// Goal it is measured against.
    pub goal: Goal,
}

impl EvaluationKey {
    /// Creates a key.
    #[must_use]
    pub fn new(dimension: Dimension, goal: Goal) -> Self {
        Self { dimension, goal }
    }

    /// Every dimension in `dimensions` crossed with every goal.
    #[must_use]
    pub fn cross(dimensions: &[Dimension], goals: &[Goal]) -> Vec<Self> {
        dimensions
            .iter()
            .flat_map(|d| goals.iter().map(move |g| Self::new(*d, g.clone())))
            .collect()
    }
}

impl fmt::Display for EvaluationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dimension, self.goal)
    }
}

/// Scores and performance ranges of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utility {
    default_score: f64,
    capacity: usize,
    scores: BTreeMap<EvaluationKey, f64>,
    ranges: BTreeMap<EvaluationKey, PerformanceRange>,
}

impl Utility {
    /// Creates a utility tracking `keys`, every score at `default_score`.
    #[must_use]
    pub fn new(keys: impl IntoIterator<Item = EvaluationKey>, default_score: f64, capacity: usize) -> Self {
        let default_score = default_score.clamp(0.0, 1.0);
        let mut scores = BTreeMap::new();
        let mut ranges = BTreeMap::new();
        for key in keys {
            scores.insert(key.clone(), default_score);
            ranges.insert(key, PerformanceRange::new(capacity));
        }
        Self {
            default_score,
            capacity,
            scores,
            ranges,
        }
    }

    /// Discards all history and restores every score to the default.
    pub fn reset(&mut self) {
        for score in self.scores.values_mut() {
            *score = self.default_score;
        }
        for range in self.ranges.values_mut() {
            *range = PerformanceRange::new(self.capacity);
        }
    }

    /// Writes the instantaneous score and feeds it to the performance range.
    ///
    /// Scores are clamped to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::UntrackedEvaluation` for an unknown key.
    pub fn set_score(&mut self, key: &EvaluationKey, score: f64) -> Result<(), ExecutionError> {
        let score = if score.is_nan() { self.default_score } else { score.clamp(0.0, 1.0) };
        let (Some(slot), Some(range)) = (self.scores.get_mut(key), self.ranges.get_mut(key)) else {
            return Err(untracked(key));
        };
        *slot = score;
        range.add_value(score);
        Ok(())
    }

    /// Current instantaneous score.
    pub fn score(&self, key: &EvaluationKey) -> Result<f64, ExecutionError> {
        self.scores.get(key).copied().ok_or_else(|| untracked(key))
    }

    /// Moving average of the score.
    ///
    /// # Errors
    ///
    /// Fails for an unknown key or when no score was recorded since the last
    /// reset.
    pub fn score_average(&self, key: &EvaluationKey) -> Result<f64, ExecutionError> {
        self.performance_range(key)?.current_average()
    }

    /// Full series of one slot.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::UntrackedEvaluation` for a slot this utility does not track.
    pub fn performance_range(&self, key: &EvaluationKey) -> Result<&PerformanceRange, ExecutionError> {
        self.ranges.get(key).ok_or_else(|| untracked(key))
    }

    /// Returns true if the slot is tracked.
    #[must_use]
    pub fn is_tracked(&self, key: &EvaluationKey) -> bool {
        self.ranges.contains_key(key)
    }

    /// Tracked slots in order.
    pub fn keys(&self) -> impl Iterator<Item = &EvaluationKey> {
        self.ranges.keys()
    }

    /// Score every slot starts from.
    #[must_use]
    pub const fn default_score(&self) -> f64 {
        self.default_score
    }

    /// Returns true if any key has at least one sample.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.ranges.values().any(|r| r.num_sliding_values() > 0)
    }

    /// Mean of the current averages over every evaluated key.
    ///
    /// Falls back to the default score for a node that was never evaluated.
    #[must_use]
    pub fn overall_average(&self) -> f64 {
        let averages: Vec<f64> = self
            .ranges
            .values()
            .filter_map(|r| r.current_average().ok())
            .collect();
        if averages.is_empty() {
            return self.default_score;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = averages.len() as f64;
        averages.iter().sum::<f64>() / n
    }
}

fn untracked(key: &EvaluationKey) -> ExecutionError {
    ExecutionError::UntrackedEvaluation { key: key.clone() }
}
