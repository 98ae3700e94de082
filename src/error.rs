//! Error types for normsynth.
//!
//! All errors are strongly typed using thiserror. Configuration problems are
//! `ValidationError`s and are surfaced before the first tick runs; lookups that
//! break a caller contract are `ExecutionError`s.

use thiserror::Error;

use crate::network::NodeId;
use crate::utility::EvaluationKey;

/// Validation errors raised while checking configuration and vocabulary.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Neither the builder nor the settings name a strategy.
    #[error("No evaluation strategy set")]
    MissingStrategy,

    /// The engine was built without domain functions.
    #[error("No domain functions set")]
    MissingDomain,

    /// The goal list is empty.
    #[error("At least one system goal must be configured")]
    NoGoals,

    /// A setting breaks a structural rule.
    #[error("Invalid settings: {reason}")]
    InvalidSettings {
        /// What is wrong.
        reason: String,
    },

    /// A numeric setting lies outside its allowed interval.
    #[error("Value {value} for '{field}' is out of range [{min}, {max}]")]
    OutOfRange {
        /// Dotted path of the setting.
        field: String,
        /// Rejected value.
        value: f64,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },

    /// A taxonomy term is duplicated or hangs off an unknown parent.
    #[error("Invalid taxonomy for predicate '{predicate}': {reason}")]
    InvalidTaxonomy {
        /// Predicate the taxonomy describes.
        predicate: String,
        /// What is wrong.
        reason: String,
    },

    /// Settings JSON could not be decoded.
    #[error("Failed to parse settings: {message}")]
    Parse {
        /// Decoder message.
        message: String,
    },
}

/// Execution errors raised while operating on the networks.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// No node carries this id.
    #[error("Node not found: {id}")]
    NodeNotFound {
        /// Missing id.
        id: NodeId,
    },

    /// The edge would make a node its own ancestor.
    #[error("Generalisation {child} -> {parent} would create a cycle")]
    CycleDetected {
        /// Specific end of the rejected edge.
        child: NodeId,
        /// General end of the rejected edge.
        parent: NodeId,
    },

    /// The utility has no range for this `(dimension, goal)` pair.
    #[error("Evaluation {key} is not tracked")]
    UntrackedEvaluation {
        /// Requested slot.
        key: EvaluationKey,
    },

    /// A statistic was read from a range without samples.
    #[error("Performance window is empty")]
    EmptyWindow,
}

/// Top-level error type for normsynth.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Configuration problem.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure while operating on the networks.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl SynthesisError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the error should halt the run.
    ///
    /// Only configuration errors are fatal; everything else degrades to
    /// "no change this tick" for the affected step.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.is_validation()
    }
}

/// Result type alias for normsynth operations.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::{Dimension, Goal};

    #[test]
    fn test_validation_error_out_of_range() {
        let err = ValidationError::OutOfRange {
            field: "learning_rate".to_string(),
            value: 1.5,
            min: 0.0,
            max: 1.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("learning_rate"));
        assert!(msg.contains("1.5"));
    }

    #[test]
    fn test_execution_error_node_not_found() {
        let err = ExecutionError::NodeNotFound { id: NodeId::new(7) };
        assert!(format!("{err}").contains("Node not found: 7"));
    }

    #[test]
    fn test_execution_error_untracked() {
        let key = EvaluationKey::new(Dimension::Necessity, Goal::new("no-collisions"));
        let err = ExecutionError::UntrackedEvaluation { key };
        let msg = format!("{err}");
        assert!(msg.contains("necessity"));
        assert!(msg.contains("no-collisions"));
    }

    #[test]
    fn test_synthesis_error_from_validation() {
        let err: SynthesisError = ValidationError::MissingStrategy.into();
        assert!(err.is_validation());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_synthesis_error_from_execution() {
        let err: SynthesisError = ExecutionError::EmptyWindow.into();
        assert!(err.is_execution());
        assert!(!err.is_fatal());
    }
}
