//! Evaluation: compliance bookkeeping, classification and substitutability.

pub mod classifier;
pub mod compliance;
pub mod substitutability;

pub use classifier::{
    classify_utility, AverageClassifier, BoundaryClassifier, ClassificationPolicy, NodeClassification,
    SlotClassification, Verdict,
};
pub use compliance::{GroupOutcomes, NormComplianceOutcomes, OutcomeTable};
pub use substitutability::{minkowski_distance, SubstitutabilityDetector};

/// Exponential score update: `(1 - rate) * score + rate * reward`.
#[must_use]
pub fn blend(score: f64, reward: f64, rate: f64) -> f64 {
    (1.0 - rate) * score + rate * reward
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_moves_towards_reward() {
        assert!((blend(0.5, 1.0, 0.1) - 0.55).abs() < 1e-12);
        assert!((blend(0.5, 0.0, 1.0)).abs() < 1e-12);
        assert!((blend(0.3, 0.3, 0.4) - 0.3).abs() < 1e-12);
    }
}
