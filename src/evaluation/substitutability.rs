//! Detection of redundant norm pairs from their joint outcomes.

use tracing::debug;

use crate::config::{Settings, SubstitutabilitySettings};
use crate::error::ExecutionError;
use crate::network::{NormGroupCombination, NormGroupNetwork, NormativeNetwork};
use crate::norm::{NormCompliance, NormId};
use crate::utility::{Dimension, EvaluationKey, PerformanceRange};

/// Minkowski distance of order `p` between two equally long series.
///
/// Only the common prefix is compared if the lengths differ.
#[must_use]
pub fn minkowski_distance(a: &[f64], b: &[f64], p: f64) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs().powf(p))
        .sum::<f64>()
        .powf(1.0 / p)
}

/// Compares trend series of norm groups.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutabilityDetector {
    settings: SubstitutabilitySettings,
}

impl SubstitutabilityDetector {
    /// Creates a detector with the given comparison parameters.
    #[must_use]
    pub fn new(settings: SubstitutabilitySettings) -> Self {
        Self { settings }
    }

    /// Returns true if the most recent aligned samples of both series are
    /// within the distance threshold. Too few samples are never similar.
    #[must_use]
    pub fn similar(&self, a: &[f64], b: &[f64]) -> bool {
        let n = a.len().min(b.len()).min(self.settings.window);
        if n < self.settings.min_samples {
            return false;
        }
        let a = &a[a.len() - n..];
        let b = &b[b.len() - n..];
        minkowski_distance(a, b, 2.0) <= self.settings.threshold
    }

    /// Average, top and bottom histories are each similar.
    #[must_use]
    pub fn similar_ranges(&self, a: &PerformanceRange, b: &PerformanceRange) -> bool {
        self.similar(a.averages(), b.averages())
            && self.similar(a.tops(), b.tops())
            && self.similar(a.bottoms(), b.bottoms())
    }

    /// Judges one combination.
    ///
    /// `None` until all four groups exist and FF, FI and IF each hold
    /// `min_samples` Effectiveness samples for every goal. Then the pair is
    /// substitutable when the FF group does not under-perform on any goal
    /// and the FI and IF groups trend like FF on every goal.
    pub fn assess(
        &self,
        combination: &NormGroupCombination,
        groups: &NormGroupNetwork,
        settings: &Settings,
    ) -> Result<Option<bool>, ExecutionError> {
        use NormCompliance::{Fulfilled as F, Infringed as I};

        if !combination.contains_all_combinations() {
            return Ok(None);
        }
        let (Some(ff), Some(fi), Some(fif)) = (combination.get(F, F), combination.get(F, I), combination.get(I, F))
        else {
            return Ok(None);
        };
        let ff = groups.utility(ff)?;
        let fi = groups.utility(fi)?;
        let fif = groups.utility(fif)?;

        let mut substitutable = true;
        for goal in &settings.goals {
            let key = EvaluationKey::new(Dimension::Effectiveness, goal.clone());
            let ff_range = ff.performance_range(&key)?;
            let fi_range = fi.performance_range(&key)?;
            let if_range = fif.performance_range(&key)?;
            if [ff_range, fi_range, if_range]
                .iter()
                .any(|r| r.num_values() < self.settings.min_samples)
            {
                return Ok(None);
            }
            if ff_range.current_average()? < settings.boundaries_for(&key).specialisation
                || !self.similar_ranges(fi_range, ff_range)
                || !self.similar_ranges(if_range, ff_range)
            {
                substitutable = false;
            }
        }
        Ok(Some(substitutable))
    }

    /// Returns true if [`assess`](Self::assess) judges the combination
    /// substitutable.
    pub fn is_substitutable(
        &self,
        combination: &NormGroupCombination,
        groups: &NormGroupNetwork,
        settings: &Settings,
    ) -> Result<bool, ExecutionError> {
        Ok(self.assess(combination, groups, settings)? == Some(true))
    }

    /// Every judgeable norm pair with its verdict, ascending. Pairs already
    /// marked substitutable in `normative` are skipped.
    pub fn assess_all(
        &self,
        groups: &NormGroupNetwork,
        normative: &NormativeNetwork,
        settings: &Settings,
    ) -> Result<Vec<((NormId, NormId), bool)>, ExecutionError> {
        let mut judged = Vec::new();
        for combination in groups.combinations() {
            let (a, b) = combination.pair();
            if normative.are_substitutable(a, b) {
                continue;
            }
            if let Some(substitutable) = self.assess(combination, groups, settings)? {
                if substitutable {
                    debug!(norm_a = %a, norm_b = %b, "substitutable pair");
                }
                judged.push(((a, b), substitutable));
            }
        }
        Ok(judged)
    }

    /// Norm pairs that became substitutable, ascending.
    pub fn detect(
        &self,
        groups: &NormGroupNetwork,
        normative: &NormativeNetwork,
        settings: &Settings,
    ) -> Result<Vec<(NormId, NormId)>, ExecutionError> {
        Ok(self
            .assess_all(groups, normative, settings)?
            .into_iter()
            .filter_map(|(pair, substitutable)| substitutable.then_some(pair))
            .collect())
    }
}
