//! Classification of evaluated nodes.
//!
//! A policy reads one performance range against one slot's boundaries and
//! answers, for both the specialisation and the generalisation boundary,
//! whether the node is clearly above, clearly below, or inside the hysteresis
//! band. Inside the band no tag changes.

use std::fmt;

use crate::config::{Boundaries, Settings};
use crate::error::ExecutionError;
use crate::network::NodeAttribute;
use crate::utility::{Dimension, PerformanceRange, Utility};

/// Position of a series relative to one boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Clearly above the boundary.
    Above,
    /// Clearly below the boundary.
    Below,
    /// Within ε of the boundary.
    Undecided,
}

/// Verdicts of one `(dimension, goal)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClassification {
    /// Against the specialisation boundary.
    pub performance: Verdict,
    /// Against the generalisation boundary.
    pub generalisation: Verdict,
}

/// Thresholding rule used by a strategy.
pub trait ClassificationPolicy: fmt::Debug {
    /// Short stable identifier for logging.
    fn name(&self) -> &'static str;

    /// Classifies a non-empty range.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::EmptyWindow` for a range without samples.
    fn classify(&self, range: &PerformanceRange, boundaries: &Boundaries) -> Result<SlotClassification, ExecutionError>;
}

/// Compares the moving average with `boundary ± ε`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageClassifier;

impl ClassificationPolicy for AverageClassifier {
    fn name(&self) -> &'static str {
        "average"
    }

    fn classify(&self, range: &PerformanceRange, b: &Boundaries) -> Result<SlotClassification, ExecutionError> {
        let avg = range.current_average()?;
        let verdict = |boundary: f64| {
            if avg >= boundary + b.epsilon {
                Verdict::Above
            } else if avg < boundary - b.epsilon {
                Verdict::Below
            } else {
                Verdict::Undecided
            }
        };
        Ok(SlotClassification {
            performance: verdict(b.specialisation),
            generalisation: verdict(b.generalisation),
        })
    }
}

/// Uses the deviation band: a node is above when even its bottom series is
/// within ε of the boundary, and below when even its top series is more
/// than ε under it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryClassifier;

impl ClassificationPolicy for BoundaryClassifier {
    fn name(&self) -> &'static str {
        "boundary"
    }

    fn classify(&self, range: &PerformanceRange, b: &Boundaries) -> Result<SlotClassification, ExecutionError> {
        let top = range.current_top()?;
        let bottom = range.current_bottom()?;
        let verdict = |boundary: f64| {
            if bottom >= boundary - b.epsilon {
                Verdict::Above
            } else if top < boundary - b.epsilon {
                Verdict::Below
            } else {
                Verdict::Undecided
            }
        };
        Ok(SlotClassification {
            performance: verdict(b.specialisation),
            generalisation: verdict(b.generalisation),
        })
    }
}

/// Aggregated classification of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeClassification {
    /// Tags to assign; duals are dropped by the network.
    pub tags: Vec<NodeAttribute>,
    /// Number of slots with enough samples to be judged.
    pub evaluated_slots: usize,
}

/// Classifies every slot of `utility` that has at least
/// `settings.min_evaluations` samples.
///
/// Per dimension, one slot below the specialisation boundary makes the node
/// Ineffective/Unnecessary; otherwise one slot above makes it
/// Effective/Necessary. The node is Generalisable only when every slot has
/// been judged and is above the generalisation boundary, and
/// NotGeneralisable when any judged slot is below.
pub fn classify_utility(
    policy: &dyn ClassificationPolicy,
    utility: &Utility,
    settings: &Settings,
) -> Result<NodeClassification, ExecutionError> {
    let mut out = NodeClassification::default();
    let mut below = [false; 2];
    let mut above = [false; 2];
    let mut all_generalisable = true;
    let mut any_not_generalisable = false;

    for key in utility.keys() {
        let range = utility.performance_range(key)?;
        if range.num_sliding_values() < settings.min_evaluations {
            // an unjudged slot still sits at or below its default score
            all_generalisable = false;
            continue;
        }
        let slot = policy.classify(range, &settings.boundaries_for(key))?;
        out.evaluated_slots += 1;
        let d = dimension_index(key.dimension);
        match slot.performance {
            Verdict::Below => below[d] = true,
            Verdict::Above => above[d] = true,
            Verdict::Undecided => {}
        }
        match slot.generalisation {
            Verdict::Above => {}
            Verdict::Below => {
                any_not_generalisable = true;
                all_generalisable = false;
            }
            Verdict::Undecided => all_generalisable = false,
        }
    }

    for dimension in Dimension::ALL {
        let d = dimension_index(dimension);
        let (good, bad) = match dimension {
            Dimension::Effectiveness => (NodeAttribute::Effective, NodeAttribute::Ineffective),
            Dimension::Necessity => (NodeAttribute::Necessary, NodeAttribute::Unnecessary),
        };
        if below[d] {
            out.tags.push(bad);
        } else if above[d] {
            out.tags.push(good);
        }
    }
    if any_not_generalisable {
        out.tags.push(NodeAttribute::NotGeneralisable);
    } else if all_generalisable && out.evaluated_slots > 0 {
        out.tags.push(NodeAttribute::Generalisable);
    }
    Ok(out)
}

const fn dimension_index(dimension: Dimension) -> usize {
    match dimension {
        Dimension::Effectiveness => 0,
        Dimension::Necessity => 1,
    }
}
