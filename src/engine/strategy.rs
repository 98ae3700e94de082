//! Strategy wiring: one reasoner, one classification policy and optional
//! substitutability detection per `StrategyKind`.

use crate::config::{Settings, StrategyKind};
use crate::evaluation::{AverageClassifier, BoundaryClassifier, ClassificationPolicy, SubstitutabilityDetector};
use crate::reasoning::{ContextTreeReasoner, GeneralisationReasoner, IntersectionReasoner};

/// The interchangeable parts the tick cycle is run with.
#[derive(Debug)]
pub struct Strategy {
    kind: StrategyKind,
    reasoner: Box<dyn GeneralisationReasoner>,
    classifier: Box<dyn ClassificationPolicy>,
    detector: Option<SubstitutabilityDetector>,
}

impl Strategy {
    /// Builds the parts of `kind` from validated settings.
    #[must_use]
    pub fn new(kind: StrategyKind, settings: &Settings) -> Self {
        let reasoner: Box<dyn GeneralisationReasoner> = match kind {
            StrategyKind::Lion => Box::new(ContextTreeReasoner::new()),
            StrategyKind::Iron | StrategyKind::Simon | StrategyKind::Xsimon => Box::new(IntersectionReasoner::new(
                settings.generalisation_mode,
                settings.generalisation_step,
            )),
        };
        let classifier: Box<dyn ClassificationPolicy> = match kind {
            StrategyKind::Iron => Box::new(AverageClassifier),
            StrategyKind::Simon | StrategyKind::Lion | StrategyKind::Xsimon => Box::new(BoundaryClassifier),
        };
        let detector = (kind == StrategyKind::Xsimon).then(|| SubstitutabilityDetector::new(settings.substitutability));
        Self {
            kind,
            reasoner,
            classifier,
            detector,
        }
    }

    /// Which strategy these parts implement.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Thresholding rule for classification.
    #[must_use]
    pub fn classifier(&self) -> &dyn ClassificationPolicy {
        self.classifier.as_ref()
    }

    /// Generalisation reasoner; proposals may update its state.
    pub fn reasoner_mut(&mut self) -> &mut dyn GeneralisationReasoner {
        self.reasoner.as_mut()
    }

    /// Name of the reasoner, for logs.
    #[must_use]
    pub fn reasoner_name(&self) -> &'static str {
        self.reasoner.name()
    }

    /// Detector, when the strategy tracks norm groups.
    #[must_use]
    pub fn detector(&self) -> Option<SubstitutabilityDetector> {
        self.detector
    }

    /// Returns true if norm groups are observed and compared.
    #[must_use]
    pub fn tracks_substitutability(&self) -> bool {
        self.detector.is_some()
    }
}
