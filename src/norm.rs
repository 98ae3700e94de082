//! Norm types - the rules being synthesised.
//!
//! A norm is a value: precondition, modality and regulated action. Two norms
//! with the same content are the same norm no matter who built them. The
//! integer id a norm is known by is assigned by the normative network.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::{NetworkNode, NodeId};
use crate::taxonomy::DescriptionLanguage;

/// Identifier of a norm inside a normative network.
pub type NormId = NodeId;

/// An ordered set of predicate/term pairs.
///
/// Used both for norm preconditions and for the local context an agent
/// perceives.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Description(BTreeMap<String, String>);

impl Description {
    /// Empty description; satisfied by every context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, predicate: impl Into<String>, term: impl Into<String>) -> Self {
        self.0.insert(predicate.into(), term.into());
        self
    }

    /// Sets the term of `predicate`, replacing any previous one.
    pub fn insert(&mut self, predicate: impl Into<String>, term: impl Into<String>) {
        self.0.insert(predicate.into(), term.into());
    }

    /// Term of `predicate`, if constrained.
    #[must_use]
    pub fn get(&self, predicate: &str) -> Option<&str> {
        self.0.get(predicate).map(String::as_str)
    }

    /// Number of constrained predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no predicate is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(predicate, term)` pairs in predicate order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    /// Constrained predicates in order.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if both descriptions constrain the same predicates.
    #[must_use]
    pub fn same_predicates(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.keys().all(|k| other.0.contains_key(k))
    }

    /// Returns true if `context` falls within this description.
    ///
    /// Every predicate constrained here must be present in `context` with a
    /// term that this description's term subsumes.
    #[must_use]
    pub fn is_satisfied_by(&self, context: &Self, language: &DescriptionLanguage) -> bool {
        self.iter().all(|(predicate, term)| {
            context
                .get(predicate)
                .is_some_and(|observed| language.subsumes(predicate, term, observed))
        })
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (p, t)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}={t}")?;
        }
        write!(f, "}}")
    }
}

impl<P: Into<String>, T: Into<String>> FromIterator<(P, T)> for Description {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, t)| (p.into(), t.into())).collect())
    }
}

/// Deontic modality of a norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// The action must not be performed.
    Prohibition,
    /// The action must be performed.
    Obligation,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prohibition => write!(f, "prohibition"),
            Self::Obligation => write!(f, "obligation"),
        }
    }
}

/// Whether an agent complied with a norm that applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormCompliance {
    /// The agent behaved as the norm demands.
    Fulfilled,
    /// The agent did not.
    Infringed,
}

impl NormCompliance {
    /// Both outcomes, fulfilled first.
    pub const ALL: [Self; 2] = [Self::Fulfilled, Self::Infringed];

    /// Array index: 0 for fulfilled, 1 for infringed.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Fulfilled => 0,
            Self::Infringed => 1,
        }
    }

    /// One-letter code used in group names.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Fulfilled => 'F',
            Self::Infringed => 'I',
        }
    }
}

/// A behavioural rule: "under `precondition`, `modality`(`action`)".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Norm {
    /// Situations the norm applies in.
    pub precondition: Description,
    /// Whether the action is prohibited or obliged.
    pub modality: Modality,
    /// Regulated action.
    pub action: String,
}

impl Norm {
    /// Creates a norm.
    #[must_use]
    pub fn new(precondition: Description, modality: Modality, action: impl Into<String>) -> Self {
        Self {
            precondition,
            modality,
            action: action.into(),
        }
    }

    /// Creates a prohibition of `action` under `precondition`.
    #[must_use]
    pub fn prohibition(precondition: Description, action: impl Into<String>) -> Self {
        Self::new(precondition, Modality::Prohibition, action)
    }

    /// Creates an obligation to perform `action` under `precondition`.
    #[must_use]
    pub fn obligation(precondition: Description, action: impl Into<String>) -> Self {
        Self::new(precondition, Modality::Obligation, action)
    }

    /// Returns true if both norms regulate the same action the same way.
    #[must_use]
    pub fn same_postcondition(&self, other: &Self) -> bool {
        self.modality == other.modality && self.action == other.action
    }

    /// Returns true if the norm applies to an agent perceiving `context`.
    #[must_use]
    pub fn applies_to(&self, context: &Description, language: &DescriptionLanguage) -> bool {
        self.precondition.is_satisfied_by(context, language)
    }

    /// Judges an agent's behaviour against this norm.
    #[must_use]
    pub fn compliance<S: AsRef<str>>(&self, performed: &[S]) -> NormCompliance {
        let performed = performed.iter().any(|a| a.as_ref() == self.action);
        match (self.modality, performed) {
            (Modality::Prohibition, false) | (Modality::Obligation, true) => {
                NormCompliance::Fulfilled
            }
            (Modality::Prohibition, true) | (Modality::Obligation, false) => {
                NormCompliance::Infringed
            }
        }
    }

    /// Copy of this norm with a different precondition.
    #[must_use]
    pub fn with_precondition(&self, precondition: Description) -> Self {
        Self {
            precondition,
            modality: self.modality,
            action: self.action.clone(),
        }
    }
}

impl fmt::Display for Norm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}({})>", self.precondition, self.modality, self.action)
    }
}

impl NetworkNode for Norm {
    fn label(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::Taxonomy;

    fn language() -> DescriptionLanguage {
        let front = Taxonomy::new("front", "*")
            .with_term("car", "*")
            .and_then(|t| t.with_term("nothing", "*"))
            .unwrap();
        DescriptionLanguage::new().with(front).unwrap()
    }

    #[test]
    fn content_identity() {
        let a = Norm::prohibition(Description::new().with("front", "car"), "Go");
        let b = Norm::prohibition(Description::new().with("front", "car"), "Go");
        let c = Norm::obligation(Description::new().with("front", "car"), "Go");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.same_postcondition(&c));
    }

    #[test]
    fn applicability_uses_subsumption() {
        let lang = language();
        let general = Norm::prohibition(Description::new().with("front", "*"), "Go");
        let specific = Norm::prohibition(Description::new().with("front", "car"), "Go");
        let context = Description::new().with("front", "car").with("left", "nothing");

        assert!(general.applies_to(&context, &lang));
        assert!(specific.applies_to(&context, &lang));

        let other = Description::new().with("front", "nothing");
        assert!(!specific.applies_to(&other, &lang));
        assert!(!specific.applies_to(&Description::new(), &lang));
    }

    #[test]
    fn compliance_by_modality() {
        let prohibition = Norm::prohibition(Description::new(), "Go");
        let obligation = Norm::obligation(Description::new(), "Stop");

        assert_eq!(prohibition.compliance(&["Go"]), NormCompliance::Infringed);
        assert_eq!(prohibition.compliance(&["Stop"]), NormCompliance::Fulfilled);
        assert_eq!(obligation.compliance(&["Stop"]), NormCompliance::Fulfilled);
        assert_eq!(obligation.compliance::<&str>(&[]), NormCompliance::Infringed);
    }

    #[test]
    fn display_is_readable() {
        let n = Norm::prohibition(Description::new().with("left", "car").with("front", "*"), "Go");
        assert_eq!(n.to_string(), "<{front=*, left=car}, prohibition(Go)>");
    }

    #[test]
    fn description_serialization() {
        let d = Description::new().with("front", "car");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, r#"{"front":"car"}"#);
        let back: Description = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
