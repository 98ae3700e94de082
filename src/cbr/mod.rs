//! Case-based reasoning memory.
//!
//! A case maps the shape of a conflict (its `CaseDescription`) to the norms
//! that were proposed for it. Cases are never removed; solutions are rescored
//! as the norms they contain are evaluated.

mod generator;

pub use generator::{CbrNormGenerator, GeneratedNorms, GenerationOutcome};

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::norm::{Description, Norm};
use crate::utility::Goal;

/// Identifier of a case inside one case base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(u64);

impl CaseId {
    /// Raw sequence number, starting at 1.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// Signature of a conflict: the goal violated and what each conflicting agent
/// perceived just before it. Contexts are kept sorted so agent identity does
/// not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseDescription {
    goal: Goal,
    contexts: Vec<Description>,
}

impl CaseDescription {
    /// Creates a description; contexts are sorted.
    #[must_use]
    pub fn new(goal: Goal, mut contexts: Vec<Description>) -> Self {
        contexts.sort();
        Self { goal, contexts }
    }

    /// Goal the conflict violated.
    #[must_use]
    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    /// Sorted source contexts of the conflicting agents.
    #[must_use]
    pub fn contexts(&self) -> &[Description] {
        &self.contexts
    }

    /// Number of differences between two descriptions; 0 means identical.
    ///
    /// A different goal counts once; contexts are compared pairwise in order
    /// and every predicate/term pair present in only one of them counts once;
    /// unmatched contexts count with all their pairs.
    #[must_use]
    pub fn dissimilarity(&self, other: &Self) -> usize {
        let mut distance = usize::from(self.goal != other.goal);
        let longest = self.contexts.len().max(other.contexts.len());
        for i in 0..longest {
            distance += match (self.contexts.get(i), other.contexts.get(i)) {
                (Some(a), Some(b)) => context_distance(a, b),
                (Some(a), None) | (None, Some(a)) => a.len(),
                (None, None) => 0,
            };
        }
        distance
    }

    /// Stable content fingerprint used to index the case base.
    #[must_use]
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.goal.name().as_bytes());
        for context in &self.contexts {
            hasher.update(&[0x1e]);
            for (predicate, term) in context.iter() {
                hasher.update(predicate.as_bytes());
                hasher.update(&[0x1f]);
                hasher.update(term.as_bytes());
                hasher.update(&[0x1d]);
            }
        }
        hasher.finalize()
    }
}

fn context_distance(a: &Description, b: &Description) -> usize {
    let only_a = a.iter().filter(|(p, t)| b.get(p) != Some(*t)).count();
    let only_b = b.iter().filter(|(p, t)| a.get(p) != Some(*t)).count();
    only_a + only_b
}

/// A set of norms proposed for a case, with how well they have worked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSolution {
    norms: Vec<Norm>,
    score: f64,
}

impl CaseSolution {
    /// Creates a solution with an initial score.
    #[must_use]
    pub fn new(norms: Vec<Norm>, score: f64) -> Self {
        Self { norms, score }
    }

    /// Norms proposed together.
    #[must_use]
    pub fn norms(&self) -> &[Norm] {
        &self.norms
    }

    /// Mean Effectiveness of the norms, refreshed every tick.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Returns true if the solution proposes no norm.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }
}

/// One remembered conflict shape and its solutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    id: CaseId,
    description: CaseDescription,
    solutions: Vec<CaseSolution>,
}

impl Case {
    /// Identifier inside the case base.
    #[must_use]
    pub const fn id(&self) -> CaseId {
        self.id
    }

    /// Conflict shape this case remembers.
    #[must_use]
    pub fn description(&self) -> &CaseDescription {
        &self.description
    }

    /// Solutions in the order they were added.
    #[must_use]
    pub fn solutions(&self) -> &[CaseSolution] {
        &self.solutions
    }

    /// Highest-scored solution; the earliest one wins ties.
    #[must_use]
    pub fn best_solution(&self) -> Option<&CaseSolution> {
        let mut best: Option<&CaseSolution> = None;
        for s in &self.solutions {
            if best.map_or(true, |b| s.score > b.score) {
                best = Some(s);
            }
        }
        best
    }
}

/// Memory of every case seen during a run.
#[derive(Debug, Clone)]
pub struct CaseBase {
    cases: Vec<Case>,
    index: HashMap<blake3::Hash, Vec<usize>>,
    default_score: f64,
}

impl CaseBase {
    /// Creates an empty case base. New solutions start at `default_score`.
    #[must_use]
    pub fn new(default_score: f64) -> Self {
        Self {
            cases: Vec::new(),
            index: HashMap::new(),
            default_score,
        }
    }

    /// Records a solution for `description`.
    ///
    /// If an identical case exists the solution is appended to it unless an
    /// equal set of norms is already there.
    pub fn add(&mut self, description: CaseDescription, norms: Vec<Norm>) -> CaseId {
        if let Some(pos) = self.position_of(&description) {
            let case = &mut self.cases[pos];
            if !case.solutions.iter().any(|s| s.norms == norms) {
                case.solutions.push(CaseSolution::new(norms, self.default_score));
            }
            return case.id;
        }
        let id = CaseId(self.cases.len() as u64 + 1);
        let fingerprint = description.fingerprint();
        self.cases.push(Case {
            id,
            description,
            solutions: vec![CaseSolution::new(norms, self.default_score)],
        });
        self.index
            .entry(fingerprint)
            .or_default()
            .push(self.cases.len() - 1);
        id
    }

    fn position_of(&self, description: &CaseDescription) -> Option<usize> {
        self.index
            .get(&description.fingerprint())?
            .iter()
            .copied()
            .find(|pos| self.cases[*pos].description.dissimilarity(description) == 0)
    }

    /// Case whose description has zero dissimilarity with `description`.
    #[must_use]
    pub fn find_identical(&self, description: &CaseDescription) -> Option<&Case> {
        self.position_of(description).map(|pos| &self.cases[pos])
    }

    /// Case with the lowest dissimilarity, earliest first on ties.
    #[must_use]
    pub fn most_similar(&self, description: &CaseDescription) -> Option<(&Case, usize)> {
        let mut best: Option<(&Case, usize)> = None;
        for case in &self.cases {
            let d = case.description.dissimilarity(description);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((case, d));
            }
        }
        best
    }

    /// Case by id.
    #[must_use]
    pub fn get(&self, id: CaseId) -> Option<&Case> {
        let pos = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.cases.get(pos)
    }

    /// All cases in insertion order.
    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.cases.iter()
    }

    /// Number of cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if no case was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Rescores every solution as the mean of its norms' scores.
    ///
    /// `score_of` returns `None` for norms without an opinion yet; solutions
    /// with no scored norm keep their score.
    pub fn refresh_scores<F>(&mut self, mut score_of: F)
    where
        F: FnMut(&Norm) -> Option<f64>,
    {
        for case in &mut self.cases {
            for solution in &mut case.solutions {
                let scores: Vec<f64> = solution.norms.iter().filter_map(&mut score_of).collect();
                if !scores.is_empty() {
                    #[allow(clippy::cast_precision_loss)]
                    let n = scores.len() as f64;
                    solution.score = scores.iter().sum::<f64>() / n;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(front: &str) -> Description {
        Description::new().with("front", front)
    }

    fn desc(fronts: &[&str]) -> CaseDescription {
        CaseDescription::new(Goal::new("g"), fronts.iter().map(|f| ctx(f)).collect())
    }

    #[test]
    fn dissimilarity_ignores_agent_order() {
        let a = desc(&["car", "nothing"]);
        let b = desc(&["nothing", "car"]);
        assert_eq!(a.dissimilarity(&b), 0);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn dissimilarity_counts_differences() {
        let a = desc(&["car"]);
        let b = desc(&["nothing"]);
        assert_eq!(a.dissimilarity(&b), 2);

        let c = desc(&["car", "car"]);
        assert_eq!(a.dissimilarity(&c), 1);

        let other_goal = CaseDescription::new(Goal::new("h"), vec![ctx("car")]);
        assert_eq!(a.dissimilarity(&other_goal), 1);
    }

    #[test]
    fn add_merges_identical_cases() {
        let mut base = CaseBase::new(0.5);
        let n1 = Norm::prohibition(ctx("car"), "Go");
        let n2 = Norm::prohibition(ctx("car"), "Turn");
        let id = base.add(desc(&["car"]), vec![n1.clone()]);
        assert_eq!(base.add(desc(&["car"]), vec![n1.clone()]), id);
        assert_eq!(base.add(desc(&["car"]), vec![n2]), id);
        assert_eq!(base.len(), 1);
        assert_eq!(base.get(id).unwrap().solutions().len(), 2);

        let other = base.add(desc(&["nothing"]), vec![n1]);
        assert_ne!(other, id);
        assert_eq!(base.len(), 2);
        assert!(base.find_identical(&desc(&["nothing"])).is_some());
        assert!(base.find_identical(&desc(&["*"])).is_none());
    }

    #[test]
    fn best_solution_follows_refreshed_scores() {
        let mut base = CaseBase::new(0.5);
        let good = Norm::prohibition(ctx("car"), "Go");
        let bad = Norm::prohibition(ctx("car"), "Turn");
        let id = base.add(desc(&["car"]), vec![bad.clone()]);
        base.add(desc(&["car"]), vec![good.clone()]);

        // ties go to the earliest solution
        assert_eq!(base.get(id).unwrap().best_solution().unwrap().norms(), &[bad.clone()]);

        base.refresh_scores(|n| if *n == good { Some(0.9) } else { Some(0.2) });
        let case = base.get(id).unwrap();
        assert_eq!(case.best_solution().unwrap().norms(), &[good]);
        assert!((case.best_solution().unwrap().score() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn most_similar_prefers_closest() {
        let mut base = CaseBase::new(0.5);
        base.add(desc(&["nothing"]), vec![]);
        base.add(desc(&["car", "car"]), vec![]);
        let (case, d) = base.most_similar(&desc(&["car"])).unwrap();
        assert_eq!(d, 1);
        assert_eq!(case.description().contexts().len(), 2);
    }
}
