//! Predicate taxonomies - the description vocabulary.
//!
//! Every predicate owns a tree of terms. The root is the most general term;
//! each other term has exactly one parent. Taxonomies are loaded once and are
//! immutable while the engine runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Generalisation order over the terms of one predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    predicate: String,
    root: String,
    parents: BTreeMap<String, Option<String>>,
    children: BTreeMap<String, BTreeSet<String>>,
}

impl Taxonomy {
    /// Creates a taxonomy containing only its root term.
    #[must_use]
    pub fn new(predicate: impl Into<String>, root: impl Into<String>) -> Self {
        let root = root.into();
        let mut parents = BTreeMap::new();
        parents.insert(root.clone(), None);
        Self {
            predicate: predicate.into(),
            root,
            parents,
            children: BTreeMap::new(),
        }
    }

    /// Adds `term` below `parent`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTaxonomy` if the term already exists or
    /// the parent is unknown.
    pub fn add_term(
        &mut self,
        term: impl Into<String>,
        parent: &str,
    ) -> Result<(), ValidationError> {
        let term = term.into();
        if term.trim().is_empty() {
            return Err(self.invalid("terms cannot be empty"));
        }
        if self.parents.contains_key(&term) {
            return Err(self.invalid(format!("duplicate term '{term}'")));
        }
        if !self.parents.contains_key(parent) {
            return Err(self.invalid(format!("unknown parent term '{parent}'")));
        }
        self.parents.insert(term.clone(), Some(parent.to_string()));
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(term);
        Ok(())
    }

    /// Builder-style variant of [`Taxonomy::add_term`].
    pub fn with_term(
        mut self,
        term: impl Into<String>,
        parent: &str,
    ) -> Result<Self, ValidationError> {
        self.add_term(term, parent)?;
        Ok(self)
    }

    fn invalid(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::InvalidTaxonomy {
            predicate: self.predicate.clone(),
            reason: reason.into(),
        }
    }

    /// Predicate this taxonomy describes.
    #[must_use]
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Most general term.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns true if the term belongs to this taxonomy.
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.parents.contains_key(term)
    }

    /// Immediate parent of a term. The root and unknown terms have none.
    #[must_use]
    pub fn parent(&self, term: &str) -> Option<&str> {
        self.parents.get(term).and_then(|p| p.as_deref())
    }

    /// Immediate children of a term, in lexical order.
    #[must_use]
    pub fn children(&self, term: &str) -> Vec<&str> {
        self.children
            .get(term)
            .map(|c| c.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Generalisation level of a term: the root is level 0.
    #[must_use]
    pub fn level(&self, term: &str) -> Option<usize> {
        if !self.contains(term) {
            return None;
        }
        Some(self.ancestors(term).len())
    }

    /// Strict ancestors of a term, nearest first.
    #[must_use]
    pub fn ancestors(&self, term: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self.parent(term);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Returns true if `general` equals `specific` or is one of its ancestors.
    #[must_use]
    pub fn subsumes(&self, general: &str, specific: &str) -> bool {
        if !self.contains(general) || !self.contains(specific) {
            return false;
        }
        general == specific || self.ancestors(specific).contains(&general)
    }

    /// Most specific term that subsumes both `a` and `b`.
    #[must_use]
    pub fn most_specific_common_generalisation(&self, a: &str, b: &str) -> Option<&str> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let (a_key, _) = self.parents.get_key_value(a)?;
        let mut chain_a: Vec<&str> = vec![a_key.as_str()];
        chain_a.extend(self.ancestors(a));

        let (b_key, _) = self.parents.get_key_value(b)?;
        let mut chain_b: Vec<&str> = vec![b_key.as_str()];
        chain_b.extend(self.ancestors(b));

        chain_b.into_iter().find(|t| chain_a.contains(t))
    }

    /// All terms, in lexical order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.parents.keys().map(String::as_str)
    }
}

/// The full description vocabulary: one taxonomy per predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionLanguage {
    taxonomies: BTreeMap<String, Taxonomy>,
}

impl DescriptionLanguage {
    /// Language without predicates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a taxonomy.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTaxonomy` if the predicate is already
    /// registered.
    pub fn add(&mut self, taxonomy: Taxonomy) -> Result<(), ValidationError> {
        if self.taxonomies.contains_key(taxonomy.predicate()) {
            return Err(ValidationError::InvalidTaxonomy {
                predicate: taxonomy.predicate().to_string(),
                reason: "predicate registered twice".to_string(),
            });
        }
        self.taxonomies
            .insert(taxonomy.predicate().to_string(), taxonomy);
        Ok(())
    }

    /// Builder-style [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn with(mut self, taxonomy: Taxonomy) -> Result<Self, ValidationError> {
        self.add(taxonomy)?;
        Ok(self)
    }

    /// Taxonomy of `predicate`, if registered.
    #[must_use]
    pub fn taxonomy(&self, predicate: &str) -> Option<&Taxonomy> {
        self.taxonomies.get(predicate)
    }

    /// Predicate names, in lexical order.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.taxonomies.keys().map(String::as_str)
    }

    /// Returns true if no taxonomy is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.taxonomies.is_empty()
    }

    /// Returns true if `general` subsumes `specific` under `predicate`.
    ///
    /// Unknown predicates fall back to plain term equality.
    #[must_use]
    pub fn subsumes(&self, predicate: &str, general: &str, specific: &str) -> bool {
        match self.taxonomy(predicate) {
            Some(t) => t.subsumes(general, specific),
            None => general == specific,
        }
    }
}
