//! Term usage facts.

use relift_ir::{Function, TermId};
use std::collections::HashSet;

/// The set of terms whose values are observable in the reconstructed output.
///
/// Terms outside the set (dead flag computations and the like) still obey
/// statement-level constraints but are skipped by the per-term rules.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    used: HashSet<TermId>,
}

impl Usage {
    /// Creates an empty usage set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every term of a function as used.
    pub fn all_terms(function: &Function) -> Self {
        Self {
            used: function.term_ids().collect(),
        }
    }

    /// Marks a term as used.
    pub fn mark_used(&mut self, term: TermId) {
        self.used.insert(term);
    }

    /// Returns true if the term is used.
    pub fn is_used(&self, term: TermId) -> bool {
        self.used.contains(&term)
    }
}
