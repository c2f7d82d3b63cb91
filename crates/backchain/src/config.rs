//! Search configuration.

use serde::{Deserialize, Serialize};

/// Bounds applied to a single query.
///
/// Recursive rules only terminate when the recursion is well-founded with
/// respect to the data, so every query runs under these limits. Breaching
/// one ends the query with
/// [`Error::SearchBudgetExceeded`](crate::Error::SearchBudgetExceeded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum number of nested rule expansions on one derivation path.
    /// `None` disables the check.
    pub max_depth: Option<usize>,
    /// Maximum number of resolution steps (goal selections) per query.
    /// `None` disables the check.
    pub max_steps: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(256),
            max_steps: None,
        }
    }
}

impl SearchConfig {
    /// No limits at all. A left-recursive rule will run until the caller
    /// stops pulling solutions.
    pub fn unbounded() -> Self {
        Self {
            max_depth: None,
            max_steps: None,
        }
    }

    /// Tight limits for untrusted knowledge bases.
    pub fn strict() -> Self {
        Self {
            max_depth: Some(64),
            max_steps: Some(100_000),
        }
    }

    /// Sets the depth limit.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the step limit.
    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
}
