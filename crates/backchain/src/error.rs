//! Error types for the backchain engine.
//!
//! Unification failure is not an error: it is reported as a
//! [`Mismatch`](crate::unify::Mismatch) value and handled inside the search.
//! Everything here is surfaced to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The resource bound that a search ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Budget {
    /// Nesting of rule expansions along a single derivation path.
    Depth,
    /// Total number of resolution steps taken by one query.
    Steps,
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Depth => f.write_str("depth"),
            Budget::Steps => f.write_str("step"),
        }
    }
}

/// Defines the errors that can occur while building a knowledge base or
/// resolving a query against it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A query or knowledge-base entry does not conform to the term grammar.
    #[error("Malformed term: {0}")]
    MalformedTerm(String),

    /// A rule was defined incorrectly.
    #[error("Invalid rule definition: {0}")]
    InvalidRule(String),

    /// Clause text could not be parsed.
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// A proof does not derive its goals from the knowledge base.
    #[error("Proof invalid: {0}")]
    InvalidProof(String),

    /// The search hit a caller-supplied bound before finishing.
    ///
    /// The answer is unknown, not negative.
    #[error("Search budget exceeded: {budget} limit of {limit} reached")]
    SearchBudgetExceeded { budget: Budget, limit: usize },

    /// An error occurred during data serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred while loading a knowledge base.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Returns `true` if this error means "inconclusive" rather than "invalid input".
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Error::SearchBudgetExceeded { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
