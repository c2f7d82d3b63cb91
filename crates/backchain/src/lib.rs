//! Backchain - Backward-Chaining Inference Engine
//!
//! This crate answers queries against a knowledge base of Horn clauses:
//! ground or non-ground facts plus rules of the form `head :- b1, ..., bn`.
//! A query is solved goal-directed, from the goal back to the facts, and its
//! answers come out as a lazy sequence of variable bindings.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Resolution Engine                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                  Solutions iterator                   │   │
//! │  │  Choice points │ Renaming apart │ Depth/step budgets  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │               Terms and Substitutions                 │   │
//! │  │  walk │ occurs_check │ unify │ substitute            │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                           │                                  │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │                  Knowledge Base                       │   │
//! │  │  Facts │ Rules │ Prolog text │ JSON                   │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │                                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use backchain::{Engine, KnowledgeBase, Term};
//!
//! let kb = KnowledgeBase::from_prolog(
//!     "parent(alice, bob).
//!      parent(bob, charlie).
//!      grandparent(X, Z) :- parent(X, Y), parent(Y, Z).",
//! )
//! .unwrap();
//! let engine = Engine::new(kb).unwrap();
//!
//! let goal = Term::relation("grandparent", [Term::var("G"), Term::atom("charlie")]);
//! let answers = engine.answers(&goal, None).unwrap();
//! assert_eq!(answers.len(), 1);
//! assert_eq!(answers[0].to_string(), "{G = alice}");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod kb;
pub mod parser;
pub mod proof;
pub mod substitution;
pub mod term;
pub mod unify;

// Re-exports
pub use config::SearchConfig;
pub use engine::{resolve, resolve_with, Engine, EngineStats, Proofs, Solutions};
pub use error::{Budget, Error, Result};
pub use kb::{KnowledgeBase, Rule};
pub use parser::{parse_clause, parse_program, parse_term, Clause, Program};
pub use proof::{ClauseRef, Proof, ProofStep};
pub use substitution::{substitute, walk, Substitution};
pub use term::{is_variable, Constant, Term, Var};
pub use unify::{occurs_check, unifiable, unify, Mismatch};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
