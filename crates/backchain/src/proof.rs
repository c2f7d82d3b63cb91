//! Derivation traces
//!
//! A [`Proof`] lists, in pre-order, which clause resolved each goal of one
//! successful derivation. Proofs can be checked against a knowledge base
//! with [`Proof::verify`] without re-running the search.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kb::KnowledgeBase;
use crate::substitution::Substitution;
use crate::term::Term;
use crate::unify::unify;

/// The clause a goal was resolved with, by position in the knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseRef {
    /// Index into [`KnowledgeBase::facts`].
    Fact(usize),
    /// Index into [`KnowledgeBase::rules`].
    Rule(usize),
}

impl fmt::Display for ClauseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClauseRef::Fact(i) => write!(f, "fact #{}", i),
            ClauseRef::Rule(i) => write!(f, "rule #{}", i),
        }
    }
}

/// One resolved goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// The goal, instantiated by the solution's bindings.
    pub goal: Term,
    /// The clause that resolved it.
    pub clause: ClauseRef,
    /// Number of rule expansions above this goal; query goals are at depth 0.
    pub depth: usize,
}

/// The derivation behind one solution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Steps in the order the search took them.
    pub steps: Vec<ProofStep>,
}

impl Proof {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` for the proof of an empty conjunction.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Deepest step, or 0 for an empty proof.
    pub fn depth(&self) -> usize {
        self.steps.iter().map(|s| s.depth).max().unwrap_or(0)
    }

    /// Distinct rule indices used, sorted.
    pub fn rules_used(&self) -> Vec<usize> {
        let mut rules: Vec<usize> = self
            .steps
            .iter()
            .filter_map(|s| match s.clause {
                ClauseRef::Rule(i) => Some(i),
                ClauseRef::Fact(_) => None,
            })
            .collect();
        rules.sort_unstable();
        rules.dedup();
        rules
    }

    /// Distinct fact indices used, sorted.
    pub fn facts_used(&self) -> Vec<usize> {
        let mut facts: Vec<usize> = self
            .steps
            .iter()
            .filter_map(|s| match s.clause {
                ClauseRef::Fact(i) => Some(i),
                ClauseRef::Rule(_) => None,
            })
            .collect();
        facts.sort_unstable();
        facts.dedup();
        facts
    }

    /// Applies `theta` to every recorded goal.
    pub fn instantiate(&self, theta: &Substitution) -> Proof {
        Proof {
            steps: self
                .steps
                .iter()
                .map(|s| ProofStep {
                    goal: theta.substitute(&s.goal),
                    ..s.clone()
                })
                .collect(),
        }
    }

    /// Checks that the steps form a derivation of `goals` from `kb`.
    ///
    /// Every step must name an existing clause whose (renamed) head unifies
    /// with the step's goal, and a rule step must be followed by one
    /// sub-derivation per body goal, each one level deeper.
    pub fn verify(&self, kb: &KnowledgeBase, goals: &[Term]) -> Result<()> {
        let mut verifier = Verifier {
            kb,
            steps: &self.steps,
            next: 0,
            generation: self
                .steps
                .iter()
                .map(|s| s.goal.max_generation())
                .chain(goals.iter().map(Term::max_generation))
                .max()
                .unwrap_or(0),
        };
        let mut theta = Substitution::new();
        for goal in goals {
            theta = verifier.subtree(goal, 0, theta)?;
        }
        if verifier.next != self.steps.len() {
            return Err(Error::InvalidProof(format!(
                "{} trailing steps",
                self.steps.len() - verifier.next
            )));
        }
        Ok(())
    }

    /// Serializes the proof to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Deserializes a proof from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(
                f,
                "{:indent$}{}  [{}]",
                "",
                step.goal,
                step.clause,
                indent = step.depth * 2
            )?;
        }
        Ok(())
    }
}

struct Verifier<'a> {
    kb: &'a KnowledgeBase,
    steps: &'a [ProofStep],
    next: usize,
    generation: usize,
}

impl Verifier<'_> {
    fn subtree(&mut self, expected: &Term, depth: usize, theta: Substitution) -> Result<Substitution> {
        let index = self.next;
        let steps = self.steps;
        let step = steps.get(index).ok_or_else(|| {
            Error::InvalidProof(format!("no step resolves {}", theta.substitute(expected)))
        })?;
        self.next += 1;

        if step.depth != depth {
            return Err(Error::InvalidProof(format!(
                "step {} is at depth {}, expected {}",
                index, step.depth, depth
            )));
        }
        let theta = unify(expected, &step.goal, &theta).map_err(|m| {
            Error::InvalidProof(format!("step {} does not match its parent goal: {}", index, m))
        })?;

        self.generation += 1;
        let (head, body) = match step.clause {
            ClauseRef::Fact(i) => {
                let fact = self.kb.facts().get(i).ok_or_else(|| {
                    Error::InvalidProof(format!("step {} cites missing fact #{}", index, i))
                })?;
                let generation = self.generation;
                let head = fact.map_variables(&mut |v| Term::Variable(v.renamed(generation)));
                (head, Vec::new())
            }
            ClauseRef::Rule(i) => {
                let rule = self.kb.rules().get(i).ok_or_else(|| {
                    Error::InvalidProof(format!("step {} cites missing rule #{}", index, i))
                })?;
                let renamed = rule.renamed(self.generation);
                (renamed.head, renamed.body)
            }
        };

        let mut theta = unify(&head, &step.goal, &theta).map_err(|m| {
            Error::InvalidProof(format!("step {} does not follow from {}: {}", index, step.clause, m))
        })?;
        for goal in &body {
            theta = self.subtree(goal, depth + 1, theta)?;
        }
        Ok(theta)
    }
}

/// Persistent list of steps shared between choice points, newest first.
#[derive(Debug, Clone, Default)]
pub(crate) struct Trail(Option<Arc<TrailNode>>);

#[derive(Debug)]
struct TrailNode {
    step: ProofStep,
    prev: Trail,
}

impl Trail {
    pub(crate) fn push(&self, step: ProofStep) -> Trail {
        Trail(Some(Arc::new(TrailNode {
            step,
            prev: self.clone(),
        })))
    }

    pub(crate) fn to_proof(&self) -> Proof {
        let mut steps = Vec::new();
        let mut cursor = &self.0;
        while let Some(node) = cursor {
            steps.push(node.step.clone());
            cursor = &node.prev.0;
        }
        steps.reverse();
        Proof { steps }
    }
}
