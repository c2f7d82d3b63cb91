//! Backward-chaining resolution
//!
//! [`resolve`] turns a goal into a lazy [`Solutions`] iterator. The search is
//! SLD resolution: depth-first, goals selected left to right, facts tried
//! before rules, each in knowledge-base order. Every alternative of every
//! goal is a choice point on an explicit stack, so asking for the next
//! solution resumes from the most recent unexplored alternative and
//! backtracking reaches every combination of body-goal solutions.
//!
//! ```
//! use backchain::{resolve, KnowledgeBase, Substitution, Term, Var};
//!
//! let kb = KnowledgeBase::from_prolog(
//!     "parent(alice, bob).
//!      parent(bob, charlie).
//!      ancestor(X, Y) :- parent(X, Y).
//!      ancestor(X, Y) :- parent(X, Z), ancestor(Z, Y).",
//! )
//! .unwrap();
//!
//! let goal = Term::relation("ancestor", [Term::atom("alice"), Term::var("Y")]);
//! let found: Vec<String> = resolve(&kb, &goal, &Substitution::new())
//!     .unwrap()
//!     .map(|theta| theta.unwrap().resolve(&Var::new("Y")).to_string())
//!     .collect();
//! assert_eq!(found, ["bob", "charlie"]);
//! ```

use std::sync::{Arc, RwLock};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{Budget, Error, Result};
use crate::kb::{KnowledgeBase, Rule};
use crate::proof::{ClauseRef, Proof, ProofStep, Trail};
use crate::substitution::Substitution;
use crate::term::{Term, Var};
use crate::unify::{unify, Mismatch};

/// Resolves `goal` against `kb`, extending `theta`, under the default
/// [`SearchConfig`].
///
/// The goal is validated first; a malformed goal is rejected before any
/// search happens. Every [`KnowledgeBase`] is validated when it is built or
/// deserialized, so the search only ever sees well-formed clauses.
pub fn resolve<'kb>(
    kb: &'kb KnowledgeBase,
    goal: &Term,
    theta: &Substitution,
) -> Result<Solutions<'kb>> {
    Solutions::new(kb, std::slice::from_ref(goal), theta, SearchConfig::default())
}

/// Like [`resolve`] with an explicit configuration.
pub fn resolve_with<'kb>(
    kb: &'kb KnowledgeBase,
    goal: &Term,
    theta: &Substitution,
    config: SearchConfig,
) -> Result<Solutions<'kb>> {
    Solutions::new(kb, std::slice::from_ref(goal), theta, config)
}

/// Counters describing the work done by one or more queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Queries started.
    pub queries: usize,
    /// Goals selected for resolution.
    pub steps: usize,
    /// Clause heads tried against a goal.
    pub unifications: usize,
    /// Attempts that failed to unify, occurs-check failures included.
    pub unification_failures: usize,
    /// Attempts rejected by the occurs-check.
    pub occurs_check_failures: usize,
    /// Solutions produced.
    pub solutions: usize,
    /// Queries stopped by a search budget.
    pub budget_exceeded: usize,
    /// Deepest derivation level reached.
    pub max_depth_reached: usize,
}

impl EngineStats {
    fn absorb(&mut self, other: &EngineStats) {
        self.queries += other.queries;
        self.steps += other.steps;
        self.unifications += other.unifications;
        self.unification_failures += other.unification_failures;
        self.occurs_check_failures += other.occurs_check_failures;
        self.solutions += other.solutions;
        self.budget_exceeded += other.budget_exceeded;
        self.max_depth_reached = self.max_depth_reached.max(other.max_depth_reached);
    }
}

/// Pending conjunction: a persistent list of goals, each with its depth.
#[derive(Debug, Clone, Default)]
struct Goals(Option<Arc<GoalNode>>);

#[derive(Debug)]
struct GoalNode {
    goal: Term,
    depth: usize,
    rest: Goals,
}

impl Goals {
    fn from_slice(goals: &[Term], depth: usize) -> Goals {
        goals.iter().rev().fold(Goals::default(), |rest, goal| {
            rest.push(goal.clone(), depth)
        })
    }

    fn push(&self, goal: Term, depth: usize) -> Goals {
        Goals(Some(Arc::new(GoalNode {
            goal,
            depth,
            rest: self.clone(),
        })))
    }

    /// `body` at `depth`, followed by `self`.
    fn prepend(&self, body: Vec<Term>, depth: usize) -> Goals {
        body.into_iter()
            .rev()
            .fold(self.clone(), |rest, goal| rest.push(goal, depth))
    }
}

/// A choice point: one selected goal and the clauses not yet tried for it.
#[derive(Debug)]
struct Frame {
    goal: Term,
    depth: usize,
    rest: Goals,
    theta: Substitution,
    trail: Trail,
    next_clause: usize,
}

/// The lazy sequence of substitutions under which a goal is entailed.
///
/// Each item is either a solution or, once, the
/// [`SearchBudgetExceeded`](Error::SearchBudgetExceeded) error that ended
/// the search; after an error the iterator is exhausted. Dropping the
/// iterator early abandons the rest of the search at no cost.
#[derive(Debug)]
pub struct Solutions<'kb> {
    kb: &'kb KnowledgeBase,
    config: SearchConfig,
    stack: Vec<Frame>,
    /// Solution of an empty conjunction, handed out by the first `next`.
    trivial: Option<Substitution>,
    next_generation: usize,
    record: bool,
    done: bool,
    stats: EngineStats,
    sink: Option<Arc<RwLock<EngineStats>>>,
}

impl<'kb> Solutions<'kb> {
    /// Starts solving the conjunction `goals` under `theta`.
    ///
    /// An empty conjunction has exactly one solution: `theta` itself.
    pub fn new(
        kb: &'kb KnowledgeBase,
        goals: &[Term],
        theta: &Substitution,
        config: SearchConfig,
    ) -> Result<Self> {
        goals.iter().try_for_each(Term::validate)?;

        let next_generation = goals
            .iter()
            .map(Term::max_generation)
            .chain(
                theta
                    .iter()
                    .flat_map(|(v, t)| [v.generation(), t.max_generation()]),
            )
            .max()
            .unwrap_or(0)
            + 1;

        let mut solutions = Self {
            kb,
            config,
            stack: Vec::new(),
            trivial: None,
            next_generation,
            record: false,
            done: false,
            stats: EngineStats {
                queries: 1,
                ..EngineStats::default()
            },
            sink: None,
        };

        match Goals::from_slice(goals, 0).0 {
            None => solutions.trivial = Some(theta.clone()),
            Some(node) => {
                if let Err(e) = solutions.select(&node, theta.clone(), Trail::default()) {
                    // Only a zero step budget fails here.
                    debug!("Query rejected before search: {}", e);
                    solutions.stats.budget_exceeded += 1;
                    solutions.done = true;
                    solutions.trivial = None;
                    return Err(e);
                }
            }
        }

        trace!(
            "Resolving {} goal(s) against {} clause(s)",
            goals.len(),
            kb.len()
        );
        Ok(solutions)
    }

    /// Turns this iterator into one that also yields each solution's proof.
    pub fn with_proofs(mut self) -> Proofs<'kb> {
        self.record = true;
        Proofs { inner: self }
    }

    /// Work done so far by this query.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Reports this query's stats into `sink` when the iterator is dropped.
    pub(crate) fn report_to(mut self, sink: Arc<RwLock<EngineStats>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Pushes a choice point for the first goal of `node`.
    fn select(&mut self, node: &GoalNode, theta: Substitution, trail: Trail) -> Result<()> {
        self.stats.steps += 1;
        if let Some(limit) = self.config.max_steps {
            if self.stats.steps > limit {
                return Err(Error::SearchBudgetExceeded {
                    budget: Budget::Steps,
                    limit,
                });
            }
        }
        if let Some(limit) = self.config.max_depth {
            if node.depth > limit {
                return Err(Error::SearchBudgetExceeded {
                    budget: Budget::Depth,
                    limit,
                });
            }
        }
        self.stats.max_depth_reached = self.stats.max_depth_reached.max(node.depth);

        let goal = theta.substitute(&node.goal);
        trace!("Selecting goal {} at depth {}", goal, node.depth);
        self.stack.push(Frame {
            goal,
            depth: node.depth,
            rest: node.rest.clone(),
            theta,
            trail,
            next_clause: 0,
        });
        Ok(())
    }

    fn fresh_generation(&mut self) -> usize {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    /// Heads and bodies of the clause at `index`, renamed apart.
    fn clause(&mut self, index: usize) -> Option<(ClauseRef, Term, Vec<Term>)> {
        let kb = self.kb;
        let facts = kb.facts();
        if let Some(fact) = facts.get(index) {
            let head = if fact.is_ground() {
                fact.clone()
            } else {
                let generation = self.fresh_generation();
                fact.map_variables(&mut |v: &Var| Term::Variable(v.renamed(generation)))
            };
            return Some((ClauseRef::Fact(index), head, Vec::new()));
        }
        let position = index - facts.len();
        let rule: &Rule = kb.rules().get(position)?;
        let renamed = rule.renamed(self.fresh_generation());
        Some((ClauseRef::Rule(position), renamed.head, renamed.body))
    }

    fn record_failure(&mut self, mismatch: &Mismatch) {
        self.stats.unification_failures += 1;
        if mismatch.is_occurs_check() {
            self.stats.occurs_check_failures += 1;
        }
    }

    fn fail(&mut self, e: Error) -> Option<Result<(Substitution, Trail)>> {
        debug!("Search stopped: {}", e);
        self.stats.budget_exceeded += 1;
        self.stack.clear();
        self.done = true;
        Some(Err(e))
    }

    /// Advances the search to the next solution.
    fn step(&mut self) -> Option<Result<(Substitution, Trail)>> {
        if self.done {
            return None;
        }
        if let Some(theta) = self.trivial.take() {
            self.stats.solutions += 1;
            self.done = true;
            return Some(Ok((theta, Trail::default())));
        }

        loop {
            let frame = self.stack.last_mut()?;
            let index = frame.next_clause;
            frame.next_clause += 1;

            let Some((clause, head, body)) = self.clause(index) else {
                trace!("Exhausted alternatives for {}", self.stack.last()?.goal);
                self.stack.pop();
                continue;
            };

            let frame = self.stack.last()?;
            self.stats.unifications += 1;
            let theta = match unify(&frame.goal, &head, &frame.theta) {
                Ok(theta) => theta,
                Err(mismatch) => {
                    trace!("{} rejected for {}: {}", clause, frame.goal, mismatch);
                    self.record_failure(&mismatch);
                    continue;
                }
            };
            trace!("{} matches {}", clause, frame.goal);

            let trail = if self.record {
                frame.trail.push(ProofStep {
                    goal: frame.goal.clone(),
                    clause,
                    depth: frame.depth,
                })
            } else {
                Trail::default()
            };
            let pending = frame.rest.prepend(body, frame.depth + 1);

            match pending.0 {
                None => {
                    self.stats.solutions += 1;
                    debug!("Solution found: {}", theta);
                    return Some(Ok((theta, trail)));
                }
                Some(node) => {
                    if let Err(e) = self.select(&node, theta, trail) {
                        return self.fail(e);
                    }
                }
            }
        }
    }
}

impl Iterator for Solutions<'_> {
    type Item = Result<Substitution>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().map(|r| r.map(|(theta, _)| theta))
    }
}

impl std::iter::FusedIterator for Solutions<'_> {}

impl Drop for Solutions<'_> {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            let mut totals = sink.write().unwrap_or_else(|e| e.into_inner());
            totals.absorb(&self.stats);
        }
    }
}

/// Solutions paired with the derivations that produced them.
///
/// Created by [`Solutions::with_proofs`]. Proof goals are instantiated with
/// the solution's bindings.
#[derive(Debug)]
pub struct Proofs<'kb> {
    inner: Solutions<'kb>,
}

impl Proofs<'_> {
    /// Work done so far by this query.
    pub fn stats(&self) -> &EngineStats {
        self.inner.stats()
    }
}

impl Iterator for Proofs<'_> {
    type Item = Result<(Substitution, Proof)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.step().map(|r| {
            r.map(|(theta, trail)| {
                let proof = trail.to_proof().instantiate(&theta);
                (theta, proof)
            })
        })
    }
}

impl std::iter::FusedIterator for Proofs<'_> {}

/// A knowledge base with a search configuration and cumulative statistics.
///
/// Queries borrow the knowledge base, so it cannot change while any of
/// their iterators is alive.
pub struct Engine {
    /// The clauses every query runs against.
    kb: KnowledgeBase,
    /// Budgets applied to each query.
    config: SearchConfig,
    /// Totals over every finished query.
    stats: Arc<RwLock<EngineStats>>,
}

impl Engine {
    /// Creates an engine over `kb` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error of the knowledge base.
    pub fn new(kb: KnowledgeBase) -> Result<Self> {
        Self::with_config(kb, SearchConfig::default())
    }

    /// Creates an engine over `kb` with `config`.
    pub fn with_config(kb: KnowledgeBase, config: SearchConfig) -> Result<Self> {
        kb.validate()?;
        debug!(
            "Engine created with {} fact(s) and {} rule(s)",
            kb.facts().len(),
            kb.rules().len()
        );
        Ok(Self {
            kb,
            config,
            stats: Arc::new(RwLock::new(EngineStats::default())),
        })
    }

    /// The knowledge base.
    pub fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// The search configuration.
    pub fn config(&self) -> SearchConfig {
        self.config
    }

    /// Replaces the search configuration for later queries.
    pub fn set_config(&mut self, config: SearchConfig) {
        self.config = config;
    }

    /// Appends a fact.
    pub fn add_fact(&mut self, fact: Term) -> Result<()> {
        self.kb.add_fact(fact)
    }

    /// Appends a rule.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        self.kb.add_rule(rule)
    }

    /// Solves `goal` from scratch.
    pub fn query(&self, goal: &Term) -> Result<Solutions<'_>> {
        self.query_with(goal, &Substitution::new())
    }

    /// Solves `goal` extending `theta`.
    pub fn query_with(&self, goal: &Term, theta: &Substitution) -> Result<Solutions<'_>> {
        self.query_all(std::slice::from_ref(goal), theta)
    }

    /// Solves the conjunction `goals` extending `theta`.
    pub fn query_all(&self, goals: &[Term], theta: &Substitution) -> Result<Solutions<'_>> {
        let solutions = Solutions::new(&self.kb, goals, theta, self.config).map_err(|e| {
            if e.is_budget_exceeded() {
                let mut totals = self.stats.write().unwrap_or_else(|p| p.into_inner());
                totals.queries += 1;
                totals.budget_exceeded += 1;
            }
            e
        })?;
        Ok(solutions.report_to(Arc::clone(&self.stats)))
    }

    /// Solves `goal`, yielding each solution with its proof.
    pub fn prove(&self, goal: &Term) -> Result<Proofs<'_>> {
        Ok(self.query(goal)?.with_proofs())
    }

    /// Returns `true` if `goal` has at least one solution.
    ///
    /// A budget breach before the first solution is an error, not `false`.
    pub fn ask(&self, goal: &Term) -> Result<bool> {
        Ok(self.first(goal)?.is_some())
    }

    /// The first solution of `goal`, if any.
    pub fn first(&self, goal: &Term) -> Result<Option<Substitution>> {
        self.query(goal)?.next().transpose()
    }

    /// Solutions of `goal` restricted to the goal's own variables, at most
    /// `limit` of them when given.
    ///
    /// Stops at the first error.
    pub fn answers(&self, goal: &Term, limit: Option<usize>) -> Result<Vec<Substitution>> {
        let vars = goal.variables();
        self.query(goal)?
            .take(limit.unwrap_or(usize::MAX))
            .map(|r| r.map(|theta| theta.project(&vars)))
            .collect()
    }

    /// Retrieves the statistics accumulated by finished queries.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Resets all collected statistics.
    pub fn clear_stats(&self) {
        *self.stats.write().unwrap_or_else(|e| e.into_inner()) = EngineStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(name: &str) -> Term {
        Term::atom(name)
    }

    fn var(name: &str) -> Term {
        Term::var(name)
    }

    fn rel<const N: usize>(name: &str, args: [Term; N]) -> Term {
        Term::relation(name, args)
    }

    fn family() -> KnowledgeBase {
        KnowledgeBase::from_parts(
            [
                rel("parent", [atom("alice"), atom("bob")]),
                rel("parent", [atom("bob"), atom("charlie")]),
                rel("parent", [atom("charlie"), atom("david")]),
                rel("male", [atom("bob")]),
                rel("male", [atom("charlie")]),
                rel("female", [atom("alice")]),
            ],
            [
                Rule::new(
                    rel("ancestor", [var("X"), var("Y")]),
                    [rel("parent", [var("X"), var("Y")])],
                ),
                Rule::new(
                    rel("ancestor", [var("X"), var("Y")]),
                    [
                        rel("parent", [var("X"), var("Z")]),
                        rel("ancestor", [var("Z"), var("Y")]),
                    ],
                ),
            ],
        )
        .unwrap()
    }

    fn values(solutions: Solutions<'_>, name: &str) -> Vec<Term> {
        let v = Var::new(name);
        solutions.map(|r| r.unwrap().resolve(&v)).collect()
    }

    #[test]
    fn test_fact_lookup() {
        let kb = family();
        let goal = rel("parent", [var("X"), atom("charlie")]);
        let found = values(resolve(&kb, &goal, &Substitution::new()).unwrap(), "X");
        assert_eq!(found, vec![atom("bob")]);
    }

    #[test]
    fn test_ground_fact_query() {
        let kb = family();
        let yes: Vec<_> = resolve(&kb, &rel("female", [atom("alice")]), &Substitution::new())
            .unwrap()
            .collect();
        assert_eq!(yes.len(), 1);
        assert!(yes[0].as_ref().unwrap().is_empty());

        let no = resolve(&kb, &rel("female", [atom("bob")]), &Substitution::new())
            .unwrap()
            .count();
        assert_eq!(no, 0);
    }

    #[test]
    fn test_transitive_closure() {
        let kb = family();
        let goal = rel("ancestor", [atom("alice"), var("Y")]);
        let found = values(resolve(&kb, &goal, &Substitution::new()).unwrap(), "Y");
        assert_eq!(found, vec![atom("bob"), atom("charlie"), atom("david")]);
    }

    #[test]
    fn test_backtracks_into_earlier_goal() {
        // The first parent of alice leads nowhere; only the second one has a
        // child, so committing to the first solution would miss the answer.
        let kb = KnowledgeBase::from_prolog(
            "parent(alice, bob).
             parent(alice, carol).
             parent(carol, dave).
             grandparent(X, Z) :- parent(X, Y), parent(Y, Z).",
        )
        .unwrap();
        let goal = rel("grandparent", [atom("alice"), var("Who")]);
        let found = values(resolve(&kb, &goal, &Substitution::new()).unwrap(), "Who");
        assert_eq!(found, vec![atom("dave")]);
    }

    #[test]
    fn test_incoming_substitution_is_respected() {
        let kb = family();
        let theta = Substitution::new().bind(Var::new("X"), atom("bob"));
        let goal = rel("parent", [var("X"), var("Y")]);
        let found = values(resolve(&kb, &goal, &theta).unwrap(), "Y");
        assert_eq!(found, vec![atom("charlie")]);
    }

    #[test]
    fn test_rule_variables_do_not_capture_query_variables() {
        // The query uses the same names as the rule; renaming keeps them apart.
        let kb = family();
        let goal = rel("ancestor", [var("Z"), var("X")]);
        let pairs: Vec<(Term, Term)> = resolve(&kb, &goal, &Substitution::new())
            .unwrap()
            .map(|r| {
                let theta = r.unwrap();
                (theta.resolve(&Var::new("Z")), theta.resolve(&Var::new("X")))
            })
            .collect();
        assert_eq!(pairs.len(), 6);
        assert!(pairs.contains(&(atom("alice"), atom("david"))));
        assert!(pairs.contains(&(atom("bob"), atom("david"))));
    }

    #[test]
    fn test_non_ground_facts_are_renamed() {
        let kb = KnowledgeBase::from_prolog(
            "same(X, X).
             pair(A, B) :- same(A, one), same(B, two).",
        )
        .unwrap();
        let goal = rel("pair", [var("P"), var("Q")]);
        let theta = resolve(&kb, &goal, &Substitution::new())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(theta.resolve(&Var::new("P")), atom("one"));
        assert_eq!(theta.resolve(&Var::new("Q")), atom("two"));
    }

    #[test]
    fn test_depth_budget() {
        let kb = KnowledgeBase::from_prolog("loop(X) :- loop(X).").unwrap();
        let goal = rel("loop", [atom("a")]);
        let config = SearchConfig::unbounded().with_max_depth(16);
        let results: Vec<_> = resolve_with(&kb, &goal, &Substitution::new(), config)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0],
            Err(Error::SearchBudgetExceeded {
                budget: Budget::Depth,
                limit: 16,
            })
        );
    }

    #[test]
    fn test_step_budget() {
        let kb = KnowledgeBase::from_prolog("loop(X) :- loop(X).").unwrap();
        let goal = rel("loop", [atom("a")]);
        let config = SearchConfig::unbounded().with_max_steps(50);
        let mut solutions = resolve_with(&kb, &goal, &Substitution::new(), config).unwrap();
        assert!(matches!(
            solutions.next(),
            Some(Err(Error::SearchBudgetExceeded {
                budget: Budget::Steps,
                limit: 50,
            }))
        ));
        assert!(solutions.next().is_none());
        assert_eq!(solutions.stats().budget_exceeded, 1);
    }

    #[test]
    fn test_solutions_before_budget_are_kept() {
        let kb = KnowledgeBase::from_prolog(
            "nat(zero).
             nat(s(N)) :- nat(N).",
        )
        .unwrap();
        let goal = rel("nat", [var("N")]);
        let config = SearchConfig::unbounded().with_max_depth(3);
        let results: Vec<_> = resolve_with(&kb, &goal, &Substitution::new(), config)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(|r| r.is_ok()));
        assert!(results[4].as_ref().unwrap_err().is_budget_exceeded());
    }

    #[test]
    fn test_lazy_first_solution_of_infinite_derivation() {
        let kb = KnowledgeBase::from_prolog(
            "nat(zero).
             nat(s(N)) :- nat(N).",
        )
        .unwrap();
        let goal = rel("nat", [var("N")]);
        let config = SearchConfig::unbounded();
        let firsts: Vec<Term> = resolve_with(&kb, &goal, &Substitution::new(), config)
            .unwrap()
            .take(3)
            .map(|r| r.unwrap().resolve(&Var::new("N")))
            .collect();
        assert_eq!(firsts[0], atom("zero"));
        assert_eq!(firsts[2].to_string(), "s(s(zero))");
    }

    #[test]
    fn test_malformed_goal_rejected() {
        let kb = family();
        let goal = rel("parent", [Term::Compound(vec![]), var("X")]);
        assert!(matches!(
            resolve(&kb, &goal, &Substitution::new()),
            Err(Error::MalformedTerm(_))
        ));
    }

    #[test]
    fn test_empty_conjunction() {
        let kb = family();
        let theta = Substitution::new().bind(Var::new("X"), atom("a"));
        let results: Vec<_> = Solutions::new(&kb, &[], &theta, SearchConfig::default())
            .unwrap()
            .collect();
        assert_eq!(results, vec![Ok(theta)]);
    }

    #[test]
    fn test_conjunction_query() {
        let kb = family();
        let goals = [
            rel("parent", [var("P"), var("C")]),
            rel("male", [var("C")]),
        ];
        let solutions =
            Solutions::new(&kb, &goals, &Substitution::new(), SearchConfig::default()).unwrap();
        assert_eq!(values(solutions, "C"), vec![atom("bob"), atom("charlie")]);
    }

    #[test]
    fn test_occurs_check_counted() {
        let kb = KnowledgeBase::from_prolog("wrap(X, f(X)).").unwrap();
        let goal = rel("wrap", [var("Y"), var("Y")]);
        let mut solutions = resolve(&kb, &goal, &Substitution::new()).unwrap();
        assert!(solutions.next().is_none());
        assert_eq!(solutions.stats().occurs_check_failures, 1);
        assert_eq!(solutions.stats().unification_failures, 1);
    }

    #[test]
    fn test_proofs() {
        let kb = family();
        let goal = rel("ancestor", [atom("alice"), var("Y")]);
        let proofs: Vec<(Substitution, Proof)> = resolve(&kb, &goal, &Substitution::new())
            .unwrap()
            .with_proofs()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(proofs.len(), 3);

        let (_, first) = &proofs[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first.steps[0].clause, ClauseRef::Rule(0));
        assert_eq!(first.steps[1].goal, rel("parent", [atom("alice"), atom("bob")]));

        let (_, last) = &proofs[2];
        assert_eq!(last.depth(), 3);
        assert_eq!(last.rules_used(), vec![0, 1]);
        for (_, proof) in &proofs {
            proof.verify(&kb, &[goal.clone()]).unwrap();
        }
    }

    #[test]
    fn test_engine_facade() {
        let engine = Engine::new(family()).unwrap();
        assert!(engine.ask(&rel("female", [atom("alice")])).unwrap());
        assert!(!engine.ask(&rel("female", [atom("bob")])).unwrap());

        let answers = engine
            .answers(&rel("ancestor", [atom("bob"), var("Y")]), None)
            .unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].to_string(), "{Y = charlie}");
        assert_eq!(answers[1].to_string(), "{Y = david}");

        let limited = engine
            .answers(&rel("ancestor", [var("X"), var("Y")]), Some(2))
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_engine_stats_accumulate_on_drop() {
        let engine = Engine::new(family()).unwrap();
        {
            let solutions = engine.query(&rel("parent", [var("X"), var("Y")])).unwrap();
            assert_eq!(solutions.count(), 3);
        }
        engine.first(&rel("male", [var("X")])).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.queries, 2);
        assert_eq!(stats.solutions, 4);
        assert!(stats.unifications >= stats.unification_failures);

        engine.clear_stats();
        assert_eq!(engine.stats(), EngineStats::default());
    }

    #[test]
    fn test_engine_budget_is_inconclusive() {
        let kb = KnowledgeBase::from_prolog("loop(X) :- loop(X).").unwrap();
        let engine = Engine::with_config(kb, SearchConfig::strict()).unwrap();
        let err = engine.ask(&rel("loop", [atom("a")])).unwrap_err();
        assert!(err.is_budget_exceeded());
        assert_eq!(engine.stats().budget_exceeded, 1);
    }

    #[test]
    fn test_zero_step_budget_rejected_up_front() {
        let engine =
            Engine::with_config(family(), SearchConfig::unbounded().with_max_steps(0)).unwrap();
        assert!(engine.query(&rel("male", [var("X")])).is_err());
        assert_eq!(engine.stats().budget_exceeded, 1);
    }

    #[test]
    fn test_invalid_kb_never_reaches_search() {
        // A rule with a variable head would match every goal.
        let json = r#"{"facts": [], "rules": [{"head": {"variable": {"name": "X"}}, "body": []}]}"#;
        assert!(serde_json::from_str::<KnowledgeBase>(json).is_err());
        assert!(matches!(
            KnowledgeBase::from_json_str(json),
            Err(Error::InvalidRule(_))
        ));

        let json = r#"{"facts": [{"compound": []}], "rules": []}"#;
        assert!(serde_json::from_str::<KnowledgeBase>(json).is_err());
    }

    #[test]
    fn test_solutions_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Solutions<'static>>();
        assert_send::<Engine>();
    }
}
