//! Substitutions
//!
//! A [`Substitution`] maps variables to terms. It is never changed in place:
//! [`Substitution::bind`] returns an extended copy, so a failed branch of the
//! search can never disturb the bindings its caller holds.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::term::{Term, Var};

/// A finite mapping from variables to terms, in binding order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(Var, Term)>", into = "Vec<(Var, Term)>")]
pub struct Substitution {
    bindings: IndexMap<Var, Term>,
}

impl Substitution {
    /// Creates an empty substitution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The term a variable is directly bound to, if any.
    pub fn get(&self, var: &Var) -> Option<&Term> {
        self.bindings.get(var)
    }

    /// Returns `true` if `var` has a binding.
    pub fn is_bound(&self, var: &Var) -> bool {
        self.bindings.contains_key(var)
    }

    /// Iterates over the direct bindings in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = (&Var, &Term)> {
        self.bindings.iter()
    }

    /// Returns a new substitution extended with `var -> term`.
    ///
    /// `var` should be unbound; callers go through [`unify`](crate::unify::unify),
    /// which only ever binds dereferenced variables after an occurs-check.
    /// Binding a variable to itself is a no-op.
    pub fn bind(&self, var: Var, term: Term) -> Substitution {
        let mut next = self.clone();
        if term.as_var() != Some(&var) {
            next.bindings.insert(var, term);
        }
        next
    }

    /// Consuming form of [`bind`](Self::bind), for callers that own the only copy.
    pub fn with_binding(mut self, var: Var, term: Term) -> Substitution {
        if term.as_var() != Some(&var) {
            self.bindings.insert(var, term);
        }
        self
    }

    /// Follows variable bindings from `term` until reaching an unbound
    /// variable or a non-variable.
    ///
    /// Stops after `len() + 1` hops, so a binding cycle built by hand cannot
    /// make it loop.
    pub fn walk<'a>(&'a self, term: &'a Term) -> &'a Term {
        let mut current = term;
        for _ in 0..=self.bindings.len() {
            match current {
                Term::Variable(v) => match self.bindings.get(v) {
                    Some(next) => current = next,
                    None => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Applies the substitution throughout `term`, resolving chains fully.
    ///
    /// Unbound variables and constants pass through unchanged. A variable
    /// that would expand into itself is left as a variable.
    pub fn substitute(&self, term: &Term) -> Term {
        if self.is_empty() {
            return term.clone();
        }
        let mut expanding = Vec::new();
        self.substitute_in(term, &mut expanding)
    }

    fn substitute_in(&self, term: &Term, expanding: &mut Vec<Var>) -> Term {
        match term {
            Term::Constant(_) => term.clone(),
            Term::Variable(v) => {
                if expanding.contains(v) {
                    return term.clone();
                }
                match self.bindings.get(v) {
                    Some(bound) => {
                        expanding.push(v.clone());
                        let value = self.substitute_in(bound, expanding);
                        expanding.pop();
                        value
                    }
                    None => term.clone(),
                }
            }
            Term::Compound(items) => Term::Compound(
                items
                    .iter()
                    .map(|t| self.substitute_in(t, expanding))
                    .collect(),
            ),
        }
    }

    /// The fully substituted value of `var`; `var` itself when unbound.
    pub fn resolve(&self, var: &Var) -> Term {
        self.substitute(&Term::Variable(var.clone()))
    }

    /// Restricts the substitution to `vars`, fully resolving each value.
    ///
    /// Variables that stay unbound are left out. This is how answers are
    /// presented without the helper variables introduced by renaming rules
    /// apart.
    pub fn project<'v>(&self, vars: impl IntoIterator<Item = &'v Var>) -> Substitution {
        let bindings = vars
            .into_iter()
            .filter_map(|v| {
                let value = self.resolve(v);
                (value.as_var() != Some(v)).then(|| (v.clone(), value))
            })
            .collect();
        Substitution { bindings }
    }

    /// Composes two substitutions so that applying the result equals
    /// applying `self` and then `other`.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut bindings: IndexMap<Var, Term> = self
            .bindings
            .iter()
            .map(|(v, t)| (v.clone(), other.substitute(t)))
            .filter(|(v, t)| t.as_var() != Some(v))
            .collect();
        for (v, t) in &other.bindings {
            if !self.bindings.contains_key(v) {
                bindings.insert(v.clone(), t.clone());
            }
        }
        Substitution { bindings }
    }
}

/// Follows the bindings of `theta` from `term`. See [`Substitution::walk`].
pub fn walk<'a>(term: &'a Term, theta: &'a Substitution) -> &'a Term {
    theta.walk(term)
}

/// Applies `theta` throughout `term`. See [`Substitution::substitute`].
pub fn substitute(term: &Term, theta: &Substitution) -> Term {
    theta.substitute(term)
}

impl FromIterator<(Var, Term)> for Substitution {
    fn from_iter<I: IntoIterator<Item = (Var, Term)>>(iter: I) -> Self {
        Substitution {
            bindings: iter
                .into_iter()
                .filter(|(v, t)| t.as_var() != Some(v))
                .collect(),
        }
    }
}

impl From<Vec<(Var, Term)>> for Substitution {
    fn from(pairs: Vec<(Var, Term)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<Substitution> for Vec<(Var, Term)> {
    fn from(theta: Substitution) -> Self {
        theta.bindings.into_iter().collect()
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (var, term)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", var, term)?;
        }
        f.write_str("}")
    }
}
