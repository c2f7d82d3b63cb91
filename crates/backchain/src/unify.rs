//! Unification with occurs-check
//!
//! [`unify`] computes the most general extension of a substitution that makes
//! two terms equal. Failure is an ordinary value ([`Mismatch`]) rather than an
//! [`Error`](crate::Error): the engine uses it to prune alternatives, and it
//! is distinct from running out of solutions.

use std::borrow::Cow;

use thiserror::Error;

use crate::substitution::Substitution;
use crate::term::{Term, Var};

/// Why two terms have no unifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Two distinct constants, or a constant against a compound.
    #[error("cannot unify {left} with {right}")]
    Clash { left: Term, right: Term },

    /// Two compounds with a different number of elements.
    #[error("arity mismatch: {left} has {left_len} elements, {right} has {right_len}")]
    Arity {
        left: Term,
        right: Term,
        left_len: usize,
        right_len: usize,
    },

    /// Binding the variable would make it contain itself, as in `X = f(X)`.
    #[error("occurs check: {var} occurs in {term}")]
    OccursCheck { var: Var, term: Term },
}

impl Mismatch {
    /// Returns `true` for occurs-check violations.
    pub fn is_occurs_check(&self) -> bool {
        matches!(self, Mismatch::OccursCheck { .. })
    }
}

/// Returns `true` if `var` occurs anywhere inside `term` once the bindings of
/// `theta` are followed.
pub fn occurs_check(var: &Var, term: &Term, theta: &Substitution) -> bool {
    match theta.walk(term) {
        Term::Variable(v) => v == var,
        Term::Compound(items) => items.iter().any(|t| occurs_check(var, t, theta)),
        Term::Constant(_) => false,
    }
}

/// Unifies `x` and `y` under `theta`.
///
/// On success returns `theta` extended with the fewest bindings that make
/// both sides equal; `theta` itself is left untouched either way.
///
/// ```
/// use backchain::{unify, Substitution, Term};
///
/// let x = Term::relation("parent", [Term::var("X"), Term::atom("charlie")]);
/// let y = Term::relation("parent", [Term::atom("bob"), Term::atom("charlie")]);
/// let theta = unify(&x, &y, &Substitution::new()).unwrap();
/// assert_eq!(theta.substitute(&Term::var("X")), Term::atom("bob"));
/// ```
pub fn unify(x: &Term, y: &Term, theta: &Substitution) -> Result<Substitution, Mismatch> {
    let mut extended = theta.clone();
    unify_in(x, y, &mut extended)?;
    Ok(extended)
}

/// Dereferences `term`, borrowing it when it is not bound and cloning only
/// the value it is bound to otherwise.
fn deref<'t>(term: &'t Term, theta: &Substitution) -> Cow<'t, Term> {
    let end = theta.walk(term);
    if std::ptr::eq(end, term) {
        Cow::Borrowed(term)
    } else {
        Cow::Owned(end.clone())
    }
}

fn unify_in(x: &Term, y: &Term, theta: &mut Substitution) -> Result<(), Mismatch> {
    let left = deref(x, theta);
    let right = deref(y, theta);

    if left == right {
        return Ok(());
    }

    match (left.as_ref(), right.as_ref()) {
        (Term::Variable(var), other) | (other, Term::Variable(var)) => {
            if occurs_check(var, other, theta) {
                return Err(Mismatch::OccursCheck {
                    var: var.clone(),
                    term: theta.substitute(other),
                });
            }
            *theta = std::mem::take(theta).with_binding(var.clone(), other.clone());
            Ok(())
        }
        (Term::Compound(a), Term::Compound(b)) => {
            if a.len() != b.len() {
                return Err(Mismatch::Arity {
                    left: left.clone().into_owned(),
                    right: right.clone().into_owned(),
                    left_len: a.len(),
                    right_len: b.len(),
                });
            }
            a.iter()
                .zip(b)
                .try_for_each(|(l, r)| unify_in(l, r, theta))
        }
        _ => Err(Mismatch::Clash {
            left: left.clone().into_owned(),
            right: right.clone().into_owned(),
        }),
    }
}

/// Returns `true` if `x` and `y` have a unifier under `theta`.
pub fn unifiable(x: &Term, y: &Term, theta: &Substitution) -> bool {
    unify(x, y, theta).is_ok()
}
