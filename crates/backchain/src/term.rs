//! Logical terms
//!
//! A [`Term`] is a constant, a variable, or a compound: an ordered sequence of
//! sub-terms whose first element conventionally names the relation, so
//! `parent(alice, bob)` is the compound `[parent, alice, bob]`.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A logic variable.
///
/// Variables written by callers have generation 0. The engine renames rule
/// variables apart by giving each use of a rule a fresh generation, so two
/// invocations of the same rule never share a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Var {
    name: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    generation: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Var {
    /// Creates a caller-level variable.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            generation: 0,
        }
    }

    /// Returns a copy of this variable tagged with another generation.
    pub fn renamed(&self, generation: usize) -> Self {
        Self {
            name: self.name.clone(),
            generation,
        }
    }

    /// The variable's name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The renaming generation; 0 for variables supplied by the caller.
    pub fn generation(&self) -> usize {
        self.generation
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            f.write_str(&self.name)
        } else {
            write!(f, "{}_{}", self.name, self.generation)
        }
    }
}

/// An opaque identifier or literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    /// A symbolic constant such as `alice`.
    Atom(String),
    /// An integer literal. Compared by value only; there is no arithmetic.
    Integer(i64),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Atom(name) if is_plain_atom(name) => f.write_str(name),
            Constant::Atom(name) => {
                f.write_str("'")?;
                for c in name.chars() {
                    match c {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("'")
            }
            Constant::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// An atom that can be written without quotes.
pub(crate) fn is_plain_atom(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_lowercase() => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Whether a string in list encoding denotes a variable.
fn reads_as_variable(name: &str) -> bool {
    matches!(name.chars().next(), Some(c) if c.is_uppercase() || c == '_')
}

/// Returns `true` if `term` is a variable.
pub fn is_variable(term: &Term) -> bool {
    term.is_variable()
}

/// A logical term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// A constant, compared by equality.
    Constant(Constant),
    /// A variable, identified by name and generation.
    Variable(Var),
    /// An ordered, non-empty sequence of sub-terms.
    Compound(Vec<Term>),
}

impl Term {
    /// Creates an atom.
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Constant(Constant::Atom(name.into()))
    }

    /// Creates an integer constant.
    pub fn int(value: i64) -> Self {
        Term::Constant(Constant::Integer(value))
    }

    /// Creates a caller-level variable.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(Var::new(name))
    }

    /// Creates a compound from its elements.
    pub fn compound(items: impl IntoIterator<Item = Term>) -> Self {
        Term::Compound(items.into_iter().collect())
    }

    /// Creates a relation application, e.g. `relation("parent", [alice, bob])`.
    pub fn relation(functor: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        let mut items = vec![Term::atom(functor)];
        items.extend(args);
        Term::Compound(items)
    }

    /// Returns `true` if this term is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// Returns `true` if this term is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// Returns `true` if this term is a compound.
    pub fn is_compound(&self) -> bool {
        matches!(self, Term::Compound(_))
    }

    /// Returns the variable if this term is one.
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `true` if the term contains no variables.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Constant(_) => true,
            Term::Variable(_) => false,
            Term::Compound(items) => items.iter().all(Term::is_ground),
        }
    }

    /// Distinct variables of the term, in order of first occurrence.
    pub fn variables(&self) -> Vec<Var> {
        let mut seen = IndexSet::new();
        self.collect_variables(&mut seen);
        seen.into_iter().collect()
    }

    pub(crate) fn collect_variables(&self, seen: &mut IndexSet<Var>) {
        match self {
            Term::Constant(_) => {}
            Term::Variable(v) => {
                seen.insert(v.clone());
            }
            Term::Compound(items) => items.iter().for_each(|t| t.collect_variables(seen)),
        }
    }

    /// Highest variable generation occurring in the term.
    pub(crate) fn max_generation(&self) -> usize {
        match self {
            Term::Constant(_) => 0,
            Term::Variable(v) => v.generation,
            Term::Compound(items) => items.iter().map(Term::max_generation).max().unwrap_or(0),
        }
    }

    /// Name and arity of a relation-shaped term.
    ///
    /// `parent(alice, bob)` is `("parent", 2)`; a bare atom `rains` is
    /// `("rains", 0)`. Variables, integers and compounds headed by anything
    /// other than an atom have no functor.
    pub fn functor(&self) -> Option<(&str, usize)> {
        match self {
            Term::Constant(Constant::Atom(name)) => Some((name.as_str(), 0)),
            Term::Compound(items) => match items.first() {
                Some(Term::Constant(Constant::Atom(name))) => {
                    Some((name.as_str(), items.len() - 1))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Arguments of a relation-shaped compound (everything after the functor).
    pub fn args(&self) -> &[Term] {
        match self {
            Term::Compound(items) if self.functor().is_some() => &items[1..],
            _ => &[],
        }
    }

    /// Rebuilds the term, replacing every variable with `f(var)`.
    pub fn map_variables<F>(&self, f: &mut F) -> Term
    where
        F: FnMut(&Var) -> Term,
    {
        match self {
            Term::Constant(_) => self.clone(),
            Term::Variable(v) => f(v),
            Term::Compound(items) => {
                Term::Compound(items.iter().map(|t| t.map_variables(f)).collect())
            }
        }
    }

    /// Checks the term against the grammar.
    ///
    /// Rejects empty compounds, empty atom names and empty variable names.
    pub fn validate(&self) -> Result<()> {
        match self {
            Term::Constant(Constant::Atom(name)) if name.is_empty() => {
                Err(Error::MalformedTerm("atom with an empty name".to_string()))
            }
            Term::Constant(_) => Ok(()),
            Term::Variable(v) if v.name.is_empty() => {
                Err(Error::MalformedTerm("variable with an empty name".to_string()))
            }
            Term::Variable(_) => Ok(()),
            Term::Compound(items) if items.is_empty() => {
                Err(Error::MalformedTerm("empty compound".to_string()))
            }
            Term::Compound(items) => items.iter().try_for_each(Term::validate),
        }
    }

    /// Decodes the list encoding: strings are atoms unless their first
    /// character is uppercase or `_`, in which case they are variables;
    /// integers are integer constants; arrays are compounds.
    ///
    /// ```
    /// use backchain::Term;
    ///
    /// let json = serde_json::json!(["parent", "X", "bob"]);
    /// let term = Term::from_list_json(&json).unwrap();
    /// assert_eq!(term.to_string(), "parent(X, bob)");
    /// ```
    pub fn from_list_json(value: &serde_json::Value) -> Result<Term> {
        use serde_json::Value;

        match value {
            Value::String(s) => {
                let term = if reads_as_variable(s) {
                    Term::var(s.clone())
                } else {
                    Term::atom(s.clone())
                };
                term.validate()?;
                Ok(term)
            }
            Value::Number(n) => n.as_i64().map(Term::int).ok_or_else(|| {
                Error::MalformedTerm(format!("number {} is not an integer constant", n))
            }),
            Value::Array(items) if items.is_empty() => {
                Err(Error::MalformedTerm("empty compound".to_string()))
            }
            Value::Array(items) => items
                .iter()
                .map(Term::from_list_json)
                .collect::<Result<Vec<_>>>()
                .map(Term::Compound),
            other => Err(Error::MalformedTerm(format!(
                "{} is not a term in list encoding",
                other
            ))),
        }
    }

    /// Encodes the term in the list encoding understood by [`Term::from_list_json`].
    ///
    /// The encoding tells atoms from variables by their first character, so
    /// atoms that start with an uppercase letter or `_`, variables that do
    /// not, and renamed variables have no faithful encoding and are rejected
    /// with [`Error::MalformedTerm`].
    pub fn to_list_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value;

        match self {
            Term::Constant(Constant::Atom(name)) if reads_as_variable(name) => {
                Err(Error::MalformedTerm(format!(
                    "atom '{}' would read back as a variable in list encoding",
                    name
                )))
            }
            Term::Constant(Constant::Atom(name)) => Ok(Value::String(name.clone())),
            Term::Constant(Constant::Integer(i)) => Ok(Value::from(*i)),
            Term::Variable(v) if v.generation != 0 || !reads_as_variable(&v.name) => {
                Err(Error::MalformedTerm(format!(
                    "variable {} has no list encoding",
                    v
                )))
            }
            Term::Variable(v) => Ok(Value::String(v.name.clone())),
            Term::Compound(items) => items
                .iter()
                .map(Term::to_list_json)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Variable(v)
    }
}

impl From<Constant> for Term {
    fn from(c: Constant) -> Self {
        Term::Constant(c)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(c) => write!(f, "{}", c),
            Term::Variable(v) => write!(f, "{}", v),
            Term::Compound(items) => {
                let (open, close, args) = match items.split_first() {
                    Some((head @ Term::Constant(Constant::Atom(_)), rest)) => {
                        write!(f, "{}", head)?;
                        ("(", ")", rest)
                    }
                    _ => ("[", "]", items.as_slice()),
                };
                f.write_str(open)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(close)
            }
        }
    }
}
