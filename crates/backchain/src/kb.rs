//! Knowledge bases
//!
//! A [`KnowledgeBase`] is an ordered list of facts and an ordered list of
//! Horn-clause [`Rule`]s. It is built once, validated, and then only read by
//! the engine, so any number of queries can borrow it at the same time.

use std::fmt;
use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::term::{Term, Var};

/// A Horn clause: `head` holds whenever every goal in `body` holds.
///
/// Deserialization validates the rule, so a rule that fails
/// [`validate`](Rule::validate) cannot be read from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRule")]
pub struct Rule {
    /// The conclusion.
    pub head: Term,
    /// Goals solved left to right.
    pub body: Vec<Term>,
}

/// Wire form of a [`Rule`] before validation.
#[derive(Deserialize)]
struct RawRule {
    head: Term,
    #[serde(default)]
    body: Vec<Term>,
}

impl TryFrom<RawRule> for Rule {
    type Error = Error;

    fn try_from(raw: RawRule) -> Result<Self> {
        let rule = Rule::new(raw.head, raw.body);
        rule.validate()?;
        Ok(rule)
    }
}

impl Rule {
    /// Creates a new rule.
    pub fn new(head: Term, body: impl IntoIterator<Item = Term>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Checks the rule against the term grammar.
    ///
    /// The head must name a relation: a variable or an integer cannot be the
    /// conclusion of a rule.
    pub fn validate(&self) -> Result<()> {
        self.head.validate()?;
        if self.head.functor().is_none() {
            return Err(Error::InvalidRule(format!(
                "rule head {} does not name a relation",
                self.head
            )));
        }
        self.body.iter().try_for_each(Term::validate)
    }

    /// Distinct variables of the rule, head first.
    pub fn variables(&self) -> Vec<Var> {
        let mut seen = IndexSet::new();
        self.head.collect_variables(&mut seen);
        for goal in &self.body {
            goal.collect_variables(&mut seen);
        }
        seen.into_iter().collect()
    }

    /// Returns a copy with every variable moved to `generation`.
    pub fn renamed(&self, generation: usize) -> Rule {
        let mut rename = |v: &Var| Term::Variable(v.renamed(generation));
        Rule {
            head: self.head.map_variables(&mut rename),
            body: self
                .body
                .iter()
                .map(|g| g.map_variables(&mut rename))
                .collect(),
        }
    }

    /// Decodes `[head, [goal, ...]]` in the list encoding.
    pub fn from_list_json(value: &serde_json::Value) -> Result<Rule> {
        let pair = value.as_array().filter(|items| items.len() == 2).ok_or_else(|| {
            Error::InvalidRule(format!("expected [head, [goals...]], found {}", value))
        })?;
        let head = Term::from_list_json(&pair[0])?;
        let body = pair[1]
            .as_array()
            .ok_or_else(|| Error::InvalidRule(format!("rule body {} is not a list", pair[1])))?
            .iter()
            .map(Term::from_list_json)
            .collect::<Result<Vec<_>>>()?;
        let rule = Rule::new(head, body);
        rule.validate()?;
        Ok(rule)
    }

    /// Encodes the rule as `[head, [goal, ...]]`.
    ///
    /// Fails like [`Term::to_list_json`] on terms the encoding cannot carry.
    pub fn to_list_json(&self) -> Result<serde_json::Value> {
        let body = self
            .body
            .iter()
            .map(Term::to_list_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::json!([self.head.to_list_json()?, body]))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (i, goal) in self.body.iter().enumerate() {
            f.write_str(if i == 0 { " :- " } else { ", " })?;
            write!(f, "{}", goal)?;
        }
        f.write_str(".")
    }
}

/// Ordered facts and rules.
///
/// Every constructor validates, deserialization included, so a
/// `KnowledgeBase` value always satisfies [`validate`](Self::validate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawKnowledgeBase")]
pub struct KnowledgeBase {
    facts: Vec<Term>,
    rules: Vec<Rule>,
}

/// Wire form of a [`KnowledgeBase`] before validation.
#[derive(Deserialize)]
struct RawKnowledgeBase {
    #[serde(default)]
    facts: Vec<Term>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

impl TryFrom<RawKnowledgeBase> for KnowledgeBase {
    type Error = Error;

    fn try_from(raw: RawKnowledgeBase) -> Result<Self> {
        let rules = raw
            .rules
            .into_iter()
            .map(Rule::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_parts(raw.facts, rules)
    }
}

impl KnowledgeBase {
    /// Creates an empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates a knowledge base.
    pub fn from_parts(
        facts: impl IntoIterator<Item = Term>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Result<Self> {
        let kb = Self {
            facts: facts.into_iter().collect(),
            rules: rules.into_iter().collect(),
        };
        kb.validate()?;
        Ok(kb)
    }

    /// Appends a fact after validating it.
    pub fn add_fact(&mut self, fact: Term) -> Result<()> {
        fact.validate()?;
        self.facts.push(fact);
        Ok(())
    }

    /// Appends a rule after validating it.
    pub fn add_rule(&mut self, rule: Rule) -> Result<()> {
        rule.validate()?;
        self.rules.push(rule);
        Ok(())
    }

    /// Builder form of [`add_fact`](Self::add_fact).
    pub fn with_fact(mut self, fact: Term) -> Result<Self> {
        self.add_fact(fact)?;
        Ok(self)
    }

    /// Builder form of [`add_rule`](Self::add_rule).
    pub fn with_rule(mut self, head: Term, body: impl IntoIterator<Item = Term>) -> Result<Self> {
        self.add_rule(Rule::new(head, body))?;
        Ok(self)
    }

    /// Appends every fact and rule of `other`, keeping order.
    pub fn extend(&mut self, other: KnowledgeBase) {
        self.facts.extend(other.facts);
        self.rules.extend(other.rules);
    }

    /// Facts in insertion order.
    pub fn facts(&self) -> &[Term] {
        &self.facts
    }

    /// Rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Total number of clauses.
    pub fn len(&self) -> usize {
        self.facts.len() + self.rules.len()
    }

    /// Returns `true` if there are no facts and no rules.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.rules.is_empty()
    }

    /// Validates every fact and rule.
    ///
    /// Knowledge bases built through `add_*` are always valid; this matters
    /// for ones that were deserialized.
    pub fn validate(&self) -> Result<()> {
        self.facts.iter().try_for_each(Term::validate)?;
        self.rules.iter().try_for_each(Rule::validate)
    }

    /// Facts whose functor is `relation`, of any arity.
    pub fn facts_for<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.facts
            .iter()
            .filter(move |f| matches!(f.functor(), Some((name, _)) if name == relation))
    }

    /// Argument pairs of the binary facts of `relation`, in order.
    ///
    /// `pairs("parent")` over `parent(alice, bob)` gives `(alice, bob)`.
    pub fn pairs(&self, relation: &str) -> Vec<(Term, Term)> {
        self.facts_for(relation)
            .filter_map(|f| match f.args() {
                [a, b] => Some((a.clone(), b.clone())),
                _ => None,
            })
            .collect()
    }

    /// Distinct relation signatures (`name`, arity) of facts and rule heads.
    pub fn relations(&self) -> Vec<(String, usize)> {
        let heads = self.rules.iter().map(|r| &r.head);
        let signatures: IndexSet<(String, usize)> = self
            .facts
            .iter()
            .chain(heads)
            .filter_map(|t| t.functor().map(|(name, arity)| (name.to_string(), arity)))
            .collect();
        signatures.into_iter().collect()
    }

    /// Parses a knowledge base from Prolog-style clause text.
    ///
    /// Queries (`?- goal.`) in the text are ignored; use
    /// [`parse_program`](crate::parser::parse_program) to keep them.
    pub fn from_prolog(text: &str) -> Result<Self> {
        crate::parser::parse_program(text).map(|program| program.kb)
    }

    /// Deserializes and validates a knowledge base from its serde JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawKnowledgeBase = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Loads a knowledge base from a JSON file.
    ///
    /// Both the serde form and the list encoding are accepted. The list
    /// encoding is recognized by its first clause, the first fact or else the
    /// first rule, being a JSON array. With no clauses the two forms agree.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let first = |key: &str| value.get(key).and_then(|v| v.as_array()?.first());
        let list_encoded = first("facts")
            .or_else(|| first("rules"))
            .map(serde_json::Value::is_array)
            .unwrap_or(false);
        if list_encoded {
            Self::from_list_json(&value)
        } else {
            let raw: RawKnowledgeBase = serde_json::from_value(value)?;
            Self::try_from(raw)
        }
    }

    /// Serializes the knowledge base to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }

    /// Decodes `{"facts": [...], "rules": [[head, [goals...]], ...]}` in the
    /// list encoding, where uppercase-initial strings are variables.
    pub fn from_list_json(value: &serde_json::Value) -> Result<Self> {
        let section = |key: &str| -> Result<Vec<serde_json::Value>> {
            match value.get(key) {
                None => Ok(Vec::new()),
                Some(serde_json::Value::Array(items)) => Ok(items.clone()),
                Some(other) => Err(Error::MalformedTerm(format!(
                    "\"{}\" must be a list, found {}",
                    key, other
                ))),
            }
        };
        let facts = section("facts")?
            .iter()
            .map(Term::from_list_json)
            .collect::<Result<Vec<_>>>()?;
        let rules = section("rules")?
            .iter()
            .map(Rule::from_list_json)
            .collect::<Result<Vec<_>>>()?;
        Self::from_parts(facts, rules)
    }

    /// Encodes the knowledge base in the list encoding.
    ///
    /// Knowledge bases with atoms such as `'New York'` have no list encoding;
    /// use [`to_json`](Self::to_json) for those.
    pub fn to_list_json(&self) -> Result<serde_json::Value> {
        let facts = self
            .facts
            .iter()
            .map(Term::to_list_json)
            .collect::<Result<Vec<_>>>()?;
        let rules = self
            .rules
            .iter()
            .map(Rule::to_list_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(serde_json::json!({ "facts": facts, "rules": rules }))
    }
}

impl fmt::Display for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fact in &self.facts {
            writeln!(f, "{}.", fact)?;
        }
        for rule in &self.rules {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parent(a: &str, b: &str) -> Term {
        Term::relation("parent", [Term::atom(a), Term::atom(b)])
    }

    #[test]
    fn test_rule_display() {
        let rule = Rule::new(
            Term::relation("ancestor", [Term::var("X"), Term::var("Y")]),
            [
                Term::relation("parent", [Term::var("X"), Term::var("Z")]),
                Term::relation("ancestor", [Term::var("Z"), Term::var("Y")]),
            ],
        );
        assert_eq!(
            rule.to_string(),
            "ancestor(X, Y) :- parent(X, Z), ancestor(Z, Y)."
        );
        assert_eq!(
            rule.variables(),
            vec![Var::new("X"), Var::new("Y"), Var::new("Z")]
        );
    }

    #[test]
    fn test_rule_renamed() {
        let rule = Rule::new(
            Term::relation("p", [Term::var("X")]),
            [Term::relation("q", [Term::var("X"), Term::atom("a")])],
        );
        let renamed = rule.renamed(7);
        assert_eq!(renamed.to_string(), "p(X_7) :- q(X_7, a).");
        assert_eq!(rule.to_string(), "p(X) :- q(X, a).");
    }

    #[test]
    fn test_rule_head_must_name_relation() {
        let rule = Rule::new(Term::var("X"), [Term::atom("true")]);
        assert!(matches!(rule.validate(), Err(Error::InvalidRule(_))));

        let mut kb = KnowledgeBase::new();
        assert!(kb.add_rule(Rule::new(Term::int(3), [])).is_err());
        assert!(kb.is_empty());
    }

    #[test]
    fn test_add_fact_rejects_malformed() {
        let mut kb = KnowledgeBase::new();
        let bad = Term::relation("p", [Term::Compound(vec![])]);
        assert!(matches!(kb.add_fact(bad), Err(Error::MalformedTerm(_))));
        assert!(kb.is_empty());
    }

    #[test]
    fn test_pairs_and_relations() {
        let kb = KnowledgeBase::new()
            .with_fact(parent("alice", "bob"))
            .unwrap()
            .with_fact(parent("bob", "charlie"))
            .unwrap()
            .with_fact(Term::relation("male", [Term::atom("bob")]))
            .unwrap()
            .with_rule(
                Term::relation("grandparent", [Term::var("X"), Term::var("Z")]),
                [
                    Term::relation("parent", [Term::var("X"), Term::var("Y")]),
                    Term::relation("parent", [Term::var("Y"), Term::var("Z")]),
                ],
            )
            .unwrap();

        assert_eq!(
            kb.pairs("parent"),
            vec![
                (Term::atom("alice"), Term::atom("bob")),
                (Term::atom("bob"), Term::atom("charlie")),
            ]
        );
        assert!(kb.pairs("male").is_empty());
        assert_eq!(kb.facts_for("male").count(), 1);
        assert_eq!(
            kb.relations(),
            vec![
                ("parent".to_string(), 2),
                ("male".to_string(), 1),
                ("grandparent".to_string(), 2),
            ]
        );
        assert_eq!(kb.len(), 4);
    }

    #[test]
    fn test_list_json() {
        let value = json!({
            "facts": [["parent", "alice", "bob"], ["female", "alice"]],
            "rules": [[["ancestor", "X", "Y"], [["parent", "X", "Y"]]]]
        });
        let kb = KnowledgeBase::from_list_json(&value).unwrap();
        assert_eq!(kb.facts().len(), 2);
        assert_eq!(kb.rules()[0].to_string(), "ancestor(X, Y) :- parent(X, Y).");
        assert_eq!(kb.to_list_json().unwrap(), value);
    }

    #[test]
    fn test_list_json_rejects_bad_rules() {
        let value = json!({ "rules": [[["p", "X"]]] });
        assert!(matches!(
            KnowledgeBase::from_list_json(&value),
            Err(Error::InvalidRule(_))
        ));
        let value = json!({ "facts": "parent" });
        assert!(KnowledgeBase::from_list_json(&value).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let kb = KnowledgeBase::new()
            .with_fact(parent("alice", "bob"))
            .unwrap()
            .with_rule(
                Term::relation("child", [Term::var("C"), Term::var("P")]),
                [Term::relation("parent", [Term::var("P"), Term::var("C")])],
            )
            .unwrap();
        let json = kb.to_json().unwrap();
        assert_eq!(KnowledgeBase::from_json_str(&json).unwrap(), kb);
    }

    #[test]
    fn test_from_json_str_validates() {
        let json = r#"{"facts": [{"compound": []}]}"#;
        assert!(matches!(
            KnowledgeBase::from_json_str(json),
            Err(Error::MalformedTerm(_))
        ));

        let json = r#"{"rules": [{"head": {"variable": {"name": "X"}}, "body": []}]}"#;
        assert!(matches!(
            KnowledgeBase::from_json_str(json),
            Err(Error::InvalidRule(_))
        ));
    }

    #[test]
    fn test_serde_rejects_invalid_clauses() {
        let bad_fact = r#"{"facts": [{"compound": []}], "rules": []}"#;
        assert!(serde_json::from_str::<KnowledgeBase>(bad_fact).is_err());

        let variable_head = r#"{"facts": [], "rules": [{"head": {"variable": {"name": "X"}}, "body": []}]}"#;
        assert!(serde_json::from_str::<KnowledgeBase>(variable_head).is_err());

        let rule = r#"{"head": {"constant": {"integer": 3}}, "body": []}"#;
        assert!(serde_json::from_str::<Rule>(rule).is_err());

        let good = r#"{"rules": [{"head": {"constant": {"atom": "rains"}}}]}"#;
        let kb: KnowledgeBase = serde_json::from_str(good).unwrap();
        assert_eq!(kb.rules().len(), 1);
        assert!(kb.facts().is_empty());
    }

    #[test]
    fn test_list_json_keeps_quoted_atoms_ground() {
        let kb = KnowledgeBase::from_prolog("city('New York').").unwrap();
        assert!(matches!(kb.to_list_json(), Err(Error::MalformedTerm(_))));

        let kb = KnowledgeBase::from_prolog("city(london).\nbig(C) :- city(C).").unwrap();
        let value = kb.to_list_json().unwrap();
        assert_eq!(KnowledgeBase::from_list_json(&value).unwrap(), kb);
    }

    #[test]
    fn test_display_program() {
        let kb = KnowledgeBase::new()
            .with_fact(parent("alice", "bob"))
            .unwrap()
            .with_rule(
                Term::relation("child", [Term::var("C"), Term::var("P")]),
                [Term::relation("parent", [Term::var("P"), Term::var("C")])],
            )
            .unwrap();
        assert_eq!(
            kb.to_string(),
            "parent(alice, bob).\nchild(C, P) :- parent(P, C).\n"
        );
    }
}
