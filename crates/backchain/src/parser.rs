//! Prolog-style clause syntax
//!
//! Accepts the subset of Prolog that front ends emit for this engine:
//!
//! ```text
//! % family tree
//! parent(alice, bob).
//! ancestor(X, Y) :- parent(X, Z), ancestor(Z, Y).
//! ?- ancestor(alice, Who).
//! ```
//!
//! Atoms are lowercase identifiers or single-quoted text, variables start
//! with an uppercase letter or `_`, integers may be negative. `[a, b]` writes
//! a compound directly. Each `_` is a distinct anonymous variable.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Error, Result};
use crate::kb::{KnowledgeBase, Rule};
use crate::term::Term;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Atom(String),
    Variable(String),
    Integer(i64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Neck,
    Query,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Atom(a) => format!("atom '{}'", a),
            Token::Variable(v) => format!("variable {}", v),
            Token::Integer(i) => format!("integer {}", i),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Neck => "':-'".to_string(),
            Token::Query => "'?-'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    column: usize,
}

impl Position {
    fn error(self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '%' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<(Token, Position)> {
        self.skip_trivia();
        let start = self.position();
        let Some(c) = self.peek() else {
            return Ok((Token::Eof, start));
        };

        let token = match c {
            '(' | ')' | '[' | ']' | ',' | '.' => {
                self.bump();
                match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    _ => Token::Dot,
                }
            }
            ':' | '?' => {
                self.bump();
                if self.peek() != Some('-') {
                    return Err(start.error(format!("expected '-' after '{}'", c)));
                }
                self.bump();
                if c == ':' {
                    Token::Neck
                } else {
                    Token::Query
                }
            }
            '\'' => {
                self.bump();
                Token::Atom(self.quoted(start)?)
            }
            '-' => {
                self.bump();
                match self.peek() {
                    Some(d) if d.is_ascii_digit() => Token::Integer(self.integer(true, start)?),
                    _ => return Err(start.error("unexpected '-'")),
                }
            }
            c if c.is_ascii_digit() => Token::Integer(self.integer(false, start)?),
            c if c.is_alphabetic() || c == '_' => {
                let word = self.word();
                if c.is_uppercase() || c == '_' {
                    Token::Variable(word)
                } else {
                    Token::Atom(word)
                }
            }
            other => return Err(start.error(format!("unexpected character '{}'", other))),
        };
        Ok((token, start))
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn integer(&mut self, negative: bool, start: Position) -> Result<i64> {
        let mut digits = String::new();
        if negative {
            digits.push('-');
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        digits
            .parse()
            .map_err(|_| start.error(format!("integer {} out of range", digits)))
    }

    fn quoted(&mut self, start: Position) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(start.error("unterminated quoted atom")),
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    text.push('\'');
                }
                Some('\'') => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c @ ('\\' | '\'')) => text.push(c),
                    Some(c) => {
                        return Err(self.position().error(format!("unknown escape '\\{}'", c)))
                    }
                    None => return Err(start.error("unterminated quoted atom")),
                },
                Some(c) => text.push(c),
            }
        }
    }
}

/// A parsed clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `head.`
    Fact(Term),
    /// `head :- goal, ... .`
    Rule(Rule),
    /// `?- goal, ... .`
    Query(Vec<Term>),
}

/// Facts and rules of a program text, plus the queries it poses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// The clauses, in source order.
    pub kb: KnowledgeBase,
    /// Conjunctive queries, in source order.
    pub queries: Vec<Vec<Term>>,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    position: Position,
    anonymous: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let (current, position) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            position,
            anonymous: 0,
        })
    }

    fn advance(&mut self) -> Result<Token> {
        let (next, position) = self.lexer.next_token()?;
        self.position = position;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> Error {
        self.position.error(format!(
            "expected {}, found {}",
            wanted,
            self.current.describe()
        ))
    }

    fn at_eof(&self) -> bool {
        self.current == Token::Eof
    }

    fn term(&mut self) -> Result<Term> {
        let start = self.position;
        match self.advance()? {
            Token::Variable(name) if name == "_" => {
                self.anonymous += 1;
                Ok(Term::var(format!("_{}", self.anonymous)))
            }
            Token::Variable(name) => Ok(Term::var(name)),
            Token::Integer(i) => Ok(Term::int(i)),
            Token::Atom(name) => {
                if self.current != Token::LParen {
                    return Ok(Term::atom(name));
                }
                self.advance()?;
                let mut items = vec![Term::atom(name)];
                if self.current != Token::RParen {
                    items.extend(self.sequence()?);
                }
                self.expect(Token::RParen)?;
                Ok(Term::Compound(items))
            }
            Token::LBracket => {
                if self.current == Token::RBracket {
                    return Err(start.error("empty compound"));
                }
                let items = self.sequence()?;
                self.expect(Token::RBracket)?;
                Ok(Term::Compound(items))
            }
            other => Err(start.error(format!("expected a term, found {}", other.describe()))),
        }
    }

    fn sequence(&mut self) -> Result<Vec<Term>> {
        let mut items = vec![self.term()?];
        while self.current == Token::Comma {
            self.advance()?;
            items.push(self.term()?);
        }
        Ok(items)
    }

    fn clause(&mut self) -> Result<Clause> {
        let start = self.position;
        if self.current == Token::Query {
            self.advance()?;
            let goals = self.sequence()?;
            self.expect(Token::Dot)?;
            return Ok(Clause::Query(goals));
        }

        let head = self.term()?;
        let clause = if self.current == Token::Neck {
            self.advance()?;
            let rule = Rule::new(head, self.sequence()?);
            rule.validate().map_err(|e| start.error(e.to_string()))?;
            Clause::Rule(rule)
        } else {
            Clause::Fact(head)
        };
        self.expect(Token::Dot)?;
        Ok(clause)
    }
}

/// Parses a single term. A trailing `.` is allowed.
pub fn parse_term(text: &str) -> Result<Term> {
    let mut parser = Parser::new(text)?;
    let term = parser.term()?;
    if parser.current == Token::Dot {
        parser.advance()?;
    }
    if !parser.at_eof() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(term)
}

/// Parses a single fact, rule or query, terminated by `.`.
pub fn parse_clause(text: &str) -> Result<Clause> {
    let mut parser = Parser::new(text)?;
    let clause = parser.clause()?;
    if !parser.at_eof() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(clause)
}

/// Parses a whole program.
pub fn parse_program(text: &str) -> Result<Program> {
    let mut parser = Parser::new(text)?;
    let mut program = Program::default();
    while !parser.at_eof() {
        match parser.clause()? {
            Clause::Fact(fact) => program.kb.add_fact(fact)?,
            Clause::Rule(rule) => program.kb.add_rule(rule)?,
            Clause::Query(goals) => program.queries.push(goals),
        }
    }
    Ok(program)
}
