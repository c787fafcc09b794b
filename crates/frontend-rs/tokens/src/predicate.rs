//! Token predicates
//!
//! Small boolean matchers over a single token, composable with `&` and `|`.
//! The parser uses them on the current and next token to pick a production
//! without backtracking.

use crate::{Token, TokenKind};
use std::ops::{BitAnd, BitOr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Token kind equality
    Kind(TokenKind),
    /// Exact text equality
    Text(&'static str),
    /// Uppercased text equality
    Upper(&'static str),
    /// A special symbol with the given text
    Symbol(&'static str),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Predicate::Kind(kind) => token.kind == *kind,
            Predicate::Text(text) => token.text == *text,
            Predicate::Upper(upper) => token.text.eq_ignore_ascii_case(upper),
            Predicate::Symbol(symbol) => token.is_symbol(symbol),
            Predicate::And(a, b) => a.matches(token) && b.matches(token),
            Predicate::Or(a, b) => a.matches(token) || b.matches(token),
        }
    }

    /// Human readable description used in "expected ..." messages
    pub fn describe(&self) -> String {
        match self {
            Predicate::Kind(kind) => kind.to_string(),
            Predicate::Text(text) | Predicate::Symbol(text) => format!("'{}'", text),
            Predicate::Upper(upper) => format!("'{}'", upper.to_ascii_lowercase()),
            Predicate::And(a, b) => match (a.as_ref(), b.as_ref()) {
                (Predicate::Kind(_), Predicate::Upper(_)) => b.describe(),
                _ => format!("{} and {}", a.describe(), b.describe()),
            },
            Predicate::Or(a, b) => format!("{} or {}", a.describe(), b.describe()),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(rhs))
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(rhs))
    }
}

pub fn kind(kind: TokenKind) -> Predicate {
    Predicate::Kind(kind)
}

pub fn symbol(text: &'static str) -> Predicate {
    Predicate::Symbol(text)
}

/// A reserved word, matched case-insensitively
pub fn reserved(word: &'static str) -> Predicate {
    kind(TokenKind::ReservedWord) & Predicate::Upper(word)
}

/// A directive word, matched case-insensitively
pub fn directive(word: &'static str) -> Predicate {
    (kind(TokenKind::Directive) | kind(TokenKind::PortabilityDirective)) & Predicate::Upper(word)
}

/// Any token that can stand for an identifier
pub fn identifier() -> Predicate {
    kind(TokenKind::Identifier) | kind(TokenKind::Directive) | kind(TokenKind::PortabilityDirective)
}
