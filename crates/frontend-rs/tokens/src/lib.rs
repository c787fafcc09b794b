//! Object Pascal Token Definitions
//!
//! This crate defines the located token model shared by the lexer and the
//! parser: positions, locations, token kinds, the fixed word tables used to
//! classify words, and the predicate combinators the parser uses for
//! lookahead decisions.

use serde::Serialize;
use std::fmt;

pub mod predicate;

pub use predicate::Predicate;

/// A point in the source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    /// Line number (1-based)
    pub line: u32,
    /// Column number (1-based)
    pub column: u32,
    /// Rune offset into the source buffer (0-based)
    pub index: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: u32, column: u32, index: usize) -> Self {
        Self { line, column, index }
    }

    /// Position of the first rune of a buffer
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open source range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl Location {
    /// Create a new location
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Create a zero-length location at a position
    pub fn at(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// Merge two locations (from the earlier start to the later end)
    pub fn merge(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `position` falls inside this range
    pub fn contains(&self, position: Position) -> bool {
        self.start.index <= position.index && position.index < self.end.index
    }
}

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Eof,
    Space,
    Comment,
    SpecialSymbol,
    Identifier,
    /// Dotted name such as `System.SysUtils`, built by the parser
    QualifiedIdentifier,
    ReservedWord,
    Directive,
    PortabilityDirective,
    NumeralInt,
    NumeralReal,
    /// Statement label, built by the parser
    Label,
    CharacterString,
}

impl TokenKind {
    /// Whether tokens of this kind are skipped by the parser
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Space | TokenKind::Comment)
    }

    /// Word-like kinds that may stand for an identifier in most positions
    pub fn is_word(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier | TokenKind::Directive | TokenKind::PortabilityDirective
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Eof => "end of file",
            TokenKind::Space => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::SpecialSymbol => "symbol",
            TokenKind::Identifier => "identifier",
            TokenKind::QualifiedIdentifier => "qualified identifier",
            TokenKind::ReservedWord => "reserved word",
            TokenKind::Directive => "directive",
            TokenKind::PortabilityDirective => "portability directive",
            TokenKind::NumeralInt => "integer numeral",
            TokenKind::NumeralReal => "real numeral",
            TokenKind::Label => "label",
            TokenKind::CharacterString => "character string",
        };
        f.write_str(name)
    }
}

/// A classified, located token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token
    pub text: String,
    pub location: Location,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }

    /// End-of-file token at a position
    pub fn eof(position: Position) -> Self {
        Self::new(TokenKind::Eof, "", Location::at(position))
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Uppercased text, the key used for case-insensitive comparisons
    pub fn upper(&self) -> String {
        self.text.to_ascii_uppercase()
    }

    /// Check for a special symbol such as `:=`
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::SpecialSymbol && self.text == symbol
    }

    /// Check for a reserved word, case-insensitively
    pub fn is_reserved(&self, word: &str) -> bool {
        self.kind == TokenKind::ReservedWord && self.text.eq_ignore_ascii_case(word)
    }

    /// Check for a directive word, case-insensitively
    pub fn is_directive(&self, word: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::Directive | TokenKind::PortabilityDirective
        ) && self.text.eq_ignore_ascii_case(word)
    }

    /// Identifier name denoted by a word token (`&begin` denotes `begin`)
    pub fn ident_name(&self) -> &str {
        self.text.strip_prefix('&').unwrap_or(&self.text)
    }

    /// Decoded value of a character-string token
    pub fn string_value(&self) -> Option<String> {
        if self.kind == TokenKind::CharacterString {
            decode_string(&self.text)
        } else {
            None
        }
    }
}

/// Reserved words, sorted for binary search
pub const RESERVED_WORDS: &[&str] = &[
    "AND",
    "ARRAY",
    "AS",
    "ASM",
    "BEGIN",
    "CASE",
    "CLASS",
    "CONST",
    "CONSTRUCTOR",
    "DESTRUCTOR",
    "DISPINTERFACE",
    "DIV",
    "DO",
    "DOWNTO",
    "ELSE",
    "END",
    "EXCEPT",
    "EXPORTS",
    "FILE",
    "FINALIZATION",
    "FINALLY",
    "FOR",
    "FUNCTION",
    "GOTO",
    "IF",
    "IMPLEMENTATION",
    "IN",
    "INHERITED",
    "INITIALIZATION",
    "INTERFACE",
    "IS",
    "LABEL",
    "LIBRARY",
    "MOD",
    "NIL",
    "NOT",
    "OBJECT",
    "OF",
    "OR",
    "PACKED",
    "PROCEDURE",
    "PROGRAM",
    "PROPERTY",
    "RAISE",
    "RECORD",
    "REPEAT",
    "RESOURCESTRING",
    "SET",
    "SHL",
    "SHR",
    "STRING",
    "THEN",
    "THREADVAR",
    "TO",
    "TRY",
    "TYPE",
    "UNIT",
    "UNTIL",
    "USES",
    "VAR",
    "WHILE",
    "WITH",
    "XOR",
];

/// Directive words, sorted for binary search.
/// These are identifiers everywhere except where the parser expects a directive.
pub const DIRECTIVES: &[&str] = &[
    "ABSOLUTE",
    "ABSTRACT",
    "ASSEMBLER",
    "AT",
    "AUTOMATED",
    "CDECL",
    "DEFAULT",
    "DISPID",
    "DYNAMIC",
    "EXPORT",
    "EXTERNAL",
    "FAR",
    "FORWARD",
    "IMPLEMENTS",
    "INDEX",
    "INLINE",
    "MESSAGE",
    "NAME",
    "NEAR",
    "NODEFAULT",
    "ON",
    "OUT",
    "OVERLOAD",
    "OVERRIDE",
    "PASCAL",
    "PRIVATE",
    "PROTECTED",
    "PUBLIC",
    "PUBLISHED",
    "READ",
    "READONLY",
    "REGISTER",
    "REINTRODUCE",
    "SAFECALL",
    "STATIC",
    "STDCALL",
    "STORED",
    "STRICT",
    "VARARGS",
    "VIRTUAL",
    "WRITE",
    "WRITEONLY",
];

/// Portability directives, sorted for binary search
pub const PORTABILITY_DIRECTIVES: &[&str] = &["DEPRECATED", "EXPERIMENTAL", "PLATFORM"];

fn contains_upper(table: &[&str], upper: &str) -> bool {
    table.binary_search(&upper).is_ok()
}

/// Classify a word lexically: reserved word, directive, portability
/// directive, or plain identifier.
pub fn classify_word(word: &str) -> TokenKind {
    let upper = word.to_ascii_uppercase();
    if contains_upper(RESERVED_WORDS, &upper) {
        TokenKind::ReservedWord
    } else if contains_upper(DIRECTIVES, &upper) {
        TokenKind::Directive
    } else if contains_upper(PORTABILITY_DIRECTIVES, &upper) {
        TokenKind::PortabilityDirective
    } else {
        TokenKind::Identifier
    }
}

/// Case-insensitive string comparison
pub fn eq_ignore_ascii_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Decode the source text of a character string.
///
/// Quoted segments use a doubled quote for an embedded quote; `#65` and
/// `#$41` segments denote single characters. Returns `None` when the text
/// is not a well-formed character string.
pub fn decode_string(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\'' => {
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            out.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            out.push(c);
                            i += 1;
                        }
                        None => return None,
                    }
                }
            }
            '#' => {
                i += 1;
                let hex = chars.get(i) == Some(&'$');
                if hex {
                    i += 1;
                }
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || (hex && chars[i].is_ascii_hexdigit()))
                {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let code = u32::from_str_radix(&digits, if hex { 16 } else { 10 }).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}
