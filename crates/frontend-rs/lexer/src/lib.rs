//! Object Pascal Lexer
//!
//! This crate implements the lexical analysis (tokenization) phase of the
//! front end. It converts source text into a stream of classified, located
//! tokens.
//!
//! At each position the lexer tries, in order: end of file, comment,
//! character string, numeral, two-rune symbol, one-rune symbol, word and
//! whitespace. Whitespace and comment tokens are surfaced or skipped
//! according to [`LexerOptions`].

mod cursor;

pub use cursor::Cursor;

use thiserror::Error;
use tokens::{classify_word, Location, Position, Token, TokenKind};

/// Lexer error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexerError {
    #[error("unterminated string literal at {position}")]
    UnterminatedString { position: Position },
    #[error("unterminated comment at {position}")]
    UnterminatedComment { position: Position },
    #[error("invalid character '{ch}' at {position}")]
    InvalidCharacter { ch: char, position: Position },
    #[error("invalid character code '{text}' at {position}")]
    InvalidCharCode { text: String, position: Position },
}

impl LexerError {
    /// Where the offending construct starts
    pub fn position(&self) -> Position {
        match self {
            LexerError::UnterminatedString { position }
            | LexerError::UnterminatedComment { position }
            | LexerError::InvalidCharacter { position, .. }
            | LexerError::InvalidCharCode { position, .. } => *position,
        }
    }
}

/// Which trivia tokens are surfaced to the consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerOptions {
    pub emit_whitespace: bool,
    pub emit_comments: bool,
}

impl LexerOptions {
    /// Surface every token, trivia included
    pub fn all() -> Self {
        Self {
            emit_whitespace: true,
            emit_comments: true,
        }
    }
}

/// Two-rune special symbols
const TWO_RUNE_SYMBOLS: &[&str] = &["(*", "*)", "..", "//", ":=", "<=", ">=", "<>"];

/// One-rune special symbols
const ONE_RUNE_SYMBOLS: &[char] = &[
    '+', '-', '*', '/', '=', '<', '>', '[', ']', '.', ',', '(', ')', ':', ';', '^', '@',
];

/// Lexer (scanner) for Object Pascal
pub struct Lexer {
    cursor: Cursor,
    options: LexerOptions,
    /// Whether the last significant token can end an operand, which makes a
    /// following `-` a binary operator rather than a numeral sign
    operand_end: bool,
}

impl Lexer {
    /// Create a lexer that skips whitespace and comments
    pub fn new(source: &str) -> Self {
        Self::with_options(source, LexerOptions::default())
    }

    pub fn with_options(source: &str, options: LexerOptions) -> Self {
        Self {
            cursor: Cursor::new(source),
            options,
            operand_end: false,
        }
    }

    pub fn options(&self) -> LexerOptions {
        self.options
    }

    /// Get the next token. At end of input every call returns an EOF token
    /// at the same position.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            let token = self.scan()?;
            let surfaced = match token.kind {
                TokenKind::Space => self.options.emit_whitespace,
                TokenKind::Comment => self.options.emit_comments,
                _ => true,
            };
            if !token.kind.is_trivia() {
                self.operand_end = ends_operand(&token);
            }
            if surfaced {
                return Ok(token);
            }
        }
    }

    /// Collect every remaining token up to and including EOF
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn scan(&mut self) -> Result<Token, LexerError> {
        let start = self.cursor.position();
        let ch = match self.cursor.current() {
            Some(ch) => ch,
            None => return Ok(Token::eof(start)),
        };
        let next = self.cursor.peek(1);

        let kind = if ch == '{' || (ch == '(' && next == Some('*')) || (ch == '/' && next == Some('/')) {
            self.scan_comment()?
        } else if ch == '\'' || (ch == '#' && next.map_or(false, |c| c.is_ascii_digit() || c == '$')) {
            self.scan_string()?
        } else if ch.is_ascii_digit()
            || (ch == '$' && next.map_or(false, |c| c.is_ascii_hexdigit()))
            || (ch == '-' && !self.operand_end && next.map_or(false, |c| c.is_ascii_digit()))
        {
            self.scan_numeral()
        } else if self.two_rune_symbol().is_some() {
            self.cursor.advance();
            self.cursor.advance();
            TokenKind::SpecialSymbol
        } else if ONE_RUNE_SYMBOLS.contains(&ch) {
            self.cursor.advance();
            TokenKind::SpecialSymbol
        } else if is_word_start(ch) || (ch == '&' && next.map_or(false, is_word_start)) {
            self.scan_word()
        } else if ch.is_whitespace() {
            self.cursor.advance_while(char::is_whitespace);
            TokenKind::Space
        } else {
            return Err(LexerError::InvalidCharacter { ch, position: start });
        };

        let end = self.cursor.position();
        let text = self.cursor.slice(start.index, end.index);
        Ok(Token::new(kind, text, Location::new(start, end)))
    }

    fn two_rune_symbol(&self) -> Option<&'static str> {
        let first = self.cursor.current()?;
        let second = self.cursor.peek(1)?;
        TWO_RUNE_SYMBOLS.iter().copied().find(|symbol| {
            let mut chars = symbol.chars();
            chars.next() == Some(first) && chars.next() == Some(second)
        })
    }

    /// `{ ... }`, `(* ... *)` or `// ...` up to (not including) the newline.
    /// Compiler directives such as `{$I+}` are comments at this level.
    fn scan_comment(&mut self) -> Result<TokenKind, LexerError> {
        let position = self.cursor.position();
        match self.cursor.advance() {
            Some('{') => loop {
                match self.cursor.advance() {
                    Some('}') => break,
                    Some(_) => {}
                    None => return Err(LexerError::UnterminatedComment { position }),
                }
            },
            Some('(') => {
                self.cursor.advance();
                loop {
                    match self.cursor.advance() {
                        Some('*') if self.cursor.current() == Some(')') => {
                            self.cursor.advance();
                            break;
                        }
                        Some(_) => {}
                        None => return Err(LexerError::UnterminatedComment { position }),
                    }
                }
            }
            _ => self.cursor.advance_while(|c| c != '\n'),
        }
        Ok(TokenKind::Comment)
    }

    /// Quoted segments and `#nn` / `#$hh` character codes, concatenated
    fn scan_string(&mut self) -> Result<TokenKind, LexerError> {
        loop {
            match self.cursor.current() {
                Some('\'') => {
                    let position = self.cursor.position();
                    self.cursor.advance();
                    loop {
                        match self.cursor.advance() {
                            Some('\'') if self.cursor.current() == Some('\'') => {
                                self.cursor.advance();
                            }
                            Some('\'') => break,
                            Some('\n') | None => {
                                return Err(LexerError::UnterminatedString { position })
                            }
                            Some(_) => {}
                        }
                    }
                }
                Some('#') => {
                    let position = self.cursor.position();
                    self.cursor.advance();
                    let digits_start = if self.cursor.current() == Some('$') {
                        self.cursor.advance();
                        let start = self.cursor.position().index;
                        self.cursor.advance_while(|c| c.is_ascii_hexdigit());
                        start
                    } else {
                        let start = self.cursor.position().index;
                        self.cursor.advance_while(|c| c.is_ascii_digit());
                        start
                    };
                    if self.cursor.position().index == digits_start {
                        return Err(LexerError::InvalidCharCode {
                            text: self.cursor.slice(position.index, digits_start),
                            position,
                        });
                    }
                }
                _ => return Ok(TokenKind::CharacterString),
            }
        }
    }

    /// Digits with at most one decimal point and an optional exponent, or a
    /// `$` hex numeral. A `.` followed by another `.` is left for the range
    /// symbol.
    fn scan_numeral(&mut self) -> TokenKind {
        if self.cursor.current() == Some('-') {
            self.cursor.advance();
        }
        if self.cursor.current() == Some('$') {
            self.cursor.advance();
            self.cursor.advance_while(|c| c.is_ascii_hexdigit());
            return TokenKind::NumeralInt;
        }

        self.cursor.advance_while(|c| c.is_ascii_digit());
        let mut kind = TokenKind::NumeralInt;

        if self.cursor.current() == Some('.') && self.cursor.peek(1).map_or(false, |c| c.is_ascii_digit()) {
            self.cursor.advance();
            self.cursor.advance_while(|c| c.is_ascii_digit());
            kind = TokenKind::NumeralReal;
        }

        if matches!(self.cursor.current(), Some('e') | Some('E')) {
            let exponent_digits = match self.cursor.peek(1) {
                Some('+') | Some('-') => self.cursor.peek(2).map_or(false, |c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_digits {
                self.cursor.advance();
                if matches!(self.cursor.current(), Some('+') | Some('-')) {
                    self.cursor.advance();
                }
                self.cursor.advance_while(|c| c.is_ascii_digit());
                kind = TokenKind::NumeralReal;
            }
        }
        kind
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.cursor.position().index;
        let escaped = self.cursor.current() == Some('&');
        if escaped {
            self.cursor.advance();
        }
        self.cursor.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if escaped {
            TokenKind::Identifier
        } else {
            classify_word(&self.cursor.slice(start, self.cursor.position().index))
        }
    }
}

fn is_word_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn ends_operand(token: &Token) -> bool {
    match token.kind {
        TokenKind::Identifier
        | TokenKind::Directive
        | TokenKind::PortabilityDirective
        | TokenKind::NumeralInt
        | TokenKind::NumeralReal
        | TokenKind::CharacterString => true,
        TokenKind::SpecialSymbol => matches!(token.text.as_str(), ")" | "]" | "^"),
        TokenKind::ReservedWord => token.is_reserved("NIL"),
        _ => false,
    }
}
