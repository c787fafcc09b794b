//! Core parser functionality
//!
//! Token window management and the predicate-driven matching helpers used
//! by every production.

use errors::{ParserError, ParserResult};
use lexer::LexerError;
use symbols::{Ident, NodeId};
use tokens::predicate::{self, Predicate};
use tokens::{Location, Token, TokenKind};

fn lexical(error: LexerError) -> ParserError {
    ParserError::Lexical {
        message: error.to_string(),
        position: error.position(),
    }
}

impl<'s> super::Parser<'s> {
    /// Shift the window by one token and return the token that was current
    pub(crate) fn advance(&mut self) -> ParserResult<Token> {
        let next = self.next_significant()?;
        let current = std::mem::replace(&mut self.peek, next);
        let consumed = std::mem::replace(&mut self.current, current);
        self.previous = consumed.location;
        Ok(consumed)
    }

    /// Next token from the lexer that is not whitespace or a comment
    pub(crate) fn next_significant(&mut self) -> ParserResult<Token> {
        loop {
            let token = self.lexer.next_token().map_err(lexical)?;
            if !token.kind.is_trivia() {
                return Ok(token);
            }
        }
    }

    pub(crate) fn current(&self) -> &Token {
        &self.current
    }

    pub(crate) fn peek_token(&self) -> &Token {
        &self.peek
    }

    /// Location of the current token
    pub(crate) fn location(&self) -> Location {
        self.current.location
    }

    pub(crate) fn check(&self, predicate: &Predicate) -> bool {
        predicate.matches(&self.current)
    }

    pub(crate) fn check_peek(&self, predicate: &Predicate) -> bool {
        predicate.matches(&self.peek)
    }

    pub(crate) fn at_symbol(&self, symbol: &str) -> bool {
        self.current.is_symbol(symbol)
    }

    pub(crate) fn at_reserved(&self, word: &str) -> bool {
        self.current.is_reserved(word)
    }

    pub(crate) fn at_directive(&self, word: &str) -> bool {
        self.current.is_directive(word)
    }

    /// Whether the current token can stand for an identifier
    pub(crate) fn at_ident(&self) -> bool {
        self.current.kind.is_word()
    }

    pub(crate) fn peek_is_ident(&self) -> bool {
        self.peek.kind.is_word()
    }

    /// Consume the current token if it matches, otherwise error
    pub(crate) fn consume(&mut self, predicate: &Predicate, expected: &str) -> ParserResult<Token> {
        if self.check(predicate) {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn expect_symbol(&mut self, symbol: &'static str) -> ParserResult<Token> {
        let predicate = predicate::symbol(symbol);
        let expected = predicate.describe();
        self.consume(&predicate, &expected)
    }

    pub(crate) fn expect_reserved(&mut self, word: &'static str) -> ParserResult<Token> {
        let predicate = predicate::reserved(word);
        let expected = predicate.describe();
        self.consume(&predicate, &expected)
    }

    /// Consume the symbol if present
    pub(crate) fn eat_symbol(&mut self, symbol: &str) -> ParserResult<bool> {
        if self.at_symbol(symbol) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume the reserved word if present
    pub(crate) fn eat_reserved(&mut self, word: &str) -> ParserResult<bool> {
        if self.at_reserved(word) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn eat_directive(&mut self, word: &str) -> ParserResult<bool> {
        if self.at_directive(word) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Consume an identifier. Directive words are ordinary identifiers
    /// outside the positions where they act as directives.
    pub(crate) fn expect_ident(&mut self) -> ParserResult<Ident> {
        let token = self.consume(&predicate::identifier(), "identifier")?;
        Ok(Ident::new(token.ident_name(), token.location))
    }

    /// Label names are identifiers or unsigned integers
    pub(crate) fn expect_label(&mut self) -> ParserResult<Ident> {
        let label = predicate::identifier() | predicate::kind(TokenKind::NumeralInt);
        let token = self.consume(&label, "label")?;
        let token = Token::new(TokenKind::Label, token.ident_name(), token.location);
        Ok(Ident::new(token.text, token.location))
    }

    /// `A.B.C` as a single qualified identifier
    pub(crate) fn expect_dotted_name(&mut self) -> ParserResult<Ident> {
        let first = self.consume(&predicate::identifier(), "identifier")?;
        if !(self.at_symbol(".") && self.peek_is_ident()) {
            return Ok(Ident::new(first.ident_name(), first.location));
        }
        let mut text = first.ident_name().to_string();
        let mut location = first.location;
        while self.at_symbol(".") && self.peek_is_ident() {
            self.advance()?;
            let part = self.advance()?;
            text.push('.');
            text.push_str(part.ident_name());
            location = location.merge(part.location);
        }
        let token = Token::new(TokenKind::QualifiedIdentifier, text, location);
        Ok(Ident::new(token.text, token.location))
    }

    pub(crate) fn expect_eof(&mut self) -> ParserResult<()> {
        if self.current.is_eof() {
            Ok(())
        } else {
            Err(self.unexpected("end of file"))
        }
    }

    /// Error for the current token not matching `expected`
    pub(crate) fn unexpected(&self, expected: &str) -> ParserError {
        if self.current.is_eof() {
            ParserError::UnexpectedEof {
                expected: expected.to_string(),
                position: self.current.location.start,
            }
        } else {
            ParserError::UnexpectedToken {
                expected: expected.to_string(),
                text: self.current.text.clone(),
                kind: self.current.kind,
                position: self.current.location.start,
            }
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>) -> ParserError {
        ParserError::InvalidSyntax {
            message: message.into(),
            location: self.current.location,
        }
    }

    pub(crate) fn node_id(&mut self) -> NodeId {
        self.session.next_node_id()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ParseOptions, Parser, Session};
    use errors::ParserError;
    use tokens::TokenKind;

    #[test]
    fn test_window_skips_trivia() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("  begin { c } end // x\n", None, &mut session).unwrap();
        assert!(parser.at_reserved("BEGIN"));
        assert!(parser.peek_token().is_reserved("end"));
        let consumed = parser.advance().unwrap();
        assert_eq!(consumed.text, "begin");
        assert!(parser.at_reserved("end"));
        parser.advance().unwrap();
        assert!(parser.current().is_eof());
        parser.expect_eof().unwrap();
    }

    #[test]
    fn test_unexpected_token_reports_text_kind_and_position() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("x := 1", None, &mut session).unwrap();
        parser.advance().unwrap();
        match parser.expect_symbol(";") {
            Err(ParserError::UnexpectedToken { expected, text, kind, position }) => {
                assert_eq!(expected, "';'");
                assert_eq!(text, ":=");
                assert_eq!(kind, TokenKind::SpecialSymbol);
                assert_eq!((position.line, position.column, position.index), (1, 3, 2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unexpected_eof() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("", None, &mut session).unwrap();
        assert!(matches!(
            parser.expect_reserved("BEGIN"),
            Err(ParserError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_escaped_and_directive_words_are_identifiers() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("&begin read", None, &mut session).unwrap();
        assert_eq!(parser.expect_ident().unwrap().name, "begin");
        assert_eq!(parser.expect_ident().unwrap().name, "read");
    }

    #[test]
    fn test_dotted_name() {
        let mut session = Session::new(ParseOptions::default(), None);
        let mut parser = Parser::new("System.SysUtils;", None, &mut session).unwrap();
        let name = parser.expect_dotted_name().unwrap();
        assert_eq!(name.name, "System.SysUtils");
        assert!(parser.at_symbol(";"));
    }

    #[test]
    fn test_lexical_error_surfaces() {
        let mut session = Session::new(ParseOptions::default(), None);
        let result = Parser::new("x 'open", None, &mut session);
        assert!(matches!(result, Err(ParserError::Lexical { .. })));
    }
}
