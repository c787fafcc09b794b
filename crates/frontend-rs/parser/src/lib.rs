//! Object Pascal Parser
//!
//! This crate implements a recursive descent parser for Object Pascal. It
//! builds an AST from tokens produced by the lexer and binds names while it
//! goes: every declaration enters the active scope as soon as it has been
//! parsed, and every identifier use is resolved on the spot.
//!
//! Units named in `uses` clauses are parsed through the [`Session`] the
//! parser borrows, once per session, and shared as `Rc<Unit>`.

mod classes;
mod core;
mod declarations;
mod expressions;
pub mod loader;
pub mod query;
mod resolve;
mod statements;
mod types;

pub use loader::{MemoryResolver, NoSearchPath, ParsedProgram, ParsedUnit, Session, UnitResolver};
pub use query::AstQuery;

use ast::{Block, DeclSection, Expr, Ident, Statement, TypeExpr, Unit};
use errors::ParserResult;
use lexer::Lexer;
use std::path::PathBuf;
use std::rc::Rc;
use symbols::{DeclId, DeclMap, ScopeKind, ScopeStack};
use tokens::{Location, Position, Token};

/// Options that change how a parse treats non-fatal conditions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Turn the first unresolved reference or duplicate declaration into a
    /// fatal [`errors::ParserError::Strict`]
    pub strict: bool,
}

/// Parser for one Object Pascal source file or fragment
pub struct Parser<'s> {
    lexer: Lexer,
    current: Token,
    peek: Token,
    /// Location of the last consumed token
    previous: Location,
    path: Option<PathBuf>,
    /// Display form of `path`, attached to diagnostics
    file: Option<String>,
    scopes: ScopeStack,
    session: &'s mut Session,
    /// Class whose method body is being parsed
    current_class: Option<DeclId>,
    /// Pointer types of the current type section whose targets are bound
    /// when the section ends
    pending_pointers: Option<Vec<(DeclId, Ident)>>,
}

impl<'s> Parser<'s> {
    /// Create a parser over `source`. `path` is the file the source was
    /// read from; explicit unit paths are relative to its directory.
    pub fn new(source: &str, path: Option<PathBuf>, session: &'s mut Session) -> ParserResult<Self> {
        let scopes = ScopeStack::new(session.builtins());
        let file = path.as_ref().map(|p| p.display().to_string());
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::eof(Position::start()),
            peek: Token::eof(Position::start()),
            previous: Location::default(),
            path,
            file,
            scopes,
            session,
            current_class: None,
            pending_pointers: None,
        };
        // Prime the window with the first two tokens
        parser.advance()?;
        parser.advance()?;
        parser.previous = Location::default();
        Ok(parser)
    }

    /// Make the declarations of `decls` visible to the fragments parsed
    /// next. The ids must come from this parser's session.
    pub fn seed_scope(&mut self, decls: DeclMap) {
        self.scopes.push_with_decls(ScopeKind::Seeded, decls);
    }

    /// Load unit `name` as a `uses` clause would and import its interface.
    /// Returns `None` when the session's resolver cannot place it.
    pub fn use_unit(&mut self, name: &str) -> ParserResult<Option<Rc<Unit>>> {
        self.load_unit(&Ident::unlocated(name), None)
    }

    /// Declaration sections followed by a compound statement
    pub fn parse_block_fragment(&mut self) -> ParserResult<Block> {
        self.fragment(|p| p.parse_block())
    }

    pub fn parse_statement_fragment(&mut self) -> ParserResult<Statement> {
        self.fragment(|p| p.parse_statement())
    }

    pub fn parse_type_fragment(&mut self) -> ParserResult<TypeExpr> {
        self.fragment(|p| Ok(p.parse_type()?.0))
    }

    pub fn parse_expression_fragment(&mut self) -> ParserResult<Expr> {
        self.fragment(|p| p.parse_expression())
    }

    pub fn parse_decl_section_fragment(&mut self) -> ParserResult<Vec<DeclSection>> {
        self.fragment(|p| p.parse_decl_sections())
    }

    /// Run `body` in a scope of its own and require it to consume the
    /// whole input
    fn fragment<T>(&mut self, body: impl FnOnce(&mut Self) -> ParserResult<T>) -> ParserResult<T> {
        self.scopes.push_scope(ScopeKind::Program);
        let result = match body(self) {
            Ok(value) => self.expect_eof().map(|_| value),
            Err(error) => Err(error),
        };
        self.scopes.pop_scope();
        result
    }
}

/// Parse a program held in memory. `uses` clauses can only name units
/// given with an explicit path.
pub fn parse_program_source(source: &str) -> ParserResult<ParsedProgram> {
    Session::new(ParseOptions::default(), None).parse_program(source, None)
}
