//! Object Pascal front end errors and diagnostics
//!
//! Fatal conditions are [`ParserError`] (grammar violations, lexical errors,
//! failed unit loads) and [`LoadError`]. Non-fatal semantic conditions are
//! collected as [`Diagnostic`] values while parsing continues.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokens::{Location, Position, TokenKind};

/// Result type used throughout the parser
pub type ParserResult<T> = Result<T, ParserError>;

/// Fatal parse error. Parsing of the current file stops.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unexpected {kind} '{text}' at {position}; expected {expected}")]
    UnexpectedToken {
        expected: String,
        text: String,
        kind: TokenKind,
        position: Position,
    },
    #[error("unexpected end of file at {position}; expected {expected}")]
    UnexpectedEof { expected: String, position: Position },
    #[error("{message} at {}", .location.start)]
    InvalidSyntax { message: String, location: Location },
    #[error("lexical error: {message}")]
    Lexical { message: String, position: Position },
    #[error("cannot load unit '{unit}' at {}: {source}", .location.start)]
    UnitLoad {
        unit: String,
        location: Location,
        #[source]
        source: Box<LoadError>,
    },
    /// A semantic diagnostic escalated by strict mode
    #[error("{}", .diagnostic.message)]
    Strict { diagnostic: Box<Diagnostic> },
}

impl ParserError {
    /// Where the error was detected
    pub fn position(&self) -> Position {
        match self {
            ParserError::UnexpectedToken { position, .. }
            | ParserError::UnexpectedEof { position, .. }
            | ParserError::Lexical { position, .. } => *position,
            ParserError::InvalidSyntax { location, .. } | ParserError::UnitLoad { location, .. } => {
                location.start
            }
            ParserError::Strict { diagnostic } => diagnostic.location.map(|l| l.start).unwrap_or_default(),
        }
    }

    /// The innermost load failure behind a chain of failed `uses` loads
    pub fn load_root(&self) -> Option<&LoadError> {
        match self {
            ParserError::UnitLoad { source, .. } => Some(source.root()),
            _ => None,
        }
    }

    /// Convert to a diagnostic for reporting
    pub fn to_diagnostic(&self, file: Option<String>) -> Diagnostic {
        let position = self.position();
        let mut diag = Diagnostic::new(
            ErrorSeverity::Error,
            self.to_string(),
            Some(Location::at(position)),
        );
        diag.file = file;
        match self {
            ParserError::UnexpectedToken { expected, text, .. } => {
                if expected == "';'" && text.eq_ignore_ascii_case("end") {
                    diag = diag.with_suggestion("Missing semicolon before 'end'.");
                } else if expected == "identifier" {
                    diag = diag.with_suggestion("Reserved words cannot be used as identifiers; prefix with '&' to escape.");
                }
            }
            ParserError::UnexpectedEof { expected, .. } => {
                diag = diag.with_suggestion(format!(
                    "The file ended unexpectedly. Add {} before the end of file.",
                    expected
                ));
            }
            ParserError::Strict { diagnostic } => return (**diagnostic).clone(),
            _ => {}
        }
        diag
    }
}

/// Unit load failure
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unit '{name}' not found")]
    NotFound { name: String, path: Option<PathBuf> },
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cyclic unit reference: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    #[error("error in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<ParserError>,
    },
}

impl LoadError {
    /// Follow nested dependency failures down to the original one
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::Parse { source, .. } => match source.as_ref() {
                ParserError::UnitLoad { source, .. } => source.root(),
                _ => self,
            },
            _ => self,
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ErrorSeverity {
    Hint,
    Warning,
    Error,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Hint => write!(f, "Hint"),
            ErrorSeverity::Warning => write!(f, "Warning"),
            ErrorSeverity::Error => write!(f, "Error"),
        }
    }
}

/// Kind of non-fatal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticCode {
    UnresolvedReference,
    DuplicateDeclaration,
    UnresolvedUnit,
}

/// A reported condition with its source location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: ErrorSeverity,
    pub code: Option<DiagnosticCode>,
    pub message: String,
    /// The identifier the condition is about
    pub name: Option<String>,
    pub location: Option<Location>,
    pub file: Option<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: ErrorSeverity, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            severity,
            code: None,
            message: message.into(),
            name: None,
            location,
            file: None,
            suggestion: None,
        }
    }

    /// An identifier that did not resolve
    pub fn unresolved(name: &str, location: Option<Location>) -> Self {
        Self::new(
            ErrorSeverity::Warning,
            format!("Identifier not found \"{}\"", name),
            location,
        )
        .with_code(DiagnosticCode::UnresolvedReference)
        .with_name(name)
    }

    /// A name declared twice in one scope
    pub fn duplicate(name: &str, location: Option<Location>, previous: Option<Location>) -> Self {
        let diag = Self::new(
            ErrorSeverity::Error,
            format!("Duplicate identifier \"{}\"", name),
            location,
        )
        .with_code(DiagnosticCode::DuplicateDeclaration)
        .with_name(name);
        match previous {
            Some(prev) => diag.with_suggestion(format!("Previous declaration at {}", prev.start)),
            None => diag,
        }
    }

    /// A `uses` entry whose unit could not be located
    pub fn unresolved_unit(name: &str, location: Option<Location>) -> Self {
        Self::new(
            ErrorSeverity::Warning,
            format!("Can't find unit {}", name),
            location,
        )
        .with_code(DiagnosticCode::UnresolvedUnit)
        .with_name(name)
    }

    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Free Pascal style: `file(line,col) Error: message`
    pub fn format_fpc(&self) -> String {
        let file = self.file.as_deref().unwrap_or("<input>");
        match self.location {
            Some(loc) => format!(
                "{}({},{}) {}: {}",
                file, loc.start.line, loc.start.column, self.severity, self.message
            ),
            None => format!("{} {}: {}", file, self.severity, self.message),
        }
    }

    /// Multi-line format with the suggestion, if any
    pub fn format_enhanced(&self) -> String {
        let file = self.file.as_deref().unwrap_or("<input>");
        let mut out = match self.location {
            Some(loc) => format!(
                "{}:{}:{}: {}: {}",
                file, loc.start.line, loc.start.column, self.severity, self.message
            ),
            None => format!("{}: {}: {}", file, self.severity, self.message),
        };
        if let Some(suggestion) = &self.suggestion {
            out.push_str("\n  Suggestion: ");
            out.push_str(suggestion);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fpc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> Location {
        Location::at(Position::new(line, column, 0))
    }

    #[test]
    fn test_format_fpc() {
        let diag = Diagnostic::unresolved("Foo", Some(loc(3, 7))).with_file("test.pas");
        assert_eq!(
            diag.format_fpc(),
            "test.pas(3,7) Warning: Identifier not found \"Foo\""
        );
        assert_eq!(diag.code, Some(DiagnosticCode::UnresolvedReference));
        assert_eq!(diag.name.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_format_enhanced_with_suggestion() {
        let diag = Diagnostic::duplicate("X", Some(loc(4, 5)), Some(loc(3, 5))).with_file("a.pas");
        let text = diag.format_enhanced();
        assert!(text.starts_with("a.pas:4:5: Error: Duplicate identifier \"X\""));
        assert!(text.contains("Suggestion: Previous declaration at 3:5"));
    }

    #[test]
    fn test_unexpected_token_message() {
        let err = ParserError::UnexpectedToken {
            expected: "';'".to_string(),
            text: "end".to_string(),
            kind: TokenKind::ReservedWord,
            position: Position::new(2, 1, 10),
        };
        assert_eq!(err.to_string(), "unexpected reserved word 'end' at 2:1; expected ';'");
        let diag = err.to_diagnostic(Some("m.pas".to_string()));
        assert!(diag.format_fpc().starts_with("m.pas(2,1) Error:"));
        assert!(diag.suggestion.is_some());
    }

    #[test]
    fn test_load_root_follows_chain() {
        let cycle = LoadError::Cycle {
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        let inner = ParserError::UnitLoad {
            unit: "A".into(),
            location: loc(1, 1),
            source: Box::new(cycle),
        };
        let outer = ParserError::UnitLoad {
            unit: "B".into(),
            location: loc(1, 1),
            source: Box::new(LoadError::Parse {
                path: PathBuf::from("b.pas"),
                source: Box::new(inner),
            }),
        };
        match outer.load_root() {
            Some(LoadError::Cycle { chain }) => assert_eq!(chain.join(" -> "), "A -> B -> A"),
            other => panic!("Expected Cycle, got {:?}", other),
        }
    }
}
