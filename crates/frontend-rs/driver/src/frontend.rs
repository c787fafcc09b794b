//! Front end pipeline orchestration

use std::fs;
use std::path::{Path, PathBuf};

use errors::{Diagnostic, ErrorSeverity, LoadError, ParserError};
use parser::{ParseOptions, ParsedProgram, ParsedUnit, Session};
use thiserror::Error;

use crate::SearchPathResolver;

/// Failure to produce a tree for an input file
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to read file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] ParserError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Front end instance holding the parse options and unit search path
#[derive(Debug, Default, Clone)]
pub struct Frontend {
    options: ParseOptions,
    search_paths: Vec<PathBuf>,
}

impl Frontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Stop at the first unresolved name or duplicate declaration
    pub fn set_strict(&mut self, strict: bool) {
        self.options.strict = strict;
    }

    /// Directory searched for units after the referencing file's own
    pub fn add_search_path(&mut self, dir: impl Into<PathBuf>) {
        self.search_paths.push(dir.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Parse the program in `path` and every unit it uses
    pub fn parse_program_file(&self, path: &Path) -> Result<ParsedProgram, FrontendError> {
        let source = fs::read_to_string(path).map_err(|source| FrontendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = self.session().parse_program(&source, Some(path.to_path_buf()))?;
        Ok(parsed)
    }

    /// Parse the unit in `path` and every unit it uses
    pub fn parse_unit_file(&self, path: &Path) -> Result<ParsedUnit, FrontendError> {
        match self.session().parse_unit_file(path) {
            Ok(parsed) => Ok(parsed),
            Err(LoadError::Io { path, source }) => Err(FrontendError::Io { path, source }),
            Err(LoadError::NotFound { path: Some(path), .. }) => Err(FrontendError::Io {
                path,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
            Err(error) => Err(error.into()),
        }
    }

    /// Print diagnostics to stderr
    pub fn print_diagnostics(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            eprintln!("{}", diagnostic.format_fpc());
        }
    }

    /// Number of diagnostics with error severity
    pub fn error_count(diagnostics: &[Diagnostic]) -> usize {
        diagnostics
            .iter()
            .filter(|d| d.severity == ErrorSeverity::Error)
            .count()
    }

    fn session(&self) -> Session {
        let resolver = SearchPathResolver::new(self.search_paths.clone());
        Session::new(self.options, Some(Box::new(resolver)))
    }
}
