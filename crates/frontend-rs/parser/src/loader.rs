//! Parse session and unit loader
//!
//! A [`Session`] owns everything that outlives a single file: the
//! declaration arena, the unit cache keyed by resolved path, and the
//! collected diagnostics. Units are loaded depth-first the first time a
//! `uses` clause names them and are shared as `Rc<Unit>` afterwards.

use crate::{ParseOptions, Parser};
use ast::{Program, Unit};
use errors::{Diagnostic, LoadError, ParserResult};
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use symbols::builtin_scope;
use symbols::{DeclArena, DeclMap, Declaration, NodeId};

/// Strategy mapping unit names to source files
pub trait UnitResolver {
    /// Path of the source for unit `name`, named in a `uses` clause of the
    /// file at `from`
    fn resolve(&self, name: &str, from: Option<&Path>) -> Option<PathBuf>;

    /// Read a whole source file
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    /// Cache key for a path; two spellings of one file share an entry
    fn canonical(&self, path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Resolver that knows no unit names. Explicit `in 'path'` entries are
/// still read from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSearchPath;

impl UnitResolver for NoSearchPath {
    fn resolve(&self, _name: &str, _from: Option<&Path>) -> Option<PathBuf> {
        None
    }
}

/// In-memory sources, for tooling and tests
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    names: FxHashMap<String, PathBuf>,
    files: FxHashMap<PathBuf, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the source of unit `name` under `path`
    pub fn add(&mut self, name: &str, path: impl Into<PathBuf>, source: impl Into<String>) -> &mut Self {
        let path = path.into();
        self.names.insert(name.to_ascii_uppercase(), path.clone());
        self.files.insert(path, source.into());
        self
    }

    /// Register a file reachable only through an explicit path
    pub fn add_file(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), source.into());
        self
    }
}

impl UnitResolver for MemoryResolver {
    fn resolve(&self, name: &str, _from: Option<&Path>) -> Option<PathBuf> {
        self.names.get(&name.to_ascii_uppercase()).cloned()
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn canonical(&self, path: &Path) -> PathBuf {
        normalize(path)
    }
}

/// Lexically drop `.` and `a/..` pairs
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[derive(Debug)]
enum UnitSlot {
    /// Claimed by a load that has not finished yet
    Loading,
    Loaded(Rc<Unit>),
}

/// Result of parsing a program and everything it uses
#[derive(Debug)]
pub struct ParsedProgram {
    pub program: Program,
    /// Loaded units in the order their loads completed
    pub units: Vec<Rc<Unit>>,
    pub declarations: DeclArena,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of parsing a single unit file
#[derive(Debug)]
pub struct ParsedUnit {
    pub unit: Rc<Unit>,
    /// The unit itself and every unit it pulled in, in load order
    pub units: Vec<Rc<Unit>>,
    pub declarations: DeclArena,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedProgram {
    /// Declaration behind a resolved reference
    pub fn declaration(&self, id: symbols::DeclId) -> &Declaration {
        self.declarations.get(id)
    }
}

pub struct Session {
    pub(crate) options: ParseOptions,
    resolver: Box<dyn UnitResolver>,
    pub(crate) arena: DeclArena,
    builtins: DeclMap,
    next_node: u32,
    cache: FxHashMap<PathBuf, UnitSlot>,
    /// Unit names by uppercased name, filled as loads resolve them
    by_name: FxHashMap<String, PathBuf>,
    /// Names of the units whose loads are in progress, outermost first
    loading: Vec<String>,
    loaded: Vec<Rc<Unit>>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl Session {
    pub fn new(options: ParseOptions, resolver: Option<Box<dyn UnitResolver>>) -> Self {
        let mut arena = DeclArena::new();
        let builtins = builtin_scope(&mut arena);
        Self {
            options,
            resolver: resolver.unwrap_or_else(|| Box::new(NoSearchPath)),
            arena,
            builtins,
            next_node: 0,
            cache: FxHashMap::default(),
            by_name: FxHashMap::default(),
            loading: Vec::new(),
            loaded: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    pub fn arena(&self) -> &DeclArena {
        &self.arena
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Units loaded so far, in load order
    pub fn units(&self) -> &[Rc<Unit>] {
        &self.loaded
    }

    /// The predeclared scope shared by every file of the session
    pub(crate) fn builtins(&self) -> DeclMap {
        self.builtins.clone()
    }

    pub(crate) fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Make a unit parsed by this session available to later `uses`
    /// clauses under `name`
    pub fn register_unit(&mut self, name: &str, unit: Rc<Unit>) {
        let key = unit
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("<{}>", name.to_ascii_uppercase())));
        self.by_name.insert(name.to_ascii_uppercase(), key.clone());
        self.cache.insert(key, UnitSlot::Loaded(unit));
    }

    /// Load unit `name`, parsing it on first use.
    ///
    /// `explicit` is the `in 'path'` part of a uses entry, relative to the
    /// directory of `from`. Returns `Ok(None)` when the resolver cannot
    /// place a unit named without a path.
    pub fn load(
        &mut self,
        name: &str,
        explicit: Option<&str>,
        from: Option<&Path>,
    ) -> Result<Option<Rc<Unit>>, LoadError> {
        let upper = name.to_ascii_uppercase();
        let path = match explicit {
            Some(relative) => {
                let base = from.and_then(Path::parent).unwrap_or_else(|| Path::new(""));
                self.resolver.canonical(&base.join(relative))
            }
            None => match self.by_name.get(&upper) {
                Some(path) => path.clone(),
                None => match self.resolver.resolve(name, from) {
                    Some(path) => self.resolver.canonical(&path),
                    None => return Ok(None),
                },
            },
        };
        self.by_name.entry(upper).or_insert_with(|| path.clone());
        self.load_path_named(name, path)
    }

    /// Load the unit stored at `path`
    pub fn load_path(&mut self, path: &Path) -> Result<Rc<Unit>, LoadError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = self.resolver.canonical(path);
        if !name.is_empty() {
            self.by_name.entry(name.to_ascii_uppercase()).or_insert_with(|| path.clone());
        }
        match self.load_path_named(&name, path)? {
            Some(unit) => Ok(unit),
            None => Err(LoadError::NotFound { name, path: None }),
        }
    }

    fn load_path_named(&mut self, name: &str, path: PathBuf) -> Result<Option<Rc<Unit>>, LoadError> {
        match self.cache.get(&path) {
            Some(UnitSlot::Loaded(unit)) => return Ok(Some(Rc::clone(unit))),
            Some(UnitSlot::Loading) => {
                let mut chain = self.loading.clone();
                chain.push(name.to_string());
                return Err(LoadError::Cycle { chain });
            }
            None => {}
        }

        let source = self.resolver.read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::NotFound {
                    name: name.to_string(),
                    path: Some(path.clone()),
                }
            } else {
                LoadError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let mark = self.diagnostics.len();
        self.cache.insert(path.clone(), UnitSlot::Loading);
        self.loading.push(name.to_string());
        let result = self.parse_unit_source(&source, path.clone());
        self.loading.pop();

        match result {
            Ok(unit) => {
                let unit = Rc::new(unit);
                self.cache.insert(path, UnitSlot::Loaded(Rc::clone(&unit)));
                self.loaded.push(Rc::clone(&unit));
                Ok(Some(unit))
            }
            Err(error) => {
                self.cache.remove(&path);
                // drop what the failed unit reported; dependencies that did
                // load keep their diagnostics
                let file = path.display().to_string();
                let kept: Vec<Diagnostic> = self
                    .diagnostics
                    .drain(mark..)
                    .filter(|d| d.file.as_deref() != Some(file.as_str()))
                    .collect();
                self.diagnostics.extend(kept);
                Err(LoadError::Parse {
                    path,
                    source: Box::new(error),
                })
            }
        }
    }

    fn parse_unit_source(&mut self, source: &str, path: PathBuf) -> ParserResult<Unit> {
        let mut parser = Parser::new(source, Some(path), self)?;
        parser.parse_unit()
    }

    /// Parse a program and every unit it uses
    pub fn parse_program(mut self, source: &str, path: Option<PathBuf>) -> ParserResult<ParsedProgram> {
        let mut parser = Parser::new(source, path, &mut self)?;
        let program = parser.parse_program()?;
        Ok(ParsedProgram {
            program,
            units: self.loaded,
            declarations: self.arena,
            diagnostics: self.diagnostics,
        })
    }

    /// Parse the unit at `path` and every unit it uses
    pub fn parse_unit_file(mut self, path: &Path) -> Result<ParsedUnit, LoadError> {
        let unit = self.load_path(path)?;
        Ok(ParsedUnit {
            unit,
            units: self.loaded,
            declarations: self.arena,
            diagnostics: self.diagnostics,
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("options", &self.options)
            .field("declarations", &self.arena.len())
            .field("units", &self.loaded.len())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::ParserError;

    fn session(resolver: MemoryResolver) -> Session {
        Session::new(ParseOptions::default(), Some(Box::new(resolver)))
    }

    #[test]
    fn test_normalize_drops_dot_segments() {
        assert_eq!(normalize(Path::new("a/./b/../c.pas")), PathBuf::from("a/c.pas"));
        assert_eq!(normalize(Path::new("../x.pas")), PathBuf::from("../x.pas"));
    }

    #[test]
    fn test_unit_is_parsed_once() {
        let mut resolver = MemoryResolver::new();
        resolver.add("Util", "util.pas", "unit Util; interface const K = 1; implementation end.");
        let mut session = session(resolver);
        let first = session.load("Util", None, None).unwrap().unwrap();
        let second = session.load("UTIL", None, None).unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(session.units().len(), 1);
        assert!(first.decl_map.contains("k"));
    }

    #[test]
    fn test_unknown_name_is_not_an_error() {
        let mut session = session(MemoryResolver::new());
        assert!(session.load("Nowhere", None, None).unwrap().is_none());
    }

    #[test]
    fn test_missing_explicit_path() {
        let mut session = session(MemoryResolver::new());
        let err = session.load("Gone", Some("gone.pas"), None).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }

    #[test]
    fn test_explicit_path_is_relative_to_referencing_file() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("src/lib/geo.pas", "unit Geo; interface implementation end.");
        let mut session = session(resolver);
        let unit = session
            .load("Geo", Some("lib/geo.pas"), Some(Path::new("src/main.pas")))
            .unwrap()
            .unwrap();
        assert_eq!(unit.ident.name, "Geo");
        // later references by name alone find the same unit
        let again = session.load("geo", None, None).unwrap().unwrap();
        assert!(Rc::ptr_eq(&unit, &again));
    }

    #[test]
    fn test_cycle_is_a_load_error() {
        let mut resolver = MemoryResolver::new();
        resolver.add("A", "a.pas", "unit A; interface uses B; implementation end.");
        resolver.add("B", "b.pas", "unit B; interface uses A; implementation end.");
        let mut session = session(resolver);
        let err = session.load("A", None, None).unwrap_err();
        match err.root() {
            LoadError::Cycle { chain } => assert_eq!(chain, &["A", "B", "A"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
        // failed loads are not cached
        assert!(session.units().is_empty());
    }

    #[test]
    fn test_parse_error_in_dependency() {
        let mut resolver = MemoryResolver::new();
        resolver.add("Bad", "bad.pas", "unit Bad; interface var : Integer; implementation end.");
        let mut session = session(resolver);
        let err = session.load("Bad", None, None).unwrap_err();
        match err {
            LoadError::Parse { path, source } => {
                assert_eq!(path, PathBuf::from("bad.pas"));
                assert!(matches!(*source, ParserError::UnexpectedToken { .. }));
            }
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_load_drops_its_diagnostics() {
        let mut resolver = MemoryResolver::new();
        resolver.add("Good", "good.pas", "unit Good; interface var G: TOther; implementation end.");
        resolver.add(
            "Bad",
            "bad.pas",
            "unit Bad; interface uses Good; var V: TMissing; const = 1; implementation end.",
        );
        let mut session = session(resolver);
        assert!(session.load("Bad", None, None).is_err());

        let names: Vec<_> = session.diagnostics().iter().filter_map(|d| d.name.as_deref()).collect();
        assert_eq!(names, vec!["TOther"]);
        assert_eq!(session.units().len(), 1);
        assert_eq!(session.units()[0].ident.name, "Good");
    }

    #[test]
    fn test_registered_unit_answers_to_its_alias() {
        let mut resolver = MemoryResolver::new();
        resolver.add("Base", "base.pas", "unit Base; interface type TBase = Integer; implementation end.");
        let mut session = session(resolver);
        let base = session.load("Base", None, None).unwrap().unwrap();
        session.register_unit("Core", Rc::clone(&base));
        let found = session.load("core", None, None).unwrap().unwrap();
        assert!(Rc::ptr_eq(&base, &found));
    }
}
