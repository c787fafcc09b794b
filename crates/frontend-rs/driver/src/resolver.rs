//! Unit lookup on disk

use parser::UnitResolver;
use std::fs;
use std::path::{Path, PathBuf};

/// Source extensions, in order of preference
const EXTENSIONS: [&str; 2] = ["pas", "pp"];

/// Finds `<name>.pas` or `<name>.pp` next to the referencing file, then in
/// each search directory in order. Names and extensions match
/// case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct SearchPathResolver {
    search_paths: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn find_in(dir: &Path, name: &str) -> Option<PathBuf> {
        let entries = fs::read_dir(dir).ok()?;
        let mut best: Option<(usize, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let stem_matches = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case(name));
            if !stem_matches {
                continue;
            }
            let rank = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| EXTENSIONS.iter().position(|x| x.eq_ignore_ascii_case(e)));
            if let Some(rank) = rank {
                if best.as_ref().map_or(true, |(r, _)| rank < *r) {
                    best = Some((rank, path));
                }
            }
        }
        best.map(|(_, path)| path)
    }
}

impl UnitResolver for SearchPathResolver {
    fn resolve(&self, name: &str, from: Option<&Path>) -> Option<PathBuf> {
        let local = from.and_then(Path::parent).map(|dir| {
            if dir.as_os_str().is_empty() {
                Path::new(".")
            } else {
                dir
            }
        });
        local
            .into_iter()
            .chain(self.search_paths.iter().map(PathBuf::as_path))
            .find_map(|dir| Self::find_in(dir, name))
    }
}
