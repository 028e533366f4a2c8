//! Enumerating every logical path reachable from the search roots.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use rustc_hash::FxHashSet;

use super::Environment;

/// Selects logical paths in [`Environment::each_logical_path`].
pub enum PathFilter {
    /// Matches if the pattern is found anywhere in the logical path.
    Regex(Regex),
    /// Matches the whole logical path; `*` also crosses `/`.
    Glob(glob::Pattern),
    /// Called with the logical path and the physical file.
    Predicate(Box<dyn Fn(&str, &Path) -> bool + Send + Sync>),
}

impl PathFilter {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Regex)
    }

    pub fn glob(pattern: &str) -> Result<Self, glob::PatternError> {
        glob::Pattern::new(pattern).map(Self::Glob)
    }

    pub fn predicate(f: impl Fn(&str, &Path) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Box::new(f))
    }

    pub fn matches(&self, logical_path: &str, filename: &Path) -> bool {
        match self {
            Self::Regex(re) => re.is_match(logical_path),
            Self::Glob(pattern) => pattern.matches(logical_path),
            Self::Predicate(f) => f(logical_path, filename),
        }
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Self::Glob(pattern) => f.debug_tuple("Glob").field(&pattern.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Lazy depth-first walk over every root, yielding
/// `(logical_path, physical_path)` once per logical path.
///
/// Roots are snapshotted when the walk starts.
pub struct LogicalPaths<'a> {
    env: &'a Environment,
    filters: Vec<PathFilter>,
    roots: std::vec::IntoIter<PathBuf>,
    stack: Vec<std::vec::IntoIter<PathBuf>>,
    seen: FxHashSet<String>,
}

impl Iterator for LogicalPaths<'_> {
    type Item = (String, PathBuf);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(level) = self.stack.last_mut() else {
                let root = self.roots.next()?;
                self.stack.push(children(self.env, &root));
                continue;
            };
            let Some(path) = level.next() else {
                self.stack.pop();
                continue;
            };

            match self.env.stat(&path) {
                Some(stat) if stat.is_dir() => {
                    let entries = children(self.env, &path);
                    self.stack.push(entries);
                }
                Some(_) => {
                    let Some(logical_path) = self.env.logical_path_for_filename(&path, &self.filters)
                    else {
                        continue;
                    };
                    if self.seen.insert(logical_path.clone()) {
                        return Some((logical_path, path));
                    }
                }
                None => {}
            }
        }
    }
}

fn children(env: &Environment, dir: &Path) -> std::vec::IntoIter<PathBuf> {
    env.entries(dir)
        .into_iter()
        .map(|name| dir.join(name))
        .collect::<Vec<_>>()
        .into_iter()
}

impl Environment {
    /// Every logical path under the search roots that passes any of
    /// `filters`.
    ///
    /// Earlier roots shadow later ones. An empty filter list accepts all.
    pub fn each_logical_path(&self, filters: Vec<PathFilter>) -> LogicalPaths<'_> {
        LogicalPaths {
            env: self,
            filters,
            roots: self.paths().into_iter(),
            stack: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    /// Logical path of `filename` if it passes `filters`.
    ///
    /// An `index` file failing the filters is retried under its directory
    /// name: `foo/index.js` as `foo.js`.
    pub fn logical_path_for_filename(
        &self,
        filename: &Path,
        filters: &[PathFilter],
    ) -> Option<String> {
        let logical_path = self.attributes_for(filename).logical_path;
        let passes =
            |path: &str| filters.is_empty() || filters.iter().any(|f| f.matches(path, filename));

        if passes(&logical_path) {
            return Some(logical_path);
        }

        let is_index = filename
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.split('.').next() == Some("index"));
        if is_index && logical_path.contains("/index.") {
            let alias = logical_path.replacen("/index.", ".", 1);
            if passes(&alias) {
                return Some(alias);
            }
        }

        None
    }
}
