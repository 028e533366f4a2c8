//! A single file run through its processor chain.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use super::AssetMeta;
use crate::context::Context;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::freshness::{DependencyFile, Tracking, dependency_fresh, digest_bytes, hex_digest};

// ============================================================================
// Cycle detection
// ============================================================================

thread_local! {
    /// Files whose processed asset is being built on this thread.
    static BUILDING: RefCell<Vec<PathBuf>> = const { RefCell::new(Vec::new()) };
}

/// Marks a file as in progress for as long as it lives.
struct BuildGuard;

impl BuildGuard {
    fn enter(pathname: &Path) -> Result<Self> {
        BUILDING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|p| p == pathname) {
                return Err(Error::CircularDependency(pathname.to_path_buf()));
            }
            stack.push(pathname.to_path_buf());
            Ok(Self)
        })
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        BUILDING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

// ============================================================================
// ProcessedAsset
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProcessedAsset {
    pub(crate) meta: AssetMeta,
    pub(crate) source: String,
    /// Bundle order, transitive, including this file.
    pub(crate) required_paths: Vec<PathBuf>,
    /// Everything freshness is checked against, transitive.
    pub(crate) dependency_paths: Vec<DependencyFile>,
    /// Digest over the digests of every required asset.
    pub(crate) dependency_digest: String,
}

impl ProcessedAsset {
    pub(crate) fn build(env: &Environment, logical_path: &str, pathname: &Path) -> Result<Self> {
        let _guard = BuildGuard::enter(pathname)?;

        let attributes = env.attributes_for(pathname);
        let mut context = Context::new(env, logical_path, pathname);
        let source = context.evaluate(pathname, None, &attributes.processors)?;
        let digest = digest_bytes(&env.digest(), &source);

        let mut requested = context.required_paths().to_vec();
        requested.push(pathname.to_path_buf());
        let required = resolve_dependencies(env, pathname, &requested)?;
        let stubbed = resolve_dependencies(env, pathname, context.stubbed_assets())?;
        let required_paths: Vec<PathBuf> = required
            .into_iter()
            .filter(|path| !stubbed.contains(path))
            .collect();

        let dependency_paths = collect_dependency_files(env, pathname, &context)?;
        let dependency_digest = compute_dependency_digest(env, pathname, &digest, &required_paths)?;

        let mtime = dependency_paths
            .iter()
            .map(|dep| dep.mtime)
            .max()
            .or_else(|| env.stat(pathname).map(|s| s.mtime))
            .ok_or_else(|| Error::NotFound(pathname.display().to_string()))?;

        Ok(Self {
            meta: AssetMeta {
                logical_path: logical_path.to_string(),
                pathname: pathname.to_path_buf(),
                content_type: attributes.content_type,
                mtime,
                length: source.len() as u64,
                digest,
            },
            source,
            required_paths,
            dependency_paths,
            dependency_digest,
        })
    }

    pub(crate) fn is_fresh(&self, env: &Environment) -> bool {
        self.dependency_paths
            .iter()
            .all(|dep| dependency_fresh(env, dep))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dependency_digest(&self) -> &str {
        &self.dependency_digest
    }
}

/// Expand each path into its own required paths, keeping first occurrences.
fn resolve_dependencies(
    env: &Environment,
    pathname: &Path,
    paths: &[PathBuf],
) -> Result<Vec<PathBuf>> {
    let mut resolved: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !resolved.contains(&path) {
            resolved.push(path);
        }
    };

    for path in paths {
        if path == pathname {
            push(path.clone());
            continue;
        }
        let asset = env
            .find_asset(path, false)?
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        for required in asset.required_paths() {
            push(required);
        }
    }

    Ok(resolved)
}

fn collect_dependency_files(
    env: &Environment,
    pathname: &Path,
    context: &Context<'_>,
) -> Result<Vec<DependencyFile>> {
    let mut files: Vec<DependencyFile> = Vec::new();
    let mut push = |dep: DependencyFile| {
        if !files.contains(&dep) {
            files.push(dep);
        }
    };

    for path in context.dependency_paths() {
        push(DependencyFile::capture(env, path, Tracking::Mtime)?);
    }

    for path in context.dependency_assets() {
        if path == pathname || env.stat(path).is_some_and(|s| s.is_dir()) {
            push(DependencyFile::capture(env, path, Tracking::Digest)?);
            continue;
        }
        let asset = env
            .find_asset(path, false)?
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        for dep in asset.dependency_files() {
            push(dep);
        }
    }

    Ok(files)
}

fn compute_dependency_digest(
    env: &Environment,
    pathname: &Path,
    digest: &str,
    required_paths: &[PathBuf],
) -> Result<String> {
    let mut hasher = env.digest();
    for path in required_paths {
        if path == pathname {
            hasher.update(digest.as_bytes());
            continue;
        }
        let asset = env
            .find_asset(path, false)?
            .ok_or_else(|| Error::NotFound(path.display().to_string()))?;
        hasher.update(asset.digest().as_bytes());
    }
    Ok(hex_digest(&hasher))
}
