//! The asset environment: registries, resolution and the asset caches.
//!
//! ```text
//! Environment
//! ├── registry (RwLock)     search path, mime types, processors, version
//! ├── digest memo           seed hasher, keyed by registry generation
//! ├── assets (DashMap)      in-memory layer: "path:bundle" -> Arc<Asset>
//! └── store (optional)      external layer: CacheStore
//! ```
//!
//! Every registry mutation bumps the generation counter, which is folded
//! into the digest seed and clears the in-memory layer. Entries in an
//! external store written under an older configuration no longer match
//! their `_version` and are rebuilt.

mod cache;
mod find;
mod logical;

#[cfg(test)]
mod tests;

pub use cache::{CacheStore, FileStore, MemoryStore};
pub use logical::{LogicalPaths, PathFilter};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::asset::Asset;
use crate::attributes::AssetAttributes;
use crate::config::RivetsConfig;
use crate::freshness::{digest_bytes, digest_reader};
use crate::mime::MimeRegistry;
use crate::processor::{
    Callback, DirectiveProcessor, Processor, ProcessorRegistry, Registered, SafetyColons,
};
use crate::search::{SearchPath, Stat, clean_path};

/// Mutable configuration shared by every lookup.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    pub(crate) search_path: SearchPath,
    pub(crate) mime_types: MimeRegistry,
    pub(crate) processors: ProcessorRegistry,
    pub(crate) version: String,
    /// Bumped on every mutation.
    pub(crate) generation: u64,
}

pub struct Environment {
    root: PathBuf,
    registry: RwLock<Registry>,
    /// `(generation, seed)` of the last computed digest seed.
    digest_memo: Mutex<Option<(u64, blake3::Hasher)>>,
    assets: DashMap<String, Arc<Asset>>,
    store: Option<Arc<dyn CacheStore>>,
}

impl Environment {
    /// Environment with JavaScript and CSS support and no search roots.
    ///
    /// `.js` and `.css` run through the directive processor; scripts also
    /// get safety colons.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let env = Self::empty(root);
        env.register_mime_type(".js", "application/javascript");
        env.register_mime_type(".css", "text/css");

        let directive: Arc<dyn Processor> = Arc::new(DirectiveProcessor);
        env.register_preprocessor("application/javascript", Arc::clone(&directive), None);
        env.register_preprocessor("text/css", directive, None);
        env.register_postprocessor("application/javascript", Arc::new(SafetyColons), None);
        env
    }

    /// Environment with no registered types, processors or roots.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: RwLock::new(Registry::default()),
            digest_memo: Mutex::new(None),
            assets: DashMap::new(),
            store: None,
        }
    }

    /// Attach an external cache store. Only possible before sharing.
    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build an environment from a loaded `rivets.toml`.
    pub fn from_config(config: &RivetsConfig) -> Self {
        let mut env = Self::new(config.root());
        for path in &config.paths {
            env.append_path(path);
        }
        for (extension, mime_type) in &config.mime_types {
            env.register_mime_type(extension, mime_type);
        }
        if let Some(version) = &config.version {
            env.set_version(version);
        }
        if config.cache.enabled {
            env.store = Some(Arc::new(FileStore::new(config.cache_dir())));
        }
        env
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_cache(&self) -> bool {
        self.store.is_some()
    }

    // ========================================================================
    // Registry mutation
    // ========================================================================

    /// Apply a change to the registry, then invalidate everything derived
    /// from the previous configuration.
    fn mutate<R>(&self, what: &str, change: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = self.registry.write();
        let result = change(&mut registry);
        registry.generation += 1;
        self.expire_index();
        crate::debug!("env"; "{} (generation {})", what, registry.generation);
        result
    }

    fn expire_index(&self) {
        self.assets.clear();
    }

    fn expand_path(&self, path: &Path) -> PathBuf {
        clean_path(&self.root.join(path))
    }

    /// Add a search root with the highest priority. Relative paths are
    /// taken from the environment root.
    pub fn prepend_path(&self, path: impl AsRef<Path>) {
        let path = self.expand_path(path.as_ref());
        self.mutate("prepend path", |r| r.search_path.prepend_path(path));
    }

    pub fn append_path(&self, path: impl AsRef<Path>) {
        let path = self.expand_path(path.as_ref());
        self.mutate("append path", |r| r.search_path.append_path(path));
    }

    pub fn clear_paths(&self) {
        self.mutate("clear paths", |r| r.search_path.clear_paths());
    }

    /// Register a MIME type; the extension becomes searchable.
    pub fn register_mime_type(&self, extension: &str, mime_type: &str) {
        self.mutate("register mime type", |r| {
            r.mime_types.register(extension, mime_type);
            r.search_path.append_extension(extension);
        });
    }

    /// Bind `extension` to an engine.
    ///
    /// An engine with a default MIME type also lets its extension stand in
    /// for that type's format extension during lookup (`app.coffee` is
    /// found as `app.js`).
    pub fn register_engine(&self, extension: &str, engine: Arc<dyn Processor>) {
        self.mutate("register engine", |r| {
            r.search_path.append_extension(extension);
            if let Some(format) = engine
                .default_mime_type()
                .and_then(|mime| r.mime_types.extension_for(mime))
                .map(String::from)
            {
                r.search_path.alias_extension(extension, &format);
            }
            r.processors.register_engine(extension, Registered::new(engine));
        });
    }

    pub fn register_preprocessor(
        &self,
        mime_type: &str,
        processor: Arc<dyn Processor>,
        callback: Option<Callback>,
    ) {
        let registered = registered(processor, callback);
        self.mutate("register preprocessor", |r| {
            r.processors.register_preprocessor(mime_type, registered)
        });
    }

    pub fn unregister_preprocessor(&self, mime_type: &str, name: &str) -> bool {
        self.mutate("unregister preprocessor", |r| {
            r.processors.unregister_preprocessor(mime_type, name)
        })
    }

    pub fn register_postprocessor(
        &self,
        mime_type: &str,
        processor: Arc<dyn Processor>,
        callback: Option<Callback>,
    ) {
        let registered = registered(processor, callback);
        self.mutate("register postprocessor", |r| {
            r.processors.register_postprocessor(mime_type, registered)
        });
    }

    pub fn unregister_postprocessor(&self, mime_type: &str, name: &str) -> bool {
        self.mutate("unregister postprocessor", |r| {
            r.processors.unregister_postprocessor(mime_type, name)
        })
    }

    pub fn register_bundle_processor(
        &self,
        mime_type: &str,
        processor: Arc<dyn Processor>,
        callback: Option<Callback>,
    ) {
        let registered = registered(processor, callback);
        self.mutate("register bundle processor", |r| {
            r.processors.register_bundle_processor(mime_type, registered)
        });
    }

    pub fn unregister_bundle_processor(&self, mime_type: &str, name: &str) -> bool {
        self.mutate("unregister bundle processor", |r| {
            r.processors.unregister_bundle_processor(mime_type, name)
        })
    }

    /// Application version folded into every digest.
    pub fn set_version(&self, version: &str) {
        let version = version.to_string();
        self.mutate("set version", |r| r.version = version);
    }

    // ========================================================================
    // Registry queries
    // ========================================================================

    pub fn paths(&self) -> Vec<PathBuf> {
        self.registry.read().search_path.paths().to_vec()
    }

    pub fn extensions(&self) -> Vec<String> {
        self.registry.read().search_path.extensions().to_vec()
    }

    pub fn version(&self) -> String {
        self.registry.read().version.clone()
    }

    pub fn mime_type(&self, extension: &str) -> Option<String> {
        self.registry
            .read()
            .mime_types
            .mime_type(extension)
            .map(String::from)
    }

    pub fn bundle_processors(&self, mime_type: &str) -> Vec<Registered> {
        self.registry
            .read()
            .processors
            .bundle_processors(mime_type)
            .to_vec()
    }

    pub(crate) fn search_path(&self) -> SearchPath {
        self.registry.read().search_path.clone()
    }

    /// Path-derived attributes under the current configuration.
    pub fn attributes_for(&self, path: impl AsRef<Path>) -> AssetAttributes {
        AssetAttributes::new(&self.registry.read(), path.as_ref())
    }

    pub fn content_type_of(&self, path: impl AsRef<Path>) -> String {
        self.attributes_for(path).content_type
    }

    // ========================================================================
    // Digests and file system
    // ========================================================================

    /// Seed hasher for every digest: engine version, application version
    /// and configuration generation.
    ///
    /// Callers get a clone and may update it freely.
    pub fn digest(&self) -> blake3::Hasher {
        let registry = self.registry.read();
        let mut memo = self.digest_memo.lock();

        if let Some((generation, seed)) = memo.as_ref()
            && *generation == registry.generation
        {
            return seed.clone();
        }

        let mut seed = blake3::Hasher::new();
        seed.update(crate::VERSION.as_bytes());
        seed.update(b"\0");
        seed.update(registry.version.as_bytes());
        seed.update(b"\0");
        seed.update(&registry.generation.to_le_bytes());

        *memo = Some((registry.generation, seed.clone()));
        seed
    }

    /// Salted digest of a file's bytes, or of a directory's entry list.
    pub fn file_digest(&self, path: impl AsRef<Path>) -> Option<String> {
        let path = path.as_ref();
        let stat = self.stat(path)?;
        let seed = self.digest();

        if stat.is_dir() {
            Some(digest_bytes(&seed, self.entries(path).join(",")))
        } else {
            let file = File::open(path).ok()?;
            digest_reader(&seed, file).ok()
        }
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> Option<Stat> {
        crate::search::stat(path.as_ref())
    }

    pub fn entries(&self, path: impl AsRef<Path>) -> Vec<String> {
        crate::search::entries(path.as_ref())
    }
}

fn registered(processor: Arc<dyn Processor>, callback: Option<Callback>) -> Registered {
    let registered = Registered::new(processor);
    match callback {
        Some(callback) => registered.with_callback(callback),
        None => registered,
    }
}
