//! Processors: the transformations applied to asset source text.
//!
//! Four registries feed an asset's processor chain:
//!
//! ```text
//! preprocessors(content_type)   e.g. directive
//! engines (by extension)        e.g. .coffee, .erb, rightmost first
//! postprocessors(content_type)  e.g. safety colons
//! bundle_processors(ct)         run once over a concatenated bundle
//! ```

mod directive;
mod safety_colons;

pub use directive::DirectiveProcessor;
pub use safety_colons::SafetyColons;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::search::normalize_extension;

/// A single source transformation.
///
/// Implementations receive the mutable build context so they can declare
/// requires and dependencies while rendering.
pub trait Processor: Send + Sync {
    /// Identity used for unregistering and error attribution.
    fn name(&self) -> &str;

    /// Output MIME type for engines whose file has no format extension.
    fn default_mime_type(&self) -> Option<&str> {
        None
    }

    fn render(&self, context: &mut Context<'_>, data: String) -> anyhow::Result<String>;
}

/// Invoked with the rendered output right after a processor runs.
pub type Callback = Arc<dyn Fn(&Context<'_>, &str) + Send + Sync>;

/// A processor as stored in a registry.
#[derive(Clone)]
pub struct Registered {
    pub processor: Arc<dyn Processor>,
    pub callback: Option<Callback>,
}

impl Registered {
    pub fn new(processor: Arc<dyn Processor>) -> Self {
        Self {
            processor,
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.processor.name()
    }
}

impl fmt::Debug for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registered")
            .field("processor", &self.name())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

// ============================================================================
// Closure processors
// ============================================================================

/// Adapter turning a closure into a [`Processor`].
///
/// ```ignore
/// let upper = FnProcessor::new("upcase", |_ctx, data| Ok(data.to_uppercase()));
/// env.register_postprocessor("text/css", Arc::new(upper), None);
/// ```
pub struct FnProcessor<F> {
    name: String,
    default_mime_type: Option<String>,
    render: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&mut Context<'_>, String) -> anyhow::Result<String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, render: F) -> Self {
        Self {
            name: name.into(),
            default_mime_type: None,
            render,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.default_mime_type = Some(mime_type.into());
        self
    }
}

impl<F> Processor for FnProcessor<F>
where
    F: Fn(&mut Context<'_>, String) -> anyhow::Result<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn default_mime_type(&self) -> Option<&str> {
        self.default_mime_type.as_deref()
    }

    fn render(&self, context: &mut Context<'_>, data: String) -> anyhow::Result<String> {
        (self.render)(context, data)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered processor lists keyed by lowercase MIME type.
#[derive(Debug, Clone, Default)]
struct ByMimeType(FxHashMap<String, Vec<Registered>>);

impl ByMimeType {
    fn register(&mut self, mime_type: &str, registered: Registered) {
        self.0
            .entry(mime_type.to_ascii_lowercase())
            .or_default()
            .push(registered);
    }

    /// Remove every processor named `name`. Returns whether any was removed.
    fn unregister(&mut self, mime_type: &str, name: &str) -> bool {
        let Some(list) = self.0.get_mut(&mime_type.to_ascii_lowercase()) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.name() != name);
        before != list.len()
    }

    fn get(&self, mime_type: &str) -> &[Registered] {
        self.0
            .get(&mime_type.to_ascii_lowercase())
            .map_or(&[], Vec::as_slice)
    }
}

/// Every processor known to an environment.
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    engines: FxHashMap<String, Registered>,
    preprocessors: ByMimeType,
    postprocessors: ByMimeType,
    bundle_processors: ByMimeType,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a file extension to an engine. Re-registering replaces it.
    pub fn register_engine(&mut self, extension: &str, registered: Registered) {
        self.engines
            .insert(normalize_extension(extension), registered);
    }

    pub fn engine(&self, extension: &str) -> Option<&Registered> {
        self.engines.get(&normalize_extension(extension))
    }

    pub fn is_engine(&self, extension: &str) -> bool {
        self.engines.contains_key(&normalize_extension(extension))
    }

    pub fn register_preprocessor(&mut self, mime_type: &str, registered: Registered) {
        self.preprocessors.register(mime_type, registered);
    }

    pub fn unregister_preprocessor(&mut self, mime_type: &str, name: &str) -> bool {
        self.preprocessors.unregister(mime_type, name)
    }

    pub fn preprocessors(&self, mime_type: &str) -> &[Registered] {
        self.preprocessors.get(mime_type)
    }

    pub fn register_postprocessor(&mut self, mime_type: &str, registered: Registered) {
        self.postprocessors.register(mime_type, registered);
    }

    pub fn unregister_postprocessor(&mut self, mime_type: &str, name: &str) -> bool {
        self.postprocessors.unregister(mime_type, name)
    }

    pub fn postprocessors(&self, mime_type: &str) -> &[Registered] {
        self.postprocessors.get(mime_type)
    }

    pub fn register_bundle_processor(&mut self, mime_type: &str, registered: Registered) {
        self.bundle_processors.register(mime_type, registered);
    }

    pub fn unregister_bundle_processor(&mut self, mime_type: &str, name: &str) -> bool {
        self.bundle_processors.unregister(mime_type, name)
    }

    pub fn bundle_processors(&self, mime_type: &str) -> &[Registered] {
        self.bundle_processors.get(mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &'static str) -> Registered {
        Registered::new(Arc::new(FnProcessor::new(name, |_, data| Ok(data))))
    }

    #[test]
    fn test_engines_by_normalized_extension() {
        let mut registry = ProcessorRegistry::new();
        registry.register_engine("COFFEE", named("coffee"));

        assert!(registry.is_engine(".coffee"));
        assert_eq!(registry.engine("coffee").map(Registered::name), Some("coffee"));
        assert!(!registry.is_engine(".js"));
    }

    #[test]
    fn test_order_kept_and_unregister_by_name() {
        let mut registry = ProcessorRegistry::new();
        registry.register_preprocessor("text/css", named("first"));
        registry.register_preprocessor("text/css", named("second"));
        registry.register_preprocessor("Text/CSS", named("third"));

        let names: Vec<&str> = registry
            .preprocessors("text/css")
            .iter()
            .map(Registered::name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);

        assert!(registry.unregister_preprocessor("text/css", "second"));
        assert!(!registry.unregister_preprocessor("text/css", "missing"));
        assert_eq!(registry.preprocessors("text/css").len(), 2);
        assert!(registry.postprocessors("text/css").is_empty());
    }

    #[test]
    fn test_fn_processor_mime_type() {
        let engine = FnProcessor::new("tmpl", |_, data| Ok(data)).with_mime_type("text/html");
        assert_eq!(engine.default_mime_type(), Some("text/html"));
        assert_eq!(engine.name(), "tmpl");
    }
}
