//! Extension <-> MIME type registry.
//!
//! Registered overrides take precedence over the built-in [`table`].
//! Registration order is kept so reverse lookup is deterministic.

mod table;

use crate::search::normalize_extension;

#[derive(Debug, Clone, Default)]
pub struct MimeRegistry {
    /// (normalized extension, lowercase mime type), in registration order
    registered: Vec<(String, String)>,
}

impl MimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or override) the MIME type for an extension.
    pub fn register(&mut self, extension: &str, mime_type: &str) {
        let extension = normalize_extension(extension);
        let mime_type = mime_type.to_ascii_lowercase();

        match self.registered.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(entry) => entry.1 = mime_type,
            None => self.registered.push((extension, mime_type)),
        }
    }

    /// MIME type for an extension, falling back to the built-in table.
    pub fn mime_type(&self, extension: &str) -> Option<&str> {
        let extension = normalize_extension(extension);
        self.registered
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| mime.as_str())
            .or_else(|| table::lookup(&extension))
    }

    /// Only explicitly registered types are consulted.
    pub fn is_registered(&self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        self.registered.iter().any(|(ext, _)| *ext == extension)
    }

    /// First registered extension for a MIME type.
    ///
    /// Only registered types take part; the built-in table is one-way.
    pub fn extension_for(&self, mime_type: &str) -> Option<&str> {
        self.registered
            .iter()
            .find(|(_, mime)| mime.eq_ignore_ascii_case(mime_type))
            .map(|(ext, _)| ext.as_str())
    }
}
