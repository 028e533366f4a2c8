//! Built-in extension -> MIME type seed table.
//!
//! Consulted only when no override has been registered.

/// Guess MIME type from a normalized (`.ext`, lowercase) extension.
pub fn lookup(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        // Web / Text
        ".html" | ".htm" => "text/html",
        ".css" => "text/css",
        ".js" | ".mjs" | ".cjs" => "application/javascript",
        ".json" => "application/json",
        ".xml" => "application/xml",
        ".txt" => "text/plain",
        ".md" => "text/markdown",
        ".yaml" | ".yml" => "text/yaml",
        ".csv" => "text/csv",

        // Images
        ".svg" => "image/svg+xml",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".avif" => "image/avif",
        ".ico" => "image/x-icon",
        ".bmp" => "image/bmp",
        ".tif" | ".tiff" => "image/tiff",

        // Audio / Video
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".ogg" | ".oga" => "audio/ogg",
        ".mp4" | ".m4v" => "video/mp4",
        ".webm" => "video/webm",

        // Fonts
        ".woff" => "font/woff",
        ".woff2" => "font/woff2",
        ".ttf" => "font/ttf",
        ".otf" => "font/otf",
        ".eot" => "application/vnd.ms-fontobject",

        // Documents / Binary
        ".pdf" => "application/pdf",
        ".wasm" => "application/wasm",
        ".zip" => "application/zip",
        ".gz" | ".gzip" => "application/gzip",

        _ => return None,
    };
    Some(mime)
}
