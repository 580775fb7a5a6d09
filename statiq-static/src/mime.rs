//! MIME type handling

use std::collections::HashMap;
use std::path::Path;

/// Fallback for unknown extensions
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions `mime_guess` either misses or gets wrong for browsers
const OVERRIDES: &[(&str, &str)] = &[
    ("mjs", "text/javascript"),
    ("wasm", "application/wasm"),
    ("webmanifest", "application/manifest+json"),
    ("map", "application/json"),
];

/// Extension to content-type mapping.
///
/// Lookups check the table first and fall back to `mime_guess`. Textual types
/// get an explicit UTF-8 charset.
#[derive(Debug, Clone)]
pub struct MimeTable {
    overrides: HashMap<String, String>,
}

impl Default for MimeTable {
    fn default() -> Self {
        let overrides = OVERRIDES
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { overrides }
    }
}

impl MimeTable {
    /// Add or replace a mapping
    pub fn with(mut self, ext: &str, mime: &str) -> Self {
        self.overrides
            .insert(ext.trim_start_matches('.').to_ascii_lowercase(), mime.to_string());
        self
    }

    /// Content type for a path, including charset for textual types
    pub fn content_type(&self, path: &Path) -> String {
        let mime = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.overrides.get(&ext.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or_else(|| guess_mime_type(path));

        if is_textual(mime) {
            format!("{}; charset=utf-8", mime)
        } else {
            mime.to_string()
        }
    }
}

/// Get MIME type for a file extension
pub fn guess_mime_type(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
}

fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/")
        || matches!(
            mime,
            "application/json" | "application/manifest+json" | "application/xml" | "image/svg+xml"
        )
}
