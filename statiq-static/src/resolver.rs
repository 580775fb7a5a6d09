//! Request path resolution
//!
//! Maps a request path onto a file below the root directory. Nothing is
//! cached: every call goes to the filesystem, so files changed on disk are
//! visible to the next request.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use percent_encoding::percent_decode_str;
use statiq_core::ServerConfig;
use tokio::fs::File;

use crate::mime::MimeTable;

/// A regular file ready to be served
#[derive(Debug)]
pub struct Asset {
    /// Canonical absolute path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Value for the `Content-Type` header
    pub content_type: String,
    /// Open handle; metadata above was read from it
    pub file: File,
}

impl Asset {
    /// Final path component, used for download dispositions
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of resolving a request path
#[derive(Debug)]
pub enum ResolvedAsset {
    /// A regular, readable file inside the root
    Found(Asset),
    /// Nothing servable at that path
    NotFound,
    /// The path points outside the root
    Forbidden,
    /// The path is a directory; listings are never generated
    IsDirectory,
}

impl ResolvedAsset {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedAsset::Found(_) => "found",
            ResolvedAsset::NotFound => "not_found",
            ResolvedAsset::Forbidden => "forbidden",
            ResolvedAsset::IsDirectory => "directory",
        }
    }
}

/// Resolves request paths below a root directory
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    index: PathBuf,
    mime: MimeTable,
}

impl PathResolver {
    /// Create a resolver for `root`, mapping `/` to `index`
    pub fn new(root: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
            mime: MimeTable::default(),
        }
    }

    /// Create a resolver from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.root_dir.clone(), config.index_file.clone())
    }

    /// Use a custom extension table
    pub fn with_mime_table(mut self, mime: MimeTable) -> Self {
        self.mime = mime;
        self
    }

    /// Resolve a raw (percent-encoded) request path
    pub async fn resolve(&self, request_path: &str) -> ResolvedAsset {
        let relative = match normalize_request_path(request_path) {
            Ok(relative) => relative,
            Err(outcome) => {
                tracing::debug!(path = request_path, outcome = outcome.kind(), "Rejected request path");
                return outcome;
            }
        };

        if relative.as_os_str().is_empty() {
            return match self.resolve_relative(&self.index).await {
                ResolvedAsset::Found(asset) => ResolvedAsset::Found(asset),
                _ => ResolvedAsset::IsDirectory,
            };
        }

        self.resolve_relative(&relative).await
    }

    /// Resolve a path relative to the root, applying the same containment
    /// checks as [`PathResolver::resolve`]
    pub async fn resolve_relative(&self, relative: &Path) -> ResolvedAsset {
        let Some(relative) = clean_relative(relative) else {
            tracing::warn!(path = %relative.display(), "Path escapes the root directory");
            return ResolvedAsset::Forbidden;
        };

        let root = match tokio::fs::canonicalize(&self.root).await {
            Ok(root) => root,
            Err(e) => {
                tracing::error!(root = %self.root.display(), error = %e, "Root directory is not accessible");
                return ResolvedAsset::NotFound;
            }
        };

        let canonical = match tokio::fs::canonicalize(root.join(&relative)).await {
            Ok(path) => path,
            Err(_) => return ResolvedAsset::NotFound,
        };

        // Component-wise: /srv/www-private does not start with /srv/www
        if !canonical.starts_with(&root) {
            tracing::warn!(
                path = %relative.display(),
                target = %canonical.display(),
                "Symlink escapes the root directory"
            );
            return ResolvedAsset::Forbidden;
        }

        let file = match File::open(&canonical).await {
            Ok(file) => file,
            Err(_) => {
                return if tokio::fs::metadata(&canonical).await.is_ok_and(|m| m.is_dir()) {
                    ResolvedAsset::IsDirectory
                } else {
                    ResolvedAsset::NotFound
                };
            }
        };

        let metadata = match file.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => return ResolvedAsset::NotFound,
        };

        if metadata.is_dir() {
            return ResolvedAsset::IsDirectory;
        }
        if !metadata.is_file() {
            return ResolvedAsset::NotFound;
        }

        tracing::debug!("📁 Resolved {} -> {:?}", relative.display(), canonical);

        ResolvedAsset::Found(Asset {
            content_type: self.mime.content_type(&canonical),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path: canonical,
            file,
        })
    }
}

/// Decode and lexically normalize a request path into a root-relative path
fn normalize_request_path(request_path: &str) -> Result<PathBuf, ResolvedAsset> {
    let decoded = percent_decode_str(request_path)
        .decode_utf8()
        .map_err(|_| ResolvedAsset::NotFound)?;

    if decoded.contains('\0') {
        return Err(ResolvedAsset::Forbidden);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(ResolvedAsset::Forbidden);
                }
            }
            segment => segments.push(segment),
        }
    }

    Ok(segments.iter().collect())
}

/// Collapse `.` and `..` without touching the filesystem. `None` when the
/// path is absolute or climbs above its starting point.
fn clean_relative(path: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !cleaned.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(cleaned)
}
