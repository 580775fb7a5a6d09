//! Server configuration
//!
//! [`Options`] mirrors the command-line flags one to one. [`Options::resolve`]
//! turns it into the immutable [`ServerConfig`] that is built once at startup
//! and shared read-only by every request.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default asset root
pub const DEFAULT_ROOT: &str = "/data/files";

/// Default listen address
pub const DEFAULT_ADDR: &str = ":3000";

/// Default cache duration (12 hours)
pub const DEFAULT_CACHE: Duration = Duration::from_secs(12 * 60 * 60);

/// Default index document, relative to the root
pub const DEFAULT_INDEX: &str = "index.html";

/// Compression effort applied to response bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompressionLevel {
    /// No compression
    Disabled,
    /// Default compression
    #[default]
    Default,
    /// Best compression (slower)
    Best,
}

impl CompressionLevel {
    /// Map a numeric flag value onto a level.
    ///
    /// Out-of-range values never fail: negative values disable compression and
    /// anything above 2 falls back to the default level.
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=0 => CompressionLevel::Disabled,
            1 => CompressionLevel::Default,
            2 => CompressionLevel::Best,
            _ => CompressionLevel::Default,
        }
    }

    /// Whether responses may be compressed at all
    pub fn is_enabled(self) -> bool {
        !matches!(self, CompressionLevel::Disabled)
    }

    /// Numeric flag value for this level
    pub fn as_level(self) -> i64 {
        match self {
            CompressionLevel::Disabled => 0,
            CompressionLevel::Default => 1,
            CompressionLevel::Best => 2,
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionLevel::Disabled => "disabled",
            CompressionLevel::Default => "default",
            CompressionLevel::Best => "best",
        };
        write!(f, "{} ({})", self.as_level(), name)
    }
}

/// Username to password table for basic authentication
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    users: HashMap<String, String>,
}

// Passwords never end up in logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut users: Vec<&str> = self.users.keys().map(String::as_str).collect();
        users.sort_unstable();
        f.debug_struct("Credentials").field("users", &users).finish()
    }
}

impl Credentials {
    /// Parse `username:password` entries.
    ///
    /// Entries without a colon, or with an empty username or password after
    /// trimming, are dropped. A repeated username keeps the last password.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut users = HashMap::new();
        for entry in entries {
            let Some((username, password)) = entry.as_ref().split_once(':') else {
                continue;
            };
            let username = username.trim();
            let password = password.trim();
            if username.is_empty() || password.is_empty() {
                continue;
            }
            users.insert(username.to_string(), password.to_string());
        }
        Self { users }
    }

    /// Expected password for a user
    pub fn get(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    /// Number of configured users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when no user is configured, which disables authentication
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory the assets are served from
    pub root_dir: PathBuf,

    /// Socket address to bind, already normalized (`:3000` -> `0.0.0.0:3000`)
    pub listen_addr: String,

    /// Lifetime advertised through `Cache-Control` and `Expires`
    pub cache_duration: Duration,

    /// Response compression
    pub compression: CompressionLevel,

    /// Serve the index document for unmatched paths
    pub spa: bool,

    /// Index document, relative to `root_dir`. Checked at request time only.
    pub index_file: PathBuf,

    /// Send files as attachments
    pub download: bool,

    /// Emit one log event per request
    pub log_requests: bool,

    /// Basic authentication users; empty disables the gate
    pub credentials: Credentials,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT),
            listen_addr: normalize_listen_addr(DEFAULT_ADDR),
            cache_duration: DEFAULT_CACHE,
            compression: CompressionLevel::Default,
            spa: false,
            index_file: PathBuf::from(DEFAULT_INDEX),
            download: false,
            log_requests: false,
            credentials: Credentials::default(),
        }
    }
}

impl ServerConfig {
    /// Create a config serving `root` with defaults for everything else
    pub fn serve_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Default::default()
        }
    }

    /// Full path of the index document
    pub fn index_path(&self) -> PathBuf {
        self.root_dir.join(&self.index_file)
    }
}

/// Non-fatal configuration problems found while resolving [`Options`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigWarning {
    #[error("No files path specified")]
    EmptyRoot,

    #[error("Files path {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("No address specified")]
    EmptyAddress,

    #[error("Invalid compression level {0}, using {1}")]
    InvalidCompressionLevel(i64, CompressionLevel),
}

/// Raw startup parameters, one field per command-line flag
#[derive(Clone)]
pub struct Options {
    pub files: String,
    pub addr: String,
    pub cache: Duration,
    pub compress_level: i64,
    pub log_requests: bool,
    pub spa: bool,
    pub index: String,
    pub download: bool,
    pub users: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            files: DEFAULT_ROOT.to_string(),
            addr: DEFAULT_ADDR.to_string(),
            cache: DEFAULT_CACHE,
            compress_level: 1,
            log_requests: false,
            spa: false,
            index: DEFAULT_INDEX.to_string(),
            download: false,
            users: Vec::new(),
        }
    }
}

impl Options {
    /// Build the server configuration.
    ///
    /// Misconfiguration is reported as warnings and never aborts resolution.
    pub fn resolve(self) -> (ServerConfig, Vec<ConfigWarning>) {
        let mut warnings = Vec::new();

        let root_dir = PathBuf::from(&self.files);
        if self.files.is_empty() {
            warnings.push(ConfigWarning::EmptyRoot);
        } else if !root_dir.is_dir() {
            warnings.push(ConfigWarning::RootNotDirectory(root_dir.clone()));
        }

        if self.addr.trim().is_empty() {
            warnings.push(ConfigWarning::EmptyAddress);
        }

        let compression = CompressionLevel::from_level(self.compress_level);
        if !(0..=2).contains(&self.compress_level) {
            warnings.push(ConfigWarning::InvalidCompressionLevel(
                self.compress_level,
                compression,
            ));
        }

        let config = ServerConfig {
            root_dir,
            listen_addr: normalize_listen_addr(self.addr.trim()),
            cache_duration: self.cache,
            compression,
            spa: self.spa,
            index_file: PathBuf::from(self.index),
            download: self.download,
            log_requests: self.log_requests,
            credentials: Credentials::parse(&self.users),
        };

        (config, warnings)
    }
}

/// Expand a bare `:port` into an all-interfaces address
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_parse() {
        let creds = Credentials::parse(["alice:secret", " bob : hunter2 "]);
        assert_eq!(creds.len(), 2);
        assert_eq!(creds.get("alice"), Some("secret"));
        assert_eq!(creds.get("bob"), Some("hunter2"));
    }

    #[test]
    fn test_credentials_drop_malformed() {
        let creds = Credentials::parse(["bob", ":nopass", "nouser:", "  :  ", "carol:pw"]);
        assert_eq!(creds.len(), 1);
        assert_eq!(creds.get("bob"), None);
        assert_eq!(creds.get(""), None);
        assert_eq!(creds.get("nouser"), None);
        assert_eq!(creds.get("carol"), Some("pw"));
    }

    #[test]
    fn test_credentials_last_wins() {
        let creds = Credentials::parse(["alice:one", "alice:two"]);
        assert_eq!(creds.len(), 1);
        assert_eq!(creds.get("alice"), Some("two"));
    }

    #[test]
    fn test_credentials_password_may_contain_colon() {
        let creds = Credentials::parse(["alice:a:b:c"]);
        assert_eq!(creds.get("alice"), Some("a:b:c"));
    }

    #[test]
    fn test_credentials_debug_hides_passwords() {
        let creds = Credentials::parse(["alice:secret"]);
        let debug = format!("{:?}", creds);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_compression_levels() {
        assert_eq!(CompressionLevel::from_level(0), CompressionLevel::Disabled);
        assert_eq!(CompressionLevel::from_level(1), CompressionLevel::Default);
        assert_eq!(CompressionLevel::from_level(2), CompressionLevel::Best);
        assert_eq!(CompressionLevel::from_level(-3), CompressionLevel::Disabled);
        assert_eq!(CompressionLevel::from_level(9), CompressionLevel::Default);
        assert!(!CompressionLevel::Disabled.is_enabled());
        assert!(CompressionLevel::Best.is_enabled());
    }

    #[test]
    fn test_normalize_listen_addr() {
        assert_eq!(normalize_listen_addr(":3000"), "0.0.0.0:3000");
        assert_eq!(normalize_listen_addr("127.0.0.1:8080"), "127.0.0.1:8080");
    }

    #[test]
    fn test_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options {
            files: dir.path().to_string_lossy().to_string(),
            ..Default::default()
        };

        let (config, warnings) = options.resolve();
        assert!(warnings.is_empty());
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.cache_duration, Duration::from_secs(43200));
        assert_eq!(config.compression, CompressionLevel::Default);
        assert_eq!(config.index_path(), dir.path().join("index.html"));
        assert!(config.credentials.is_empty());
    }

    #[test]
    fn test_resolve_is_permissive() {
        let options = Options {
            files: String::new(),
            addr: String::new(),
            compress_level: 7,
            ..Default::default()
        };

        let (config, warnings) = options.resolve();
        assert_eq!(
            warnings,
            vec![
                ConfigWarning::EmptyRoot,
                ConfigWarning::EmptyAddress,
                ConfigWarning::InvalidCompressionLevel(7, CompressionLevel::Default),
            ]
        );
        assert_eq!(config.compression, CompressionLevel::Default);
    }

    #[test]
    fn test_resolve_missing_root_warns() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let options = Options {
            files: missing.to_string_lossy().to_string(),
            users: vec!["alice:secret".to_string(), "bob".to_string()],
            ..Default::default()
        };

        let (config, warnings) = options.resolve();
        assert_eq!(warnings, vec![ConfigWarning::RootNotDirectory(missing)]);
        assert_eq!(config.credentials.len(), 1);
    }
}
