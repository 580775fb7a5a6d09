//! SPA fallback routing
//!
//! In SPA mode a genuine miss is answered with the index document so the
//! client-side router can handle the path. Rejections are never rewritten.

use std::path::PathBuf;

use statiq_core::ServerConfig;

use crate::resolver::{PathResolver, ResolvedAsset};

/// Fallback policy applied after path resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackRouter {
    /// Misses stay misses
    Direct,
    /// Misses are served the index document
    SpaFallback {
        /// Index document, relative to the root
        index: PathBuf,
    },
}

impl FallbackRouter {
    /// Choose the policy from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        if config.spa {
            FallbackRouter::SpaFallback {
                index: config.index_file.clone(),
            }
        } else {
            FallbackRouter::Direct
        }
    }

    /// Resolve `request_path`, falling back to the index on a miss
    pub async fn route(&self, resolver: &PathResolver, request_path: &str) -> ResolvedAsset {
        match resolver.resolve(request_path).await {
            ResolvedAsset::NotFound => self.fallback(resolver, request_path).await,
            outcome => outcome,
        }
    }

    async fn fallback(&self, resolver: &PathResolver, request_path: &str) -> ResolvedAsset {
        let FallbackRouter::SpaFallback { index } = self else {
            return ResolvedAsset::NotFound;
        };

        tracing::debug!("Serving {} for {}", index.display(), request_path);
        match resolver.resolve_relative(index).await {
            found @ ResolvedAsset::Found(_) => found,
            outcome => {
                tracing::warn!(
                    index = %index.display(),
                    outcome = outcome.kind(),
                    "Index file is not servable, SPA fallback answers 404"
                );
                ResolvedAsset::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn spa() -> FallbackRouter {
        FallbackRouter::SpaFallback {
            index: PathBuf::from("index.html"),
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = ServerConfig::serve_dir("/srv");
        assert_eq!(FallbackRouter::from_config(&config), FallbackRouter::Direct);

        config.spa = true;
        config.index_file = PathBuf::from("app.html");
        assert_eq!(
            FallbackRouter::from_config(&config),
            FallbackRouter::SpaFallback {
                index: PathBuf::from("app.html")
            }
        );
    }

    #[tokio::test]
    async fn test_spa_serves_index_for_misses() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<div id=app></div>").unwrap();
        let resolver = PathResolver::new(dir.path(), "index.html");

        let ResolvedAsset::Found(asset) = spa().route(&resolver, "/app/settings").await else {
            panic!("expected index fallback");
        };
        assert_eq!(asset.file_name(), "index.html");

        assert!(matches!(
            FallbackRouter::Direct.route(&resolver, "/app/settings").await,
            ResolvedAsset::NotFound
        ));
    }

    #[tokio::test]
    async fn test_spa_missing_index_is_not_found() {
        let dir = tempdir().unwrap();
        let resolver = PathResolver::new(dir.path(), "index.html");

        assert!(matches!(
            spa().route(&resolver, "/app/settings").await,
            ResolvedAsset::NotFound
        ));
    }

    #[tokio::test]
    async fn test_spa_keeps_rejections() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("index.html"), "<div id=app></div>").unwrap();
        let resolver = PathResolver::new(dir.path(), "index.html");

        assert!(matches!(
            spa().route(&resolver, "/../../etc/passwd").await,
            ResolvedAsset::Forbidden
        ));
        assert!(matches!(
            spa().route(&resolver, "/assets").await,
            ResolvedAsset::IsDirectory
        ));
    }

    #[tokio::test]
    async fn test_spa_index_outside_root_is_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("index.html"), "outside").unwrap();
        let resolver = PathResolver::new(dir.path().join("public"), "../index.html");
        let router = FallbackRouter::SpaFallback {
            index: PathBuf::from("../index.html"),
        };

        assert!(matches!(
            router.route(&resolver, "/missing").await,
            ResolvedAsset::NotFound
        ));
    }
}
