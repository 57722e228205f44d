//! Read-only static asset collection served under `/static/`.
//!
//! The server only needs a key-to-bytes lookup. Assets can come from a
//! directory on disk (loaded once at startup) or be assembled in memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;

/// Errors mounting an asset collection. Fatal at construction.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset directory {0} does not exist or is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key-to-bytes lookup. Keys are `/`-separated paths relative to the root.
pub trait AssetProvider: Send + Sync {
    fn get(&self, path: &str) -> Option<Bytes>;
}

/// In-memory asset collection.
#[derive(Debug, Clone, Default)]
pub struct StaticAssets {
    files: HashMap<String, Bytes>,
}

impl StaticAssets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset.
    #[must_use]
    pub fn insert(mut self, path: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    /// Number of assets in the collection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Load every file below `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory or any file fails to read.
    pub fn from_dir(root: &Path) -> Result<Self, AssetError> {
        if !root.is_dir() {
            return Err(AssetError::NotADirectory(root.to_path_buf()));
        }

        let mut files = HashMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let entries = std::fs::read_dir(&dir).map_err(|source| AssetError::Io {
                path: dir.clone(),
                source,
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|source| AssetError::Io {
                        path: dir.clone(),
                        source,
                    })?
                    .path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let contents = std::fs::read(&path).map_err(|source| AssetError::Io {
                    path: path.clone(),
                    source,
                })?;
                if let Some(key) = asset_key(root, &path) {
                    files.insert(key, Bytes::from(contents));
                }
            }
        }

        tracing::debug!(root = %root.display(), count = files.len(), "Loaded static assets");
        Ok(Self { files })
    }
}

/// `/`-joined path of `path` relative to `root`.
fn asset_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

impl AssetProvider for StaticAssets {
    fn get(&self, path: &str) -> Option<Bytes> {
        self.files.get(path).cloned()
    }
}

/// Anything that can be turned into a mounted [`AssetProvider`].
pub trait AssetSource {
    /// Mount the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the assets cannot be loaded.
    fn mount(self) -> Result<Arc<dyn AssetProvider>, AssetError>;
}

impl AssetSource for StaticAssets {
    fn mount(self) -> Result<Arc<dyn AssetProvider>, AssetError> {
        Ok(Arc::new(self))
    }
}

impl AssetSource for PathBuf {
    fn mount(self) -> Result<Arc<dyn AssetProvider>, AssetError> {
        Ok(Arc::new(StaticAssets::from_dir(&self)?))
    }
}

impl AssetSource for &Path {
    fn mount(self) -> Result<Arc<dyn AssetProvider>, AssetError> {
        Ok(Arc::new(StaticAssets::from_dir(self)?))
    }
}

impl AssetSource for Arc<dyn AssetProvider> {
    fn mount(self) -> Result<Arc<dyn AssetProvider>, AssetError> {
        Ok(self)
    }
}

/// `Content-Type` for an asset path, by extension.
#[must_use]
pub fn content_type(path: &str) -> &'static str {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_lookup() {
        let assets = StaticAssets::new()
            .insert("a.txt", "hello")
            .insert("css/site.css", "body{}");
        assert_eq!(assets.get("a.txt").unwrap(), Bytes::from("hello"));
        assert_eq!(assets.get("css/site.css").unwrap(), Bytes::from("body{}"));
        assert!(assets.get("missing.txt").is_none());
        assert_eq!(assets.len(), 2);
    }

    #[test]
    fn test_from_dir_reads_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        std::fs::create_dir_all(dir.path().join("img/products")).unwrap();
        std::fs::write(dir.path().join("img/products/hat.jpg"), b"\xff\xd8").unwrap();

        let assets = StaticAssets::from_dir(dir.path()).unwrap();
        assert_eq!(assets.get("a.txt").unwrap(), Bytes::from_static(b"alpha"));
        assert_eq!(
            assets.get("img/products/hat.jpg").unwrap(),
            Bytes::from_static(b"\xff\xd8")
        );
    }

    #[test]
    fn test_missing_dir_fails_to_mount() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            missing.mount(),
            Err(AssetError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("styles/app.CSS"), "text/css; charset=utf-8");
        assert_eq!(content_type("img/logo.svg"), "image/svg+xml");
        assert_eq!(content_type("LICENSE"), "application/octet-stream");
    }
}
