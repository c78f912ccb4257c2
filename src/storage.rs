//! Blob storage abstraction: path resolution, byte-range reads, and local
//! staging. The inference pipeline only ever sees this trait; transports
//! beyond the local filesystem are the host's concern.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{Error, Result};

pub trait BlobStore: Send + Sync {
    /// Expand a trailing-`*` glob into concrete file paths. Non-glob
    /// inputs pass through unchanged.
    fn resolve(&self, glob: &str, verbose: bool) -> Result<Vec<String>>;

    /// Read a whole object.
    fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Read a byte range of an object.
    fn get_range(&self, path: &str, range: Range<u64>) -> Result<Vec<u8>>;

    /// Produce a local filesystem path for an object, staging it into
    /// `tmp` when it is not already local.
    fn local_handle(&self, path: &str, tmp: &Endpoint) -> Result<LocalHandle>;

    /// Write an object, creating parents as needed.
    fn put(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Object size, or `None` when it does not exist.
    fn try_get_size(&self, path: &str) -> Option<u64>;

    /// Whether the path names an HTTP-derived object rather than a local
    /// or locally-cached one.
    fn is_http_derived(&self, path: &str) -> bool;
}

/// A store plus a root prefix: the view of one directory-like location.
#[derive(Clone)]
pub struct Endpoint {
    store: Arc<dyn BlobStore>,
    root: String,
}

impl Endpoint {
    pub fn new(store: Arc<dyn BlobStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn full_path(&self, name: &str) -> String {
        let trimmed = self.root.trim_end_matches('/');
        if trimmed.is_empty() {
            name.to_owned()
        } else {
            format!("{trimmed}/{name}")
        }
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.store.get(&self.full_path(name))
    }

    pub fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.store.put(&self.full_path(name), data)
    }

    pub fn try_get_size(&self, name: &str) -> Option<u64> {
        self.store.try_get_size(&self.full_path(name))
    }
}

/// A usable local path, removed on drop when it was staged.
pub struct LocalHandle {
    path: PathBuf,
    temporary: bool,
}

impl LocalHandle {
    pub fn new(path: PathBuf, temporary: bool) -> Self {
        Self { path, temporary }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocalHandle {
    fn drop(&mut self) {
        if self.temporary {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Local-filesystem store.
pub struct LocalFs;

impl BlobStore for LocalFs {
    fn resolve(&self, glob: &str, verbose: bool) -> Result<Vec<String>> {
        if !glob.ends_with('*') || self.is_http_derived(glob) {
            return Ok(vec![glob.to_owned()]);
        }

        let base = glob.trim_end_matches('*').trim_end_matches('/');
        let base = if base.is_empty() { "." } else { base };
        if !Path::new(base).is_dir() {
            log::warn!("nothing to resolve at {glob}");
            return Ok(Vec::new());
        }

        let mut paths: Vec<String> = WalkDir::new(base)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.path().to_string_lossy().into_owned())
            .collect();
        paths.sort();

        if verbose {
            log::info!("resolved {glob} to {} files", paths.len());
        }
        Ok(paths)
    }

    fn get(&self, path: &str) -> Result<Vec<u8>> {
        if self.is_http_derived(path) {
            return Err(Error::UnsupportedRemote(path.to_owned()));
        }
        Ok(fs::read(path)?)
    }

    fn get_range(&self, path: &str, range: Range<u64>) -> Result<Vec<u8>> {
        if self.is_http_derived(path) {
            return Err(Error::UnsupportedRemote(path.to_owned()));
        }
        let mut file = fs::File::open(path)?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut data = Vec::new();
        file.take(range.end - range.start).read_to_end(&mut data)?;
        Ok(data)
    }

    fn local_handle(&self, path: &str, _tmp: &Endpoint) -> Result<LocalHandle> {
        if self.is_http_derived(path) {
            return Err(Error::UnsupportedRemote(path.to_owned()));
        }
        Ok(LocalHandle::new(PathBuf::from(path), false))
    }

    fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, data)?;
        Ok(())
    }

    fn try_get_size(&self, path: &str) -> Option<u64> {
        fs::metadata(path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    fn is_http_derived(&self, path: &str) -> bool {
        path.starts_with("http://") || path.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_trailing_star() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.las"), b"x").unwrap();
        fs::write(root.join("a.las"), b"x").unwrap();
        fs::create_dir(root.join("nested")).unwrap();
        fs::write(root.join("nested/c.laz"), b"x").unwrap();

        let glob = format!("{}/*", root.display());
        let paths = LocalFs.resolve(&glob, false).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("a.las"));
        assert!(paths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_resolve_passthrough() {
        let paths = LocalFs.resolve("/some/file.las", false).unwrap();
        assert_eq!(paths, vec!["/some/file.las".to_owned()]);
    }

    #[test]
    fn test_get_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"0123456789").unwrap();

        let data = LocalFs
            .get_range(&path.to_string_lossy(), 2..6)
            .unwrap();
        assert_eq!(data, b"2345");
    }

    #[test]
    fn test_endpoint_put_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let ep = Endpoint::new(Arc::new(LocalFs), dir.path().to_string_lossy().into_owned());

        assert!(ep.try_get_size("marker").is_none());
        ep.put("marker", b"ok").unwrap();
        assert_eq!(ep.try_get_size("marker"), Some(2));
    }

    #[test]
    fn test_temporary_handle_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.las");
        fs::write(&path, b"x").unwrap();

        {
            let _handle = LocalHandle::new(path.clone(), true);
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_http_detection() {
        assert!(LocalFs.is_http_derived("http://host/cloud.laz"));
        assert!(LocalFs.is_http_derived("https://host/cloud.laz"));
        assert!(!LocalFs.is_http_derived("/data/cloud.laz"));
    }
}
