//! File-system abstraction for the Module Loader.
//!
//! Hides I/O behind a small trait rather than calling `std::fs` directly
//! from business logic, so the loader's traversal and cycle-detection
//! logic can be exercised against an in-memory fixture in tests without
//! touching disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Reads the content of local HQL/JS files referenced by `import` forms.
/// Remote fetching is a separate concern, see `module::remote::RemoteSource`.
pub trait SourceProvider: Send + Sync {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;

    /// Canonicalizes a path for use as a module-graph key: the graph is an
    /// append-only map keyed by canonical absolute path. The default
    /// forwards to `std::fs::canonicalize`; the in-memory test double
    /// overrides it since there is no real filesystem to consult.
    fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }
}

/// The production provider: reads real files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceProvider;

impl SourceProvider for FsSourceProvider {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// An in-memory provider for tests: a fixed map of normalized path to
/// content, plus a log of paths actually read (useful for asserting that
/// the loader doesn't revisit files it has already finished processing).
#[derive(Debug, Default)]
pub struct MemorySourceProvider {
    files: HashMap<PathBuf, String>,
    reads: Mutex<Vec<PathBuf>>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(normalize(&path.into()), content.into());
        self
    }

    pub fn read_log(&self) -> Vec<PathBuf> {
        self.reads.lock().expect("read log mutex poisoned").clone()
    }
}

fn normalize(path: &Path) -> PathBuf {
    // No real filesystem backs this provider, so "canonicalization" is
    // just path-component normalization (collapsing `./`), not symlink
    // resolution.
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl SourceProvider for MemorySourceProvider {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        let key = normalize(path);
        self.reads.lock().expect("read log mutex poisoned").push(key.clone());
        self.files.get(&key).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no fixture registered for {}", key.display()),
            )
        })
    }

    fn canonicalize(&self, path: &Path) -> std::io::Result<PathBuf> {
        Ok(normalize(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_serves_registered_files() {
        let provider = MemorySourceProvider::new().with_file("/a.hql", "(+ 1 2)");
        let content = provider.read_to_string(Path::new("/a.hql")).unwrap();
        assert_eq!(content, "(+ 1 2)");
    }

    #[test]
    fn memory_provider_tracks_reads() {
        let provider = MemorySourceProvider::new().with_file("/a.hql", "()");
        provider.read_to_string(Path::new("/a.hql")).unwrap();
        provider.read_to_string(Path::new("/a.hql")).unwrap();
        assert_eq!(provider.read_log().len(), 2);
    }
}
