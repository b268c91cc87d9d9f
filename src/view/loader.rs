//! Template sources.
//!
//! Views read their bodies through a [`TemplateLoader`] so that the same view
//! code runs against the filesystem in production and against an in-memory map
//! in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Reads template bodies by resolved path.
///
/// A loader must report a missing template as [`io::ErrorKind::NotFound`];
/// views turn that into [`Error::ViewFileNotFound`](crate::Error::ViewFileNotFound).
pub trait TemplateLoader: Send + Sync {
    fn load(&self, path: &Path) -> io::Result<String>;
}

/// Loads templates from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemLoader;

impl TemplateLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        if !path.is_file() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not a file"));
        }
        std::fs::read_to_string(path)
    }
}

/// Serves templates from memory.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use fasttrack::view::{MemoryLoader, TemplateLoader};
///
/// let loader = MemoryLoader::new().with("views/home.html", "<h1>Home</h1>");
/// assert_eq!(loader.load(Path::new("views/home.html")).unwrap(), "<h1>Home</h1>");
/// assert!(loader.load(Path::new("views/other.html")).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `source` under `path`, replacing any earlier template
    pub fn insert(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.templates.insert(path.into(), source.into());
    }

    #[must_use]
    pub fn with(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

impl TemplateLoader for MemoryLoader {
    fn load(&self, path: &Path) -> io::Result<String> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such template"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_loader_reads_and_reports_missing_files() {
        let dir = std::env::temp_dir().join(format!("fasttrack-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("page.html");
        std::fs::write(&file, "hello").unwrap();

        assert_eq!(FileSystemLoader.load(&file).unwrap(), "hello");
        let missing = FileSystemLoader.load(&dir.join("nope.html")).unwrap_err();
        assert_eq!(missing.kind(), io::ErrorKind::NotFound);
        // A directory is not a template.
        assert_eq!(FileSystemLoader.load(&dir).unwrap_err().kind(), io::ErrorKind::NotFound);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
