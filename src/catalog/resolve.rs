//! Locating payloads stored outside the container.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::bundle::base_name;
use crate::core::{ByteSource, FileSource};

/// Scheme prefix engine paths use for files inside a loaded archive.
const ARCHIVE_SCHEME: &str = "archive:/";

/// Where to look relative to the open container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Adjacency {
    /// Same directory as the container.
    Beside,
    /// The directory above it.
    Above,
}

/// Storage adjacency lookup for sibling resource files.
pub trait ResourceLocator: Send + Sync {
    /// Open `name` relative to the container, if it exists.
    fn resolve(&self, name: &str, adjacency: Adjacency) -> Option<Arc<dyn ByteSource>>;
}

/// Strip an `archive:/` prefix from an engine resource path.
pub fn strip_scheme(path: &str) -> &str {
    path.strip_prefix(ARCHIVE_SCHEME).unwrap_or(path)
}

/// Try every candidate for `path` in lookup order: exact name beside the
/// container, base name beside it, then the same two one directory up.
pub fn locate(locator: &dyn ResourceLocator, path: &str) -> Option<Arc<dyn ByteSource>> {
    let name = strip_scheme(path);
    let base = base_name(name);
    for adjacency in [Adjacency::Beside, Adjacency::Above] {
        if let Some(found) = locator.resolve(name, adjacency) {
            tracing::debug!(name, ?adjacency, "resolved external resource");
            return Some(found);
        }
        if base != name {
            if let Some(found) = locator.resolve(base, adjacency) {
                tracing::debug!(name = base, ?adjacency, "resolved external resource by base name");
                return Some(found);
            }
        }
    }
    None
}

// ============================================================================
// Filesystem
// ============================================================================

/// Looks up files relative to a directory on disk.
#[derive(Clone, Debug)]
pub struct DirectoryLocator {
    root: PathBuf,
    use_mmap: bool,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), use_mmap: true }
    }

    /// Choose memory mapping for the files this locator opens.
    pub fn with_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Only plain relative names are looked up.
fn is_contained(name: &Path) -> bool {
    name.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl ResourceLocator for DirectoryLocator {
    fn resolve(&self, name: &str, adjacency: Adjacency) -> Option<Arc<dyn ByteSource>> {
        let relative = Path::new(name);
        if name.is_empty() || !is_contained(relative) {
            tracing::debug!(name, "refusing to resolve a path outside the container directory");
            return None;
        }
        let dir = match adjacency {
            Adjacency::Beside => self.root.as_path(),
            Adjacency::Above => self.root.parent()?,
        };
        let path = dir.join(relative);
        if !path.is_file() {
            return None;
        }
        match FileSource::open_opts(&path, self.use_mmap) {
            Ok(source) => Some(Arc::new(source)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot open resource file");
                None
            }
        }
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory locator keyed by name and adjacency.
#[derive(Clone, Debug, Default)]
pub struct MemoryLocator {
    files: HashMap<(Adjacency, String), Arc<[u8]>>,
}

impl MemoryLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file beside the container.
    pub fn beside(mut self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        self.files.insert((Adjacency::Beside, name.into()), data.into());
        self
    }

    /// Register a file one directory above the container.
    pub fn above(mut self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        self.files.insert((Adjacency::Above, name.into()), data.into());
        self
    }
}

impl ResourceLocator for MemoryLocator {
    fn resolve(&self, name: &str, adjacency: Adjacency) -> Option<Arc<dyn ByteSource>> {
        let data = self.files.get(&(adjacency, name.to_owned()))?;
        Some(Arc::new(FileSource::from_bytes(data.clone())))
    }
}

/// Locator that never finds anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLocator;

impl ResourceLocator for NoLocator {
    fn resolve(&self, _name: &str, _adjacency: Adjacency) -> Option<Arc<dyn ByteSource>> {
        None
    }
}
