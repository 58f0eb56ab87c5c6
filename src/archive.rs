//! Opening containers and reading their assets.
//!
//! ## Example
//!
//! ```ignore
//! use unityfs::Archive;
//!
//! let archive = Archive::open("characters.bundle")?;
//! for entry in archive.entries() {
//!     let bytes = archive.read(entry)?;
//!     println!("{} ({}): {} bytes", entry.name, entry.category, bytes.len());
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;

use crate::bundle::BundleFile;
use crate::catalog::{locate, raw_entry, AssetEntry, CatalogBuilder, DirectoryLocator, PayloadSource, ResourceLocator};
use crate::core::{ByteSource, FileSource, Region, DEFAULT_CACHE_BYTES};
use crate::decode::{decode_object, StreamingPointer, Value};
use crate::serialized::{CommonStrings, SerializedFile};
use crate::util::{EngineVersion, Error, Result};

// ============================================================================
// Options
// ============================================================================

/// Settings for opening an archive.
#[derive(Clone, Debug)]
pub struct OpenOptions {
    /// Memory-map physical files instead of reading through a locked handle.
    pub use_mmap: bool,
    /// Upper bound for decompressed segments kept in memory.
    pub segment_cache_bytes: usize,
    /// Prefix for names synthesized from object identities.
    pub label: Option<String>,
    /// String pool for blob-encoded schemas.
    pub common_strings: &'static CommonStrings,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            use_mmap: true,
            segment_cache_bytes: DEFAULT_CACHE_BYTES,
            label: None,
            common_strings: CommonStrings::builtin(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn segment_cache_bytes(mut self, bytes: usize) -> Self {
        self.segment_cache_bytes = bytes;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn common_strings(mut self, strings: &'static CommonStrings) -> Self {
        self.common_strings = strings;
        self
    }
}

// ============================================================================
// Archive
// ============================================================================

/// An opened container with its asset catalog.
///
/// The catalog is built when the archive opens and never changes; payload
/// bytes are read on demand, each read with its own cursor.
pub struct Archive {
    bundle: Option<Arc<BundleFile>>,
    files: Vec<SerializedFile>,
    entries: Vec<AssetEntry>,
    locator: Arc<dyn ResourceLocator>,
}

impl Archive {
    /// Open a bundle or standalone serialized file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open a file, resolving streamed payloads against its directory.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let _span = tracing::debug_span!("open", path = %path.display()).entered();

        let source: Arc<dyn ByteSource> = Arc::new(FileSource::open_opts(path, options.use_mmap)?);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let locator = Arc::new(DirectoryLocator::new(dir).with_mmap(options.use_mmap));
        Self::from_source(source, locator, options)
    }

    /// Open container bytes from any source.
    ///
    /// UnityFS bundles are tried first, then standalone serialized files;
    /// anything else is [`Error::FormatMismatch`].
    pub fn from_source(
        source: Arc<dyn ByteSource>,
        locator: Arc<dyn ResourceLocator>,
        options: &OpenOptions,
    ) -> Result<Self> {
        if BundleFile::probe(source.as_ref()) {
            let bundle = Arc::new(BundleFile::open(source, options.segment_cache_bytes)?);
            return Self::from_bundle(bundle, locator, options);
        }
        if SerializedFile::probe(source.as_ref()) {
            let file = SerializedFile::load(Region::whole(source), options.common_strings)?;
            let entries = CatalogBuilder::new(None, options.label.as_deref()).file_entries(0, &file);
            tracing::debug!(entries = entries.len(), "opened serialized file");
            return Ok(Self { bundle: None, files: vec![file], entries, locator });
        }
        Err(Error::mismatch("neither a UnityFS bundle nor a serialized file"))
    }

    fn from_bundle(bundle: Arc<BundleFile>, locator: Arc<dyn ResourceLocator>, options: &OpenOptions) -> Result<Self> {
        let _span = tracing::debug_span!("catalog", entries = bundle.entries().len()).entered();
        let mut files = Vec::new();
        let mut entries = Vec::new();
        {
            let builder = CatalogBuilder::new(Some(&*bundle), options.label.as_deref());
            for (index, entry) in bundle.entries().iter().enumerate() {
                if entry.is_resource_blob() {
                    entries.push(raw_entry(index, entry));
                    continue;
                }
                let region = bundle.entry_region(index)?;
                if !SerializedFile::probe(&region) {
                    tracing::warn!(name = %entry.name, "entry is not a serialized file, listing it raw");
                    entries.push(raw_entry(index, entry));
                    continue;
                }
                let file = SerializedFile::load(region, options.common_strings)?;
                entries.extend(builder.file_entries(files.len(), &file));
                files.push(file);
            }
        }
        tracing::debug!(files = files.len(), entries = entries.len(), "opened bundle");
        Ok(Self { bundle: Some(bundle), files, entries, locator })
    }

    /// Catalog entries in container order.
    #[inline]
    pub fn entries(&self) -> &[AssetEntry] {
        &self.entries
    }

    /// Serialized files that loaded, indexed by [`AssetEntry::file`].
    #[inline]
    pub fn files(&self) -> &[SerializedFile] {
        &self.files
    }

    /// The container, when the archive is a bundle.
    #[inline]
    pub fn bundle(&self) -> Option<&Arc<BundleFile>> {
        self.bundle.as_ref()
    }

    /// Read an entry's payload, applying its transform.
    pub fn read(&self, entry: &AssetEntry) -> Result<Vec<u8>> {
        let mut data = match &entry.source {
            PayloadSource::Inline { offset, size } => self.file_of(entry)?.region().read_bytes(*offset, to_len(*size)?)?,
            PayloadSource::ContainerEntry { entry: index, offset, size } => {
                let bundle = self
                    .bundle
                    .as_ref()
                    .ok_or_else(|| Error::invalid("container entry payload without a bundle"))?;
                bundle.entry_region(*index)?.read_bytes(*offset, to_len(*size)?)?
            }
            PayloadSource::External { pointer, fallback } => self.read_external(entry, pointer, *fallback)?,
        };
        entry.transform.apply(&mut data);
        Ok(data)
    }

    /// Read several entries in parallel. Results keep the input order.
    pub fn read_many(&self, entries: &[&AssetEntry]) -> Vec<Result<Vec<u8>>> {
        entries.par_iter().map(|entry| self.read(entry)).collect()
    }

    /// Decode an entry's object with its stored schema.
    pub fn decode(&self, entry: &AssetEntry) -> Result<Value> {
        let object = entry
            .object
            .ok_or_else(|| Error::invalid(format!("'{}' is not an object", entry.name)))?;
        let file = self.file_of(entry)?;
        let schema = file.schema(object.type_id).ok_or(Error::UnsupportedSchema {
            path_id: object.path_id,
            type_id: object.type_id,
        })?;
        let data = file.read_object(&object)?;
        decode_object(schema, &data, file.endian(), self.engine_of(file))
    }

    fn file_of(&self, entry: &AssetEntry) -> Result<&SerializedFile> {
        entry
            .file
            .and_then(|i| self.files.get(i))
            .ok_or_else(|| Error::invalid(format!("'{}' has no serialized file", entry.name)))
    }

    fn engine_of(&self, file: &SerializedFile) -> Option<EngineVersion> {
        file.engine().or_else(|| self.bundle.as_ref().and_then(|b| b.header().engine()))
    }

    fn read_external(
        &self,
        entry: &AssetEntry,
        pointer: &StreamingPointer,
        fallback: Option<(u64, u64)>,
    ) -> Result<Vec<u8>> {
        if let Some(source) = locate(self.locator.as_ref(), &pointer.path) {
            return source.read_bytes(pointer.offset, to_len(pointer.size)?);
        }
        match fallback {
            Some((offset, size)) => {
                tracing::warn!(name = %entry.name, path = %pointer.path, "external resource missing, using inline data");
                self.file_of(entry)?.region().read_bytes(offset, to_len(size)?)
            }
            None => Err(Error::MissingResource(pointer.path.clone())),
        }
    }
}

fn to_len(size: u64) -> Result<usize> {
    usize::try_from(size).map_err(|_| Error::UnexpectedEof(size))
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("bundle", &self.bundle.as_ref().map(|b| b.header().clone()))
            .field("files", &self.files.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}
