//! Random-access byte sources.
//!
//! Everything above this layer reads through [`ByteSource`]: physical files,
//! in-memory buffers, the decompressed address space of a bundle, and
//! bounded [`Region`] views over any of those.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::Mutex;

use crate::util::{Error, Result};

/// Positioned reads over an immutable byte range.
///
/// Implementations hold no shared cursor: every call states its own
/// position, so independent readers never interfere.
pub trait ByteSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    /// Fill `buf` with the bytes starting at `pos`.
    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read `len` bytes at `pos` into a new buffer.
    fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        check_range(pos, len as u64, self.len())?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }
}

/// Fail with `UnexpectedEof` unless `pos..pos + len` lies within `size`.
#[inline]
pub fn check_range(pos: u64, len: u64, size: u64) -> Result<()> {
    match pos.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        Some(end) => Err(Error::UnexpectedEof(end)),
        None => Err(Error::UnexpectedEof(u64::MAX)),
    }
}

/// Physical or in-memory container bytes.
/// Supports memory-mapped, buffered file, and owned-buffer backends.
pub struct FileSource {
    inner: SourceInner,
    size: u64,
}

enum SourceInner {
    /// Memory-mapped file (preferred for large files)
    Mmap(Mmap),
    /// Buffered file access (fallback)
    File(Mutex<File>),
    /// Bytes already in memory
    Memory(Arc<[u8]>),
}

impl FileSource {
    /// Open a file for reading with memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, true)
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();

        let inner = if cfg!(feature = "mmap") && use_mmap && size > 0 {
            // Safety: the file is opened read-only and never written through this map
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            SourceInner::Mmap(mmap)
        } else {
            SourceInner::File(Mutex::new(file))
        };

        Ok(Self { inner, size })
    }

    /// Wrap bytes that are already in memory.
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self { inner: SourceInner::Memory(data), size }
    }

    /// True when reads are served from a memory map.
    #[inline]
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, SourceInner::Mmap(_))
    }
}

impl ByteSource for FileSource {
    #[inline]
    fn len(&self) -> u64 {
        self.size
    }

    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len() as u64, self.size)?;
        let start = pos as usize;

        match &self.inner {
            SourceInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[start..start + buf.len()]);
                Ok(())
            }
            SourceInner::Memory(data) => {
                buf.copy_from_slice(&data[start..start + buf.len()]);
                Ok(())
            }
            SourceInner::File(file) => {
                let mut f = file.lock();
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
                Ok(())
            }
        }
    }
}

/// Bounded view over part of another source.
///
/// Positions passed to a region are relative to its base; reads that
/// would leave the region fail even if the parent has more bytes.
#[derive(Clone)]
pub struct Region {
    parent: Arc<dyn ByteSource>,
    base: u64,
    len: u64,
}

impl Region {
    /// View `len` bytes of `parent` starting at `base`.
    pub fn new(parent: Arc<dyn ByteSource>, base: u64, len: u64) -> Result<Self> {
        check_range(base, len, parent.len())?;
        Ok(Self { parent, base, len })
    }

    /// View the whole of `parent`.
    pub fn whole(parent: Arc<dyn ByteSource>) -> Self {
        let len = parent.len();
        Self { parent, base: 0, len }
    }

    /// Narrow this view further.
    pub fn sub(&self, offset: u64, len: u64) -> Result<Self> {
        check_range(offset, len, self.len)?;
        Ok(Self { parent: Arc::clone(&self.parent), base: self.base + offset, len })
    }

    /// Offset of this view within its parent.
    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Read the entire view.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let len = usize::try_from(self.len).map_err(|_| Error::UnexpectedEof(self.len))?;
        self.read_bytes(0, len)
    }
}

impl ByteSource for Region {
    #[inline]
    fn len(&self) -> u64 {
        self.len
    }

    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len() as u64, self.len)?;
        self.parent.read_into(self.base + pos, buf)
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region").field("base", &self.base).field("len", &self.len).finish()
    }
}
