//! UnityFS container reader.
//!
//! A container is a header, a compressed block index and a run of
//! independently compressed segments. The segments tile one virtual
//! address space; named entries (serialized files and resource blobs)
//! are byte ranges inside it.

use std::sync::Arc;

use super::format::*;
use crate::core::{check_range, decompress, ByteSource, Compression, Region, SegmentCache};
use crate::util::{Endian, EndianReader, EngineVersion, Error, Result};

/// Bytes read up front for the header; both version strings fit easily.
const HEADER_PROBE_SIZE: usize = 512;

/// Parsed container header.
#[derive(Clone, Debug)]
pub struct BundleHeader {
    /// Container format version (6..=8).
    pub version: u32,
    /// Player version string, e.g. `5.x.x`.
    pub player_version: String,
    /// Engine revision string, e.g. `2019.4.1f1`.
    pub engine_version: String,
    /// Declared total file size.
    pub file_size: u64,
    /// Compressed size of the block index.
    pub packed_index_size: u32,
    /// Decompressed size of the block index.
    pub index_size: u32,
    /// Raw flags word.
    pub flags: u32,
    /// Physical offset of the block index.
    pub index_offset: u64,
    /// Physical offset of the first segment.
    pub data_offset: u64,
}

impl BundleHeader {
    /// Parsed engine revision, `None` when the string is not a version.
    pub fn engine(&self) -> Option<EngineVersion> {
        EngineVersion::parse(&self.engine_version)
    }
}

/// One compressed block of the virtual address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Start of this segment in the virtual address space.
    pub virtual_start: u64,
    /// Declared decompressed size.
    pub unpacked_size: u32,
    /// Physical offset of the packed bytes.
    pub packed_offset: u64,
    /// Size of the packed bytes.
    pub packed_size: u32,
    pub compression: Compression,
}

impl Segment {
    /// End of this segment in the virtual address space (exclusive).
    #[inline]
    pub fn virtual_end(&self) -> u64 {
        self.virtual_start + self.unpacked_size as u64
    }
}

/// Named byte range inside the virtual address space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerEntry {
    pub offset: u64,
    pub size: u64,
    pub flags: u32,
    pub name: String,
}

impl ContainerEntry {
    /// Final path component of the entry name.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// Streamed payload files by naming convention.
    pub fn is_resource_blob(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        lower.ends_with(".ress") || lower.ends_with(".resource")
    }
}

/// Final component of a `/` or `\` separated path.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Open UnityFS container exposing its virtual address space.
pub struct BundleFile {
    source: Arc<dyn ByteSource>,
    header: BundleHeader,
    segments: Vec<Segment>,
    entries: Vec<ContainerEntry>,
    total_size: u64,
    cache: SegmentCache,
}

impl BundleFile {
    /// Check the magic without parsing anything else.
    pub fn probe(source: &dyn ByteSource) -> bool {
        let mut magic = [0u8; 8];
        source.read_into(0, &mut magic).is_ok() && &magic == UNITYFS_MAGIC
    }

    /// Parse the header and block index of a container.
    ///
    /// Header problems are reported as [`Error::FormatMismatch`] so callers
    /// can try another decoder; a malformed index is [`Error::CorruptIndex`].
    pub fn open(source: Arc<dyn ByteSource>, cache_bytes: usize) -> Result<Self> {
        let header = read_header(source.as_ref())?;
        tracing::debug!(
            version = header.version,
            engine = %header.engine_version,
            flags = header.flags,
            "UnityFS header"
        );

        let index = read_index_bytes(source.as_ref(), &header)?;
        let (segments, entries) = parse_index(&index, &header).map_err(as_corrupt)?;
        let total_size = segments.last().map_or(0, |s| s.virtual_end());

        for entry in &entries {
            if entry.offset.checked_add(entry.size).map_or(true, |end| end > total_size) {
                return Err(Error::corrupt(format!(
                    "entry '{}' ({} + {}) exceeds virtual size {}",
                    entry.name, entry.offset, entry.size, total_size
                )));
            }
        }

        tracing::debug!(segments = segments.len(), entries = entries.len(), total_size, "block index");

        Ok(Self {
            source,
            header,
            segments,
            entries,
            total_size,
            cache: SegmentCache::new(cache_bytes),
        })
    }

    #[inline]
    pub fn header(&self) -> &BundleHeader {
        &self.header
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[inline]
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Total size of the virtual address space.
    #[inline]
    pub fn virtual_size(&self) -> u64 {
        self.total_size
    }

    /// Find an entry by exact name, then by base file name.
    pub fn entry_by_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name).or_else(|| {
            let wanted = base_name(name);
            self.entries.iter().position(|e| e.base_name() == wanted)
        })
    }

    /// Bounded view over one entry.
    pub fn entry_region(self: &Arc<Self>, index: usize) -> Result<Region> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| Error::invalid(format!("entry index {index} out of range")))?;
        let parent: Arc<dyn ByteSource> = Arc::clone(self) as Arc<dyn ByteSource>;
        Region::new(parent, entry.offset, entry.size)
    }

    /// Number of segments currently held decompressed.
    pub fn cached_segments(&self) -> usize {
        self.cache.len()
    }

    /// Index of the segment covering virtual offset `pos`.
    fn segment_index(&self, pos: u64) -> Option<usize> {
        let idx = self.segments.partition_point(|s| s.virtual_end() <= pos);
        (idx < self.segments.len()).then_some(idx)
    }

    /// Decompressed bytes of one segment, through the cache.
    fn segment_data(&self, index: usize) -> Result<Arc<[u8]>> {
        if let Some(data) = self.cache.get(index) {
            return Ok(data);
        }

        let seg = &self.segments[index];
        tracing::trace!(index, method = ?seg.compression, packed = seg.packed_size, "decompress segment");
        let packed = self.source.read_bytes(seg.packed_offset, seg.packed_size as usize)?;
        let data = decompress(seg.compression, &packed, seg.unpacked_size as usize)?;
        Ok(self.cache.insert(index, data))
    }
}

impl ByteSource for BundleFile {
    #[inline]
    fn len(&self) -> u64 {
        self.total_size
    }

    /// Copy virtual bytes, crossing segment boundaries as needed.
    fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        check_range(pos, buf.len() as u64, self.total_size)?;

        let mut cursor = pos;
        let mut filled = 0;
        while filled < buf.len() {
            let index = self.segment_index(cursor).ok_or(Error::UnexpectedEof(cursor))?;
            let seg = self.segments[index];
            let data = self.segment_data(index)?;

            let within = (cursor - seg.virtual_start) as usize;
            let count = (data.len() - within).min(buf.len() - filled);
            buf[filled..filled + count].copy_from_slice(&data[within..within + count]);

            filled += count;
            cursor += count as u64;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BundleFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleFile")
            .field("header", &self.header)
            .field("segments", &self.segments.len())
            .field("entries", &self.entries)
            .finish()
    }
}

// ============================================================================
// Header and index parsing
// ============================================================================

fn read_header(source: &dyn ByteSource) -> Result<BundleHeader> {
    let probe_len = (source.len() as usize).min(HEADER_PROBE_SIZE);
    let probe = source.read_bytes(0, probe_len)?;
    let mut r = EndianReader::new(&probe, Endian::Big);

    let magic: [u8; 8] = r.read_array().map_err(|_| Error::mismatch("file too short"))?;
    if &magic != UNITYFS_MAGIC {
        return Err(Error::mismatch("missing UnityFS magic"));
    }

    let version = r.read_u32().map_err(|_| Error::mismatch("truncated header"))?;
    if !is_supported_version(version) {
        return Err(Error::mismatch(format!("unsupported container version {version}")));
    }

    let player_version = r.read_cstring().map_err(|_| Error::mismatch("bad player version"))?;
    let engine_version = r.read_cstring().map_err(|_| Error::mismatch("bad engine version"))?;

    let mut fields = || -> Result<(i64, u32, u32, u32)> {
        Ok((r.read_i64()?, r.read_u32()?, r.read_u32()?, r.read_u32()?))
    };
    let (file_size, packed_index_size, index_size, flags) =
        fields().map_err(|_| Error::mismatch("truncated header"))?;

    if file_size < 0 || file_size as u64 != source.len() {
        return Err(Error::mismatch(format!(
            "declared size {file_size} does not match actual size {}",
            source.len()
        )));
    }
    let file_size = file_size as u64;

    let mut pos = r.position();
    let engine = EngineVersion::parse(&engine_version);
    if requires_header_alignment(version) {
        pos = align_up(pos, HEADER_ALIGNMENT);
    } else if may_have_header_padding(version, engine) {
        pos = probe_header_padding(source, pos);
    }

    let (index_offset, mut data_offset) = if index_at_end(flags) {
        let index_offset = file_size
            .checked_sub(packed_index_size as u64)
            .ok_or_else(|| Error::mismatch("index larger than file"))?;
        (index_offset, pos)
    } else {
        (pos, pos + packed_index_size as u64)
    };
    if has_block_padding(flags) {
        data_offset = align_up(data_offset, HEADER_ALIGNMENT);
    }

    if index_offset < pos || index_offset + packed_index_size as u64 > file_size {
        return Err(Error::mismatch("block index outside file"));
    }
    if data_offset > file_size {
        return Err(Error::mismatch(format!("data offset {data_offset} past end of file")));
    }

    Ok(BundleHeader {
        version,
        player_version,
        engine_version,
        file_size,
        packed_index_size,
        index_size,
        flags,
        index_offset,
        data_offset,
    })
}

/// Skip header padding only when every padding byte is zero.
///
/// Non-zero bytes are taken to mean there was no padding and the position
/// is rolled back, which misreads padded files with non-zero filler.
fn probe_header_padding(source: &dyn ByteSource, pos: u64) -> u64 {
    let aligned = align_up(pos, HEADER_ALIGNMENT);
    if aligned == pos {
        return pos;
    }
    match source.read_bytes(pos, (aligned - pos) as usize) {
        Ok(padding) if padding.iter().all(|&b| b == 0) => aligned,
        _ => {
            tracing::warn!(pos, "non-zero header padding, assuming none");
            pos
        }
    }
}

fn read_index_bytes(source: &dyn ByteSource, header: &BundleHeader) -> Result<Vec<u8>> {
    let method = Compression::from_flags(header.flags).ok_or_else(|| {
        Error::mismatch(format!("unknown index compression {:#x}", header.flags & 0x3F))
    })?;
    let packed = source.read_bytes(header.index_offset, header.packed_index_size as usize)?;
    decompress(method, &packed, header.index_size as usize).map_err(|e| match e {
        Error::Decompression(msg) => Error::corrupt(format!("block index: {msg}")),
        other => other,
    })
}

fn parse_index(index: &[u8], header: &BundleHeader) -> Result<(Vec<Segment>, Vec<ContainerEntry>)> {
    let mut r = EndianReader::new(index, Endian::Big);
    r.skip(INDEX_HASH_SIZE as u64)?;

    let segment_count = read_count(&mut r, SEGMENT_RECORD_SIZE, "segment")?;
    let mut segments = Vec::with_capacity(segment_count);
    let mut virtual_start = 0u64;
    let mut packed_offset = header.data_offset;
    for _ in 0..segment_count {
        let unpacked_size = r.read_u32()?;
        let packed_size = r.read_u32()?;
        let flags = r.read_u16()? as u32;
        let compression = Compression::from_flags(flags).ok_or_else(|| {
            Error::mismatch(format!("unknown segment compression {:#x}", flags & 0x3F))
        })?;

        segments.push(Segment { virtual_start, unpacked_size, packed_offset, packed_size, compression });
        virtual_start += unpacked_size as u64;
        packed_offset += packed_size as u64;
    }
    if packed_offset > header.file_size {
        return Err(Error::corrupt(format!(
            "segments end at {packed_offset}, past file size {}",
            header.file_size
        )));
    }

    let entry_count = read_count(&mut r, ENTRY_RECORD_MIN_SIZE, "entry")?;
    let mut entries = Vec::with_capacity(entry_count);
    for _ in 0..entry_count {
        let offset = r.read_i64()?;
        let size = r.read_i64()?;
        let flags = r.read_u32()?;
        let name = r.read_cstring()?;
        if offset < 0 || size < 0 {
            return Err(Error::corrupt(format!("entry '{name}' has negative range")));
        }
        entries.push(ContainerEntry { offset: offset as u64, size: size as u64, flags, name });
    }

    Ok((segments, entries))
}

/// Read a record count and reject counts the remaining bytes cannot hold.
fn read_count(r: &mut EndianReader<'_>, record_size: usize, what: &str) -> Result<usize> {
    let count = r.read_i32()?;
    if count < 0 || count as u64 * record_size as u64 > r.remaining() {
        return Err(Error::corrupt(format!("absurd {what} count {count}")));
    }
    Ok(count as usize)
}

/// Index parsing failures other than format mismatches are index corruption.
fn as_corrupt(e: Error) -> Error {
    match e {
        Error::UnexpectedEof(pos) => Error::corrupt(format!("block index truncated at {pos}")),
        Error::Utf8(e) => Error::corrupt(format!("entry name: {e}")),
        other => other,
    }
}
