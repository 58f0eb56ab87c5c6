//! Serialized file: header, type list and object table.

use std::collections::HashMap;

use super::common_strings::CommonStrings;
use super::format::*;
use super::object::{ExternalFile, ObjectDescriptor, SerializedType};
use super::type_tree::{read_type_tree, TypeNode};
use crate::core::{ByteSource, Region};
use crate::util::{Endian, EndianReader, EngineVersion, Error, Result};

/// Alignment of object table entries.
const TABLE_ALIGNMENT: u64 = 4;

/// Smallest object table record: 32-bit id, offset, size, type id.
const MIN_OBJECT_RECORD: u64 = 4 * 4;

/// Smallest serialized type record: class id plus nothing else.
const MIN_TYPE_RECORD: u64 = 4;

/// Parsed serialized file header. The header itself is always big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializedHeader {
    pub metadata_size: u64,
    pub file_size: u64,
    pub format: u32,
    pub data_offset: u64,
    /// Byte order of metadata and object data.
    pub endian: Endian,
}

impl SerializedHeader {
    /// Parse and sanity-check the header of `source`.
    ///
    /// Any failure is [`Error::FormatMismatch`]: the bytes are not a
    /// serialized file this reader understands.
    pub fn read(source: &dyn ByteSource) -> Result<Self> {
        let len = source.len();
        if len < BASE_HEADER_SIZE {
            return Err(Error::mismatch("too short for a serialized file"));
        }
        let probe = source.read_bytes(0, len.min(header_size(MAX_FORMAT)) as usize)?;
        let mut r = EndianReader::new(&probe, Endian::Big);
        let truncated = |_| Error::mismatch("truncated serialized header");

        let mut metadata_size = r.read_u32().map_err(truncated)? as u64;
        let mut file_size = r.read_u32().map_err(truncated)? as u64;
        let format = r.read_u32().map_err(truncated)?;
        let mut data_offset = r.read_u32().map_err(truncated)? as u64;

        if !is_supported_format(format) {
            return Err(Error::mismatch(format!("unsupported serialized format {format}")));
        }

        let mut endian = Endian::Big;
        if has_explicit_endianness(format) {
            endian = Endian::from_flag(r.read_u8().map_err(truncated)?);
            r.skip(3).map_err(truncated)?;
        }
        if has_large_header(format) {
            metadata_size = r.read_u32().map_err(truncated)? as u64;
            file_size = non_negative(r.read_i64().map_err(truncated)?)?;
            data_offset = non_negative(r.read_i64().map_err(truncated)?)?;
            r.skip(8).map_err(truncated)?;
        }

        let head = header_size(format);
        if file_size != len {
            return Err(Error::mismatch(format!("declared size {file_size}, actual {len}")));
        }
        if head > file_size || metadata_size > file_size - head {
            return Err(Error::mismatch("metadata does not fit the file"));
        }
        if data_offset < head || data_offset > file_size {
            return Err(Error::mismatch(format!("data offset {data_offset} outside file")));
        }

        if !has_explicit_endianness(format) {
            // Metadata sits at the end of the file and opens with the byte order
            if metadata_size == 0 {
                return Err(Error::mismatch("empty metadata"));
            }
            let mut flag = [0u8; 1];
            source.read_into(file_size - metadata_size, &mut flag)?;
            endian = Endian::from_flag(flag[0]);
        }

        Ok(Self { metadata_size, file_size, format, data_offset, endian })
    }

    /// Byte range of the metadata block, past any leading byte-order flag.
    pub fn metadata_range(&self) -> (u64, u64) {
        if has_explicit_endianness(self.format) {
            let start = header_size(self.format);
            (start, self.metadata_size.min(self.file_size - start))
        } else {
            (self.file_size - self.metadata_size + 1, self.metadata_size - 1)
        }
    }
}

fn non_negative(v: i64) -> Result<u64> {
    u64::try_from(v).map_err(|_| Error::mismatch(format!("negative header field {v}")))
}

/// One self-describing object database.
///
/// Immutable after [`SerializedFile::load`]; object bytes are read on demand
/// through the file's [`Region`].
pub struct SerializedFile {
    region: Region,
    header: SerializedHeader,
    engine_version: String,
    target_platform: Option<i32>,
    has_type_trees: bool,
    big_id: bool,
    types: Vec<SerializedType>,
    /// Schema key (type id) to index into `types`.
    type_index: HashMap<i32, usize>,
    objects: Vec<ObjectDescriptor>,
    /// Path id to index into `objects`.
    by_path_id: HashMap<i64, usize>,
    externals: Vec<ExternalFile>,
    ref_types: Vec<SerializedType>,
    user_info: String,
}

impl SerializedFile {
    /// Check whether `source` starts with a plausible serialized header.
    pub fn probe(source: &dyn ByteSource) -> bool {
        SerializedHeader::read(source).is_ok()
    }

    /// Parse the header, type list and object table.
    ///
    /// Header failures are [`Error::FormatMismatch`]; anything wrong inside
    /// the metadata, including duplicate identities, is [`Error::CorruptIndex`].
    pub fn load(region: Region, strings: &CommonStrings) -> Result<Self> {
        let header = SerializedHeader::read(&region)?;
        let (meta_start, meta_len) = header.metadata_range();
        let metadata = region.read_bytes(meta_start, meta_len as usize)?;

        let mut r = EndianReader::new(&metadata, header.endian);
        let file = parse_metadata(&mut r, region.clone(), header, meta_start, strings).map_err(|e| match e {
            Error::UnexpectedEof(pos) => Error::corrupt(format!("metadata truncated at {}", meta_start + pos)),
            Error::Utf8(e) => Error::corrupt(format!("metadata string: {e}")),
            Error::InvalidStructure(msg) => Error::corrupt(msg),
            other => other,
        })?;

        tracing::debug!(
            format = header.format,
            engine = %file.engine_version,
            types = file.types.len(),
            objects = file.objects.len(),
            "serialized file"
        );
        Ok(file)
    }

    #[inline]
    pub fn header(&self) -> &SerializedHeader {
        &self.header
    }

    #[inline]
    pub fn format(&self) -> u32 {
        self.header.format
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.header.endian
    }

    /// Engine version string from the metadata, empty before format 7.
    #[inline]
    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    /// Parsed engine version, `None` when absent or a stripped placeholder.
    pub fn engine(&self) -> Option<EngineVersion> {
        EngineVersion::parse(&self.engine_version).filter(|v| !v.is_unknown())
    }

    #[inline]
    pub fn target_platform(&self) -> Option<i32> {
        self.target_platform
    }

    #[inline]
    pub fn has_type_trees(&self) -> bool {
        self.has_type_trees
    }

    /// True when object identities are stored as 64-bit values.
    #[inline]
    pub fn big_id(&self) -> bool {
        self.big_id
    }

    #[inline]
    pub fn types(&self) -> &[SerializedType] {
        &self.types
    }

    /// Objects in table order.
    #[inline]
    pub fn objects(&self) -> &[ObjectDescriptor] {
        &self.objects
    }

    #[inline]
    pub fn externals(&self) -> &[ExternalFile] {
        &self.externals
    }

    /// Types of managed references, format 20 and later.
    #[inline]
    pub fn ref_types(&self) -> &[SerializedType] {
        &self.ref_types
    }

    /// Free-form user information string, empty when absent.
    #[inline]
    pub fn user_info(&self) -> &str {
        &self.user_info
    }

    /// The byte range this file was loaded from.
    #[inline]
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Look up an object by identity.
    pub fn object(&self, path_id: i64) -> Option<&ObjectDescriptor> {
        self.by_path_id.get(&path_id).map(|&i| &self.objects[i])
    }

    /// Serialized type an object's type id refers to.
    pub fn serialized_type(&self, type_id: i32) -> Option<&SerializedType> {
        self.type_index.get(&type_id).map(|&i| &self.types[i])
    }

    /// Schema for a type id, if the file carries one.
    pub fn schema(&self, type_id: i32) -> Option<&TypeNode> {
        self.serialized_type(type_id).and_then(|t| t.tree.as_ref())
    }

    /// View over one object's bytes.
    pub fn object_region(&self, object: &ObjectDescriptor) -> Result<Region> {
        self.region.sub(object.offset, object.size as u64)
    }

    /// Read one object's bytes.
    pub fn read_object(&self, object: &ObjectDescriptor) -> Result<Vec<u8>> {
        self.region.read_bytes(object.offset, object.size as usize)
    }
}

impl std::fmt::Debug for SerializedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializedFile")
            .field("header", &self.header)
            .field("engine_version", &self.engine_version)
            .field("types", &self.types.len())
            .field("objects", &self.objects.len())
            .finish()
    }
}

// ============================================================================
// Metadata parsing
// ============================================================================

fn parse_metadata(
    r: &mut EndianReader<'_>,
    region: Region,
    header: SerializedHeader,
    base: u64,
    strings: &CommonStrings,
) -> Result<SerializedFile> {
    let format = header.format;

    let engine_version = if has_engine_version(format) { r.read_cstring()? } else { String::new() };
    let target_platform = if has_target_platform(format) { Some(r.read_i32()?) } else { None };
    let has_type_trees = if has_type_tree_flag(format) { r.read_bool()? } else { true };

    let type_count = read_count(r, MIN_TYPE_RECORD, "type")?;
    let mut types = Vec::with_capacity(type_count);
    for _ in 0..type_count {
        types.push(read_serialized_type(r, format, has_type_trees, false, strings)?);
    }

    let mut type_index = HashMap::with_capacity(types.len());
    for (i, t) in types.iter().enumerate() {
        let key = if class_id_is_indirect(format) { i as i32 } else { t.class_id };
        type_index.entry(key).or_insert(i);
    }

    let big_id_flag = if has_big_id_flag(format) { Some(r.read_i32()? != 0) } else { None };
    let big_id = uses_big_id(format, big_id_flag);

    let object_count = read_count(r, MIN_OBJECT_RECORD, "object")?;
    let mut objects = Vec::with_capacity(object_count);
    let mut by_path_id = HashMap::with_capacity(object_count);
    for _ in 0..object_count {
        if aligns_object_table(format) {
            align_absolute(r, base, TABLE_ALIGNMENT)?;
        }
        let object = read_object(r, header, big_id, &types)?;

        if object.end() > header.file_size {
            return Err(Error::corrupt(format!(
                "object {} ({} + {}) exceeds file size {}",
                object.path_id, object.offset, object.size, header.file_size
            )));
        }
        if by_path_id.insert(object.path_id, objects.len()).is_some() {
            return Err(Error::corrupt(format!("duplicate object identity {}", object.path_id)));
        }
        objects.push(object);
    }

    // Trailing tables are informational; a damaged tail does not cost the catalog
    let tail = match read_trailing_tables(r, format, base, has_type_trees, strings) {
        Ok(tail) => tail,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable tables after object list");
            TrailingTables::default()
        }
    };

    Ok(SerializedFile {
        region,
        header,
        engine_version,
        target_platform,
        has_type_trees,
        big_id,
        types,
        type_index,
        objects,
        by_path_id,
        externals: tail.externals,
        ref_types: tail.ref_types,
        user_info: tail.user_info,
    })
}

fn read_serialized_type(
    r: &mut EndianReader<'_>,
    format: u32,
    has_tree: bool,
    is_ref_type: bool,
    strings: &CommonStrings,
) -> Result<SerializedType> {
    let class_id = r.read_i32()?;
    let is_stripped = if has_stripped_type(format) { r.read_bool()? } else { false };
    let script_type_index = if has_type_script_index(format) { r.read_i16()? } else { -1 };

    let mut script_id = None;
    let mut type_hash = None;
    if has_type_hashes(format) {
        if has_script_id(format, class_id, is_ref_type, script_type_index) {
            script_id = Some(r.read_array::<16>()?);
        }
        type_hash = Some(r.read_array::<16>()?);
    }

    let mut tree = None;
    if has_tree {
        tree = read_type_tree(r, format, strings)?;
        if has_type_dependencies(format) {
            if is_ref_type {
                // class name, namespace, assembly
                for _ in 0..3 {
                    r.read_cstring()?;
                }
            } else {
                let deps = read_count(r, 4, "type dependency")?;
                r.skip(deps as u64 * 4)?;
            }
        }
    }

    Ok(SerializedType { class_id, is_stripped, script_type_index, script_id, type_hash, tree })
}

fn read_object(
    r: &mut EndianReader<'_>,
    header: SerializedHeader,
    big_id: bool,
    types: &[SerializedType],
) -> Result<ObjectDescriptor> {
    let format = header.format;

    let path_id = if big_id { r.read_i64()? } else { r.read_i32()? as i64 };
    let raw_offset = if offset_width(format) == 8 {
        u64::try_from(r.read_i64()?).map_err(|_| Error::corrupt("negative object offset"))?
    } else {
        r.read_u32()? as u64
    };
    let offset = raw_offset
        .checked_add(header.data_offset)
        .ok_or_else(|| Error::corrupt("object offset overflows"))?;
    let size = r.read_u32()?;

    let (type_id, class_id) = if class_id_is_indirect(format) {
        let type_index = r.read_i32()?;
        let class_id = usize::try_from(type_index)
            .ok()
            .and_then(|i| types.get(i))
            .map(|t| t.class_id)
            .ok_or_else(|| Error::corrupt(format!("object {path_id} has type index {type_index}")))?;
        (type_index, class_id)
    } else {
        let type_id = r.read_i32()?;
        (type_id, r.read_i16()? as i32)
    };

    if has_destroyed_flag(format) {
        r.read_u16()?;
    }
    if has_script_type_index(format) {
        r.read_i16()?;
    }
    if has_stripped_byte(format) {
        r.read_u8()?;
    }

    Ok(ObjectDescriptor { path_id, offset, size, type_id, class_id })
}

/// Tables following the object list.
#[derive(Default)]
struct TrailingTables {
    externals: Vec<ExternalFile>,
    ref_types: Vec<SerializedType>,
    user_info: String,
}

/// Script types, externals, reference types and user info.
///
/// Reference types carry schemas only when the file has type trees.
fn read_trailing_tables(
    r: &mut EndianReader<'_>,
    format: u32,
    base: u64,
    has_type_trees: bool,
    strings: &CommonStrings,
) -> Result<TrailingTables> {
    if has_script_types(format) {
        let count = read_count(r, 8, "script type")?;
        for _ in 0..count {
            r.read_i32()?;
            if format < 14 {
                r.read_i32()?;
            } else {
                align_absolute(r, base, TABLE_ALIGNMENT)?;
                r.read_i64()?;
            }
        }
    }

    let mut externals = Vec::new();
    if has_externals(format) {
        let count = read_count(r, 2 + 16 + 4, "external")?;
        for _ in 0..count {
            let asset_path = r.read_cstring()?;
            let guid = r.read_array::<16>()?;
            let kind = r.read_i32()?;
            let path = r.read_cstring()?;
            externals.push(ExternalFile { asset_path, guid, kind, path });
        }
    }

    let mut ref_types = Vec::new();
    if has_ref_types(format) {
        let count = read_count(r, MIN_TYPE_RECORD, "reference type")?;
        for _ in 0..count {
            ref_types.push(read_serialized_type(r, format, has_type_trees, true, strings)?);
        }
    }

    let user_info = if has_user_info(format) { r.read_cstring()? } else { String::new() };
    Ok(TrailingTables { externals, ref_types, user_info })
}

/// Align relative to the start of the file rather than the metadata slice.
fn align_absolute(r: &mut EndianReader<'_>, base: u64, alignment: u64) -> Result<()> {
    let abs = base + r.position();
    let pad = (alignment - abs % alignment) % alignment;
    r.skip(pad)
}

fn read_count(r: &mut EndianReader<'_>, min_record: u64, what: &str) -> Result<usize> {
    let count = r.read_i32()?;
    if count < 0 || count as u64 * min_record > r.remaining() {
        return Err(Error::corrupt(format!("absurd {what} count {count}")));
    }
    Ok(count as usize)
}
