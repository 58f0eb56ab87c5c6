//! Serialized file format-version rules.
//!
//! Every layout decision that depends on the format version lives here as
//! a small pure function, so the parsers read as straight-line code and
//! each rule is tested on its own.

/// Oldest serialized format accepted.
pub const MIN_FORMAT: u32 = 1;

/// Newest serialized format accepted.
pub const MAX_FORMAT: u32 = 22;

/// Size of the classic header: metadata size, file size, format, data offset.
pub const BASE_HEADER_SIZE: u64 = 16;

/// Class id of MonoBehaviour, whose types carry a script hash.
pub const MONO_BEHAVIOUR_CLASS: i32 = 114;

/// Type-tree node flag: align the cursor to 4 bytes after this field.
pub const ALIGN_FLAG: i32 = 0x4000;

/// Object data alignment applied after flagged fields.
pub const VALUE_ALIGNMENT: u64 = 4;

#[inline]
pub const fn is_supported_format(format: u32) -> bool {
    format >= MIN_FORMAT && format <= MAX_FORMAT
}

/// Endianness byte and reserved bytes follow the classic header.
#[inline]
pub const fn has_explicit_endianness(format: u32) -> bool {
    format >= 9
}

/// 64-bit sizes and offsets follow the endianness byte.
#[inline]
pub const fn has_large_header(format: u32) -> bool {
    format >= 22
}

/// Size of the header preceding the metadata block.
#[inline]
pub const fn header_size(format: u32) -> u64 {
    if has_large_header(format) {
        // classic fields, endianness + reserved, metadata size, file size,
        // data offset, unknown
        BASE_HEADER_SIZE + 4 + 4 + 8 + 8 + 8
    } else if has_explicit_endianness(format) {
        BASE_HEADER_SIZE + 4
    } else {
        BASE_HEADER_SIZE
    }
}

/// Metadata opens with the engine version string.
#[inline]
pub const fn has_engine_version(format: u32) -> bool {
    format >= 7
}

/// Metadata stores the build target platform.
#[inline]
pub const fn has_target_platform(format: u32) -> bool {
    format >= 8
}

/// Type trees may be omitted, signalled by a flag.
///
/// Before this the tree is always present.
#[inline]
pub const fn has_type_tree_flag(format: u32) -> bool {
    format >= 13
}

/// Serialized types carry a stripped flag.
#[inline]
pub const fn has_stripped_type(format: u32) -> bool {
    format >= 16
}

/// Serialized types carry a script type index.
#[inline]
pub const fn has_type_script_index(format: u32) -> bool {
    format >= 17
}

/// Serialized types carry hashes.
#[inline]
pub const fn has_type_hashes(format: u32) -> bool {
    format >= 13
}

/// Whether a serialized type carries the extra 16-byte script id hash.
#[inline]
pub const fn has_script_id(format: u32, class_id: i32, is_ref_type: bool, script_index: i16) -> bool {
    if !has_type_hashes(format) {
        return false;
    }
    (is_ref_type && script_index >= 0)
        || (format < 16 && class_id < 0)
        || (format >= 16 && class_id == MONO_BEHAVIOUR_CLASS)
}

/// Type trees use the flat node-record blob; version 11 still uses the
/// recursive encoding.
#[inline]
pub const fn uses_blob_schema(format: u32) -> bool {
    format == 10 || format >= 12
}

/// Size of one blob node record.
#[inline]
pub const fn node_record_size(format: u32) -> usize {
    if format >= 19 { 32 } else { 24 }
}

/// Blob records end with a 64-bit reference type hash.
#[inline]
pub const fn has_ref_type_hash(format: u32) -> bool {
    format >= 19
}

/// Type trees are followed by dependency/reference info.
#[inline]
pub const fn has_type_dependencies(format: u32) -> bool {
    format >= 21
}

/// The big-id flag is stored explicitly in the metadata.
#[inline]
pub const fn has_big_id_flag(format: u32) -> bool {
    format >= 7 && format < 14
}

/// Whether object identities are 64-bit.
///
/// `flag` is the explicit big-id flag for formats that store one.
#[inline]
pub const fn uses_big_id(format: u32, flag: Option<bool>) -> bool {
    if format >= 14 {
        return true;
    }
    match flag {
        Some(f) => has_big_id_flag(format) && f,
        None => false,
    }
}

/// Object table entries start on a 4-byte boundary.
#[inline]
pub const fn aligns_object_table(format: u32) -> bool {
    format >= 14
}

/// Width in bytes of an object's data offset.
#[inline]
pub const fn offset_width(format: u32) -> usize {
    if format >= 22 { 8 } else { 4 }
}

/// Objects name a type index whose serialized type holds the class id.
#[inline]
pub const fn class_id_is_indirect(format: u32) -> bool {
    format >= 16
}

/// Objects carry a 16-bit destroyed flag.
#[inline]
pub const fn has_destroyed_flag(format: u32) -> bool {
    format < 11
}

/// Objects carry a 16-bit script type index.
#[inline]
pub const fn has_script_type_index(format: u32) -> bool {
    format >= 11 && format <= 16
}

/// Objects carry a stripped byte.
#[inline]
pub const fn has_stripped_byte(format: u32) -> bool {
    format >= 15 && format <= 16
}

/// Script type table follows the objects.
#[inline]
pub const fn has_script_types(format: u32) -> bool {
    format >= 11
}

/// Width in bytes of a path id inside an object reference.
#[inline]
pub const fn pptr_path_id_width(format: u32) -> usize {
    if format >= 14 { 8 } else { 4 }
}

/// External file table follows the script types.
#[inline]
pub const fn has_externals(format: u32) -> bool {
    format >= 6
}

/// Reference type table follows the externals.
#[inline]
pub const fn has_ref_types(format: u32) -> bool {
    format >= 20
}

/// A user information string closes the metadata.
#[inline]
pub const fn has_user_info(format: u32) -> bool {
    format >= 5
}
