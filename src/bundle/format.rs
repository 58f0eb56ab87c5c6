//! UnityFS container constants and version rules.

use crate::util::EngineVersion;

/// Magic bytes at the start of a UnityFS container, NUL included.
pub const UNITYFS_MAGIC: &[u8; 8] = b"UnityFS\0";

/// Oldest container version this reader understands.
pub const MIN_VERSION: u32 = 6;

/// Newest container version this reader understands.
pub const MAX_VERSION: u32 = 8;

/// Header flag: the block index is stored at the end of the file.
pub const FLAG_INDEX_AT_END: u32 = 0x80;

/// Header flag: the first data block starts on a 16-byte boundary.
pub const FLAG_BLOCK_PADDING: u32 = 0x200;

/// Alignment used by both header padding corrections.
pub const HEADER_ALIGNMENT: u64 = 16;

/// Bytes of GUID/hash preceding the segment table in the decompressed index.
pub const INDEX_HASH_SIZE: usize = 16;

/// On-disk size of one segment record: unpacked u32, packed u32, flags u16.
pub const SEGMENT_RECORD_SIZE: usize = 10;

/// Minimum on-disk size of one entry record: offset, size, flags, empty name.
pub const ENTRY_RECORD_MIN_SIZE: usize = 8 + 8 + 4 + 1;

/// Engine version from which old containers may carry header padding.
pub const PADDING_ENGINE_THRESHOLD: EngineVersion = EngineVersion::new(2019, 4, 0);

/// Check if a container version is within the supported range.
#[inline]
pub const fn is_supported_version(version: u32) -> bool {
    version >= MIN_VERSION && version <= MAX_VERSION
}

/// Containers from version 7 on always pad the header to 16 bytes.
#[inline]
pub const fn requires_header_alignment(version: u32) -> bool {
    version >= 7
}

/// Older containers written by recent engines may also carry the padding.
///
/// Whether they do cannot be told from the header, so the caller reads the
/// padding and rolls back when any of it is non-zero. Genuinely padded
/// files whose padding happens to be non-zero are misread by this rule.
#[inline]
pub fn may_have_header_padding(version: u32, engine: Option<EngineVersion>) -> bool {
    !requires_header_alignment(version)
        && engine.map_or(false, |v| v >= PADDING_ENGINE_THRESHOLD)
}

#[inline]
pub const fn index_at_end(flags: u32) -> bool {
    flags & FLAG_INDEX_AT_END != 0
}

#[inline]
pub const fn has_block_padding(flags: u32) -> bool {
    flags & FLAG_BLOCK_PADDING != 0
}

/// Round `pos` up to a multiple of `alignment`.
#[inline]
pub const fn align_up(pos: u64, alignment: u64) -> u64 {
    let rem = pos % alignment;
    if rem == 0 { pos } else { pos + (alignment - rem) }
}
