//! Block codecs for container segments and the block index.
//!
//! The low six bits of a segment or header flags word select the codec.
//! LZMA blocks carry the 5-byte properties header but no size field;
//! LZ4 blocks are raw block-format data with no frame.

use lzma_rs::decompress::{Options, UnpackedSize};

use crate::util::{Error, Result};

/// Mask selecting the compression method from a flags word.
pub const COMPRESSION_MASK: u32 = 0x3F;

/// Size of the LZMA properties header (lc/lp/pb byte + dictionary size).
pub const LZMA_PROPS_SIZE: usize = 5;

/// Compression method of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
}

impl Compression {
    /// Decode the method from a flags word, `None` for unknown tags.
    pub fn from_flags(flags: u32) -> Option<Self> {
        match flags & COMPRESSION_MASK {
            0 => Some(Compression::None),
            1 => Some(Compression::Lzma),
            2 => Some(Compression::Lz4),
            3 => Some(Compression::Lz4Hc),
            _ => None,
        }
    }

    /// Numeric tag as stored on disk.
    pub fn tag(self) -> u32 {
        match self {
            Compression::None => 0,
            Compression::Lzma => 1,
            Compression::Lz4 => 2,
            Compression::Lz4Hc => 3,
        }
    }
}

/// Decompress `packed` into exactly `unpacked_len` bytes.
///
/// Any other resulting length is a [`Error::DecompressionSizeMismatch`].
pub fn decompress(method: Compression, packed: &[u8], unpacked_len: usize) -> Result<Vec<u8>> {
    let out = match method {
        Compression::None => packed.to_vec(),
        Compression::Lzma => decompress_lzma(packed, unpacked_len)?,
        Compression::Lz4 | Compression::Lz4Hc => decompress_lz4(packed, unpacked_len)?,
    };

    if out.len() != unpacked_len {
        return Err(Error::DecompressionSizeMismatch { expected: unpacked_len, actual: out.len() });
    }
    Ok(out)
}

fn decompress_lzma(packed: &[u8], unpacked_len: usize) -> Result<Vec<u8>> {
    if packed.len() < LZMA_PROPS_SIZE {
        return Err(Error::Decompression(format!(
            "LZMA block of {} bytes has no properties header",
            packed.len()
        )));
    }

    let options = Options {
        unpacked_size: UnpackedSize::UseProvided(Some(unpacked_len as u64)),
        ..Default::default()
    };
    let mut input = packed;
    let mut out = Vec::with_capacity(unpacked_len);
    lzma_rs::lzma_decompress_with_options(&mut input, &mut out, &options)
        .map_err(|e| Error::Decompression(format!("LZMA: {e}")))?;
    Ok(out)
}

fn decompress_lz4(packed: &[u8], unpacked_len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; unpacked_len];
    let written = lz4_flex::block::decompress_into(packed, &mut out)
        .map_err(|e| Error::Decompression(format!("LZ4: {e}")))?;
    out.truncate(written);
    Ok(out)
}
