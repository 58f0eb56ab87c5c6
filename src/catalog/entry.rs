//! Catalog output records.

use super::category::Category;
use crate::decode::StreamingPointer;
use crate::serialized::ObjectDescriptor;

/// Seed of the key stream used by obfuscated text assets.
const MSVC_RAND_SEED: u32 = 0xBF87_66F5;

/// First four bytes of a PNG file.
pub(crate) const PNG_SIGNATURE: [u8; 4] = *b"\x89PNG";

/// The PNG signature after obfuscation.
pub(crate) const OBFUSCATED_PNG_SIGNATURE: [u8; 4] = [0x41, 0xF6, 0x15, 0x0D];

/// Where an entry's payload bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadSource {
    /// Range inside the entry's serialized file.
    Inline { offset: u64, size: u64 },
    /// Range inside a container entry, by index.
    ContainerEntry { entry: usize, offset: u64, size: u64 },
    /// Stored beside the container; located when read.
    ///
    /// `fallback` is an inline range inside the serialized file used when
    /// the pointer cannot be resolved.
    External { pointer: StreamingPointer, fallback: Option<(u64, u64)> },
}

impl PayloadSource {
    /// Declared payload length.
    pub fn size(&self) -> u64 {
        match self {
            PayloadSource::Inline { size, .. } | PayloadSource::ContainerEntry { size, .. } => *size,
            PayloadSource::External { pointer, .. } => pointer.size,
        }
    }
}

/// Decoding applied to payload bytes after reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadTransform {
    #[default]
    None,
    /// XOR with the low byte of a chained MSVC `rand()` sequence.
    MsvcRandXor,
}

impl PayloadTransform {
    /// Apply the transform in place.
    pub fn apply(&self, data: &mut [u8]) {
        match self {
            PayloadTransform::None => {}
            PayloadTransform::MsvcRandXor => msvc_rand_xor(data),
        }
    }
}

fn msvc_rand_xor(data: &mut [u8]) {
    let mut key = MSVC_RAND_SEED;
    for byte in data {
        key = (key.wrapping_mul(0x343FD).wrapping_add(0x269EC3) >> 16) & 0x7FFF;
        *byte ^= key as u8;
    }
}

/// One named, categorized asset.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetEntry {
    pub name: String,
    pub category: Category,
    pub source: PayloadSource,
    pub transform: PayloadTransform,
    /// Originating object, absent for raw container entries.
    pub object: Option<ObjectDescriptor>,
    /// Index of the serialized file the object belongs to.
    pub file: Option<usize>,
    /// True when the object's schema is available for generic decoding.
    pub decodable: bool,
}

impl AssetEntry {
    /// Declared payload size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.source.size()
    }

    /// True when the payload lives outside the container.
    #[inline]
    pub fn is_external(&self) -> bool {
        matches!(self.source, PayloadSource::External { .. })
    }
}
