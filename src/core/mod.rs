//! Core layer - byte sources, block codecs and caching.
//!
//! This module provides:
//! - [`ByteSource`] / [`FileSource`] / [`Region`] - Positioned random-access reads
//! - [`Compression`] / [`decompress`] - Segment and index codecs
//! - [`SegmentCache`] - Shared cache of decompressed segments

mod cache;
mod compression;
mod source;

pub use cache::{SegmentCache, DEFAULT_CACHE_BYTES};
pub use compression::{decompress, Compression, COMPRESSION_MASK, LZMA_PROPS_SIZE};
pub use source::{check_range, ByteSource, FileSource, Region};
