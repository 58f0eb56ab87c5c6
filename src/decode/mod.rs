//! Object decoding.
//!
//! - [`decode_object`] - Generic walk driven by a stored schema
//! - [`readers`] - Fixed layouts for schema-less files
//! - [`Value`] - Decoded field tree

mod decoder;
pub mod readers;
mod value;

pub use decoder::{decode_object, stream_offset_width, Decoder, MAX_STRING_LEN};
pub use readers::{ManifestEntry, PayloadHeader, ReadContext};
pub use value::{StreamingPointer, Value};
