//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`EndianReader`] - Byte-order aware cursor
//! - [`EngineVersion`] - Parsed engine version strings

mod endian;
mod error;
mod version;

pub use endian::*;
pub use error::*;
pub use version::*;
