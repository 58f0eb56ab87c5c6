//! # UnityFS
//!
//! Read-only decoder for UnityFS asset bundles and the serialized files
//! inside them.
//!
//! Object layouts are not fixed at compile time: every serialized file
//! carries a schema describing its classes, and decoding walks that schema.
//!
//! ## Modules
//!
//! - [`util`] - Errors, endian-aware cursor, engine versions
//! - [`core`] - Byte sources, segment cache, block codecs
//! - [`bundle`] - Segmented, block-compressed container
//! - [`serialized`] - Serialized file header, schemas, object table
//! - [`decode`] - Schema-driven decoder and fixed-layout readers
//! - [`catalog`] - Names, categories and payload locations
//! - [`archive`] - Top-level open and read API
//!
//! ## Example
//!
//! ```ignore
//! use unityfs::prelude::*;
//!
//! let archive = Archive::open("level0.bundle")?;
//! for entry in archive.entries() {
//!     println!("{} [{}] {} bytes", entry.name, entry.category, entry.size());
//! }
//! ```

pub mod util;
pub mod core;
pub mod bundle;
pub mod serialized;
pub mod decode;
pub mod catalog;
pub mod archive;

// Re-export commonly used types
pub use archive::{Archive, OpenOptions};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{Archive, OpenOptions};
    pub use crate::bundle::{BundleFile, ContainerEntry};
    pub use crate::catalog::{AssetEntry, Category, MemoryLocator, PayloadSource, ResourceLocator};
    pub use crate::core::{ByteSource, FileSource};
    pub use crate::decode::{StreamingPointer, Value};
    pub use crate::serialized::SerializedFile;
    pub use crate::util::{Error, Result};
}
