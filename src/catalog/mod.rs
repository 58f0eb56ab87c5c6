//! Asset catalog: names, categories and payload locations.
//!
//! - [`CatalogBuilder`] - Object tables to [`AssetEntry`] records
//! - [`Category`] - Asset kinds and their extensions
//! - [`ResourceLocator`] - Sibling file lookup for streamed payloads

mod builder;
pub mod category;
mod entry;
mod resolve;

pub use builder::{raw_entry, sanitize, shorten_path, synthesized_name, with_extension, CatalogBuilder};
pub use category::{is_structural, Category};
pub use entry::{AssetEntry, PayloadSource, PayloadTransform};
pub use resolve::{locate, strip_scheme, Adjacency, DirectoryLocator, MemoryLocator, NoLocator, ResourceLocator};
