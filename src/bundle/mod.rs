//! Segmented UnityFS container.
//!
//! - [`BundleFile`] - Header, block index and virtual address space reads
//! - [`Segment`] / [`ContainerEntry`] - Index records
//! - [`format`] - Magic, flags and version rules

pub mod format;
mod reader;

pub use reader::{base_name, BundleFile, BundleHeader, ContainerEntry, Segment};
