//! Serialized files: the self-describing object databases inside a container.
//!
//! - [`SerializedFile`] - Header, type list, object table
//! - [`TypeNode`] - Schema tree in either on-disk encoding
//! - [`CommonStrings`] - Built-in string pool for blob schemas
//! - [`format`] - Format-version rules

mod common_strings;
mod file;
pub mod format;
mod object;
mod type_tree;

pub use common_strings::CommonStrings;
pub use file::{SerializedFile, SerializedHeader};
pub use object::{ExternalFile, ObjectDescriptor, SerializedType};
pub use type_tree::{read_type_tree, resolve_string, NodeShape, Primitive, TypeNode, NULL_STRING, TYPELESS_DATA};
