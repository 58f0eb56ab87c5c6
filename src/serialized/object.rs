//! Object table records.

use super::type_tree::TypeNode;

/// One entry of a serialized file's object table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectDescriptor {
    /// Identity of the object within its file.
    pub path_id: i64,
    /// Start of the object bytes relative to the serialized file, data offset applied.
    pub offset: u64,
    /// Length of the object bytes.
    pub size: u32,
    /// Key into the file's schemas: a type index from format 16, the raw type id before.
    pub type_id: i32,
    /// Engine class id.
    pub class_id: i32,
}

impl ObjectDescriptor {
    /// End of the object bytes (exclusive).
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.size as u64
    }
}

/// One entry of the serialized type list.
#[derive(Clone, Debug, PartialEq)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped: bool,
    /// Index into the script type table, -1 when absent.
    pub script_type_index: i16,
    pub script_id: Option<[u8; 16]>,
    pub type_hash: Option<[u8; 16]>,
    /// Schema, absent when the file was built without type trees.
    pub tree: Option<TypeNode>,
}

/// Reference to another serialized file this one depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalFile {
    pub asset_path: String,
    pub guid: [u8; 16],
    pub kind: i32,
    pub path: String,
}
