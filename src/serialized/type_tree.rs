//! Self-describing type schema.
//!
//! Each serialized type may carry a tree of [`TypeNode`]s describing how its
//! objects are laid out. Two encodings exist on disk:
//!
//! - **raw**: every node is written recursively, pre-order, with its names
//!   inline as C strings
//! - **blob**: a flat array of fixed-size records carrying an explicit depth
//!   byte, followed by a string buffer that the records index into
//!
//! Both produce the same tree.

use smallvec::SmallVec;

use super::common_strings::CommonStrings;
use super::format::{self, ALIGN_FLAG};
use crate::util::{EndianReader, Error, Result};

/// Name used when a string offset points nowhere.
pub const NULL_STRING: &str = "(null)";

/// Sentinel type name for flat byte buffers.
pub const TYPELESS_DATA: &str = "TypelessData";

/// Deepest raw-encoded nesting accepted before the input is considered hostile.
const MAX_RAW_DEPTH: usize = 64;

/// Smallest possible raw node: two empty C strings and six 32-bit fields.
const MIN_RAW_NODE_SIZE: u64 = 2 + 6 * 4;

/// Top bit of a blob string offset selects the common string table.
const COMMON_STRING_BIT: u32 = 0x8000_0000;

/// One field of a type schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeNode {
    pub type_name: String,
    pub name: String,
    /// Declared byte size; negative for variable-length nodes.
    pub size: i32,
    pub index: u32,
    pub version: i32,
    pub is_array: bool,
    pub flags: i32,
    /// Reference type hash (blob format 19+), zero otherwise.
    pub ref_type_hash: u64,
    pub children: Vec<TypeNode>,
}

/// Fixed-width values the decoder reads directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Primitive {
    /// Recognize a primitive by type name, requiring its natural size.
    pub fn from_type(type_name: &str, size: i32) -> Option<Self> {
        let prim = match type_name {
            "bool" => Primitive::Bool,
            "SInt8" => Primitive::I8,
            "UInt8" | "char" => Primitive::U8,
            "SInt16" | "short" => Primitive::I16,
            "UInt16" | "unsigned short" => Primitive::U16,
            "int" | "SInt32" => Primitive::I32,
            "unsigned int" | "UInt32" => Primitive::U32,
            "SInt64" | "long long" => Primitive::I64,
            "UInt64" | "unsigned long long" | "FileSize" => Primitive::U64,
            "float" => Primitive::F32,
            "double" => Primitive::F64,
            _ => return None,
        };
        (prim.size() as i32 == size).then_some(prim)
    }

    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Primitive::Bool | Primitive::I8 | Primitive::U8 => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }
}

/// How the generic decoder treats a node.
#[derive(Clone, Copy, Debug)]
pub enum NodeShape<'a> {
    /// Count-prefixed sequence of `element`; `typeless` buffers are skipped whole.
    Array { element: &'a TypeNode, typeless: bool },
    /// Length-prefixed UTF-8 text.
    String,
    /// Offset, size and path of a streamed payload.
    StreamingInfo,
    Primitive(Primitive),
    /// Variable-length node decoded field by field.
    Record(&'a [TypeNode]),
    /// Fixed-size node skipped without interpretation.
    Opaque(u32),
    /// Variable-length node with nothing to decode it by.
    Unrecognized,
}

impl TypeNode {
    /// Check the "align to 4 bytes after this field" flag.
    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.flags & ALIGN_FLAG != 0
    }

    /// Direct child with the given field name.
    pub fn child(&self, name: &str) -> Option<&TypeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Element template of an array node.
    pub fn element(&self) -> Option<&TypeNode> {
        self.child("data")
    }

    /// True when the first field is the `m_Name` string of a named object.
    pub fn has_leading_name(&self) -> bool {
        self.children
            .first()
            .map_or(false, |c| c.name == "m_Name" && c.type_name == "string")
    }

    /// Classify this node for decoding.
    pub fn shape(&self) -> NodeShape<'_> {
        if self.is_array {
            return match self.element() {
                Some(element) => NodeShape::Array { element, typeless: self.type_name == TYPELESS_DATA },
                None => NodeShape::Unrecognized,
            };
        }
        if self.size < 0 {
            return match self.type_name.as_str() {
                "string" => NodeShape::String,
                "StreamingInfo" => NodeShape::StreamingInfo,
                _ if !self.children.is_empty() => NodeShape::Record(&self.children),
                _ => NodeShape::Unrecognized,
            };
        }
        match Primitive::from_type(&self.type_name, self.size) {
            Some(p) => NodeShape::Primitive(p),
            None => NodeShape::Opaque(self.size as u32),
        }
    }

    /// Nodes in pre-order, paired with their depth below this node.
    pub fn pre_order(&self) -> Vec<(usize, &TypeNode)> {
        let mut out = Vec::new();
        let mut pending = vec![(0usize, self)];
        while let Some((depth, node)) = pending.pop() {
            out.push((depth, node));
            pending.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }
}

/// Read one type tree in the encoding used by `format`.
///
/// Returns `None` for an empty blob.
pub fn read_type_tree(
    r: &mut EndianReader<'_>,
    format: u32,
    strings: &CommonStrings,
) -> Result<Option<TypeNode>> {
    if format::uses_blob_schema(format) {
        read_blob(r, format, strings)
    } else {
        read_raw(r, 0).map(Some)
    }
}

fn read_raw(r: &mut EndianReader<'_>, depth: usize) -> Result<TypeNode> {
    if depth > MAX_RAW_DEPTH {
        return Err(Error::corrupt("type tree nested too deeply"));
    }

    let type_name = r.read_cstring()?;
    let name = r.read_cstring()?;
    let size = r.read_i32()?;
    let index = r.read_u32()?;
    let is_array = r.read_i32()? != 0;
    let version = r.read_i32()?;
    let flags = r.read_i32()?;

    let count = r.read_i32()?;
    if count < 0 || count as u64 * MIN_RAW_NODE_SIZE > r.remaining() {
        return Err(Error::corrupt(format!("type node '{name}' claims {count} children")));
    }
    let children = (0..count)
        .map(|_| read_raw(r, depth + 1))
        .collect::<Result<Vec<_>>>()?;

    Ok(TypeNode { type_name, name, size, index, version, is_array, flags, ref_type_hash: 0, children })
}

fn read_blob(
    r: &mut EndianReader<'_>,
    format: u32,
    strings: &CommonStrings,
) -> Result<Option<TypeNode>> {
    let count = r.read_i32()?;
    let buffer_bytes = r.read_i32()?;
    let record_size = format::node_record_size(format);
    if count < 0
        || buffer_bytes < 0
        || count as u64 * record_size as u64 + buffer_bytes as u64 > r.remaining()
    {
        return Err(Error::corrupt(format!("type tree of {count} nodes / {buffer_bytes} string bytes")));
    }
    if count == 0 {
        r.skip(buffer_bytes as u64)?;
        return Ok(None);
    }

    let records = r.read_bytes(count as usize * record_size)?;
    let local = r.read_bytes(buffer_bytes as usize)?;
    let mut rr = EndianReader::new(records, r.endian());

    // Ancestors of the node being read, root first
    let mut stack: SmallVec<[TypeNode; 8]> = SmallVec::new();
    for i in 0..count {
        let version = rr.read_i16()? as i32;
        let depth = rr.read_u8()? as usize;
        let is_array = rr.read_u8()? != 0;
        let type_name = resolve_string(rr.read_u32()?, local, strings);
        let name = resolve_string(rr.read_u32()?, local, strings);
        let size = rr.read_i32()?;
        let index = rr.read_u32()?;
        let flags = rr.read_i32()?;
        let ref_type_hash = if format::has_ref_type_hash(format) { rr.read_u64()? } else { 0 };

        let node = TypeNode {
            type_name,
            name,
            size,
            index,
            version,
            is_array,
            flags,
            ref_type_hash,
            children: Vec::new(),
        };

        if depth == 0 && i != 0 {
            return Err(Error::corrupt(format!("type node {i} is a second root")));
        }
        if depth > stack.len() {
            return Err(Error::corrupt(format!("type node {i} skips to depth {depth}")));
        }
        while stack.len() > depth {
            attach_top(&mut stack);
        }
        stack.push(node);
    }

    while stack.len() > 1 {
        attach_top(&mut stack);
    }
    Ok(stack.pop())
}

/// Pop the innermost node and append it to its parent.
fn attach_top(stack: &mut SmallVec<[TypeNode; 8]>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
}

/// Resolve a blob string offset against the common table or the local buffer.
pub fn resolve_string(offset: u32, local: &[u8], strings: &CommonStrings) -> String {
    if offset & COMMON_STRING_BIT != 0 {
        return strings.get(offset & !COMMON_STRING_BIT).unwrap_or(NULL_STRING).to_string();
    }
    let start = offset as usize;
    if start >= local.len() {
        return NULL_STRING.to_string();
    }
    let tail = &local[start..];
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..end]).into_owned()
}
