//! Schema-driven object decoder.
//!
//! Walks a [`TypeNode`] tree alongside the object bytes and produces a
//! [`Value`]. Nothing here knows about particular engine classes; the
//! layout comes entirely from the schema stored in the file.

use super::value::{StreamingPointer, Value};
use crate::serialized::format::VALUE_ALIGNMENT;
use crate::serialized::{NodeShape, Primitive, TypeNode};
use crate::util::{Endian, EndianReader, EngineVersion, Error, Result};

/// Longest string accepted while decoding.
pub const MAX_STRING_LEN: usize = 0x10_0000;

/// Engine major version from which streaming offsets are 64-bit.
const WIDE_STREAM_OFFSET_MAJOR: u32 = 2020;

/// Decode a whole object with its root schema node.
pub fn decode_object(
    root: &TypeNode,
    data: &[u8],
    endian: Endian,
    engine: Option<EngineVersion>,
) -> Result<Value> {
    Decoder::new(data, endian, engine).decode(root)
}

/// Cursor-carrying decoder over one object's bytes.
pub struct Decoder<'a> {
    reader: EndianReader<'a>,
    engine: Option<EngineVersion>,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], endian: Endian, engine: Option<EngineVersion>) -> Self {
        Self { reader: EndianReader::new(data, endian), engine }
    }

    /// Current offset from the start of the object.
    #[inline]
    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    /// Decode one node, then apply its trailing alignment.
    pub fn decode(&mut self, node: &TypeNode) -> Result<Value> {
        let value = match node.shape() {
            NodeShape::Array { element, typeless } => self.decode_array(node, element, typeless)?,
            NodeShape::String => self.decode_string(node)?,
            NodeShape::StreamingInfo => Value::StreamingInfo(self.decode_streaming_info(node)?),
            NodeShape::Primitive(p) => self.decode_primitive(p)?,
            // Containers wrap a single array node; expose the array itself.
            NodeShape::Record([inner]) if inner.is_array => self.decode(inner)?,
            NodeShape::Record(children) => {
                let mut fields = Vec::with_capacity(children.len());
                for child in children {
                    fields.push((child.name.clone(), self.decode(child)?));
                }
                Value::Record(fields)
            }
            NodeShape::Opaque(size) => {
                self.reader.skip(size as u64)?;
                Value::Skipped { size }
            }
            NodeShape::Unrecognized => {
                return Err(Error::invalid(format!(
                    "cannot decode field '{}' of variable-size type '{}'",
                    node.name, node.type_name
                )));
            }
        };

        if node.is_aligned() {
            self.reader.align(VALUE_ALIGNMENT)?;
        }
        Ok(value)
    }

    fn decode_array(&mut self, node: &TypeNode, element: &TypeNode, typeless: bool) -> Result<Value> {
        let pos = self.reader.position();
        let count = self.reader.read_i32()?;
        if count < 0 {
            return Err(Error::invalid(format!("negative count {count} for '{}' at {pos}", node.name)));
        }
        let count = count as u64;

        if typeless {
            if element.size < 0 {
                return Err(Error::invalid(format!("typeless '{}' has variable-size elements", node.name)));
            }
            let offset = self.reader.position();
            let len = count * element.size as u64;
            self.reader.skip(len)?;
            return Ok(Value::Blob { offset, len });
        }

        let min_element = element.size.max(1) as u64;
        if count * min_element > self.reader.remaining() {
            return Err(Error::invalid(format!(
                "'{}' claims {count} elements with {} bytes left",
                node.name,
                self.reader.remaining()
            )));
        }

        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(self.decode(element)?);
        }
        Ok(Value::Array(items))
    }

    fn decode_string(&mut self, node: &TypeNode) -> Result<Value> {
        let text = self.reader.read_string(MAX_STRING_LEN)?;
        if node.children.first().map_or(false, TypeNode::is_aligned) {
            self.reader.align(VALUE_ALIGNMENT)?;
        }
        Ok(Value::String(text))
    }

    fn decode_streaming_info(&mut self, node: &TypeNode) -> Result<StreamingPointer> {
        let offset = if self.stream_offset_width(node) == 8 {
            self.reader.read_u64()?
        } else {
            self.reader.read_u32()? as u64
        };
        let size = self.reader.read_u32()? as u64;
        let path = self.reader.read_string(MAX_STRING_LEN)?;
        self.reader.align(VALUE_ALIGNMENT)?;
        Ok(StreamingPointer { path, offset, size })
    }

    /// Offset width from the engine version, or from the schema when the
    /// version was stripped.
    fn stream_offset_width(&self, node: &TypeNode) -> usize {
        match self.engine {
            Some(v) if !v.is_unknown() => stream_offset_width(v),
            _ => match node.child("offset").map(|c| c.size) {
                Some(8) => 8,
                _ => 4,
            },
        }
    }

    fn decode_primitive(&mut self, p: Primitive) -> Result<Value> {
        let r = &mut self.reader;
        Ok(match p {
            Primitive::Bool => Value::Bool(r.read_bool()?),
            Primitive::I8 => Value::Int(r.read_i8()? as i64),
            Primitive::U8 => Value::UInt(r.read_u8()? as u64),
            Primitive::I16 => Value::Int(r.read_i16()? as i64),
            Primitive::U16 => Value::UInt(r.read_u16()? as u64),
            Primitive::I32 => Value::Int(r.read_i32()? as i64),
            Primitive::U32 => Value::UInt(r.read_u32()? as u64),
            Primitive::I64 => Value::Int(r.read_i64()?),
            Primitive::U64 => Value::UInt(r.read_u64()?),
            Primitive::F32 => Value::Float(r.read_f32()? as f64),
            Primitive::F64 => Value::Float(r.read_f64()?),
        })
    }
}

/// Width in bytes of a `StreamingInfo` offset written by `engine`.
#[inline]
pub fn stream_offset_width(engine: EngineVersion) -> usize {
    if engine.major >= WIDE_STREAM_OFFSET_MAJOR { 8 } else { 4 }
}
