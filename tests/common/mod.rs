//! Synthetic bundle and serialized-file builders shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use unityfs::catalog::PayloadTransform;

pub const ENGINE: &str = "2019.4.1f1";
pub const ALIGN: i32 = 0x4000;
pub const OBFUSCATED: i32 = 0x0400_0000;

pub const TEXTURE_2D: i32 = 28;
pub const TEXT_ASSET: i32 = 49;
pub const AUDIO_CLIP: i32 = 83;
pub const MATERIAL: i32 = 21;
pub const MESH: i32 = 43;
pub const GAME_OBJECT: i32 = 1;
pub const ASSET_BUNDLE: i32 = 142;

/// Install a test-friendly tracing subscriber, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Schemas
// ============================================================================

/// Schema node written in the blob encoding.
#[derive(Clone, Debug)]
pub struct Node {
    pub type_name: String,
    pub name: String,
    pub size: i32,
    pub flags: i32,
    pub is_array: bool,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(type_name: &str, name: &str, size: i32) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            size,
            flags: 0,
            is_array: false,
            children: Vec::new(),
        }
    }

    pub fn with(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags |= flags;
        self
    }

    pub fn aligned(self) -> Self {
        self.flags(ALIGN)
    }

    /// Array node over `element`.
    pub fn array(type_name: &str, element: Node) -> Self {
        let mut node = Node::new(type_name, "Array", -1).with(vec![Node::new("int", "size", 4), element]);
        node.is_array = true;
        node
    }

    /// Length-prefixed, 4-aligned string field.
    pub fn string(name: &str) -> Self {
        Node::new("string", name, -1).with(vec![Node::array("Array", Node::new("char", "data", 1)).aligned()])
    }

    /// Class root whose first field is `m_Name`.
    pub fn named_class(type_name: &str, fields: Vec<Node>) -> Self {
        let mut children = vec![Node::string("m_Name")];
        children.extend(fields);
        Node::new(type_name, "Base", -1).with(children)
    }

    fn walk<'a>(&'a self, depth: u8, out: &mut Vec<(u8, &'a Node)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk(depth + 1, out);
        }
    }

    /// Blob encoding for format 19 and later: 32-byte records.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut nodes = Vec::new();
        self.walk(0, &mut nodes);

        let mut strings = Vec::new();
        let mut offsets: HashMap<String, u32> = HashMap::new();
        let mut intern = |s: &str| -> u32 {
            *offsets.entry(s.to_owned()).or_insert_with(|| {
                let at = strings.len() as u32;
                strings.extend_from_slice(s.as_bytes());
                strings.push(0);
                at
            })
        };

        let mut records = Vec::new();
        for (index, (depth, node)) in nodes.iter().enumerate() {
            let type_offset = intern(&node.type_name);
            let name_offset = intern(&node.name);
            records.write_i16::<LittleEndian>(1).unwrap();
            records.write_u8(*depth).unwrap();
            records.write_u8(node.is_array as u8).unwrap();
            records.write_u32::<LittleEndian>(type_offset).unwrap();
            records.write_u32::<LittleEndian>(name_offset).unwrap();
            records.write_i32::<LittleEndian>(node.size).unwrap();
            records.write_u32::<LittleEndian>(index as u32).unwrap();
            records.write_i32::<LittleEndian>(node.flags).unwrap();
            records.write_u64::<LittleEndian>(0).unwrap();
        }

        let mut out = Vec::new();
        out.write_i32::<LittleEndian>(nodes.len() as i32).unwrap();
        out.write_i32::<LittleEndian>(strings.len() as i32).unwrap();
        out.extend_from_slice(&records);
        out.extend_from_slice(&strings);
        out
    }
}

/// `Texture2D` schema with an inline buffer and a streaming pointer.
pub fn texture_schema() -> Node {
    Node::named_class(
        "Texture2D",
        vec![
            Node::new("int", "m_Width", 4),
            Node::new("int", "m_Height", 4),
            Node::array("TypelessData", Node::new("UInt8", "data", 1)).aligned(),
            Node::new("StreamingInfo", "m_StreamData", -1).with(vec![
                Node::new("unsigned int", "offset", 4),
                Node::new("unsigned int", "size", 4),
                Node::string("path"),
            ]),
        ],
    )
    .renamed_array("image data")
}

impl Node {
    /// Rename the typeless array child, which `array` always calls `Array`.
    fn renamed_array(mut self, name: &str) -> Self {
        for child in &mut self.children {
            if child.type_name == "TypelessData" {
                child.name = name.into();
            }
        }
        self
    }
}

/// `TextAsset` schema; `script_flags` lets tests mark the payload obfuscated.
pub fn text_asset_schema(script_flags: i32) -> Node {
    Node::named_class("TextAsset", vec![Node::string("m_Script").flags(script_flags)])
}

/// `Material`-like schema whose only interesting field is its name.
pub fn material_schema() -> Node {
    Node::named_class("Material", vec![Node::new("int", "m_Mode", 4)])
}

// ============================================================================
// Object payloads
// ============================================================================

/// Little-endian object byte writer.
#[derive(Default)]
pub struct Obj(pub Vec<u8>);

impl Obj {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.0.write_i32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.0.write_u32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.0.write_i64::<LittleEndian>(v).unwrap();
        self
    }

    pub fn u64(mut self, v: u64) -> Self {
        self.0.write_u64::<LittleEndian>(v).unwrap();
        self
    }

    pub fn f32(mut self, v: f32) -> Self {
        self.0.write_f32::<LittleEndian>(v).unwrap();
        self
    }

    pub fn bool(mut self, v: bool) -> Self {
        self.0.push(v as u8);
        self
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.0.extend_from_slice(data);
        self
    }

    pub fn align(mut self) -> Self {
        while self.0.len() % 4 != 0 {
            self.0.push(0);
        }
        self
    }

    pub fn string(self, s: &str) -> Self {
        self.i32(s.len() as i32).bytes(s.as_bytes()).align()
    }

    pub fn done(self) -> Vec<u8> {
        self.0
    }
}

/// Texture object matching [`texture_schema`] at engine 2019.4.
pub fn texture_object(name: &str, inline: &[u8], stream: Option<(&str, u32, u32)>) -> Vec<u8> {
    let (path, offset, size) = stream.unwrap_or(("", 0, 0));
    Obj::new()
        .string(name)
        .i32(4)
        .i32(4)
        .i32(inline.len() as i32)
        .bytes(inline)
        .align()
        .u32(offset)
        .u32(size)
        .string(path)
        .done()
}

/// Text asset object with a raw script payload.
pub fn text_asset_object(name: &str, script: &[u8]) -> Vec<u8> {
    Obj::new().string(name).i32(script.len() as i32).bytes(script).align().done()
}

/// Obfuscate a script payload the way protected builds store it.
pub fn obfuscate(plain: &[u8]) -> Vec<u8> {
    let mut data = plain.to_vec();
    PayloadTransform::MsvcRandXor.apply(&mut data);
    data
}

/// Audio clip object in the 2019.4 layout, streamed from `source`.
pub fn audio_clip_object(name: &str, source: &str, offset: u64, size: u64) -> Vec<u8> {
    Obj::new()
        .string(name)
        .i32(0)
        .i32(2)
        .i32(44100)
        .i32(16)
        .f32(2.0)
        .bool(false)
        .bool(false)
        .align()
        .i32(0)
        .bool(true)
        .bool(false)
        .bool(true)
        .align()
        .string(source)
        .u64(offset)
        .u64(size)
        .i32(2)
        .done()
}

/// Bundle manifest object mapping container paths to local path ids.
pub fn manifest_object(rows: &[(&str, i64)]) -> Vec<u8> {
    let mut obj = Obj::new().string("level").i32(0).i32(rows.len() as i32);
    for (path, path_id) in rows {
        obj = obj.string(path).i32(0).i32(0).i32(0).i64(*path_id);
    }
    obj.done()
}

// ============================================================================
// Serialized files
// ============================================================================

const FORMAT: u32 = 22;
const HEADER_SIZE: usize = 48;

struct ObjectSpec {
    path_id: i64,
    type_index: i32,
    data: Vec<u8>,
}

/// Builds a little-endian format-22 serialized file.
pub struct SerializedBuilder {
    engine: String,
    types: Vec<(i32, Option<Node>)>,
    objects: Vec<ObjectSpec>,
}

impl SerializedBuilder {
    pub fn new() -> Self {
        Self { engine: ENGINE.into(), types: Vec::new(), objects: Vec::new() }
    }

    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = engine.into();
        self
    }

    /// Add a serialized type; its type index is its position.
    pub fn with_type(mut self, class_id: i32, tree: Option<Node>) -> Self {
        self.types.push((class_id, tree));
        self
    }

    pub fn with_object(mut self, path_id: i64, type_index: i32, data: Vec<u8>) -> Self {
        self.objects.push(ObjectSpec { path_id, type_index, data });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let has_trees = self.types.iter().any(|(_, tree)| tree.is_some());

        let mut meta = Vec::new();
        meta.extend_from_slice(self.engine.as_bytes());
        meta.push(0);
        meta.write_i32::<LittleEndian>(19).unwrap();
        meta.push(has_trees as u8);

        meta.write_i32::<LittleEndian>(self.types.len() as i32).unwrap();
        for (class_id, tree) in &self.types {
            meta.write_i32::<LittleEndian>(*class_id).unwrap();
            meta.push(0);
            meta.write_i16::<LittleEndian>(-1).unwrap();
            if *class_id == 114 {
                meta.extend_from_slice(&[0u8; 16]);
            }
            meta.extend_from_slice(&[0u8; 16]);
            if has_trees {
                match tree {
                    Some(tree) => meta.extend_from_slice(&tree.to_blob()),
                    None => meta.extend_from_slice(&[0u8; 8]),
                }
                meta.write_i32::<LittleEndian>(0).unwrap();
            }
        }

        let mut data = Vec::new();
        meta.write_i32::<LittleEndian>(self.objects.len() as i32).unwrap();
        for object in &self.objects {
            while (HEADER_SIZE + meta.len()) % 4 != 0 {
                meta.push(0);
            }
            while data.len() % 8 != 0 {
                data.push(0);
            }
            meta.write_i64::<LittleEndian>(object.path_id).unwrap();
            meta.write_i64::<LittleEndian>(data.len() as i64).unwrap();
            meta.write_u32::<LittleEndian>(object.data.len() as u32).unwrap();
            meta.write_i32::<LittleEndian>(object.type_index).unwrap();
            data.extend_from_slice(&object.data);
        }
        // script types, externals, reference types, user info
        meta.write_i32::<LittleEndian>(0).unwrap();
        meta.write_i32::<LittleEndian>(0).unwrap();
        meta.write_i32::<LittleEndian>(0).unwrap();
        meta.push(0);

        let data_offset = (HEADER_SIZE + meta.len() + 15) / 16 * 16;
        let file_size = data_offset + data.len();

        let mut out = Vec::with_capacity(file_size);
        out.write_u32::<BigEndian>(0).unwrap();
        out.write_u32::<BigEndian>(0).unwrap();
        out.write_u32::<BigEndian>(FORMAT).unwrap();
        out.write_u32::<BigEndian>(0).unwrap();
        out.extend_from_slice(&[0, 0, 0, 0]);
        out.write_u32::<BigEndian>(meta.len() as u32).unwrap();
        out.write_i64::<BigEndian>(file_size as i64).unwrap();
        out.write_i64::<BigEndian>(data_offset as i64).unwrap();
        out.write_u64::<BigEndian>(0).unwrap();
        out.extend_from_slice(&meta);
        out.resize(data_offset, 0);
        out.extend_from_slice(&data);
        out
    }
}

// ============================================================================
// Bundles
// ============================================================================

/// Block codec for a fixture segment or block index.
#[derive(Clone, Copy, Debug)]
pub enum Codec {
    Stored,
    Lz4,
    Lzma,
    /// Stored bytes under an arbitrary compression tag.
    Tagged(u16),
}

impl Codec {
    fn pack(self, raw: &[u8]) -> (Vec<u8>, u16) {
        match self {
            Codec::Stored => (raw.to_vec(), 0),
            Codec::Lzma => (lzma_block(raw), 1),
            Codec::Lz4 => (lz4_flex::block::compress(raw), 2),
            Codec::Tagged(tag) => (raw.to_vec(), tag),
        }
    }
}

/// LZMA stream with its properties header but without the 8-byte size field.
pub fn lzma_block(raw: &[u8]) -> Vec<u8> {
    let mut full = Vec::new();
    lzma_rs::lzma_compress(&mut &raw[..], &mut full).unwrap();
    let mut block = full[..5].to_vec();
    block.extend_from_slice(&full[13..]);
    block
}

pub const INDEX_AT_END: u32 = 0x80;
pub const BLOCK_PADDING: u32 = 0x200;

/// Builds a UnityFS container.
///
/// Defaults to version 7 with a stored block index right after the header.
pub struct BundleBuilder {
    engine: String,
    version: u32,
    flags: u32,
    index_codec: Codec,
    pad_header: bool,
    hash: [u8; 16],
    entries: Vec<(String, u32, Vec<u8>)>,
    segments: Vec<(usize, Codec)>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self {
            engine: ENGINE.into(),
            version: 7,
            flags: 0,
            index_codec: Codec::Stored,
            pad_header: true,
            hash: [0; 16],
            entries: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn engine(mut self, engine: &str) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Extra header flag bits, OR-ed with the index codec tag.
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn index_codec(mut self, codec: Codec) -> Self {
        self.index_codec = codec;
        self
    }

    /// Version 6 only: whether zero padding to 16 follows the header.
    pub fn pad_header(mut self, pad: bool) -> Self {
        self.pad_header = pad;
        self
    }

    /// Leading hash of the block index, the first bytes after the header.
    pub fn index_hash(mut self, hash: [u8; 16]) -> Self {
        self.hash = hash;
        self
    }

    /// Add a container entry; entries are laid out back to back.
    pub fn entry(mut self, name: &str, data: Vec<u8>) -> Self {
        let flags = if name.ends_with(".resS") || name.ends_with(".resource") { 0 } else { 4 };
        self.entries.push((name.into(), flags, data));
        self
    }

    /// Split the virtual space into segments of the given sizes.
    ///
    /// Without a plan the whole space is one stored segment.
    pub fn segments(mut self, plan: &[(usize, Codec)]) -> Self {
        self.segments = plan.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let space: Vec<u8> = self.entries.iter().flat_map(|(_, _, d)| d.iter().copied()).collect();
        let plan = if self.segments.is_empty() { vec![(space.len(), Codec::Stored)] } else { self.segments.clone() };
        assert_eq!(plan.iter().map(|(n, _)| n).sum::<usize>(), space.len(), "segment plan must cover the entries");

        let mut blocks = Vec::new();
        let mut index = self.hash.to_vec();
        index.write_i32::<BigEndian>(plan.len() as i32).unwrap();
        let mut at = 0;
        for (len, codec) in &plan {
            let (packed, tag) = codec.pack(&space[at..at + len]);
            index.write_u32::<BigEndian>(*len as u32).unwrap();
            index.write_u32::<BigEndian>(packed.len() as u32).unwrap();
            index.write_u16::<BigEndian>(tag).unwrap();
            blocks.extend_from_slice(&packed);
            at += len;
        }

        index.write_i32::<BigEndian>(self.entries.len() as i32).unwrap();
        let mut offset = 0i64;
        for (name, flags, data) in &self.entries {
            index.write_i64::<BigEndian>(offset).unwrap();
            index.write_i64::<BigEndian>(data.len() as i64).unwrap();
            index.write_u32::<BigEndian>(*flags).unwrap();
            index.extend_from_slice(name.as_bytes());
            index.push(0);
            offset += data.len() as i64;
        }
        let (packed_index, index_tag) = self.index_codec.pack(&index);

        let mut out = Vec::new();
        out.extend_from_slice(b"UnityFS\0");
        out.write_u32::<BigEndian>(self.version).unwrap();
        out.extend_from_slice(b"5.x.x\0");
        out.extend_from_slice(self.engine.as_bytes());
        out.push(0);
        let fields_at = out.len();
        out.extend_from_slice(&[0u8; 20]);
        if self.version >= 7 || self.pad_header {
            pad16(&mut out);
        }

        let at_end = self.flags & INDEX_AT_END != 0;
        if !at_end {
            out.extend_from_slice(&packed_index);
        }
        if self.flags & BLOCK_PADDING != 0 {
            pad16(&mut out);
        }
        out.extend_from_slice(&blocks);
        if at_end {
            out.extend_from_slice(&packed_index);
        }

        let mut fields = Vec::new();
        fields.write_i64::<BigEndian>(out.len() as i64).unwrap();
        fields.write_u32::<BigEndian>(packed_index.len() as u32).unwrap();
        fields.write_u32::<BigEndian>(index.len() as u32).unwrap();
        fields.write_u32::<BigEndian>(self.flags | index_tag as u32).unwrap();
        out[fields_at..fields_at + 20].copy_from_slice(&fields);
        out
    }
}

fn pad16(out: &mut Vec<u8>) {
    out.resize((out.len() + 15) / 16 * 16, 0);
}
