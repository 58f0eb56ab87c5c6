//! Fixed-layout readers for the few classes the catalog needs to look into.
//!
//! Mostly used when a file carries no schema. Layouts depend on the
//! engine version that wrote the file, so most readers need a known one.
//! Texture, audio and video readers have counterparts working on a
//! generically decoded [`Value`], and both paths produce the same
//! [`PayloadHeader`]. The manifest and text asset layouts hold fixed-size
//! records the generic walk leaves opaque, so they are always read by hand.

use super::decoder::{stream_offset_width, MAX_STRING_LEN};
use super::value::{StreamingPointer, Value};
use crate::bundle::base_name;
use crate::serialized::format::{pptr_path_id_width, VALUE_ALIGNMENT};
use crate::util::{Endian, EndianReader, EngineVersion, Error, Result};

/// Layout parameters shared by the readers.
#[derive(Clone, Copy, Debug)]
pub struct ReadContext {
    pub endian: Endian,
    /// Serialized file format version.
    pub format: u32,
    pub engine: Option<EngineVersion>,
}

impl ReadContext {
    fn engine(&self, class: &str) -> Result<EngineVersion> {
        match self.engine {
            Some(v) if !v.is_unknown() => Ok(v),
            _ => Err(Error::invalid(format!("{class} layout needs a known engine version"))),
        }
    }
}

/// Where an object's payload bytes live.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayloadHeader {
    pub name: String,
    /// Inline byte range relative to the object start.
    pub inline: Option<(u64, u64)>,
    pub stream: Option<StreamingPointer>,
}

/// One `m_Container` row of an asset bundle manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub asset_path: String,
    pub file_id: i32,
    pub path_id: i64,
}

// ============================================================================
// Shared pieces
// ============================================================================

fn read_aligned_string(r: &mut EndianReader<'_>) -> Result<String> {
    let s = r.read_string(MAX_STRING_LEN)?;
    r.align(VALUE_ALIGNMENT)?;
    Ok(s)
}

fn read_path_id(r: &mut EndianReader<'_>, format: u32) -> Result<i64> {
    if pptr_path_id_width(format) == 8 {
        r.read_i64()
    } else {
        Ok(r.read_i32()? as i64)
    }
}

fn read_count(r: &mut EndianReader<'_>, min_element: u64, what: &str) -> Result<usize> {
    let count = r.read_i32()?;
    if count < 0 || count as u64 * min_element > r.remaining() {
        return Err(Error::invalid(format!("bad {what} count {count}")));
    }
    Ok(count as usize)
}

fn non_empty(offset: u64, len: u64) -> Option<(u64, u64)> {
    (len > 0).then_some((offset, len))
}

fn external(pointer: StreamingPointer) -> Option<StreamingPointer> {
    pointer.is_external().then_some(pointer)
}

/// Peek the `m_Name` string leading every named object.
pub fn read_leading_name(data: &[u8], endian: Endian) -> Result<String> {
    EndianReader::new(data, endian).read_string(MAX_STRING_LEN)
}

// ============================================================================
// AssetBundle manifest
// ============================================================================

/// Read the container table of an `AssetBundle` object.
pub fn read_manifest(data: &[u8], ctx: &ReadContext) -> Result<Vec<ManifestEntry>> {
    let mut r = EndianReader::new(data, ctx.endian);
    let pptr_size = 4 + pptr_path_id_width(ctx.format) as u64;

    read_aligned_string(&mut r)?;
    let preload = read_count(&mut r, pptr_size, "preload")?;
    r.skip(preload as u64 * pptr_size)?;

    let count = read_count(&mut r, 12 + pptr_size, "container")?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let asset_path = read_aligned_string(&mut r)?;
        let _preload_index = r.read_i32()?;
        let _preload_size = r.read_i32()?;
        let file_id = r.read_i32()?;
        let path_id = read_path_id(&mut r, ctx.format)?;
        entries.push(ManifestEntry { asset_path, file_id, path_id });
    }
    Ok(entries)
}

// ============================================================================
// TextAsset
// ============================================================================

/// Name and script byte range of a `TextAsset`.
///
/// Only the header is read, so `data` may be a prefix of the object; the
/// returned range is not checked against it.
pub fn read_text_asset(data: &[u8], endian: Endian) -> Result<PayloadHeader> {
    let mut r = EndianReader::new(data, endian);
    let name = read_aligned_string(&mut r)?;
    let len = r.read_u32()? as u64;
    Ok(PayloadHeader { name, inline: Some((r.position(), len)), stream: None })
}

// ============================================================================
// Texture2D
// ============================================================================

/// Texture name, inline image range and streamed image pointer.
pub fn read_texture(data: &[u8], ctx: &ReadContext) -> Result<PayloadHeader> {
    let v = ctx.engine("Texture2D")?;
    let mut r = EndianReader::new(data, ctx.endian);
    let name = read_aligned_string(&mut r)?;

    if v.at_least(2017, 3) {
        if !v.at_least(2023, 2) {
            r.read_i32()?; // forced fallback format
            r.read_bool()?; // downscale fallback
        }
        if v.at_least(2020, 2) {
            r.read_bool()?; // alpha channel optional
        }
        r.align(VALUE_ALIGNMENT)?;
    }
    let _width = r.read_i32()?;
    let _height = r.read_i32()?;
    let _complete_size = r.read_i32()?;
    if v.at_least(2020, 1) {
        r.read_i32()?; // mips stripped
    }
    let _format = r.read_i32()?;
    if v.at_least(5, 2) {
        r.read_i32()?; // mip count
    } else {
        r.read_bool()?; // mip map
    }
    if v.at_least(2, 6) {
        r.read_bool()?; // readable
    }
    if v.at_least(2020, 1) {
        r.read_bool()?; // preprocessed
    }
    if v.at_least(2019, 3) && !v.at_least(2022, 2) {
        r.read_bool()?; // ignore master texture limit
    }
    if v.at_least(2022, 2) {
        r.read_bool()?; // ignore mipmap limit
        r.align(VALUE_ALIGNMENT)?;
        read_aligned_string(&mut r)?; // mipmap limit group
    }
    if v.at_least(3, 0) && !v.at_least(5, 5) {
        r.read_bool()?; // read allowed
    }
    if v.at_least(2018, 2) {
        r.read_bool()?; // streaming mipmaps
    }
    r.align(VALUE_ALIGNMENT)?;
    if v.at_least(2018, 2) {
        r.read_i32()?; // streaming priority
    }
    r.read_i32()?; // image count
    r.read_i32()?; // dimension

    // texture settings
    r.read_i32()?;
    r.read_i32()?;
    r.read_f32()?;
    r.read_i32()?;
    if v.major >= 2017 {
        r.read_i32()?;
        r.read_i32()?;
    }
    if v.at_least(3, 0) {
        r.read_i32()?; // lightmap format
    }
    if v.at_least(3, 5) {
        r.read_i32()?; // color space
    }
    if v.at_least(2020, 2) {
        let blob = r.read_u32()? as u64;
        r.skip(blob)?;
        r.align(VALUE_ALIGNMENT)?;
    }

    let len = r.read_u32()? as u64;
    let offset = r.position();
    r.skip(len)?;

    let mut stream = None;
    if v.at_least(5, 3) {
        r.align(VALUE_ALIGNMENT)?;
        stream = external(read_streaming_info(&mut r, v)?);
    }
    Ok(PayloadHeader { name, inline: non_empty(offset, len), stream })
}

fn read_streaming_info(r: &mut EndianReader<'_>, engine: EngineVersion) -> Result<StreamingPointer> {
    let offset = if stream_offset_width(engine) == 8 {
        r.read_u64()?
    } else {
        r.read_u32()? as u64
    };
    let size = r.read_u32()? as u64;
    let path = read_aligned_string(r)?;
    Ok(StreamingPointer { path, offset, size })
}

/// Texture payload from a generically decoded `Texture2D`.
pub fn texture_from_value(value: &Value) -> Option<PayloadHeader> {
    let name = value.field("m_Name")?.as_str()?.to_owned();
    let inline = value
        .field("image data")
        .and_then(Value::as_blob)
        .and_then(|(offset, len)| non_empty(offset, len));
    let stream = value
        .field("m_StreamData")
        .and_then(Value::as_streaming_info)
        .cloned()
        .and_then(external);
    Some(PayloadHeader { name, inline, stream })
}

// ============================================================================
// AudioClip
// ============================================================================

/// Audio clip name and its streamed sample data.
pub fn read_audio_clip(data: &[u8], ctx: &ReadContext) -> Result<PayloadHeader> {
    let v = ctx.engine("AudioClip")?;
    if v.major < 5 {
        return Err(Error::invalid(format!("AudioClip layout of engine {v} is not supported")));
    }
    let mut r = EndianReader::new(data, ctx.endian);
    let name = read_aligned_string(&mut r)?;
    r.read_i32()?; // load type
    r.read_i32()?; // channels
    r.read_i32()?; // frequency
    r.read_i32()?; // bits per sample
    r.read_f32()?; // length
    r.read_bool()?; // tracker format
    if v.major >= 2017 {
        r.read_bool()?; // ambisonic
    }
    r.align(VALUE_ALIGNMENT)?;
    r.read_i32()?; // subsound index
    r.read_bool()?;
    r.read_bool()?;
    r.read_bool()?;
    r.align(VALUE_ALIGNMENT)?;
    let stream = read_streamed_resource(&mut r)?;
    Ok(PayloadHeader { name, inline: None, stream: external(stream) })
}

fn read_streamed_resource(r: &mut EndianReader<'_>) -> Result<StreamingPointer> {
    let path = read_aligned_string(r)?;
    let offset = r.read_u64()?;
    let size = r.read_u64()?;
    Ok(StreamingPointer { path, offset, size })
}

/// Audio payload from a generically decoded `AudioClip`.
///
/// Older clips keep samples inline in `m_AudioData`.
pub fn audio_clip_from_value(value: &Value) -> Option<PayloadHeader> {
    let name = value.field("m_Name")?.as_str()?.to_owned();
    let stream = value
        .field("m_Resource")
        .and_then(Value::as_streamed_resource)
        .and_then(external);
    let inline = value
        .field("m_AudioData")
        .and_then(Value::as_blob)
        .and_then(|(offset, len)| non_empty(offset, len));
    Some(PayloadHeader { name, inline, stream })
}

// ============================================================================
// VideoClip
// ============================================================================

/// Video clip named after its source file, with the streamed movie data.
pub fn read_video_clip(data: &[u8], ctx: &ReadContext) -> Result<PayloadHeader> {
    let v = ctx.engine("VideoClip")?;
    let mut r = EndianReader::new(data, ctx.endian);
    let object_name = read_aligned_string(&mut r)?;
    let original_path = read_aligned_string(&mut r)?;
    r.skip(16)?; // proxy and actual dimensions
    if v.major >= 2017 {
        r.skip(8)?; // pixel aspect ratio
    }
    r.read_f64()?; // frame rate
    r.read_u64()?; // frame count
    r.read_i32()?; // format

    let channels = read_count(&mut r, 2, "audio channel")?;
    r.skip(channels as u64 * 2)?;
    r.align(VALUE_ALIGNMENT)?;
    let rates = read_count(&mut r, 4, "sample rate")?;
    r.skip(rates as u64 * 4)?;
    let languages = read_count(&mut r, 4, "language")?;
    for _ in 0..languages {
        read_aligned_string(&mut r)?;
    }
    if v.major >= 2020 {
        let pptr_size = 4 + pptr_path_id_width(ctx.format) as u64;
        let shaders = read_count(&mut r, pptr_size, "shader")?;
        r.skip(shaders as u64 * pptr_size)?;
    }
    let stream = read_streamed_resource(&mut r)?;

    Ok(PayloadHeader {
        name: video_name(&original_path, object_name),
        inline: None,
        stream: external(stream),
    })
}

fn video_name(original_path: &str, object_name: String) -> String {
    match base_name(original_path) {
        "" => object_name,
        file => file.to_owned(),
    }
}

/// Video payload from a generically decoded `VideoClip`.
pub fn video_clip_from_value(value: &Value) -> Option<PayloadHeader> {
    let object_name = value.field("m_Name")?.as_str()?.to_owned();
    let original_path = value.field("m_OriginalPath").and_then(Value::as_str).unwrap_or("");
    let stream = value
        .field("m_ExternalResources")
        .and_then(Value::as_streamed_resource)
        .and_then(external);
    Some(PayloadHeader { name: video_name(original_path, object_name), inline: None, stream })
}
