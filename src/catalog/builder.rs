//! Turning object tables into named, categorized asset entries.

use std::collections::HashMap;

use super::category::{class, class_label, extension, is_structural, Category};
use super::entry::{AssetEntry, PayloadSource, PayloadTransform, OBFUSCATED_PNG_SIGNATURE, PNG_SIGNATURE};
use super::resolve::strip_scheme;
use crate::bundle::{BundleFile, ContainerEntry};
use crate::core::ByteSource;
use crate::decode::readers::{self, ManifestEntry};
use crate::decode::{decode_object, PayloadHeader, ReadContext, StreamingPointer, Value};
use crate::serialized::{ObjectDescriptor, SerializedFile, TypeNode};
use crate::util::{Error, Result};

/// `m_Script` flag marking obfuscated text asset payloads.
const OBFUSCATED_SCRIPT_FLAG: i32 = 0x0400_0000;

/// Bytes read from an object when only its leading name is needed.
const NAME_PEEK_BYTES: u64 = 1024;

/// Characters replaced in names taken from object data.
const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Builds catalog entries for the serialized files of one archive.
pub struct CatalogBuilder<'a> {
    bundle: Option<&'a BundleFile>,
    label: Option<&'a str>,
}

/// Payload location found by a class reader.
struct Located {
    name: String,
    source: PayloadSource,
    transform: PayloadTransform,
    category: Option<Category>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(bundle: Option<&'a BundleFile>, label: Option<&'a str>) -> Self {
        Self { bundle, label }
    }

    /// Entries for every non-structural object of one serialized file.
    pub fn file_entries(&self, file_index: usize, file: &SerializedFile) -> Vec<AssetEntry> {
        let ctx = ReadContext {
            endian: file.endian(),
            format: file.format(),
            engine: file.engine().or_else(|| self.bundle.and_then(|b| b.header().engine())),
        };
        let names = manifest_names(file, &ctx);

        let entries: Vec<_> = file
            .objects()
            .iter()
            .filter(|o| !is_structural(o.class_id))
            .map(|o| self.object_entry(file_index, file, o, &ctx, &names))
            .collect();
        tracing::debug!(file = file_index, entries = entries.len(), named = names.len(), "catalog built");
        entries
    }

    fn object_entry(
        &self,
        file_index: usize,
        file: &SerializedFile,
        object: &ObjectDescriptor,
        ctx: &ReadContext,
        names: &HashMap<i64, String>,
    ) -> AssetEntry {
        let schema = file.schema(object.type_id);
        if schema.is_none() && file.has_type_trees() {
            tracing::warn!(
                path_id = object.path_id,
                type_id = object.type_id,
                class = %class_label(object.class_id),
                "no schema for object"
            );
        }

        let whole = PayloadSource::Inline { offset: object.offset, size: object.size as u64 };
        let located = match self.locate(file, object, schema, ctx) {
            Ok(located) => located,
            Err(e) => {
                tracing::warn!(
                    path_id = object.path_id,
                    class = %class_label(object.class_id),
                    error = %e,
                    "payload header unreadable, using the whole object"
                );
                None
            }
        };
        let (header_name, source, transform, category) = match located {
            Some(l) => (l.name, l.source, l.transform, l.category),
            None => (String::new(), whole, PayloadTransform::None, None),
        };

        let name = names
            .get(&object.path_id)
            .cloned()
            .or_else(|| Some(sanitize(&header_name)).filter(|n| !n.is_empty()))
            .or_else(|| peek_name(file, object, schema))
            .unwrap_or_else(|| synthesized_name(self.label, object.path_id));

        let category = category.unwrap_or_else(|| {
            let by_class = Category::from_class_id(object.class_id);
            match Category::from_name(&name) {
                Some(c @ (Category::Image | Category::Audio)) if object.class_id == class::TEXT_ASSET => c,
                _ => by_class,
            }
        });

        AssetEntry {
            name: with_extension(name, category),
            category,
            source,
            transform,
            object: Some(*object),
            file: Some(file_index),
            decodable: schema.is_some(),
        }
    }

    /// Run the class reader for classes whose payload is not the whole object.
    fn locate(
        &self,
        file: &SerializedFile,
        object: &ObjectDescriptor,
        schema: Option<&TypeNode>,
        ctx: &ReadContext,
    ) -> Result<Option<Located>> {
        type HandReader = fn(&[u8], &ReadContext) -> Result<PayloadHeader>;
        type ValueReader = fn(&Value) -> Option<PayloadHeader>;

        let (by_hand, by_value): (HandReader, ValueReader) = match object.class_id {
            class::TEXT_ASSET => return locate_text_asset(file, object, schema, ctx).map(Some),
            class::TEXTURE_2D => (readers::read_texture, readers::texture_from_value),
            class::AUDIO_CLIP => (readers::read_audio_clip, readers::audio_clip_from_value),
            class::VIDEO_CLIP => (readers::read_video_clip, readers::video_clip_from_value),
            _ => return Ok(None),
        };

        let data = file.read_object(object)?;
        let header = match schema {
            Some(root) => {
                let value = decode_object(root, &data, ctx.endian, ctx.engine)?;
                by_value(&value).ok_or_else(|| Error::invalid(format!("{} lacks payload fields", root.type_name)))?
            }
            None => by_hand(&data, ctx)?,
        };

        let fallback = header.inline.map(|(offset, len)| (object.offset + offset, len));
        let source = match (header.stream, fallback) {
            (Some(pointer), _) => self.stream_source(pointer, fallback),
            (None, Some((offset, size))) => PayloadSource::Inline { offset, size },
            (None, None) => PayloadSource::Inline { offset: object.offset, size: object.size as u64 },
        };
        Ok(Some(Located { name: header.name, source, transform: PayloadTransform::None, category: None }))
    }

    /// Match a streaming pointer against the container's own entries; the
    /// rest is left for lazy lookup at read time.
    fn stream_source(&self, pointer: StreamingPointer, fallback: Option<(u64, u64)>) -> PayloadSource {
        let name = strip_scheme(&pointer.path);
        if let Some(entry) = self.bundle.and_then(|b| b.entry_by_name(name)) {
            tracing::debug!(path = %pointer.path, entry, "payload in container entry");
            return PayloadSource::ContainerEntry { entry, offset: pointer.offset, size: pointer.size };
        }
        tracing::debug!(path = %pointer.path, "payload outside the container");
        PayloadSource::External { pointer, fallback }
    }
}

/// Entry listing a container entry as-is.
pub fn raw_entry(index: usize, entry: &ContainerEntry) -> AssetEntry {
    AssetEntry {
        name: entry.name.clone(),
        category: Category::from_name(&entry.name).unwrap_or(Category::Other(0)),
        source: PayloadSource::ContainerEntry { entry: index, offset: 0, size: entry.size },
        transform: PayloadTransform::None,
        object: None,
        file: None,
        decodable: false,
    }
}

fn locate_text_asset(
    file: &SerializedFile,
    object: &ObjectDescriptor,
    schema: Option<&TypeNode>,
    ctx: &ReadContext,
) -> Result<Located> {
    let data = read_prefix(file, object, NAME_PEEK_BYTES + 8)?;
    let header = readers::read_text_asset(&data, ctx.endian)?;
    let (offset, size) = header.inline.unwrap_or_default();
    if offset + size > object.size as u64 {
        return Err(Error::invalid(format!("text asset payload of {size} bytes overruns its object")));
    }

    let flagged = schema
        .and_then(|s| s.child("m_Script"))
        .map_or(false, |n| n.flags & OBFUSCATED_SCRIPT_FLAG != 0);
    let (transform, category) = script_kind(flagged, data.get(offset as usize..));

    Ok(Located {
        name: header.name,
        source: PayloadSource::Inline { offset: object.offset + offset, size },
        transform,
        category,
    })
}

/// Transform and category of a text asset script from its flag and leading bytes.
///
/// Flagged scripts are obfuscated unless they already start with a PNG
/// signature; an obfuscated PNG signature marks an image.
fn script_kind(flagged: bool, script: Option<&[u8]>) -> (PayloadTransform, Option<Category>) {
    if !flagged {
        return (PayloadTransform::None, None);
    }
    match script.and_then(|s| s.get(..4)) {
        Some(head) if head == &PNG_SIGNATURE[..] => (PayloadTransform::None, Some(Category::Image)),
        Some(head) if head == &OBFUSCATED_PNG_SIGNATURE[..] => (PayloadTransform::MsvcRandXor, Some(Category::Image)),
        _ => (PayloadTransform::MsvcRandXor, None),
    }
}

/// Up to `limit` leading bytes of an object.
fn read_prefix(file: &SerializedFile, object: &ObjectDescriptor, limit: u64) -> Result<Vec<u8>> {
    let len = limit.min(object.size as u64);
    file.object_region(object)?.read_bytes(0, len as usize)
}

/// Read the `m_Name` an object's schema says it starts with.
fn peek_name(file: &SerializedFile, object: &ObjectDescriptor, schema: Option<&TypeNode>) -> Option<String> {
    if !schema.map_or(false, TypeNode::has_leading_name) {
        return None;
    }
    let name = read_prefix(file, object, NAME_PEEK_BYTES)
        .and_then(|data| readers::read_leading_name(&data, file.endian()));
    match name {
        Ok(name) => Some(sanitize(&name)).filter(|n| !n.is_empty()),
        Err(e) => {
            tracing::debug!(path_id = object.path_id, error = %e, "cannot read object name");
            None
        }
    }
}

/// Container names keyed by path id, from the file's bundle manifest.
fn manifest_names(file: &SerializedFile, ctx: &ReadContext) -> HashMap<i64, String> {
    let mut names = HashMap::new();
    let Some(manifest) = file.objects().iter().find(|o| o.class_id == class::ASSET_BUNDLE) else {
        return names;
    };
    let rows: Result<Vec<ManifestEntry>> = file
        .read_object(manifest)
        .and_then(|data| readers::read_manifest(&data, ctx));
    match rows {
        Ok(rows) => {
            for row in rows.into_iter().filter(|r| r.file_id == 0) {
                names.insert(row.path_id, shorten_path(&row.asset_path).to_owned());
            }
        }
        Err(e) => tracing::warn!(path_id = manifest.path_id, error = %e, "unreadable bundle manifest"),
    }
    names
}

/// Keep the last two components of a container path.
pub fn shorten_path(path: &str) -> &str {
    let mut slashes = path.rmatch_indices('/').map(|(i, _)| i);
    match (slashes.next(), slashes.next()) {
        (Some(_), Some(cut)) => &path[cut + 1..],
        _ => path,
    }
}

/// Replace characters file systems reject.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if HOSTILE_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect()
}

/// Name for an object with nothing better: its identity in hex.
pub fn synthesized_name(label: Option<&str>, path_id: i64) -> String {
    match label {
        Some(label) => format!("{label}_{:016X}", path_id as u64),
        None => format!("{:016X}", path_id as u64),
    }
}

/// Append the category's extension when the name has none.
pub fn with_extension(name: String, category: Category) -> String {
    match category.extension() {
        Some(ext) if extension(&name).is_none() => format!("{name}.{ext}"),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_kind() {
        let png = b"\x89PNG\r\n\x1a\n".to_vec();
        let mut hidden = png.clone();
        PayloadTransform::MsvcRandXor.apply(&mut hidden);

        assert_eq!(script_kind(false, Some(&hidden[..])), (PayloadTransform::None, None));
        assert_eq!(script_kind(true, Some(&png[..])), (PayloadTransform::None, Some(Category::Image)));
        assert_eq!(script_kind(true, Some(&hidden[..])), (PayloadTransform::MsvcRandXor, Some(Category::Image)));
        assert_eq!(script_kind(true, Some(&b"key = 1"[..])), (PayloadTransform::MsvcRandXor, None));
        assert_eq!(script_kind(true, Some(&b"\x89P"[..])), (PayloadTransform::MsvcRandXor, None));
        assert_eq!(script_kind(true, None), (PayloadTransform::MsvcRandXor, None));
    }

    #[test]
    fn test_shorten_path() {
        assert_eq!(shorten_path("assets/ui/icons/close.png"), "icons/close.png");
        assert_eq!(shorten_path("icons/close.png"), "icons/close.png");
        assert_eq!(shorten_path("close.png"), "close.png");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("hero/diffuse:2"), "hero_diffuse_2");
        assert_eq!(sanitize("tab\there"), "tab_here");
        assert_eq!(sanitize("plain name"), "plain name");
    }

    #[test]
    fn test_synthesized_name() {
        assert_eq!(synthesized_name(None, 42), "000000000000002A");
        assert_eq!(synthesized_name(Some("level0"), 255), "level0_00000000000000FF");
        assert_eq!(synthesized_name(None, -1), "FFFFFFFFFFFFFFFF");
    }

    #[test]
    fn test_with_extension() {
        assert_eq!(with_extension("hero".into(), Category::Image), "hero.png");
        assert_eq!(with_extension("hero.jpg".into(), Category::Image), "hero.jpg");
        assert_eq!(with_extension("theme".into(), Category::Audio), "theme.wav");
        assert_eq!(with_extension("thing".into(), Category::Other(5)), "thing");
    }

    #[test]
    fn test_raw_entry() {
        let entry = ContainerEntry { offset: 0, size: 10, flags: 4, name: "CAB-1.resS".into() };
        let raw = raw_entry(3, &entry);
        assert_eq!(raw.category, Category::Other(0));
        assert_eq!(raw.source, PayloadSource::ContainerEntry { entry: 3, offset: 0, size: 10 });
        assert!(!raw.decodable);

        let entry = ContainerEntry { offset: 0, size: 10, flags: 0, name: "intro.mp4".into() };
        assert_eq!(raw_entry(0, &entry).category, Category::Video);
    }
}
