//! Container-level tests: segments, entries and format detection.

mod common;

use std::sync::Arc;

use common::*;
use unityfs::catalog::{Category, NoLocator};
use unityfs::core::{ByteSource, FileSource};
use unityfs::{Archive, Error, OpenOptions};

fn open_bytes(bytes: Vec<u8>) -> unityfs::Result<Archive> {
    let source: Arc<dyn ByteSource> = Arc::new(FileSource::from_bytes(bytes));
    Archive::from_source(source, Arc::new(NoLocator), &OpenOptions::default())
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

#[test]
fn test_read_across_segments() {
    init_tracing();
    let data = pattern(150);
    let bytes = BundleBuilder::new()
        .entry("data.bin", data.clone())
        .segments(&[(100, Codec::Stored), (50, Codec::Lz4)])
        .build();

    let archive = open_bytes(bytes).expect("open bundle");
    let bundle = archive.bundle().expect("bundle");
    assert_eq!(bundle.segments().len(), 2);
    assert_eq!(bundle.virtual_size(), 150);
    assert_eq!(bundle.segments()[1].virtual_start, bundle.segments()[0].virtual_end());

    let middle = bundle.read_bytes(90, 30).expect("read across the boundary");
    assert_eq!(middle, &data[90..120]);

    // Not a serialized file, so it is listed as-is
    assert_eq!(archive.entries().len(), 1);
    let entry = &archive.entries()[0];
    assert_eq!(entry.name, "data.bin");
    assert_eq!(entry.category, Category::Other(0));
    assert_eq!(archive.read(entry).expect("read entry"), data);
}

#[test]
fn test_read_past_virtual_end() {
    let bytes = BundleBuilder::new().entry("data.bin", pattern(40)).build();
    let archive = open_bytes(bytes).expect("open bundle");
    let bundle = archive.bundle().expect("bundle");
    assert!(matches!(bundle.read_bytes(30, 20), Err(Error::UnexpectedEof(_))));
}

#[test]
fn test_compressed_serialized_entry() {
    init_tracing();
    let file = SerializedBuilder::new()
        .with_type(TEXT_ASSET, Some(text_asset_schema(0)))
        .with_object(1, 0, text_asset_object("notes", b"hello world"))
        .build();
    let split = 64;
    let rest = file.len() - split;
    let bytes = BundleBuilder::new()
        .entry("CAB-5d1e", file)
        .segments(&[(split, Codec::Lz4), (rest, Codec::Lz4)])
        .build();

    let archive = open_bytes(bytes).expect("open bundle");
    assert_eq!(archive.files().len(), 1);
    assert_eq!(archive.entries().len(), 1);

    let entry = &archive.entries()[0];
    assert_eq!(entry.name, "notes.txt");
    assert_eq!(entry.category, Category::Text);
    assert_eq!(archive.read(entry).expect("read text"), b"hello world");
}

#[test]
fn test_reads_are_repeatable() {
    let file = SerializedBuilder::new()
        .with_type(TEXT_ASSET, Some(text_asset_schema(0)))
        .with_object(1, 0, text_asset_object("a", b"first"))
        .with_object(2, 0, text_asset_object("b", b"second"))
        .build();
    let len = file.len();
    let bytes = BundleBuilder::new()
        .entry("CAB-1", file)
        .segments(&[(len / 2, Codec::Lz4), (len - len / 2, Codec::Stored)])
        .build();
    let archive = open_bytes(bytes).expect("open bundle");

    let entries: Vec<_> = archive.entries().iter().collect();
    let first: Vec<_> = archive.read_many(&entries).into_iter().map(|r| r.expect("read")).collect();
    let second: Vec<_> = archive.read_many(&entries).into_iter().map(|r| r.expect("read")).collect();
    assert_eq!(first, vec![b"first".to_vec(), b"second".to_vec()]);
    assert_eq!(first, second);
}

#[test]
fn test_garbage_is_format_mismatch() {
    let err = open_bytes(b"definitely not an asset container".to_vec()).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch(_)), "got {err:?}");

    let err = open_bytes(Vec::new()).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch(_)), "got {err:?}");
}

#[test]
fn test_truncated_bundle_is_format_mismatch() {
    let mut bytes = BundleBuilder::new().entry("data.bin", pattern(64)).build();
    bytes.truncate(bytes.len() - 10);
    let err = open_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch(_)), "got {err:?}");
}

#[test]
fn test_duplicate_identity_aborts() {
    let file = SerializedBuilder::new()
        .with_type(TEXT_ASSET, Some(text_asset_schema(0)))
        .with_object(42, 0, text_asset_object("a", b"x"))
        .with_object(42, 0, text_asset_object("b", b"y"))
        .build();

    let err = open_bytes(file.clone()).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(ref msg) if msg.contains("42")), "got {err:?}");

    let bundle = BundleBuilder::new().entry("CAB-dup", file).build();
    let err = open_bytes(bundle).unwrap_err();
    assert!(matches!(err, Error::CorruptIndex(_)), "got {err:?}");
}

#[test]
fn test_open_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("level0.bundle");
    let file = SerializedBuilder::new()
        .with_type(TEXT_ASSET, Some(text_asset_schema(0)))
        .with_object(7, 0, text_asset_object("readme", b"on disk"))
        .build();
    std::fs::write(&path, BundleBuilder::new().entry("CAB-disk", file).build()).expect("write bundle");

    for use_mmap in [true, false] {
        let archive = Archive::open_with(&path, &OpenOptions::new().use_mmap(use_mmap)).expect("open");
        let entry = &archive.entries()[0];
        assert_eq!(entry.name, "readme.txt");
        assert_eq!(archive.read(entry).expect("read"), b"on disk");
    }

    let err = Archive::open(dir.path().join("missing.bundle")).unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_) | Error::Io(_)), "got {err:?}");
}

fn read_single_entry(bytes: Vec<u8>) -> (unityfs::bundle::BundleHeader, Vec<u8>) {
    let archive = open_bytes(bytes).expect("open bundle");
    let header = archive.bundle().expect("bundle").header().clone();
    let data = archive.read(&archive.entries()[0]).expect("read entry");
    (header, data)
}

#[test]
fn test_index_at_end() {
    let data = pattern(90);
    let bytes = BundleBuilder::new()
        .flags(INDEX_AT_END)
        .entry("data.bin", data.clone())
        .segments(&[(60, Codec::Lz4), (30, Codec::Stored)])
        .build();
    let len = bytes.len() as u64;

    let (header, read) = read_single_entry(bytes);
    assert_eq!(header.index_offset, len - header.packed_index_size as u64);
    assert_eq!(header.data_offset, 64);
    assert_eq!(read, data);
}

#[test]
fn test_block_padding() {
    let data = pattern(70);
    for flags in [BLOCK_PADDING, BLOCK_PADDING | INDEX_AT_END] {
        let bytes = BundleBuilder::new().flags(flags).entry("data.bin", data.clone()).build();
        let (header, read) = read_single_entry(bytes);
        assert_eq!(header.data_offset % 16, 0, "flags {flags:#x}");
        assert_eq!(read, data, "flags {flags:#x}");
    }

    // Index right after the header leaves the blocks unaligned without the flag
    let bytes = BundleBuilder::new().entry("data.bin", data.clone()).build();
    let (header, _) = read_single_entry(bytes);
    assert_eq!(header.data_offset, header.index_offset + header.packed_index_size as u64);
}

#[test]
fn test_version6_zero_header_padding_is_skipped() {
    let data = pattern(40);
    let bytes = BundleBuilder::new().version(6).entry("data.bin", data.clone()).build();
    let (header, read) = read_single_entry(bytes);
    assert_eq!(header.version, 6);
    assert_eq!(header.index_offset, 64);
    assert_eq!(read, data);
}

#[test]
fn test_version6_nonzero_padding_rolls_back() {
    init_tracing();
    let data = pattern(40);
    // The index hash sits where padding would be, so the reader keeps the unaligned position
    let bytes = BundleBuilder::new()
        .version(6)
        .pad_header(false)
        .index_hash([0xAB; 16])
        .entry("data.bin", data.clone())
        .build();
    let (header, read) = read_single_entry(bytes);
    assert_eq!(header.index_offset, 49);
    assert_eq!(read, data);
}

#[test]
fn test_version6_old_engine_has_no_padding() {
    let data = pattern(40);
    let bytes = BundleBuilder::new()
        .version(6)
        .engine("2018.4.2f1")
        .pad_header(false)
        .entry("data.bin", data.clone())
        .build();
    let (header, read) = read_single_entry(bytes);
    assert_eq!(header.index_offset, 49);
    assert_eq!(read, data);
}

#[test]
fn test_compressed_block_index() {
    let data = pattern(120);
    for (codec, tag) in [(Codec::Lz4, 2), (Codec::Lzma, 1)] {
        let bytes = BundleBuilder::new()
            .index_codec(codec)
            .entry("data.bin", data.clone())
            .segments(&[(80, Codec::Lzma), (40, Codec::Lz4)])
            .build();
        let (header, read) = read_single_entry(bytes);
        assert_eq!(header.flags & 0x3F, tag, "{codec:?}");
        assert_eq!(read, data, "{codec:?}");
    }
}

#[test]
fn test_unknown_compression_tags_are_format_mismatch() {
    let bytes = BundleBuilder::new().index_codec(Codec::Tagged(5)).entry("data.bin", pattern(32)).build();
    let err = open_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch(ref msg) if msg.contains("index")), "got {err:?}");

    let bytes = BundleBuilder::new()
        .entry("data.bin", pattern(32))
        .segments(&[(16, Codec::Stored), (16, Codec::Tagged(9))])
        .build();
    let err = open_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch(ref msg) if msg.contains("segment")), "got {err:?}");
}
