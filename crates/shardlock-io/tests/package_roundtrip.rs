//! Packaging round-trips: encode through the writer factories, rediscover
//! from disk, and decode through the chunk readers.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use shardlock_io::{
    discover_collections, ArchiveChunkSink, ArchiveRegistry, CollectionChunks, FileChunkSink,
    Format,
};
use shardlock_pad::{CollectionStream, PadDecoder, PadEncoder, StreamEncoder};
use shardlock_testkit::CounterRng;

fn encode_to_dir(
    root: &std::path::Path,
    n: usize,
    k: usize,
    format: Format,
    data: &[u8],
    chunk_size: usize,
    archive: bool,
) {
    let pad = PadEncoder::new(n, k).unwrap();
    let encoder = StreamEncoder::new(chunk_size, format.tag());
    let rng = CounterRng::new(0);

    if archive {
        let registry = Arc::new(ArchiveRegistry::new());
        let archives: HashMap<_, PathBuf> = pad
            .labels()
            .iter()
            .map(|label| (*label, root.join(format!("{label}.tar"))))
            .collect();
        let mut sink = ArchiveChunkSink::new(Arc::clone(&registry), archives, format);
        encoder
            .encode(&pad, &mut Cursor::new(data.to_vec()), &rng, &mut sink)
            .unwrap();
        registry.finalize_all().unwrap();
    } else {
        let directories: HashMap<_, PathBuf> = pad
            .labels()
            .iter()
            .map(|label| (*label, root.join(label.to_string())))
            .collect();
        let mut sink = FileChunkSink::new(directories, format);
        encoder
            .encode(&pad, &mut Cursor::new(data.to_vec()), &rng, &mut sink)
            .unwrap();
    }
}

fn decode_from_dir(root: &std::path::Path, take: usize) -> Vec<u8> {
    let collections = discover_collections(&[root.to_path_buf()]).unwrap();
    let selected = &collections[..take.min(collections.len())];
    let readers: Vec<CollectionStream<CollectionChunks>> = selected
        .iter()
        .map(|c| CollectionStream::new(CollectionChunks::open(c).unwrap()))
        .collect();
    let decoder = PadDecoder::new(readers.len()).unwrap();
    let mut out = Vec::new();
    decoder.run(readers, &mut out).unwrap();
    out
}

#[test]
fn files_mode_bin_roundtrip() {
    let root = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    encode_to_dir(root.path(), 3, 2, Format::Bin, &data, 1024, false);

    let collections = discover_collections(&[root.path().to_path_buf()]).unwrap();
    assert_eq!(collections.len(), 3);
    assert!(collections.iter().all(|c| c.format == Format::Bin));

    assert_eq!(decode_from_dir(root.path(), 2), data);
    assert_eq!(decode_from_dir(root.path(), 3), data);
}

#[test]
fn files_mode_png_roundtrip() {
    let root = tempfile::tempdir().unwrap();
    let data = b"png wrapped threshold data".to_vec();
    encode_to_dir(root.path(), 3, 2, Format::Png, &data, 512, false);

    // Every chunk file is a valid PNG wrapper.
    let collections = discover_collections(&[root.path().to_path_buf()]).unwrap();
    for collection in &collections {
        for entry in std::fs::read_dir(&collection.path).unwrap() {
            let path = entry.unwrap().path();
            let bytes = std::fs::read(&path).unwrap();
            Format::Png.unwrap(&bytes).unwrap();
        }
    }

    assert_eq!(decode_from_dir(root.path(), 2), data);
}

#[test]
fn archive_mode_roundtrip_multi_chunk() {
    let root = tempfile::tempdir().unwrap();
    // 1025 bytes with a 512-byte chunk: two full chunks and one short.
    let data: Vec<u8> = (0..1025u32).map(|i| (i % 251) as u8).collect();
    encode_to_dir(root.path(), 3, 2, Format::Png, &data, 512, true);

    let collections = discover_collections(&[root.path().to_path_buf()]).unwrap();
    assert_eq!(collections.len(), 3);
    assert!(collections.iter().all(shardlock_io::Collection::is_archive));

    assert_eq!(decode_from_dir(root.path(), 2), data);
    assert_eq!(decode_from_dir(root.path(), 3), data);
}

#[test]
fn two_of_three_png_with_chunk_boundary() {
    let root = tempfile::tempdir().unwrap();
    // One byte past the default 2 MiB chunk size: two chunks, the second a
    // single byte.
    let data: Vec<u8> = (0..(2 * 1024 * 1024 + 1) as u32)
        .map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8)
        .collect();
    encode_to_dir(
        root.path(),
        3,
        2,
        Format::Png,
        &data,
        2 * 1024 * 1024,
        false,
    );

    let collections = discover_collections(&[root.path().to_path_buf()]).unwrap();
    assert_eq!(collections.len(), 3);
    for collection in &collections {
        let mut chunk_files: Vec<_> = std::fs::read_dir(&collection.path)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        chunk_files.sort();
        // Two chunks per collection, every wrapper carrying a valid rAWd chunk.
        assert_eq!(chunk_files.len(), 2, "collection {}", collection.label);
        for path in &chunk_files {
            let bytes = std::fs::read(path).unwrap();
            Format::Png.unwrap(&bytes).unwrap();
        }

        // A single bit flip inside the payload must fail the CRC.
        let mut tampered = std::fs::read(&chunk_files[0]).unwrap();
        let middle = tampered.len() / 2;
        tampered[middle] ^= 0x01;
        assert!(Format::Png.unwrap(&tampered).is_err());
    }

    assert_eq!(decode_from_dir(root.path(), 2), data);
}

#[test]
fn archive_and_directory_collections_mix() {
    let root = tempfile::tempdir().unwrap();
    let data = b"mixed packaging".to_vec();
    encode_to_dir(root.path(), 2, 2, Format::Bin, &data, 256, true);

    // Re-encode the same stream into a sibling directory layout and decode
    // one collection from each packaging.
    let dir_root = tempfile::tempdir().unwrap();
    encode_to_dir(dir_root.path(), 2, 2, Format::Bin, &data, 256, false);

    let mut collections = discover_collections(&[root.path().to_path_buf()]).unwrap();
    let dir_collections = discover_collections(&[dir_root.path().to_path_buf()]).unwrap();
    // Deterministic counter RNG makes the two encodes byte-identical, so
    // collection 2A2 from the tar and 2B2 from the directory still pair up.
    collections[1] = dir_collections[1].clone();

    let readers: Vec<CollectionStream<CollectionChunks>> = collections
        .iter()
        .map(|c| CollectionStream::new(CollectionChunks::open(c).unwrap()))
        .collect();
    let decoder = PadDecoder::new(readers.len()).unwrap();
    let mut out = Vec::new();
    decoder.run(readers, &mut out).unwrap();
    assert_eq!(out, data);
}
