//! Test support for the shardlock workspace.
//!
//! This crate is a dev-dependency everywhere it is used: keeping
//! [`CounterRng`] here guarantees the deterministic generator can never be
//! reached from a production code path.

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use shardlock_rng::{EntropyError, EntropySource};

/// Deterministic counter-filler entropy source.
///
/// Fills buffers with `start, start+1, start+2, ... mod 256`, continuing
/// across calls. Two instances created with the same start value produce
/// identical byte streams, which makes encodings reproducible in tests.
pub struct CounterRng {
    counter: Mutex<u8>,
}

impl CounterRng {
    #[must_use]
    pub fn new(start: u8) -> Self {
        Self {
            counter: Mutex::new(start),
        }
    }
}

impl EntropySource for CounterRng {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), EntropyError> {
        let mut counter = self.counter.lock();
        for byte in buf.iter_mut() {
            *byte = *counter;
            *counter = counter.wrapping_add(1);
        }
        Ok(())
    }
}

/// Write a small directory tree under `root`.
///
/// `files` maps relative paths to contents; intermediate directories are
/// created as needed.
///
/// # Panics
///
/// Panics on any filesystem error; fixtures run under `tempfile` roots.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
    }
}

/// Collect every regular file under `root` as `(relative path, contents)`,
/// sorted by path.
///
/// # Panics
///
/// Panics on any filesystem error.
#[must_use]
pub fn read_tree(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files);
    files.sort();
    files
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let file_type = entry.file_type().unwrap();
        if file_type.is_dir() {
            collect_files(root, &path, out);
        } else if file_type.is_file() {
            let rel = path.strip_prefix(root).unwrap().to_path_buf();
            out.push((rel, fs::read(&path).unwrap()));
        }
    }
}

/// Assert two directory trees contain identical regular files.
///
/// # Panics
///
/// Panics when the trees differ.
pub fn assert_trees_equal(expected: &Path, actual: &Path) {
    let expected_files = read_tree(expected);
    let actual_files = read_tree(actual);
    let expected_names: Vec<_> = expected_files.iter().map(|(p, _)| p.clone()).collect();
    let actual_names: Vec<_> = actual_files.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(expected_names, actual_names, "tree file sets differ");
    for ((path, want), (_, got)) in expected_files.iter().zip(actual_files.iter()) {
        assert_eq!(want, got, "contents differ for {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_sequence_is_deterministic() {
        let rng = CounterRng::new(0);
        let mut buf = [0u8; 8];
        rng.fill(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);
        rng.fill(&mut buf).unwrap();
        assert_eq!(buf, [8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn counter_wraps_at_256() {
        let rng = CounterRng::new(254);
        let mut buf = [0u8; 4];
        rng.fill(&mut buf).unwrap();
        assert_eq!(buf, [254, 255, 0, 1]);
    }

    #[test]
    fn tree_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.txt", b"alpha"), ("sub/b.bin", &[0, 1, 2])]);
        let files = read_tree(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].1, b"alpha");
        assert_trees_equal(dir.path(), dir.path());
    }
}
