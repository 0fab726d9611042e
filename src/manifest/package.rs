//! Writing adapted files into the extension output directory.
//!
//! Every write is recorded in [`SelfWrites`] so the output watcher can tell
//! our own writes from the bundler's and does not classify them as changes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::ManifestPatch;
use crate::utils::path::normalize_path;

/// Content hashes of files this process wrote last.
#[derive(Debug, Default)]
pub struct SelfWrites {
    hashes: Mutex<FxHashMap<PathBuf, blake3::Hash>>,
}

impl SelfWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `bytes` as our latest write to `path`.
    pub fn record(&self, path: &Path, bytes: &[u8]) {
        self.hashes
            .lock()
            .insert(normalize_path(path), blake3::hash(bytes));
    }

    /// Whether `path` still holds exactly what we last wrote there.
    ///
    /// Once the content diverges the entry is dropped.
    pub fn is_self_write(&self, path: &Path) -> bool {
        let key = normalize_path(path);
        let mut hashes = self.hashes.lock();
        let Some(expected) = hashes.get(&key).copied() else {
            return false;
        };
        match fs::read(&key) {
            Ok(bytes) if blake3::hash(&bytes) == expected => true,
            _ => {
                hashes.remove(&key);
                false
            }
        }
    }
}

/// Write the adapted manifest and background entry under `extension_dir`.
///
/// Files whose content is already identical are left untouched. Returns the
/// paths actually written.
pub fn write_patch(
    extension_dir: &Path,
    patch: &ManifestPatch,
    writes: &SelfWrites,
) -> io::Result<Vec<PathBuf>> {
    let files = [
        (extension_dir.join("manifest.json"), patch.manifest.as_bytes()),
        (
            extension_dir.join(&patch.background_path),
            patch.background_source.as_bytes(),
        ),
    ];

    let mut written = Vec::new();
    for (path, bytes) in files {
        if fs::read(&path).is_ok_and(|current| current == bytes) {
            writes.record(&path, bytes);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        writes.record(&path, bytes);
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestAdapter;

    #[test]
    fn test_write_patch_skips_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        let patch = ManifestAdapter::new("ws://127.0.0.1:8002")
            .adapt(r#"{"manifest_version":3}"#, "")
            .unwrap();
        let writes = SelfWrites::new();

        let first = write_patch(dir.path(), &patch, &writes).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("manifest.json")).unwrap(),
            patch.manifest
        );

        let second = write_patch(dir.path(), &patch, &writes).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_self_writes_detect_foreign_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let writes = SelfWrites::new();

        fs::write(&path, "ours").unwrap();
        writes.record(&path, b"ours");
        assert!(writes.is_self_write(&path));

        fs::write(&path, "bundler").unwrap();
        assert!(!writes.is_self_write(&path));

        // Entry dropped once diverged
        fs::write(&path, "ours").unwrap();
        assert!(!writes.is_self_write(&path));
    }
}
