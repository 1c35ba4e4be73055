// Copyright (C) 2026 the organ-sampler contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Cache blob store: one file per fingerprint under a cache directory, plus
//! an in-memory implementation for tests.
//!
//! The store deals in opaque byte blobs; serialization of the decoded data
//! lives with the pipe. A missing entry is `Ok(None)`, never an error, so a
//! cold cache reads as a sequence of ordinary misses.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use super::fingerprint::Digest;

/// Failure talking to the cache backend. Callers treat read errors as misses
/// with a warning; only the caller decides whether a write error matters.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait CacheReader {
    /// Reads the blob stored under a fingerprint. `Ok(None)` is a miss.
    fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>, CacheError>;
}

pub trait CacheWriter {
    /// Stores a blob under a fingerprint. Returns `false` when the write was
    /// skipped because an identical entry already exists.
    fn write(&self, digest: &Digest, blob: &[u8]) -> Result<bool, CacheError>;
}

/// File-backed store: `<dir>/<fingerprint-hex>.bin`. Writers are serialized
/// so concurrent rank loaders cannot interleave partial files; the write
/// itself goes through a temp file and rename, keeping readers safe from
/// half-written entries.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn entry_path(&self, digest: &Digest) -> PathBuf {
        self.dir.join(format!("{digest}.bin"))
    }
}

impl CacheReader for DiskCache {
    fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>, CacheError> {
        match std::fs::read(self.entry_path(digest)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CacheWriter for DiskCache {
    fn write(&self, digest: &Digest, blob: &[u8]) -> Result<bool, CacheError> {
        let _guard = self.write_lock.lock();

        let path = self.entry_path(digest);
        if path.exists() {
            debug!(fingerprint = %digest, "Cache entry already present, skipping write");
            return Ok(false);
        }

        let tmp = path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &path)?;
        debug!(fingerprint = %digest, bytes = blob.len(), "Cache entry written");
        Ok(true)
    }
}

/// In-memory store used by tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Digest, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Overwrites an entry with arbitrary bytes, for corruption tests.
    pub fn corrupt(&self, digest: &Digest, bytes: Vec<u8>) {
        self.entries.lock().insert(*digest, bytes);
    }
}

impl CacheReader for MemoryCache {
    fn read(&self, digest: &Digest) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries.lock().get(digest).cloned())
    }
}

impl CacheWriter for MemoryCache {
    fn write(&self, digest: &Digest, blob: &[u8]) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(digest) {
            return Ok(false);
        }
        entries.insert(*digest, blob.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(fill: u8) -> Digest {
        Digest([fill; 32])
    }

    #[test]
    fn test_disk_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache")).unwrap();

        let d = digest(1);
        assert!(cache.read(&d).unwrap().is_none());
        assert!(cache.write(&d, b"decoded pipe data").unwrap());
        assert_eq!(cache.read(&d).unwrap().unwrap(), b"decoded pipe data");
    }

    #[test]
    fn test_disk_cache_skips_duplicate_write() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();

        let d = digest(2);
        assert!(cache.write(&d, b"first").unwrap());
        assert!(!cache.write(&d, b"second").unwrap());
        // The original entry survives.
        assert_eq!(cache.read(&d).unwrap().unwrap(), b"first");
    }

    #[test]
    fn test_disk_cache_entries_keyed_by_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();

        cache.write(&digest(3), b"a").unwrap();
        cache.write(&digest(4), b"b").unwrap();
        assert_eq!(cache.read(&digest(3)).unwrap().unwrap(), b"a");
        assert_eq!(cache.read(&digest(4)).unwrap().unwrap(), b"b");
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryCache::new();
        let d = digest(5);
        assert!(cache.read(&d).unwrap().is_none());
        assert!(cache.write(&d, b"x").unwrap());
        assert!(!cache.write(&d, b"y").unwrap());
        assert_eq!(cache.read(&d).unwrap().unwrap(), b"x");
        assert_eq!(cache.len(), 1);
    }
}
