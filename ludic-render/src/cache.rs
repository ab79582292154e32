// SPDX-License-Identifier: LGPL-3.0-only

//! The persistent on-disk cache tier.
//!
//! A [`DiskCache`] is a string-keyed store of byte arrays on the
//! filesystem, with a configurable total-size budget enforced by evicting
//! the entries touched least recently. One instance is opened per active
//! theme, under a directory named after the theme, so switching themes
//! simply makes the old entries unreachable.
//!
//! Store trouble is never fatal: corrupt or unreadable entries behave as
//! cache misses.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bincode::{Decode, Encode};
use resvg::tiny_skia;

/// Raw image payload as stored on disk: premultiplied RGBA bytes.
#[derive(Encode, Decode)]
struct ImagePayload {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// A size-budgeted on-disk key-value store.
pub struct DiskCache {
    root: PathBuf,
    budget_bytes: u64,
}

impl DiskCache {
    /// Open (or create) a cache directory with the given byte budget.
    pub fn open(root: impl Into<PathBuf>, budget_bytes: u64) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, budget_bytes })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Hex-encoded key as the file name: collision-free and free of
        // filesystem-hostile characters.
        let mut name = String::with_capacity(key.len() * 2);
        for byte in key.bytes() {
            let _ = write!(name, "{byte:02x}");
        }
        self.root.join(name)
    }

    /// Look up raw bytes for a key.
    pub fn find(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        match std::fs::read(&path) {
            Ok(data) => {
                touch(&path);
                Some(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("disk cache read failed for {path:?}: {e}");
                None
            }
        }
    }

    /// Store raw bytes under a key, then enforce the size budget.
    pub fn insert(&mut self, key: &str, value: &[u8]) {
        let path = self.entry_path(key);
        if let Err(e) = std::fs::write(&path, value) {
            log::warn!("disk cache write failed for {path:?}: {e}");
            return;
        }
        self.enforce_budget();
    }

    /// Typed convenience: look up a raw rendered image.
    pub fn find_image(&self, key: &str) -> Option<tiny_skia::Pixmap> {
        let bytes = self.find(key)?;
        let (payload, _): (ImagePayload, usize) =
            match bincode::decode_from_slice(&bytes, bincode::config::standard()) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("corrupt image cache entry for '{key}': {e}");
                    return None;
                }
            };
        let size = tiny_skia::IntSize::from_wh(payload.width, payload.height)?;
        tiny_skia::Pixmap::from_vec(payload.data, size)
    }

    /// Typed convenience: store a raw rendered image.
    pub fn insert_image(&mut self, key: &str, image: &tiny_skia::Pixmap) {
        let payload = ImagePayload {
            width: image.width(),
            height: image.height(),
            data: image.data().to_vec(),
        };
        match bincode::encode_to_vec(&payload, bincode::config::standard()) {
            Ok(bytes) => self.insert(key, &bytes),
            Err(e) => log::warn!("failed to encode image cache entry for '{key}': {e}"),
        }
    }

    /// Evict least-recently-touched entries until within budget.
    fn enforce_budget(&mut self) {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return;
        };
        let mut files: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
        let mut total = 0u64;
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            total += meta.len();
            files.push((entry.path(), meta.len(), mtime));
        }
        if total <= self.budget_bytes {
            return;
        }
        files.sort_by_key(|(_, _, mtime)| *mtime);
        for (path, len, _) in files {
            if total <= self.budget_bytes {
                break;
            }
            if std::fs::remove_file(&path).is_ok() {
                log::trace!("evicted cache entry {path:?} ({len} bytes)");
                total = total.saturating_sub(len);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn total_bytes(&self) -> u64 {
        std::fs::read_dir(&self.root)
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .filter(|m| m.is_file())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Refresh an entry's mtime so eviction drops stale entries first.
fn touch(path: &Path) {
    if let Ok(file) = std::fs::File::options().write(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}
