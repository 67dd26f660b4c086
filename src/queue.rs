//! Durable on-disk FIFO for serialized event records.
//!
//! Each record is one file in the queue directory, named by its admission
//! timestamp as fractional seconds since the epoch; the numeric sort of the
//! file names IS the queue order. The directory is the source of truth: a
//! fresh instance over the same directory recovers the queue after a crash.
//!
//! All I/O errors here are logged and swallowed. The queue keeps serving
//! whatever state it has; delivery is best-effort by design.

use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ErrorCode, Result, TrackKitError};

/// Subdirectory that collects files whose names do not parse as timestamps.
const INVALID_DIR: &str = "invalid";

/// Default record capacity before the oldest record is evicted.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Crash-safe FIFO of opaque byte records rooted at a directory.
///
/// The directory must be owned by exactly one instance; two instances over
/// the same directory are undefined.
pub struct PersistentQueue {
    dir: PathBuf,
    max_depth: usize,
    /// File names in queue order. Never held across file I/O: callers
    /// snapshot, perform I/O, then reconcile.
    items: Mutex<Vec<String>>,
    /// Nanoseconds of the last admitted record, bumped to keep names
    /// strictly increasing when the clock stalls or steps back.
    last_admission: Mutex<u128>,
}

impl PersistentQueue {
    /// Open (or create) a queue rooted at `dir`.
    ///
    /// Existing record files are listed and sorted numerically ascending.
    /// Files whose names do not parse as fractional seconds are moved aside
    /// into an `invalid/` subdirectory and never enter the queue.
    pub fn new(dir: impl Into<PathBuf>, max_depth: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            TrackKitError::with_source(
                ErrorCode::StorageCreateError,
                format!("failed to create queue directory: {}", dir.display()),
                e,
            )
        })?;

        let mut named: Vec<(f64, String)> = Vec::new();
        let mut misnamed: Vec<PathBuf> = Vec::new();

        let entries = fs::read_dir(&dir).map_err(|e| {
            TrackKitError::with_source(
                ErrorCode::StorageReadError,
                format!("failed to list queue directory: {}", dir.display()),
                e,
            )
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match name.parse::<f64>() {
                Ok(stamp) if stamp.is_finite() => named.push((stamp, name)),
                _ => misnamed.push(path),
            }
        }

        if !misnamed.is_empty() {
            Self::move_aside(&dir, &misnamed);
        }

        // f64 cannot hold epoch seconds at nanosecond resolution, so names
        // admitted within the same instant parse equal; the zero-padded
        // fraction makes the name comparison the exact order for them.
        named.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        let items: Vec<String> = named.into_iter().map(|(_, name)| name).collect();

        tracing::debug!(
            depth = items.len(),
            dir = %dir.display(),
            "persistent queue loaded"
        );

        Ok(Self {
            dir,
            max_depth,
            items: Mutex::new(items),
            last_admission: Mutex::new(0),
        })
    }

    fn move_aside(dir: &Path, misnamed: &[PathBuf]) {
        let invalid_dir = dir.join(INVALID_DIR);
        if let Err(e) = fs::create_dir_all(&invalid_dir) {
            tracing::warn!("failed to create {}: {}", invalid_dir.display(), e);
            return;
        }
        for path in misnamed {
            let Some(name) = path.file_name() else { continue };
            tracing::warn!(
                "moving aside queue file with non-numeric name: {}",
                path.display()
            );
            if let Err(e) = fs::rename(path, invalid_dir.join(name)) {
                tracing::warn!("failed to move aside {}: {}", path.display(), e);
            }
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of currently tracked records.
    pub fn depth(&self) -> usize {
        self.items.lock().len()
    }

    /// Append a record.
    ///
    /// The record is written under a fresh timestamp name and then tracked.
    /// A write error drops the record with a warning; nothing partial is
    /// ever tracked. At capacity the oldest record is evicted first.
    pub fn add(&self, bytes: &[u8]) {
        let name = self.next_record_name();
        let path = self.dir.join(&name);

        if let Err(e) = fs::write(&path, bytes) {
            tracing::warn!("failed to persist record {}: {}", path.display(), e);
            return;
        }

        let evicted = {
            let mut items = self.items.lock();
            items.push(name);
            if items.len() > self.max_depth {
                Some(items.remove(0))
            } else {
                None
            }
        };

        if let Some(old) = evicted {
            tracing::warn!(max_depth = self.max_depth, "queue at capacity, dropping oldest record");
            if let Err(e) = fs::remove_file(self.dir.join(&old)) {
                tracing::warn!("failed to remove evicted record {}: {}", old, e);
            }
        }
    }

    /// Strictly increasing `{secs}.{nanos}` admission name. Equal wall-clock
    /// readings are disambiguated by bumping one nanosecond.
    fn next_record_name(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut nanos = now.as_nanos();

        {
            let mut last = self.last_admission.lock();
            if nanos <= *last {
                nanos = *last + 1;
            }
            *last = nanos;
        }

        format!("{}.{:09}", nanos / 1_000_000_000, nanos % 1_000_000_000)
    }

    /// Read up to `n` records from the head, in order.
    ///
    /// A record that cannot be read is removed from disk and pruned from the
    /// queue with a warning; it does not count toward `n`.
    pub fn peek(&self, n: usize) -> Vec<Vec<u8>> {
        let snapshot: Vec<String> = self.items.lock().clone();

        let mut records = Vec::new();
        let mut unreadable: Vec<String> = Vec::new();

        for name in snapshot {
            if records.len() == n {
                break;
            }
            let path = self.dir.join(&name);
            match fs::read(&path) {
                Ok(bytes) => records.push(bytes),
                Err(e) => {
                    tracing::warn!("removing unreadable record {}: {}", path.display(), e);
                    if let Err(e) = fs::remove_file(&path) {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            tracing::warn!("failed to remove {}: {}", path.display(), e);
                        }
                    }
                    unreadable.push(name);
                }
            }
        }

        if !unreadable.is_empty() {
            let mut items = self.items.lock();
            items.retain(|name| !unreadable.contains(name));
        }

        records
    }

    /// Remove up to `n` head records from memory and disk.
    pub fn pop(&self, n: usize) {
        let removed: Vec<String> = {
            let mut items = self.items.lock();
            let count = n.min(items.len());
            items.drain(..count).collect()
        };

        for name in removed {
            let path = self.dir.join(&name);
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("failed to remove record {}: {}", path.display(), e);
            }
        }
    }

    /// Remove the record at `index`. Out-of-range indices are ignored.
    pub fn delete(&self, index: usize) {
        let name = {
            let mut items = self.items.lock();
            if index >= items.len() {
                return;
            }
            items.remove(index)
        };

        let path = self.dir.join(&name);
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("failed to remove record {}: {}", path.display(), e);
        }
    }

    /// Drop every record and recreate the directory empty.
    pub fn clear(&self) {
        self.items.lock().clear();

        if let Err(e) = fs::remove_dir_all(&self.dir) {
            tracing::warn!("failed to clear queue directory {}: {}", self.dir.display(), e);
        }
        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::warn!(
                "failed to recreate queue directory {}: {}",
                self.dir.display(),
                e
            );
        }
    }
}
