//! Per-directory metadata sidecar
//!
//! Each directory on each target may carry one reserved JSON sidecar holding
//! two ledgers: the true modification time and size last written for each
//! file (for media that cannot preserve mtimes themselves), and the file
//! state recorded at the moment of last successful synchronization with a
//! specific peer (the reference point for conflict detection, kept only on
//! the side designated local for a run).
//!
//! A sidecar that cannot be parsed or carries an unknown format version is
//! treated as absent, never as a fatal error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use driftsync_types::{Entry, Result};

use crate::provider::StorageProvider;

/// Reserved sidecar file name, excluded from all listings and comparisons
pub const META_FILE_NAME: &str = "_driftsync-meta.json";

/// Reserved name prefix for sidecar files
const META_FILE_PREFIX: &str = "_driftsync-";

/// Sidecar format version; older or unknown versions are discarded
const FORMAT_VERSION: u32 = 1;

const DISCLAIMER: &str = "Generated by driftsync; do not edit";

/// Check whether `name` is a reserved sidecar file
pub fn is_sidecar_name(name: &str) -> bool {
    name.starts_with(META_FILE_PREFIX) && name.ends_with(".json")
}

/// True mtime and size last written for one file on this target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// True modification time, UTC seconds
    pub mtime: f64,
    /// Size in bytes at the time of the write
    pub size: u64,
    /// When this target wrote the file, UTC seconds
    pub uploaded: f64,
    /// Human-readable rendering of `mtime`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtime_str: Option<String>,
    /// Human-readable rendering of `uploaded`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_str: Option<String>,
}

/// File state agreed upon at the last successful sync with one peer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Modification time both sides agreed on, UTC seconds
    pub mtime: f64,
    /// Size both sides agreed on
    pub size: u64,
}

/// On-disk sidecar document
#[derive(Debug, Serialize, Deserialize)]
struct SidecarDocument {
    #[serde(rename = "_disclaimer")]
    disclaimer: String,
    #[serde(rename = "_format_version")]
    format_version: u32,
    #[serde(rename = "_generator")]
    generator: String,
    #[serde(rename = "_time")]
    time: f64,
    #[serde(rename = "_time_str")]
    time_str: String,
    files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    peer_sync: BTreeMap<String, BTreeMap<String, PeerRecord>>,
}

/// In-memory metadata for one directory on one target
///
/// Created fresh when the engine enters a directory, mutated while that
/// directory's entries are processed, and flushed before descending into
/// children. Never held across sibling directories.
#[derive(Debug, Default)]
pub struct DirMetadata {
    files: BTreeMap<String, FileRecord>,
    peer_sync: BTreeMap<String, BTreeMap<String, PeerRecord>>,
    was_persisted: bool,
    dirty: bool,
}

impl DirMetadata {
    /// Create an empty store for a directory without a sidecar
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the sidecar for the provider's current directory, if any
    ///
    /// Unparsable or version-mismatched sidecars are discarded with a
    /// warning; the store then starts empty but remembers that a sidecar
    /// existed so an emptied store deletes it on flush.
    pub async fn load(provider: &mut dyn StorageProvider) -> Result<Self> {
        let mut meta = Self::new();
        let Some(text) = provider.read_text(META_FILE_NAME).await? else {
            return Ok(meta);
        };
        meta.was_persisted = true;
        match serde_json::from_str::<SidecarDocument>(&text) {
            Ok(doc) if doc.format_version == FORMAT_VERSION => {
                meta.files = doc.files;
                meta.peer_sync = doc.peer_sync;
            }
            Ok(doc) => {
                warn!(
                    "discarding sidecar with format version {} in {}",
                    doc.format_version,
                    provider.describe()
                );
            }
            Err(e) => {
                warn!("could not read sidecar in {}: {}", provider.describe(), e);
            }
        }
        Ok(meta)
    }

    /// Record the true mtime and size after writing `name` on this target
    pub fn record_write(&mut self, name: &str, mtime: f64, size: u64) {
        if let Some(existing) = self.files.get(name) {
            if existing.mtime == mtime && existing.size == size {
                return;
            }
        }
        let uploaded = unix_now();
        self.files.insert(
            name.to_string(),
            FileRecord {
                mtime,
                size,
                uploaded,
                mtime_str: Some(render_time(mtime)),
                uploaded_str: Some(render_time(uploaded)),
            },
        );
        self.dirty = true;
    }

    /// Record the state agreed upon with `peer_id` for `name`
    ///
    /// Called on the side designated local, immediately after a file is
    /// confirmed synchronized. A no-op when the stored state already matches,
    /// so untouched directories do not rewrite their sidecar.
    pub fn set_sync_info(&mut self, peer_id: &str, name: &str, mtime: f64, size: u64) {
        let record = PeerRecord { mtime, size };
        let peer_map = self.peer_sync.entry(peer_id.to_string()).or_default();
        if peer_map.get(name) == Some(&record) {
            return;
        }
        peer_map.insert(name.to_string(), record);
        self.dirty = true;
    }

    /// Look up the last recorded sync state for `name` with `peer_id`
    pub fn sync_info(&self, peer_id: &str, name: &str) -> Option<PeerRecord> {
        self.peer_sync.get(peer_id)?.get(name).copied()
    }

    /// Look up the recorded write state for `name`
    pub fn file_record(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    /// Clear the file record and every peer-sync record for `name`
    pub fn remove(&mut self, name: &str) {
        if self.files.remove(name).is_some() {
            self.dirty = true;
        }
        for peer_map in self.peer_sync.values_mut() {
            if peer_map.remove(name).is_some() {
                self.dirty = true;
            }
        }
        self.peer_sync.retain(|_, m| !m.is_empty());
    }

    /// Substitute stored true mtimes into a listing
    ///
    /// A stored value applies only while its recorded size still matches the
    /// listed size; a size drift invalidates the record for comparison.
    pub fn apply_adjusted(&self, entries: &mut [Entry]) {
        for entry in entries.iter_mut().filter(|e| !e.is_directory) {
            if let Some(record) = self.files.get(&entry.name) {
                if record.size == entry.size {
                    entry.adjusted_mtime = Some(record.mtime);
                }
            }
        }
    }

    /// Whether both ledgers are empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.peer_sync.is_empty()
    }

    /// Whether either ledger changed since load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist or delete the sidecar for the provider's current directory
    ///
    /// Dry-run is always a no-op. An unchanged store skips the write; an
    /// emptied store that was previously persisted deletes the sidecar.
    pub async fn flush(&mut self, provider: &mut dyn StorageProvider, dry_run: bool) -> Result<()> {
        if dry_run {
            debug!("flush({}): dry-run, nothing to do", provider.describe());
            return Ok(());
        }
        if self.is_empty() {
            if self.was_persisted {
                debug!("flush({}): deleting empty sidecar", provider.describe());
                provider.remove_file(META_FILE_NAME).await?;
                self.was_persisted = false;
            }
        } else if self.dirty {
            let now = unix_now();
            let doc = SidecarDocument {
                disclaimer: DISCLAIMER.to_string(),
                format_version: FORMAT_VERSION,
                generator: format!("driftsync/{}", env!("CARGO_PKG_VERSION")),
                time: now,
                time_str: render_time(now),
                files: self.files.clone(),
                peer_sync: self.peer_sync.clone(),
            };
            let text = serde_json::to_string_pretty(&doc)
                .map_err(|e| driftsync_types::Error::metadata(e.to_string()))?;
            provider.write_text(META_FILE_NAME, &text).await?;
            self.was_persisted = true;
        } else {
            debug!("flush({}): unmodified, nothing to do", provider.describe());
        }
        self.dirty = false;
        Ok(())
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn render_time(stamp: f64) -> String {
    chrono::DateTime::from_timestamp(stamp as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{stamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsTarget;

    #[test]
    fn test_sidecar_name_detection() {
        assert!(is_sidecar_name(META_FILE_NAME));
        assert!(is_sidecar_name("_driftsync-snap.json"));
        assert!(!is_sidecar_name("notes.json"));
        assert!(!is_sidecar_name("_driftsync-meta.txt"));
    }

    #[test]
    fn test_record_write_idempotent() {
        let mut meta = DirMetadata::new();
        meta.record_write("a.txt", 100.0, 3);
        assert!(meta.is_dirty());

        let mut meta = DirMetadata::new();
        meta.record_write("a.txt", 100.0, 3);
        meta.dirty = false;
        meta.record_write("a.txt", 100.0, 3);
        assert!(!meta.is_dirty());
        meta.record_write("a.txt", 200.0, 3);
        assert!(meta.is_dirty());
    }

    #[test]
    fn test_sync_info_round_trip() {
        let mut meta = DirMetadata::new();
        assert!(meta.sync_info("peer", "a.txt").is_none());

        meta.set_sync_info("peer", "a.txt", 100.0, 3);
        let record = meta.sync_info("peer", "a.txt").unwrap();
        assert_eq!(record.mtime, 100.0);
        assert_eq!(record.size, 3);

        // Re-recording the same state leaves the store clean.
        meta.dirty = false;
        meta.set_sync_info("peer", "a.txt", 100.0, 3);
        assert!(!meta.is_dirty());

        meta.remove("a.txt");
        assert!(meta.sync_info("peer", "a.txt").is_none());
        assert!(meta.is_empty());
    }

    #[test]
    fn test_apply_adjusted_requires_matching_size() {
        let mut meta = DirMetadata::new();
        meta.record_write("a.txt", 100.0, 3);
        meta.record_write("b.txt", 100.0, 3);

        let mut entries: Vec<Entry> = vec![
            Entry::file("a.txt", "", 3, 999.0),
            Entry::file("b.txt", "", 4, 999.0),
        ];
        meta.apply_adjusted(&mut entries);
        assert_eq!(entries[0].adjusted_mtime, Some(100.0));
        assert_eq!(entries[1].adjusted_mtime, None);
    }

    #[tokio::test]
    async fn test_version_mismatch_discarded_on_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut target = FsTarget::new(dir.path()).unwrap();
        let text = serde_json::json!({
            "_disclaimer": "x",
            "_format_version": 99,
            "_generator": "driftsync/0.0.0",
            "_time": 0.0,
            "_time_str": "",
            "files": { "a.txt": { "mtime": 1.0, "size": 1, "uploaded": 2.0 } },
            "peer_sync": {}
        })
        .to_string();
        target.write_text(META_FILE_NAME, &text).await.unwrap();

        let mut meta = DirMetadata::load(&mut target).await.unwrap();
        assert!(meta.file_record("a.txt").is_none());
        assert!(meta.is_empty());

        // The stale sidecar still counts as persisted, so an empty store
        // deletes it on flush rather than leaving the v99 file behind.
        meta.flush(&mut target, false).await.unwrap();
        assert!(target.read_text(META_FILE_NAME).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_sidecar_discarded_on_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut target = FsTarget::new(dir.path()).unwrap();
        target
            .write_text(META_FILE_NAME, "{ not json")
            .await
            .unwrap();

        let meta = DirMetadata::load(&mut target).await.unwrap();
        assert!(meta.is_empty());
    }
}
