//! Directory-listing entry model
//!
//! An [`Entry`] is an immutable snapshot of one file or directory as observed
//! on one target during one listing. Identity is by name within the parent
//! directory; the provider-supplied `unique` fact (inode number, server
//! "unique" token) is carried for diagnostics only.
//!
//! File comparison tolerates remote-clock rounding: two modification times
//! within [`EPS_TIME`] seconds of each other count as equal, and a time
//! recorded in the metadata sidecar overrides the provider-reported time
//! whenever the recorded size still matches (`adjusted_mtime`). This is what
//! lets a target whose listing only reports upload time still compare
//! correctly against a filesystem target's true mtime.

use serde::{Deserialize, Serialize};

/// Maximum modification-time difference, in seconds, still considered equal
pub const EPS_TIME: f64 = 0.1;

/// Outcome of comparing two same-named file entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryComparison {
    /// Same size, adjusted times within epsilon
    Equal,
    /// This entry's adjusted time exceeds the other's by more than epsilon
    Newer,
    /// The other entry's adjusted time exceeds this one's by more than epsilon
    Older,
    /// Times within epsilon but sizes differ; reported and skipped
    Anomaly,
}

/// Immutable snapshot of one file or directory from one listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Base name, unique among siblings
    pub name: String,
    /// Parent path relative to the synchronization root, `/`-separated
    pub rel_path: String,
    /// Byte length for files; provider-reported size for directories
    pub size: u64,
    /// Modification time as seen by the provider, UTC seconds
    pub mtime: f64,
    /// Provider-supplied stable identifier, diagnostics only
    pub unique: Option<String>,
    /// Sidecar-recorded true mtime, substituted when the stored size matches
    pub adjusted_mtime: Option<f64>,
    /// Whether this entry is a directory
    pub is_directory: bool,
}

impl Entry {
    /// Create a file entry
    pub fn file(name: impl Into<String>, rel_path: impl Into<String>, size: u64, mtime: f64) -> Self {
        Self {
            name: name.into(),
            rel_path: rel_path.into(),
            size,
            mtime,
            unique: None,
            adjusted_mtime: None,
            is_directory: false,
        }
    }

    /// Create a directory entry
    pub fn directory(
        name: impl Into<String>,
        rel_path: impl Into<String>,
        size: u64,
        mtime: f64,
    ) -> Self {
        Self {
            name: name.into(),
            rel_path: rel_path.into(),
            size,
            mtime,
            unique: None,
            adjusted_mtime: None,
            is_directory: true,
        }
    }

    /// Attach the provider's stable identifier
    pub fn with_unique(mut self, unique: impl Into<String>) -> Self {
        self.unique = Some(unique.into());
        self
    }

    /// Path from the synchronization root including the name, `/`-separated
    pub fn full_rel_path(&self) -> String {
        if self.rel_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.rel_path.trim_end_matches('/'), self.name)
        }
    }

    /// Modification time after sidecar substitution
    pub fn adjusted(&self) -> f64 {
        self.adjusted_mtime.unwrap_or(self.mtime)
    }

    /// Compare two timestamps with the epsilon band treated as equal
    ///
    /// Uses `<=` so an epsilon of zero still behaves as exact comparison.
    pub fn eps_compare(a: f64, b: f64) -> std::cmp::Ordering {
        let diff = a - b;
        if diff.abs() <= EPS_TIME {
            std::cmp::Ordering::Equal
        } else if diff < 0.0 {
            std::cmp::Ordering::Less
        } else {
            std::cmp::Ordering::Greater
        }
    }

    /// Classify this file entry against a same-named peer file entry
    ///
    /// Directories never compare by time; callers compare presence only.
    pub fn compare_files(&self, other: &Self) -> EntryComparison {
        debug_assert!(!self.is_directory && !other.is_directory);
        debug_assert_eq!(self.name, other.name);
        match Self::eps_compare(self.adjusted(), other.adjusted()) {
            std::cmp::Ordering::Equal if self.size == other.size => EntryComparison::Equal,
            std::cmp::Ordering::Equal => EntryComparison::Anomaly,
            std::cmp::Ordering::Greater => EntryComparison::Newer,
            std::cmp::Ordering::Less => EntryComparison::Older,
        }
    }

    /// Display label: directories are bracketed
    pub fn display_name(&self) -> String {
        if self.is_directory {
            format!("[{}]", self.full_rel_path())
        } else {
            self.full_rel_path()
        }
    }
}
