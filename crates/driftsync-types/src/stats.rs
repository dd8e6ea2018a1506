//! Run statistics for one synchronization pass
//!
//! Counters are owned by the synchronizer and returned to the caller after
//! `run()` completes; there are no process-wide counters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters accumulated during one engine run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStats {
    /// Entries observed in listings (both sides, including recursion)
    pub entries_seen: u64,
    /// Entries a mutating action was issued for
    pub entries_touched: u64,
    /// Files listed on the side designated local
    pub local_files: u64,
    /// Directories listed on the side designated local
    pub local_dirs: u64,
    /// Files listed on the side designated remote
    pub remote_files: u64,
    /// Directories listed on the side designated remote
    pub remote_dirs: u64,
    /// Files written (either direction)
    pub files_written: u64,
    /// Files deleted (either side)
    pub files_deleted: u64,
    /// Directories created
    pub dirs_created: u64,
    /// Directories deleted
    pub dirs_deleted: u64,
    /// Total bytes written
    pub bytes_written: u64,
    /// Bytes written onto the physically remote side
    pub upload_bytes_written: u64,
    /// Bytes written onto the physically local side
    pub download_bytes_written: u64,
    /// Files written onto the physically remote side
    pub upload_files_written: u64,
    /// Files written onto the physically local side
    pub download_files_written: u64,
    /// Conflicts detected and left untouched
    pub conflict_files: u64,
    /// Non-fatal errors reported (anomalous comparisons, bad sidecars)
    pub errors: u64,
    /// Total duration of the run
    pub duration: Duration,
}

impl SyncStats {
    /// Create a new empty statistics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Overall write rate in bytes per second
    pub fn transfer_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_written as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Merge statistics from another instance
    pub fn merge(&mut self, other: &SyncStats) {
        self.entries_seen += other.entries_seen;
        self.entries_touched += other.entries_touched;
        self.local_files += other.local_files;
        self.local_dirs += other.local_dirs;
        self.remote_files += other.remote_files;
        self.remote_dirs += other.remote_dirs;
        self.files_written += other.files_written;
        self.files_deleted += other.files_deleted;
        self.dirs_created += other.dirs_created;
        self.dirs_deleted += other.dirs_deleted;
        self.bytes_written += other.bytes_written;
        self.upload_bytes_written += other.upload_bytes_written;
        self.download_bytes_written += other.download_bytes_written;
        self.upload_files_written += other.upload_files_written;
        self.download_files_written += other.download_files_written;
        self.conflict_files += other.conflict_files;
        self.errors += other.errors;
        self.duration += other.duration;
    }
}

/// Result of one synchronization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Run identifier for tracking
    pub request_id: uuid::Uuid,
    /// Accumulated counters
    pub stats: SyncStats,
    /// Whether this run was a dry run
    pub dry_run: bool,
}

impl SyncReport {
    /// Create a new report wrapping the run's counters
    pub fn new(request_id: uuid::Uuid, stats: SyncStats, dry_run: bool) -> Self {
        Self {
            request_id,
            stats,
            dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_creation() {
        let stats = SyncStats::new();
        assert_eq!(stats.files_written, 0);
        assert_eq!(stats.bytes_written, 0);
        assert_eq!(stats.transfer_rate(), 0.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = SyncStats::new();
        a.files_written = 3;
        a.bytes_written = 100;
        a.conflict_files = 1;

        let mut b = SyncStats::new();
        b.files_written = 2;
        b.bytes_written = 50;
        b.duration = Duration::from_secs(1);

        a.merge(&b);
        assert_eq!(a.files_written, 5);
        assert_eq!(a.bytes_written, 150);
        assert_eq!(a.conflict_files, 1);
        assert_eq!(a.duration, Duration::from_secs(1));
    }

    #[test]
    fn test_transfer_rate() {
        let mut stats = SyncStats::new();
        stats.bytes_written = 2048;
        stats.duration = Duration::from_secs(2);
        assert_eq!(stats.transfer_rate(), 1024.0);
    }
}
