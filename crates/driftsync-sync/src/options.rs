//! Run options for the synchronization engine

use driftsync_target::DEFAULT_BLOCK_SIZE;

/// Options controlling one synchronization run
///
/// The safe direction is the default: runs are dry runs until the caller
/// opts into execution, and nothing is deleted unless asked for.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Report every action without touching either target
    pub dry_run: bool,
    /// Overwrite newer target files (upload/download); resolve conflicts
    /// in favor of the newer side (bidirectional)
    pub force: bool,
    /// Remove target entries that do not exist on the source
    pub delete: bool,
    /// Remove target entries excluded by the current filter; implies `delete`
    pub delete_unmatched: bool,
    /// File name patterns to include; empty means all files
    pub include_files: Vec<String>,
    /// Name patterns to exclude, applied to files and directories
    pub omit: Vec<String>,
    /// Console chattiness, 0 silent, 3 default, 5 trace
    pub verbosity: u8,
    /// Emit a progress dot per copied block on stderr
    pub progress: bool,
    /// Copy block size in bytes
    pub block_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            force: false,
            delete: false,
            delete_unmatched: false,
            include_files: Vec::new(),
            omit: Vec::new(),
            verbosity: 3,
            progress: false,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl SyncOptions {
    /// Whether deletions are enabled, counting the implication from
    /// [`delete_unmatched`](Self::delete_unmatched)
    pub fn effective_delete(&self) -> bool {
        self.delete || self.delete_unmatched
    }
}
