//! The synchronization engine
//!
//! One [`Synchronizer`] walks both targets in lockstep, one directory level
//! at a time. For each level it lists both sides, substitutes sidecar-stored
//! modification times, classifies every name, dispatches each classification
//! through the mode's action table, flushes both sidecars, and only then
//! descends into directories present on both sides.
//!
//! Upload and download share one code path: a download is an upload with the
//! targets swapped at construction, which only affects log symbols and the
//! upload/download split of the counters. Bidirectional mode additionally
//! consults the peer-sync ledger to tell a one-sided edit from a conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{error, info};
use uuid::Uuid;

use driftsync_target::{DirMetadata, PeerRecord, StorageProvider};
use driftsync_types::{Entry, EntryComparison, Result, SyncReport, SyncStats};

use crate::filter::PathFilter;
use crate::options::SyncOptions;

/// Copy direction relative to the engine's designated sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    /// From the designated-local to the designated-remote target
    LocalToRemote,
    /// From the designated-remote to the designated-local target
    RemoteToLocal,
}

impl Direction {
    pub(crate) fn symbol(self) -> char {
        match self {
            Self::LocalToRemote => '>',
            Self::RemoteToLocal => '<',
        }
    }
}

/// One side of the pair, for deletions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Local,
    Remote,
}

/// Synchronization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Make the remote side mirror the local side
    Upload,
    /// Propagate changes in both directions using the peer-sync ledger
    Bidirectional,
}

/// Outcome of comparing one name across both listings
///
/// Borrowed from the per-level listing vectors; produced and consumed within
/// one directory level. Anomalies never reach this enum, they are reported
/// and dropped during classification.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Classification<'a> {
    /// Same file on both sides
    EqualFile { local: &'a Entry },
    /// File pair where the local side is newer beyond epsilon
    LocalNewer { local: &'a Entry, remote: &'a Entry },
    /// File pair where the local side is older beyond epsilon
    LocalOlder { local: &'a Entry, remote: &'a Entry },
    /// File present on the local side only
    MissingRemoteFile { local: &'a Entry },
    /// Directory present on the local side only
    MissingRemoteDir { local: &'a Entry },
    /// File present on the remote side only
    MissingLocalFile { remote: &'a Entry },
    /// Directory present on the remote side only
    MissingLocalDir { remote: &'a Entry },
    /// Directory present on both sides
    EqualDir { local: &'a Entry },
}

/// Two-target synchronization engine
///
/// Constructed for exactly one run; the accumulated counters are returned
/// in the [`SyncReport`] from [`run`](Self::run).
pub struct Synchronizer {
    pub(crate) local: Box<dyn StorageProvider>,
    pub(crate) remote: Box<dyn StorageProvider>,
    pub(crate) mode: SyncMode,
    /// Set for downloads, where the caller's targets were swapped so the
    /// engine always copies from its designated-local side
    pub(crate) swapped: bool,
    pub(crate) options: SyncOptions,
    pub(crate) filter: PathFilter,
    pub(crate) stats: SyncStats,
    pub(crate) request_id: Uuid,
}

impl Synchronizer {
    /// Engine that makes `remote` mirror `local`
    pub fn upload(
        local: Box<dyn StorageProvider>,
        remote: Box<dyn StorageProvider>,
        options: SyncOptions,
    ) -> Result<Self> {
        Self::build(local, remote, SyncMode::Upload, false, options)
    }

    /// Engine that makes `local` mirror `remote`
    pub fn download(
        local: Box<dyn StorageProvider>,
        remote: Box<dyn StorageProvider>,
        options: SyncOptions,
    ) -> Result<Self> {
        Self::build(remote, local, SyncMode::Upload, true, options)
    }

    /// Engine that propagates changes in both directions
    pub fn bidirectional(
        local: Box<dyn StorageProvider>,
        remote: Box<dyn StorageProvider>,
        options: SyncOptions,
    ) -> Result<Self> {
        Self::build(local, remote, SyncMode::Bidirectional, false, options)
    }

    fn build(
        local: Box<dyn StorageProvider>,
        remote: Box<dyn StorageProvider>,
        mode: SyncMode,
        swapped: bool,
        options: SyncOptions,
    ) -> Result<Self> {
        let filter = PathFilter::new(&options.include_files, &options.omit)?;
        Ok(Self {
            local,
            remote,
            mode,
            swapped,
            options,
            filter,
            stats: SyncStats::new(),
            request_id: Uuid::new_v4(),
        })
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Execute the run and return the final report
    pub async fn run(&mut self) -> Result<SyncReport> {
        let start = Instant::now();
        let suffix = if self.options.dry_run { " (DRY-RUN)" } else { "" };
        match (self.mode, self.swapped) {
            (SyncMode::Upload, false) => info!(
                request_id = %self.request_id,
                "upload {} -> {}{}",
                self.local.describe(),
                self.remote.describe(),
                suffix
            ),
            (SyncMode::Upload, true) => info!(
                request_id = %self.request_id,
                "download {} <- {}{}",
                self.remote.describe(),
                self.local.describe(),
                suffix
            ),
            (SyncMode::Bidirectional, _) => info!(
                request_id = %self.request_id,
                "synchronize {} <-> {}{}",
                self.local.describe(),
                self.remote.describe(),
                suffix
            ),
        }

        // The source of a one-way run must never be written, except for
        // its own sidecar. A dry run protects both sides.
        if self.mode == SyncMode::Upload {
            self.local.set_readonly(true);
        }
        if self.options.dry_run {
            self.local.set_readonly(true);
            self.remote.set_readonly(true);
        }

        let outcome = self.sync_dir().await;
        self.stats.duration = start.elapsed();
        outcome?;
        Ok(SyncReport::new(
            self.request_id,
            self.stats.clone(),
            self.options.dry_run,
        ))
    }

    /// Synchronize the directory both cursors currently point at
    fn sync_dir(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut local_entries = self.local.list_dir().await?;
            let mut remote_entries = self.remote.list_dir().await?;
            local_entries.sort_by(|a, b| a.name.cmp(&b.name));
            remote_entries.sort_by(|a, b| a.name.cmp(&b.name));

            for entry in &local_entries {
                if entry.is_directory {
                    self.stats.local_dirs += 1;
                } else {
                    self.stats.local_files += 1;
                }
            }
            for entry in &remote_entries {
                if entry.is_directory {
                    self.stats.remote_dirs += 1;
                } else {
                    self.stats.remote_files += 1;
                }
            }

            let mut local_meta = DirMetadata::load(self.local.as_mut()).await?;
            let mut remote_meta = DirMetadata::load(self.remote.as_mut()).await?;
            local_meta.apply_adjusted(&mut local_entries);
            remote_meta.apply_adjusted(&mut remote_entries);

            let remote_by_name: BTreeMap<&str, &Entry> = remote_entries
                .iter()
                .map(|e| (e.name.as_str(), e))
                .collect();
            let mut descend: Vec<String> = Vec::new();

            // Local files first, then local directories, then remote-only
            // entries, so deletes and conflicts surface after the copies
            // they relate to.
            let ordered = local_entries
                .iter()
                .filter(|e| !e.is_directory)
                .chain(local_entries.iter().filter(|e| e.is_directory));
            for local in ordered {
                let peer = remote_by_name.get(local.name.as_str()).copied();
                if !self.filter.matches(local) {
                    if let Some(remote) = peer {
                        self.check_del_unmatched(remote, &mut local_meta, &mut remote_meta)
                            .await?;
                    } else {
                        self.log_action("skip", "unmatched", '-', local, 4);
                    }
                    continue;
                }
                self.stats.entries_seen += 1;
                let Some(classification) = self.classify(local, peer) else {
                    continue;
                };
                self.dispatch(
                    classification,
                    &mut local_meta,
                    &mut remote_meta,
                    &mut descend,
                )
                .await?;
            }

            let local_names: BTreeSet<&str> =
                local_entries.iter().map(|e| e.name.as_str()).collect();
            for remote in &remote_entries {
                if local_names.contains(remote.name.as_str()) {
                    continue;
                }
                if !self.filter.matches(remote) {
                    self.check_del_unmatched(remote, &mut local_meta, &mut remote_meta)
                        .await?;
                    continue;
                }
                self.stats.entries_seen += 1;
                let classification = if remote.is_directory {
                    Classification::MissingLocalDir { remote }
                } else {
                    Classification::MissingLocalFile { remote }
                };
                self.dispatch(
                    classification,
                    &mut local_meta,
                    &mut remote_meta,
                    &mut descend,
                )
                .await?;
            }

            // Sidecars are written before descending so an interrupted run
            // leaves every already-processed level consistent.
            local_meta
                .flush(self.local.as_mut(), self.options.dry_run)
                .await?;
            remote_meta
                .flush(self.remote.as_mut(), self.options.dry_run)
                .await?;

            for name in descend {
                self.local.change_dir(&name).await?;
                self.remote.change_dir(&name).await?;
                self.sync_dir().await?;
                self.local.change_dir("..").await?;
                self.remote.change_dir("..").await?;
            }
            Ok(())
        })
    }

    /// Classify one local entry against its remote counterpart, if any
    ///
    /// Returns `None` for anomalies: type mismatches and equal-time pairs
    /// with differing sizes are reported, counted, and skipped.
    fn classify<'a>(
        &mut self,
        local: &'a Entry,
        peer: Option<&'a Entry>,
    ) -> Option<Classification<'a>> {
        let Some(remote) = peer else {
            return Some(if local.is_directory {
                Classification::MissingRemoteDir { local }
            } else {
                Classification::MissingRemoteFile { local }
            });
        };
        if local.is_directory != remote.is_directory {
            error!(
                "{}: file on one side, directory on the other, skipping",
                local.full_rel_path()
            );
            self.stats.errors += 1;
            return None;
        }
        if local.is_directory {
            return Some(Classification::EqualDir { local });
        }
        match local.compare_files(remote) {
            EntryComparison::Equal => Some(Classification::EqualFile { local }),
            EntryComparison::Newer => Some(Classification::LocalNewer { local, remote }),
            EntryComparison::Older => Some(Classification::LocalOlder { local, remote }),
            EntryComparison::Anomaly => {
                error!(
                    "{}: modification times equal but sizes differ ({} vs {}), skipping",
                    local.full_rel_path(),
                    local.size,
                    remote.size
                );
                self.stats.errors += 1;
                None
            }
        }
    }

    /// The action table: one arm per (mode, classification) pair
    async fn dispatch(
        &mut self,
        classification: Classification<'_>,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
        descend: &mut Vec<String>,
    ) -> Result<()> {
        use Classification::{
            EqualDir, EqualFile, LocalNewer, LocalOlder, MissingLocalDir, MissingLocalFile,
            MissingRemoteDir, MissingRemoteFile,
        };
        match (self.mode, classification) {
            (_, EqualFile { local }) => {
                self.log_action("equal", "", '=', local, 4);
                self.mark_synced(
                    local_meta,
                    remote_meta,
                    &local.name,
                    local.adjusted(),
                    local.size,
                );
            }
            (_, EqualDir { local }) => {
                self.log_action("equal", "", '=', local, 4);
                descend.push(local.name.clone());
            }
            (_, MissingRemoteDir { local }) => {
                self.log_action("copy", "new", '>', local, 3);
                self.copy_dir_recursive(Direction::LocalToRemote, &local.name)
                    .await?;
            }
            (SyncMode::Upload, LocalNewer { local, .. }) => {
                self.log_action("copy", "modified", '>', local, 3);
                self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                    .await?;
            }
            (SyncMode::Upload, LocalOlder { local, .. }) => {
                if self.options.force {
                    self.log_action("restore", "older", '>', local, 2);
                    self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("skip", "older", '?', local, 4);
                }
            }
            (SyncMode::Upload, MissingRemoteFile { local }) => {
                self.log_action("copy", "new", '>', local, 3);
                self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                    .await?;
            }
            (SyncMode::Upload, MissingLocalFile { remote }) => {
                if self.options.effective_delete() {
                    self.log_action("delete", "missing", 'X', remote, 2);
                    self.delete_file_on(Side::Remote, &remote.name, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("skip", "missing", '?', remote, 4);
                }
            }
            (SyncMode::Upload, MissingLocalDir { remote }) => {
                if self.options.effective_delete() {
                    self.log_action("delete", "missing", 'X', remote, 2);
                    self.delete_dir_on(Side::Remote, &remote.name, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("skip", "missing", '?', remote, 4);
                }
            }
            (SyncMode::Bidirectional, LocalNewer { local, remote }) => {
                self.reconcile_modified(local, remote, true, local_meta, remote_meta)
                    .await?;
            }
            (SyncMode::Bidirectional, LocalOlder { local, remote }) => {
                self.reconcile_modified(local, remote, false, local_meta, remote_meta)
                    .await?;
            }
            (SyncMode::Bidirectional, MissingRemoteFile { local }) => {
                if self
                    .synced_record(local_meta, remote_meta, &local.name)
                    .is_some()
                {
                    // Synchronized before and now gone on the peer.
                    self.log_action("delete", "removed", 'X', local, 2);
                    self.delete_file_on(Side::Local, &local.name, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("copy", "new", '>', local, 3);
                    self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                        .await?;
                }
            }
            (SyncMode::Bidirectional, MissingLocalFile { remote }) => {
                if self
                    .synced_record(local_meta, remote_meta, &remote.name)
                    .is_some()
                {
                    self.log_action("delete", "removed", 'X', remote, 2);
                    self.delete_file_on(Side::Remote, &remote.name, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("copy", "new", '<', remote, 3);
                    self.copy_and_mark(Direction::RemoteToLocal, remote, local_meta, remote_meta)
                        .await?;
                }
            }
            (SyncMode::Bidirectional, MissingLocalDir { remote }) => {
                self.log_action("copy", "new", '<', remote, 3);
                self.copy_dir_recursive(Direction::RemoteToLocal, &remote.name)
                    .await?;
            }
        }
        Ok(())
    }

    /// Bidirectional handling of a file pair that differs beyond epsilon
    async fn reconcile_modified(
        &mut self,
        local: &Entry,
        remote: &Entry,
        local_newer: bool,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        match self.synced_record(local_meta, remote_meta, &local.name) {
            None => {
                // Never synchronized before: the newer side wins.
                if local_newer {
                    self.log_action("copy", "modified", '>', local, 3);
                    self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                        .await?;
                } else {
                    self.log_action("copy", "modified", '<', remote, 3);
                    self.copy_and_mark(Direction::RemoteToLocal, remote, local_meta, remote_meta)
                        .await?;
                }
            }
            Some(record) => {
                let local_changed = !record_matches(local, &record);
                let remote_changed = !record_matches(remote, &record);
                match (local_changed, remote_changed) {
                    (true, false) => {
                        self.log_action("copy", "modified", '>', local, 3);
                        self.copy_and_mark(
                            Direction::LocalToRemote,
                            local,
                            local_meta,
                            remote_meta,
                        )
                        .await?;
                    }
                    (false, true) => {
                        self.log_action("copy", "modified", '<', remote, 3);
                        self.copy_and_mark(
                            Direction::RemoteToLocal,
                            remote,
                            local_meta,
                            remote_meta,
                        )
                        .await?;
                    }
                    _ => {
                        self.handle_conflict(local, remote, local_newer, local_meta, remote_meta)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Both sides drifted from the recorded sync state
    async fn handle_conflict(
        &mut self,
        local: &Entry,
        remote: &Entry,
        local_newer: bool,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        self.stats.conflict_files += 1;
        if self.options.force {
            if local_newer {
                self.log_action("restore", "conflict", '>', local, 2);
                self.copy_and_mark(Direction::LocalToRemote, local, local_meta, remote_meta)
                    .await
            } else {
                self.log_action("restore", "conflict", '<', remote, 2);
                self.copy_and_mark(Direction::RemoteToLocal, remote, local_meta, remote_meta)
                    .await
            }
        } else {
            self.log_action("skip", "conflict", '!', local, 2);
            Ok(())
        }
    }

    /// Delete or report a target entry the current filter excludes
    pub(crate) async fn check_del_unmatched(
        &mut self,
        remote: &Entry,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        if self.options.delete_unmatched {
            self.log_action("delete", "unmatched", 'X', remote, 2);
            if remote.is_directory {
                self.delete_dir_on(Side::Remote, &remote.name, local_meta, remote_meta)
                    .await
            } else {
                self.delete_file_on(Side::Remote, &remote.name, local_meta, remote_meta)
                    .await
            }
        } else {
            self.log_action("skip", "unmatched", '-', remote, 4);
            Ok(())
        }
    }

    /// Record the agreed state in the ledger of the physically local side
    pub(crate) fn mark_synced(
        &self,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
        name: &str,
        mtime: f64,
        size: u64,
    ) {
        if self.swapped {
            remote_meta.set_sync_info(self.local.root_id(), name, mtime, size);
        } else {
            local_meta.set_sync_info(self.remote.root_id(), name, mtime, size);
        }
    }

    /// Look up the agreed state from the ledger of the physically local side
    pub(crate) fn synced_record(
        &self,
        local_meta: &DirMetadata,
        remote_meta: &DirMetadata,
        name: &str,
    ) -> Option<PeerRecord> {
        if self.swapped {
            remote_meta.sync_info(self.local.root_id(), name)
        } else {
            local_meta.sync_info(self.remote.root_id(), name)
        }
    }

    /// One console line per action, gated by verbosity
    ///
    /// Directional symbols are flipped for swapped (download) runs so the
    /// arrows always point the way the bytes physically move.
    pub(crate) fn log_action(
        &self,
        action: &str,
        status: &str,
        symbol: char,
        entry: &Entry,
        min_verbosity: u8,
    ) {
        if self.options.verbosity < min_verbosity {
            return;
        }
        let symbol = if self.swapped {
            match symbol {
                '>' => '<',
                '<' => '>',
                other => other,
            }
        } else {
            symbol
        };
        let prefix = if self.options.dry_run { "(DRY-RUN) " } else { "" };
        if status.is_empty() {
            info!("{prefix}{symbol} {action:<7} {}", entry.display_name());
        } else {
            info!(
                "{prefix}{symbol} {action:<7} {status:<9} {}",
                entry.display_name()
            );
        }
    }
}

/// Whether `entry` still matches the recorded sync state within epsilon
fn record_matches(entry: &Entry, record: &PeerRecord) -> bool {
    entry.size == record.size
        && Entry::eps_compare(entry.adjusted(), record.mtime) == std::cmp::Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_matches_within_epsilon() {
        let record = PeerRecord {
            mtime: 1000.0,
            size: 3,
        };
        assert!(record_matches(&Entry::file("f", "", 3, 1000.05), &record));
        assert!(!record_matches(&Entry::file("f", "", 3, 1000.5), &record));
        assert!(!record_matches(&Entry::file("f", "", 4, 1000.0), &record));
    }

    #[test]
    fn test_direction_symbols() {
        assert_eq!(Direction::LocalToRemote.symbol(), '>');
        assert_eq!(Direction::RemoteToLocal.symbol(), '<');
    }
}
