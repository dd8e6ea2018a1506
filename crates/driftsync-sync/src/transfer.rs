//! Byte-moving primitives for the engine
//!
//! All counters are incremented before the dry-run check so a dry run
//! reports exactly the numbers a real run would produce, with one
//! exception: nothing below a directory that does not exist yet on the
//! destination is enumerated during a dry run.

use futures::future::BoxFuture;
use std::io::{self, Write};

use driftsync_target::DirMetadata;
use driftsync_types::{Entry, Result};

use crate::engine::{Direction, Side, Synchronizer};

impl Synchronizer {
    /// Copy one file and record the agreed state in the peer-sync ledger
    pub(crate) async fn copy_and_mark(
        &mut self,
        direction: Direction,
        entry: &Entry,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        let dest_meta = match direction {
            Direction::LocalToRemote => &mut *remote_meta,
            Direction::RemoteToLocal => &mut *local_meta,
        };
        self.copy_file(direction, entry, dest_meta).await?;
        self.mark_synced(
            local_meta,
            remote_meta,
            &entry.name,
            entry.adjusted(),
            entry.size,
        );
        Ok(())
    }

    /// Stream one file from source to destination in blocks
    ///
    /// The source's adjusted mtime is reproduced on the destination, either
    /// natively or through the destination's sidecar when the medium cannot
    /// persist modification times.
    pub(crate) async fn copy_file(
        &mut self,
        direction: Direction,
        entry: &Entry,
        dest_meta: &mut DirMetadata,
    ) -> Result<()> {
        let is_upload = (direction == Direction::LocalToRemote) != self.swapped;
        self.stats.files_written += 1;
        self.stats.entries_touched += 1;
        if is_upload {
            self.stats.upload_files_written += 1;
        } else {
            self.stats.download_files_written += 1;
        }
        if self.options.dry_run {
            return Ok(());
        }

        let Self {
            local,
            remote,
            stats,
            options,
            ..
        } = self;
        let (src, dest) = match direction {
            Direction::LocalToRemote => (local, remote),
            Direction::RemoteToLocal => (remote, local),
        };

        let show_progress = options.progress && options.verbosity >= 2;
        let mut reader = src.open_readable(&entry.name).await?;
        let mut on_block = |n: u64| {
            stats.bytes_written += n;
            if is_upload {
                stats.upload_bytes_written += n;
            } else {
                stats.download_bytes_written += n;
            }
            if show_progress {
                eprint!(".");
                let _ = io::stderr().flush();
            }
        };
        let written = dest
            .write_file(
                &entry.name,
                reader.as_mut(),
                options.block_size,
                Some(&mut on_block),
            )
            .await?;
        if show_progress {
            eprintln!();
        }

        if dest.supports_set_mtime() {
            dest.set_mtime(&entry.name, entry.adjusted(), written).await?;
        } else {
            dest_meta.record_write(&entry.name, entry.adjusted(), written);
        }
        Ok(())
    }

    /// Create a directory on the destination and copy everything beneath it
    pub(crate) fn copy_dir_recursive<'a>(
        &'a mut self,
        direction: Direction,
        name: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.stats.dirs_created += 1;
            self.stats.entries_touched += 1;
            if self.options.dry_run {
                return Ok(());
            }

            match direction {
                Direction::LocalToRemote => self.remote.make_dir(name).await?,
                Direction::RemoteToLocal => self.local.make_dir(name).await?,
            }
            self.local.change_dir(name).await?;
            self.remote.change_dir(name).await?;

            let mut local_meta = DirMetadata::load(self.local.as_mut()).await?;
            let mut remote_meta = DirMetadata::load(self.remote.as_mut()).await?;
            let mut entries = match direction {
                Direction::LocalToRemote => self.local.list_dir().await?,
                Direction::RemoteToLocal => self.remote.list_dir().await?,
            };
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            match direction {
                Direction::LocalToRemote => local_meta.apply_adjusted(&mut entries),
                Direction::RemoteToLocal => remote_meta.apply_adjusted(&mut entries),
            }

            for entry in &entries {
                if !self.filter.matches(entry) {
                    continue;
                }
                self.stats.entries_seen += 1;
                self.log_action("copy", "new", direction.symbol(), entry, 3);
                if entry.is_directory {
                    self.copy_dir_recursive(direction, &entry.name).await?;
                } else {
                    self.copy_and_mark(direction, entry, &mut local_meta, &mut remote_meta)
                        .await?;
                }
            }

            local_meta
                .flush(self.local.as_mut(), self.options.dry_run)
                .await?;
            remote_meta
                .flush(self.remote.as_mut(), self.options.dry_run)
                .await?;

            self.local.change_dir("..").await?;
            self.remote.change_dir("..").await?;
            Ok(())
        })
    }

    /// Remove one file and clear its ledger entries on both sides
    pub(crate) async fn delete_file_on(
        &mut self,
        side: Side,
        name: &str,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        self.stats.files_deleted += 1;
        self.stats.entries_touched += 1;
        if self.options.dry_run {
            return Ok(());
        }
        match side {
            Side::Local => self.local.remove_file(name).await?,
            Side::Remote => self.remote.remove_file(name).await?,
        }
        local_meta.remove(name);
        remote_meta.remove(name);
        Ok(())
    }

    /// Remove one directory tree and clear its ledger entries on both sides
    pub(crate) async fn delete_dir_on(
        &mut self,
        side: Side,
        name: &str,
        local_meta: &mut DirMetadata,
        remote_meta: &mut DirMetadata,
    ) -> Result<()> {
        self.stats.dirs_deleted += 1;
        self.stats.entries_touched += 1;
        if self.options.dry_run {
            return Ok(());
        }
        match side {
            Side::Local => self.local.remove_dir_all(name).await?,
            Side::Remote => self.remote.remove_dir_all(name).await?,
        }
        local_meta.remove(name);
        remote_meta.remove(name);
        Ok(())
    }
}
