//! Two-target directory synchronization engine
//!
//! The engine walks a pair of [`StorageProvider`](driftsync_target::StorageProvider)
//! targets in lockstep and reconciles them in one of three ways:
//!
//! - **upload**: the remote side mirrors the local side
//! - **download**: the local side mirrors the remote side
//! - **bidirectional**: changes propagate both ways, with conflicts detected
//!   against the state recorded at the last successful synchronization
//!
//! Every run is a dry run unless [`SyncOptions::dry_run`] is cleared, and
//! nothing is deleted unless deletions are enabled explicitly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use driftsync_sync::{Synchronizer, SyncOptions};
//! use driftsync_target::FsTarget;
//!
//! # async fn example() -> driftsync_types::Result<()> {
//! let local = Box::new(FsTarget::new("/data/photos")?);
//! let remote = Box::new(FsTarget::new("/mnt/backup/photos")?);
//! let options = SyncOptions {
//!     dry_run: false,
//!     ..SyncOptions::default()
//! };
//! let report = Synchronizer::upload(local, remote, options)?.run().await?;
//! println!("wrote {} files", report.stats.files_written);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod engine;
pub mod filter;
pub mod options;

mod transfer;

pub use engine::{SyncMode, Synchronizer};
pub use filter::PathFilter;
pub use options::SyncOptions;
