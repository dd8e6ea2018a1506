//! Storage targets and per-directory metadata for driftsync
//!
//! This crate provides the narrow capability contract the synchronization
//! engine consumes ([`StorageProvider`]), the per-directory metadata sidecar
//! ([`DirMetadata`]) that compensates for media which cannot preserve
//! modification times and records peer-sync reference points, and the local
//! filesystem provider ([`FsTarget`]).
//!
//! A provider exposes one exclusive current-directory cursor scoped to a
//! configured root; any navigation that would escape the root is a fatal
//! error. Read-only providers reject every mutation except writing the
//! sidecar itself.
//!
//! # Examples
//!
//! ```rust,no_run
//! use driftsync_target::{FsTarget, StorageProvider};
//!
//! # async fn example() -> driftsync_types::Result<()> {
//! let mut target = FsTarget::new("/data/photos")?;
//! for entry in target.list_dir().await? {
//!     println!("{} ({} bytes)", entry.display_name(), entry.size);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod local;
pub mod metadata;
pub mod provider;

pub use local::FsTarget;
pub use metadata::{is_sidecar_name, DirMetadata, FileRecord, PeerRecord, META_FILE_NAME};
pub use provider::{BlockCallback, StorageProvider, DEFAULT_BLOCK_SIZE};
