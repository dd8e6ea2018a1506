//! The storage provider capability contract
//!
//! The synchronization engine consumes targets exclusively through this
//! trait; it does not know how listing, transfer, or authentication are
//! implemented underneath. Every call is scoped to the provider's
//! current-directory cursor.

use async_trait::async_trait;
use driftsync_types::{Entry, Error, Result};
use tokio::io::AsyncRead;

use crate::metadata::META_FILE_NAME;

/// Default copy block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Per-block progress callback, invoked with the bytes written for each block
pub type BlockCallback<'a> = &'a mut (dyn FnMut(u64) + Send);

/// Capability contract for one side of a synchronization pair
///
/// Implementations own an exclusive current-directory cursor rooted at a
/// configured directory. The engine never operates on a provider from more
/// than one logical path at a time, so implementations need no internal
/// locking beyond their own connection discipline.
#[async_trait]
pub trait StorageProvider: Send {
    /// Stable identifier for this target, used as the peer id in metadata
    fn root_id(&self) -> &str;

    /// Human-readable description including the cursor position
    fn describe(&self) -> String;

    /// Cursor path relative to the root, `/`-separated, empty at the root
    fn current_rel_dir(&self) -> &str;

    /// Whether mutations (other than the sidecar) are rejected
    fn is_readonly(&self) -> bool;

    /// Toggle write protection
    fn set_readonly(&mut self, readonly: bool);

    /// Whether the medium can persist modification times itself
    ///
    /// When `false` the engine records true mtimes in the directory sidecar
    /// instead of calling [`set_mtime`](Self::set_mtime).
    fn supports_set_mtime(&self) -> bool {
        true
    }

    /// Fail with a write-protection error unless writing `name` is allowed
    ///
    /// The sidecar file is the one exempted mutation on read-only targets.
    fn check_write(&self, name: &str) -> Result<()> {
        if self.is_readonly() && name != META_FILE_NAME {
            return Err(Error::write_protected(format!(
                "{} / {}",
                self.describe(),
                name
            )));
        }
        Ok(())
    }

    /// Move the cursor into `name`, or to the parent for `".."`
    ///
    /// Any resulting path outside the configured root is a fatal
    /// [`Error::PathEscape`].
    async fn change_dir(&mut self, name: &str) -> Result<()>;

    /// List files and subdirectories of the current directory
    ///
    /// The sidecar metadata file is never returned as an entry.
    async fn list_dir(&mut self) -> Result<Vec<Entry>>;

    /// Create `name` inside the current directory
    async fn make_dir(&mut self, name: &str) -> Result<()>;

    /// Remove the directory `name` and everything beneath it
    async fn remove_dir_all(&mut self, name: &str) -> Result<()>;

    /// Remove the file `name` from the current directory
    async fn remove_file(&mut self, name: &str) -> Result<()>;

    /// Open `name` for reading as a byte stream
    async fn open_readable(&mut self, name: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Write `reader` to `name` in `block_size` chunks
    ///
    /// Invokes `on_block` with the bytes written for every block; returns the
    /// total bytes written.
    async fn write_file(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        block_size: usize,
        on_block: Option<BlockCallback<'_>>,
    ) -> Result<u64>;

    /// Set the modification time of `name` to `mtime` (UTC seconds)
    ///
    /// `size` accompanies the call for providers that key their bookkeeping
    /// on it; filesystem targets ignore it.
    async fn set_mtime(&mut self, name: &str, mtime: f64, size: u64) -> Result<()>;

    /// Read `name` as UTF-8 text; `Ok(None)` when the file does not exist
    ///
    /// Used exclusively for the metadata sidecar.
    async fn read_text(&mut self, name: &str) -> Result<Option<String>>;

    /// Write UTF-8 text to `name`, built atop the stream primitives
    async fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        let mut reader = std::io::Cursor::new(text.as_bytes().to_vec());
        self.write_file(name, &mut reader, DEFAULT_BLOCK_SIZE, None)
            .await?;
        Ok(())
    }
}
