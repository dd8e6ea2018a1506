//! Shared fixtures and helpers for the integration tests

use async_trait::async_trait;
use filetime::FileTime;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::AsyncRead;

use driftsync_target::{BlockCallback, FsTarget, StorageProvider};
use driftsync_types::{Entry, Result};

/// Deterministic modification time for fixture files, 2014-01-01 12:00:00 UTC
pub const FIXED_MTIME: f64 = 1_388_577_600.0;

/// A pair of temporary directory trees acting as the two sides of a run
pub struct SyncFixture {
    /// The side passed as LOCAL
    pub local: TempDir,
    /// The side passed as REMOTE
    pub remote: TempDir,
}

impl SyncFixture {
    /// Two empty trees
    pub fn new() -> Self {
        Self {
            local: TempDir::new().unwrap(),
            remote: TempDir::new().unwrap(),
        }
    }

    /// Standard tree on the local side, empty remote
    ///
    /// Six files in three directories, 16403 bytes total, all stamped with
    /// [`FIXED_MTIME`].
    pub fn with_local_tree() -> Self {
        let fixture = Self::new();
        populate_tree(fixture.local.path());
        fixture
    }

    /// Standard tree on the remote side, empty local
    pub fn with_remote_tree() -> Self {
        let fixture = Self::new();
        populate_tree(fixture.remote.path());
        fixture
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Write the standard fixture tree under `root`
pub fn populate_tree(root: &Path) {
    write_file(root, "file1.txt", "111");
    write_file(root, "file2.txt", "222");
    write_file(root, "file3.txt", "333");
    write_file(root, "big_file.txt", &"*".repeat(16_384));
    std::fs::create_dir(root.join("folder1")).unwrap();
    write_file(root, "folder1/file1_1.txt", "1.111");
    std::fs::create_dir(root.join("folder2")).unwrap();
    write_file(root, "folder2/file2_1.txt", "2.111");
}

/// Write `content` to `rel` under `root`, stamped with [`FIXED_MTIME`]
pub fn write_file(root: &Path, rel: &str, content: &str) {
    write_file_at(root, rel, content, FIXED_MTIME);
}

/// Write `content` to `rel` under `root` with an explicit mtime
pub fn write_file_at(root: &Path, rel: &str, content: &str, mtime: f64) {
    let path = root.join(rel);
    std::fs::write(&path, content).unwrap();
    set_mtime(&path, mtime);
}

/// Stamp `path` with `mtime` (UTC seconds)
pub fn set_mtime(path: &Path, mtime: f64) {
    let secs = mtime.floor() as i64;
    let nanos = ((mtime - mtime.floor()) * 1e9) as u32;
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, nanos)).unwrap();
}

/// Read `rel` under `root` as UTF-8
pub fn read_file(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

/// Whether `rel` exists under `root`
pub fn exists(root: &Path, rel: &str) -> bool {
    root.join(rel).exists()
}

/// Filesystem provider that pretends its medium cannot preserve mtimes
///
/// Written files keep whatever mtime the filesystem assigns, so the engine
/// has to fall back to the sidecar for comparisons, exactly like a server
/// that stamps uploads with the transfer time.
pub struct NoMtimeTarget {
    inner: FsTarget,
}

impl NoMtimeTarget {
    /// Wrap a directory root
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self {
            inner: FsTarget::new(root)?,
        })
    }
}

#[async_trait]
impl StorageProvider for NoMtimeTarget {
    fn root_id(&self) -> &str {
        self.inner.root_id()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn current_rel_dir(&self) -> &str {
        self.inner.current_rel_dir()
    }

    fn is_readonly(&self) -> bool {
        self.inner.is_readonly()
    }

    fn set_readonly(&mut self, readonly: bool) {
        self.inner.set_readonly(readonly);
    }

    fn supports_set_mtime(&self) -> bool {
        false
    }

    async fn change_dir(&mut self, name: &str) -> Result<()> {
        self.inner.change_dir(name).await
    }

    async fn list_dir(&mut self) -> Result<Vec<Entry>> {
        self.inner.list_dir().await
    }

    async fn make_dir(&mut self, name: &str) -> Result<()> {
        self.inner.make_dir(name).await
    }

    async fn remove_dir_all(&mut self, name: &str) -> Result<()> {
        self.inner.remove_dir_all(name).await
    }

    async fn remove_file(&mut self, name: &str) -> Result<()> {
        self.inner.remove_file(name).await
    }

    async fn open_readable(&mut self, name: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.inner.open_readable(name).await
    }

    async fn write_file(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        block_size: usize,
        on_block: Option<BlockCallback<'_>>,
    ) -> Result<u64> {
        self.inner.write_file(name, reader, block_size, on_block).await
    }

    async fn set_mtime(&mut self, _name: &str, _mtime: f64, _size: u64) -> Result<()> {
        // The medium drops mtimes; the engine must not rely on this.
        Ok(())
    }

    async fn read_text(&mut self, name: &str) -> Result<Option<String>> {
        self.inner.read_text(name).await
    }
}
