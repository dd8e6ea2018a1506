//! Local filesystem target

use async_trait::async_trait;
use driftsync_types::{Entry, Error, Result};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::metadata::is_sidecar_name;
use crate::provider::{BlockCallback, StorageProvider};

/// Storage provider backed by a local directory tree
#[derive(Debug)]
pub struct FsTarget {
    root: PathBuf,
    cur_dir: PathBuf,
    rel_dir: String,
    root_id: String,
    readonly: bool,
}

impl FsTarget {
    /// Create a target rooted at `root`, which must be an existing directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(|e| Error::Io {
            message: format!("cannot resolve root '{}': {}", root.as_ref().display(), e),
        })?;
        if !root.is_dir() {
            return Err(Error::config(format!(
                "'{}' is not a directory",
                root.display()
            )));
        }
        let root_id = root.to_string_lossy().replace('\\', "/");
        Ok(Self {
            cur_dir: root.clone(),
            root,
            rel_dir: String::new(),
            root_id,
            readonly: false,
        })
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.cur_dir.join(name)
    }

    fn guard_name(&self, name: &str) -> Result<()> {
        if name.contains('/') || name.contains('\\') {
            return Err(Error::PathEscape {
                root: self.root.clone(),
                path: self.cur_dir.join(name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for FsTarget {
    fn root_id(&self) -> &str {
        &self.root_id
    }

    fn describe(&self) -> String {
        if self.rel_dir.is_empty() {
            format!("<FS:{}>", self.root.display())
        } else {
            format!("<FS:{} + {}>", self.root.display(), self.rel_dir)
        }
    }

    fn current_rel_dir(&self) -> &str {
        &self.rel_dir
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    async fn change_dir(&mut self, name: &str) -> Result<()> {
        let next = if name == ".." {
            if self.cur_dir == self.root {
                return Err(Error::PathEscape {
                    root: self.root.clone(),
                    path: self.root.parent().unwrap_or(&self.root).to_path_buf(),
                });
            }
            self.cur_dir.parent().unwrap_or(&self.root).to_path_buf()
        } else {
            self.guard_name(name)?;
            self.cur_dir.join(name)
        };
        if !next.starts_with(&self.root) {
            return Err(Error::PathEscape {
                root: self.root.clone(),
                path: next,
            });
        }
        self.cur_dir = next;
        self.rel_dir = self
            .cur_dir
            .strip_prefix(&self.root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        Ok(())
    }

    async fn list_dir(&mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&self.cur_dir).await.map_err(|e| Error::Io {
            message: format!("failed to list '{}': {}", self.cur_dir.display(), e),
        })?;
        while let Some(dir_entry) = read_dir.next_entry().await.map_err(Error::from)? {
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if is_sidecar_name(&name) {
                continue;
            }
            let metadata = dir_entry.metadata().await.map_err(|e| Error::Io {
                message: format!("failed to stat '{}': {}", dir_entry.path().display(), e),
            })?;
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            let entry = if metadata.is_dir() {
                Entry::directory(name, self.rel_dir.clone(), metadata.len(), mtime)
            } else if metadata.is_file() {
                Entry::file(name, self.rel_dir.clone(), metadata.len(), mtime)
            } else {
                // Sockets, fifos and dangling symlinks are not synchronized.
                continue;
            };
            entries.push(entry.with_unique(unique_id(&metadata)));
        }
        Ok(entries)
    }

    async fn make_dir(&mut self, name: &str) -> Result<()> {
        self.check_write(name)?;
        self.guard_name(name)?;
        fs::create_dir(self.full_path(name)).await.map_err(|e| Error::Io {
            message: format!("failed to create directory '{}': {}", name, e),
        })
    }

    async fn remove_dir_all(&mut self, name: &str) -> Result<()> {
        self.check_write(name)?;
        self.guard_name(name)?;
        fs::remove_dir_all(self.full_path(name))
            .await
            .map_err(|e| Error::Io {
                message: format!("failed to remove directory '{}': {}", name, e),
            })
    }

    async fn remove_file(&mut self, name: &str) -> Result<()> {
        self.check_write(name)?;
        self.guard_name(name)?;
        fs::remove_file(self.full_path(name))
            .await
            .map_err(|e| Error::Io {
                message: format!("failed to remove file '{}': {}", name, e),
            })
    }

    async fn open_readable(&mut self, name: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.guard_name(name)?;
        let file = fs::File::open(self.full_path(name))
            .await
            .map_err(|e| Error::Io {
                message: format!("failed to open '{}': {}", name, e),
            })?;
        Ok(Box::new(file))
    }

    async fn write_file(
        &mut self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        block_size: usize,
        mut on_block: Option<BlockCallback<'_>>,
    ) -> Result<u64> {
        self.check_write(name)?;
        self.guard_name(name)?;
        let path = self.full_path(name);
        let mut file = fs::File::create(&path).await.map_err(|e| Error::Io {
            message: format!("failed to create '{}': {}", path.display(), e),
        })?;
        let mut buf = vec![0u8; block_size.max(1)];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf).await.map_err(Error::from)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await.map_err(Error::from)?;
            total += n as u64;
            if let Some(cb) = on_block.as_deref_mut() {
                cb(n as u64);
            }
        }
        file.flush().await.map_err(Error::from)?;
        debug!("wrote {} bytes to {}/{}", total, self.rel_dir, name);
        Ok(total)
    }

    async fn set_mtime(&mut self, name: &str, mtime: f64, _size: u64) -> Result<()> {
        self.check_write(name)?;
        self.guard_name(name)?;
        let secs = mtime.floor() as i64;
        let nanos = ((mtime - mtime.floor()) * 1e9) as u32;
        filetime::set_file_mtime(self.full_path(name), FileTime::from_unix_time(secs, nanos))
            .map_err(|e| Error::Io {
                message: format!("failed to set mtime for '{}': {}", name, e),
            })
    }

    async fn read_text(&mut self, name: &str) -> Result<Option<String>> {
        self.guard_name(name)?;
        match fs::read_to_string(self.full_path(name)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }
}

#[cfg(unix)]
fn unique_id(metadata: &std::fs::Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    metadata.ino().to_string()
}

#[cfg(not(unix))]
fn unique_id(_metadata: &std::fs::Metadata) -> String {
    String::new()
}
