// Copyright 2022 Debox Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//
use std::fmt::{Debug, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Stream of file content chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

const READ_CHUNK: usize = 64 * 1024;

/// Trait that defines the interface for interaction with the backing storage.
///
/// Every physical path handed to it has already been resolved and checked
/// for containment.
#[async_trait]
pub trait StorageApi: Send + Sync + Debug {
    /// Display the status of a file or directory, following symlinks.
    async fn stat(&self, path: &Path) -> io::Result<StorageEntry>;

    /// List the immediate children of a directory.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>>;

    /// Resolve symlinks and relative components.
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Read the target of a symbolic link without following it.
    async fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Make a single directory, the parent must exist.
    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Make a directory and any missing ancestors.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Read a file as a stream of chunks.
    async fn read(&self, path: &Path) -> io::Result<ByteStream>;

    /// Replace the content of a file with the whole stream. Returns the
    /// number of bytes written.
    async fn write(&self, path: &Path, body: ByteStream) -> io::Result<u64>;

    /// Copy a single file byte for byte.
    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file.
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory with all of its content.
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceKind {
    Directory,
    File,
}

/// Storage entity representation.
#[derive(Debug, Clone)]
pub struct StorageEntry {
    /// Absolute physical path.
    pub path: PathBuf,

    pub kind: ResourceKind,

    /// Time of creation, modification time where the platform has none.
    pub crtime: SystemTime,

    /// Time of last modification.
    pub mtime: SystemTime,

    /// Size in bytes, zero for directories.
    pub size: u64,
}

impl StorageEntry {
    fn from_metadata(path: PathBuf, meta: &std::fs::Metadata) -> Self {
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let (kind, size) = if meta.is_dir() {
            (ResourceKind::Directory, 0)
        } else {
            (ResourceKind::File, meta.len())
        };
        Self {
            path,
            kind,
            crtime: meta.created().unwrap_or(mtime),
            mtime,
            size,
        }
    }

    /// Final path component.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// The default storage implementation, operating on the local filesystem.
pub struct LocalApi;

impl LocalApi {
    /// Creates default instance of `LocalApi`
    pub fn new() -> Box<LocalApi> {
        Box::new(LocalApi)
    }
}

impl Debug for LocalApi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalApi")
    }
}

#[async_trait]
impl StorageApi for LocalApi {
    async fn stat(&self, path: &Path) -> io::Result<StorageEntry> {
        let meta = fs::metadata(path).await?;
        Ok(StorageEntry::from_metadata(path.to_path_buf(), &meta))
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<StorageEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let child = entry.path();
            match fs::metadata(&child).await {
                Ok(meta) => entries.push(StorageEntry::from_metadata(child, &meta)),
                // removed since listed, or a dangling link
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!("LA: skip vanished entry {:?}", entry.file_name());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path).await
    }

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path).await
    }

    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        trace!("LA: create_dir {:?}", path);
        fs::create_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        trace!("LA: create_dir_all {:?}", path);
        fs::create_dir_all(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<ByteStream> {
        trace!("LA: read {:?}", path);
        let file = fs::File::open(path).await?;
        let chunks = stream::try_unfold(file, |mut file| async move {
            let mut buf = BytesMut::with_capacity(READ_CHUNK);
            let n = file.read_buf(&mut buf).await?;
            Ok::<_, io::Error>((n > 0).then(|| (buf.freeze(), file)))
        });
        Ok(chunks.boxed())
    }

    async fn write(&self, path: &Path, mut body: ByteStream) -> io::Result<u64> {
        trace!("LA: write {:?}", path);
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        let name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let tmp = TempFile(parent.join(format!(
            ".{}.{}.part",
            name.to_string_lossy(),
            uuid::Uuid::new_v4().simple()
        )));

        let mut file = fs::File::create(&tmp.0).await?;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp.0, path).await?;
        tmp.keep();
        Ok(written)
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        trace!("LA: copy_file {:?} {:?}", from, to);
        fs::copy(from, to).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        trace!("LA: rename {:?} {:?}", from, to);
        fs::rename(from, to).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        trace!("LA: remove_file {:?}", path);
        fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        trace!("LA: remove_dir_all {:?}", path);
        fs::remove_dir_all(path).await
    }
}

/// Partially written upload, removed unless the write completes.
struct TempFile(PathBuf);

impl TempFile {
    fn keep(mut self) {
        self.0 = PathBuf::new();
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.0.as_os_str().is_empty() {
            let _ = std::fs::remove_file(&self.0);
        }
    }
}

/// Wraps a complete buffer into a single-chunk stream.
pub fn body_from_bytes(data: impl Into<Bytes>) -> ByteStream {
    stream::once(futures::future::ready(Ok(data.into()))).boxed()
}

/// Drains a stream into a single buffer.
pub async fn collect_body(body: ByteStream) -> io::Result<Bytes> {
    let data = body
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await?;
    Ok(data.freeze())
}
