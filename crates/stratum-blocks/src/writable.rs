//! Mutable scratch files.
//!
//! New content is written into uniquely named scratch files before it is
//! frozen into a block. A [`LocalWritableRef`] owns one scratch file and an
//! explicit cursor; every read and write positions the handle at that cursor
//! first, so the cursor is the only source of truth for the offset.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stratum_types::Context;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::error::BlocksResult;
use crate::reader::{resolve_seek, Reader};

const SCRATCH_PREFIX: &str = "dat";

/// A scratch file being written.
#[async_trait]
pub trait WritableRef: Reader {
    /// Write all of `buf` at the cursor and advance it.
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> BlocksResult<usize>;

    /// Give up the handle. The underlying file stays on disk.
    fn release(self)
    where
        Self: Sized;
}

/// Allocates scratch files.
pub trait WriteableStore: Send + Sync {
    type Ref: WritableRef;

    /// A fresh, empty writable ref.
    fn new_write_ref(&self) -> BlocksResult<Self::Ref>;

    /// Create a uniquely named empty file and return its path.
    fn new_file(&self) -> BlocksResult<PathBuf>;
}

/// Scratch files in one local directory.
#[derive(Clone, Debug)]
pub struct LocalWriteableStore {
    dir: PathBuf,
}

impl LocalWriteableStore {
    /// Use `dir` for scratch files, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> BlocksResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create(&self) -> BlocksResult<(std::fs::File, PathBuf)> {
        let (file, path) = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(&self.dir)?
            .keep()
            .map_err(|e| e.error)?;
        debug!(path = %path.display(), "scratch file created");
        Ok((file, path))
    }
}

impl WriteableStore for LocalWriteableStore {
    type Ref = LocalWritableRef;

    fn new_write_ref(&self) -> BlocksResult<LocalWritableRef> {
        let (file, path) = self.create()?;
        Ok(LocalWritableRef {
            path,
            file: File::from_std(file),
            cursor: 0,
            len: 0,
        })
    }

    fn new_file(&self) -> BlocksResult<PathBuf> {
        let (_, path) = self.create()?;
        Ok(path)
    }
}

/// Writable ref over one local scratch file.
#[derive(Debug)]
pub struct LocalWritableRef {
    path: PathBuf,
    file: File,
    cursor: u64,
    /// Length of the file as written through this ref.
    len: u64,
}

impl LocalWritableRef {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    async fn read_at(&mut self, buf: &mut [u8]) -> BlocksResult<usize> {
        self.file.seek(SeekFrom::Start(self.cursor)).await?;
        let n = self.file.read(buf).await?;
        self.cursor += n as u64;
        Ok(n)
    }

    async fn write_at(&mut self, buf: &[u8]) -> BlocksResult<usize> {
        self.file.seek(SeekFrom::Start(self.cursor)).await?;
        self.file.write_all(buf).await?;
        self.file.flush().await?;
        self.cursor += buf.len() as u64;
        self.len = self.len.max(self.cursor);
        Ok(buf.len())
    }
}

#[async_trait]
impl Reader for LocalWritableRef {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize> {
        ctx.run(self.read_at(buf)).await?
    }

    fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64> {
        self.cursor = resolve_seek(self.cursor, Some(self.len), pos)?;
        Ok(self.cursor)
    }
}

#[async_trait]
impl WritableRef for LocalWritableRef {
    async fn write(&mut self, ctx: &Context, buf: &[u8]) -> BlocksResult<usize> {
        ctx.run(self.write_at(buf)).await?
    }

    fn release(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_types::ErrorKind;

    fn store() -> (tempfile::TempDir, LocalWriteableStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalWriteableStore::open(dir.path().join("scratch")).unwrap();
        (dir, store)
    }

    #[test]
    fn new_file_is_empty_and_unique() {
        let (_dir, store) = store();
        let a = store.new_file().unwrap();
        let b = store.new_file().unwrap();
        assert_ne!(a, b);
        assert_eq!(std::fs::metadata(&a).unwrap().len(), 0);
        assert!(a
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
        assert!(a.starts_with(store.dir()));
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let (_dir, store) = store();
        let ctx = Context::background();
        let mut w = store.new_write_ref().unwrap();
        assert!(w.is_empty());

        assert_eq!(w.write(&ctx, b"hello ").await.unwrap(), 6);
        assert_eq!(w.write(&ctx, b"world").await.unwrap(), 5);
        assert_eq!(w.cursor(), 11);
        assert_eq!(w.len(), 11);

        w.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = vec![0u8; 32];
        let n = w.read(&ctx, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello world");
        assert_eq!(w.read(&ctx, &mut buf).await.unwrap(), 0);

        let path = w.path().to_path_buf();
        w.release();
        assert_eq!(std::fs::read(path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn overwrite_in_the_middle() {
        let (_dir, store) = store();
        let ctx = Context::background();
        let mut w = store.new_write_ref().unwrap();
        w.write(&ctx, b"0123456789").await.unwrap();
        w.seek(SeekFrom::Start(3)).unwrap();
        w.write(&ctx, b"abc").await.unwrap();
        assert_eq!(w.cursor(), 6);
        assert_eq!(w.len(), 10);

        w.seek(SeekFrom::End(-4)).unwrap();
        let mut buf = [0u8; 4];
        w.read(&ctx, &mut buf).await.unwrap();
        assert_eq!(&buf, b"6789");
        assert_eq!(std::fs::read(w.path()).unwrap(), b"012abc6789");
    }

    #[tokio::test]
    async fn relative_seek_and_read() {
        let (_dir, store) = store();
        let ctx = Context::background();
        let mut w = store.new_write_ref().unwrap();
        w.write(&ctx, b"abcdef").await.unwrap();
        assert_eq!(w.seek(SeekFrom::Current(-4)).unwrap(), 2);
        let mut buf = [0u8; 2];
        w.read(&ctx, &mut buf).await.unwrap();
        assert_eq!(&buf, b"cd");
        assert_eq!(w.cursor(), 4);

        let err = w.seek(SeekFrom::Current(-10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[tokio::test]
    async fn cancelled_write_is_rejected() {
        let (_dir, store) = store();
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        let mut w = store.new_write_ref().unwrap();
        let err = w.write(&ctx, b"x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(w.cursor(), 0);
    }
}
