//! Cursor-based readers over block content.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use stratum_remote::RemoteRef;
use stratum_types::Context;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{BlocksError, BlocksResult};

/// A readable byte source with its own cursor.
#[async_trait]
pub trait Reader: Send {
    /// Read up to `buf.len()` bytes at the cursor and advance it.
    ///
    /// Returns `0` at end of data.
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize>;

    /// Move the cursor. `Start` and `Current` are always supported; `End`
    /// only when the size is known.
    fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64>;
}

/// Read access to an immutable, identified block.
pub trait FrozenRef: Reader {
    fn size(&self) -> u64;

    /// Drop the handle and any resources behind it.
    fn release(self: Box<Self>);
}

#[async_trait]
impl<R: Reader + ?Sized> Reader for Box<R> {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize> {
        (**self).read(ctx, buf).await
    }

    fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64> {
        (**self).seek(pos)
    }
}

/// New cursor position after applying `pos` to `cursor`.
pub(crate) fn resolve_seek(cursor: u64, size: Option<u64>, pos: SeekFrom) -> BlocksResult<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => cursor.checked_add_signed(delta),
        SeekFrom::End(delta) => {
            let size = size.ok_or_else(|| {
                BlocksError::UnsupportedSeek("size unknown; cannot seek from end".into())
            })?;
            size.checked_add_signed(delta)
        }
    };
    target.ok_or_else(|| BlocksError::InvalidSeek(format!("{pos:?} from {cursor}")))
}

/// Reader over a frozen block resident in a local file.
#[derive(Debug)]
pub struct LocalFrozenRef {
    path: PathBuf,
    file: File,
    size: u64,
    cursor: u64,
}

impl LocalFrozenRef {
    pub async fn open(path: &Path) -> BlocksResult<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            cursor: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_at(&mut self, buf: &mut [u8]) -> BlocksResult<usize> {
        self.file.seek(SeekFrom::Start(self.cursor)).await?;
        let n = self.file.read(buf).await?;
        self.cursor += n as u64;
        Ok(n)
    }
}

#[async_trait]
impl Reader for LocalFrozenRef {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize> {
        ctx.run(self.read_at(buf)).await?
    }

    fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64> {
        self.cursor = resolve_seek(self.cursor, Some(self.size), pos)?;
        Ok(self.cursor)
    }
}

impl FrozenRef for LocalFrozenRef {
    fn size(&self) -> u64 {
        self.size
    }

    fn release(self: Box<Self>) {}
}

/// Reader that fetches each requested range from a remote ref on demand.
pub struct RemoteFrozenRef {
    remote: Arc<dyn RemoteRef>,
    cursor: u64,
}

impl RemoteFrozenRef {
    pub fn new(remote: Arc<dyn RemoteRef>) -> Self {
        Self { remote, cursor: 0 }
    }
}

impl std::fmt::Debug for RemoteFrozenRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFrozenRef")
            .field("locator", &self.remote.locator())
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[async_trait]
impl Reader for RemoteFrozenRef {
    async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize> {
        let size = self.remote.size();
        if self.cursor >= size || buf.is_empty() {
            return Ok(0);
        }
        let len = (size - self.cursor).min(buf.len() as u64);
        let mut sink = Vec::with_capacity(len as usize);
        self.remote.copy(ctx, self.cursor, len, &mut sink).await?;
        buf[..sink.len()].copy_from_slice(&sink);
        self.cursor += len;
        Ok(sink.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64> {
        self.cursor = resolve_seek(self.cursor, Some(self.remote.size()), pos)?;
        Ok(self.cursor)
    }
}

impl FrozenRef for RemoteFrozenRef {
    fn size(&self) -> u64 {
        self.remote.size()
    }

    fn release(self: Box<Self>) {}
}
