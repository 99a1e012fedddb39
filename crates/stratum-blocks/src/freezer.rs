//! Freezing scratch files into identified blocks.
//!
//! The [`LocalFreezer`] owns a directory of frozen blocks named by the
//! base64 form of their id. Blocks enter it either by freezing a local file
//! (hash, then move into the directory) or by registering remote content.
//! Frozen-but-unpushed blocks are pending until [`LocalFreezer::push`]
//! uploads them through the remote factory.
//!
//! A file only ever appears under a block name by an atomic rename, so a
//! name in the directory always holds the complete content of that block.
//! Reopening a directory restores its frozen blocks as pending.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use stratum_remote::{RemoteError, RemoteRef, RemoteRefFactory};
use stratum_types::{decode_block_id, encode_block_id, BlockHasher, BlockId, Context, NodeRepr};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::adapter::PinnedReader;
use crate::error::{BlocksError, BlocksResult};
use crate::reader::{FrozenRef, LocalFrozenRef, RemoteFrozenRef};
use crate::writable::{LocalWritableRef, WritableRef};

const HASH_CHUNK: usize = 64 * 1024;
const STAGING_PREFIX: &str = ".stage";

/// A block produced by freezing a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBlock {
    pub bid: BlockId,
    pub size: u64,
    /// Location of the frozen copy.
    pub path: PathBuf,
}

/// Turns files into immutable blocks and serves readers over them.
#[async_trait]
pub trait Freezer: Send + Sync {
    /// Hash `path` and take ownership of it as a frozen block.
    async fn add_file(&self, ctx: &Context, path: &Path) -> BlocksResult<NewBlock>;

    /// Register `bid` as readable through `remote`, without downloading it.
    async fn add_block(
        &self,
        ctx: &Context,
        bid: BlockId,
        remote: Arc<dyn RemoteRef>,
    ) -> BlocksResult<()>;

    /// A reader over block `bid`.
    async fn get_ref(&self, ctx: &Context, bid: &BlockId) -> BlocksResult<Box<dyn FrozenRef>>;

    /// Returns `true` once `bid` is durable in remote storage.
    fn is_pushed(&self, bid: &BlockId) -> BlocksResult<bool>;
}

#[derive(Default)]
struct FreezerState {
    local: HashMap<BlockId, NewBlock>,
    remote: HashMap<BlockId, Arc<dyn RemoteRef>>,
    pushed: HashSet<BlockId>,
}

/// [`Freezer`] keeping frozen blocks in a local directory.
pub struct LocalFreezer<F> {
    dir: PathBuf,
    factory: Arc<F>,
    state: RwLock<FreezerState>,
}

impl<F: RemoteRefFactory + 'static> LocalFreezer<F> {
    /// Keep frozen blocks in `dir`, creating it if needed, and push through
    /// `factory`.
    ///
    /// Blocks already frozen in `dir` are picked up as pending.
    pub fn open(dir: impl Into<PathBuf>, factory: Arc<F>) -> BlocksResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let local = Self::scan(&dir)?;
        if !local.is_empty() {
            info!(dir = %dir.display(), blocks = local.len(), "frozen blocks restored");
        }
        Ok(Self {
            dir,
            factory,
            state: RwLock::new(FreezerState {
                local,
                ..FreezerState::default()
            }),
        })
    }

    /// Index the block files of `dir`. Leftover staging files are removed;
    /// other names that are not block ids are skipped.
    fn scan(dir: &Path) -> BlocksResult<HashMap<BlockId, NewBlock>> {
        let mut local = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name();
            let text = name.to_str().unwrap_or_default();
            if text.starts_with(STAGING_PREFIX) {
                std::fs::remove_file(entry.path())?;
                continue;
            }
            let Ok(bid) = decode_block_id(text.as_bytes()) else {
                debug!(file = ?name, "skipping non-block file");
                continue;
            };
            local.insert(
                bid,
                NewBlock {
                    bid,
                    size: meta.len(),
                    path: entry.path(),
                },
            );
        }
        Ok(local)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Release `writable` and freeze the file it wrote.
    pub async fn freeze(&self, ctx: &Context, writable: LocalWritableRef) -> BlocksResult<NewBlock> {
        let path = writable.path().to_path_buf();
        writable.release();
        self.add_file(ctx, &path).await
    }

    /// Upload block `bid` and mark it pushed. Already-pushed blocks are
    /// skipped.
    pub async fn push(&self, ctx: &Context, bid: &BlockId) -> BlocksResult<()> {
        if self.is_pushed(bid)? {
            debug!(block = %bid.short_hex(), "already pushed");
            return Ok(());
        }
        let reader = self.get_ref(ctx, bid).await?;
        let mut source = PinnedReader::new(reader, ctx.clone());
        self.factory.push(ctx, bid, &mut source).await?;
        self.write_state()?.pushed.insert(*bid);
        info!(block = %bid.short_hex(), "block pushed");
        Ok(())
    }

    /// Push every pending block, returning the ids uploaded.
    pub async fn push_all(&self, ctx: &Context) -> BlocksResult<Vec<BlockId>> {
        let pending = self.pending()?;
        for bid in &pending {
            self.push(ctx, bid).await?;
        }
        Ok(pending)
    }

    /// Frozen local blocks not yet pushed, in id order.
    pub fn pending(&self) -> BlocksResult<Vec<BlockId>> {
        let state = self.read_state()?;
        let mut ids: Vec<BlockId> = state
            .local
            .keys()
            .filter(|bid| !state.pushed.contains(*bid))
            .copied()
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn read_state(&self) -> BlocksResult<RwLockReadGuard<'_, FreezerState>> {
        self.state.read().map_err(|_| BlocksError::Poisoned)
    }

    fn write_state(&self) -> BlocksResult<RwLockWriteGuard<'_, FreezerState>> {
        self.state.write().map_err(|_| BlocksError::Poisoned)
    }

    fn frozen_path(&self, bid: &BlockId) -> PathBuf {
        self.dir.join(encode_block_id(bid))
    }

    async fn hash_file(path: &Path) -> BlocksResult<(BlockId, u64)> {
        let mut file = File::open(path).await?;
        let mut hasher = BlockHasher::new();
        let mut buf = vec![0u8; HASH_CHUNK];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok((hasher.finalize(), hasher.len()))
    }

    /// Whether `path` exists and hashes to `bid`.
    async fn holds_block(path: &Path, bid: &BlockId) -> BlocksResult<bool> {
        match Self::hash_file(path).await {
            Ok((found, _)) => Ok(found == *bid),
            Err(BlocksError::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn move_into_place(&self, source: &Path, dest: &Path, bid: &BlockId) -> BlocksResult<()> {
        if Self::holds_block(dest, bid).await? {
            tokio::fs::remove_file(source).await?;
            return Ok(());
        }
        if tokio::fs::try_exists(dest).await? {
            warn!(block = %bid.short_hex(), path = %dest.display(), "replacing damaged frozen block");
        }
        match tokio::fs::rename(source, dest).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                self.copy_into_place(source, dest).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copy `source` into a staging file in the frozen directory, then
    /// rename it over `dest`. An interrupted copy leaves only the staging
    /// file, which is removed when dropped.
    async fn copy_into_place(&self, source: &Path, dest: &Path) -> BlocksResult<()> {
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.dir)?
            .into_temp_path();
        tokio::fs::copy(source, &staging).await?;
        staging.persist(dest).map_err(|e| e.error)?;
        tokio::fs::remove_file(source).await?;
        Ok(())
    }

    async fn freeze_file(&self, path: &Path) -> BlocksResult<NewBlock> {
        let (bid, size) = Self::hash_file(path).await?;
        let dest = self.frozen_path(&bid);
        self.move_into_place(path, &dest, &bid).await?;
        Ok(NewBlock {
            bid,
            size,
            path: dest,
        })
    }
}

impl<F> std::fmt::Debug for LocalFreezer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (local, pushed) = self
            .state
            .read()
            .map(|s| (s.local.len(), s.pushed.len()))
            .unwrap_or_default();
        f.debug_struct("LocalFreezer")
            .field("dir", &self.dir)
            .field("local", &local)
            .field("pushed", &pushed)
            .finish()
    }
}

#[async_trait]
impl<F: RemoteRefFactory + 'static> Freezer for LocalFreezer<F> {
    async fn add_file(&self, ctx: &Context, path: &Path) -> BlocksResult<NewBlock> {
        let block = ctx.run(self.freeze_file(path)).await??;
        info!(
            block = %block.bid.short_hex(),
            size = block.size,
            path = %block.path.display(),
            "file frozen"
        );
        self.write_state()?.local.insert(block.bid, block.clone());
        Ok(block)
    }

    async fn add_block(
        &self,
        ctx: &Context,
        bid: BlockId,
        remote: Arc<dyn RemoteRef>,
    ) -> BlocksResult<()> {
        ctx.check()?;
        let in_cas = matches!(remote.locator(), NodeRepr::Block(b) if b == bid);
        let mut state = self.write_state()?;
        if in_cas {
            state.pushed.insert(bid);
        }
        state.remote.insert(bid, remote);
        debug!(block = %bid.short_hex(), in_cas, "remote block registered");
        Ok(())
    }

    async fn get_ref(&self, ctx: &Context, bid: &BlockId) -> BlocksResult<Box<dyn FrozenRef>> {
        let (local, remote) = {
            let state = self.read_state()?;
            (
                state.local.get(bid).map(|b| b.path.clone()),
                state.remote.get(bid).cloned(),
            )
        };
        if let Some(path) = local {
            let reader = ctx.run(LocalFrozenRef::open(&path)).await??;
            return Ok(Box::new(reader));
        }
        if let Some(remote) = remote {
            return Ok(Box::new(RemoteFrozenRef::new(remote)));
        }

        let remote: Arc<dyn RemoteRef> = match self.factory.get_ref(ctx, &NodeRepr::Block(*bid)).await {
            Ok(remote) => Arc::from(remote),
            Err(RemoteError::BlockNotFound(_)) => return Err(BlocksError::BlockNotFound(*bid)),
            Err(e) => return Err(e.into()),
        };
        {
            let mut state = self.write_state()?;
            state.pushed.insert(*bid);
            state.remote.insert(*bid, Arc::clone(&remote));
        }
        debug!(block = %bid.short_hex(), "resolved block through remote factory");
        Ok(Box::new(RemoteFrozenRef::new(remote)))
    }

    fn is_pushed(&self, bid: &BlockId) -> BlocksResult<bool> {
        Ok(self.read_state()?.pushed.contains(bid))
    }
}
