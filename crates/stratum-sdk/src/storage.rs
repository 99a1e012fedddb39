use std::sync::Arc;

use stratum_blocks::{
    Freezer, LocalFreezer, LocalWriteableStore, NewBlock, Reader, WritableRef,
    WriteableStore,
};
use stratum_kv::{InMemoryKvStore, KvStore};
use stratum_remote::{BucketRemoteFactory, InMemoryObjectClient, RemoteError, RemoteRefFactory};
use stratum_types::{BlockId, Context};
use tracing::info;

use crate::config::StorageConfig;
use crate::error::SdkResult;

type MemoryFactory = BucketRemoteFactory<InMemoryObjectClient>;

const READ_CHUNK: usize = 64 * 1024;

/// The storage core wired together from one [`StorageConfig`].
pub struct Storage {
    config: StorageConfig,
    kv: InMemoryKvStore,
    remote: Arc<MemoryFactory>,
    writeable: LocalWriteableStore,
    freezer: LocalFreezer<MemoryFactory>,
}

impl Storage {
    /// Build a storage stack over in-memory object storage and an in-memory
    /// metadata store. Scratch and frozen directories live on disk.
    pub fn open_in_memory(config: StorageConfig) -> SdkResult<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(RemoteError::from)?;
        let remote = Arc::new(
            BucketRemoteFactory::in_memory(config.bucket.clone(), &config.key_prefix)?
                .with_http_client(http),
        );
        let kv = InMemoryKvStore::new(&config.metadata_buckets);
        let writeable = LocalWriteableStore::open(&config.scratch_dir)?;
        let freezer = LocalFreezer::open(&config.frozen_dir, Arc::clone(&remote))?;
        info!(
            bucket = %config.bucket,
            prefix = %config.key_prefix,
            scratch = %config.scratch_dir.display(),
            "storage opened"
        );
        Ok(Self {
            config,
            kv,
            remote,
            writeable,
            freezer,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn kv(&self) -> &InMemoryKvStore {
        &self.kv
    }

    pub fn remote(&self) -> &Arc<MemoryFactory> {
        &self.remote
    }

    pub fn writeable(&self) -> &LocalWriteableStore {
        &self.writeable
    }

    pub fn freezer(&self) -> &LocalFreezer<MemoryFactory> {
        &self.freezer
    }

    /// Write `data` to a scratch file and freeze it.
    pub async fn write_block(&self, ctx: &Context, data: &[u8]) -> SdkResult<NewBlock> {
        let mut writable = self.writeable.new_write_ref()?;
        writable.write(ctx, data).await?;
        Ok(self.freezer.freeze(ctx, writable).await?)
    }

    /// Read all of block `bid`, locally or from remote storage.
    pub async fn read_block(&self, ctx: &Context, bid: &BlockId) -> SdkResult<Vec<u8>> {
        let mut reader = self.freezer.get_ref(ctx, bid).await?;
        let mut out = Vec::with_capacity(reader.size() as usize);
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = reader.read(ctx, &mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        reader.release();
        Ok(out)
    }

    /// Upload a frozen block.
    pub async fn push(&self, ctx: &Context, bid: &BlockId) -> SdkResult<()> {
        Ok(self.freezer.push(ctx, bid).await?)
    }

    /// Push `bid` if needed, then point root `name` at it.
    pub async fn publish_root(&self, ctx: &Context, name: &str, bid: &BlockId) -> SdkResult<()> {
        self.freezer.push(ctx, bid).await?;
        self.remote.set_root(ctx, name, bid).await?;
        Ok(())
    }

    /// Current value of root `name`.
    pub async fn resolve_root(&self, ctx: &Context, name: &str) -> SdkResult<BlockId> {
        Ok(self.remote.get_root(ctx, name).await?)
    }

    /// Close the metadata store. Blocks already frozen stay on disk.
    pub fn close(&self) -> SdkResult<()> {
        self.kv.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("bucket", &self.config.bucket)
            .field("prefix", &self.config.key_prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use stratum_kv::{KvError, KvStore, ReadBucket, ReadTx, WriteBucket, WriteTx};
    use stratum_remote::RemoteRef;
    use stratum_types::{ErrorKind, NodeRepr};

    fn open() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            key_prefix: "fs/".into(),
            scratch_dir: dir.path().join("scratch"),
            frozen_dir: dir.path().join("frozen"),
            ..StorageConfig::default()
        };
        let storage = Storage::open_in_memory(config).unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn write_freeze_push_and_read_back() {
        let (_dir, storage) = open();
        let ctx = Context::background();
        let block = storage.write_block(&ctx, b"end to end").await.unwrap();
        assert_eq!(block.bid, BlockId::of(b"end to end"));
        assert_eq!(
            storage.freezer().pending().unwrap(),
            vec![block.bid]
        );

        storage.push(&ctx, &block.bid).await.unwrap();
        assert!(storage.freezer().is_pushed(&block.bid).unwrap());

        let remote = storage
            .remote()
            .get_ref(&ctx, &NodeRepr::Block(block.bid))
            .await
            .unwrap();
        let mut sink = Vec::new();
        remote.copy(&ctx, 4, 2, &mut sink).await.unwrap();
        assert_eq!(sink, b"to");

        assert_eq!(
            storage.read_block(&ctx, &block.bid).await.unwrap(),
            b"end to end"
        );
    }

    #[tokio::test]
    async fn publish_and_resolve_root() {
        let (_dir, storage) = open();
        let ctx = Context::background();
        let err = storage.resolve_root(&ctx, "main").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedRoot);

        let block = storage.write_block(&ctx, b"tree v1").await.unwrap();
        storage.publish_root(&ctx, "main", &block.bid).await.unwrap();
        assert!(storage.freezer().is_pushed(&block.bid).unwrap());
        assert_eq!(
            storage.resolve_root(&ctx, "main").await.unwrap(),
            block.bid
        );
    }

    #[tokio::test]
    async fn large_block_round_trip() {
        let (_dir, storage) = open();
        let ctx = Context::background();
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        let block = storage.write_block(&ctx, &data).await.unwrap();
        assert_eq!(block.size, data.len() as u64);
        storage.push(&ctx, &block.bid).await.unwrap();
        assert_eq!(storage.read_block(&ctx, &block.bid).await.unwrap(), data);
    }

    #[tokio::test]
    async fn missing_block_is_not_found() {
        let (_dir, storage) = open();
        let err = storage
            .read_block(&Context::background(), &BlockId::of(b"absent"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn metadata_buckets_are_declared() {
        let (_dir, storage) = open();
        storage
            .kv()
            .update(|tx| {
                tx.bucket_mut(b"dirs")?.put(b"1/name", b"2")?;
                tx.bucket_mut(b"roots")?.put(b"main", b"bid")
            })
            .unwrap();
        let value = storage
            .kv()
            .view(|tx| Ok::<_, KvError>(tx.bucket(b"dirs")?.get(b"1/name")))
            .unwrap();
        assert_eq!(value, Some(b"2".to_vec()));
    }

    #[test]
    fn closed_storage_rejects_metadata_access() {
        let (_dir, storage) = open();
        storage.close().unwrap();
        let err: SdkError = storage
            .kv()
            .view(|_| Ok::<_, SdkError>(()))
            .unwrap_err();
        assert!(matches!(err, SdkError::Kv(KvError::Closed)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StorageConfig {
            key_prefix: "no-slash".into(),
            ..StorageConfig::default()
        };
        let err = Storage::open_in_memory(config).unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }
}
