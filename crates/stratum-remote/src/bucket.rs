//! [`RemoteRefFactory`] over any [`ObjectClient`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use stratum_types::{
    decode_block_id, encode_block_id, BlockId, Context, GcsAttrs, KeyLayout, Lease, NodeRepr,
    RemoteFile,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::http::HttpRemoteRef;
use crate::listing::{list_prefix, to_remote_files};
use crate::memory::InMemoryObjectClient;
use crate::object_client::{read_object, ObjectClient, WriteCondition};
use crate::traits::{check_range, RemoteRef, RemoteRefFactory};

/// A ref on one object, optionally pinned to a generation.
pub struct BucketObjectRef<C> {
    client: Arc<C>,
    bucket: String,
    key: String,
    generation: Option<i64>,
    size: u64,
    locator: NodeRepr,
}

impl<C> std::fmt::Debug for BucketObjectRef<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketObjectRef")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("generation", &self.generation)
            .field("size", &self.size)
            .finish()
    }
}

#[async_trait]
impl<C: ObjectClient + 'static> RemoteRef for BucketObjectRef<C> {
    fn size(&self) -> u64 {
        self.size
    }

    async fn copy(
        &self,
        ctx: &Context,
        offset: u64,
        len: u64,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> RemoteResult<()> {
        check_range(offset, len, self.size)?;
        if len == 0 {
            return Ok(());
        }
        let data = ctx
            .run(
                self.client
                    .read_range(&self.bucket, &self.key, self.generation, offset, len),
            )
            .await??;
        if data.len() as u64 != len {
            return Err(RemoteError::ShortCopy {
                expected: len,
                actual: data.len() as u64,
            });
        }
        ctx.run(sink.write_all(&data)).await??;
        Ok(())
    }

    fn locator(&self) -> NodeRepr {
        self.locator.clone()
    }
}

/// Remote factory storing blocks, roots and leases in one bucket.
///
/// Object locators may name any bucket the client can reach; URL locators
/// are fetched with the factory's HTTP client.
pub struct BucketRemoteFactory<C> {
    client: Arc<C>,
    bucket: String,
    layout: KeyLayout,
    http: reqwest::Client,
}

impl<C: ObjectClient + 'static> BucketRemoteFactory<C> {
    /// Build a factory over `client`, storing under `base_prefix` in
    /// `bucket`. The prefix must be empty or end in `/`.
    pub fn new(client: Arc<C>, bucket: impl Into<String>, base_prefix: &str) -> RemoteResult<Self> {
        Ok(Self {
            client,
            bucket: bucket.into(),
            layout: KeyLayout::new(base_prefix)?,
            http: reqwest::Client::new(),
        })
    }

    /// Use `http` for URL locators.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    async fn read_root(&self, key: &str) -> RemoteResult<(i64, BlockId)> {
        let (attrs, body) = read_object(self.client.as_ref(), &self.bucket, key).await?;
        let bid = decode_block_id(&body).map_err(|e| RemoteError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok((attrs.generation, bid))
    }

    async fn push_bytes(&self, bid: &BlockId, data: Bytes) -> RemoteResult<()> {
        let key = self.layout.block_key(bid);
        let written = self
            .client
            .write(&self.bucket, &key, data.clone(), WriteCondition::DoesNotExist)
            .await;
        match written {
            Ok(attrs) => {
                info!(block = %bid.short_hex(), size = attrs.size, "block pushed");
                Ok(())
            }
            Err(RemoteError::PreconditionFailed { .. }) => {
                let (_, existing) = read_object(self.client.as_ref(), &self.bucket, &key).await?;
                if existing == data {
                    debug!(block = %bid.short_hex(), "block already present");
                    Ok(())
                } else {
                    warn!(block = %bid.short_hex(), %key, "stored block differs from pushed content");
                    Err(RemoteError::Conflict {
                        key,
                        reason: "stored content differs".into(),
                    })
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn swap_root(
        &self,
        name: &str,
        expected: Option<&BlockId>,
        bid: &BlockId,
    ) -> RemoteResult<()> {
        let key = self.layout.root_key(name);
        let (current, condition) = match self.read_root(&key).await {
            Ok((generation, current)) => {
                (Some(current), WriteCondition::GenerationMatch(generation))
            }
            Err(e) if e.is_not_found() => (None, WriteCondition::DoesNotExist),
            Err(e) => return Err(e),
        };
        if current.as_ref() != expected {
            return Err(RemoteError::Conflict {
                key,
                reason: format!(
                    "root is {}",
                    current.map_or_else(|| "unset".to_string(), |b| b.short_hex())
                ),
            });
        }

        let body = Bytes::from(encode_block_id(bid));
        match self.client.write(&self.bucket, &key, body, condition).await {
            Ok(_) => {
                info!(root = name, block = %bid.short_hex(), "root swapped");
                Ok(())
            }
            Err(RemoteError::PreconditionFailed { .. }) => Err(RemoteError::Conflict {
                key,
                reason: "root changed concurrently".into(),
            }),
            Err(e) => Err(e),
        }
    }
}

impl BucketRemoteFactory<InMemoryObjectClient> {
    /// A factory over a fresh in-memory object store.
    pub fn in_memory(bucket: impl Into<String>, base_prefix: &str) -> RemoteResult<Self> {
        Self::new(Arc::new(InMemoryObjectClient::new()), bucket, base_prefix)
    }
}

impl<C> std::fmt::Debug for BucketRemoteFactory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRemoteFactory")
            .field("bucket", &self.bucket)
            .field("layout", &self.layout)
            .finish()
    }
}

#[async_trait]
impl<C: ObjectClient + 'static> RemoteRefFactory for BucketRemoteFactory<C> {
    async fn get_ref(&self, ctx: &Context, locator: &NodeRepr) -> RemoteResult<Box<dyn RemoteRef>> {
        match locator {
            NodeRepr::Block(bid) => {
                let key = self.layout.block_key(bid);
                let attrs = match ctx.run(self.client.stat(&self.bucket, &key)).await? {
                    Ok(attrs) => attrs,
                    Err(e) if e.is_not_found() => return Err(RemoteError::BlockNotFound(*bid)),
                    Err(e) => return Err(e),
                };
                Ok(Box::new(BucketObjectRef {
                    client: Arc::clone(&self.client),
                    bucket: self.bucket.clone(),
                    key,
                    generation: Some(attrs.generation),
                    size: attrs.size,
                    locator: locator.clone(),
                }))
            }
            NodeRepr::Object {
                bucket,
                key,
                generation,
                size,
            } => Ok(Box::new(BucketObjectRef {
                client: Arc::clone(&self.client),
                bucket: bucket.clone(),
                key: key.clone(),
                generation: (*generation != 0).then_some(*generation),
                size: *size,
                locator: locator.clone(),
            })),
            NodeRepr::Url { url, etag, size } => Ok(Box::new(HttpRemoteRef::new(
                self.http.clone(),
                url.clone(),
                etag.clone(),
                *size,
            ))),
        }
    }

    async fn push(
        &self,
        ctx: &Context,
        bid: &BlockId,
        reader: &mut (dyn AsyncRead + Unpin + Send),
    ) -> RemoteResult<()> {
        let mut buf = Vec::new();
        ctx.run(reader.read_to_end(&mut buf)).await??;
        let actual = BlockId::of(&buf);
        if actual != *bid {
            warn!(block = %bid.short_hex(), actual = %actual.short_hex(), "pushed content hash mismatch");
            return Err(RemoteError::Conflict {
                key: self.layout.block_key(bid),
                reason: format!("content hashes to {actual}"),
            });
        }
        ctx.run(self.push_bytes(bid, Bytes::from(buf))).await?
    }

    async fn set_lease(
        &self,
        ctx: &Context,
        name: &str,
        expiry: DateTime<Utc>,
        bid: &BlockId,
    ) -> RemoteResult<()> {
        let key = self.layout.lease_key(name);
        let body = bincode::serialize(&Lease::new(expiry, *bid)).map_err(|e| {
            RemoteError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            }
        })?;
        ctx.run(
            self.client
                .write(&self.bucket, &key, Bytes::from(body), WriteCondition::None),
        )
        .await??;
        debug!(lease = name, block = %bid.short_hex(), %expiry, "lease set");
        Ok(())
    }

    async fn get_lease(&self, ctx: &Context, name: &str) -> RemoteResult<Lease> {
        let key = self.layout.lease_key(name);
        let (_, body) = ctx
            .run(read_object(self.client.as_ref(), &self.bucket, &key))
            .await??;
        bincode::deserialize(&body).map_err(|e| RemoteError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }

    async fn set_root(&self, ctx: &Context, name: &str, bid: &BlockId) -> RemoteResult<()> {
        let key = self.layout.root_key(name);
        let body = Bytes::from(encode_block_id(bid));
        ctx.run(self.client.write(&self.bucket, &key, body, WriteCondition::None))
            .await??;
        info!(root = name, block = %bid.short_hex(), "root set");
        Ok(())
    }

    async fn set_root_if(
        &self,
        ctx: &Context,
        name: &str,
        expected: Option<&BlockId>,
        bid: &BlockId,
    ) -> RemoteResult<()> {
        ctx.run(self.swap_root(name, expected, bid)).await?
    }

    async fn get_root(&self, ctx: &Context, name: &str) -> RemoteResult<BlockId> {
        let key = self.layout.root_key(name);
        match ctx.run(self.read_root(&key)).await? {
            Ok((_, bid)) => Ok(bid),
            Err(e) if e.is_not_found() => Err(RemoteError::UndefinedRoot {
                name: name.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn get_child_nodes(
        &self,
        ctx: &Context,
        locator: &NodeRepr,
    ) -> RemoteResult<Vec<RemoteFile>> {
        let NodeRepr::Object { bucket, key, .. } = locator else {
            return Err(RemoteError::Capability(format!(
                "cannot list a {} locator",
                locator.variant_name()
            )));
        };
        let prefix = list_prefix(key);
        let entries = ctx
            .run(self.client.list(bucket, &prefix, Some('/')))
            .await??;
        Ok(to_remote_files(bucket, &prefix, entries))
    }

    async fn object_attrs(&self, ctx: &Context, bucket: &str, key: &str) -> RemoteResult<GcsAttrs> {
        if key.is_empty() || key.ends_with('/') {
            return Ok(GcsAttrs::directory());
        }
        let attrs = ctx.run(self.client.stat(bucket, key)).await??;
        Ok(GcsAttrs {
            generation: attrs.generation,
            size: attrs.size,
            mod_time: attrs.updated,
            is_dir: false,
        })
    }
}
