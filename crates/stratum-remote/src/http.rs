//! Refs and attribute queries for content served over HTTP.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, ETAG, IF_MATCH, RANGE};
use reqwest::{Client, StatusCode};
use stratum_types::{Context, HttpAttrs, NodeRepr};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::traits::{check_range, RemoteRef};

/// A resource fetched with ranged `GET` requests.
///
/// When an etag is known every request carries `If-Match`, so a resource
/// that changed underneath the ref is reported as a conflict instead of
/// returning mixed content.
#[derive(Clone, Debug)]
pub struct HttpRemoteRef {
    client: Client,
    url: String,
    etag: String,
    size: u64,
}

impl HttpRemoteRef {
    pub fn new(client: Client, url: impl Into<String>, etag: impl Into<String>, size: u64) -> Self {
        Self {
            client,
            url: url.into(),
            etag: etag.into(),
            size,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(
        &self,
        offset: u64,
        len: u64,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> RemoteResult<()> {
        let last = offset + len - 1;
        let mut request = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{last}"));
        if !self.etag.is_empty() {
            request = request.header(IF_MATCH, &self.etag);
        }
        let mut response = request.send().await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let served = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok());
                if served.and_then(parse_content_range) != Some((offset, last)) {
                    return Err(RemoteError::Corrupt {
                        key: self.url.clone(),
                        reason: format!(
                            "requested bytes {offset}-{last}, got content range {:?}",
                            served.unwrap_or("<none>")
                        ),
                    });
                }
            }
            StatusCode::OK if offset == 0 && len == self.size => {}
            StatusCode::OK => {
                return Err(RemoteError::Capability(format!(
                    "{} does not support range requests",
                    self.url
                )))
            }
            StatusCode::NOT_FOUND => return Err(RemoteError::not_found(self.url.clone())),
            StatusCode::PRECONDITION_FAILED => {
                return Err(RemoteError::Conflict {
                    key: self.url.clone(),
                    reason: format!("resource no longer matches etag {}", self.etag),
                })
            }
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(RemoteError::Range {
                    offset,
                    len,
                    size: self.size,
                })
            }
            status => {
                return Err(RemoteError::Network(format!(
                    "unexpected status {status} from {}",
                    self.url
                )))
            }
        }

        let mut copied = 0u64;
        while let Some(chunk) = response.chunk().await? {
            let chunk_len = chunk.len() as u64;
            if copied + chunk_len > len {
                return Err(RemoteError::Network(format!(
                    "{} returned more than the {len} bytes requested",
                    self.url
                )));
            }
            sink.write_all(&chunk).await?;
            copied += chunk_len;
        }
        if copied != len {
            return Err(RemoteError::ShortCopy {
                expected: len,
                actual: copied,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteRef for HttpRemoteRef {
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
        debug!(url = %self.url, offset, len, "http ranged read");
        ctx.run(self.fetch(offset, len, sink)).await?
    }

    fn locator(&self) -> NodeRepr {
        NodeRepr::url(self.url.clone(), self.etag.clone(), self.size)
    }
}

/// First and last byte of a `Content-Range: bytes <first>-<last>/<total>`
/// value.
fn parse_content_range(value: &str) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes ")?;
    let (range, _total) = spec.split_once('/')?;
    let (first, last) = range.split_once('-')?;
    Some((first.trim().parse().ok()?, last.trim().parse().ok()?))
}

/// Issues `HEAD` requests for resource attributes.
#[derive(Clone, Debug, Default)]
pub struct HttpAttrClient {
    client: Client,
}

impl HttpAttrClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Entity tag and size of `url`.
    ///
    /// A missing `ETag` header yields an empty etag; a missing or
    /// unparsable `Content-Length` is an error.
    pub async fn http_attrs(&self, ctx: &Context, url: &str) -> RemoteResult<HttpAttrs> {
        let response = ctx.run(self.client.head(url).send()).await??;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::not_found(url));
        }
        if !status.is_success() {
            return Err(RemoteError::Network(format!(
                "unexpected status {status} from {url}"
            )));
        }

        let headers = response.headers();
        let etag = headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| RemoteError::Network(format!("{url} sent no usable content length")))?;
        Ok(HttpAttrs { etag, size })
    }
}
