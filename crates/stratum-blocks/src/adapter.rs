//! Bridge from [`Reader`] to [`tokio::io::AsyncRead`].

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use stratum_types::Context;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::BlocksResult;
use crate::reader::Reader;

const CHUNK_SIZE: usize = 64 * 1024;

type ReadFuture<R> = Pin<Box<dyn Future<Output = (R, Vec<u8>, BlocksResult<usize>)> + Send>>;

enum State<R> {
    Idle {
        reader: R,
        buf: Vec<u8>,
        pos: usize,
        filled: usize,
    },
    Reading(ReadFuture<R>),
    Taken,
}

/// Presents a [`Reader`] as an [`AsyncRead`], threading one fixed
/// [`Context`] through every read.
///
/// Meant for a single linear read loop such as an upload: the context is
/// captured at construction and cannot change per call.
pub struct PinnedReader<R> {
    ctx: Context,
    state: State<R>,
}

// The reader is only ever moved, never pinned in place.
impl<R> Unpin for PinnedReader<R> {}

impl<R: Reader + 'static> PinnedReader<R> {
    pub fn new(reader: R, ctx: Context) -> Self {
        Self {
            ctx,
            state: State::Idle {
                reader,
                buf: vec![0; CHUNK_SIZE],
                pos: 0,
                filled: 0,
            },
        }
    }

    /// Recover the wrapped reader, unless a read is in flight.
    pub fn into_inner(self) -> Option<R> {
        match self.state {
            State::Idle { reader, .. } => Some(reader),
            _ => None,
        }
    }
}

impl<R: Reader + 'static> AsyncRead for PinnedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if out.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            match mem::replace(&mut this.state, State::Taken) {
                State::Idle {
                    reader,
                    buf,
                    pos,
                    filled,
                } if pos < filled => {
                    let n = (filled - pos).min(out.remaining());
                    out.put_slice(&buf[pos..pos + n]);
                    this.state = State::Idle {
                        reader,
                        buf,
                        pos: pos + n,
                        filled,
                    };
                    return Poll::Ready(Ok(()));
                }
                State::Idle {
                    mut reader,
                    mut buf,
                    ..
                } => {
                    let ctx = this.ctx.clone();
                    this.state = State::Reading(Box::pin(async move {
                        let result = reader.read(&ctx, &mut buf).await;
                        (reader, buf, result)
                    }));
                }
                State::Reading(mut fut) => match fut.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = State::Reading(fut);
                        return Poll::Pending;
                    }
                    Poll::Ready((reader, buf, result)) => {
                        let filled = match result {
                            Ok(n) => n,
                            Err(e) => {
                                this.state = State::Idle {
                                    reader,
                                    buf,
                                    pos: 0,
                                    filled: 0,
                                };
                                return Poll::Ready(Err(e.into()));
                            }
                        };
                        this.state = State::Idle {
                            reader,
                            buf,
                            pos: 0,
                            filled,
                        };
                        if filled == 0 {
                            // End of data.
                            return Poll::Ready(Ok(()));
                        }
                    }
                },
                State::Taken => {
                    return Poll::Ready(Err(io::Error::other(
                        "pinned reader used after a panicked read",
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlocksError;
    use async_trait::async_trait;
    use std::io::SeekFrom;
    use tokio::io::AsyncReadExt;

    /// Serves `data` in reads of at most `step` bytes.
    struct Chunked {
        data: Vec<u8>,
        cursor: usize,
        step: usize,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Reader for Chunked {
        async fn read(&mut self, ctx: &Context, buf: &mut [u8]) -> BlocksResult<usize> {
            ctx.check()?;
            if Some(self.cursor) == self.fail_at {
                return Err(BlocksError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "injected",
                )));
            }
            let n = buf.len().min(self.step).min(self.data.len() - self.cursor);
            buf[..n].copy_from_slice(&self.data[self.cursor..self.cursor + n]);
            self.cursor += n;
            Ok(n)
        }

        fn seek(&mut self, pos: SeekFrom) -> BlocksResult<u64> {
            let SeekFrom::Start(p) = pos else {
                return Err(BlocksError::UnsupportedSeek("start only".into()));
            };
            self.cursor = p as usize;
            Ok(p)
        }
    }

    fn chunked(len: usize, step: usize) -> Chunked {
        Chunked {
            data: (0..len).map(|i| (i % 251) as u8).collect(),
            cursor: 0,
            step,
            fail_at: None,
        }
    }

    #[tokio::test]
    async fn reads_everything_in_order() {
        let source = chunked(200_000, 7_000);
        let expected = source.data.clone();
        let mut pinned = PinnedReader::new(source, Context::background());
        let mut out = Vec::new();
        pinned.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn small_destination_buffers_keep_leftovers() {
        let source = chunked(1000, 1000);
        let expected = source.data.clone();
        let mut pinned = PinnedReader::new(source, Context::background());
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = pinned.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected);
    }

    #[tokio::test]
    async fn reader_errors_surface_as_io_errors() {
        let mut source = chunked(100, 10);
        source.fail_at = Some(30);
        let mut pinned = PinnedReader::new(source, Context::background());
        let mut out = Vec::new();
        let err = pinned.read_to_end(&mut out).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        let inner = pinned.into_inner().unwrap();
        assert_eq!(inner.cursor, 30);
    }

    #[tokio::test]
    async fn pinned_context_applies_to_every_read() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        let mut pinned = PinnedReader::new(chunked(10, 10), ctx);
        let mut out = Vec::new();
        let err = pinned.read_to_end(&mut out).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
