use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::Result;

/// Sequential source of bytes underneath a [`StreamReader`](super::StreamReader).
#[async_trait]
pub trait Producer: Send {
    /// Pull the next bytes into `buf`. Returns 0 once the source is exhausted.
    async fn pull(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying source. Later pulls may fail or return 0.
    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Producer that fills the caller's buffer directly.
pub struct ByobProducer<R> {
    inner: Option<R>,
}

impl<R: AsyncRead + Unpin + Send> ByobProducer<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Producer for ByobProducer<R> {
    async fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => Ok(inner.read(buf).await?),
            None => Ok(0),
        }
    }

    async fn release(&mut self) -> Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// Source that only hands out chunks of its own choosing.
#[async_trait]
pub trait ChunkSource: Send {
    /// Next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl ChunkSource for mpsc::Receiver<Vec<u8>> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.recv().await)
    }
}

/// Adapts a [`ChunkSource`] to the [`Producer`] interface.
///
/// A chunk larger than the requested slice is split; its tail is held in a
/// single leftover slot and served first on the next pull.
pub struct ChunkedProducer<C> {
    source: Option<C>,
    leftover: Vec<u8>,
}

impl<C: ChunkSource> ChunkedProducer<C> {
    pub fn new(source: C) -> Self {
        Self {
            source: Some(source),
            leftover: Vec::new(),
        }
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.leftover.is_empty() {
            return Ok(Some(std::mem::take(&mut self.leftover)));
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        // empty chunks carry no data and must not read as end of stream
        while let Some(chunk) = source.next_chunk().await? {
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<C: ChunkSource> Producer for ChunkedProducer<C> {
    async fn pull(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(mut chunk) = self.next_chunk().await? else {
            return Ok(0);
        };
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            self.leftover = chunk.split_off(len);
        }
        Ok(len)
    }

    async fn release(&mut self) -> Result<()> {
        self.source = None;
        self.leftover.clear();
        Ok(())
    }
}
