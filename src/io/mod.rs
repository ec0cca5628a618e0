//! Random-access and sequential byte sources.
//!
//! [`ReadAt`] is a positioned-read handle, [`Blob`] materializes byte ranges
//! on demand. Both back the random-access tokenizers. [`HttpStream`] is a
//! sequential chunk producer for the stream tokenizer.

mod http;
mod local;

pub use http::{HttpRangeReader, HttpStream};
pub use local::LocalFileReader;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Data source that hands out copies of arbitrary byte ranges.
#[async_trait]
pub trait Blob: Send + Sync {
    /// Materialize bytes `start..end`. The range is clamped to the blob size.
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Get the total size of the blob
    fn size(&self) -> u64;

    fn mime_type(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
impl<R: ReadAt + ?Sized> ReadAt for Arc<R> {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf).await
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

#[async_trait]
impl<B: Blob + ?Sized> Blob for Arc<B> {
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        (**self).slice(start, end).await
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn mime_type(&self) -> Option<&str> {
        (**self).mime_type()
    }
}
