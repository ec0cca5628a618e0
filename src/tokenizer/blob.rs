use async_trait::async_trait;

use super::{FileInfo, RandomAccessTokenizer, RangeSource};
use crate::error::Result;
use crate::io::Blob;

/// Blob as a [`RangeSource`]; every read materializes one slice.
pub struct BlobSource<B>(B);

#[async_trait]
impl<B: Blob> RangeSource for BlobSource<B> {
    async fn read_range(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.0.slice(position, position + buf.len() as u64).await?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }
}

pub type BlobTokenizer<B> = RandomAccessTokenizer<BlobSource<B>>;

impl<B: Blob> RandomAccessTokenizer<BlobSource<B>> {
    pub fn new(blob: B) -> Self {
        let file_info = FileInfo {
            size: Some(blob.size()),
            path: None,
            mime_type: blob.mime_type().map(str::to_string),
        };
        Self::with_source(BlobSource(blob), file_info)
    }
}
