use async_trait::async_trait;

use super::{FileInfo, RandomAccessTokenizer, RangeSource};
use crate::error::Result;

/// In-memory bytes as a [`RangeSource`].
pub struct BufferSource<T>(T);

#[async_trait]
impl<T: AsRef<[u8]> + Send> RangeSource for BufferSource<T> {
    async fn read_range(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.0.as_ref();
        let start = position.min(data.len() as u64) as usize;
        let len = buf.len().min(data.len() - start);
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(len)
    }
}

pub type BufferTokenizer<T> = RandomAccessTokenizer<BufferSource<T>>;

impl<T: AsRef<[u8]> + Send> RandomAccessTokenizer<BufferSource<T>> {
    pub fn new(data: T) -> Self {
        let size = data.as_ref().len() as u64;
        Self::with_source(BufferSource(data), FileInfo::with_size(size))
    }
}
