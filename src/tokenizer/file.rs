use async_trait::async_trait;

use super::{FileInfo, RandomAccessTokenizer, RangeSource};
use crate::error::Result;
use crate::io::ReadAt;

/// Positioned-read handle as a [`RangeSource`].
pub struct ReadAtSource<R>(R);

#[async_trait]
impl<R: ReadAt> RangeSource for ReadAtSource<R> {
    async fn read_range(&mut self, position: u64, buf: &mut [u8]) -> Result<usize> {
        // positioned reads may return short counts before the end of file
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.0.read_at(position + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

pub type FileTokenizer<R> = RandomAccessTokenizer<ReadAtSource<R>>;

impl<R: ReadAt> RandomAccessTokenizer<ReadAtSource<R>> {
    /// The reader's size overrides whatever `file_info` says.
    pub fn new(reader: R, file_info: FileInfo) -> Self {
        let file_info = FileInfo {
            size: Some(reader.size()),
            ..file_info
        };
        Self::with_source(ReadAtSource(reader), file_info)
    }
}
