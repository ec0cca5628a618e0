use async_trait::async_trait;

use super::{CloseHook, FileInfo, ReadOptions, Tokenizer, TokenizerCore};
use crate::error::{Error, Result};

/// Source that can materialize bytes at any absolute offset.
#[async_trait]
pub trait RangeSource: Send {
    /// Read up to `buf.len()` bytes starting at `position`. A short count
    /// means the source ended.
    async fn read_range(&mut self, position: u64, buf: &mut [u8]) -> Result<usize>;

    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Tokenizer over a [`RangeSource`]. Its cursor may jump anywhere up to the
/// source size.
pub struct RandomAccessTokenizer<S> {
    pub(super) source: S,
    pub(super) core: TokenizerCore,
}

impl<S: RangeSource> RandomAccessTokenizer<S> {
    pub(super) fn with_source(source: S, file_info: FileInfo) -> Self {
        Self {
            source,
            core: TokenizerCore::new(file_info),
        }
    }

    /// Run `hook` once when the tokenizer is closed.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.core.set_close_hook(Box::new(hook) as CloseHook);
        self
    }

    pub fn into_source(self) -> S {
        self.source
    }

    async fn fetch(&mut self, position: u64, buf: &mut [u8], may_be_less: bool) -> Result<usize> {
        let len = self.core.available(position, buf.len(), may_be_less)?;
        let bytes_read = self.source.read_range(position, &mut buf[..len]).await?;
        if bytes_read < buf.len() && !may_be_less {
            return Err(Error::EndOfStream);
        }
        Ok(bytes_read)
    }
}

#[async_trait]
impl<S: RangeSource> Tokenizer for RandomAccessTokenizer<S> {
    fn file_info(&self) -> &FileInfo {
        &self.core.file_info
    }

    fn position(&self) -> u64 {
        self.core.position
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    async fn set_position(&mut self, position: u64) -> Result<()> {
        if let Some(size) = self.core.file_info.size
            && position > size
        {
            return Err(Error::PositionOutOfRange {
                requested: position,
                size,
            });
        }
        self.core.position = position;
        Ok(())
    }

    async fn read_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        let position = options.position.unwrap_or(self.core.position);
        let bytes_read = self.fetch(position, buf, options.may_be_less).await?;
        self.core.position = position + bytes_read as u64;
        Ok(bytes_read)
    }

    async fn peek_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        let position = options.position.unwrap_or(self.core.position);
        self.fetch(position, buf, options.may_be_less).await
    }

    async fn ignore(&mut self, length: u64) -> Result<u64> {
        let skipped = self.core.clamp_skip(length);
        self.core.position += skipped;
        Ok(skipped)
    }

    async fn close(&mut self) -> Result<()> {
        let released = self.source.release().await;
        self.core.run_close_hook();
        released
    }
}
