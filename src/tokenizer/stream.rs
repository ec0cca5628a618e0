use async_trait::async_trait;

use super::{CloseHook, FileInfo, ReadOptions, Tokenizer, TokenizerCore};
use crate::error::{Error, Result};
use crate::stream::{AbortHandle, Producer, StreamReader};

/// Upper bound on the scratch buffer used to discard skipped bytes.
const IGNORE_CHUNK_SIZE: usize = 256 * 1024;

/// Tokenizer over a sequential producer.
///
/// The cursor never moves backwards: peeks leave it alone, reads advance it
/// by exactly the bytes consumed, and requests for an earlier position fail
/// with [`Error::Rewind`].
pub struct StreamTokenizer<P> {
    reader: StreamReader<P>,
    core: TokenizerCore,
}

impl<P: Producer> StreamTokenizer<P> {
    pub fn new(producer: P, file_info: FileInfo) -> Self {
        Self {
            reader: StreamReader::new(producer),
            core: TokenizerCore::new(file_info),
        }
    }

    /// Run `hook` once when the tokenizer is closed.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.core.set_close_hook(Box::new(hook) as CloseHook);
        self
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.reader.abort_handle()
    }

    /// Cancel the underlying stream; pending and later reads fail with
    /// [`Error::Aborted`].
    pub async fn abort(&mut self) -> Result<()> {
        self.reader.abort().await
    }

    /// Read `skip` bytes into `held`, then peek into `buf`. The caller
    /// returns `held` to the reader whatever the outcome.
    async fn peek_past(&mut self, skip: u64, buf: &mut [u8], held: &mut Vec<Vec<u8>>) -> Result<usize> {
        let mut remaining = skip;
        while remaining > 0 {
            let mut chunk = vec![0u8; remaining.min(IGNORE_CHUNK_SIZE as u64) as usize];
            let bytes_read = self.reader.read(&mut chunk, true).await?;
            if bytes_read == 0 {
                return Ok(0);
            }
            chunk.truncate(bytes_read);
            remaining -= bytes_read as u64;
            held.push(chunk);
        }
        self.reader.peek(buf, true).await
    }

    /// Skip up to the requested position. Returns false if the source ended first.
    async fn skip_to(&mut self, position: Option<u64>) -> Result<bool> {
        let skip = self.core.forward_distance(position)?;
        if skip == 0 {
            return Ok(true);
        }
        Ok(self.ignore(skip).await? == skip)
    }
}

#[async_trait]
impl<P: Producer> Tokenizer for StreamTokenizer<P> {
    fn file_info(&self) -> &FileInfo {
        &self.core.file_info
    }

    fn position(&self) -> u64 {
        self.core.position
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    async fn set_position(&mut self, position: u64) -> Result<()> {
        if self.skip_to(Some(position)).await? {
            Ok(())
        } else {
            Err(Error::EndOfStream)
        }
    }

    async fn read_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        if !self.skip_to(options.position).await? {
            return if options.may_be_less {
                Ok(0)
            } else {
                Err(Error::EndOfStream)
            };
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let bytes_read = self.reader.read(buf, options.may_be_less).await?;
        self.core.position += bytes_read as u64;
        Ok(bytes_read)
    }

    async fn peek_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        let skip = self.core.forward_distance(options.position)?;
        if skip == 0 {
            return self.reader.peek(buf, options.may_be_less).await;
        }

        // hold the gap as it arrives, then push it all back so the cursor stays put
        let mut held = Vec::new();
        let result = self.peek_past(skip, buf, &mut held).await;
        for chunk in held.iter().rev() {
            self.reader.unread(chunk);
        }

        let bytes_read = result?;
        if bytes_read < buf.len() && !options.may_be_less {
            return Err(Error::EndOfStream);
        }
        Ok(bytes_read)
    }

    async fn ignore(&mut self, length: u64) -> Result<u64> {
        let length = self.core.clamp_skip(length);
        let mut scratch = vec![0u8; length.min(IGNORE_CHUNK_SIZE as u64) as usize];
        let mut remaining = length;

        while remaining > 0 {
            let chunk = remaining.min(scratch.len() as u64) as usize;
            let bytes_read = self.reader.read(&mut scratch[..chunk], true).await?;
            if bytes_read == 0 {
                break;
            }
            self.core.position += bytes_read as u64;
            remaining -= bytes_read as u64;
        }

        Ok(length - remaining)
    }

    async fn close(&mut self) -> Result<()> {
        let released = self.reader.close().await;
        self.core.run_close_hook();
        released
    }
}
