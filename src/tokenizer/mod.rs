//! Position-tracked tokenizers.
//!
//! A [`Tokenizer`] is a cursor over a byte source that reads, peeks and
//! skips in units of [`Token`]s. Backends either support random access
//! (in-memory buffers, positioned-read files, blobs) or are strictly
//! sequential (streams). Callers must check
//! [`Tokenizer::supports_random_access`] before seeking backwards.
//!
//! ## Example
//!
//! ```no_run
//! use tokzip::token::UINT32_LE;
//! use tokzip::tokenizer::{self, TokenizerExt};
//!
//! # async fn run() -> tokzip::Result<()> {
//! let mut tokenizer = tokenizer::from_buffer(vec![0x50, 0x4b, 0x03, 0x04]);
//! let signature = tokenizer.read_number(&UINT32_LE).await?;
//! assert_eq!(signature, 0x04034b50);
//! # Ok(())
//! # }
//! ```

mod blob;
mod buffer;
mod file;
mod random;
mod stream;

pub use blob::{BlobSource, BlobTokenizer};
pub use buffer::{BufferSource, BufferTokenizer};
pub use file::{FileTokenizer, ReadAtSource};
pub use random::{RandomAccessTokenizer, RangeSource};
pub use stream::StreamTokenizer;

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::io::{Blob, LocalFileReader, ReadAt};
use crate::stream::{ByobProducer, ChunkSource, ChunkedProducer, Producer};
use crate::token::{MAX_NUMBER_LENGTH, NumberToken, Token};

/// What is known about the source behind a tokenizer.
///
/// Without a `size` the source is treated as unbounded, which rules out
/// strategies that scan backwards from the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub size: Option<u64>,
    pub path: Option<String>,
    pub mime_type: Option<String>,
}

impl FileInfo {
    pub fn with_size(size: u64) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }
}

/// Where and how strictly to read.
///
/// The destination slice carries the length (and, by slicing, the offset
/// into the destination).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Absolute source offset; defaults to the cursor position. A peek
    /// ahead of the cursor on a stream holds the whole gap in memory.
    pub position: Option<u64>,
    /// Return a short count at the end of the source instead of failing.
    pub may_be_less: bool,
}

impl ReadOptions {
    pub fn at(position: u64) -> Self {
        Self {
            position: Some(position),
            may_be_less: false,
        }
    }

    pub fn lenient() -> Self {
        Self {
            position: None,
            may_be_less: true,
        }
    }
}

pub type CloseHook = Box<dyn FnOnce() + Send>;

/// Cursor state shared by every backend.
pub(crate) struct TokenizerCore {
    pub(crate) position: u64,
    pub(crate) file_info: FileInfo,
    on_close: Option<CloseHook>,
}

impl TokenizerCore {
    pub(crate) fn new(file_info: FileInfo) -> Self {
        Self {
            position: 0,
            file_info,
            on_close: None,
        }
    }

    pub(crate) fn set_close_hook(&mut self, hook: CloseHook) {
        self.on_close = Some(hook);
    }

    pub(crate) fn run_close_hook(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }

    /// Bytes a read of `len` at `position` may return, given the known size.
    pub(crate) fn available(&self, position: u64, len: usize, may_be_less: bool) -> Result<usize> {
        let Some(size) = self.file_info.size else {
            return Ok(len);
        };
        let remaining = size.saturating_sub(position);
        if remaining >= len as u64 {
            Ok(len)
        } else if may_be_less {
            Ok(remaining as usize)
        } else {
            Err(Error::EndOfStream)
        }
    }

    /// Clamp a skip to the bytes left before the known end.
    pub(crate) fn clamp_skip(&self, length: u64) -> u64 {
        match self.file_info.size {
            Some(size) => length.min(size.saturating_sub(self.position)),
            None => length,
        }
    }

    /// Distance from the cursor to a requested position on a sequential
    /// source, which can only move forward.
    pub(crate) fn forward_distance(&self, requested: Option<u64>) -> Result<u64> {
        match requested {
            Some(requested) if requested < self.position => Err(Error::Rewind {
                requested,
                current: self.position,
            }),
            Some(requested) => Ok(requested - self.position),
            None => Ok(0),
        }
    }
}

/// Common contract of all tokenizer backends.
#[async_trait]
pub trait Tokenizer: Send {
    fn file_info(&self) -> &FileInfo;

    /// Offset of the next byte to be read.
    fn position(&self) -> u64;

    fn supports_random_access(&self) -> bool;

    /// Move the cursor. Sequential backends can only move forward.
    async fn set_position(&mut self, position: u64) -> Result<()>;

    /// Fill `buf` from the source and advance the cursor past the bytes read.
    async fn read_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize>;

    /// Fill `buf` from the source without moving the cursor.
    async fn peek_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize>;

    /// Skip `length` bytes, clamped to the known size. Returns the bytes skipped.
    async fn ignore(&mut self, length: u64) -> Result<u64>;

    /// Release the source and run the close hook, if any.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Tokenizer + ?Sized> Tokenizer for Box<T> {
    fn file_info(&self) -> &FileInfo {
        (**self).file_info()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn supports_random_access(&self) -> bool {
        (**self).supports_random_access()
    }

    async fn set_position(&mut self, position: u64) -> Result<()> {
        (**self).set_position(position).await
    }

    async fn read_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        (**self).read_buffer(buf, options).await
    }

    async fn peek_buffer(&mut self, buf: &mut [u8], options: ReadOptions) -> Result<usize> {
        (**self).peek_buffer(buf, options).await
    }

    async fn ignore(&mut self, length: u64) -> Result<u64> {
        (**self).ignore(length).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Token-level reads on top of any [`Tokenizer`].
#[async_trait]
pub trait TokenizerExt: Tokenizer {
    /// Read and decode a token, advancing the cursor.
    async fn read_token<T: Token>(&mut self, token: &T, position: Option<u64>) -> Result<T::Value>;

    /// Decode a token without advancing the cursor.
    async fn peek_token<T: Token>(&mut self, token: &T, position: Option<u64>) -> Result<T::Value>;

    /// Read a numeric token through a fixed scratch window.
    async fn read_number<T: NumberToken>(&mut self, token: &T) -> Result<T::Value>;

    async fn peek_number<T: NumberToken>(&mut self, token: &T) -> Result<T::Value>;
}

/// Fail before allocating when a token would run past the known end.
fn check_room<Z: Tokenizer + ?Sized>(tokenizer: &Z, position: Option<u64>, len: usize) -> Result<()> {
    let start = position.unwrap_or(tokenizer.position());
    if let Some(size) = tokenizer.file_info().size
        && start.saturating_add(len as u64) > size
    {
        return Err(Error::EndOfStream);
    }
    Ok(())
}

#[async_trait]
impl<Z: Tokenizer + ?Sized> TokenizerExt for Z {
    async fn read_token<T: Token>(&mut self, token: &T, position: Option<u64>) -> Result<T::Value> {
        let len = token.byte_length();
        check_room(self, position, len)?;
        let mut buf = vec![0u8; len];
        let options = ReadOptions {
            position,
            may_be_less: false,
        };
        if self.read_buffer(&mut buf, options).await? < len {
            return Err(Error::EndOfStream);
        }
        Ok(token.decode(&buf))
    }

    async fn peek_token<T: Token>(&mut self, token: &T, position: Option<u64>) -> Result<T::Value> {
        let len = token.byte_length();
        check_room(self, position, len)?;
        let mut buf = vec![0u8; len];
        let options = ReadOptions {
            position,
            may_be_less: false,
        };
        if self.peek_buffer(&mut buf, options).await? < len {
            return Err(Error::EndOfStream);
        }
        Ok(token.decode(&buf))
    }

    async fn read_number<T: NumberToken>(&mut self, token: &T) -> Result<T::Value> {
        let len = token.byte_length();
        let mut scratch = [0u8; MAX_NUMBER_LENGTH];
        if self.read_buffer(&mut scratch[..len], ReadOptions::default()).await? < len {
            return Err(Error::EndOfStream);
        }
        Ok(token.decode(&scratch[..len]))
    }

    async fn peek_number<T: NumberToken>(&mut self, token: &T) -> Result<T::Value> {
        let len = token.byte_length();
        let mut scratch = [0u8; MAX_NUMBER_LENGTH];
        if self.peek_buffer(&mut scratch[..len], ReadOptions::default()).await? < len {
            return Err(Error::EndOfStream);
        }
        Ok(token.decode(&scratch[..len]))
    }
}

/// Tokenizer over an in-memory buffer.
pub fn from_buffer<T: AsRef<[u8]> + Send>(data: T) -> BufferTokenizer<T> {
    BufferTokenizer::new(data)
}

/// Tokenizer over a local file, using positioned reads.
pub fn from_file(path: impl AsRef<Path>) -> Result<FileTokenizer<LocalFileReader>> {
    let reader = LocalFileReader::new(path.as_ref())?;
    let file_info = FileInfo {
        path: Some(reader.path().display().to_string()),
        ..FileInfo::default()
    };
    Ok(FileTokenizer::new(reader, file_info))
}

/// Tokenizer over any positioned-read handle.
pub fn from_read_at<R: ReadAt>(reader: R, file_info: FileInfo) -> FileTokenizer<R> {
    FileTokenizer::new(reader, file_info)
}

pub fn from_blob<B: Blob>(blob: B) -> BlobTokenizer<B> {
    BlobTokenizer::new(blob)
}

/// Tokenizer over a sequential producer.
pub fn from_stream<P: Producer>(producer: P, file_info: FileInfo) -> StreamTokenizer<P> {
    StreamTokenizer::new(producer, file_info)
}

pub fn from_async_read<R: AsyncRead + Unpin + Send>(
    reader: R,
    file_info: FileInfo,
) -> StreamTokenizer<ByobProducer<R>> {
    StreamTokenizer::new(ByobProducer::new(reader), file_info)
}

pub fn from_chunks<C: ChunkSource>(source: C, file_info: FileInfo) -> StreamTokenizer<ChunkedProducer<C>> {
    StreamTokenizer::new(ChunkedProducer::new(source), file_info)
}
