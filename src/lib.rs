//! # tokzip
//!
//! Position-tracked byte tokenizers over buffers, files, blobs and streams,
//! with a ZIP container parser built on top of them.
//!
//! ## Features
//!
//! - Read, peek and skip fixed-size [`Token`](token::Token)s at the cursor or
//!   at an absolute offset
//! - Random-access backends (memory, positioned file reads, HTTP Range
//!   requests) and sequential backends (any `AsyncRead`, chunk channels,
//!   streaming HTTP bodies)
//! - Cancellation of blocked stream reads through an [`AbortHandle`](stream::AbortHandle)
//! - ZIP parsing from the central directory when the source can seek, or
//!   front to back when it cannot, including entries of unknown size
//! - STORED and DEFLATE entries, ZIP64 central directories
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokzip::{tokenizer, HttpRangeReader, ZipExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Only the tail of the archive and the requested entry are fetched
//!     let reader = Arc::new(HttpRangeReader::new("https://example.com/archive.zip".to_string()).await?);
//!     let mut extractor = ZipExtractor::new(tokenizer::from_blob(reader));
//!
//!     for file in extractor.list_files().await? {
//!         println!("{}", file.file_name);
//!     }
//!     if let Some(data) = extractor.extract_to_memory("README.md").await? {
//!         println!("{}", String::from_utf8_lossy(&data));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod stream;
pub mod token;
pub mod tokenizer;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{Blob, HttpRangeReader, HttpStream, LocalFileReader, ReadAt};
pub use tokenizer::{FileInfo, ReadOptions, Tokenizer, TokenizerExt};
pub use zip::{EntryAction, ZipExtractor, ZipFileEntry, ZipHandler, ZipOptions};
