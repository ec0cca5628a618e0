//! ZIP container parsing on top of [`Tokenizer`](crate::tokenizer::Tokenizer).
//!
//! The module is organized into four components:
//!
//! - [`structures`]: ZIP record layouts, each decodable as a [`Token`](crate::token::Token)
//! - [`parser`]: [`ZipHandler`], which walks an archive and hands entries to a visitor
//! - `inflate`: the decompression step shared by both parsing strategies
//! - [`extractor`]: [`ZipExtractor`], a list/extract API for end users
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Sources that can seek are read from the EOCD backwards, so only the
//! tail and the requested entries are touched. Streams are read front to
//! back, one local header at a time.
//!
//! ## Supported Features
//!
//! - ZIP64 central directories
//! - Entries written with data descriptors (unknown sizes)
//! - STORED (no compression) method
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod extractor;
mod inflate;
pub mod parser;
pub mod structures;

pub use extractor::ZipExtractor;
pub use inflate::decompress;
pub use parser::{EntryAction, EntryHandler, ZipHandler, ZipOptions};
pub use structures::*;
