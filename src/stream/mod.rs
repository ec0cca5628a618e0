//! Byte source reader with peek-ahead.
//!
//! A [`StreamReader`] wraps one sequential [`Producer`]. Two producer shapes
//! are supported: [`ByobProducer`] fills the caller's slice from any
//! [`tokio::io::AsyncRead`], while [`ChunkedProducer`] adapts sources that
//! only hand back chunks of their own size ([`ChunkSource`]).

mod producer;
mod reader;

pub use producer::{ByobProducer, ChunkSource, ChunkedProducer, Producer};
pub use reader::{AbortHandle, StreamReader};
