use thiserror::Error;

/// Errors raised by tokenizers, byte source readers and the ZIP parser.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes were available than a non-lenient request demanded.
    #[error("End-Of-Stream")]
    EndOfStream,

    /// The read was cancelled through an abort handle or by closing the reader.
    #[error("Stream read aborted")]
    Aborted,

    /// A sequential source was asked for bytes behind its cursor.
    #[error("Cannot read from position {requested}: sequential source is already at {current}")]
    Rewind { requested: u64, current: u64 },

    /// A random-access source was asked to seek past its end.
    #[error("Position {requested} is beyond the end of the source ({size} bytes)")]
    PositionOutOfRange { requested: u64, size: u64 },

    #[error("Invalid {record} signature: {found:#010x}")]
    InvalidSignature { record: &'static str, found: u32 },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Encrypted ZIP archives are not supported")]
    Encrypted,

    #[error("Failed to decompress '{entry}'")]
    Decompress {
        entry: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("Remote server does not support Range requests")]
    RangeNotSupported,

    #[error("Remote server did not return Content-Length")]
    MissingContentLength,
}

impl Error {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
