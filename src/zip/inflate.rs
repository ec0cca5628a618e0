use flate2::read::DeflateDecoder;
use std::io::Read;

use super::structures::{CompressionMethod, ZipFileEntry};
use crate::error::{Error, Result};

/// Cap on the capacity reserved up front from an untrusted size field.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Turn an entry's compressed bytes into its content.
pub fn decompress(entry: &ZipFileEntry, data: Vec<u8>) -> Result<Vec<u8>> {
    match entry.compression_method {
        CompressionMethod::Stored => Ok(data),
        CompressionMethod::Deflate => {
            inflate_raw(&data, entry.uncompressed_size).map_err(|source| Error::Decompress {
                entry: entry.file_name.clone(),
                source,
            })
        }
        CompressionMethod::Unknown(method) => Err(Error::UnsupportedCompression(method)),
    }
}

/// Raw DEFLATE stream, no zlib wrapper.
fn inflate_raw(data: &[u8], size_hint: u64) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint.min(MAX_PREALLOCATION) as usize);
    DeflateDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
