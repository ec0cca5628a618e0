//! ZIP container parser over a [`Tokenizer`].
//!
//! ## Parsing Strategy
//!
//! Two strategies are available and one is chosen per [`ZipHandler::unzip`]
//! call:
//!
//! 1. **Directory-driven**, for random-access tokenizers: locate the End of
//!    Central Directory (EOCD) near the tail, enumerate the central
//!    directory, then seek to each local header whose payload the caller
//!    asked for.
//! 2. **Sequential**, for streams (and as a fallback when no EOCD is found):
//!    walk local headers front to back. Entries whose size was unknown when
//!    they were written are delimited by scanning for the data descriptor
//!    signature.

use tracing::{debug, trace};

use super::inflate::decompress;
use super::structures::*;
use crate::error::{Error, Result};
use crate::token::{Bytes, StringToken, UINT32_LE};
use crate::tokenizer::{ReadOptions, Tokenizer, TokenizerExt};

/// Largest read issued for a payload of unverified length.
const PAYLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Receives the decompressed payload of one entry.
pub type EntryHandler<'a> = Box<dyn FnOnce(Vec<u8>) -> Result<()> + 'a>;

/// What the visitor wants done with an entry.
pub enum EntryAction<'a> {
    /// Skip the payload and move on.
    Continue,
    /// Decompress the payload and hand it to the handler.
    Capture(EntryHandler<'a>),
    /// Skip the payload and end the parse.
    Stop,
    /// Hand the payload to the handler, then end the parse.
    StopAfterCapture(EntryHandler<'a>),
}

impl<'a> EntryAction<'a> {
    pub fn capture(handler: impl FnOnce(Vec<u8>) -> Result<()> + 'a) -> Self {
        EntryAction::Capture(Box::new(handler))
    }

    pub fn stop_after_capture(handler: impl FnOnce(Vec<u8>) -> Result<()> + 'a) -> Self {
        EntryAction::StopAfterCapture(Box::new(handler))
    }

    fn into_parts(self) -> (Option<EntryHandler<'a>>, bool) {
        match self {
            EntryAction::Continue => (None, false),
            EntryAction::Capture(handler) => (Some(handler), false),
            EntryAction::Stop => (None, true),
            EntryAction::StopAfterCapture(handler) => (Some(handler), true),
        }
    }
}

/// Window sizes used while searching for records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipOptions {
    /// Bytes read from the tail when the EOCD is not at the very end.
    ///
    /// Archives whose comment is longer than this are parsed sequentially.
    pub eocd_window: usize,
    /// Bytes peeked per pass when searching for a data descriptor.
    pub sync_window: usize,
}

impl Default for ZipOptions {
    fn default() -> Self {
        Self {
            eocd_window: 16 * 1024,
            sync_window: 256 * 1024,
        }
    }
}

fn check_signature(record: &'static str, found: u32, expected: u32) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::InvalidSignature { record, found })
    }
}

/// Parses a ZIP archive through a borrowed tokenizer.
///
/// The handler keeps no state between calls; everything it learns lives
/// in the tokenizer's cursor.
///
/// ## Example
///
/// ```no_run
/// use tokzip::tokenizer;
/// use tokzip::zip::{EntryAction, ZipHandler};
///
/// # async fn run() -> tokzip::Result<()> {
/// let mut tokenizer = tokenizer::from_file("archive.zip")?;
/// ZipHandler::new(&mut tokenizer)
///     .unzip(|entry| {
///         if entry.file_name == "README" {
///             EntryAction::stop_after_capture(|data| {
///                 println!("{}", String::from_utf8_lossy(&data));
///                 Ok(())
///             })
///         } else {
///             EntryAction::Continue
///         }
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ZipHandler<'t, Z: ?Sized> {
    tokenizer: &'t mut Z,
    options: ZipOptions,
}

impl<'t, Z: Tokenizer + ?Sized> ZipHandler<'t, Z> {
    pub fn new(tokenizer: &'t mut Z) -> Self {
        Self::with_options(tokenizer, ZipOptions::default())
    }

    pub fn with_options(tokenizer: &'t mut Z, options: ZipOptions) -> Self {
        Self { tokenizer, options }
    }

    /// Whether the next four bytes are a local file header signature.
    ///
    /// The cursor does not move.
    pub async fn is_zip(&mut self) -> Result<bool> {
        match self.tokenizer.peek_number(&UINT32_LE).await {
            Ok(signature) => Ok(signature == LOCAL_FILE_HEADER_SIGNATURE),
            Err(err) if err.is_end_of_stream() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Locate the EOCD record.
    ///
    /// Checks the last 22 bytes first, then scans a window at the tail
    /// backwards for the signature. Returns `None` when the tokenizer cannot
    /// seek, its size is unknown, or no signature is in the window.
    pub async fn find_end_of_central_directory(&mut self) -> Result<Option<u64>> {
        if !self.tokenizer.supports_random_access() {
            return Ok(None);
        }
        let Some(size) = self.tokenizer.file_info().size else {
            return Ok(None);
        };
        let record_size = EndOfCentralDirectory::SIZE as u64;
        if size < record_size {
            return Ok(None);
        }

        let tail = size - record_size;
        let signature = self.tokenizer.peek_token(&UINT32_LE, Some(tail)).await?;
        if signature == END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            debug!(offset = tail, "end of central directory at the tail");
            return Ok(Some(tail));
        }

        let window_len = (self.options.eocd_window as u64).max(record_size).min(size);
        let window_start = size - window_len;
        let mut window = vec![0u8; window_len as usize];
        self.tokenizer
            .peek_buffer(&mut window, ReadOptions::at(window_start))
            .await?;

        // only offsets where a whole record fits
        let last_start = window.len() - EndOfCentralDirectory::SIZE;
        let needle = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
        let found = window[..last_start + 4]
            .windows(4)
            .rposition(|candidate| candidate == needle);

        match found {
            Some(index) => {
                let offset = window_start + index as u64;
                debug!(offset, window = window_len, "end of central directory found by scanning");
                Ok(Some(offset))
            }
            None => {
                debug!(window = window_len, "no end of central directory in the tail window");
                Ok(None)
            }
        }
    }

    /// Enumerate the central directory.
    ///
    /// Returns `None` if no EOCD could be located. The cursor is restored to
    /// where it was before the call, whether or not enumeration succeeds.
    pub async fn read_central_directory(&mut self) -> Result<Option<Vec<ZipFileEntry>>> {
        let Some(eocd_offset) = self.find_end_of_central_directory().await? else {
            return Ok(None);
        };

        let saved = self.tokenizer.position();
        let entries = self.read_directory_at(eocd_offset).await;
        self.tokenizer.set_position(saved).await?;
        entries.map(Some)
    }

    async fn read_directory_at(&mut self, eocd_offset: u64) -> Result<Vec<ZipFileEntry>> {
        let eocd = self
            .tokenizer
            .read_token(&EndOfCentralDirectory::TOKEN, Some(eocd_offset))
            .await?;
        check_signature(
            "end of central directory",
            eocd.signature,
            END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        )?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_end(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };
        debug!(cd_offset, cd_size, total_entries, "reading central directory");

        self.tokenizer.set_position(cd_offset).await?;
        // the count comes from the archive; don't trust it for allocation
        let mut entries = Vec::with_capacity(total_entries.min(1024) as usize);
        for _ in 0..total_entries {
            entries.push(self.read_central_entry().await?);
        }
        Ok(entries)
    }

    /// The ZIP64 locator sits immediately before the regular EOCD.
    async fn read_zip64_end(&mut self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or(Error::EndOfStream)?;
        let locator = self
            .tokenizer
            .read_token(&Zip64EOCDLocator::TOKEN, Some(locator_offset))
            .await?;
        check_signature(
            "zip64 end of central directory locator",
            locator.signature,
            ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE,
        )?;

        let eocd64 = self
            .tokenizer
            .read_token(&Zip64EOCD::TOKEN, Some(locator.eocd64_offset))
            .await?;
        check_signature(
            "zip64 end of central directory",
            eocd64.signature,
            ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE,
        )?;
        Ok(eocd64)
    }

    async fn read_central_entry(&mut self) -> Result<ZipFileEntry> {
        let header = self
            .tokenizer
            .read_token(&CentralDirectoryHeader::TOKEN, None)
            .await?;
        check_signature(
            "central directory file header",
            header.signature,
            CENTRAL_FILE_HEADER_SIGNATURE,
        )?;

        let file_name = self
            .tokenizer
            .read_token(&StringToken::utf8(header.filename_length as usize), None)
            .await?;
        let mut entry = ZipFileEntry::from_central(&header, file_name);

        if header.needs_zip64() {
            let extra = self
                .tokenizer
                .read_token(&Bytes(header.extra_field_length as usize), None)
                .await?;
            entry.apply_zip64_extra(&extra);
        } else {
            self.skip(header.extra_field_length as u64).await?;
        }
        self.skip(header.file_comment_length as u64).await?;

        trace!(
            name = %entry.file_name,
            compressed = entry.compressed_size,
            offset = ?entry.lfh_offset,
            "central directory entry"
        );
        Ok(entry)
    }

    /// Visit every entry in the archive.
    ///
    /// Random-access tokenizers go through the central directory when one
    /// can be found; everything else is parsed sequentially from the cursor.
    pub async fn unzip<'a, F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&ZipFileEntry) -> EntryAction<'a>,
    {
        if self.tokenizer.supports_random_access() {
            if let Some(entries) = self.read_central_directory().await? {
                return self.unzip_directory(entries, &mut visit).await;
            }
            debug!("no central directory, falling back to sequential parsing");
        }
        self.unzip_sequential(&mut visit).await
    }

    async fn unzip_directory<'a, F>(&mut self, entries: Vec<ZipFileEntry>, visit: &mut F) -> Result<()>
    where
        F: FnMut(&ZipFileEntry) -> EntryAction<'a>,
    {
        for entry in entries {
            let (handler, stop) = visit(&entry).into_parts();
            if let Some(handler) = handler {
                let data = self.read_entry_data(&entry).await?;
                handler(data)?;
            }
            if stop {
                break;
            }
        }
        Ok(())
    }

    /// Read and decompress one entry through its local header.
    async fn read_entry_data(&mut self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        // always set for entries from the central directory
        let offset = entry.lfh_offset.unwrap_or_default();
        let header = self
            .tokenizer
            .read_token(&LocalFileHeader::TOKEN, Some(offset))
            .await?;
        check_signature("local file header", header.signature, LOCAL_FILE_HEADER_SIGNATURE)?;

        // the local name may be encoded differently; only its length matters here
        self.skip(header.filename_length as u64 + header.extra_field_length as u64)
            .await?;
        let data = self.read_bytes(entry.compressed_size).await?;
        decompress(entry, data)
    }

    async fn unzip_sequential<'a, F>(&mut self, visit: &mut F) -> Result<()>
    where
        F: FnMut(&ZipFileEntry) -> EntryAction<'a>,
    {
        loop {
            match self.tokenizer.peek_number(&UINT32_LE).await? {
                LOCAL_FILE_HEADER_SIGNATURE => {}
                CENTRAL_FILE_HEADER_SIGNATURE => {
                    debug!(position = self.tokenizer.position(), "reached central directory");
                    return Ok(());
                }
                ENCRYPTED_MARKER_SIGNATURE => return Err(Error::Encrypted),
                found => {
                    return Err(Error::InvalidSignature {
                        record: "local file header",
                        found,
                    });
                }
            }

            let header = self.tokenizer.read_token(&LocalFileHeader::TOKEN, None).await?;
            let file_name = self
                .tokenizer
                .read_token(&StringToken::utf8(header.filename_length as usize), None)
                .await?;
            self.skip(header.extra_field_length as u64).await?;

            let mut entry = ZipFileEntry::from_local(&header, file_name);
            trace!(
                name = %entry.file_name,
                streamed = entry.is_streamed(),
                position = self.tokenizer.position(),
                "local file header"
            );

            let (handler, stop) = visit(&entry).into_parts();
            let capture = handler.is_some();
            let data = if header.is_streamed() && header.compressed_size == 0 {
                self.read_until_data_descriptor(capture).await?
            } else {
                self.read_payload(entry.compressed_size, capture).await?
            };

            if header.is_streamed() {
                let descriptor = self.tokenizer.read_token(&DataDescriptor::TOKEN, None).await?;
                check_signature(
                    "data descriptor",
                    descriptor.signature,
                    DATA_DESCRIPTOR_SIGNATURE,
                )?;
                entry.crc32 = descriptor.crc32;
                entry.compressed_size = descriptor.compressed_size as u64;
                entry.uncompressed_size = descriptor.uncompressed_size as u64;
            }

            if let (Some(handler), Some(data)) = (handler, data) {
                handler(decompress(&entry, data)?)?;
            }
            if stop {
                return Ok(());
            }
        }
    }

    /// Consume a payload of known size, keeping it only when `capture` is set.
    async fn read_payload(&mut self, size: u64, capture: bool) -> Result<Option<Vec<u8>>> {
        if capture {
            Ok(Some(self.read_bytes(size).await?))
        } else {
            self.skip(size).await?;
            Ok(None)
        }
    }

    /// Read a payload whose length comes from the archive.
    ///
    /// With a known source size the bound is checked before allocating.
    /// Otherwise the buffer grows as bytes arrive, so a bogus size fails at
    /// the end of the source instead of reserving memory up front.
    async fn read_bytes(&mut self, size: u64) -> Result<Vec<u8>> {
        let len = usize::try_from(size).map_err(|_| Error::EndOfStream)?;
        if self.tokenizer.file_info().size.is_some() {
            return self.tokenizer.read_token(&Bytes(len), None).await;
        }

        let mut chunk = vec![0u8; len.min(PAYLOAD_CHUNK_SIZE)];
        let mut data = Vec::with_capacity(chunk.len());
        while data.len() < len {
            let n = chunk.len().min(len - data.len());
            self.tokenizer
                .read_buffer(&mut chunk[..n], ReadOptions::default())
                .await?;
            data.extend_from_slice(&chunk[..n]);
        }
        Ok(data)
    }

    /// Consume bytes up to the next data descriptor signature.
    ///
    /// Each pass peeks one window. A full window without a match advances all
    /// but its last three bytes, so a signature split across two windows is
    /// still found. A short window without a match means the source ran out.
    async fn read_until_data_descriptor(&mut self, capture: bool) -> Result<Option<Vec<u8>>> {
        let needle = DATA_DESCRIPTOR_SIGNATURE.to_le_bytes();
        let mut window = vec![0u8; self.options.sync_window.max(needle.len())];
        let mut collected = Vec::new();

        loop {
            let peeked = match self
                .tokenizer
                .peek_buffer(&mut window, ReadOptions::lenient())
                .await
            {
                Ok(n) => n,
                Err(err) if err.is_end_of_stream() => 0,
                Err(err) => return Err(err),
            };

            let found = window[..peeked]
                .windows(needle.len())
                .position(|candidate| candidate == needle);
            let exhausted = peeked < window.len();
            let advance = match found {
                Some(index) => index,
                None if exhausted => peeked,
                None => peeked - (needle.len() - 1),
            };
            trace!(peeked, advance, found = found.is_some(), "data descriptor window");

            if capture {
                let start = collected.len();
                collected.resize(start + advance, 0);
                self.tokenizer
                    .read_buffer(&mut collected[start..], ReadOptions::default())
                    .await?;
            } else {
                self.skip(advance as u64).await?;
            }

            if found.is_some() {
                return Ok(capture.then_some(collected));
            }
            if exhausted {
                return Err(Error::EndOfStream);
            }
        }
    }

    /// Skip exactly `length` bytes.
    async fn skip(&mut self, length: u64) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        if self.tokenizer.ignore(length).await? < length {
            return Err(Error::EndOfStream);
        }
        Ok(())
    }
}
