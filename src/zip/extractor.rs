use std::cell::{Cell, RefCell};

use crate::error::Result;
use crate::tokenizer::Tokenizer;

use super::parser::{EntryAction, ZipHandler, ZipOptions};
use super::structures::ZipFileEntry;

/// High-level listing and extraction over an owned tokenizer.
///
/// Random-access tokenizers are answered from the central directory and can
/// be queried repeatedly. A stream tokenizer is consumed by the first call.
pub struct ZipExtractor<Z> {
    tokenizer: Z,
    options: ZipOptions,
}

impl<Z: Tokenizer> ZipExtractor<Z> {
    pub fn new(tokenizer: Z) -> Self {
        Self::with_options(tokenizer, ZipOptions::default())
    }

    pub fn with_options(tokenizer: Z, options: ZipOptions) -> Self {
        Self { tokenizer, options }
    }

    fn handler(&mut self) -> ZipHandler<'_, Z> {
        ZipHandler::with_options(&mut self.tokenizer, self.options)
    }

    /// List all entries in the archive.
    ///
    /// Without a central directory the archive is walked sequentially, and
    /// entries written with a data descriptor report the sizes from their
    /// local header.
    pub async fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let start = self.tokenizer.position();
        let mut handler = self.handler();
        if let Some(entries) = handler.read_central_directory().await? {
            return Ok(entries);
        }

        let mut entries = Vec::new();
        handler
            .unzip(|entry| {
                entries.push(entry.clone());
                EntryAction::Continue
            })
            .await?;
        if self.tokenizer.supports_random_access() {
            self.tokenizer.set_position(start).await?;
        }
        Ok(entries)
    }

    /// Decompress the first entry named `file_name`, stopping there.
    pub async fn extract_to_memory(&mut self, file_name: &str) -> Result<Option<Vec<u8>>> {
        let found = Cell::new(None);
        let found_ref = &found;
        self.handler()
            .unzip(move |entry| {
                if entry.file_name == file_name {
                    EntryAction::stop_after_capture(move |data| {
                        found_ref.set(Some(data));
                        Ok(())
                    })
                } else {
                    EntryAction::Continue
                }
            })
            .await?;
        Ok(found.into_inner())
    }

    /// Decompress every entry accepted by `predicate`, in archive order.
    pub async fn extract_matching<P>(&mut self, predicate: P) -> Result<Vec<(ZipFileEntry, Vec<u8>)>>
    where
        P: FnMut(&ZipFileEntry) -> bool,
    {
        let mut matched = Vec::new();
        self.extract_each(predicate, |entry, data| {
            matched.push((entry.clone(), data));
            Ok(())
        })
        .await?;
        Ok(matched)
    }

    /// Hand each entry accepted by `predicate` to `sink` as soon as it is
    /// decompressed. Only one payload is held at a time, and an error from
    /// `sink` ends the parse.
    pub async fn extract_each<P, S>(&mut self, mut predicate: P, sink: S) -> Result<()>
    where
        P: FnMut(&ZipFileEntry) -> bool,
        S: FnMut(&ZipFileEntry, Vec<u8>) -> Result<()>,
    {
        let sink = RefCell::new(sink);
        let sink_ref = &sink;
        self.handler()
            .unzip(move |entry| {
                if !predicate(entry) {
                    return EntryAction::Continue;
                }
                let entry = entry.clone();
                EntryAction::capture(move |data| (&mut *sink_ref.borrow_mut())(&entry, data))
            })
            .await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.tokenizer.close().await
    }

    pub fn into_inner(self) -> Z {
        self.tokenizer
    }
}
