#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tokio::sync::mpsc;

pub const STORED: u16 = 0;
pub const DEFLATE: u16 = 8;

const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
// 2024-03-15 13:37:42
const MOD_DATE: u16 = (44 << 9) | (3 << 5) | 15;
const MOD_TIME: u16 = (13 << 11) | (37 << 5) | 21;

struct CentralRecord {
    name: String,
    method: u16,
    flags: u16,
    crc: u32,
    compressed: u32,
    uncompressed: u32,
    offset: u32,
}

/// Writes small archives for tests.
#[derive(Default)]
pub struct ZipBuilder {
    data: Vec<u8>,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
    trailer: Vec<u8>,
    zip64: bool,
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Bytes that never contain a `PK` signature.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// A bare local file header.
pub fn local_header(name: &str, flags: u16, method: u16, crc: u32, compressed: u32, uncompressed: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x04034b50u32.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&method.to_le_bytes());
    out.extend_from_slice(&MOD_TIME.to_le_bytes());
    out.extend_from_slice(&MOD_DATE.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&compressed.to_le_bytes());
    out.extend_from_slice(&uncompressed.to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, STORED, false)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, DEFLATE, false)
    }

    /// Entry whose sizes only appear in a trailing data descriptor.
    pub fn streamed(self, name: &str, data: &[u8], method: u16) -> Self {
        self.entry(name, data, method, true)
    }

    /// Any method number; only 8 gets compressed.
    pub fn entry(mut self, name: &str, data: &[u8], method: u16, streamed: bool) -> Self {
        let compressed = if method == DEFLATE { deflate(data) } else { data.to_vec() };
        let crc = crc32(data);
        let offset = self.data.len() as u32;
        let flags = if streamed { FLAG_DATA_DESCRIPTOR } else { 0 };

        if streamed {
            self.data.extend(local_header(name, flags, method, 0, 0, 0));
        } else {
            self.data.extend(local_header(
                name,
                flags,
                method,
                crc,
                compressed.len() as u32,
                data.len() as u32,
            ));
        }
        self.data.extend_from_slice(&compressed);
        if streamed {
            self.data.extend_from_slice(&0x08074b50u32.to_le_bytes());
            self.data.extend_from_slice(&crc.to_le_bytes());
            self.data.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            self.data.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }

        self.records.push(CentralRecord {
            name: name.to_string(),
            method,
            flags,
            crc,
            compressed: compressed.len() as u32,
            uncompressed: data.len() as u32,
            offset,
        });
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Bytes after the EOCD that its comment length does not account for.
    pub fn trailer(mut self, trailer: Vec<u8>) -> Self {
        self.trailer = trailer;
        self
    }

    /// Write ZIP64 end records and saturated central directory fields.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.data;
        let cd_offset = out.len();

        for record in &self.records {
            let extra = if self.zip64 {
                let mut extra = Vec::new();
                extra.extend_from_slice(&0x0001u16.to_le_bytes());
                extra.extend_from_slice(&24u16.to_le_bytes());
                extra.extend_from_slice(&(record.uncompressed as u64).to_le_bytes());
                extra.extend_from_slice(&(record.compressed as u64).to_le_bytes());
                extra.extend_from_slice(&(record.offset as u64).to_le_bytes());
                extra
            } else {
                Vec::new()
            };
            let (compressed, uncompressed, offset) = if self.zip64 {
                (u32::MAX, u32::MAX, u32::MAX)
            } else {
                (record.compressed, record.uncompressed, record.offset)
            };

            out.extend_from_slice(&0x02014b50u32.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&record.flags.to_le_bytes());
            out.extend_from_slice(&record.method.to_le_bytes());
            out.extend_from_slice(&MOD_TIME.to_le_bytes());
            out.extend_from_slice(&MOD_DATE.to_le_bytes());
            out.extend_from_slice(&record.crc.to_le_bytes());
            out.extend_from_slice(&compressed.to_le_bytes());
            out.extend_from_slice(&uncompressed.to_le_bytes());
            out.extend_from_slice(&(record.name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(record.name.as_bytes());
            out.extend_from_slice(&extra);
        }
        let cd_size = out.len() - cd_offset;
        let count = self.records.len();

        if self.zip64 {
            let eocd64_offset = out.len() as u64;
            out.extend_from_slice(&0x06064b50u32.to_le_bytes());
            out.extend_from_slice(&44u64.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&45u16.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(count as u64).to_le_bytes());
            out.extend_from_slice(&(count as u64).to_le_bytes());
            out.extend_from_slice(&(cd_size as u64).to_le_bytes());
            out.extend_from_slice(&(cd_offset as u64).to_le_bytes());

            out.extend_from_slice(&0x07064b50u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&eocd64_offset.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
        }

        let (entries, cd_size, cd_offset) = if self.zip64 {
            (u16::MAX, u32::MAX, u32::MAX)
        } else {
            (count as u16, cd_size as u32, cd_offset as u32)
        };
        out.extend_from_slice(&0x06054b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&entries.to_le_bytes());
        out.extend_from_slice(&entries.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out.extend_from_slice(&self.trailer);
        out
    }
}

/// Feed `data` through a channel in fixed-size chunks.
pub async fn chunked(data: &[u8], chunk_size: usize) -> mpsc::Receiver<Vec<u8>> {
    let chunks: Vec<Vec<u8>> = data.chunks(chunk_size).map(<[u8]>::to_vec).collect();
    let (tx, rx) = mpsc::channel(chunks.len().max(1));
    for chunk in chunks {
        tx.send(chunk).await.unwrap();
    }
    rx
}
