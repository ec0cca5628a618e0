use byteorder::{ByteOrder, LittleEndian};
use std::marker::PhantomData;

use crate::token::Token;

pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
pub const CENTRAL_FILE_HEADER_SIGNATURE: u32 = 0x02014b50;
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_LOCATOR_SIGNATURE: u32 = 0x07064b50;
pub const ENCRYPTED_MARKER_SIGNATURE: u32 = 0xdde04330;

/// General purpose flag: sizes and CRC follow the data in a data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;
const ZIP64_MARKER: u64 = 0xFFFF_FFFF;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Fixed-size ZIP record that can be decoded from a byte window.
pub trait Record: Sized + Send + Sync {
    const SIZE: usize;

    fn parse(data: &[u8]) -> Self;
}

/// [`Token`] decoding a [`Record`].
pub struct RecordToken<R>(PhantomData<R>);

impl<R: Record> Token for RecordToken<R> {
    type Value = R;

    fn byte_length(&self) -> usize {
        R::SIZE
    }

    fn decode(&self, buf: &[u8]) -> R {
        R::parse(buf)
    }
}

macro_rules! record_token {
    ($($record:ty),* $(,)?) => {
        $(
            impl $record {
                pub const TOKEN: RecordToken<$record> = RecordToken(PhantomData);
            }
        )*
    };
}

record_token!(
    LocalFileHeader,
    CentralDirectoryHeader,
    EndOfCentralDirectory,
    Zip64EOCDLocator,
    Zip64EOCD,
    DataDescriptor,
);

/// Local File Header (LFH) - 30 bytes, followed by file name and extra field
#[derive(Debug, Clone)]
pub struct LocalFileHeader {
    pub signature: u32,
    pub min_version: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    /// Sizes were unknown when the header was written.
    pub fn is_streamed(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }
}

impl Record for LocalFileHeader {
    const SIZE: usize = 30;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            min_version: LittleEndian::read_u16(&data[4..]),
            flags: LittleEndian::read_u16(&data[6..]),
            compression_method: CompressionMethod::from_u16(LittleEndian::read_u16(&data[8..])),
            last_mod_time: LittleEndian::read_u16(&data[10..]),
            last_mod_date: LittleEndian::read_u16(&data[12..]),
            crc32: LittleEndian::read_u32(&data[14..]),
            compressed_size: LittleEndian::read_u32(&data[18..]),
            uncompressed_size: LittleEndian::read_u32(&data[22..]),
            filename_length: LittleEndian::read_u16(&data[26..]),
            extra_field_length: LittleEndian::read_u16(&data[28..]),
        }
    }
}

/// Central Directory File Header (CDFH) - 46 bytes, followed by file name,
/// extra field and comment
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub signature: u32,
    pub min_version: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub filename_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    /// Any field saturated at its 32-bit maximum lives in the ZIP64 extra field.
    pub fn needs_zip64(&self) -> bool {
        self.compressed_size as u64 == ZIP64_MARKER
            || self.uncompressed_size as u64 == ZIP64_MARKER
            || self.local_header_offset as u64 == ZIP64_MARKER
    }
}

impl Record for CentralDirectoryHeader {
    const SIZE: usize = 46;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            min_version: LittleEndian::read_u16(&data[6..]),
            flags: LittleEndian::read_u16(&data[8..]),
            compression_method: CompressionMethod::from_u16(LittleEndian::read_u16(&data[10..])),
            last_mod_time: LittleEndian::read_u16(&data[12..]),
            last_mod_date: LittleEndian::read_u16(&data[14..]),
            crc32: LittleEndian::read_u32(&data[16..]),
            compressed_size: LittleEndian::read_u32(&data[20..]),
            uncompressed_size: LittleEndian::read_u32(&data[24..]),
            filename_length: LittleEndian::read_u16(&data[28..]),
            extra_field_length: LittleEndian::read_u16(&data[30..]),
            file_comment_length: LittleEndian::read_u16(&data[32..]),
            local_header_offset: LittleEndian::read_u32(&data[42..]),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes, followed by the archive comment
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub signature: u32,
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

impl Record for EndOfCentralDirectory {
    const SIZE: usize = 22;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            disk_number: LittleEndian::read_u16(&data[4..]),
            disk_with_cd: LittleEndian::read_u16(&data[6..]),
            disk_entries: LittleEndian::read_u16(&data[8..]),
            total_entries: LittleEndian::read_u16(&data[10..]),
            cd_size: LittleEndian::read_u32(&data[12..]),
            cd_offset: LittleEndian::read_u32(&data[16..]),
            comment_len: LittleEndian::read_u16(&data[20..]),
        }
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone)]
pub struct Zip64EOCDLocator {
    pub signature: u32,
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Record for Zip64EOCDLocator {
    const SIZE: usize = 20;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            disk_with_eocd64: LittleEndian::read_u32(&data[4..]),
            eocd64_offset: LittleEndian::read_u64(&data[8..]),
            total_disks: LittleEndian::read_u32(&data[16..]),
        }
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone)]
pub struct Zip64EOCD {
    pub signature: u32,
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Record for Zip64EOCD {
    const SIZE: usize = 56;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            eocd64_size: LittleEndian::read_u64(&data[4..]),
            version_made_by: LittleEndian::read_u16(&data[12..]),
            version_needed: LittleEndian::read_u16(&data[14..]),
            disk_number: LittleEndian::read_u32(&data[16..]),
            disk_with_cd: LittleEndian::read_u32(&data[20..]),
            disk_entries: LittleEndian::read_u64(&data[24..]),
            total_entries: LittleEndian::read_u64(&data[32..]),
            cd_size: LittleEndian::read_u64(&data[40..]),
            cd_offset: LittleEndian::read_u64(&data[48..]),
        }
    }
}

/// Data descriptor - 16 bytes, written after the data of a streamed entry
#[derive(Debug, Clone)]
pub struct DataDescriptor {
    pub signature: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl Record for DataDescriptor {
    const SIZE: usize = 16;

    fn parse(data: &[u8]) -> Self {
        Self {
            signature: LittleEndian::read_u32(&data[0..]),
            crc32: LittleEndian::read_u32(&data[4..]),
            compressed_size: LittleEndian::read_u32(&data[8..]),
            uncompressed_size: LittleEndian::read_u32(&data[12..]),
        }
    }
}

fn read_u64_within(data: &[u8], cursor: &mut usize, end: usize) -> Option<u64> {
    if *cursor + 8 > end {
        return None;
    }
    let value = LittleEndian::read_u64(&data[*cursor..]);
    *cursor += 8;
    Some(value)
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub flags: u16,
    /// Offset of the local header; only known when read from the central directory.
    pub lfh_offset: Option<u64>,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    pub fn from_local(header: &LocalFileHeader, file_name: String) -> Self {
        Self {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: header.compression_method,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            crc32: header.crc32,
            flags: header.flags,
            lfh_offset: None,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
        }
    }

    pub fn from_central(header: &CentralDirectoryHeader, file_name: String) -> Self {
        Self {
            is_directory: file_name.ends_with('/'),
            file_name,
            compression_method: header.compression_method,
            compressed_size: header.compressed_size as u64,
            uncompressed_size: header.uncompressed_size as u64,
            crc32: header.crc32,
            flags: header.flags,
            lfh_offset: Some(header.local_header_offset as u64),
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
        }
    }

    pub fn is_streamed(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Replace saturated 32-bit fields with the values from a ZIP64
    /// extended information extra field.
    pub fn apply_zip64_extra(&mut self, extra: &[u8]) {
        let mut pos = 0;
        while pos + 4 <= extra.len() {
            let header_id = LittleEndian::read_u16(&extra[pos..]);
            let field_size = LittleEndian::read_u16(&extra[pos + 2..]) as usize;
            pos += 4;
            let field_end = (pos + field_size).min(extra.len());

            if header_id == ZIP64_EXTRA_FIELD_ID {
                // values are present only for fields saturated in the header
                let mut cursor = pos;
                if self.uncompressed_size == ZIP64_MARKER
                    && let Some(value) = read_u64_within(extra, &mut cursor, field_end)
                {
                    self.uncompressed_size = value;
                }
                if self.compressed_size == ZIP64_MARKER
                    && let Some(value) = read_u64_within(extra, &mut cursor, field_end)
                {
                    self.compressed_size = value;
                }
                if self.lfh_offset == Some(ZIP64_MARKER)
                    && let Some(value) = read_u64_within(extra, &mut cursor, field_end)
                {
                    self.lfh_offset = Some(value);
                }
            }

            pos = field_end;
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}
