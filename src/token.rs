//! Token codecs.
//!
//! A [`Token`] describes how a fixed-size byte window turns into a typed
//! value. Tokenizers allocate a window of [`Token::byte_length`] bytes, fill
//! it from their source and hand it to [`Token::decode`].
//!
//! Only the codecs the crate needs itself are defined here; callers are free
//! to implement [`Token`] for their own record layouts.

use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Decoder for a fixed-size byte window.
pub trait Token: Sync {
    type Value: Send;

    /// Number of bytes the decoder consumes.
    fn byte_length(&self) -> usize;

    /// Decode a value from `buf`, which holds at least `byte_length()` bytes.
    fn decode(&self, buf: &[u8]) -> Self::Value;
}

/// Marker for numeric tokens that fit in [`MAX_NUMBER_LENGTH`] bytes.
///
/// Numeric reads go through a fixed scratch window instead of allocating.
pub trait NumberToken: Token {}

pub const MAX_NUMBER_LENGTH: usize = 8;

/// Unsigned 8-bit integer.
#[derive(Debug, Clone, Copy)]
pub struct U8;

impl Token for U8 {
    type Value = u8;

    fn byte_length(&self) -> usize {
        1
    }

    fn decode(&self, buf: &[u8]) -> u8 {
        buf[0]
    }
}

impl NumberToken for U8 {}

macro_rules! number_token {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $len:expr, $read:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name<E>(PhantomData<E>);

        impl<E> $name<E> {
            pub const fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<E: ByteOrder + Sync> Token for $name<E> {
            type Value = $ty;

            fn byte_length(&self) -> usize {
                $len
            }

            fn decode(&self, buf: &[u8]) -> $ty {
                E::$read(&buf[..$len])
            }
        }

        impl<E: ByteOrder + Sync> NumberToken for $name<E> {}
    };
}

number_token!(
    /// Unsigned 16-bit integer with byte order `E`.
    U16, u16, 2, read_u16
);
number_token!(
    /// Unsigned 32-bit integer with byte order `E`.
    U32, u32, 4, read_u32
);
number_token!(
    /// Unsigned 64-bit integer with byte order `E`.
    U64, u64, 8, read_u64
);
number_token!(
    /// Signed 32-bit integer with byte order `E`.
    I32, i32, 4, read_i32
);

pub const UINT8: U8 = U8;
pub const UINT16_LE: U16<LittleEndian> = U16::new();
pub const UINT16_BE: U16<BigEndian> = U16::new();
pub const UINT32_LE: U32<LittleEndian> = U32::new();
pub const UINT32_BE: U32<BigEndian> = U32::new();
pub const UINT64_LE: U64<LittleEndian> = U64::new();
pub const UINT64_BE: U64<BigEndian> = U64::new();
pub const INT32_LE: I32<LittleEndian> = I32::new();
pub const INT32_BE: I32<BigEndian> = I32::new();

/// Raw byte window of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct Bytes(pub usize);

impl Token for Bytes {
    type Value = Vec<u8>;

    fn byte_length(&self) -> usize {
        self.0
    }

    fn decode(&self, buf: &[u8]) -> Vec<u8> {
        buf[..self.0].to_vec()
    }
}

/// Text encodings understood by [`StringToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// UTF-8; invalid sequences become U+FFFD.
    #[default]
    Utf8,
    /// ISO-8859-1; every byte maps to the code point of the same value.
    Latin1,
    /// 7-bit ASCII; bytes above 0x7F become U+FFFD.
    Ascii,
}

/// Fixed-length string.
#[derive(Debug, Clone, Copy)]
pub struct StringToken {
    pub length: usize,
    pub encoding: TextEncoding,
}

impl StringToken {
    pub const fn new(length: usize, encoding: TextEncoding) -> Self {
        Self { length, encoding }
    }

    pub const fn utf8(length: usize) -> Self {
        Self::new(length, TextEncoding::Utf8)
    }
}

impl Token for StringToken {
    type Value = String;

    fn byte_length(&self) -> usize {
        self.length
    }

    fn decode(&self, buf: &[u8]) -> String {
        let buf = &buf[..self.length];
        match self.encoding {
            TextEncoding::Utf8 => String::from_utf8_lossy(buf).into_owned(),
            TextEncoding::Latin1 => buf.iter().map(|&b| b as char).collect(),
            TextEncoding::Ascii => buf
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }
}
