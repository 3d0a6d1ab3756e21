// SPDX-License-Identifier: MIT
//! ESPFS image format definition
//!
//! Defines the on-flash record layout shared by the packer and the embedded reader.

use std::io::{Read, Write};

/// Record magic, `"ESfs"` read as a little-endian `u32`
pub const ESPFS_MAGIC: u32 = 0x7366_5345;

/// Record header size in bytes (packed, never padded)
pub const HEADER_SIZE: usize = 16;

/// Every name, payload and header starts on this boundary
pub const ALIGNMENT: usize = 4;

/// Largest padded name the 16-bit `name_length` field can describe
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// Record flag bits
pub mod flags {
    /// Plain raw entry
    pub const NONE: u8 = 0x00;

    /// Trailer record marking end-of-image
    pub const LAST: u8 = 0x01;

    /// Payload is gzip-compressed
    pub const GZIP: u8 = 0x02;
}

/// Values of the `compression_method` byte
pub mod compression_method {
    /// The only method ever written. Gzip is signalled through [`super::flags::GZIP`].
    pub const NONE: u8 = 0;
}

/// Number of NUL bytes needed to bring `len` up to the next 4-byte boundary
#[inline]
pub const fn padding_for(len: usize) -> usize {
    (ALIGNMENT - (len % ALIGNMENT)) % ALIGNMENT
}

/// `len` rounded up to the next 4-byte boundary
#[inline]
pub const fn align_up(len: usize) -> usize {
    len + padding_for(len)
}

/// Length of a path once NUL-terminated and padded
#[inline]
pub const fn padded_name_length(path_len: usize) -> usize {
    align_up(path_len + 1)
}

/// Record header (16 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Always [`ESPFS_MAGIC`]
    pub magic: u32,

    /// Bit 0 = last entry, bit 1 = gzip
    pub flags: u8,

    /// Reserved, always 0
    pub compression_method: u8,

    /// Padded name length (including NUL terminator)
    pub name_length: u16,

    /// Unpadded payload length as stored
    pub encoded_size: u32,

    /// Original file length
    pub uncompressed_size: u32,
}

impl RecordHeader {
    /// Header for a regular entry
    pub fn entry(name_length: u16, encoded_size: u32, uncompressed_size: u32, gzip: bool) -> Self {
        Self {
            magic: ESPFS_MAGIC,
            flags: if gzip { flags::GZIP } else { flags::NONE },
            compression_method: compression_method::NONE,
            name_length,
            encoded_size,
            uncompressed_size,
        }
    }

    /// Header-only trailer record
    pub fn trailer() -> Self {
        Self {
            magic: ESPFS_MAGIC,
            flags: flags::LAST,
            compression_method: compression_method::NONE,
            name_length: 0,
            encoded_size: 0,
            uncompressed_size: 0,
        }
    }

    /// Parse a header from its raw bytes
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            flags: bytes[4],
            compression_method: bytes[5],
            name_length: u16::from_le_bytes([bytes[6], bytes[7]]),
            encoded_size: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            uncompressed_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    /// Parse a header from the start of `bytes`, `None` if too short
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: &[u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        Some(Self::from_bytes(raw))
    }

    #[inline]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == ESPFS_MAGIC
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.flags & flags::LAST != 0
    }

    #[inline]
    pub fn is_gzip(&self) -> bool {
        self.flags & flags::GZIP != 0
    }

    /// Bytes occupied by the whole record, header included.
    ///
    /// A trailer occupies only its header; its length fields are not consulted.
    pub fn record_length(&self) -> usize {
        if self.is_last() {
            return HEADER_SIZE;
        }
        HEADER_SIZE + self.name_length as usize + align_up(self.encoded_size as usize)
    }

    /// Read header from a reader
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        Ok(Self::from_bytes(&header))
    }

    /// Append header to a buffer
    #[inline]
    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.to_bytes());
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writer.write_all(&self.to_bytes())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];

        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4] = self.flags;
        bytes[5] = self.compression_method;
        bytes[6..8].copy_from_slice(&self.name_length.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.encoded_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.uncompressed_size.to_le_bytes());

        bytes
    }
}
