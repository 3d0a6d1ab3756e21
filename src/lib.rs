// SPDX-License-Identifier: MIT
//! # espfs-pack
//!
//! Packs a directory of web assets into a flat, read-only filesystem image that
//! an embedded device can mount straight from flash.
//!
//! ## Format Overview
//!
//! The image borrows from cpio: it is a plain concatenation of
//! `{header, name, payload}` records closed by a header-only trailer. There is
//! no index; the device finds a file by hopping from header to header.
//! Flash on the target only tolerates aligned 32-bit reads, so every header,
//! name and payload starts on a 4-byte boundary.
//!
//! ## Record Layout
//!
//! ```text
//! Record header (16 bytes, little-endian, never padded):
//! - Magic: 0x73665345 ("ESfs")        (4 bytes)
//! - Flags: bit 0 last, bit 1 gzip     (1 byte)
//! - Compression method: always 0      (1 byte)
//! - Name length: padded length        (2 bytes)
//! - Encoded size: stored payload      (4 bytes, unpadded)
//! - Uncompressed size: original file  (4 bytes)
//!
//! Followed by:
//! - Name: ASCII path + NUL, NUL-padded to a multiple of 4
//! - Payload: raw or gzip bytes, NUL-padded to a multiple of 4
//!
//! Trailer: one header with flags = 0x01 and every length field 0.
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use espfs_pack::{pack_to_vec, ImageReader, PackConfig};
//! use std::path::Path;
//!
//! let (image, report) = pack_to_vec(Path::new("html"), &PackConfig::default())?;
//! println!("{} entries, {} bytes", report.entries.len(), report.total_bytes);
//!
//! let reader = ImageReader::new(&image)?;
//! let index = reader.read("index.html")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compression_strategy;
pub mod config;
pub mod embed;
pub mod error;
pub mod format;
pub mod reader;
pub mod record;
pub mod selector;
pub mod writer;

// Re-export main types
pub use compression_strategy::{
    compress, CompressionConfig, CompressionEngine, CompressionPolicy, EncodedPayload,
};
pub use config::PackConfig;
pub use embed::{render_c_array, write_c_array, EmbedError, EmbedOptions};
pub use error::{PackError, PackResult};
pub use format::{RecordHeader, ESPFS_MAGIC, HEADER_SIZE};
pub use reader::{ImageReader, ImageStats, ReadError, RecordRef};
pub use record::{encode_record, encode_trailer};
pub use selector::{select, EntryOrder, SelectionConfig, SelectionMode};
pub use writer::{pack_to_vec, pack_to_writer, BuildReport, BuildState, EntrySummary, ImageWriter};
