// SPDX-License-Identifier: MIT
//! Image reader
//!
//! Host-side counterpart of the embedded reader: walks records by their declared
//! lengths, stops at the first record flagged as last, and gunzips payloads on
//! request. Used by the inspector tool and by tests to prove an image decodes.

use std::io::Read;

use flate2::read::GzDecoder;
use serde::Serialize;

use crate::format::{RecordHeader, ALIGNMENT, HEADER_SIZE};

/// Errors that can occur during reading
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Image truncated at offset {offset}: {needed} more bytes expected")]
    Truncated { offset: usize, needed: usize },

    #[error("Bad magic {found:#010x} at offset {offset}")]
    BadMagic { offset: usize, found: u32 },

    #[error("Image ends without a trailer record")]
    MissingTrailer,

    #[error("Record at offset {offset} breaks 4-byte alignment")]
    Misaligned { offset: usize },

    #[error("Record at offset {offset} has an unreadable name")]
    InvalidName { offset: usize },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Entry {path} decoded to {actual} bytes, header says {expected}")]
    SizeMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Decompression error: {0}")]
    Decompression(String),
}

/// One entry record, borrowed from the image
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    /// Byte offset of the header from the start of the image
    pub offset: usize,
    pub header: RecordHeader,
    pub name: &'a str,
    /// Stored payload, without padding
    pub payload: &'a [u8],
}

impl RecordRef<'_> {
    /// Payload as the original file bytes
    pub fn contents(&self) -> Result<Vec<u8>, ReadError> {
        let expected = self.header.uncompressed_size as usize;

        let data = if self.header.is_gzip() {
            let mut decompressed = Vec::with_capacity(expected);
            GzDecoder::new(self.payload)
                .read_to_end(&mut decompressed)
                .map_err(|e| ReadError::Decompression(format!("{}: {}", self.name, e)))?;
            decompressed
        } else {
            self.payload.to_vec()
        };

        if data.len() != expected {
            return Err(ReadError::SizeMismatch {
                path: self.name.to_string(),
                expected,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    /// Offset of the record that follows this one
    pub fn next_offset(&self) -> usize {
        self.offset + self.header.record_length()
    }
}

/// Iterator over entry records; the trailer ends iteration
pub struct Records<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Records<'a> {
    /// Offset just past the trailer, once iteration has reached it
    pub fn end_offset(&self) -> Option<usize> {
        self.done.then_some(self.offset)
    }

    fn parse_next(&mut self) -> Result<Option<RecordRef<'a>>, ReadError> {
        let offset = self.offset;
        if offset == self.data.len() {
            return Err(ReadError::MissingTrailer);
        }

        let header =
            RecordHeader::from_slice(&self.data[offset..]).ok_or_else(|| ReadError::Truncated {
                offset,
                needed: HEADER_SIZE - (self.data.len() - offset),
            })?;

        if !header.has_valid_magic() {
            return Err(ReadError::BadMagic {
                offset,
                found: header.magic,
            });
        }

        if header.is_last() {
            self.offset = offset + HEADER_SIZE;
            return Ok(None);
        }

        let name_length = header.name_length as usize;
        if name_length % ALIGNMENT != 0 {
            return Err(ReadError::Misaligned { offset });
        }

        let name_start = offset + HEADER_SIZE;
        let payload_start = name_start + name_length;
        let payload_end = payload_start + header.encoded_size as usize;
        let record_end = offset + header.record_length();
        if record_end > self.data.len() {
            return Err(ReadError::Truncated {
                offset,
                needed: record_end - self.data.len(),
            });
        }

        let name_field = &self.data[name_start..payload_start];
        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::InvalidName { offset })?;
        let name = std::str::from_utf8(&name_field[..name_len])
            .map_err(|_| ReadError::InvalidName { offset })?;

        self.offset = record_end;
        Ok(Some(RecordRef {
            offset,
            header,
            name,
            payload: &self.data[payload_start..payload_end],
        }))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<RecordRef<'a>, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Image statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageStats {
    pub entries: usize,
    pub gzip_entries: usize,
    pub uncompressed_bytes: u64,
    pub encoded_bytes: u64,
    /// Bytes up to and including the trailer
    pub image_bytes: u64,
}

/// Reader over a complete image held in memory
#[derive(Debug, Clone, Copy)]
pub struct ImageReader<'a> {
    data: &'a [u8],
}

impl<'a> ImageReader<'a> {
    /// Check that `data` starts with a record header
    pub fn new(data: &'a [u8]) -> Result<Self, ReadError> {
        let header = RecordHeader::from_slice(data).ok_or(ReadError::Truncated {
            offset: 0,
            needed: HEADER_SIZE - data.len().min(HEADER_SIZE),
        })?;
        if !header.has_valid_magic() {
            return Err(ReadError::BadMagic {
                offset: 0,
                found: header.magic,
            });
        }
        Ok(Self { data })
    }

    pub fn records(&self) -> Records<'a> {
        Records {
            data: self.data,
            offset: 0,
            done: false,
        }
    }

    /// All entry records, failing on the first malformed one
    pub fn entries(&self) -> Result<Vec<RecordRef<'a>>, ReadError> {
        self.records().collect()
    }

    /// Look up an entry by name; leading slashes are ignored
    pub fn open(&self, name: &str) -> Result<RecordRef<'a>, ReadError> {
        let wanted = name.trim_start_matches('/');
        for record in self.records() {
            let record = record?;
            if record.name == wanted {
                return Ok(record);
            }
        }
        Err(ReadError::NotFound(wanted.to_string()))
    }

    /// Original contents of the named entry
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ReadError> {
        self.open(name)?.contents()
    }

    pub fn stats(&self) -> Result<ImageStats, ReadError> {
        let mut stats = ImageStats {
            entries: 0,
            gzip_entries: 0,
            uncompressed_bytes: 0,
            encoded_bytes: 0,
            image_bytes: 0,
        };

        let mut records = self.records();
        for record in records.by_ref() {
            let record = record?;
            stats.entries += 1;
            if record.header.is_gzip() {
                stats.gzip_entries += 1;
            }
            stats.uncompressed_bytes += u64::from(record.header.uncompressed_size);
            stats.encoded_bytes += u64::from(record.header.encoded_size);
        }
        stats.image_bytes = records.end_offset().unwrap_or(self.data.len()) as u64;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression_strategy::CompressionConfig;
    use crate::record::encode_trailer;
    use crate::writer::ImageWriter;

    fn sample_image() -> Vec<u8> {
        let mut writer = ImageWriter::new(Vec::new(), CompressionConfig::default());
        writer
            .add_entry("index.html", b"<h1>esp-link</h1>".repeat(30))
            .unwrap();
        writer.add_entry("a.js", b"x".to_vec()).unwrap();
        writer.add_entry("empty.txt", Vec::new()).unwrap();
        writer.finish().unwrap().0
    }

    #[test]
    fn test_entries_in_order() {
        let image = sample_image();
        let reader = ImageReader::new(&image).unwrap();
        let names: Vec<_> = reader
            .entries()
            .unwrap()
            .iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["index.html", "a.js", "empty.txt"]);
    }

    #[test]
    fn test_read_decompresses() {
        let image = sample_image();
        let reader = ImageReader::new(&image).unwrap();

        let record = reader.open("index.html").unwrap();
        assert!(record.header.is_gzip());
        assert_eq!(
            reader.read("/index.html").unwrap(),
            b"<h1>esp-link</h1>".repeat(30)
        );
        assert_eq!(reader.read("a.js").unwrap(), b"x");
        assert!(reader.read("empty.txt").unwrap().is_empty());
    }

    #[test]
    fn test_missing_entry() {
        let image = sample_image();
        let reader = ImageReader::new(&image).unwrap();
        assert!(matches!(
            reader.read("nope.css"),
            Err(ReadError::NotFound(_))
        ));
    }

    #[test]
    fn test_records_are_aligned() {
        let image = sample_image();
        let reader = ImageReader::new(&image).unwrap();
        for record in reader.entries().unwrap() {
            assert_eq!(record.offset % 4, 0);
            assert_eq!(record.next_offset() % 4, 0);
        }
    }

    #[test]
    fn test_trailer_only_image() {
        let trailer = encode_trailer();
        let reader = ImageReader::new(&trailer).unwrap();
        assert!(reader.entries().unwrap().is_empty());
        assert_eq!(reader.stats().unwrap().image_bytes, HEADER_SIZE as u64);
    }

    #[test]
    fn test_trailer_lengths_are_ignored() {
        let mut trailer = RecordHeader::trailer();
        trailer.name_length = 400;
        trailer.encoded_size = 9999;
        let bytes = trailer.to_bytes();

        let reader = ImageReader::new(&bytes).unwrap();
        assert!(reader.entries().unwrap().is_empty());
    }

    #[test]
    fn test_missing_trailer() {
        let mut image = sample_image();
        image.truncate(image.len() - HEADER_SIZE);
        let reader = ImageReader::new(&image).unwrap();
        assert!(matches!(reader.entries(), Err(ReadError::MissingTrailer)));
    }

    #[test]
    fn test_truncated_payload() {
        let image = sample_image();
        let reader = ImageReader::new(&image[..HEADER_SIZE + 8]).unwrap();
        assert!(matches!(
            reader.entries(),
            Err(ReadError::Truncated { offset: 0, .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            ImageReader::new(&[0u8; HEADER_SIZE]),
            Err(ReadError::BadMagic { offset: 0, .. })
        ));

        let mut image = sample_image();
        let second = ImageReader::new(&image).unwrap().entries().unwrap()[1].offset;
        image[second] = b'X';
        let reader = ImageReader::new(&image).unwrap();
        assert!(matches!(
            reader.entries(),
            Err(ReadError::BadMagic { .. })
        ));
    }

    #[test]
    fn test_unaligned_name_length_rejected() {
        let header = RecordHeader::entry(5, 0, 0, false);
        let mut image = header.to_bytes().to_vec();
        image.extend_from_slice(b"a.js\0\0\0\0");
        image.extend_from_slice(&encode_trailer());

        let reader = ImageReader::new(&image).unwrap();
        assert!(matches!(
            reader.entries(),
            Err(ReadError::Misaligned { offset: 0 })
        ));
    }

    #[test]
    fn test_stats() {
        let image = sample_image();
        let stats = ImageReader::new(&image).unwrap().stats().unwrap();

        assert_eq!(stats.entries, 3);
        assert_eq!(stats.gzip_entries, 1);
        assert_eq!(stats.uncompressed_bytes, 17 * 30 + 1);
        assert_eq!(stats.image_bytes, image.len() as u64);
    }
}
