// SPDX-License-Identifier: MIT
//! Record encoder
//!
//! One record is `header | name + NUL + pad | payload + pad`. Only the header is
//! never padded; it is 16 bytes so everything after it stays 4-byte aligned.

use crate::compression_strategy::EncodedPayload;
use crate::error::{PackError, PackResult};
use crate::format::{padded_name_length, padding_for, RecordHeader, HEADER_SIZE, MAX_NAME_LENGTH};

const NUL_PADDING: [u8; 4] = [0; 4];

/// NUL-terminated, NUL-padded name bytes of `path`
pub fn encode_name(path: &str) -> PackResult<Vec<u8>> {
    if !path.is_ascii() {
        return Err(PackError::NonEncodablePath(path.to_string()));
    }

    let padded = padded_name_length(path.len());
    if padded > MAX_NAME_LENGTH {
        return Err(PackError::NameTooLong {
            path: path.to_string(),
            length: padded,
        });
    }

    let mut name = Vec::with_capacity(padded);
    name.extend_from_slice(path.as_bytes());
    name.resize(padded, 0);
    Ok(name)
}

/// Total on-image length of a record for a path and payload length
#[inline]
pub fn record_length(path_len: usize, encoded_len: usize) -> usize {
    HEADER_SIZE + padded_name_length(path_len) + encoded_len + padding_for(encoded_len)
}

/// Encode one entry record
pub fn encode_record(
    relative_path: &str,
    payload: &EncodedPayload,
    uncompressed_size: usize,
) -> PackResult<Vec<u8>> {
    let name = encode_name(relative_path)?;

    let too_large = |size: usize| PackError::PayloadTooLarge {
        path: relative_path.to_string(),
        size,
    };
    let encoded_size = u32::try_from(payload.len()).map_err(|_| too_large(payload.len()))?;
    let uncompressed = u32::try_from(uncompressed_size).map_err(|_| too_large(uncompressed_size))?;

    // encode_name bounds the padded name to u16::MAX
    let header = RecordHeader::entry(
        name.len() as u16,
        encoded_size,
        uncompressed,
        payload.compressed,
    );

    let total = record_length(relative_path.len(), payload.len());
    let mut record = Vec::with_capacity(total);
    header.write_to_buffer(&mut record);
    record.extend_from_slice(&name);
    record.extend_from_slice(&payload.bytes);
    record.extend_from_slice(&NUL_PADDING[..padding_for(payload.len())]);

    debug_assert_eq!(record.len(), total);
    Ok(record)
}

/// The header-only trailer record
pub fn encode_trailer() -> [u8; HEADER_SIZE] {
    RecordHeader::trailer().to_bytes()
}
