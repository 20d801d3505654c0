//! Low-level record header decoding.
//!
//! A record starts with a fixed 76 byte header, optionally followed by vendor
//! specific header bytes, the payload and alignment padding:
//!
//! | Offset | Size | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | signature `0xA55AAA55` (LE)             |
//! | 4      | 4    | header size, signature included         |
//! | 8      | 4    | reserved                                |
//! | 12     | 8    | hardware id                             |
//! | 20     | 4    | sequence                                |
//! | 24     | 4    | payload size                            |
//! | 28     | 16   | date, NUL terminated                    |
//! | 44     | 16   | time, NUL terminated                    |
//! | 60     | 16   | partition type, NUL terminated          |
//! | 76     | ..   | remaining header bytes (not interpreted)|
//!
//! All integers are little-endian.

use crate::error::DecodeError;
use crate::record::UNKNOWN_TYPE;

/// Record signature
pub const SIGNATURE: u32 = 0xA55A_AA55;

/// Record signature as it appears in the byte stream
pub const SIGNATURE_BYTES: [u8; 4] = SIGNATURE.to_le_bytes();

/// Length of the fixed header fields, signature included
pub const FIXED_HEADER_LEN: u64 = 76;

/// Records are padded so that the next one starts on this boundary
pub const ALIGNMENT: u64 = 4;

const SLOT_LEN: usize = 16;

/// Header fields of one record plus the positions derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    /// Declared header size
    pub header_size: u32,
    /// Hardware/model identifier
    pub hardware_id: u64,
    /// Sequence number
    pub sequence: u32,
    /// Payload size
    pub size: u64,
    /// Date slot
    pub date: String,
    /// Time slot
    pub time: String,
    /// Type slot, trimmed, [`UNKNOWN_TYPE`] when empty
    pub partition_type: String,
    /// Absolute payload offset
    pub data_offset: u64,
    /// Absolute offset after payload and padding
    pub end: u64,
}

/// Bytes of filler needed after a payload ending at `end`
pub fn alignment_padding(end: u64) -> u64 {
    (ALIGNMENT - end % ALIGNMENT) % ALIGNMENT
}

/// Decodes the record whose signature is at `start`.
///
/// Only header bytes are read. The payload is located and bounds-checked
/// against `data`, including its alignment padding.
pub fn decode_header(data: &[u8], start: usize) -> Result<DecodedHeader, DecodeError> {
    let mut reader = FieldReader::new(data, start);

    let _signature = reader.u32_le("signature")?;
    let header_size = reader.u32_le("header size")?;
    let _reserved = reader.u32_le("reserved")?;
    let hardware_id = reader.u64_le("hardware id")?;
    let sequence = reader.u32_le("sequence")?;
    let size = u64::from(reader.u32_le("size")?);
    let date = reader.slot("date")?;
    let time = reader.slot("time")?;
    let partition_type = normalize_type(reader.slot("type")?);

    let skip = u64::from(header_size)
        .checked_sub(FIXED_HEADER_LEN)
        .ok_or(DecodeError::HeaderTooSmall {
            header_size,
            minimum: FIXED_HEADER_LEN,
        })?;

    let available = reader.remaining();
    if skip + size > available {
        return Err(DecodeError::PayloadOutOfBounds {
            skip,
            size,
            available,
        });
    }

    let data_offset = start as u64 + u64::from(header_size);
    let payload_end = data_offset + size;
    let padding = alignment_padding(payload_end);
    let available = data.len() as u64 - payload_end;
    if padding > available {
        return Err(DecodeError::PaddingOutOfBounds { padding, available });
    }

    Ok(DecodedHeader {
        header_size,
        hardware_id,
        sequence,
        size,
        date,
        time,
        partition_type,
        data_offset,
        end: payload_end + padding,
    })
}

fn normalize_type(raw: String) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNKNOWN_TYPE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Decodes a fixed slot up to its first NUL byte.
///
/// Bytes outside the ASCII range become `?`.
fn decode_slot(slot: &[u8]) -> String {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
    slot[..end]
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// Forward-only reader over the header bytes of one record
struct FieldReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    fn remaining(&self) -> u64 {
        self.data.len().saturating_sub(self.position) as u64
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.remaining();
        if (len as u64) > available {
            return Err(DecodeError::TruncatedField {
                field,
                needed: len as u64,
                available,
            });
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    fn u32_le(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let bytes = self.take(field, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64_le(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(field, 8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn slot(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.take(field, SLOT_LEN).map(decode_slot)
    }
}
