//! Record serialization and framing using postcard
//!
//! Records are serialized with postcard and written to the recording file as
//! self-checking frames:
//!
//! ```text
//! [Length: u32 (big-endian)][CRC32: u32 (big-endian)][Record bytes (postcard)]
//! ```
//!
//! Maximum frame size is 16 MiB to keep a corrupt length prefix from
//! exhausting memory.

use crate::error::{FormatError, Result};
use crate::integrity::compute_checksum;
use crate::{CURRENT_VERSION, FormatVersion, Record};
use std::io::{ErrorKind, Read, Write};

/// Maximum allowed frame payload size (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Frame header size: length prefix plus checksum
pub const FRAME_HEADER_LEN: usize = 8;

/// Encode a record to bytes using postcard
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    postcard::to_allocvec(record).map_err(FormatError::from)
}

/// Decode a record from bytes using postcard
///
/// The record's format version is validated after decoding.
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    let record: Record = postcard::from_bytes(bytes)?;
    validate_version(&record.version)?;
    Ok(record)
}

/// Validate recording format compatibility
///
/// See [`FormatVersion::is_compatible_with`] for the rule.
pub fn validate_version(version: &FormatVersion) -> Result<()> {
    if !CURRENT_VERSION.is_compatible_with(version) {
        return Err(FormatError::IncompatibleVersion {
            major: version.major,
            minor: version.minor,
            expected_major: CURRENT_VERSION.major,
            expected_minor: CURRENT_VERSION.minor,
        });
    }
    Ok(())
}

/// Encode a record as a complete frame
///
/// # Example
/// ```
/// use descriptors::{DevicesData, Record, RecordedEvent, encode_framed, decode_framed};
///
/// let record = Record::new("default", 0.0, RecordedEvent::Snapshot(DevicesData::default()));
/// let frame = encode_framed(&record).unwrap();
/// assert_eq!(decode_framed(&frame).unwrap(), record);
/// ```
pub fn encode_framed(record: &Record) -> Result<Vec<u8>> {
    let payload = encode_record(record)?;
    let payload_len = payload.len();

    if payload_len > MAX_FRAME_SIZE {
        return Err(FormatError::FrameTooLarge {
            size: payload_len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload_len);
    frame.extend_from_slice(&(payload_len as u32).to_be_bytes());
    frame.extend_from_slice(&compute_checksum(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);

    Ok(frame)
}

/// Decode a single complete frame
pub fn decode_framed(frame: &[u8]) -> Result<Record> {
    if frame.len() < FRAME_HEADER_LEN {
        return Err(FormatError::IncompleteFrame {
            expected: FRAME_HEADER_LEN,
            actual: frame.len(),
        });
    }

    let (length, checksum) = parse_header(&frame[..FRAME_HEADER_LEN])?;

    if frame.len() < FRAME_HEADER_LEN + length {
        return Err(FormatError::IncompleteFrame {
            expected: FRAME_HEADER_LEN + length,
            actual: frame.len(),
        });
    }

    let payload = &frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + length];
    check_payload(payload, checksum)?;
    decode_record(payload)
}

/// Write a framed record to a writer
pub fn write_framed<W: Write>(writer: &mut W, record: &Record) -> Result<()> {
    let framed = encode_framed(record)?;
    writer.write_all(&framed)?;
    Ok(())
}

/// Read the next framed record from a reader
///
/// Returns `Ok(None)` when the reader is exhausted exactly at a frame
/// boundary. A partially written frame is reported as
/// [`FormatError::IncompleteFrame`].
pub fn read_framed<R: Read>(reader: &mut R) -> Result<Option<Record>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < FRAME_HEADER_LEN {
        match reader.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if filled == 0 {
        return Ok(None);
    }
    if filled < FRAME_HEADER_LEN {
        return Err(FormatError::IncompleteFrame {
            expected: FRAME_HEADER_LEN,
            actual: filled,
        });
    }

    let (length, checksum) = parse_header(&header)?;

    let mut payload = Vec::with_capacity(length);
    reader.take(length as u64).read_to_end(&mut payload)?;
    if payload.len() < length {
        return Err(FormatError::IncompleteFrame {
            expected: FRAME_HEADER_LEN + length,
            actual: FRAME_HEADER_LEN + payload.len(),
        });
    }

    check_payload(&payload, checksum)?;
    decode_record(&payload).map(Some)
}

/// Read every remaining record from a reader
pub fn read_all<R: Read>(reader: &mut R) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(record) = read_framed(reader)? {
        records.push(record);
    }
    Ok(records)
}

fn parse_header(header: &[u8]) -> Result<(usize, u32)> {
    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let checksum = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);

    if length > MAX_FRAME_SIZE {
        return Err(FormatError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    Ok((length, checksum))
}

fn check_payload(payload: &[u8], expected: u32) -> Result<()> {
    let computed = compute_checksum(payload);
    if computed != expected {
        return Err(FormatError::ChecksumMismatch { expected, computed });
    }
    Ok(())
}
