//! Descriptor types for devctx
//!
//! This crate defines the bus-level identity types exchanged between a
//! backend and the discovery core, plus the on-disk format used to record and
//! replay enumeration sessions.
//!
//! # Example
//!
//! ```
//! use descriptors::{DevicesData, EndpointDescriptor};
//!
//! let depth = EndpointDescriptor::video(0x8086, 0x0ad3, "2-1.4", 0);
//! let imu = EndpointDescriptor::hid(0x8086, 0x0ad3, "*", 5);
//!
//! let snapshot = DevicesData::new(vec![depth], vec![imu.clone()], vec![]);
//! assert!(imu.is_wildcard());
//! assert_eq!(snapshot.unique_id(), Some("2-1.4"));
//! ```
//!
//! # Recording Frames
//!
//! ```
//! use descriptors::{DevicesData, Record, RecordedEvent, read_framed, write_framed};
//! use std::io::Cursor;
//!
//! let record = Record::new("bench", 0.0, RecordedEvent::Snapshot(DevicesData::default()));
//!
//! let mut buffer = Vec::new();
//! write_framed(&mut buffer, &record).unwrap();
//!
//! let mut cursor = Cursor::new(buffer);
//! assert_eq!(read_framed(&mut cursor).unwrap(), Some(record));
//! assert_eq!(read_framed(&mut cursor).unwrap(), None);
//! ```

pub mod codec;
pub mod error;
pub mod integrity;
pub mod record;
pub mod types;
pub mod version;

pub use codec::{
    FRAME_HEADER_LEN, MAX_FRAME_SIZE, decode_framed, decode_record, encode_framed, encode_record,
    read_all, read_framed, validate_version, write_framed,
};
pub use error::{FormatError, Result};
pub use record::{DEFAULT_SECTION, Record, RecordedEvent};
pub use types::{DevicesData, EndpointDescriptor, EndpointKind, WILDCARD_UNIQUE_ID};
pub use version::{CURRENT_VERSION, FormatVersion};
