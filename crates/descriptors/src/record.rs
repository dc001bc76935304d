//! Recording file record definitions
//!
//! A recording is a flat sequence of [`Record`]s. Each record belongs to a
//! named section so that several sessions can share one file.

use crate::{DevicesData, FormatVersion};
use serde::{Deserialize, Serialize};

/// Section name used when none is given
pub const DEFAULT_SECTION: &str = "default";

/// One recorded backend observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Format version of the writer
    pub version: FormatVersion,
    /// Section this record belongs to
    pub section: String,
    /// Time service reading when the record was taken (milliseconds)
    pub timestamp_ms: f64,
    /// What was observed
    pub event: RecordedEvent,
}

/// Backend observations worth replaying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordedEvent {
    /// Result of a raw device query
    Snapshot(DevicesData),
    /// Hot-plug notification with the snapshots before and after the change
    Changed { old: DevicesData, new: DevicesData },
}

impl Record {
    /// Create a record stamped with the current format version
    pub fn new(section: impl Into<String>, timestamp_ms: f64, event: RecordedEvent) -> Self {
        Self {
            version: crate::CURRENT_VERSION,
            section: section.into(),
            timestamp_ms,
            event,
        }
    }
}
