//! Endpoint descriptor and snapshot type definitions
//!
//! This module defines the bus-level identity types handed out by a backend:
//! one [`EndpointDescriptor`] per enumerated interface, and [`DevicesData`],
//! the equality-comparable snapshot of everything the backend saw at once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique id marking an endpoint that is not tied to one physical unit
///
/// Auxiliary endpoints carrying this id are broadcast to every device group
/// of the same snapshot.
pub const WILDCARD_UNIQUE_ID: &str = "*";

/// Kind of bus interface an endpoint descriptor was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EndpointKind {
    /// Primary streaming interface (video control)
    Video,
    /// Auxiliary HID interface (motion sensors and similar)
    Hid,
    /// Bare USB device identity, one per physical device
    Usb,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndpointKind::Video => "video",
            EndpointKind::Hid => "hid",
            EndpointKind::Usb => "usb",
        };
        f.write_str(name)
    }
}

/// Immutable identity of one bus interface
///
/// Equality is structural: two descriptors are equal only if every field is
/// equal. The derived ordering is total and is used to normalize descriptor
/// groups so that enumeration order never affects equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// Physical-path string identifying the composite device instance
    pub unique_id: String,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Interface number within the composite device
    pub interface_index: u8,
    /// Interface kind
    pub kind: EndpointKind,
    /// Serial number string (if the backend could read it)
    pub serial: Option<String>,
}

impl EndpointDescriptor {
    /// Create a descriptor of the given kind without a serial number
    pub fn new(
        kind: EndpointKind,
        vendor_id: u16,
        product_id: u16,
        unique_id: impl Into<String>,
        interface_index: u8,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            vendor_id,
            product_id,
            interface_index,
            kind,
            serial: None,
        }
    }

    /// Create a video (primary) endpoint descriptor
    pub fn video(
        vendor_id: u16,
        product_id: u16,
        unique_id: impl Into<String>,
        interface_index: u8,
    ) -> Self {
        Self::new(
            EndpointKind::Video,
            vendor_id,
            product_id,
            unique_id,
            interface_index,
        )
    }

    /// Create an auxiliary HID endpoint descriptor
    pub fn hid(
        vendor_id: u16,
        product_id: u16,
        unique_id: impl Into<String>,
        interface_index: u8,
    ) -> Self {
        Self::new(
            EndpointKind::Hid,
            vendor_id,
            product_id,
            unique_id,
            interface_index,
        )
    }

    /// Create a bare USB device descriptor
    pub fn usb(vendor_id: u16, product_id: u16, unique_id: impl Into<String>) -> Self {
        Self::new(EndpointKind::Usb, vendor_id, product_id, unique_id, 0)
    }

    /// Attach a serial number
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    /// Whether this descriptor is broadcast to every device group
    pub fn is_wildcard(&self) -> bool {
        self.unique_id == WILDCARD_UNIQUE_ID
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:04x}:{:04x} mi={} @ {}",
            self.kind, self.vendor_id, self.product_id, self.interface_index, self.unique_id
        )?;
        if let Some(serial) = &self.serial {
            write!(f, " sn={}", serial)?;
        }
        Ok(())
    }
}

/// Snapshot of endpoint descriptors
///
/// Returned by a backend as the raw enumeration result, and used as the
/// descriptor group of a single logical device. Two snapshots are equal iff
/// their three lists are equal element by element; call
/// [`DevicesData::normalized`] first when enumeration order must not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DevicesData {
    /// Primary (video) endpoints
    pub video: Vec<EndpointDescriptor>,
    /// Auxiliary (HID) endpoints
    pub hid: Vec<EndpointDescriptor>,
    /// Bare USB device identities
    pub usb: Vec<EndpointDescriptor>,
}

impl DevicesData {
    /// Create a snapshot from its three descriptor lists
    pub fn new(
        video: Vec<EndpointDescriptor>,
        hid: Vec<EndpointDescriptor>,
        usb: Vec<EndpointDescriptor>,
    ) -> Self {
        Self { video, hid, usb }
    }

    /// Snapshot holding a single USB identity (used for recovery devices)
    pub fn from_usb(descriptor: EndpointDescriptor) -> Self {
        Self {
            usb: vec![descriptor],
            ..Self::default()
        }
    }

    /// Sort every list so equality no longer depends on enumeration order
    pub fn normalized(mut self) -> Self {
        self.video.sort();
        self.hid.sort();
        self.usb.sort();
        self
    }

    /// Whether the snapshot holds no descriptors at all
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.hid.is_empty() && self.usb.is_empty()
    }

    /// Total number of descriptors across all lists
    pub fn len(&self) -> usize {
        self.video.len() + self.hid.len() + self.usb.len()
    }

    /// Iterate over every descriptor, video first, then HID, then USB
    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.video.iter().chain(self.hid.iter()).chain(self.usb.iter())
    }

    /// Unique id of the first non-wildcard descriptor
    pub fn unique_id(&self) -> Option<&str> {
        self.iter()
            .find(|d| !d.is_wildcard())
            .map(|d| d.unique_id.as_str())
    }

    /// Product id of the first descriptor
    pub fn product_id(&self) -> Option<u16> {
        self.iter().next().map(|d| d.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 0);
        let b = EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 0);
        assert_eq!(a, b);

        let c = b.clone().with_serial("123");
        assert_ne!(a, c);

        let d = EndpointDescriptor::hid(0x8086, 0x0ad3, "1-2", 0);
        assert_ne!(a, d);
    }

    #[test]
    fn test_wildcard() {
        assert!(EndpointDescriptor::hid(0x8086, 0x0ad3, "*", 5).is_wildcard());
        assert!(!EndpointDescriptor::hid(0x8086, 0x0ad3, "1-2", 5).is_wildcard());
    }

    #[test]
    fn test_normalized_ignores_order() {
        let x0 = EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 0);
        let x3 = EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 3);

        let a = DevicesData::new(vec![x0.clone(), x3.clone()], vec![], vec![]);
        let b = DevicesData::new(vec![x3, x0], vec![], vec![]);
        assert_ne!(a, b);
        assert_eq!(a.normalized(), b.normalized());
    }

    #[test]
    fn test_unique_id_skips_wildcard() {
        let data = DevicesData::new(
            vec![],
            vec![
                EndpointDescriptor::hid(0x8086, 0x0ad3, "*", 5),
                EndpointDescriptor::hid(0x8086, 0x0ad3, "1-2", 6),
            ],
            vec![],
        );
        assert_eq!(data.unique_id(), Some("1-2"));
        assert_eq!(data.len(), 2);
        assert!(!data.is_empty());
        assert!(DevicesData::default().is_empty());
    }

    #[test]
    fn test_display() {
        let desc = EndpointDescriptor::video(0x8086, 0x0ad3, "1-2", 3).with_serial("A1");
        assert_eq!(desc.to_string(), "video 8086:0ad3 mi=3 @ 1-2 sn=A1");
    }
}
