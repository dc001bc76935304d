//! Device profiles
//!
//! A profile names one family of standard devices: which product ids belong
//! to it and which video interfaces a group must expose to be usable.

use descriptors::EndpointDescriptor;
use serde::{Deserialize, Serialize};

/// Vendor id of the default device family
pub const DEFAULT_VENDOR_ID: u16 = 0x8086;

/// Product ids claimed by the default profile
pub const DEFAULT_PRODUCT_IDS: [u16; 12] = [
    0x0AD1, 0x0AD2, 0x0AD3, 0x0AD4, 0x0AD5, 0x0AF6, 0x0AFE, 0x0AFF, 0x0B00, 0x0B01, 0x0B07,
    0x0B3A,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    /// Restrict the profile to one vendor; `None` accepts any vendor
    pub vendor_id: Option<u16>,
    pub product_ids: Vec<u16>,
    /// Video interface indices every group must expose
    pub required_interfaces: Vec<u8>,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>, product_ids: Vec<u16>) -> Self {
        Self {
            name: name.into(),
            vendor_id: None,
            product_ids,
            required_interfaces: Vec::new(),
        }
    }

    pub fn with_vendor(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_required_interfaces(mut self, interfaces: Vec<u8>) -> Self {
        self.required_interfaces = interfaces;
        self
    }

    /// Built-in profile list
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("depth-camera", DEFAULT_PRODUCT_IDS.to_vec())
                .with_vendor(DEFAULT_VENDOR_ID)
                .with_required_interfaces(vec![0]),
        ]
    }

    /// Whether the descriptor's vendor is accepted by this profile
    pub fn accepts_vendor(&self, descriptor: &EndpointDescriptor) -> bool {
        self.vendor_id.is_none_or(|vid| vid == descriptor.vendor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::is_recovery_id;

    #[test]
    fn test_defaults_disjoint_from_recovery_ids() {
        for profile in DeviceProfile::defaults() {
            assert!(!profile.product_ids.is_empty());
            assert!(profile.product_ids.iter().all(|pid| !is_recovery_id(*pid)));
        }
    }

    #[test]
    fn test_accepts_vendor() {
        let any = DeviceProfile::new("any", vec![0x0AD3]);
        let restricted = any.clone().with_vendor(0x8086);
        let other = EndpointDescriptor::video(0x1234, 0x0AD3, "1-1", 0);

        assert!(any.accepts_vendor(&other));
        assert!(!restricted.accepts_vendor(&other));
        assert!(restricted.accepts_vendor(&EndpointDescriptor::video(0x8086, 0x0AD3, "1-1", 0)));
    }
}
