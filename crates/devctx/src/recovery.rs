//! Firmware-recovery detection
//!
//! A device whose firmware failed to boot re-enumerates under a reserved
//! product id. It can only be reported, never opened.

use crate::backend::Backend;
use crate::device_info::DeviceInfo;
use descriptors::EndpointDescriptor;
use std::sync::Arc;
use tracing::warn;

/// Product ids reported by devices stuck in firmware-recovery mode
pub const RECOVERY_PRODUCT_IDS: [u16; 2] = [0x0ADB, 0x0AB3];

/// Message returned when opening a recovery device
pub const RECOVERY_MESSAGE: &str = "Selected device is in recovery mode!\n\
Either perform a firmware update or reconnect the device to fall back to the last working firmware, if available.";

/// Whether `product_id` is one of the reserved recovery ids
pub fn is_recovery_id(product_id: u16) -> bool {
    RECOVERY_PRODUCT_IDS.contains(&product_id)
}

/// One recovery [`DeviceInfo`] per raw descriptor carrying a recovery id
///
/// Each recovery device wraps exactly the descriptor it was found from and is
/// never paired with auxiliary descriptors.
pub fn pick_recovery_devices(
    backend: &Arc<dyn Backend>,
    descriptors: &[EndpointDescriptor],
) -> Vec<Arc<DeviceInfo>> {
    descriptors
        .iter()
        .filter(|d| is_recovery_id(d.product_id))
        .map(|d| {
            warn!(
                "Device {:04x}:{:04x} at {} is in firmware-recovery mode",
                d.vendor_id, d.product_id, d.unique_id
            );
            Arc::new(DeviceInfo::recovery(backend.clone(), d.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[test]
    fn test_recovery_ids_exact() {
        assert!(is_recovery_id(0x0ADB));
        assert!(is_recovery_id(0x0AB3));

        for pid in [0x0000, 0x0ADA, 0x0ADC, 0x0AB2, 0x0AB4, 0x0AD3, 0xFFFF] {
            assert!(!is_recovery_id(pid), "{:#06x} must not be a recovery id", pid);
        }
    }

    #[test]
    fn test_pick_recovery_devices() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::default());
        let raw = vec![
            EndpointDescriptor::usb(0x8086, 0x0AD3, "1-1"),
            EndpointDescriptor::usb(0x8086, 0x0ADB, "1-2"),
            EndpointDescriptor::usb(0x8086, 0x0AB3, "1-3"),
        ];

        let devices = pick_recovery_devices(&backend, &raw);
        assert_eq!(devices.len(), 2);
        assert!(devices.iter().all(|d| d.is_recovery()));
        assert_eq!(devices[0].get_device_data().usb, vec![raw[1].clone()]);
        assert_eq!(devices[1].get_device_data().usb, vec![raw[2].clone()]);
    }

    #[test]
    fn test_message_mentions_remedies() {
        assert!(RECOVERY_MESSAGE.contains("recovery mode"));
        assert!(RECOVERY_MESSAGE.contains("firmware update"));
        assert!(RECOVERY_MESSAGE.contains("reconnect"));
    }
}
