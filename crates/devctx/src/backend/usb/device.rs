//! Opened USB device
//!
//! Opening a descriptor group opens every physical device the group spans,
//! detaches kernel drivers from the group's interfaces and claims them.
//! Dropping the [`UsbDevice`] releases the interfaces and hands them back to
//! the kernel.

use crate::backend::{BackendResult, Device};
use crate::error::BackendError;
use descriptors::DevicesData;
use rusb::{Context, DeviceHandle, UsbContext};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Claimed interfaces of one physical device
struct InterfaceSession {
    unique_id: String,
    handle: DeviceHandle<Context>,
    claimed: Vec<u8>,
    detached: Vec<u8>,
}

impl InterfaceSession {
    /// Claim an interface, detaching the kernel driver first if one is bound
    fn claim(&mut self, interface: u8) -> Result<(), rusb::Error> {
        match self.handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!(
                    "Detaching kernel driver from interface {} on {}",
                    interface, self.unique_id
                );
                match self.handle.detach_kernel_driver(interface) {
                    Ok(()) => self.detached.push(interface),
                    // Claiming below reports the real failure
                    Err(e) => warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    ),
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
            }
        }

        self.handle.claim_interface(interface)?;
        debug!("Claimed interface {} on {}", interface, self.unique_id);
        self.claimed.push(interface);
        Ok(())
    }
}

impl Drop for InterfaceSession {
    fn drop(&mut self) {
        for interface in &self.claimed {
            if let Err(e) = self.handle.release_interface(*interface) {
                warn!("Failed to release interface {}: {}", interface, e);
            }
        }

        for interface in &self.detached {
            match self.handle.attach_kernel_driver(*interface) {
                Ok(()) => debug!(
                    "Reattached kernel driver to interface {} on {}",
                    interface, self.unique_id
                ),
                Err(e) => debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    interface, e
                ),
            }
        }

        debug!("Closed {}", self.unique_id);
    }
}

/// Opened composite USB device
pub struct UsbDevice {
    data: DevicesData,
    sessions: Mutex<Vec<InterfaceSession>>,
}

impl UsbDevice {
    /// Open every physical device of `data` and claim its interfaces
    ///
    /// Wildcard descriptors are not tied to a physical unit and are left
    /// unclaimed. On failure every interface claimed so far is released.
    pub fn open(context: &Context, data: &DevicesData) -> BackendResult<Self> {
        let mut wanted: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
        for descriptor in data.video.iter().chain(data.hid.iter()) {
            if descriptor.is_wildcard() {
                debug!("Leaving wildcard endpoint unclaimed: {}", descriptor);
                continue;
            }
            let interfaces = wanted.entry(descriptor.unique_id.as_str()).or_default();
            if !interfaces.contains(&descriptor.interface_index) {
                interfaces.push(descriptor.interface_index);
            }
        }
        for descriptor in &data.usb {
            wanted.entry(descriptor.unique_id.as_str()).or_default();
        }

        let mut sessions = Vec::with_capacity(wanted.len());
        for (unique_id, interfaces) in wanted {
            let device = find_device(context, unique_id)?;
            let handle = device.open().map_err(|e| {
                warn!("Failed to open device {}: {}", unique_id, e);
                BackendError::from(e)
            })?;
            debug!("Opened device {}", unique_id);

            let mut session = InterfaceSession {
                unique_id: unique_id.to_string(),
                handle,
                claimed: Vec::new(),
                detached: Vec::new(),
            };
            for interface in interfaces {
                session.claim(interface).map_err(|e| {
                    warn!(
                        "Failed to claim interface {} on {}: {}",
                        interface, unique_id, e
                    );
                    BackendError::from(e)
                })?;
            }
            sessions.push(session);
        }

        Ok(Self {
            data: data.clone(),
            sessions: Mutex::new(sessions),
        })
    }

    /// Number of physical devices held open
    pub fn session_count(&self) -> usize {
        self.sessions
            .lock()
            .map(|s| s.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}

impl Device for UsbDevice {
    fn devices_data(&self) -> &DevicesData {
        &self.data
    }
}

impl fmt::Debug for UsbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbDevice")
            .field("unique_id", &self.data.unique_id())
            .field("sessions", &self.session_count())
            .finish()
    }
}

/// Locate the physical device with the given port path
fn find_device(context: &Context, unique_id: &str) -> BackendResult<rusb::Device<Context>> {
    context
        .devices()?
        .iter()
        .find(|device| super::device_unique_id(device) == unique_id)
        .ok_or_else(|| BackendError::DeviceNotFound(unique_id.to_string()))
}
