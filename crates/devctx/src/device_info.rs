//! Logical devices before they are opened
//!
//! A [`DeviceInfo`] wraps one descriptor group. Building it is cheap: the
//! backend is only asked to open the device on the first
//! [`DeviceInfo::get_device`] call, and that outcome (handle or failure) is
//! cached for the lifetime of the instance.

use crate::backend::{Backend, Device};
use crate::error::{BackendError, Error, Result};
use crate::grouping::filter_by_interface;
use crate::lazy::Lazy;
use crate::recovery::RECOVERY_MESSAGE;
use descriptors::{DevicesData, EndpointDescriptor};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Variant of a logical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    /// Regular device, opened through the backend
    Standard {
        /// Name of the profile that selected the group
        profile: String,
    },
    /// Device stuck in firmware-recovery mode; can never be opened
    Recovery,
}

pub struct DeviceInfo {
    backend: Arc<dyn Backend>,
    data: DevicesData,
    kind: DeviceKind,
    device: Lazy<Result<Arc<dyn Device>>>,
}

impl DeviceInfo {
    /// Standard device for a descriptor group
    ///
    /// The group is normalized so equality does not depend on enumeration
    /// order.
    pub fn standard(backend: Arc<dyn Backend>, profile: &str, data: DevicesData) -> Self {
        let data = data.normalized();
        let opener = backend.clone();
        let group = data.clone();
        let device = Lazy::new(move || {
            info!("Opening device {}", group.unique_id().unwrap_or("<unknown>"));
            opener.open(&group).map_err(|e| {
                warn!("Failed to open device: {}", e);
                Error::from(e)
            })
        });

        Self {
            backend,
            data,
            kind: DeviceKind::Standard {
                profile: profile.to_string(),
            },
            device,
        }
    }

    /// Recovery stand-in wrapping one raw descriptor
    pub fn recovery(backend: Arc<dyn Backend>, descriptor: EndpointDescriptor) -> Self {
        Self {
            backend,
            data: DevicesData::from_usb(descriptor),
            kind: DeviceKind::Recovery,
            device: Lazy::new(|| Err(Error::DeviceInRecoveryMode(RECOVERY_MESSAGE.to_string()))),
        }
    }

    /// Descriptor group this device was built from
    pub fn get_device_data(&self) -> &DevicesData {
        &self.data
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    pub fn is_recovery(&self) -> bool {
        self.kind == DeviceKind::Recovery
    }

    /// Backend the device opens through
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Number of independently addressable sub-devices
    ///
    /// One per distinct video interface, plus one for the auxiliary endpoints
    /// when the group has any. Recovery devices always report one.
    pub fn get_subdevice_count(&self) -> usize {
        match self.kind {
            DeviceKind::Recovery => 1,
            DeviceKind::Standard { .. } => {
                self.video_interfaces().len() + usize::from(!self.data.hid.is_empty())
            }
        }
    }

    /// Descriptors backing sub-device `index`
    pub fn subdevice_endpoints(&self, index: usize) -> Result<Vec<EndpointDescriptor>> {
        if self.kind == DeviceKind::Recovery {
            return match index {
                0 => Ok(self.data.usb.clone()),
                _ => Err(self.subdevice_out_of_range(index)),
            };
        }

        let interfaces = self.video_interfaces();
        if let Some(interface) = interfaces.get(index) {
            return Ok(filter_by_interface(&self.data.video, *interface));
        }
        if index == interfaces.len() && !self.data.hid.is_empty() {
            return Ok(self.data.hid.clone());
        }
        Err(self.subdevice_out_of_range(index))
    }

    /// Open the device, or return the outcome of the first attempt
    ///
    /// Concurrent first calls block until the single attempt completes and
    /// all observe its result. A failure is cached like a success and is not
    /// retried. A backend that panics while opening yields
    /// [`BackendError::Other`] for this and every later call.
    pub fn get_device(&self) -> Result<Arc<dyn Device>> {
        if !self.device.is_initialized() {
            debug!("First access to device {:?}", self.data.unique_id());
        }
        match self.device.get() {
            Ok(outcome) => outcome.clone(),
            Err(panic) => {
                Err(BackendError::Other(format!("Device open failed: {}", panic)).into())
            }
        }
    }

    fn video_interfaces(&self) -> Vec<u8> {
        let distinct: BTreeSet<u8> = self.data.video.iter().map(|d| d.interface_index).collect();
        distinct.into_iter().collect()
    }

    fn subdevice_out_of_range(&self, index: usize) -> Error {
        Error::InvalidArgument(format!(
            "Sub-device {} out of range (device has {})",
            index,
            self.get_subdevice_count()
        ))
    }
}

impl PartialEq for DeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for DeviceInfo {}

impl fmt::Debug for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceInfo")
            .field("kind", &self.kind)
            .field("data", &self.data)
            .field("opened", &self.device.is_initialized())
            .finish()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unique_id = self.data.unique_id().unwrap_or("*");
        let product_id = self.data.product_id().unwrap_or_default();
        match &self.kind {
            DeviceKind::Standard { profile } => write!(
                f,
                "{} {:04x} @ {} ({} sub-device(s))",
                profile,
                product_id,
                unique_id,
                self.get_subdevice_count()
            ),
            DeviceKind::Recovery => write!(f, "recovery {:04x} @ {}", product_id, unique_id),
        }
    }
}
