//! Live USB backend
//!
//! Enumerates devices through libusb and maps every interface of interest to
//! an [`EndpointDescriptor`]:
//! - video-control interfaces (class 0x0E, subclass 0x01) become `Video`
//! - HID interfaces (class 0x03) become `Hid`
//! - every physical device contributes one `Usb` identity
//!
//! The `unique_id` of every descriptor is the physical port path of its
//! device (`"<bus>-<port>.<port>..."`), so all interfaces of one composite
//! device share it.

mod device;
mod watcher;

pub use device::UsbDevice;

use super::{Backend, BackendResult, Device, HotplugHandler, Subscription};
use crate::time::{MonotonicClock, TimeService};
use descriptors::{DevicesData, EndpointDescriptor, EndpointKind};
use rusb::{Context, UsbContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// USB class code of video interfaces
const CLASS_VIDEO: u8 = 0x0e;
/// Video subclass of the video-control interface
const SUBCLASS_VIDEO_CONTROL: u8 = 0x01;
/// USB class code of HID interfaces
const CLASS_HID: u8 = 0x03;
/// USB class code of hubs
const CLASS_HUB: u8 = 0x09;
/// Vendor ID of Linux Foundation root hubs
const LINUX_FOUNDATION_VID: u16 = 0x1d6b;

/// Hot-plug watcher timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Re-enumeration period when the platform lacks hot-plug support
    pub poll_interval: Duration,
    /// Quiet time after the last hot-plug event before re-enumerating
    pub debounce: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            debounce: Duration::from_millis(100),
        }
    }
}

pub(crate) struct UsbShared {
    context: Context,
    options: WatcherOptions,
}

impl UsbShared {
    fn enumerate(&self) -> BackendResult<DevicesData> {
        enumerate(&self.context)
    }
}

/// libusb-backed live backend
#[derive(Clone)]
pub struct UsbBackend {
    shared: Arc<UsbShared>,
    clock: Arc<MonotonicClock>,
}

impl UsbBackend {
    /// Create a backend with default watcher timing
    pub fn new() -> BackendResult<Self> {
        Self::with_options(WatcherOptions::default())
    }

    /// Create a backend with custom watcher timing
    pub fn with_options(options: WatcherOptions) -> BackendResult<Self> {
        let context = Context::new()?;
        info!(
            "USB backend initialized (hot-plug support: {})",
            rusb::has_hotplug()
        );

        Ok(Self {
            shared: Arc::new(UsbShared { context, options }),
            clock: Arc::new(MonotonicClock::new()),
        })
    }

    /// Get USB context
    pub fn context(&self) -> &Context {
        &self.shared.context
    }
}

impl Backend for UsbBackend {
    fn query_raw_devices(&self) -> BackendResult<DevicesData> {
        self.shared.enumerate()
    }

    fn open(&self, data: &DevicesData) -> BackendResult<Arc<dyn Device>> {
        let device = UsbDevice::open(&self.shared.context, data)?;
        Ok(Arc::new(device))
    }

    fn subscribe_hot_plug(&self, handler: HotplugHandler) -> BackendResult<Subscription> {
        watcher::spawn(self.shared.clone(), handler)
    }

    fn create_time_service(&self) -> Arc<dyn TimeService> {
        self.clock.clone()
    }
}

/// Enumerate all currently connected USB devices
fn enumerate(context: &Context) -> BackendResult<DevicesData> {
    let devices = context.devices()?;
    let mut data = DevicesData::default();

    for device in devices.iter() {
        match describe_device(&device) {
            Ok(descriptors) => {
                for descriptor in descriptors {
                    match descriptor.kind {
                        EndpointKind::Video => data.video.push(descriptor),
                        EndpointKind::Hid => data.hid.push(descriptor),
                        EndpointKind::Usb => data.usb.push(descriptor),
                    }
                }
            }
            Err(e) => {
                debug!(
                    "Skipping device bus={}, addr={}: {}",
                    device.bus_number(),
                    device.address(),
                    e
                );
            }
        }
    }

    debug!(
        "Enumerated {} video, {} hid, {} usb endpoint(s)",
        data.video.len(),
        data.hid.len(),
        data.usb.len()
    );
    Ok(data)
}

/// Read the endpoint descriptors of one physical device
fn describe_device(device: &rusb::Device<Context>) -> Result<Vec<EndpointDescriptor>, rusb::Error> {
    let desc = device.device_descriptor()?;

    // Root hubs never expose endpoints of interest
    if desc.vendor_id() == LINUX_FOUNDATION_VID && desc.class_code() == CLASS_HUB {
        return Err(rusb::Error::NotSupported);
    }

    let unique_id = device_unique_id(device);
    let mut descriptors = vec![EndpointDescriptor::usb(
        desc.vendor_id(),
        desc.product_id(),
        unique_id.as_str(),
    )];

    let config = match device.active_config_descriptor() {
        Ok(config) => config,
        Err(e) => {
            // Unconfigured devices (e.g. firmware loaders) still report a USB identity
            debug!("No active configuration for {}: {}", unique_id, e);
            return Ok(descriptors);
        }
    };

    for interface in config.interfaces() {
        let Some(alt) = interface.descriptors().next() else {
            continue;
        };
        if let Some(kind) = classify_interface(alt.class_code(), alt.sub_class_code()) {
            descriptors.push(EndpointDescriptor::new(
                kind,
                desc.vendor_id(),
                desc.product_id(),
                unique_id.as_str(),
                alt.interface_number(),
            ));
        }
    }

    Ok(descriptors)
}

/// Physical port path identifying a device, e.g. `"2-1.4"`
fn device_unique_id(device: &rusb::Device<Context>) -> String {
    let ports = match device.port_numbers() {
        Ok(ports) => ports,
        Err(e) => {
            warn!(
                "Could not read port path of bus={}, addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            );
            Vec::new()
        }
    };
    format_unique_id(device.bus_number(), device.address(), &ports)
}

/// Format a port path; devices without one fall back to their bus address
pub(crate) fn format_unique_id(bus: u8, address: u8, ports: &[u8]) -> String {
    if ports.is_empty() {
        return format!("{}-a{}", bus, address);
    }
    let path: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
    format!("{}-{}", bus, path.join("."))
}

/// Map an interface class to the endpoint kind it contributes, if any
pub(crate) fn classify_interface(class: u8, subclass: u8) -> Option<EndpointKind> {
    match (class, subclass) {
        (CLASS_VIDEO, SUBCLASS_VIDEO_CONTROL) => Some(EndpointKind::Video),
        (CLASS_HID, _) => Some(EndpointKind::Hid),
        _ => None,
    }
}
