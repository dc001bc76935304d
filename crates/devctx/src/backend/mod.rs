//! Backend collaborators
//!
//! A [`Backend`] performs bus enumeration, opens devices and delivers hot-plug
//! notifications. The discovery core only talks to hardware through this
//! trait, so live, recorded and replayed sessions (and the in-memory backend
//! used by tests) are interchangeable.
//!
//! Provided backends:
//! - [`UsbBackend`]: live enumeration through libusb
//! - [`RecordingBackend`]: wraps another backend and records what it sees
//! - [`PlaybackBackend`]: replays a recording section
//! - [`MemoryBackend`]: scripted in-memory snapshots

pub mod memory;
pub mod playback;
pub mod record;
pub mod usb;

pub use memory::MemoryBackend;
pub use playback::PlaybackBackend;
pub use record::RecordingBackend;
pub use usb::UsbBackend;

use crate::error::BackendError;
use crate::time::TimeService;
use descriptors::DevicesData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Result type for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Hot-plug notification handler, called with the snapshots before and after
/// a change
pub type HotplugHandler = Arc<dyn Fn(DevicesData, DevicesData) + Send + Sync>;

/// Where device visibility comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Live hardware
    #[default]
    Live,
    /// Live hardware, with every observation written to a recording file
    Record,
    /// Replay of a recording file
    Playback,
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(BackendMode::Live),
            "record" => Ok(BackendMode::Record),
            "playback" => Ok(BackendMode::Playback),
            other => Err(format!(
                "Invalid mode '{}', must be one of: live, record, playback",
                other
            )),
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendMode::Live => "live",
            BackendMode::Record => "record",
            BackendMode::Playback => "playback",
        };
        f.write_str(name)
    }
}

/// An opened device
///
/// Returned by [`Backend::open`]. Streaming is outside the discovery core;
/// this handle only identifies what was opened and keeps the underlying
/// sessions alive until dropped.
pub trait Device: Send + Sync + fmt::Debug {
    /// Descriptor group the device was opened from
    fn devices_data(&self) -> &DevicesData;
}

/// Bus enumeration and I/O provider
pub trait Backend: Send + Sync {
    /// Enumerate every endpoint currently visible
    fn query_raw_devices(&self) -> BackendResult<DevicesData>;

    /// Open the device described by a descriptor group
    fn open(&self, data: &DevicesData) -> BackendResult<Arc<dyn Device>>;

    /// Start delivering hot-plug notifications to `handler`
    ///
    /// Notifications stop once the returned [`Subscription`] is dropped.
    fn subscribe_hot_plug(&self, handler: HotplugHandler) -> BackendResult<Subscription>;

    /// Time source matching this backend's notion of time
    fn create_time_service(&self) -> Arc<dyn TimeService>;
}

/// Handle keeping a hot-plug registration alive
///
/// Dropping the subscription (or calling [`Subscription::cancel`]) runs the
/// backend's teardown, which joins any watcher thread before returning. No
/// notification is delivered after teardown completes.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when released
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Subscription with nothing to tear down
    pub fn inert() -> Self {
        Self { teardown: None }
    }

    /// Release the subscription now
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

/// Device handle with no I/O session behind it
///
/// Used by backends that have no hardware to talk to (in-memory and playback
/// sessions).
#[derive(Debug, Clone)]
pub struct DetachedDevice {
    data: DevicesData,
}

impl DetachedDevice {
    pub fn new(data: DevicesData) -> Self {
        Self { data }
    }
}

impl Device for DetachedDevice {
    fn devices_data(&self) -> &DevicesData {
        &self.data
    }
}
