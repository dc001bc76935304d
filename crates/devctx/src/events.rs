//! Bridge from the devices-changed callback into async code
//!
//! The callback runs on the backend's notification thread. [`subscribe_changes`]
//! installs a callback forwarding every change into an unbounded channel that
//! async tasks can await.

use crate::context::Context;
use crate::device_info::DeviceInfo;
use async_channel::Receiver;
use std::sync::Arc;
use tracing::warn;

/// One reconciled hot-plug change
#[derive(Debug, Clone)]
pub struct DeviceChange {
    pub removed: Vec<Arc<DeviceInfo>>,
    pub added: Vec<Arc<DeviceInfo>>,
}

/// Forward every devices-changed notification of `ctx` into a channel
///
/// Replaces any callback registered earlier. Once the receiver is dropped,
/// further changes are discarded with a warning.
pub fn subscribe_changes(ctx: &Context) -> Receiver<DeviceChange> {
    let (tx, rx) = async_channel::unbounded();
    ctx.set_devices_changed_callback(move |removed, added| {
        if tx.send_blocking(DeviceChange { removed, added }).is_err() {
            warn!("Device change receiver closed, dropping notification");
        }
    });
    rx
}
