//! Enumeration results handed across the library boundary
//!
//! A [`DeviceList`] keeps its [`Context`] alive for as long as the list (or
//! a clone of it) is held, so devices taken from it can still be opened after
//! the caller dropped its own context handle.

use crate::context::Context;
use crate::device_info::DeviceInfo;
use crate::error::Result;
use std::sync::Arc;

/// One enumerated device, optionally narrowed to a sub-device
#[derive(Debug, Clone)]
pub struct DeviceListEntry {
    pub info: Arc<DeviceInfo>,
    pub subdevice: Option<usize>,
}

#[derive(Clone)]
pub struct DeviceList {
    ctx: Arc<Context>,
    entries: Vec<DeviceListEntry>,
}

impl DeviceList {
    /// Wrap already-built devices, one entry each
    pub fn new(ctx: Arc<Context>, devices: Vec<Arc<DeviceInfo>>) -> Self {
        let entries = devices
            .into_iter()
            .map(|info| DeviceListEntry {
                info,
                subdevice: None,
            })
            .collect();
        Self { ctx, entries }
    }

    /// Current devices of `ctx`, one entry per device
    pub fn query(ctx: &Arc<Context>) -> Result<Self> {
        let devices = ctx.query_devices()?;
        Ok(Self::new(ctx.clone(), devices))
    }

    /// Current devices of `ctx`, one entry per sub-device
    pub fn query_subdevices(ctx: &Arc<Context>) -> Result<Self> {
        let entries = ctx
            .query_devices()?
            .into_iter()
            .flat_map(|info| {
                (0..info.get_subdevice_count()).map(move |index| DeviceListEntry {
                    info: info.clone(),
                    subdevice: Some(index),
                })
            })
            .collect();
        Ok(Self {
            ctx: ctx.clone(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DeviceListEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceListEntry> {
        self.entries.iter()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }
}

impl<'a> IntoIterator for &'a DeviceList {
    type Item = &'a DeviceListEntry;
    type IntoIter = std::slice::Iter<'a, DeviceListEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
