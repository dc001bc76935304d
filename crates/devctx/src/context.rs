//! Discovery context
//!
//! The [`Context`] owns the backend, its time service and the hot-plug
//! subscription. It turns raw snapshots into [`DeviceInfo`] lists and, when
//! the backend reports a change, diffs the logical devices before and after
//! and hands (removed, added) to the registered callback.
//!
//! The hot-plug handler only holds the reconciliation state (backend,
//! profiles, callback slot), never the context itself. Dropping the context
//! tears the subscription down before anything else is released, so no
//! notification can observe a partially destroyed context.

use crate::backend::{
    Backend, BackendMode, PlaybackBackend, RecordingBackend, Subscription, UsbBackend,
};
use crate::backend::usb::WatcherOptions;
use crate::config::DevctxConfig;
use crate::device_info::DeviceInfo;
use crate::error::{Error, Result};
use crate::grouping::{
    filter_by_product, group_by_unique_id, interface_present, pair_groups_with_auxiliary,
    remove_claimed,
};
use crate::profile::DeviceProfile;
use crate::recovery::pick_recovery_devices;
use crate::time::TimeService;
use descriptors::{DEFAULT_SECTION, DevicesData};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Callback receiving the devices removed and added by a hot-plug change
pub type DevicesChangedCallback =
    Arc<dyn Fn(Vec<Arc<DeviceInfo>>, Vec<Arc<DeviceInfo>>) + Send + Sync>;

/// State shared with the hot-plug handler
struct Reconciler {
    backend: Arc<dyn Backend>,
    profiles: Vec<DeviceProfile>,
    callback: Mutex<Option<DevicesChangedCallback>>,
    /// Held for the duration of a callback invocation
    dispatch: Mutex<()>,
    /// Thread currently invoking the callback, if any
    dispatcher: Mutex<Option<ThreadId>>,
}

/// Marks the current thread as the dispatcher until dropped
struct DispatchGuard<'a> {
    dispatcher: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(dispatcher: &'a Mutex<Option<ThreadId>>) -> Self {
        *lock(dispatcher) = Some(thread::current().id());
        Self { dispatcher }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *lock(self.dispatcher) = None;
    }
}

impl Reconciler {
    fn create_devices(&self, data: &DevicesData) -> Vec<Arc<DeviceInfo>> {
        let mut devices = Vec::new();
        let mut remaining = data.video.clone();

        for profile in &self.profiles {
            let mut candidates = filter_by_product(&remaining, &profile.product_ids);
            candidates.retain(|d| profile.accepts_vendor(d));

            let groups = group_by_unique_id(&candidates);
            for (group, aux) in pair_groups_with_auxiliary(groups, &data.hid) {
                if let Some(missing) = profile
                    .required_interfaces
                    .iter()
                    .find(|mi| !interface_present(&group, **mi))
                {
                    debug!(
                        "Skipping group at {} for profile '{}': interface {} missing",
                        group[0].unique_id, profile.name, missing
                    );
                    continue;
                }

                remove_claimed(&mut remaining, &group);
                devices.push(Arc::new(DeviceInfo::standard(
                    self.backend.clone(),
                    &profile.name,
                    DevicesData::new(group, aux, Vec::new()),
                )));
            }
        }

        devices.extend(pick_recovery_devices(&self.backend, &data.usb));
        devices
    }

    fn on_device_changed(&self, old: &DevicesData, new: &DevicesData) {
        let (removed, added) = diff_devices(&self.create_devices(old), &self.create_devices(new));
        if removed.is_empty() && added.is_empty() {
            debug!("Hot-plug change without logical device change");
            return;
        }

        info!(
            "Devices changed: {} removed, {} added",
            removed.len(),
            added.len()
        );

        let _dispatch = lock(&self.dispatch);
        let _dispatcher = DispatchGuard::enter(&self.dispatcher);
        let callback = lock(&self.callback).clone();
        match callback {
            Some(callback) => callback(removed, added),
            None => debug!("No devices-changed callback registered, dropping change"),
        }
    }

    /// Swap the callback slot
    ///
    /// Outside the notification thread this waits for an in-flight
    /// invocation, so the previous callback never runs after it returns.
    fn replace_callback(&self, callback: Option<DevicesChangedCallback>) {
        let previous = std::mem::replace(&mut *lock(&self.callback), callback);
        let reentrant = *lock(&self.dispatcher) == Some(thread::current().id());
        if !reentrant {
            drop(lock(&self.dispatch));
        }
        drop(previous);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Devices present only in `old` and devices present only in `new`
///
/// Set difference under [`DeviceInfo`] equality: duplicates collapse, and
/// the relative order of each input is kept.
pub fn diff_devices(
    old: &[Arc<DeviceInfo>],
    new: &[Arc<DeviceInfo>],
) -> (Vec<Arc<DeviceInfo>>, Vec<Arc<DeviceInfo>>) {
    (difference(old, new), difference(new, old))
}

fn difference(from: &[Arc<DeviceInfo>], without: &[Arc<DeviceInfo>]) -> Vec<Arc<DeviceInfo>> {
    let mut result: Vec<Arc<DeviceInfo>> = Vec::new();
    for device in from {
        if !without.contains(device) && !result.contains(device) {
            result.push(device.clone());
        }
    }
    result
}

/// Process-facing discovery context
pub struct Context {
    subscription: Option<Subscription>,
    reconciler: Arc<Reconciler>,
    time: Arc<dyn TimeService>,
}

impl Context {
    /// Create a context for `mode`
    ///
    /// Record and playback modes need `file_path`; `section` defaults to
    /// [`DEFAULT_SECTION`]. Live mode ignores both.
    pub fn new(
        mode: BackendMode,
        file_path: Option<&Path>,
        section: Option<&str>,
    ) -> Result<Arc<Self>> {
        let backend = create_backend(mode, file_path, section, WatcherOptions::default())?;
        Self::with_backend(backend, DeviceProfile::defaults())
    }

    /// Create a context from a loaded configuration
    pub fn from_config(config: &DevctxConfig) -> Result<Arc<Self>> {
        let profiles = config
            .device_profiles()
            .map_err(|e| Error::InvalidArgument(format!("{:#}", e)))?;
        let file_path = config.context.file_path();
        let backend = create_backend(
            config.context.mode,
            file_path.as_deref(),
            config.context.section.as_deref(),
            config.context.watcher_options(),
        )?;
        Self::with_backend(backend, profiles)
    }

    /// Create a context over an existing backend
    pub fn with_backend(backend: Arc<dyn Backend>, profiles: Vec<DeviceProfile>) -> Result<Arc<Self>> {
        let reconciler = Arc::new(Reconciler {
            backend: backend.clone(),
            profiles,
            callback: Mutex::new(None),
            dispatch: Mutex::new(()),
            dispatcher: Mutex::new(None),
        });

        let handler_state = reconciler.clone();
        let subscription = backend.subscribe_hot_plug(Arc::new(move |old, new| {
            handler_state.on_device_changed(&old, &new)
        }))?;

        debug!(
            "Context created with {} profile(s)",
            reconciler.profiles.len()
        );
        Ok(Arc::new(Self {
            subscription: Some(subscription),
            time: backend.create_time_service(),
            reconciler,
        }))
    }

    /// Query the backend and build the current logical devices
    pub fn query_devices(&self) -> Result<Vec<Arc<DeviceInfo>>> {
        let data = self.reconciler.backend.query_raw_devices()?;
        let devices = self.create_devices(&data);
        debug!(
            "Query found {} device(s) in {} raw descriptor(s)",
            devices.len(),
            data.len()
        );
        Ok(devices)
    }

    /// Build logical devices from an already-selected snapshot
    pub fn create_devices(&self, data: &DevicesData) -> Vec<Arc<DeviceInfo>> {
        self.reconciler.create_devices(data)
    }

    /// Register the devices-changed callback, replacing any previous one
    ///
    /// Once this returns the previous callback is never invoked again. The
    /// callback runs on the backend's notification thread; it may register or
    /// clear callbacks itself, which takes effect from the next change.
    pub fn set_devices_changed_callback<F>(&self, callback: F)
    where
        F: Fn(Vec<Arc<DeviceInfo>>, Vec<Arc<DeviceInfo>>) + Send + Sync + 'static,
    {
        self.reconciler.replace_callback(Some(Arc::new(callback)));
    }

    /// Remove the devices-changed callback; later changes are dropped
    pub fn clear_devices_changed_callback(&self) {
        self.reconciler.replace_callback(None);
    }

    /// Reconcile a change between two snapshots
    ///
    /// Driven by the hot-plug subscription; also usable to feed changes
    /// observed out of band. The callback only runs when the logical device
    /// sets differ.
    pub fn on_device_changed(&self, old: &DevicesData, new: &DevicesData) {
        self.reconciler.on_device_changed(old, new);
    }

    pub fn get_time(&self) -> f64 {
        self.time.now()
    }

    pub fn get_backend(&self) -> &Arc<dyn Backend> {
        &self.reconciler.backend
    }

    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.reconciler.profiles
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        debug!("Context dropped, hot-plug subscription released");
    }
}

fn create_backend(
    mode: BackendMode,
    file_path: Option<&Path>,
    section: Option<&str>,
    options: WatcherOptions,
) -> Result<Arc<dyn Backend>> {
    let section = section.unwrap_or(DEFAULT_SECTION);
    let require_path = || {
        file_path.ok_or_else(|| {
            Error::InvalidArgument(format!("{} mode requires a file path", mode))
        })
    };

    let backend: Arc<dyn Backend> = match mode {
        BackendMode::Live => {
            if file_path.is_some() {
                warn!("Ignoring recording file in live mode");
            }
            Arc::new(UsbBackend::with_options(options)?)
        }
        BackendMode::Record => {
            let path = require_path()?;
            let live = Arc::new(UsbBackend::with_options(options)?);
            Arc::new(RecordingBackend::create(live, path, section)?)
        }
        BackendMode::Playback => {
            let path = require_path()?;
            Arc::new(PlaybackBackend::open(path, section)?)
        }
    };

    info!("Created {} backend", mode);
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use descriptors::EndpointDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn camera(unique_id: &str) -> DevicesData {
        DevicesData::new(
            vec![EndpointDescriptor::video(0x8086, 0x0ad3, unique_id, 0)],
            vec![],
            vec![],
        )
    }

    fn memory_context(data: DevicesData) -> (Arc<MemoryBackend>, Arc<Context>) {
        let memory = Arc::new(MemoryBackend::new(data));
        let ctx = Context::with_backend(memory.clone(), DeviceProfile::defaults()).unwrap();
        (memory, ctx)
    }

    #[test]
    fn test_record_and_playback_need_a_path() {
        for mode in [BackendMode::Record, BackendMode::Playback] {
            assert!(matches!(
                Context::new(mode, None, None),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_unchanged_snapshot_does_not_notify() {
        let (_memory, ctx) = memory_context(camera("1-1"));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        ctx.set_devices_changed_callback(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctx.on_device_changed(&camera("1-1"), &camera("1-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        ctx.on_device_changed(&camera("1-1"), &camera("1-2"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_profiles_claim_in_order() {
        let memory: Arc<dyn Backend> = Arc::new(MemoryBackend::default());
        let profiles = vec![
            DeviceProfile::new("first", vec![0x0ad3]),
            DeviceProfile::new("second", vec![0x0ad3, 0x0ad4]),
        ];
        let ctx = Context::with_backend(memory, profiles).unwrap();

        let mut data = camera("1-1");
        data.video
            .push(EndpointDescriptor::video(0x8086, 0x0ad4, "1-2", 0));
        let devices = ctx.create_devices(&data);

        let profiles: Vec<_> = devices
            .iter()
            .map(|d| match d.kind() {
                crate::DeviceKind::Standard { profile } => profile.clone(),
                crate::DeviceKind::Recovery => "recovery".to_string(),
            })
            .collect();
        assert_eq!(profiles, vec!["first", "second"]);
    }

    #[test]
    fn test_required_interface_missing_skips_group() {
        let (_memory, ctx) = memory_context(DevicesData::default());
        let data = DevicesData::new(
            vec![EndpointDescriptor::video(0x8086, 0x0ad3, "1-1", 3)],
            vec![],
            vec![],
        );
        assert!(ctx.create_devices(&data).is_empty());
    }

    #[test]
    fn test_drop_releases_subscription() {
        let (memory, ctx) = memory_context(camera("1-1"));
        assert_eq!(memory.subscriber_count(), 1);
        drop(ctx);
        assert_eq!(memory.subscriber_count(), 0);
    }
}
