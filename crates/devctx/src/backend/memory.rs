//! In-memory backend
//!
//! Serves a scripted snapshot instead of real hardware. Replacing the
//! snapshot with [`MemoryBackend::set_devices`] fires every registered
//! hot-plug handler synchronously on the calling thread, which stands in for
//! the backend-owned watcher thread.

use super::{
    Backend, BackendResult, DetachedDevice, Device, HotplugHandler, Subscription,
};
use crate::error::BackendError;
use crate::time::{MonotonicClock, TimeService};
use descriptors::DevicesData;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    devices: DevicesData,
    open_delay: Duration,
    open_failure: Option<BackendError>,
    query_failure: Option<BackendError>,
}

/// Scripted in-memory backend
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    handlers: Arc<Mutex<BTreeMap<u64, HotplugHandler>>>,
    next_handler_id: AtomicU64,
    open_calls: AtomicUsize,
    clock: Arc<MonotonicClock>,
}

impl MemoryBackend {
    /// Create a backend serving `devices`
    pub fn new(devices: DevicesData) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                devices,
                ..MemoryState::default()
            }),
            handlers: Arc::new(Mutex::new(BTreeMap::new())),
            next_handler_id: AtomicU64::new(1),
            open_calls: AtomicUsize::new(0),
            clock: Arc::new(MonotonicClock::new()),
        }
    }

    /// Replace the current snapshot and notify hot-plug subscribers
    ///
    /// Subscribers are called with (old, new) even when both are equal;
    /// deciding whether anything changed is the subscriber's job.
    pub fn set_devices(&self, devices: DevicesData) {
        let old = std::mem::replace(&mut self.lock_state().devices, devices.clone());

        let handlers: Vec<HotplugHandler> = lock(&self.handlers).values().cloned().collect();
        debug!(
            "Memory backend snapshot replaced ({} -> {} descriptors), notifying {} subscriber(s)",
            old.len(),
            devices.len(),
            handlers.len()
        );
        for handler in handlers {
            handler(old.clone(), devices.clone());
        }
    }

    /// Current snapshot
    pub fn devices(&self) -> DevicesData {
        self.lock_state().devices.clone()
    }

    /// Delay every `open` call, to widen race windows in tests
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock_state().open_delay = delay;
    }

    /// Make every following `open` call fail with `error` (or succeed again)
    pub fn set_open_failure(&self, error: Option<BackendError>) {
        self.lock_state().open_failure = error;
    }

    /// Make every following query fail with `error` (or succeed again)
    pub fn set_query_failure(&self, error: Option<BackendError>) {
        self.lock_state().query_failure = error;
    }

    /// Number of `open` calls served so far
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    /// Number of live hot-plug subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DevicesData::default())
    }
}

impl Backend for MemoryBackend {
    fn query_raw_devices(&self) -> BackendResult<DevicesData> {
        let state = self.lock_state();
        match &state.query_failure {
            Some(error) => Err(error.clone()),
            None => Ok(state.devices.clone()),
        }
    }

    fn open(&self, data: &DevicesData) -> BackendResult<Arc<dyn Device>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        let (delay, failure) = {
            let state = self.lock_state();
            (state.open_delay, state.open_failure.clone())
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if let Some(error) = failure {
            return Err(error);
        }

        Ok(Arc::new(DetachedDevice::new(data.clone())))
    }

    fn subscribe_hot_plug(&self, handler: HotplugHandler) -> BackendResult<Subscription> {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.handlers).insert(id, handler);

        let handlers = Arc::downgrade(&self.handlers);
        Ok(Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                lock(&handlers).remove(&id);
            }
        }))
    }

    fn create_time_service(&self) -> Arc<dyn TimeService> {
        self.clock.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
