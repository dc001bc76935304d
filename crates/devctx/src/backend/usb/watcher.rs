//! USB hot-plug watcher thread
//!
//! Dedicated thread pumping libusb events. A hot-plug registration only flags
//! that something changed; the thread re-enumerates once events have been
//! quiet for the debounce period and calls the handler with the snapshots
//! before and after. Platforms without hot-plug support fall back to periodic
//! re-enumeration.

use super::UsbShared;
use crate::backend::{BackendResult, HotplugHandler, Subscription};
use descriptors::DevicesData;
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on a single libusb event wait, so stop requests are seen quickly
const EVENT_TIMEOUT: Duration = Duration::from_millis(50);

/// Hot-plug callback marking the snapshot as stale
struct HotplugFlag {
    dirty: Arc<AtomicBool>,
}

impl<T: UsbContext> Hotplug<T> for HotplugFlag {
    fn device_arrived(&mut self, device: Device<T>) {
        debug!(
            "Hot-plug callback: device arrived (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        self.dirty.store(true, Ordering::Release);
    }

    fn device_left(&mut self, device: Device<T>) {
        debug!(
            "Hot-plug callback: device left (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        self.dirty.store(true, Ordering::Release);
    }
}

struct WatcherThread {
    shared: Arc<UsbShared>,
    handler: HotplugHandler,
    stop: Arc<AtomicBool>,
    dirty: Arc<AtomicBool>,
    last: DevicesData,
}

impl WatcherThread {
    fn run(mut self) {
        info!("USB hot-plug watcher started");

        // Registered on this thread so it is also dropped here
        let registration = self.register();
        let mut pending_since: Option<Instant> = None;
        let mut last_poll = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            if registration.is_some() {
                match self.shared.context.handle_events(Some(EVENT_TIMEOUT)) {
                    Ok(()) => {}
                    Err(rusb::Error::Interrupted) => {
                        debug!("USB event handling interrupted");
                    }
                    Err(e) => {
                        warn!("Error handling USB events: {}", e);
                        thread::sleep(EVENT_TIMEOUT);
                    }
                }
            } else {
                thread::sleep(EVENT_TIMEOUT);
            }

            // Every new event restarts the debounce window
            if self.dirty.swap(false, Ordering::AcqRel) {
                pending_since = Some(Instant::now());
            }

            let due = match pending_since {
                Some(since) => since.elapsed() >= self.shared.options.debounce,
                None => {
                    registration.is_none()
                        && last_poll.elapsed() >= self.shared.options.poll_interval
                }
            };
            if !due {
                continue;
            }

            pending_since = None;
            last_poll = Instant::now();
            self.refresh();
        }

        drop(registration);
        info!("USB hot-plug watcher stopped");
    }

    fn register(&self) -> Option<Registration<Context>> {
        if !rusb::has_hotplug() {
            info!(
                "Hot-plug not supported, polling every {:?}",
                self.shared.options.poll_interval
            );
            return None;
        }

        let callback: Box<dyn Hotplug<Context>> = Box::new(HotplugFlag {
            dirty: self.dirty.clone(),
        });
        match HotplugBuilder::new()
            .enumerate(false)
            .register(self.shared.context.clone(), callback)
        {
            Ok(registration) => {
                debug!("Hot-plug callbacks registered");
                Some(registration)
            }
            Err(e) => {
                warn!("Hot-plug registration failed, falling back to polling: {}", e);
                None
            }
        }
    }

    fn refresh(&mut self) {
        let current = match self.shared.enumerate() {
            Ok(current) => current,
            Err(e) => {
                warn!("Re-enumeration after hot-plug event failed: {}", e);
                return;
            }
        };

        if current == self.last {
            debug!("Hot-plug event without snapshot change");
            return;
        }

        let old = std::mem::replace(&mut self.last, current.clone());
        let handler = self.handler.clone();
        // A panicking subscriber must not take the watcher down with it
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(old, current)
        }));
        if let Err(e) = result {
            error!("Panic in hot-plug handler: {:?}", e);
        }
    }
}

/// Spawn the watcher thread and return the subscription stopping it
pub(super) fn spawn(shared: Arc<UsbShared>, handler: HotplugHandler) -> BackendResult<Subscription> {
    // Baseline taken before returning so the first change diffs against the
    // state the subscriber saw
    let last = shared.enumerate()?;

    let stop = Arc::new(AtomicBool::new(false));
    let watcher = WatcherThread {
        shared,
        handler,
        stop: stop.clone(),
        dirty: Arc::new(AtomicBool::new(false)),
        last,
    };

    let handle = thread::Builder::new()
        .name("usb-hotplug".to_string())
        .spawn(move || watcher.run())?;

    Ok(Subscription::new(move || stop_watcher(&stop, handle)))
}

fn stop_watcher(stop: &AtomicBool, handle: JoinHandle<()>) {
    stop.store(true, Ordering::Release);

    // Released from inside a handler: the loop exits on its own
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if let Err(e) = handle.join() {
        error!("USB hot-plug watcher panicked: {:?}", e);
    }
}
