//! Playback backend
//!
//! Replays one section of a recording file. Queries return the recorded
//! snapshots in order, repeating the last one once the recording is
//! exhausted. A hot-plug subscription replays the recorded changes on a
//! worker thread, keeping the recorded spacing between them.

use super::{Backend, BackendResult, DetachedDevice, Device, HotplugHandler, Subscription};
use crate::error::BackendError;
use crate::time::{ReplayClock, TimeService};
use descriptors::{DevicesData, Record, RecordedEvent, read_all};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Longest pause inserted between two replayed changes
const MAX_REPLAY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct RecordedChange {
    timestamp_ms: f64,
    old: DevicesData,
    new: DevicesData,
}

/// Backend replaying a recording section
pub struct PlaybackBackend {
    section: String,
    start_ms: f64,
    snapshots: Vec<(f64, DevicesData)>,
    changes: Arc<Vec<RecordedChange>>,
    cursor: AtomicUsize,
    clock: Arc<ReplayClock>,
}

impl PlaybackBackend {
    /// Load `section` from the recording at `path`
    pub fn open(path: &Path, section: &str) -> BackendResult<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let records = read_all(&mut reader)?;
        let backend = Self::from_records(records, section)?;
        info!(
            "Replaying section '{}' from {} ({} snapshot(s), {} change(s))",
            section,
            path.display(),
            backend.snapshots.len(),
            backend.changes.len()
        );
        Ok(backend)
    }

    /// Build a playback session from already-decoded records
    pub fn from_records(records: Vec<Record>, section: &str) -> BackendResult<Self> {
        let mut snapshots = Vec::new();
        let mut changes = Vec::new();
        let mut start_ms = None;

        for record in records.into_iter().filter(|r| r.section == section) {
            start_ms.get_or_insert(record.timestamp_ms);
            match record.event {
                RecordedEvent::Snapshot(data) => snapshots.push((record.timestamp_ms, data)),
                RecordedEvent::Changed { old, new } => changes.push(RecordedChange {
                    timestamp_ms: record.timestamp_ms,
                    old,
                    new,
                }),
            }
        }

        let start_ms = start_ms.ok_or_else(|| {
            BackendError::Other(format!("No records for section '{}'", section))
        })?;

        Ok(Self {
            section: section.to_string(),
            start_ms,
            snapshots,
            changes: Arc::new(changes),
            cursor: AtomicUsize::new(0),
            clock: Arc::new(ReplayClock::new(start_ms)),
        })
    }

    /// Section being replayed
    pub fn section(&self) -> &str {
        &self.section
    }
}

impl Backend for PlaybackBackend {
    fn query_raw_devices(&self) -> BackendResult<DevicesData> {
        if self.snapshots.is_empty() {
            // Only changes were recorded: the state before the first one
            return Ok(self
                .changes
                .first()
                .map(|c| c.old.clone())
                .unwrap_or_default());
        }

        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        let (timestamp_ms, data) = &self.snapshots[index.min(self.snapshots.len() - 1)];
        self.clock.advance_to(*timestamp_ms);
        Ok(data.clone())
    }

    fn open(&self, data: &DevicesData) -> BackendResult<Arc<dyn Device>> {
        debug!("Opening replayed device {:?}", data.unique_id());
        Ok(Arc::new(DetachedDevice::new(data.clone())))
    }

    fn subscribe_hot_plug(&self, handler: HotplugHandler) -> BackendResult<Subscription> {
        if self.changes.is_empty() {
            return Ok(Subscription::inert());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let changes = self.changes.clone();
        let clock = self.clock.clone();
        let start_ms = self.start_ms;

        let handle = thread::Builder::new()
            .name("playback-hotplug".to_string())
            .spawn(move || replay_changes(&changes, start_ms, &clock, &handler, &stop_rx))?;

        Ok(Subscription::new(move || {
            // Disconnecting the channel wakes the replay thread
            drop(stop_tx);
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                error!("Playback hot-plug thread panicked: {:?}", e);
            }
        }))
    }

    fn create_time_service(&self) -> Arc<dyn TimeService> {
        self.clock.clone()
    }
}

fn replay_changes(
    changes: &[RecordedChange],
    start_ms: f64,
    clock: &ReplayClock,
    handler: &HotplugHandler,
    stop: &mpsc::Receiver<()>,
) {
    let mut previous_ms = start_ms;
    for change in changes {
        let delay = replay_delay(previous_ms, change.timestamp_ms);
        match stop.recv_timeout(delay) {
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            _ => {
                debug!("Playback hot-plug replay stopped");
                return;
            }
        }

        previous_ms = change.timestamp_ms;
        clock.advance_to(change.timestamp_ms);
        handler(change.old.clone(), change.new.clone());
    }
    debug!("Playback hot-plug replay finished");
}

/// Pause between two recorded timestamps, clamped to a sane range
fn replay_delay(previous_ms: f64, next_ms: f64) -> Duration {
    // NaN and infinite gaps from a crafted recording land in range too
    let gap = (next_ms - previous_ms)
        .max(0.0)
        .min(MAX_REPLAY_DELAY.as_secs_f64() * 1000.0);
    Duration::from_secs_f64(gap / 1000.0)
}
