//! Recording backend
//!
//! Wraps another backend and appends everything it observes (query results
//! and hot-plug changes) to a recording file under one section. The file is
//! opened in append mode, so several sessions can share it.

use super::{Backend, BackendResult, Device, HotplugHandler, Subscription};
use crate::time::TimeService;
use descriptors::{DevicesData, Record, RecordedEvent, write_framed};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

struct RecordWriter {
    path: PathBuf,
    section: String,
    clock: Arc<dyn TimeService>,
    file: Mutex<BufWriter<File>>,
}

impl RecordWriter {
    fn append(&self, event: RecordedEvent) -> BackendResult<()> {
        let record = Record::new(self.section.as_str(), self.clock.now(), event);
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        write_framed(&mut *file, &record)?;
        // Flushed per record so a crash leaves at most one partial frame
        file.flush()?;
        Ok(())
    }
}

/// Backend recording another backend's observations
pub struct RecordingBackend {
    inner: Arc<dyn Backend>,
    writer: Arc<RecordWriter>,
}

impl RecordingBackend {
    /// Record `inner` into `path` under `section`
    pub fn create(inner: Arc<dyn Backend>, path: &Path, section: &str) -> BackendResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(
            "Recording section '{}' to {}",
            section,
            path.display()
        );

        let clock = inner.create_time_service();
        Ok(Self {
            inner,
            writer: Arc::new(RecordWriter {
                path: path.to_path_buf(),
                section: section.to_string(),
                clock,
                file: Mutex::new(BufWriter::new(file)),
            }),
        })
    }

    /// Path of the recording file
    pub fn path(&self) -> &Path {
        &self.writer.path
    }

    /// Section being recorded
    pub fn section(&self) -> &str {
        &self.writer.section
    }
}

impl Backend for RecordingBackend {
    fn query_raw_devices(&self) -> BackendResult<DevicesData> {
        let data = self.inner.query_raw_devices()?;
        self.writer.append(RecordedEvent::Snapshot(data.clone()))?;
        debug!("Recorded snapshot with {} descriptor(s)", data.len());
        Ok(data)
    }

    fn open(&self, data: &DevicesData) -> BackendResult<Arc<dyn Device>> {
        self.inner.open(data)
    }

    fn subscribe_hot_plug(&self, handler: HotplugHandler) -> BackendResult<Subscription> {
        let writer = self.writer.clone();
        self.inner.subscribe_hot_plug(Arc::new(move |old, new| {
            if let Err(e) = writer.append(RecordedEvent::Changed {
                old: old.clone(),
                new: new.clone(),
            }) {
                error!("Failed to record hot-plug change: {}", e);
            }
            handler(old, new);
        }))
    }

    fn create_time_service(&self) -> Arc<dyn TimeService> {
        self.writer.clock.clone()
    }
}
