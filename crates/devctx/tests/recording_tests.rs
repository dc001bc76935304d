//! Integration tests for record and playback sessions
//!
//! Records a scripted session through the recording backend, then replays it
//! through a playback context and checks the same logical devices and
//! changes come back.

use common::test_utils::{
    DEFAULT_TEST_TIMEOUT, create_mock_snapshot, create_mock_usb, merge_snapshots, with_timeout,
};
use descriptors::{DevicesData, Record, RecordedEvent, write_framed};
use devctx::backend::{Backend, MemoryBackend, PlaybackBackend, RecordingBackend};
use devctx::{BackendMode, Context, DeviceProfile, Error, subscribe_changes};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Record `steps` as successive snapshots of a memory backend
fn record_session(path: &Path, section: &str, steps: &[DevicesData]) {
    let memory = Arc::new(MemoryBackend::new(steps[0].clone()));
    let recorder = Arc::new(RecordingBackend::create(memory.clone(), path, section).unwrap());
    let ctx = Context::with_backend(recorder, DeviceProfile::defaults()).unwrap();

    ctx.query_devices().unwrap();
    for step in &steps[1..] {
        memory.set_devices(step.clone());
    }
}

#[test]
fn test_playback_reproduces_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");
    let live = merge_snapshots([
        create_mock_snapshot(2),
        DevicesData::from_usb(create_mock_usb("3-1", 0x0AB3)),
    ]);
    record_session(&path, "bench", &[live.clone()]);

    let ctx = Context::new(BackendMode::Playback, Some(path.as_path()), Some("bench")).unwrap();
    let replayed = ctx.query_devices().unwrap();

    let memory: Arc<dyn Backend> = Arc::new(MemoryBackend::new(live));
    let expected = Context::with_backend(memory, DeviceProfile::defaults())
        .unwrap()
        .query_devices()
        .unwrap();

    assert_eq!(replayed, expected);
    assert!(replayed.last().unwrap().is_recovery());

    // Replayed devices open without hardware
    let device = replayed[0].get_device().unwrap();
    assert_eq!(device.devices_data(), replayed[0].get_device_data());
}

#[tokio::test]
async fn test_playback_replays_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");

    // Spaced out so the callback is registered before the change replays
    let mut file = File::create(&path).unwrap();
    for record in [
        Record::new("hotplug", 0.0, RecordedEvent::Snapshot(create_mock_snapshot(1))),
        Record::new(
            "hotplug",
            300.0,
            RecordedEvent::Changed {
                old: create_mock_snapshot(1),
                new: create_mock_snapshot(2),
            },
        ),
    ] {
        write_framed(&mut file, &record).unwrap();
    }
    drop(file);

    let backend = Arc::new(PlaybackBackend::open(&path, "hotplug").unwrap());
    let ctx = Context::with_backend(backend, DeviceProfile::defaults()).unwrap();
    let changes = subscribe_changes(&ctx);
    assert_eq!(ctx.query_devices().unwrap().len(), 1);

    let change = with_timeout(DEFAULT_TEST_TIMEOUT, changes.recv())
        .await
        .expect("Timed out waiting for replayed change")
        .expect("Channel closed");

    assert!(change.removed.is_empty());
    assert_eq!(change.added.len(), 1);
    assert_eq!(change.added[0].get_device_data().unique_id(), Some("1-2"));
    assert_eq!(ctx.get_time(), 300.0);
}

#[test]
fn test_recorded_changes_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");
    record_session(
        &path,
        "hotplug",
        &[create_mock_snapshot(1), create_mock_snapshot(2)],
    );

    let records = descriptors::read_all(&mut File::open(&path).unwrap()).unwrap();
    let kinds: Vec<_> = records
        .iter()
        .map(|r| matches!(r.event, RecordedEvent::Changed { .. }))
        .collect();
    assert_eq!(kinds, vec![false, true]);
}

#[test]
fn test_sections_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");
    record_session(&path, "one", &[create_mock_snapshot(1)]);
    record_session(&path, "three", &[create_mock_snapshot(3)]);

    let one = Context::new(BackendMode::Playback, Some(path.as_path()), Some("one")).unwrap();
    let three = Context::new(BackendMode::Playback, Some(path.as_path()), Some("three")).unwrap();
    assert_eq!(one.query_devices().unwrap().len(), 1);
    assert_eq!(three.query_devices().unwrap().len(), 3);

    assert!(Context::new(BackendMode::Playback, Some(path.as_path()), Some("missing")).is_err());
}

#[test]
fn test_default_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");

    let mut file = File::create(&path).unwrap();
    let record = Record::new(
        descriptors::DEFAULT_SECTION,
        0.0,
        RecordedEvent::Snapshot(create_mock_snapshot(2)),
    );
    write_framed(&mut file, &record).unwrap();
    drop(file);

    let ctx = Context::new(BackendMode::Playback, Some(path.as_path()), None).unwrap();
    assert_eq!(ctx.query_devices().unwrap().len(), 2);
    assert_eq!(ctx.get_time(), 0.0);
}

#[test]
fn test_corrupt_recording_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.rec");
    record_session(&path, "bench", &[create_mock_snapshot(1)]);

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        Context::new(BackendMode::Playback, Some(path.as_path()), Some("bench")),
        Err(Error::Backend(devctx::BackendError::Recording(_)))
    ));
}

#[test]
fn test_missing_recording_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.rec");
    assert!(matches!(
        Context::new(BackendMode::Playback, Some(path.as_path()), None),
        Err(Error::Backend(devctx::BackendError::Io(_)))
    ));
}
