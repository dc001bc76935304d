//! Integration tests for the recording format
//!
//! Tests frame streams as they appear in a recording file, including:
//! - Multiple sections interleaved in one stream
//! - Appending to an existing stream
//! - Corruption detection
//!
//! Run with: `cargo test -p descriptors --test recording_tests`

use descriptors::{
    CURRENT_VERSION, DevicesData, EndpointDescriptor, FormatError, FormatVersion, Record,
    RecordedEvent, encode_framed, read_all, read_framed, write_framed,
};
use std::io::{Cursor, Seek, SeekFrom, Write};

fn camera(unique_id: &str) -> DevicesData {
    DevicesData::new(
        vec![
            EndpointDescriptor::video(0x8086, 0x0ad3, unique_id, 0),
            EndpointDescriptor::video(0x8086, 0x0ad3, unique_id, 3),
        ],
        vec![EndpointDescriptor::hid(0x8086, 0x0ad3, unique_id, 5)],
        vec![EndpointDescriptor::usb(0x8086, 0x0ad3, unique_id).with_serial("816312070583")],
    )
}

#[test]
fn test_interleaved_sections() {
    let mut buffer = Vec::new();
    for (i, section) in ["left", "right", "left"].iter().enumerate() {
        let record = Record::new(
            *section,
            i as f64,
            RecordedEvent::Snapshot(camera(&format!("1-{}", i))),
        );
        write_framed(&mut buffer, &record).unwrap();
    }

    let records = read_all(&mut Cursor::new(buffer)).unwrap();
    assert_eq!(records.len(), 3);

    let left: Vec<_> = records.iter().filter(|r| r.section == "left").collect();
    assert_eq!(left.len(), 2);
    assert_eq!(left[0].timestamp_ms, 0.0);
    assert_eq!(left[1].timestamp_ms, 2.0);
}

#[test]
fn test_append_to_existing_stream() {
    let mut file = Cursor::new(Vec::new());
    write_framed(
        &mut file,
        &Record::new("a", 1.0, RecordedEvent::Snapshot(camera("1-1"))),
    )
    .unwrap();

    // A second writer picks up at the end of the stream
    file.seek(SeekFrom::End(0)).unwrap();
    write_framed(
        &mut file,
        &Record::new(
            "b",
            2.0,
            RecordedEvent::Changed {
                old: camera("1-1"),
                new: DevicesData::default(),
            },
        ),
    )
    .unwrap();

    file.seek(SeekFrom::Start(0)).unwrap();
    let records = read_all(&mut file).unwrap();
    assert_eq!(records.len(), 2);
    assert!(matches!(
        records[1].event,
        RecordedEvent::Changed { ref new, .. } if new.is_empty()
    ));
}

#[test]
fn test_stream_with_trailing_garbage() {
    let mut buffer = Vec::new();
    write_framed(
        &mut buffer,
        &Record::new("a", 1.0, RecordedEvent::Snapshot(camera("1-1"))),
    )
    .unwrap();
    buffer.write_all(&[0xff, 0xff]).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert!(read_framed(&mut cursor).unwrap().is_some());
    assert!(matches!(
        read_framed(&mut cursor),
        Err(FormatError::IncompleteFrame { .. })
    ));
}

#[test]
fn test_incompatible_writer_rejected() {
    let mut record = Record::new("a", 1.0, RecordedEvent::Snapshot(DevicesData::default()));
    record.version = FormatVersion {
        major: CURRENT_VERSION.major + 1,
        minor: 0,
        patch: 0,
    };

    let frame = encode_framed(&record).unwrap();
    assert!(matches!(
        read_framed(&mut Cursor::new(frame)),
        Err(FormatError::IncompatibleVersion { .. })
    ));
}

#[test]
fn test_serial_survives_recording() {
    let data = camera("2-3.1");
    let mut buffer = Vec::new();
    write_framed(
        &mut buffer,
        &Record::new("a", 0.0, RecordedEvent::Snapshot(data.clone())),
    )
    .unwrap();

    let record = read_framed(&mut Cursor::new(buffer)).unwrap().unwrap();
    match record.event {
        RecordedEvent::Snapshot(replayed) => {
            assert_eq!(replayed, data);
            assert_eq!(replayed.usb[0].serial.as_deref(), Some("816312070583"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}
