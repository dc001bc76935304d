//! Test utilities for devctx
//!
//! Provides descriptor builders and helper functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_camera, TEST_CAMERA_PID, TEST_VENDOR_ID};
//!
//! let camera = create_mock_camera("1-4", TEST_CAMERA_PID, &[0, 3], true);
//! assert_eq!(camera.video.len(), 2);
//! assert_eq!(camera.video[0].vendor_id, TEST_VENDOR_ID);
//! ```

use descriptors::{DevicesData, EndpointDescriptor, WILDCARD_UNIQUE_ID};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Vendor ID used by mock descriptors
pub const TEST_VENDOR_ID: u16 = 0x8086;

/// Product ID of a mock depth camera
pub const TEST_CAMERA_PID: u16 = 0x0ad3;

/// Interface index mock auxiliary (HID) descriptors are placed on
pub const TEST_HID_INTERFACE: u8 = 5;

/// Create a mock video descriptor for testing
///
/// # Example
/// ```
/// use common::test_utils::create_mock_video;
///
/// let desc = create_mock_video("1-2", 0);
/// assert_eq!(desc.unique_id, "1-2");
/// assert_eq!(desc.interface_index, 0);
/// ```
pub fn create_mock_video(unique_id: &str, interface_index: u8) -> EndpointDescriptor {
    EndpointDescriptor::video(TEST_VENDOR_ID, TEST_CAMERA_PID, unique_id, interface_index)
}

/// Create a mock video descriptor with a specific product id
pub fn create_mock_video_with_pid(
    unique_id: &str,
    product_id: u16,
    interface_index: u8,
) -> EndpointDescriptor {
    EndpointDescriptor::video(TEST_VENDOR_ID, product_id, unique_id, interface_index)
}

/// Create a mock auxiliary (HID) descriptor bound to one physical unit
pub fn create_mock_hid(unique_id: &str) -> EndpointDescriptor {
    EndpointDescriptor::hid(TEST_VENDOR_ID, TEST_CAMERA_PID, unique_id, TEST_HID_INTERFACE)
}

/// Create a mock auxiliary (HID) descriptor broadcast to every group
pub fn create_mock_wildcard_hid() -> EndpointDescriptor {
    EndpointDescriptor::hid(
        TEST_VENDOR_ID,
        TEST_CAMERA_PID,
        WILDCARD_UNIQUE_ID,
        TEST_HID_INTERFACE,
    )
}

/// Create a mock bare USB identity
pub fn create_mock_usb(unique_id: &str, product_id: u16) -> EndpointDescriptor {
    EndpointDescriptor::usb(TEST_VENDOR_ID, product_id, unique_id)
}

/// Create a snapshot describing one composite camera
///
/// # Arguments
/// * `unique_id` - Physical path of the camera
/// * `product_id` - USB Product ID of every endpoint
/// * `interfaces` - Video interface indices to expose
/// * `with_hid` - Whether to add an auxiliary descriptor bound to the camera
pub fn create_mock_camera(
    unique_id: &str,
    product_id: u16,
    interfaces: &[u8],
    with_hid: bool,
) -> DevicesData {
    let video = interfaces
        .iter()
        .map(|mi| create_mock_video_with_pid(unique_id, product_id, *mi))
        .collect();

    let hid = if with_hid {
        vec![EndpointDescriptor::hid(
            TEST_VENDOR_ID,
            product_id,
            unique_id,
            TEST_HID_INTERFACE,
        )]
    } else {
        Vec::new()
    };

    DevicesData::new(
        video,
        hid,
        vec![EndpointDescriptor::usb(TEST_VENDOR_ID, product_id, unique_id)],
    )
}

/// Merge several snapshots into one, preserving list order
///
/// # Example
/// ```
/// use common::test_utils::{create_mock_camera, merge_snapshots, TEST_CAMERA_PID};
///
/// let merged = merge_snapshots([
///     create_mock_camera("1-1", TEST_CAMERA_PID, &[0], false),
///     create_mock_camera("1-2", TEST_CAMERA_PID, &[0], false),
/// ]);
/// assert_eq!(merged.video.len(), 2);
/// assert_eq!(merged.usb.len(), 2);
/// ```
pub fn merge_snapshots(snapshots: impl IntoIterator<Item = DevicesData>) -> DevicesData {
    snapshots
        .into_iter()
        .fold(DevicesData::default(), |mut acc, data| {
            acc.video.extend(data.video);
            acc.hid.extend(data.hid);
            acc.usb.extend(data.usb);
            acc
        })
}

/// Create a snapshot with `count` single-interface cameras on distinct paths
pub fn create_mock_snapshot(count: u32) -> DevicesData {
    merge_snapshots(
        (1..=count).map(|i| create_mock_camera(&format!("1-{}", i), TEST_CAMERA_PID, &[0], false)),
    )
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
