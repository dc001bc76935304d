//! Device discovery and hot-plug reconciliation
//!
//! Turns the flat, changing list of bus-level endpoints reported by a
//! [`Backend`] into logical [`DeviceInfo`] handles, one per composite device,
//! and reports which devices appeared or disappeared when the backend
//! signals a hot-plug change.
//!
//! ```no_run
//! use devctx::{BackendMode, Context, DeviceList};
//!
//! let ctx = Context::new(BackendMode::Live, None, None)?;
//! ctx.set_devices_changed_callback(|removed, added| {
//!     println!("{} removed, {} added", removed.len(), added.len());
//! });
//!
//! for entry in &DeviceList::query(&ctx)? {
//!     println!("{}", entry.info);
//! }
//! # Ok::<(), devctx::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod device_info;
pub mod device_list;
pub mod error;
pub mod events;
pub mod grouping;
pub mod lazy;
pub mod profile;
pub mod recovery;
pub mod time;

pub use backend::{Backend, BackendMode, Device, HotplugHandler, Subscription};
pub use config::DevctxConfig;
pub use context::{Context, DevicesChangedCallback, diff_devices};
pub use device_info::{DeviceInfo, DeviceKind};
pub use device_list::{DeviceList, DeviceListEntry};
pub use error::{BackendError, Error, Result};
pub use events::{DeviceChange, subscribe_changes};
pub use profile::DeviceProfile;
pub use recovery::{RECOVERY_MESSAGE, RECOVERY_PRODUCT_IDS, is_recovery_id, pick_recovery_devices};
pub use time::TimeService;
