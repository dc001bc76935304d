//! Common utilities for devctx
//!
//! This crate provides the ambient pieces shared by the discovery core and
//! its command-line tool: error handling, logging setup, and test helpers
//! for building descriptor snapshots.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::{LogFormat, setup_logging};
