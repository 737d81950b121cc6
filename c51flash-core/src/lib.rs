//! Board-agnostic flash utilities for 8051-family microcontrollers
//!
//! This crate contains the flash logic that does not depend on a
//! specific controller implementation:
//!
//! - Flash device trait ([`traits::FlashDevice`])
//! - Write/erase/read primitives over the register-level controller
//! - Page layout math
//! - Bulk read/write
//! - Range clear through a scratch page
//! - Update, copy and fill helpers
//!
//! Dependency order, leaves first:
//!
//! ```text
//! primitives ─► bulk ─► clear ─► util (update / copy / fill)
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod bulk;
pub mod clear;
pub mod layout;
#[cfg(feature = "embedded-storage")]
pub mod nor;
pub mod primitives;
pub mod traits;
pub mod util;

pub use c51flash_hal::{Addr, DeviceConfig, FlashError, Region, RejectReason};
pub use primitives::Flash;
pub use traits::FlashDevice;
pub use util::FlashUtils;
