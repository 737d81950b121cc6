//! c51flash Hardware Abstraction Layer
//!
//! This crate defines the register-level flash controller interface of
//! 8051-family parts (C8051Fxxx, EFM8) and the per-device geometry the
//! flash utilities are parameterized on. Controller implementations
//! (real silicon bindings, the simulator in `c51flash-hal-sim`) implement
//! [`FlashController`]; the algorithms in `c51flash-core` only talk to
//! that trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (c51flash-selftest, etc.)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  c51flash-core (primitives, clear, ...) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  c51flash-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ c51flash-hal- │
//!             │      sim      │
//!             └───────────────┘
//! ```
//!
//! # Contents
//!
//! - [`flash::FlashController`] - SFR-level flash access
//! - [`device::DeviceConfig`], [`device::Device`] - device geometry
//! - [`flash::FlashError`] - error kinds surfaced by controllers and utilities

#![no_std]
#![deny(unsafe_code)]

pub mod device;
pub mod flash;

// Re-export key types at crate root for convenience
pub use device::{ConfigError, Device, DeviceConfig, ScratchpadConfig, MAX_LABEL_LEN};
pub use flash::{
    Addr, FlashController, FlashError, Region, RejectReason, VddThreshold, ERASED_BYTE,
    FLASH_KEY_1, FLASH_KEY_2, PSCTL_PSEE, PSCTL_PSWE, PSCTL_SFLE,
};
