//! Simulated flash controller
//!
//! Host-side implementation of the `FlashController` trait from
//! `c51flash-hal`. It keeps the flash arrays in memory and models the
//! parts of the controller that decide whether a store reaches flash:
//!
//! - FLKEY key sequence (with lock-until-reset on a wrong key)
//! - PSCTL write/erase/scratchpad latches
//! - VDD monitor threshold and reset source
//! - PSBANK code banking on parts larger than 64 KB
//!
//! Where silicon silently drops a store, the simulator returns
//! `FlashError::WriteRejected` so tests can see the misuse.

#![deny(unsafe_code)]

pub mod controller;

pub use controller::{
    KeyState, SimController, SimStats, NOMINAL_SUPPLY_MV, VDD_HIGH_THRESHOLD_MV,
    VDD_LOW_THRESHOLD_MV,
};
