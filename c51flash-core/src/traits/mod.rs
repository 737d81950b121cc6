//! Hardware abstraction traits
//!
//! These traits define the interface between the flash utilities
//! and the device they run on.

pub mod flash;

pub use flash::FlashDevice;
