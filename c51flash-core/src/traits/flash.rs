//! Flash device trait

use c51flash_hal::{Addr, DeviceConfig, FlashError};

/// Byte-level access to a flash device
///
/// [`Flash`](crate::primitives::Flash) implements this over a register-level
/// controller. Every utility in this crate is generic over it, so tests can
/// substitute any backing store.
pub trait FlashDevice {
    /// Geometry of the device
    fn config(&self) -> &DeviceConfig;

    /// Read one byte
    fn read(&mut self, addr: Addr) -> Result<u8, FlashError>;

    /// Program one byte
    ///
    /// The target must be erased (or the write may only clear bits).
    fn write(&mut self, addr: Addr, value: u8) -> Result<(), FlashError>;

    /// Erase the page containing `addr` to `0xFF`
    fn erase(&mut self, addr: Addr) -> Result<(), FlashError>;
}

impl<D: FlashDevice + ?Sized> FlashDevice for &mut D {
    fn config(&self) -> &DeviceConfig {
        (**self).config()
    }

    fn read(&mut self, addr: Addr) -> Result<u8, FlashError> {
        (**self).read(addr)
    }

    fn write(&mut self, addr: Addr, value: u8) -> Result<(), FlashError> {
        (**self).write(addr, value)
    }

    fn erase(&mut self, addr: Addr) -> Result<(), FlashError> {
        (**self).erase(addr)
    }
}
