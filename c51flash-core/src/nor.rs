//! embedded-storage adapter
//!
//! Exposes the main flash array of a [`FlashDevice`] through the
//! `embedded_storage::nor_flash` traits so generic storage crates can run
//! on top of the primitives.

use c51flash_hal::{Addr, FlashError};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::bulk;
use crate::layout::is_page_aligned;
use crate::traits::FlashDevice;

/// Error type of [`NorFlashAdapter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NorError(pub FlashError);

impl From<FlashError> for NorError {
    fn from(e: FlashError) -> Self {
        NorError(e)
    }
}

impl NorFlashError for NorError {
    fn kind(&self) -> NorFlashErrorKind {
        match self.0 {
            FlashError::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            FlashError::Unaligned => NorFlashErrorKind::NotAligned,
            _ => NorFlashErrorKind::Other,
        }
    }
}

/// NorFlash view of the main flash array
///
/// `ERASE_SIZE` must equal the device page size.
#[derive(Debug)]
pub struct NorFlashAdapter<D, const ERASE_SIZE: usize> {
    device: D,
}

impl<D: FlashDevice, const ERASE_SIZE: usize> NorFlashAdapter<D, ERASE_SIZE> {
    /// Wrap a device whose page size is `ERASE_SIZE`
    pub fn new(device: D) -> Result<Self, FlashError> {
        if device.config().page_size as usize != ERASE_SIZE {
            return Err(FlashError::Unaligned);
        }
        Ok(Self { device })
    }

    /// Release the device
    pub fn into_inner(self) -> D {
        self.device
    }
}

impl<D: FlashDevice, const ERASE_SIZE: usize> ErrorType for NorFlashAdapter<D, ERASE_SIZE> {
    type Error = NorError;
}

impl<D: FlashDevice, const ERASE_SIZE: usize> ReadNorFlash for NorFlashAdapter<D, ERASE_SIZE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let n = bytes.len();
        bulk::read(&mut self.device, Addr::main(offset), bytes, n)?;
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.device.config().flash_size as usize
    }
}

impl<D: FlashDevice, const ERASE_SIZE: usize> NorFlash for NorFlashAdapter<D, ERASE_SIZE> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let page_size = ERASE_SIZE as u32;
        if from > to || to as usize > self.capacity() {
            return Err(FlashError::OutOfBounds.into());
        }
        if !is_page_aligned(from, page_size) || !is_page_aligned(to, page_size) {
            return Err(FlashError::Unaligned.into());
        }
        for page in (from..to).step_by(ERASE_SIZE) {
            self.device.erase(Addr::main(page))?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        bulk::write(&mut self.device, Addr::main(offset), bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Flash;
    use c51flash_hal::Device;
    use c51flash_hal_sim::SimController;

    type Adapter = NorFlashAdapter<Flash<SimController>, 512>;

    fn adapter() -> Adapter {
        Adapter::new(Flash::new(SimController::for_device(Device::Efm8Sb1))).unwrap()
    }

    #[test]
    fn test_page_size_must_match() {
        let flash = Flash::new(SimController::for_device(Device::C8051F93x));
        assert!(NorFlashAdapter::<_, 512>::new(flash).is_err());
    }

    #[test]
    fn test_write_read_erase() {
        let mut nor = adapter();
        assert_eq!(nor.capacity(), 0x2000);

        NorFlash::write(&mut nor, 0x400, &[1, 2, 3]).unwrap();
        let mut buffer = [0u8; 3];
        ReadNorFlash::read(&mut nor, 0x400, &mut buffer).unwrap();
        assert_eq!(buffer, [1, 2, 3]);

        NorFlash::erase(&mut nor, 0x400, 0x600).unwrap();
        ReadNorFlash::read(&mut nor, 0x400, &mut buffer).unwrap();
        assert_eq!(buffer, [0xFF; 3]);
    }

    #[test]
    fn test_erase_unaligned() {
        let mut nor = adapter();
        let err = NorFlash::erase(&mut nor, 0x401, 0x600).unwrap_err();
        assert_eq!(err.kind(), NorFlashErrorKind::NotAligned);
        let err = NorFlash::erase(&mut nor, 0x400, 0x2200).unwrap_err();
        assert_eq!(err.kind(), NorFlashErrorKind::OutOfBounds);
    }
}
