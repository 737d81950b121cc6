//! Update, copy and fill
//!
//! Composite helpers built from the primitives, bulk transfer and range
//! clear. [`FlashUtils`] exposes everything as methods on any
//! [`FlashDevice`].

use c51flash_hal::{Addr, FlashError};

use crate::bulk;
use crate::clear;
use crate::layout::{byte_count, check_range};
use crate::traits::FlashDevice;

/// Rewrite `[dest, dest + src.len())` with `src`
///
/// Works regardless of the current contents: the range is cleared first.
pub fn update<D>(dev: &mut D, dest: Addr, src: &[u8]) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    clear::clear(dev, dest, byte_count(src.len())?)?;
    bulk::write(dev, dest, src)
}

/// Copy `n` bytes from `src` to `dest`
///
/// The destination must be erased; no clear is performed. Source and
/// destination may be in different regions but must not overlap.
pub fn copy<D>(dev: &mut D, dest: Addr, src: Addr, n: u32) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    let config = dev.config();
    check_range(config, dest, n)?;
    check_range(config, src, n)?;
    if dest.region == src.region
        && n > 0
        && dest.offset < src.offset + n
        && src.offset < dest.offset + n
    {
        return Err(FlashError::Overlap);
    }

    for i in 0..n {
        let byte = dev.read(src + i)?;
        dev.write(dest + i, byte)?;
    }
    Ok(())
}

/// Write `n` copies of `value` starting at `dest`
///
/// The destination must be erased.
pub fn fill<D>(dev: &mut D, dest: Addr, n: u32, value: u8) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    check_range(dev.config(), dest, n)?;
    for i in 0..n {
        dev.write(dest + i, value)?;
    }
    Ok(())
}

/// Flash utility methods for every [`FlashDevice`]
pub trait FlashUtils: FlashDevice {
    /// See [`bulk::write`]
    fn write_bytes(&mut self, dest: Addr, src: &[u8]) -> Result<(), FlashError> {
        bulk::write(self, dest, src)
    }

    /// See [`bulk::read`]
    fn read_bytes<'a>(
        &mut self,
        src: Addr,
        dest: &'a mut [u8],
        n: usize,
    ) -> Result<&'a mut [u8], FlashError> {
        bulk::read(self, src, dest, n)
    }

    /// See [`clear::clear`]
    fn clear(&mut self, dest: Addr, n: u32) -> Result<(), FlashError> {
        clear::clear(self, dest, n)
    }

    /// See [`update`]
    fn update(&mut self, dest: Addr, src: &[u8]) -> Result<(), FlashError> {
        update(self, dest, src)
    }

    /// See [`copy`]
    fn copy(&mut self, dest: Addr, src: Addr, n: u32) -> Result<(), FlashError> {
        copy(self, dest, src, n)
    }

    /// See [`fill`]
    fn fill(&mut self, dest: Addr, n: u32, value: u8) -> Result<(), FlashError> {
        fill(self, dest, n, value)
    }
}

impl<D: FlashDevice + ?Sized> FlashUtils for D {}
