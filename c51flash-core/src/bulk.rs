//! Bulk read/write
//!
//! Byte-by-byte loops over the primitives. Ranges are checked against the
//! region before the first byte is touched.

use c51flash_hal::{Addr, FlashError, ERASED_BYTE};

use crate::layout::{byte_count, check_range};
use crate::traits::FlashDevice;

/// Write `src` to flash starting at `dest`
///
/// The destination bytes must be erased.
pub fn write<D>(dev: &mut D, dest: Addr, src: &[u8]) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    check_range(dev.config(), dest, byte_count(src.len())?)?;
    for (i, &byte) in (0u32..).zip(src) {
        dev.write(dest + i, byte)?;
    }
    Ok(())
}

/// Read `n` bytes starting at `src` into the front of `dest`
///
/// Returns the part of `dest` after the bytes read, so consecutive reads
/// can be chained into one buffer.
pub fn read<'a, D>(
    dev: &mut D,
    src: Addr,
    dest: &'a mut [u8],
    n: usize,
) -> Result<&'a mut [u8], FlashError>
where
    D: FlashDevice + ?Sized,
{
    if n > dest.len() {
        return Err(FlashError::OutOfBounds);
    }
    check_range(dev.config(), src, byte_count(n)?)?;
    let (filled, rest) = dest.split_at_mut(n);
    for (i, byte) in (0u32..).zip(filled.iter_mut()) {
        *byte = dev.read(src + i)?;
    }
    Ok(rest)
}

/// Copy `n` bytes inside flash, skipping erased source bytes
///
/// Only valid when the destination is erased: an erased source byte needs
/// no programming there.
pub(crate) fn copy_programmed<D>(
    dev: &mut D,
    dest: Addr,
    src: Addr,
    n: u32,
) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    for i in 0..n {
        let byte = dev.read(src + i)?;
        if byte != ERASED_BYTE {
            dev.write(dest + i, byte)?;
        }
    }
    Ok(())
}
