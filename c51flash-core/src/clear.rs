//! Range clear
//!
//! Erases an arbitrary byte range to `0xFF` while keeping every other byte
//! of the affected pages. Flash can only be erased a page at a time, so
//! each partially covered page goes through the scratch page:
//!
//! 1. erase the scratch page
//! 2. copy the live bytes in front of the range into the scratch page
//! 3. copy the live bytes behind the range into the scratch page
//! 4. erase the target page
//! 5. copy the scratch page back
//!
//! Pages fully inside the range are erased directly. Ranges may span any
//! number of pages.

use c51flash_hal::{Addr, FlashError, Region};

use crate::bulk::copy_programmed;
use crate::layout::{check_range, page_base, page_end, segments, Segment};
use crate::traits::FlashDevice;

/// Erase `[dest, dest + n)` to `0xFF`
///
/// Bytes outside the range but inside the same pages are preserved.
/// Scratchpad ranges use the main flash scratch page as temporary storage.
///
/// # Errors
/// - [`FlashError::OutOfBounds`] if the range leaves its region
/// - [`FlashError::ScratchOverlap`] if a main flash range touches the
///   scratch page
///
/// Both are detected before any flash is modified.
pub fn clear<D>(dev: &mut D, dest: Addr, n: u32) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    if n == 0 {
        return Ok(());
    }

    let config = dev.config();
    check_range(config, dest, n)?;
    let page_size = config.page_size(dest.region);
    let scratch = config.scratch_addr();

    if dest.region == Region::Main {
        let first = page_base(dest.offset, page_size);
        let last = page_end(dest.offset + (n - 1), page_size);
        if (first..last).contains(&scratch.offset) {
            return Err(FlashError::ScratchOverlap);
        }
    }

    #[cfg(feature = "defmt")]
    defmt::debug!("clear {} bytes at {}", n, dest);

    for segment in segments(dest.offset, n, page_size) {
        clear_segment(dev, dest.region, segment, page_size, scratch)?;
    }
    Ok(())
}

fn clear_segment<D>(
    dev: &mut D,
    region: Region,
    segment: Segment,
    page_size: u32,
    scratch: Addr,
) -> Result<(), FlashError>
where
    D: FlashDevice + ?Sized,
{
    let page = Addr {
        region,
        offset: segment.page,
    };

    if segment.is_full_page(page_size) {
        return dev.erase(page);
    }

    dev.erase(scratch)?;

    let head = segment.head_len();
    copy_programmed(dev, scratch, page, head)?;

    let tail = segment.tail_offset();
    copy_programmed(dev, scratch + tail, page + tail, page_size - tail)?;

    dev.erase(page)?;
    copy_programmed(dev, page, scratch, page_size)
}
