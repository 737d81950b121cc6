//! Page layout math
//!
//! Page sizes are powers of two, so a page base is the address with the
//! low bits masked off.

use c51flash_hal::{Addr, DeviceConfig, FlashError};

/// First address of the page containing `offset`
pub fn page_base(offset: u32, page_size: u32) -> u32 {
    offset & !(page_size - 1)
}

/// One past the last address of the page containing `offset`
pub fn page_end(offset: u32, page_size: u32) -> u32 {
    page_base(offset, page_size) + page_size
}

/// Check if `offset` is the first address of a page
pub fn is_page_aligned(offset: u32, page_size: u32) -> bool {
    offset & (page_size - 1) == 0
}

/// Check that `[start, start + len)` lies inside the region of `start`
pub fn check_range(config: &DeviceConfig, start: Addr, len: u32) -> Result<(), FlashError> {
    let end = start
        .offset
        .checked_add(len)
        .ok_or(FlashError::OutOfBounds)?;
    if end > config.size(start.region) {
        return Err(FlashError::OutOfBounds);
    }
    Ok(())
}

/// Convert a buffer length to a flash byte count
pub(crate) fn byte_count(len: usize) -> Result<u32, FlashError> {
    u32::try_from(len).map_err(|_| FlashError::OutOfBounds)
}

/// The part of a range that falls into one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// Base address of the page
    pub page: u32,
    /// First address of the segment
    pub start: u32,
    /// One past the last address of the segment
    pub end: u32,
}

impl Segment {
    /// Number of bytes in the segment
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the segment is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Bytes of the page in front of the segment
    pub fn head_len(&self) -> u32 {
        self.start - self.page
    }

    /// Offset of the segment end inside the page
    pub fn tail_offset(&self) -> u32 {
        self.end - self.page
    }

    /// Check if the segment covers its whole page
    pub fn is_full_page(&self, page_size: u32) -> bool {
        self.len() == page_size
    }
}

/// Iterator over the per-page segments of a range
#[derive(Debug, Clone)]
pub struct Segments {
    next: u32,
    end: u32,
    page_size: u32,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.next >= self.end {
            return None;
        }
        let page = page_base(self.next, self.page_size);
        let segment = Segment {
            page,
            start: self.next,
            end: self.end.min(page.saturating_add(self.page_size)),
        };
        self.next = segment.end;
        Some(segment)
    }
}

/// Split `[offset, offset + len)` at page boundaries
///
/// The caller guarantees the range does not overflow `u32`.
pub fn segments(offset: u32, len: u32, page_size: u32) -> Segments {
    Segments {
        next: offset,
        end: offset + len,
        page_size,
    }
}
