//! Device geometry
//!
//! Flash size, page size and scratch page location differ between parts.
//! They travel in a [`DeviceConfig`] so the same utilities work on every
//! variant.

use heapless::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::flash::{Addr, Region};

/// Maximum device label length
pub const MAX_LABEL_LEN: usize = 16;

/// Size of the 16-bit code space window
pub const CODE_WINDOW_SIZE: u32 = 0x1_0000;

/// Errors found while validating a [`DeviceConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Page size is zero or not a power of two
    PageSizeNotPowerOfTwo,
    /// Region size is zero or not a whole number of pages
    SizeNotPageMultiple,
    /// Scratch page does not start on a page boundary
    ScratchPageUnaligned,
    /// Scratch page lies outside the main flash array
    ScratchPageOutOfRange,
    /// Scratchpad pages are larger than main flash pages
    ScratchpadPageTooLarge,
    /// Scratchpad exceeds the 16-bit code space window
    ScratchpadTooLarge,
    /// Main flash exceeds the banked code space (128 KB)
    FlashTooLarge,
}

/// Scratchpad block geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScratchpadConfig {
    /// Total scratchpad size in bytes
    pub size: u32,
    /// Scratchpad erase page size in bytes
    pub page_size: u32,
}

/// Flash geometry of one target device
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceConfig {
    /// Display label
    #[cfg_attr(feature = "serde", serde(default))]
    pub label: String<MAX_LABEL_LEN>,
    /// Main flash size in bytes
    pub flash_size: u32,
    /// Main flash erase page size in bytes
    pub page_size: u32,
    /// Base address of the page reserved for read-modify-write clears
    pub scratch_page: u32,
    /// Scratchpad block, if the part has one
    #[cfg_attr(feature = "serde", serde(default))]
    pub scratchpad: Option<ScratchpadConfig>,
}

impl DeviceConfig {
    /// Create a configuration without a scratchpad
    ///
    /// Labels longer than [`MAX_LABEL_LEN`] are truncated.
    pub fn new(label: &str, flash_size: u32, page_size: u32, scratch_page: u32) -> Self {
        let mut text = String::new();
        for c in label.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Self {
            label: text,
            flash_size,
            page_size,
            scratch_page,
            scratchpad: None,
        }
    }

    /// Add a scratchpad block
    pub fn with_scratchpad(mut self, size: u32, page_size: u32) -> Self {
        self.scratchpad = Some(ScratchpadConfig { size, page_size });
        self
    }

    /// Size of a region in bytes (zero for a missing scratchpad)
    pub fn size(&self, region: Region) -> u32 {
        match region {
            Region::Main => self.flash_size,
            Region::Scratchpad => self.scratchpad.map_or(0, |s| s.size),
        }
    }

    /// Erase page size of a region in bytes
    ///
    /// A missing scratchpad reports the main page size; its size of zero
    /// already rejects every access.
    pub fn page_size(&self, region: Region) -> u32 {
        match region {
            Region::Main => self.page_size,
            Region::Scratchpad => self.scratchpad.map_or(self.page_size, |s| s.page_size),
        }
    }

    /// Check if the device has a scratchpad block
    pub fn has_scratchpad(&self) -> bool {
        self.scratchpad.is_some()
    }

    /// Check if main flash extends past the 64 KB code window
    pub fn is_banked(&self) -> bool {
        self.flash_size > CODE_WINDOW_SIZE
    }

    /// Check if a single byte address is inside its region
    pub fn contains(&self, addr: Addr) -> bool {
        addr.offset < self.size(addr.region)
    }

    /// Scratch page as an address
    pub fn scratch_addr(&self) -> Addr {
        Addr::main(self.scratch_page)
    }

    /// Validate the geometry
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_geometry(self.flash_size, self.page_size)?;
        if self.flash_size > 2 * CODE_WINDOW_SIZE {
            return Err(ConfigError::FlashTooLarge);
        }
        if self.scratch_page & (self.page_size - 1) != 0 {
            return Err(ConfigError::ScratchPageUnaligned);
        }
        if self.scratch_page >= self.flash_size {
            return Err(ConfigError::ScratchPageOutOfRange);
        }
        if let Some(pad) = self.scratchpad {
            check_geometry(pad.size, pad.page_size)?;
            if pad.size > CODE_WINDOW_SIZE {
                return Err(ConfigError::ScratchpadTooLarge);
            }
            if pad.page_size > self.page_size {
                return Err(ConfigError::ScratchpadPageTooLarge);
            }
        }
        Ok(())
    }
}

fn check_geometry(size: u32, page_size: u32) -> Result<(), ConfigError> {
    if !page_size.is_power_of_two() {
        return Err(ConfigError::PageSizeNotPowerOfTwo);
    }
    if size == 0 || size % page_size != 0 {
        return Err(ConfigError::SizeNotPageMultiple);
    }
    Ok(())
}

/// Built-in device profiles
///
/// The scratch page of each profile is the last page below the lock byte
/// page, which application code leaves free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    /// C8051F38x: 64 KB, 512-byte pages
    C8051F38x,
    /// C8051F93x: 64 KB, 1 KB pages, 1 KB scratchpad
    C8051F93x,
    /// C8051F96x: 128 KB banked, 1 KB pages
    C8051F96x,
    /// EFM8BB1: 8 KB, 512-byte pages
    Efm8Bb1,
    /// EFM8SB1: 8 KB, 512-byte pages
    Efm8Sb1,
    /// EFM8UB1: 16 KB, 512-byte pages
    Efm8Ub1,
    /// EFM8LB1: 64 KB, 512-byte pages
    Efm8Lb1,
}

impl Device {
    /// Every built-in profile
    pub const ALL: [Device; 7] = [
        Device::C8051F38x,
        Device::C8051F93x,
        Device::C8051F96x,
        Device::Efm8Bb1,
        Device::Efm8Sb1,
        Device::Efm8Ub1,
        Device::Efm8Lb1,
    ];

    /// Profile name
    pub fn name(self) -> &'static str {
        match self {
            Device::C8051F38x => "C8051F38x",
            Device::C8051F93x => "C8051F93x",
            Device::C8051F96x => "C8051F96x",
            Device::Efm8Bb1 => "EFM8BB1",
            Device::Efm8Sb1 => "EFM8SB1",
            Device::Efm8Ub1 => "EFM8UB1",
            Device::Efm8Lb1 => "EFM8LB1",
        }
    }

    /// Look up a profile by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|device| device.name().eq_ignore_ascii_case(name))
    }

    /// Geometry of this device
    pub fn config(self) -> DeviceConfig {
        match self {
            Device::C8051F38x => DeviceConfig::new(self.name(), 0x1_0000, 512, 0xF800),
            Device::C8051F93x => {
                DeviceConfig::new(self.name(), 0x1_0000, 1024, 0xF400).with_scratchpad(1024, 1024)
            }
            Device::C8051F96x => DeviceConfig::new(self.name(), 0x2_0000, 1024, 0x1_F800),
            Device::Efm8Bb1 => DeviceConfig::new(self.name(), 0x2000, 512, 0x1C00),
            Device::Efm8Sb1 => DeviceConfig::new(self.name(), 0x2000, 512, 0x1C00),
            Device::Efm8Ub1 => DeviceConfig::new(self.name(), 0x4000, 512, 0x3C00),
            Device::Efm8Lb1 => DeviceConfig::new(self.name(), 0x1_0000, 512, 0xF800),
        }
    }
}
