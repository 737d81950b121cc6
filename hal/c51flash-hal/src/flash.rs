//! Flash controller abstractions
//!
//! Models the special function registers that take part in a flash write
//! or erase on 8051-family parts. The write/erase sequence (interrupts off,
//! VDD monitor armed, two-byte key, PSCTL latches, MOVX store) is driven
//! by `c51flash-core`; implementations of [`FlashController`] only expose
//! the individual register accesses.

use core::ops::Add;

use crate::device::DeviceConfig;

/// First value of the flash unlock key sequence (written to FLKEY)
pub const FLASH_KEY_1: u8 = 0xA5;

/// Second value of the flash unlock key sequence (written to FLKEY)
pub const FLASH_KEY_2: u8 = 0xF1;

/// Value of every byte after a page erase
pub const ERASED_BYTE: u8 = 0xFF;

/// PSCTL: program store write enable. MOVX writes target flash.
pub const PSCTL_PSWE: u8 = 0x01;

/// PSCTL: program store erase enable. A MOVX write erases the page.
pub const PSCTL_PSEE: u8 = 0x02;

/// PSCTL: scratchpad flash access enable
pub const PSCTL_SFLE: u8 = 0x04;

/// Flash memory region
///
/// Some parts have a small scratchpad block next to the main array,
/// selected through PSCTL.SFLE. Each region has its own size and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Region {
    /// Main code/data flash array
    #[default]
    Main,
    /// Scratchpad flash block
    Scratchpad,
}

/// A byte location in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Addr {
    /// Region the offset refers to
    pub region: Region,
    /// Linear byte offset inside the region
    pub offset: u32,
}

impl Addr {
    /// Address in the main flash array
    pub const fn main(offset: u32) -> Self {
        Self {
            region: Region::Main,
            offset,
        }
    }

    /// Address in the scratchpad block
    pub const fn scratchpad(offset: u32) -> Self {
        Self {
            region: Region::Scratchpad,
            offset,
        }
    }
}

impl From<u32> for Addr {
    fn from(offset: u32) -> Self {
        Addr::main(offset)
    }
}

impl Add<u32> for Addr {
    type Output = Addr;

    /// Saturates instead of wrapping so overflowing offsets fail bounds checks.
    fn add(self, rhs: u32) -> Addr {
        Addr {
            region: self.region,
            offset: self.offset.saturating_add(rhs),
        }
    }
}

/// Why a controller refused a write or erase
///
/// Real silicon never reports these: the store is silently dropped.
/// Simulated controllers surface them so misuse is detectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    /// The two-byte key sequence was not written before the store
    KeyMissing,
    /// A wrong key was written; flash stays locked until reset
    Locked,
    /// The VDD monitor was not enabled as a reset source
    VddMonitorDisarmed,
    /// A byte write would have to set bits that are currently cleared
    NotErased,
}

/// Errors from flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Address or range outside the region
    OutOfBounds,
    /// Address is not aligned to what the operation requires
    Unaligned,
    /// VDD is below the high monitor threshold; the operation was not attempted
    SupplyTooLow,
    /// The controller refused the store
    WriteRejected(RejectReason),
    /// A range clear would have to erase the scratch page it relies on
    ScratchOverlap,
    /// Source and destination of a copy overlap
    Overlap,
}

/// VDD monitor threshold (VDM0CN)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VddThreshold {
    /// Monitor enabled, low threshold (VDM0CN = 0x80)
    Low,
    /// Monitor enabled, high threshold required for flash writes (VDM0CN = 0xA0)
    High,
}

/// Register-level access to the flash controller of one device
///
/// Each method corresponds to one SFR access (or one MOVX/MOVC instruction)
/// of the write/erase sequence. Addresses passed to
/// [`movx_write`](FlashController::movx_write) and
/// [`movc_read`](FlashController::movc_read) are 16-bit code-space window
/// addresses; the caller selects the scratchpad via PSCTL.SFLE and the upper
/// code bank via [`set_code_bank`](FlashController::set_code_bank).
pub trait FlashController {
    /// Geometry of the device behind this controller
    fn config(&self) -> &DeviceConfig;

    /// Current value of the global interrupt enable (IE.EA)
    fn interrupts_enabled(&self) -> bool;

    /// Set the global interrupt enable (IE.EA)
    fn set_interrupts_enabled(&mut self, enabled: bool);

    /// Current PSCTL value
    fn psctl(&self) -> u8;

    /// Write PSCTL
    fn set_psctl(&mut self, value: u8);

    /// Write one value to FLKEY
    fn write_flash_key(&mut self, key: u8);

    /// Enable the VDD monitor at the given threshold (VDM0CN)
    fn set_vdd_monitor(&mut self, threshold: VddThreshold);

    /// VDD monitor output (VDM0CN.VDDSTAT): supply above the threshold
    fn vdd_ok(&self) -> bool;

    /// Enable or disable the VDD monitor as a reset source (RSTSRC.PORSF)
    fn set_vdd_reset_source(&mut self, enabled: bool);

    /// Currently selected upper code bank (PSBANK.COBANK)
    fn code_bank(&self) -> u8;

    /// Select the upper code bank (PSBANK.COBANK)
    fn set_code_bank(&mut self, bank: u8);

    /// MOVX store into the code space window
    ///
    /// With PSWE set this programs a byte; with PSWE and PSEE set it erases
    /// the page containing `addr`. Hardware controllers always return
    /// `Ok(())`, since silicon gives no feedback.
    fn movx_write(&mut self, addr: u16, value: u8) -> Result<(), FlashError>;

    /// MOVC load from the code space window
    fn movc_read(&mut self, addr: u16) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_from_u32_is_main() {
        let addr: Addr = 0x1234.into();
        assert_eq!(addr, Addr::main(0x1234));
        assert_eq!(Region::default(), Region::Main);
    }

    #[test]
    fn test_addr_add_keeps_region() {
        assert_eq!(Addr::scratchpad(0x10) + 4, Addr::scratchpad(0x14));
        assert_eq!(Addr::main(u32::MAX - 1) + 4, Addr::main(u32::MAX));
    }
}
