//! Flash primitives
//!
//! Byte write, byte read and page erase, each one controller transaction.
//! Writes and erases follow the register sequence required by the part:
//!
//! 1. disable the VDD monitor as a reset source
//! 2. enable the VDD monitor at the high threshold
//! 3. abort if VDD is not high enough
//! 4. re-enable the VDD monitor as a reset source
//! 5. write the two unlock keys to FLKEY
//! 6. set the PSCTL latches
//! 7. re-arm the monitor (high threshold, reset source)
//! 8. MOVX store
//! 9. return the monitor to the low threshold and clear the latches
//!
//! Interrupts are disabled for the whole transaction so no ISR can touch
//! an SFR between the two key writes.

use c51flash_hal::device::CODE_WINDOW_SIZE;
use c51flash_hal::{
    Addr, DeviceConfig, FlashController, FlashError, Region, VddThreshold, FLASH_KEY_1,
    FLASH_KEY_2, PSCTL_PSEE, PSCTL_PSWE, PSCTL_SFLE,
};

use crate::traits::FlashDevice;

/// Start of bank 2 in the linear address space
const BANK_2_BASE: u32 = CODE_WINDOW_SIZE;

/// Start of bank 3 in the linear address space
const BANK_3_BASE: u32 = CODE_WINDOW_SIZE + CODE_WINDOW_SIZE / 2;

/// Start of the banked half of the code window
const BANK_WINDOW_BASE: u32 = 0x8000;

/// Where a flash address shows up in the code space window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    /// 16-bit MOVX/MOVC address
    addr: u16,
    /// PSBANK.COBANK value to select, banked parts only
    bank: Option<u8>,
    /// Extra PSCTL bits (SFLE for scratchpad targets)
    psctl: u8,
}

/// Run `f` with interrupts disabled, then restore the previous IE.EA
///
/// The saved state is restored whether or not `f` fails.
pub fn with_interrupts_disabled<C, R>(ctrl: &mut C, f: impl FnOnce(&mut C) -> R) -> R
where
    C: FlashController + ?Sized,
{
    let saved = ctrl.interrupts_enabled();
    ctrl.set_interrupts_enabled(false);
    let result = f(ctrl);
    ctrl.set_interrupts_enabled(saved);
    result
}

/// Flash primitives over a register-level controller
#[derive(Debug)]
pub struct Flash<C> {
    ctrl: C,
}

impl<C: FlashController> Flash<C> {
    /// Wrap a controller
    pub fn new(ctrl: C) -> Self {
        Self { ctrl }
    }

    /// Get the controller
    pub fn controller(&self) -> &C {
        &self.ctrl
    }

    /// Get the controller for direct register access
    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.ctrl
    }

    /// Release the controller
    pub fn into_inner(self) -> C {
        self.ctrl
    }

    /// Write one byte
    pub fn byte_write(&mut self, addr: Addr, value: u8) -> Result<(), FlashError> {
        self.program(addr, value, PSCTL_PSWE)
    }

    /// Read one byte
    pub fn byte_read(&mut self, addr: Addr) -> Result<u8, FlashError> {
        let window = self.window(addr)?;
        Ok(with_interrupts_disabled(&mut self.ctrl, |ctrl| {
            let saved_psctl = ctrl.psctl();
            let saved_bank = ctrl.code_bank();
            if let Some(bank) = window.bank {
                ctrl.set_code_bank(bank);
            }
            if window.psctl != 0 {
                ctrl.set_psctl(saved_psctl | window.psctl);
            }
            let value = ctrl.movc_read(window.addr);
            if window.psctl != 0 {
                ctrl.set_psctl(saved_psctl);
            }
            if window.bank.is_some() {
                ctrl.set_code_bank(saved_bank);
            }
            value
        }))
    }

    /// Erase the page containing `addr`
    pub fn page_erase(&mut self, addr: Addr) -> Result<(), FlashError> {
        #[cfg(feature = "defmt")]
        defmt::trace!("erase page at {}", addr);
        self.program(addr, 0, PSCTL_PSWE | PSCTL_PSEE)
    }

    fn window(&self, addr: Addr) -> Result<Window, FlashError> {
        let config = self.ctrl.config();
        if !config.contains(addr) {
            return Err(FlashError::OutOfBounds);
        }
        Ok(map_window(config, addr))
    }

    fn program(&mut self, addr: Addr, value: u8, latches: u8) -> Result<(), FlashError> {
        let window = self.window(addr)?;
        let result = with_interrupts_disabled(&mut self.ctrl, |ctrl| {
            let saved_bank = ctrl.code_bank();
            if let Some(bank) = window.bank {
                ctrl.set_code_bank(bank);
            }
            let result = store(ctrl, window.addr, value, latches | window.psctl);
            if window.bank.is_some() {
                ctrl.set_code_bank(saved_bank);
            }
            result
        });

        #[cfg(feature = "defmt")]
        if let Err(e) = result {
            defmt::warn!("flash store at {} failed: {}", addr, e);
        }
        result
    }
}

impl<C: FlashController> FlashDevice for Flash<C> {
    fn config(&self) -> &DeviceConfig {
        self.ctrl.config()
    }

    fn read(&mut self, addr: Addr) -> Result<u8, FlashError> {
        self.byte_read(addr)
    }

    fn write(&mut self, addr: Addr, value: u8) -> Result<(), FlashError> {
        self.byte_write(addr, value)
    }

    fn erase(&mut self, addr: Addr) -> Result<(), FlashError> {
        self.page_erase(addr)
    }
}

/// Translate a linear address into the code window
fn map_window(config: &DeviceConfig, addr: Addr) -> Window {
    let offset = addr.offset;
    match addr.region {
        Region::Scratchpad => Window {
            addr: offset as u16,
            bank: None,
            psctl: PSCTL_SFLE,
        },
        Region::Main if !config.is_banked() => Window {
            addr: offset as u16,
            bank: None,
            psctl: 0,
        },
        Region::Main => {
            let (addr, bank) = if offset < BANK_WINDOW_BASE {
                (offset, None)
            } else if offset < BANK_2_BASE {
                (offset, Some(1))
            } else if offset < BANK_3_BASE {
                (offset | BANK_WINDOW_BASE, Some(2))
            } else {
                (offset, Some(3))
            };
            Window {
                addr: (addr & (CODE_WINDOW_SIZE - 1)) as u16,
                bank,
                psctl: 0,
            }
        }
    }
}

/// One unlocked store with the VDD monitor armed
fn store<C>(ctrl: &mut C, addr: u16, value: u8, latches: u8) -> Result<(), FlashError>
where
    C: FlashController + ?Sized,
{
    let saved_psctl = ctrl.psctl();

    ctrl.set_vdd_reset_source(false);
    ctrl.set_vdd_monitor(VddThreshold::High);
    if !ctrl.vdd_ok() {
        ctrl.set_vdd_monitor(VddThreshold::Low);
        ctrl.set_vdd_reset_source(true);
        return Err(FlashError::SupplyTooLow);
    }
    ctrl.set_vdd_reset_source(true);

    // No other SFR access between the keys
    ctrl.write_flash_key(FLASH_KEY_1);
    ctrl.write_flash_key(FLASH_KEY_2);
    ctrl.set_psctl(saved_psctl | latches);

    ctrl.set_vdd_monitor(VddThreshold::High);
    ctrl.set_vdd_reset_source(true);

    let result = ctrl.movx_write(addr, value);

    ctrl.set_vdd_reset_source(false);
    ctrl.set_vdd_monitor(VddThreshold::Low);
    ctrl.set_vdd_reset_source(true);

    ctrl.set_psctl(saved_psctl & !(PSCTL_PSWE | PSCTL_PSEE | PSCTL_SFLE));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use c51flash_hal::{Device, RejectReason, ERASED_BYTE};
    use c51flash_hal_sim::SimController;

    fn flash(device: Device) -> Flash<SimController> {
        Flash::new(SimController::for_device(device))
    }

    #[test]
    fn test_write_then_read() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.byte_write(Addr::main(0x1600), 0xA5).unwrap();
        assert_eq!(flash.byte_read(Addr::main(0x1600)), Ok(0xA5));
        assert_eq!(flash.controller().stats().byte_writes, 1);
    }

    #[test]
    fn test_erase_page() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.byte_write(Addr::main(0x1600), 0xA5).unwrap();
        flash.page_erase(Addr::main(0x1600)).unwrap();
        assert_eq!(flash.byte_read(Addr::main(0x1600)), Ok(ERASED_BYTE));
        flash.page_erase(Addr::main(0x1600)).unwrap();
        assert_eq!(flash.byte_read(Addr::main(0x1600)), Ok(ERASED_BYTE));
    }

    #[test]
    fn test_interrupts_restored() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.byte_write(Addr::main(0x10), 0x00).unwrap();
        assert!(flash.controller().interrupts_enabled());
        assert_eq!(flash.controller().stats().unguarded, 0);

        flash.controller_mut().set_interrupts_enabled(false);
        flash.page_erase(Addr::main(0x10)).unwrap();
        assert!(!flash.controller().interrupts_enabled());
    }

    #[test]
    fn test_interrupts_restored_on_failure() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.byte_write(Addr::main(0x10), 0x0F).unwrap();
        assert_eq!(
            flash.byte_write(Addr::main(0x10), 0xF0),
            Err(FlashError::WriteRejected(RejectReason::NotErased))
        );
        assert!(flash.controller().interrupts_enabled());
        assert_eq!(flash.controller().psctl(), 0);
    }

    #[test]
    fn test_low_supply_aborts() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.controller_mut().set_supply_mv(1750);
        assert_eq!(
            flash.byte_write(Addr::main(0x10), 0x00),
            Err(FlashError::SupplyTooLow)
        );
        assert_eq!(flash.byte_read(Addr::main(0x10)), Ok(ERASED_BYTE));
        assert!(flash.controller().interrupts_enabled());
        // Monitor is left armed at the low threshold
        assert!(flash.controller().vdd_ok());
    }

    #[test]
    fn test_locked_controller_rejects() {
        let mut flash = flash(Device::Efm8Sb1);
        flash.controller_mut().write_flash_key(0x12);
        assert_eq!(
            flash.byte_write(Addr::main(0x10), 0x00),
            Err(FlashError::WriteRejected(RejectReason::Locked))
        );
        flash.controller_mut().reset();
        assert_eq!(flash.byte_write(Addr::main(0x10), 0x00), Ok(()));
    }

    #[test]
    fn test_out_of_bounds() {
        let mut flash = flash(Device::Efm8Sb1);
        assert_eq!(
            flash.byte_write(Addr::main(0x2000), 0x00),
            Err(FlashError::OutOfBounds)
        );
        assert_eq!(
            flash.byte_read(Addr::scratchpad(0)),
            Err(FlashError::OutOfBounds)
        );
    }

    #[test]
    fn test_scratchpad_access() {
        let mut flash = flash(Device::C8051F93x);
        flash.byte_write(Addr::scratchpad(0), 0xA5).unwrap();
        assert_eq!(flash.byte_read(Addr::scratchpad(0)), Ok(0xA5));
        assert_eq!(flash.byte_read(Addr::main(0)), Ok(ERASED_BYTE));
        assert_eq!(flash.controller().psctl(), 0);
    }

    #[test]
    fn test_banked_addresses() {
        let mut flash = flash(Device::C8051F96x);
        for (offset, value) in [
            (0x0_1000u32, 0x10u8),
            (0x0_9000, 0x19),
            (0x1_1000, 0x21),
            (0x1_9000, 0x31),
        ] {
            flash.byte_write(Addr::main(offset), value).unwrap();
        }
        let sim = flash.controller();
        assert_eq!(sim.peek(Addr::main(0x0_1000)), Some(0x10));
        assert_eq!(sim.peek(Addr::main(0x0_9000)), Some(0x19));
        assert_eq!(sim.peek(Addr::main(0x1_1000)), Some(0x21));
        assert_eq!(sim.peek(Addr::main(0x1_9000)), Some(0x31));
        // Bank selection is restored
        assert_eq!(sim.code_bank(), 1);

        assert_eq!(flash.byte_read(Addr::main(0x1_1000)), Ok(0x21));
        assert_eq!(flash.byte_read(Addr::main(0x1_9000)), Ok(0x31));
    }

    #[test]
    fn test_window_mapping() {
        let config = Device::C8051F96x.config();
        let window = map_window(&config, Addr::main(0x1_2345));
        assert_eq!(window.addr, 0xA345);
        assert_eq!(window.bank, Some(2));
        let window = map_window(&config, Addr::main(0x1_A345));
        assert_eq!(window.addr, 0xA345);
        assert_eq!(window.bank, Some(3));
        let window = map_window(&config, Addr::main(0x2345));
        assert_eq!(window.addr, 0x2345);
        assert_eq!(window.bank, None);
    }
}
