//! In-memory flash controller model

use c51flash_hal::device::CODE_WINDOW_SIZE;
use c51flash_hal::{
    Addr, Device, DeviceConfig, FlashController, FlashError, Region, RejectReason, VddThreshold,
    ERASED_BYTE, FLASH_KEY_1, FLASH_KEY_2, PSCTL_PSEE, PSCTL_PSWE, PSCTL_SFLE,
};
use log::{trace, warn};

/// Supply voltage of a freshly created simulator (mV)
pub const NOMINAL_SUPPLY_MV: u16 = 3300;

/// Supply needed for the high VDD monitor threshold (mV)
pub const VDD_HIGH_THRESHOLD_MV: u16 = 1800;

/// Supply needed for the low VDD monitor threshold (mV)
pub const VDD_LOW_THRESHOLD_MV: u16 = 1700;

/// Start of the banked half of the code window
const BANK_WINDOW_BASE: u16 = 0x8000;

/// Size of one code bank
const BANK_SIZE: u32 = CODE_WINDOW_SIZE / 2;

/// Progress of the FLKEY unlock sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No key written since the last flash operation
    Idle,
    /// First key (0xA5) written
    FirstKey,
    /// Both keys written, next flash store is allowed
    Unlocked,
    /// Wrong key written, flash stores are refused until reset
    Locked,
}

/// Operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStats {
    /// Bytes programmed
    pub byte_writes: u32,
    /// Pages erased
    pub page_erases: u32,
    /// Stores refused by the controller
    pub rejected: u32,
    /// Flash stores executed while interrupts were enabled
    pub unguarded: u32,
    /// Controller resets
    pub resets: u32,
}

/// Simulated flash controller
#[derive(Debug, Clone)]
pub struct SimController {
    config: DeviceConfig,
    main: Vec<u8>,
    scratchpad: Vec<u8>,
    interrupts: bool,
    psctl: u8,
    key: KeyState,
    vdd_monitor: VddThreshold,
    vdd_reset_source: bool,
    supply_mv: u16,
    code_bank: u8,
    stats: SimStats,
}

impl SimController {
    /// Create a simulator with fully erased flash
    ///
    /// Registers start in the state an application typically runs in:
    /// interrupts enabled, VDD monitor on at the low threshold and armed as
    /// a reset source, code bank 1 selected.
    pub fn new(config: DeviceConfig) -> Self {
        let main = vec![ERASED_BYTE; config.size(Region::Main) as usize];
        let scratchpad = vec![ERASED_BYTE; config.size(Region::Scratchpad) as usize];
        Self {
            config,
            main,
            scratchpad,
            interrupts: true,
            psctl: 0,
            key: KeyState::Idle,
            vdd_monitor: VddThreshold::Low,
            vdd_reset_source: true,
            supply_mv: NOMINAL_SUPPLY_MV,
            code_bank: 1,
            stats: SimStats::default(),
        }
    }

    /// Create a simulator for a built-in device profile
    pub fn for_device(device: Device) -> Self {
        Self::new(device.config())
    }

    /// Reset the controller registers
    ///
    /// Flash contents survive; a key lock is cleared.
    pub fn reset(&mut self) {
        self.interrupts = true;
        self.psctl = 0;
        self.key = KeyState::Idle;
        self.vdd_monitor = VddThreshold::Low;
        self.vdd_reset_source = true;
        self.code_bank = 1;
        self.stats.resets += 1;
    }

    /// Set the simulated supply voltage
    pub fn set_supply_mv(&mut self, mv: u16) {
        self.supply_mv = mv;
    }

    /// Current key sequence state
    pub fn key_state(&self) -> KeyState {
        self.key
    }

    /// Check if a wrong key locked flash writes
    pub fn is_locked(&self) -> bool {
        self.key == KeyState::Locked
    }

    /// Operation counters
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    /// Raw contents of a region
    pub fn memory(&self, region: Region) -> &[u8] {
        match region {
            Region::Main => &self.main,
            Region::Scratchpad => &self.scratchpad,
        }
    }

    /// Read a byte directly, bypassing the controller
    pub fn peek(&self, addr: Addr) -> Option<u8> {
        self.memory(addr.region).get(addr.offset as usize).copied()
    }

    /// Seed flash contents directly, bypassing programming rules
    pub fn load(&mut self, addr: Addr, data: &[u8]) -> Result<(), FlashError> {
        let memory = self.memory_mut(addr.region);
        let start = addr.offset as usize;
        let end = start.checked_add(data.len()).ok_or(FlashError::OutOfBounds)?;
        memory
            .get_mut(start..end)
            .ok_or(FlashError::OutOfBounds)?
            .copy_from_slice(data);
        Ok(())
    }

    fn memory_mut(&mut self, region: Region) -> &mut Vec<u8> {
        match region {
            Region::Main => &mut self.main,
            Region::Scratchpad => &mut self.scratchpad,
        }
    }

    /// Any SFR write other than FLKEY between the two keys aborts the unlock
    fn touch_sfr(&mut self) {
        if self.key == KeyState::FirstKey {
            trace!("key sequence interrupted by SFR access");
            self.key = KeyState::Idle;
        }
    }

    /// Map a code window address to a flash location
    fn resolve(&self, addr: u16) -> Addr {
        if self.psctl & PSCTL_SFLE != 0 {
            return Addr::scratchpad(u32::from(addr));
        }
        if self.config.is_banked() && addr >= BANK_WINDOW_BASE {
            let bank = u32::from(self.code_bank);
            return Addr::main(bank * BANK_SIZE + u32::from(addr - BANK_WINDOW_BASE));
        }
        Addr::main(u32::from(addr))
    }

    fn reject(&mut self, target: Addr, reason: RejectReason) -> Result<(), FlashError> {
        warn!("flash store to {:?} rejected: {:?}", target, reason);
        self.stats.rejected += 1;
        Err(FlashError::WriteRejected(reason))
    }
}

impl FlashController for SimController {
    fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts
    }

    fn set_interrupts_enabled(&mut self, enabled: bool) {
        self.touch_sfr();
        self.interrupts = enabled;
    }

    fn psctl(&self) -> u8 {
        self.psctl
    }

    fn set_psctl(&mut self, value: u8) {
        self.touch_sfr();
        self.psctl = value;
    }

    fn write_flash_key(&mut self, key: u8) {
        self.key = match (self.key, key) {
            (KeyState::Locked, _) => KeyState::Locked,
            (KeyState::Idle, FLASH_KEY_1) => KeyState::FirstKey,
            (KeyState::FirstKey, FLASH_KEY_2) => KeyState::Unlocked,
            (state, key) => {
                warn!("unexpected flash key {:#04x} in state {:?}, locking flash", key, state);
                KeyState::Locked
            }
        };
    }

    fn set_vdd_monitor(&mut self, threshold: VddThreshold) {
        self.touch_sfr();
        self.vdd_monitor = threshold;
    }

    fn vdd_ok(&self) -> bool {
        match self.vdd_monitor {
            VddThreshold::High => self.supply_mv >= VDD_HIGH_THRESHOLD_MV,
            VddThreshold::Low => self.supply_mv >= VDD_LOW_THRESHOLD_MV,
        }
    }

    fn set_vdd_reset_source(&mut self, enabled: bool) {
        self.touch_sfr();
        self.vdd_reset_source = enabled;
    }

    fn code_bank(&self) -> u8 {
        self.code_bank
    }

    fn set_code_bank(&mut self, bank: u8) {
        self.touch_sfr();
        self.code_bank = bank;
    }

    fn movx_write(&mut self, addr: u16, value: u8) -> Result<(), FlashError> {
        if self.psctl & PSCTL_PSWE == 0 {
            // Plain XRAM store, not modelled
            trace!("xram store {:#06x} <- {:#04x} ignored", addr, value);
            return Ok(());
        }

        let target = self.resolve(addr);
        if !self.config.contains(target) {
            return Err(FlashError::OutOfBounds);
        }

        // Every flash store consumes the unlock, successful or not
        let key = self.key;
        if key != KeyState::Locked {
            self.key = KeyState::Idle;
        }
        match key {
            KeyState::Unlocked => {}
            KeyState::Locked => return self.reject(target, RejectReason::Locked),
            KeyState::Idle | KeyState::FirstKey => {
                return self.reject(target, RejectReason::KeyMissing)
            }
        }
        if !self.vdd_reset_source {
            return self.reject(target, RejectReason::VddMonitorDisarmed);
        }

        if self.interrupts {
            self.stats.unguarded += 1;
        }

        let page_size = self.config.page_size(target.region) as usize;
        let offset = target.offset as usize;
        if self.psctl & PSCTL_PSEE != 0 {
            let base = offset & !(page_size - 1);
            trace!("erase {:?} page {:#x}", target.region, base);
            self.memory_mut(target.region)[base..base + page_size].fill(ERASED_BYTE);
            self.stats.page_erases += 1;
            return Ok(());
        }

        let current = self.memory(target.region)[offset];
        if value & !current != 0 {
            return self.reject(target, RejectReason::NotErased);
        }
        self.memory_mut(target.region)[offset] = current & value;
        self.stats.byte_writes += 1;
        Ok(())
    }

    fn movc_read(&mut self, addr: u16) -> u8 {
        let target = self.resolve(addr);
        self.peek(target).unwrap_or(ERASED_BYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlock(sim: &mut SimController) {
        sim.write_flash_key(FLASH_KEY_1);
        sim.write_flash_key(FLASH_KEY_2);
    }

    #[test]
    fn test_new_is_erased() {
        let sim = SimController::for_device(Device::Efm8Sb1);
        assert_eq!(sim.memory(Region::Main).len(), 0x2000);
        assert!(sim.memory(Region::Main).iter().all(|&b| b == ERASED_BYTE));
        assert!(sim.memory(Region::Scratchpad).is_empty());
    }

    #[test]
    fn test_unlocked_write() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(sim.movx_write(0x1000, 0xA5), Ok(()));
        assert_eq!(sim.peek(Addr::main(0x1000)), Some(0xA5));
        assert_eq!(sim.key_state(), KeyState::Idle);
        assert_eq!(sim.stats().byte_writes, 1);
    }

    #[test]
    fn test_write_without_keys_rejected() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(
            sim.movx_write(0x1000, 0x00),
            Err(FlashError::WriteRejected(RejectReason::KeyMissing))
        );
        assert_eq!(sim.peek(Addr::main(0x1000)), Some(ERASED_BYTE));
        assert_eq!(sim.stats().rejected, 1);
    }

    #[test]
    fn test_unlock_is_single_use() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert!(sim.movx_write(0x1000, 0x00).is_ok());
        assert_eq!(
            sim.movx_write(0x1001, 0x00),
            Err(FlashError::WriteRejected(RejectReason::KeyMissing))
        );
    }

    #[test]
    fn test_wrong_key_locks_until_reset() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.write_flash_key(FLASH_KEY_1);
        sim.write_flash_key(0x00);
        assert!(sim.is_locked());

        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(
            sim.movx_write(0x1000, 0x00),
            Err(FlashError::WriteRejected(RejectReason::Locked))
        );

        sim.reset();
        assert!(!sim.is_locked());
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert!(sim.movx_write(0x1000, 0x00).is_ok());
    }

    #[test]
    fn test_sfr_access_between_keys_aborts_unlock() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.write_flash_key(FLASH_KEY_1);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(sim.key_state(), KeyState::Idle);
        // The second key now arrives out of sequence
        sim.write_flash_key(FLASH_KEY_2);
        assert!(sim.is_locked());
    }

    #[test]
    fn test_disarmed_vdd_monitor_rejected() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.set_vdd_reset_source(false);
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(
            sim.movx_write(0x1000, 0x00),
            Err(FlashError::WriteRejected(RejectReason::VddMonitorDisarmed))
        );
    }

    #[test]
    fn test_write_cannot_set_bits() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.load(Addr::main(0x1000), &[0x0F]).unwrap();
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(
            sim.movx_write(0x1000, 0xF0),
            Err(FlashError::WriteRejected(RejectReason::NotErased))
        );
        assert_eq!(sim.peek(Addr::main(0x1000)), Some(0x0F));

        // Clearing more bits is fine
        unlock(&mut sim);
        assert!(sim.movx_write(0x1000, 0x05).is_ok());
        assert_eq!(sim.peek(Addr::main(0x1000)), Some(0x05));
    }

    #[test]
    fn test_erase_whole_page() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.load(Addr::main(0x11FF), &[0x00, 0x00]).unwrap();
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE | PSCTL_PSEE);
        assert!(sim.movx_write(0x1123, 0x00).is_ok());
        assert_eq!(sim.peek(Addr::main(0x11FF)), Some(ERASED_BYTE));
        // Next page untouched
        assert_eq!(sim.peek(Addr::main(0x1200)), Some(0x00));
        assert_eq!(sim.stats().page_erases, 1);
    }

    #[test]
    fn test_psctl_clear_is_xram_store() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        unlock(&mut sim);
        assert_eq!(sim.movx_write(0x1000, 0x00), Ok(()));
        assert_eq!(sim.peek(Addr::main(0x1000)), Some(ERASED_BYTE));
        assert_eq!(sim.key_state(), KeyState::Unlocked);
    }

    #[test]
    fn test_out_of_bounds_store() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE);
        assert_eq!(sim.movx_write(0x2000, 0x00), Err(FlashError::OutOfBounds));
    }

    #[test]
    fn test_banked_window() {
        let mut sim = SimController::for_device(Device::C8051F96x);
        sim.load(Addr::main(0x1_0004), &[0x42]).unwrap();
        sim.load(Addr::main(0x1_8004), &[0x43]).unwrap();
        sim.load(Addr::main(0x8004), &[0x41]).unwrap();

        assert_eq!(sim.movc_read(0x8004), 0x41);
        sim.set_code_bank(2);
        assert_eq!(sim.movc_read(0x8004), 0x42);
        sim.set_code_bank(3);
        assert_eq!(sim.movc_read(0x8004), 0x43);
        // Lower half is never banked
        sim.load(Addr::main(0x0004), &[0x40]).unwrap();
        assert_eq!(sim.movc_read(0x0004), 0x40);
    }

    #[test]
    fn test_scratchpad_select() {
        let mut sim = SimController::for_device(Device::C8051F93x);
        unlock(&mut sim);
        sim.set_psctl(PSCTL_PSWE | PSCTL_SFLE);
        assert!(sim.movx_write(0x0000, 0xA5).is_ok());
        assert_eq!(sim.peek(Addr::scratchpad(0)), Some(0xA5));
        assert_eq!(sim.peek(Addr::main(0)), Some(ERASED_BYTE));
        assert_eq!(sim.movc_read(0x0000), 0xA5);
    }

    #[test]
    fn test_vdd_thresholds() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.set_supply_mv(1750);
        sim.set_vdd_monitor(VddThreshold::Low);
        assert!(sim.vdd_ok());
        sim.set_vdd_monitor(VddThreshold::High);
        assert!(!sim.vdd_ok());
        sim.set_supply_mv(NOMINAL_SUPPLY_MV);
        assert!(sim.vdd_ok());
    }

    #[test]
    fn test_reset_keeps_contents() {
        let mut sim = SimController::for_device(Device::Efm8Sb1);
        sim.load(Addr::main(0x10), &[1, 2, 3]).unwrap();
        sim.set_interrupts_enabled(false);
        sim.reset();
        assert_eq!(sim.peek(Addr::main(0x11)), Some(2));
        assert!(sim.interrupts_enabled());
        assert_eq!(sim.stats().resets, 1);
    }
}
