//! Device profile selection

use anyhow::{bail, Context, Result};
use c51flash_hal::{Device, DeviceConfig, Region};
use std::{fs, path::Path};

use crate::scenario::AREA_LEN;

/// Parse an address given as hex (`0x1000`) or decimal (`4096`).
pub fn parse_addr(text: &str) -> Result<u32, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid address {text:?}: {err}"))
}

/// Gets a built-in profile by name.
pub fn builtin(name: &str) -> Result<DeviceConfig> {
    match Device::from_name(name) {
        Some(device) => Ok(device.config()),
        None => {
            let known: Vec<_> = Device::ALL.iter().map(|device| device.name()).collect();
            bail!("unknown device {name:?}, known devices: {}", known.join(", "))
        }
    }
}

/// Parses and validates a TOML device profile.
pub fn parse_profile(text: &str) -> Result<DeviceConfig> {
    let config: DeviceConfig = toml::from_str(text).context("malformed device profile")?;
    if let Err(err) = config.validate() {
        bail!("invalid device profile: {err:?}");
    }
    Ok(config)
}

/// Loads a TOML device profile from a file.
pub fn load_profile(path: &Path) -> Result<DeviceConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read device profile {}", path.display()))?;
    parse_profile(&text).with_context(|| format!("in {}", path.display()))
}

/// Checks that the test area at `start` can be used on this device.
///
/// The area must sit inside one main flash page that is not the scratch
/// page, since the test erases that page.
pub fn check_start(config: &DeviceConfig, start: u32) -> Result<()> {
    let end = start.saturating_add(AREA_LEN);
    if end > config.size(Region::Main) {
        bail!(
            "test area {start:#x}..{end:#x} exceeds {} bytes of flash",
            config.flash_size
        );
    }
    let page_mask = !(config.page_size - 1);
    if start & page_mask != (end - 1) & page_mask {
        bail!("test area {start:#x}..{end:#x} crosses a page boundary");
    }
    if start & page_mask == config.scratch_page {
        bail!("test area {start:#x} lies on the scratch page");
    }
    Ok(())
}
