//! Flash self-test scenario
//!
//! Exercises every utility once on a 24-byte test area and checks the
//! result by reading it back. The expected final contents are
//!
//! ```text
//! 48 49 4A 44 45 46 47 00  48 49 4A 44 45 46 47 00  5A 5A 5A 5A 5A 5A 5A 5A
//! ```

use anyhow::{anyhow, bail, Result};
use c51flash_core::{Addr, FlashDevice, FlashError, FlashUtils};
use log::{error, info};
use std::fmt::Write;

/// Size of the test area in bytes.
pub const AREA_LEN: u32 = 24;

/// Pattern written by the byte write steps.
const TEST_BYTE: u8 = 0xA5;

/// Pattern written by the fill step.
const FILL_BYTE: u8 = 0x5A;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Read back matched.
    Passed,
    /// Step does not apply to this device.
    Skipped,
    /// Step failed.
    Failed(String),
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Step name.
    pub name: &'static str,
    /// Outcome.
    pub outcome: Outcome,
}

/// Results of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Step results in execution order.
    pub steps: Vec<StepReport>,
}

impl Report {
    /// Whether no step failed.
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Failed steps.
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, Outcome::Failed(_)))
    }

    fn record(&mut self, name: &'static str, result: Result<bool>) {
        let outcome = match result {
            Ok(true) => {
                info!("{name}: passed");
                Outcome::Passed
            }
            Ok(false) => {
                info!("{name}: skipped");
                Outcome::Skipped
            }
            Err(err) => {
                error!("{name}: {err:#}");
                Outcome::Failed(format!("{err:#}"))
            }
        };
        self.steps.push(StepReport { name, outcome });
    }
}

/// Converts a flash error for use with `?`.
fn flash<T>(result: Result<T, FlashError>) -> Result<T> {
    result.map_err(|err| anyhow!("flash error: {err:?}"))
}

/// Reads `expected.len()` bytes at `addr` and compares them.
fn verify<D: FlashDevice + ?Sized>(dev: &mut D, addr: Addr, expected: &[u8]) -> Result<()> {
    let mut actual = vec![0; expected.len()];
    flash(dev.read_bytes(addr, &mut actual, expected.len()))?;
    if actual != expected {
        bail!(
            "read back {} at {:#x}, expected {}",
            hex(&actual),
            addr.offset,
            hex(expected)
        );
    }
    Ok(())
}

type Step<D> = fn(&mut D, Addr) -> Result<bool>;

/// Runs all steps on the test area at `start` in main flash.
///
/// Steps are independent: a failing step is recorded and the run goes on.
pub fn run<D: FlashDevice + ?Sized>(dev: &mut D, start: u32) -> Report {
    let steps: [(&'static str, Step<D>); 8] = [
        ("byte write", byte_write),
        ("page erase", page_erase),
        ("write", write),
        ("clear", clear),
        ("update", update),
        ("copy", copy),
        ("fill", fill),
        ("scratchpad", scratchpad),
    ];

    let label = dev.config().label.clone();
    info!(
        "testing {} at {start:#x}",
        if label.is_empty() { "device" } else { label.as_str() }
    );

    let mut report = Report::default();
    for (name, step) in steps {
        report.record(name, step(dev, Addr::main(start)));
    }
    report
}

fn byte_write<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.erase(base))?;
    flash(dev.write(base, TEST_BYTE))?;
    verify(dev, base, &[TEST_BYTE])?;
    Ok(true)
}

fn page_erase<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.erase(base))?;
    verify(dev, base, &[0xFF])?;
    Ok(true)
}

fn write<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.write_bytes(base, b"ABCDEFG\0"))?;
    verify(dev, base, b"ABCDEFG\0")?;
    Ok(true)
}

fn clear<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.clear(base, 2))?;
    verify(dev, base, b"\xFF\xFFCDEFG\0")?;
    Ok(true)
}

fn update<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.update(base, b"HIJ"))?;
    verify(dev, base, b"HIJDEFG\0")?;
    Ok(true)
}

fn copy<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.copy(base + 8, base, 8))?;
    verify(dev, base + 8, b"HIJDEFG\0")?;
    Ok(true)
}

fn fill<D: FlashDevice + ?Sized>(dev: &mut D, base: Addr) -> Result<bool> {
    flash(dev.fill(base + 16, 8, FILL_BYTE))?;
    verify(dev, base + 16, &[FILL_BYTE; 8])?;
    Ok(true)
}

/// Byte write at the start of the scratchpad, skipped without one.
fn scratchpad<D: FlashDevice + ?Sized>(dev: &mut D, _base: Addr) -> Result<bool> {
    if !dev.config().has_scratchpad() {
        return Ok(false);
    }
    let pad = Addr::scratchpad(0);
    flash(dev.erase(pad))?;
    flash(dev.write(pad, TEST_BYTE))?;
    verify(dev, pad, &[TEST_BYTE])?;
    Ok(true)
}

/// Formats the test area at `start` as a hex dump, eight bytes per line.
pub fn dump<D: FlashDevice + ?Sized>(dev: &mut D, start: u32) -> Result<String> {
    let mut area = [0u8; AREA_LEN as usize];
    flash(dev.read_bytes(Addr::main(start), &mut area, AREA_LEN as usize))?;

    let mut out = String::new();
    for (offset, line) in (start..).step_by(8).zip(area.chunks(8)) {
        writeln!(out, "{offset:05X}: {}", hex(line))?;
    }
    Ok(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
