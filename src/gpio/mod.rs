// Digital output lines for the motor driver and status LED
//
// Provides:
// - LogicLevel and the OutputLine / GpioBackend traits
// - Raspberry Pi backend (rppal, feature "rpi")
// - Simulated backend used off-device and in tests

#[cfg(feature = "rpi")]
mod rpi;
pub mod sim;

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "rpi")]
pub use rpi::RpiGpio;
pub use sim::{SimGpio, SimLine};

/// Binary level driven onto a line. No default on purpose: every line is
/// driven explicitly when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicLevel {
    High,
    Low,
}

impl LogicLevel {
    pub fn inverted(self) -> Self {
        match self {
            LogicLevel::High => LogicLevel::Low,
            LogicLevel::Low => LogicLevel::High,
        }
    }

    pub fn is_high(self) -> bool {
        self == LogicLevel::High
    }

    /// Single-letter form shown by the UI shell ("H" / "L")
    pub fn as_letter(self) -> &'static str {
        match self {
            LogicLevel::High => "H",
            LogicLevel::Low => "L",
        }
    }
}

impl From<bool> for LogicLevel {
    fn from(high: bool) -> Self {
        if high { LogicLevel::High } else { LogicLevel::Low }
    }
}

impl fmt::Display for LogicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_letter())
    }
}

/// Error types for GPIO access
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("GPIO controller unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Failed to open line {line}: {reason}")]
    Open { line: u8, reason: String },

    #[error("Write to line {line} failed: {reason}")]
    ActuationFault { line: u8, reason: String },
}

pub type Result<T> = std::result::Result<T, GpioError>;

/// A single digital output line.
///
/// `set_level` is synchronous: `level()` reflects it as soon as it returns.
/// `level()` only ever reports what this process last drove onto the line.
pub trait OutputLine: Send {
    fn line(&self) -> u8;
    fn set_level(&mut self, level: LogicLevel) -> Result<()>;
    fn level(&self) -> LogicLevel;

    fn toggle(&mut self) -> Result<LogicLevel> {
        let next = self.level().inverted();
        self.set_level(next)?;
        Ok(next)
    }
}

/// A GPIO controller able to hand out output lines
pub trait GpioBackend {
    fn name(&self) -> &'static str;

    /// Open `line` as an output, driven Low
    fn open_output(&mut self, line: u8) -> Result<Box<dyn OutputLine>>;
}

/// Probe for a GPIO controller once at startup.
///
/// The result is the single hardware-capability decision for the whole
/// process; nothing downstream probes again.
pub fn probe(simulate: bool) -> Result<Box<dyn GpioBackend>> {
    if simulate {
        return Ok(Box::new(SimGpio::new()));
    }
    probe_hardware()
}

#[cfg(feature = "rpi")]
fn probe_hardware() -> Result<Box<dyn GpioBackend>> {
    Ok(Box::new(RpiGpio::new()?))
}

#[cfg(not(feature = "rpi"))]
fn probe_hardware() -> Result<Box<dyn GpioBackend>> {
    Err(GpioError::HardwareUnavailable(
        "built without the rpi feature".to_string(),
    ))
}
