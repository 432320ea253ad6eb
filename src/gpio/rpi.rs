// Raspberry Pi GPIO backend (BCM line numbers)

use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, info};

use super::{GpioBackend, GpioError, LogicLevel, OutputLine, Result};

pub struct RpiGpio {
    gpio: Gpio,
}

impl RpiGpio {
    /// Fails with `HardwareUnavailable` when not running on a Pi
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| GpioError::HardwareUnavailable(e.to_string()))?;
        info!("GPIO controller found");
        Ok(Self { gpio })
    }
}

impl GpioBackend for RpiGpio {
    fn name(&self) -> &'static str {
        "rppal"
    }

    fn open_output(&mut self, line: u8) -> Result<Box<dyn OutputLine>> {
        let pin = self.gpio.get(line).map_err(|e| GpioError::Open {
            line,
            reason: e.to_string(),
        })?;
        debug!("Opened line {} as output", line);
        Ok(Box::new(RpiLine {
            line,
            pin: pin.into_output_low(),
        }))
    }
}

struct RpiLine {
    line: u8,
    pin: OutputPin,
}

impl OutputLine for RpiLine {
    fn line(&self) -> u8 {
        self.line
    }

    fn set_level(&mut self, level: LogicLevel) -> Result<()> {
        match level {
            LogicLevel::High => self.pin.set_high(),
            LogicLevel::Low => self.pin.set_low(),
        }
        Ok(())
    }

    fn level(&self) -> LogicLevel {
        LogicLevel::from(self.pin.is_set_high())
    }
}
