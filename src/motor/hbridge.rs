// One H-bridge channel: two direction lines and one enable line
//
// | Command | dirA | dirB | enable |
// |---------|------|------|--------|
// | Forward | High | Low  | High   |
// | Reverse | Low  | High | High   |
// | Stop    |  -   |  -   | Low    |

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MotorPins;
use crate::gpio::{self, GpioBackend, LogicLevel, OutputLine};
use crate::messages::PinLevels;

/// Per-motor command vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorCommand {
    Forward,
    Reverse,
    Stop,
}

impl MotorCommand {
    /// (dirA, dirB) for the driving commands; Stop leaves direction alone
    fn direction_levels(self) -> Option<(LogicLevel, LogicLevel)> {
        match self {
            MotorCommand::Forward => Some((LogicLevel::High, LogicLevel::Low)),
            MotorCommand::Reverse => Some((LogicLevel::Low, LogicLevel::High)),
            MotorCommand::Stop => None,
        }
    }
}

/// Selects one of a motor's three lines for manual toggling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinSelector {
    DirA,
    DirB,
    Enable,
}

pub struct MotorDriver {
    name: &'static str,
    dir_a: Box<dyn OutputLine>,
    dir_b: Box<dyn OutputLine>,
    enable: Box<dyn OutputLine>,
}

impl MotorDriver {
    pub fn new(
        name: &'static str,
        dir_a: Box<dyn OutputLine>,
        dir_b: Box<dyn OutputLine>,
        enable: Box<dyn OutputLine>,
    ) -> Self {
        Self {
            name,
            dir_a,
            dir_b,
            enable,
        }
    }

    /// Open the three lines of one motor on `backend`
    pub fn open(
        backend: &mut dyn GpioBackend,
        name: &'static str,
        pins: MotorPins,
    ) -> gpio::Result<Self> {
        let dir_a = backend.open_output(pins.dir_a)?;
        let dir_b = backend.open_output(pins.dir_b)?;
        let enable = backend.open_output(pins.enable)?;
        debug!(
            "{} motor on lines A={} B={} E={}",
            name, pins.dir_a, pins.dir_b, pins.enable
        );
        Ok(Self::new(name, dir_a, dir_b, enable))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Drive the three lines for `command`.
    ///
    /// Enable always ends at a defined level. If the direction lines must
    /// change while the bridge is enabled, enable is dropped first so the
    /// bridge never runs on a half-written direction pair. Lines already at
    /// their target level are not written, so repeating a command is free.
    pub fn set_command(&mut self, command: MotorCommand) -> gpio::Result<()> {
        let Some((a, b)) = command.direction_levels() else {
            return self.set_enable(LogicLevel::Low);
        };

        let direction_changes = self.dir_a.level() != a || self.dir_b.level() != b;
        if direction_changes && self.enable.level().is_high() {
            self.enable.set_level(LogicLevel::Low)?;
        }
        if self.dir_a.level() != a {
            self.dir_a.set_level(a)?;
        }
        if self.dir_b.level() != b {
            self.dir_b.set_level(b)?;
        }
        self.set_enable(LogicLevel::High)
    }

    fn set_enable(&mut self, level: LogicLevel) -> gpio::Result<()> {
        if self.enable.level() == level {
            return Ok(());
        }
        debug!("{} motor enable -> {}", self.name, level);
        self.enable.set_level(level)
    }

    /// Reconstruct the command from the line levels.
    ///
    /// Lossy: enable Low reads as Stop whatever the direction lines say, so
    /// "Stop after Forward" and "Stop after Reverse" look the same. With
    /// enable High only dirA is consulted, so a manually toggled dirB is not
    /// reflected.
    pub fn read_command(&self) -> MotorCommand {
        if !self.enable.level().is_high() {
            MotorCommand::Stop
        } else if self.dir_a.level().is_high() {
            MotorCommand::Forward
        } else {
            MotorCommand::Reverse
        }
    }

    /// Flip a single line, bypassing the command table (diagnostics only)
    pub fn toggle(&mut self, selector: PinSelector) -> gpio::Result<LogicLevel> {
        let line = match selector {
            PinSelector::DirA => &mut self.dir_a,
            PinSelector::DirB => &mut self.dir_b,
            PinSelector::Enable => &mut self.enable,
        };
        let level = line.toggle()?;
        debug!("{} motor line {} toggled to {}", self.name, line.line(), level);
        Ok(level)
    }

    pub fn levels(&self) -> PinLevels {
        PinLevels {
            a: self.dir_a.level(),
            b: self.dir_b.level(),
            e: self.enable.level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::SimGpio;

    const PINS: MotorPins = MotorPins {
        dir_a: 23,
        dir_b: 24,
        enable: 25,
    };

    fn motor() -> (SimGpio, MotorDriver) {
        let mut gpio = SimGpio::new();
        let motor = MotorDriver::open(&mut gpio, "left", PINS).unwrap();
        (gpio, motor)
    }

    fn levels(motor: &MotorDriver) -> (LogicLevel, LogicLevel, LogicLevel) {
        let l = motor.levels();
        (l.a, l.b, l.e)
    }

    #[test]
    fn test_command_table() {
        use LogicLevel::{High, Low};
        let (_gpio, mut motor) = motor();

        motor.set_command(MotorCommand::Forward).unwrap();
        assert_eq!(levels(&motor), (High, Low, High));

        motor.set_command(MotorCommand::Reverse).unwrap();
        assert_eq!(levels(&motor), (Low, High, High));

        // Stop only drops enable
        motor.set_command(MotorCommand::Stop).unwrap();
        assert_eq!(levels(&motor), (Low, High, Low));
    }

    #[test]
    fn test_enable_dropped_before_direction_change() {
        let (gpio, mut motor) = motor();
        motor.set_command(MotorCommand::Forward).unwrap();
        gpio.clear_writes();

        motor.set_command(MotorCommand::Reverse).unwrap();
        assert_eq!(
            gpio.writes(),
            vec![
                (25, LogicLevel::Low),
                (23, LogicLevel::Low),
                (24, LogicLevel::High),
                (25, LogicLevel::High),
            ]
        );
    }

    #[test]
    fn test_repeated_command_writes_nothing() {
        let (gpio, mut motor) = motor();
        motor.set_command(MotorCommand::Forward).unwrap();
        gpio.clear_writes();

        motor.set_command(MotorCommand::Forward).unwrap();
        assert!(gpio.writes().is_empty());

        motor.set_command(MotorCommand::Stop).unwrap();
        motor.set_command(MotorCommand::Stop).unwrap();
        assert_eq!(gpio.writes(), vec![(25, LogicLevel::Low)]);
    }

    #[test]
    fn test_stop_restores_manually_enabled_bridge() {
        let (gpio, mut motor) = motor();
        motor.toggle(PinSelector::Enable).unwrap();
        gpio.clear_writes();

        motor.set_command(MotorCommand::Stop).unwrap();
        assert_eq!(gpio.writes(), vec![(25, LogicLevel::Low)]);
        assert_eq!(motor.read_command(), MotorCommand::Stop);
    }

    #[test]
    fn test_read_command_round_trip() {
        let (_gpio, mut motor) = motor();

        motor.set_command(MotorCommand::Forward).unwrap();
        assert_eq!(motor.read_command(), MotorCommand::Forward);

        motor.set_command(MotorCommand::Reverse).unwrap();
        assert_eq!(motor.read_command(), MotorCommand::Reverse);
    }

    #[test]
    fn test_read_command_stop_is_ambiguous() {
        let (_gpio, mut motor) = motor();

        motor.set_command(MotorCommand::Forward).unwrap();
        motor.set_command(MotorCommand::Stop).unwrap();
        let after_forward = (motor.read_command(), motor.levels().a);

        motor.set_command(MotorCommand::Reverse).unwrap();
        motor.set_command(MotorCommand::Stop).unwrap();
        let after_reverse = (motor.read_command(), motor.levels().a);

        // Both read back as Stop; only the raw dirA level remembers
        assert_eq!(after_forward.0, MotorCommand::Stop);
        assert_eq!(after_reverse.0, MotorCommand::Stop);
        assert_ne!(after_forward.1, after_reverse.1);
    }

    #[test]
    fn test_toggle_reaches_unreachable_combination() {
        let (_gpio, mut motor) = motor();
        motor.set_command(MotorCommand::Forward).unwrap();

        assert_eq!(motor.toggle(PinSelector::DirB).unwrap(), LogicLevel::High);
        // dirA and dirB both High is never written by set_command
        let l = motor.levels();
        assert!(l.a.is_high() && l.b.is_high() && l.e.is_high());
    }

    #[test]
    fn test_write_fault_propagates() {
        let (gpio, mut motor) = motor();
        gpio.fail_line(25);
        assert!(motor.set_command(MotorCommand::Forward).is_err());
    }
}
