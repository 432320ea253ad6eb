// Simulated GPIO controller
//
// Keeps line levels in memory and records every write in order, so it can
// stand in for the board when running off-device (--simulate) and in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::{GpioBackend, GpioError, LogicLevel, OutputLine, Result};

#[derive(Debug, Default)]
struct SimState {
    levels: BTreeMap<u8, LogicLevel>,
    writes: Vec<(u8, LogicLevel)>,
    faulty: BTreeSet<u8>,
}

/// Handle to the simulated controller. Clones share the same lines.
#[derive(Debug, Clone, Default)]
pub struct SimGpio {
    state: Arc<Mutex<SimState>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current level of `line`, or None if it was never opened
    pub fn level(&self, line: u8) -> Option<LogicLevel> {
        self.lock().levels.get(&line).copied()
    }

    /// Every write since the last `clear_writes`, oldest first
    pub fn writes(&self) -> Vec<(u8, LogicLevel)> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make every following write to `line` fail
    pub fn fail_line(&self, line: u8) {
        self.lock().faulty.insert(line);
    }

    pub fn heal_line(&self, line: u8) {
        self.lock().faulty.remove(&line);
    }
}

impl GpioBackend for SimGpio {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open_output(&mut self, line: u8) -> Result<Box<dyn OutputLine>> {
        let mut state = self.lock();
        if state.levels.contains_key(&line) {
            return Err(GpioError::Open {
                line,
                reason: "line already open".to_string(),
            });
        }
        state.levels.insert(line, LogicLevel::Low);
        debug!("Opened simulated line {}", line);
        Ok(Box::new(SimLine {
            line,
            gpio: self.clone(),
        }))
    }
}

/// One simulated output line
pub struct SimLine {
    line: u8,
    gpio: SimGpio,
}

impl OutputLine for SimLine {
    fn line(&self) -> u8 {
        self.line
    }

    fn set_level(&mut self, level: LogicLevel) -> Result<()> {
        let mut state = self.gpio.lock();
        if state.faulty.contains(&self.line) {
            return Err(GpioError::ActuationFault {
                line: self.line,
                reason: "injected fault".to_string(),
            });
        }
        state.levels.insert(self.line, level);
        state.writes.push((self.line, level));
        Ok(())
    }

    fn level(&self) -> LogicLevel {
        self.gpio.level(self.line).unwrap_or(LogicLevel::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_recorded_in_order() {
        let mut gpio = SimGpio::new();
        let mut a = gpio.open_output(23).unwrap();
        let mut b = gpio.open_output(24).unwrap();

        a.set_level(LogicLevel::High).unwrap();
        b.set_level(LogicLevel::High).unwrap();
        a.set_level(LogicLevel::Low).unwrap();

        assert_eq!(
            gpio.writes(),
            vec![
                (23, LogicLevel::High),
                (24, LogicLevel::High),
                (23, LogicLevel::Low)
            ]
        );
        assert_eq!(gpio.level(24), Some(LogicLevel::High));
        assert_eq!(gpio.level(99), None);
    }

    #[test]
    fn test_line_cannot_be_opened_twice() {
        let mut gpio = SimGpio::new();
        let _first = gpio.open_output(12).unwrap();
        assert!(matches!(
            gpio.open_output(12),
            Err(GpioError::Open { line: 12, .. })
        ));
    }

    #[test]
    fn test_injected_fault() {
        let mut gpio = SimGpio::new();
        let mut line = gpio.open_output(25).unwrap();
        gpio.fail_line(25);

        let err = line.set_level(LogicLevel::High).unwrap_err();
        assert!(matches!(err, GpioError::ActuationFault { line: 25, .. }));
        assert_eq!(line.level(), LogicLevel::Low);

        gpio.heal_line(25);
        line.set_level(LogicLevel::High).unwrap();
        assert_eq!(line.level(), LogicLevel::High);
    }
}
