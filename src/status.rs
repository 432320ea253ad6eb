// Status LED: steady on while idle, square-wave blink while driving
//
// Runs on its own timer and owns the LED line exclusively. The only input is
// the activity flag published by the drive controller.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::gpio::{self, LogicLevel, OutputLine};
use crate::messages::DriveState;

/// Next LED level from the previous one and the activity flag
pub fn next_level(previous: LogicLevel, is_active: bool) -> LogicLevel {
    if is_active {
        previous.inverted()
    } else {
        LogicLevel::High
    }
}

pub struct StatusIndicator {
    led: Box<dyn OutputLine>,
    activity: watch::Receiver<DriveState>,
}

impl StatusIndicator {
    pub fn new(led: Box<dyn OutputLine>, activity: watch::Receiver<DriveState>) -> Self {
        Self { led, activity }
    }

    /// One timer tick. Only writes when the level actually changes.
    pub fn tick(&mut self) -> gpio::Result<LogicLevel> {
        let is_active = self.activity.borrow().is_active;
        let previous = self.led.level();
        let next = next_level(previous, is_active);
        if next != previous {
            self.led.set_level(next)?;
        }
        Ok(next)
    }

    /// Tick forever at `period`. A failed write is logged once per fault
    /// streak and retried on the next tick.
    pub async fn run(mut self, period: Duration) {
        info!(
            "Status LED on line {} ({}ms period)",
            self.led.line(),
            period.as_millis()
        );
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut faulted = false;

        loop {
            tick.tick().await;
            match self.tick() {
                Ok(_) => faulted = false,
                Err(e) => {
                    if !faulted {
                        warn!("Status LED write failed: {}", e);
                    }
                    faulted = true;
                }
            }
        }
    }
}
