// High-level drive controller for the two-motor base
//
// Owns both H-bridge channels, turns controller vectors into command pairs
// and publishes the resulting DriveState for the status LED and UI shell.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::hbridge::{MotorCommand, MotorDriver, PinSelector};
use super::steering::{steer, DrivePair};
use crate::config::PinLayout;
use crate::gpio::{self, GpioBackend, LogicLevel};
use crate::messages::{ControllerVector, DriveState, PinLevels};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    Left,
    Right,
}

pub struct DriveController {
    left: MotorDriver,
    right: MotorDriver,
    deadzone: u32,
    state: watch::Sender<DriveState>,
}

impl DriveController {
    pub fn new(left: MotorDriver, right: MotorDriver, deadzone: u32) -> Self {
        let (state, _) = watch::channel(DriveState::default());
        Self {
            left,
            right,
            deadzone,
            state,
        }
    }

    /// Open both motors' lines from `layout`
    pub fn open(
        backend: &mut dyn GpioBackend,
        layout: &PinLayout,
        deadzone: u32,
    ) -> gpio::Result<Self> {
        let left = MotorDriver::open(backend, "left", layout.left)?;
        let right = MotorDriver::open(backend, "right", layout.right)?;
        info!("Drive controller ready (deadzone {})", deadzone);
        Ok(Self::new(left, right, deadzone))
    }

    /// Receiver for state snapshots; readers always get a copy
    pub fn subscribe(&self) -> watch::Receiver<DriveState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> DriveState {
        *self.state.borrow()
    }

    pub fn deadzone(&self) -> u32 {
        self.deadzone
    }

    /// Map one controller sample onto both motors.
    ///
    /// Below the deadzone, or for `Direction::None`, both motors stop and
    /// the robot is no longer active.
    pub fn apply_direction(&mut self, vector: ControllerVector) -> gpio::Result<DrivePair> {
        let pair = steer(vector, self.deadzone);
        let current = self.state();
        if (current.left, current.right) != (pair.left, pair.right) {
            debug!(
                "{:?} @ {} -> left={:?} right={:?}",
                vector.direction, vector.magnitude, pair.left, pair.right
            );
        }
        self.set_active(!pair.is_stop());
        self.drive(pair)?;
        Ok(pair)
    }

    /// Apply a command pair to both motors.
    ///
    /// Both motors are always attempted, left first. The first failure is
    /// returned after the right motor has been attempted too. A motor whose
    /// write failed is published as its lines read back, since the bridge
    /// may already have been disabled part way through.
    pub fn drive(&mut self, pair: DrivePair) -> gpio::Result<()> {
        let left = self.left.set_command(pair.left);
        let right = self.right.set_command(pair.right);

        let published = DrivePair::new(
            if left.is_ok() { pair.left } else { self.left.read_command() },
            if right.is_ok() { pair.right } else { self.right.read_command() },
        );
        self.state.send_if_modified(|state| {
            let changed = (state.left, state.right) != (published.left, published.right);
            state.left = published.left;
            state.right = published.right;
            changed
        });

        left.and(right)
    }

    pub fn set_active(&mut self, active: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.is_active != active;
            state.is_active = active;
            changed
        });
    }

    pub fn stop(&mut self) -> gpio::Result<()> {
        self.set_active(false);
        self.drive(DrivePair::STOP)
    }

    /// Flip one line of `motor` directly, outside the command table.
    ///
    /// Diagnostics only: the motor may end up in a combination that
    /// `apply_direction` never produces. The published state is refreshed
    /// from `read_command`, which is lossy.
    pub fn toggle_motor_pin(
        &mut self,
        motor: Motor,
        selector: PinSelector,
    ) -> gpio::Result<LogicLevel> {
        let driver = self.motor_mut(motor);
        let level = driver.toggle(selector)?;
        let command = driver.read_command();
        self.state.send_modify(|state| match motor {
            Motor::Left => state.left = command,
            Motor::Right => state.right = command,
        });
        Ok(level)
    }

    pub fn pin_levels(&self, motor: Motor) -> PinLevels {
        self.motor(motor).levels()
    }

    pub fn read_command(&self, motor: Motor) -> MotorCommand {
        self.motor(motor).read_command()
    }

    fn motor(&self, motor: Motor) -> &MotorDriver {
        match motor {
            Motor::Left => &self.left,
            Motor::Right => &self.right,
        }
    }

    fn motor_mut(&mut self, motor: Motor) -> &mut MotorDriver {
        match motor {
            Motor::Left => &mut self.left,
            Motor::Right => &mut self.right,
        }
    }
}

impl Drop for DriveController {
    fn drop(&mut self) {
        // Never leave the bridges enabled when the controller goes away
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
