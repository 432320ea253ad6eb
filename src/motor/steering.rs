// Differential steering for the two-motor base
// Maps a controller direction to a (left, right) motor command pair.
//
// There is no speed control, so diagonals collapse to the vertical cardinal
// (UpLeft drives like Up) and Left/Right turn in place.

use crate::messages::{ControllerVector, Direction};

use super::hbridge::MotorCommand;

/// Default deadzone on the controller's native analog range
pub const DEFAULT_DEADZONE: u32 = 5000;

/// Commands for both motors, applied together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivePair {
    pub left: MotorCommand,
    pub right: MotorCommand,
}

impl DrivePair {
    pub const STOP: DrivePair = DrivePair::new(MotorCommand::Stop, MotorCommand::Stop);
    pub const FORWARD: DrivePair = DrivePair::new(MotorCommand::Forward, MotorCommand::Forward);
    pub const REVERSE: DrivePair = DrivePair::new(MotorCommand::Reverse, MotorCommand::Reverse);
    /// Turn in place to the left
    pub const SPIN_LEFT: DrivePair = DrivePair::new(MotorCommand::Reverse, MotorCommand::Forward);
    /// Turn in place to the right
    pub const SPIN_RIGHT: DrivePair = DrivePair::new(MotorCommand::Forward, MotorCommand::Reverse);

    pub const fn new(left: MotorCommand, right: MotorCommand) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// Fixed direction table
pub fn pair_for_direction(direction: Direction) -> DrivePair {
    match direction {
        Direction::Up | Direction::UpLeft | Direction::UpRight => DrivePair::FORWARD,
        Direction::Down | Direction::DownLeft | Direction::DownRight => DrivePair::REVERSE,
        Direction::Left => DrivePair::SPIN_LEFT,
        Direction::Right => DrivePair::SPIN_RIGHT,
        Direction::None => DrivePair::STOP,
    }
}

/// Apply the deadzone, then the direction table
pub fn steer(vector: ControllerVector, deadzone: u32) -> DrivePair {
    if vector.magnitude < deadzone {
        return DrivePair::STOP;
    }
    pair_for_direction(vector.direction)
}
