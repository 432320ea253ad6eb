// Define message types for the runtime

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gpio::LogicLevel;
use crate::motor::MotorCommand;

/// Largest magnitude an input source reports (full stick deflection)
pub const MAX_MAGNITUDE: u32 = 32767;

// Normalized controller direction, produced by every input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    None,
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub const ALL: [Direction; 9] = [
        Direction::None,
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];
}

/// One input sample: a direction and how far the stick is pushed.
/// Consumed immediately by the drive controller, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerVector {
    pub direction: Direction,
    pub magnitude: u32,
}

impl ControllerVector {
    pub fn new(direction: Direction, magnitude: u32) -> Self {
        Self {
            direction,
            magnitude,
        }
    }

    pub fn neutral() -> Self {
        Self::new(Direction::None, 0)
    }

    /// Full deflection in `direction` (digital inputs such as a D-pad)
    pub fn full(direction: Direction) -> Self {
        Self::new(direction, MAX_MAGNITUDE)
    }
}

/// Commanded state of both motors plus the activity flag read by the LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveState {
    pub left: MotorCommand,
    pub right: MotorCommand,
    pub is_active: bool,
}

impl Default for DriveState {
    fn default() -> Self {
        Self {
            left: MotorCommand::Stop,
            right: MotorCommand::Stop,
            is_active: false,
        }
    }
}

/// Levels of one motor's three lines, as mirrored by the UI shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinLevels {
    pub a: LogicLevel,
    pub b: LogicLevel,
    pub e: LogicLevel,
}

impl fmt::Display for PinLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A={} B={} E={}", self.a, self.b, self.e)
    }
}

/// Phase of the core, shown as free text by the UI shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NoGpio,
    GpioSet,
    MotorOn,
    StandingBy,
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NoGpio => f.write_str("No GPIO"),
            Status::GpioSet => f.write_str("GPIO set"),
            Status::MotorOn => f.write_str("Motor on"),
            Status::StandingBy => f.write_str("Standing by"),
            Status::Error(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// Snapshot handed to the UI shell after every state-changing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiFrame {
    pub status: Status,
    pub drive: DriveState,
    /// Left motor lines; None when there is no GPIO
    pub pins: Option<PinLevels>,
    /// Name of the bound controller, if any
    pub controller: Option<String>,
}

impl Default for UiFrame {
    fn default() -> Self {
        Self {
            status: Status::NoGpio,
            drive: DriveState::default(),
            pins: None,
            controller: None,
        }
    }
}
