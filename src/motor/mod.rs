// Motor control for the two-motor differential base
//
// Provides:
// - H-bridge channel driver (two direction lines + enable)
// - Differential steering table (direction -> left/right commands)
// - Drive controller owning both channels

mod drive;
pub mod hbridge;
pub mod steering;

pub use drive::{DriveController, Motor};
pub use hbridge::{MotorCommand, MotorDriver, PinSelector};
pub use steering::{pair_for_direction, steer, DrivePair, DEFAULT_DEADZONE};
