// Thin UI shells around the control loop
//
// - terminal: raw-mode key toggles for the left motor lines + frame log
// - publish: zenoh publisher for state snapshots (publish only)

pub mod publish;
pub mod terminal;

use crate::motor::PinSelector;

/// Requests the UI shell sends into the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    /// Flip one of the left motor's lines
    Toggle(PinSelector),
    Quit,
}
