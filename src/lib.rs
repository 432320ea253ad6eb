// Two-motor differential drive over GPIO, steered by a game controller
//
// Input source -> drive controller -> H-bridge channels -> GPIO lines,
// with a status LED blinking while the robot is driving.

pub mod config;
pub mod gpio;
pub mod input;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod selftest;
pub mod shell;
pub mod status;
