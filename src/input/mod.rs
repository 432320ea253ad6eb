// Controller input sources
//
// Provides:
// - HID controller scan + event reader (evdev, feature "hid")
// - Polled gamepad snapshots (gilrs, feature "gamepad")
// - A single InputSource the runtime selects on, whatever the variant
//
// Every variant reduces its readings to a ControllerVector. No controller at
// all is normal operation: the source simply never yields.

pub mod axes;
pub mod gamepad;
#[cfg(feature = "hid")]
pub mod hid;

use tracing::info;

use crate::config::{Config, InputMode};
use crate::messages::ControllerVector;

pub use gamepad::{GamepadButtons, GamepadInput, GamepadReader};
#[cfg(feature = "hid")]
pub use hid::{ControllerBinding, HidInput};

/// Error types for controller access
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Access to {device} denied: {reason}")]
    DeviceAccessDenied { device: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input backend unavailable: {0}")]
    Unsupported(String),
}

/// What an input source hands to the control loop
#[derive(Debug, Clone, PartialEq)]
pub enum InputUpdate {
    /// A controller became available
    Connected(String),
    /// A new reading
    Sample(ControllerVector),
    /// The controller went away
    Disconnected(String),
}

pub enum InputSource {
    #[cfg(feature = "hid")]
    Hid(HidInput),
    Gamepad(GamepadInput),
    /// Manual toggles only
    Idle,
}

impl InputSource {
    /// Build the source selected by `config.input`
    pub fn from_config(config: &Config) -> Result<Self, InputError> {
        match config.input {
            InputMode::Hid => Self::hid(config),
            InputMode::Gamepad => Self::gamepad(config),
            InputMode::None => Ok(InputSource::Idle),
        }
    }

    #[cfg(feature = "hid")]
    fn hid(config: &Config) -> Result<Self, InputError> {
        Ok(InputSource::Hid(HidInput::new(
            config.rescan_period,
            config.deadzone,
        )))
    }

    #[cfg(not(feature = "hid"))]
    fn hid(_config: &Config) -> Result<Self, InputError> {
        Err(InputError::Unsupported(
            "built without the hid feature".to_string(),
        ))
    }

    #[cfg(feature = "gamepad")]
    fn gamepad(config: &Config) -> Result<Self, InputError> {
        let reader = gamepad::GilrsReader::new()?;
        Ok(InputSource::Gamepad(GamepadInput::new(
            Box::new(reader),
            config.poll_period,
        )))
    }

    #[cfg(not(feature = "gamepad"))]
    fn gamepad(_config: &Config) -> Result<Self, InputError> {
        Err(InputError::Unsupported(
            "built without the gamepad feature".to_string(),
        ))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            #[cfg(feature = "hid")]
            InputSource::Hid(_) => "hid",
            InputSource::Gamepad(_) => "gamepad",
            InputSource::Idle => "none",
        }
    }

    /// Next update from whichever variant is active. Cancel-safe; `Idle`
    /// never resolves.
    pub async fn next_update(&mut self) -> InputUpdate {
        match self {
            #[cfg(feature = "hid")]
            InputSource::Hid(hid) => hid.next_update().await,
            InputSource::Gamepad(gamepad) => gamepad.next_update().await,
            InputSource::Idle => std::future::pending().await,
        }
    }

    /// Release any bound controller
    pub fn dispose(&mut self) {
        match self {
            #[cfg(feature = "hid")]
            InputSource::Hid(hid) => hid.dispose(),
            InputSource::Gamepad(_) | InputSource::Idle => {}
        }
        info!("Input source {} released", self.describe());
    }
}
