// Timer periods, deadzone, pin assignments and command-line overrides
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::motor::DEFAULT_DEADZONE;

// Status LED blink / refresh period
pub const LED_PERIOD: Duration = Duration::from_millis(30);

// Gamepad snapshot poll period
pub const GAMEPAD_POLL_PERIOD: Duration = Duration::from_millis(30);

// HID rescan period while no controller is bound
pub const HID_RESCAN_PERIOD: Duration = Duration::from_secs(3);

// Self-test timing
pub const SELF_TEST_LEAD_IN: Duration = Duration::from_millis(1000);
pub const SELF_TEST_DWELL: Duration = Duration::from_millis(200);

// Zenoh topics (publish only)
pub const TOPIC_DRIVE_STATE: &str = "robopi/state/drive";
pub const TOPIC_STATUS: &str = "robopi/state/status";

/// BCM line numbers of one H-bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorPins {
    pub dir_a: u8,
    pub dir_b: u8,
    pub enable: u8,
}

impl MotorPins {
    pub const fn new(dir_a: u8, dir_b: u8, enable: u8) -> Self {
        Self {
            dir_a,
            dir_b,
            enable,
        }
    }
}

impl FromStr for MotorPins {
    type Err = String;

    /// Parses "A,B,E", e.g. "23,24,25"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines = s
            .split(',')
            .map(|part| part.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid line number in {:?}: {}", s, e))?;
        match lines.as_slice() {
            &[dir_a, dir_b, enable] => Ok(Self::new(dir_a, dir_b, enable)),
            _ => Err(format!("expected three lines A,B,E, got {:?}", s)),
        }
    }
}

/// Full pin assignment for the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinLayout {
    pub led: u8,
    pub left: MotorPins,
    pub right: MotorPins,
}

impl PinLayout {
    /// First board revision (default)
    pub const V1: PinLayout = PinLayout {
        led: 12,
        left: MotorPins::new(23, 24, 25),
        right: MotorPins::new(0, 5, 6),
    };

    /// Second board revision
    pub const V2: PinLayout = PinLayout {
        led: 12,
        left: MotorPins::new(23, 24, 25),
        right: MotorPins::new(5, 6, 13),
    };

    /// All seven lines, for duplicate detection
    pub fn lines(&self) -> [u8; 7] {
        [
            self.led,
            self.left.dir_a,
            self.left.dir_b,
            self.left.enable,
            self.right.dir_a,
            self.right.dir_b,
            self.right.enable,
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        let lines = self.lines();
        for (i, line) in lines.iter().enumerate() {
            if lines[i + 1..].contains(line) {
                return Err(format!("line {} is assigned twice", line));
            }
        }
        Ok(())
    }
}

impl Default for PinLayout {
    fn default() -> Self {
        Self::V1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutPreset {
    V1,
    V2,
}

/// Which input source feeds the drive controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Scan for a HID gamepad/joystick and follow its events
    Hid,
    /// Poll the platform gamepad list on a short timer
    Gamepad,
    /// No controller; manual toggles only
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub pins: PinLayout,
    pub input: InputMode,
    pub deadzone: u32,
    pub led_period: Duration,
    pub poll_period: Duration,
    pub rescan_period: Duration,
    pub self_test: bool,
    pub self_test_lead_in: Duration,
    pub self_test_dwell: Duration,
    pub simulate: bool,
    pub shell: bool,
    pub publish: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: PinLayout::default(),
            input: InputMode::Hid,
            deadzone: DEFAULT_DEADZONE,
            led_period: LED_PERIOD,
            poll_period: GAMEPAD_POLL_PERIOD,
            rescan_period: HID_RESCAN_PERIOD,
            self_test: true,
            self_test_lead_in: SELF_TEST_LEAD_IN,
            self_test_dwell: SELF_TEST_DWELL,
            simulate: false,
            shell: false,
            publish: false,
        }
    }
}

/// Command line for the robopi-drive binary
#[derive(Debug, Parser)]
#[command(version, about = "Drive a two-motor robot from a game controller over GPIO")]
pub struct Args {
    /// Pin layout preset
    #[arg(long, value_enum, default_value_t = LayoutPreset::V1)]
    pub layout: LayoutPreset,

    /// Status LED line (overrides the preset)
    #[arg(long)]
    pub led: Option<u8>,

    /// Left motor lines as A,B,E (overrides the preset)
    #[arg(long)]
    pub left: Option<MotorPins>,

    /// Right motor lines as A,B,E (overrides the preset)
    #[arg(long)]
    pub right: Option<MotorPins>,

    /// Input source
    #[arg(long, value_enum, default_value_t = InputMode::Hid)]
    pub input: InputMode,

    /// Minimum stick magnitude that moves the robot
    #[arg(long, default_value_t = DEFAULT_DEADZONE)]
    pub deadzone: u32,

    #[arg(long, default_value_t = LED_PERIOD.as_millis() as u64)]
    pub led_period_ms: u64,

    #[arg(long, default_value_t = GAMEPAD_POLL_PERIOD.as_millis() as u64)]
    pub poll_period_ms: u64,

    #[arg(long, default_value_t = HID_RESCAN_PERIOD.as_secs())]
    pub rescan_secs: u64,

    /// Do not run the wiring self-test at startup
    #[arg(long)]
    pub skip_self_test: bool,

    /// Use the in-memory GPIO controller instead of real hardware
    #[arg(long)]
    pub simulate: bool,

    /// Interactive terminal shell (a/b/e toggle left motor lines, q quits)
    #[arg(long)]
    pub shell: bool,

    /// Publish state snapshots over zenoh
    #[arg(long)]
    pub publish: bool,
}

impl Args {
    pub fn into_config(self) -> Result<Config, String> {
        let mut pins = match self.layout {
            LayoutPreset::V1 => PinLayout::V1,
            LayoutPreset::V2 => PinLayout::V2,
        };
        if let Some(led) = self.led {
            pins.led = led;
        }
        if let Some(left) = self.left {
            pins.left = left;
        }
        if let Some(right) = self.right {
            pins.right = right;
        }
        pins.validate()?;

        if self.led_period_ms == 0 || self.poll_period_ms == 0 || self.rescan_secs == 0 {
            return Err("timer periods must be non-zero".to_string());
        }

        Ok(Config {
            pins,
            input: self.input,
            deadzone: self.deadzone,
            led_period: Duration::from_millis(self.led_period_ms),
            poll_period: Duration::from_millis(self.poll_period_ms),
            rescan_period: Duration::from_secs(self.rescan_secs),
            self_test: !self.skip_self_test,
            simulate: self.simulate,
            shell: self.shell,
            publish: self.publish,
            ..Config::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, String> {
        let args = Args::try_parse_from(std::iter::once("robopi-drive").chain(args.iter().copied()))
            .map_err(|e| e.to_string())?;
        args.into_config()
    }

    #[test]
    fn test_defaults_match_first_layout() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.pins, PinLayout::V1);
        assert_eq!(config.input, InputMode::Hid);
        assert_eq!(config.deadzone, 5000);
        assert_eq!(config.led_period, Duration::from_millis(30));
        assert_eq!(config.rescan_period, Duration::from_secs(3));
        assert!(config.self_test);
    }

    #[test]
    fn test_layout_preset_and_overrides() {
        let config = parse(&["--layout", "v2"]).unwrap();
        assert_eq!(config.pins.right, MotorPins::new(5, 6, 13));

        let config = parse(&["--right", "16,20,21", "--led", "26"]).unwrap();
        assert_eq!(config.pins.right, MotorPins::new(16, 20, 21));
        assert_eq!(config.pins.led, 26);
        assert_eq!(config.pins.left, MotorPins::new(23, 24, 25));
    }

    #[test]
    fn test_rejects_bad_pins() {
        assert!("23,24".parse::<MotorPins>().is_err());
        assert!("23,x,25".parse::<MotorPins>().is_err());
        // LED collides with left dirA
        assert!(parse(&["--led", "23"]).is_err());
    }

    #[test]
    fn test_rejects_zero_period() {
        assert!(parse(&["--poll-period-ms", "0"]).is_err());
    }
}
