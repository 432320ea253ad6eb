// Polled gamepad input
//
// Every poll tick reads a point-in-time button snapshot from the first
// connected gamepad and maps the D-pad to a direction. Up/Down win over
// Left/Right when both are held (Up+Left drives as Up).

use std::ops::BitOr;
use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info};

use super::InputUpdate;
use crate::messages::{ControllerVector, Direction};

/// Button snapshot bitmask, laid out like the platform gamepad API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadButtons(pub u32);

impl GamepadButtons {
    pub const NONE: GamepadButtons = GamepadButtons(0);
    pub const MENU: GamepadButtons = GamepadButtons(1 << 0);
    pub const VIEW: GamepadButtons = GamepadButtons(1 << 1);
    pub const A: GamepadButtons = GamepadButtons(1 << 2);
    pub const B: GamepadButtons = GamepadButtons(1 << 3);
    pub const X: GamepadButtons = GamepadButtons(1 << 4);
    pub const Y: GamepadButtons = GamepadButtons(1 << 5);
    pub const DPAD_UP: GamepadButtons = GamepadButtons(1 << 6);
    pub const DPAD_DOWN: GamepadButtons = GamepadButtons(1 << 7);
    pub const DPAD_LEFT: GamepadButtons = GamepadButtons(1 << 8);
    pub const DPAD_RIGHT: GamepadButtons = GamepadButtons(1 << 9);
    pub const LEFT_SHOULDER: GamepadButtons = GamepadButtons(1 << 10);
    pub const RIGHT_SHOULDER: GamepadButtons = GamepadButtons(1 << 11);

    pub fn contains(self, other: GamepadButtons) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for GamepadButtons {
    type Output = GamepadButtons;

    fn bitor(self, rhs: Self) -> Self {
        GamepadButtons(self.0 | rhs.0)
    }
}

/// Map a button snapshot to a controller vector.
///
/// Magnitude is all-or-nothing: full whenever any button is held, zero
/// otherwise. Holding only non-directional buttons yields `Direction::None`.
pub fn vector_from_buttons(buttons: GamepadButtons) -> ControllerVector {
    if buttons.is_empty() {
        return ControllerVector::neutral();
    }
    let direction = if buttons.contains(GamepadButtons::DPAD_UP) {
        Direction::Up
    } else if buttons.contains(GamepadButtons::DPAD_DOWN) {
        Direction::Down
    } else if buttons.contains(GamepadButtons::DPAD_LEFT) {
        Direction::Left
    } else if buttons.contains(GamepadButtons::DPAD_RIGHT) {
        Direction::Right
    } else {
        Direction::None
    };
    ControllerVector::full(direction)
}

/// Source of gamepad snapshots
pub trait GamepadReader {
    /// Buttons of the first connected gamepad, or None if none is connected
    fn read(&mut self) -> Option<GamepadButtons>;
}

pub struct GamepadInput {
    reader: Box<dyn GamepadReader>,
    poll: Interval,
    connected: bool,
    last: Option<ControllerVector>,
}

impl GamepadInput {
    pub fn new(reader: Box<dyn GamepadReader>, period: Duration) -> Self {
        let mut poll = interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Polling gamepads every {}ms", period.as_millis());
        Self {
            reader,
            poll,
            connected: false,
            last: None,
        }
    }

    /// Evaluate one snapshot.
    ///
    /// With no gamepad connected nothing is produced, except a single
    /// disconnect notice when a previously seen gamepad goes away. While one
    /// is connected every snapshot yields a sample, so the motors are brought
    /// back to the pad's reading even if something else moved the lines.
    pub fn sample(&mut self) -> Option<InputUpdate> {
        let Some(buttons) = self.reader.read() else {
            if self.connected {
                self.connected = false;
                self.last = None;
                return Some(InputUpdate::Disconnected("gamepad".to_string()));
            }
            return None;
        };

        if !self.connected {
            self.connected = true;
            return Some(InputUpdate::Connected("gamepad".to_string()));
        }

        let vector = vector_from_buttons(buttons);
        if self.last != Some(vector) {
            debug!("Gamepad buttons {:#06x} -> {:?}", buttons.0, vector.direction);
            self.last = Some(vector);
        }
        Some(InputUpdate::Sample(vector))
    }

    /// Wait for the next poll tick that produces something
    pub async fn next_update(&mut self) -> InputUpdate {
        loop {
            self.poll.tick().await;
            if let Some(update) = self.sample() {
                return update;
            }
        }
    }
}

#[cfg(feature = "gamepad")]
pub use self::gilrs_reader::GilrsReader;

#[cfg(feature = "gamepad")]
mod gilrs_reader {
    use gilrs::{Button, Gilrs};

    use super::{GamepadButtons, GamepadReader};
    use crate::input::InputError;

    const BUTTON_MAP: [(Button, GamepadButtons); 12] = [
        (Button::Start, GamepadButtons::MENU),
        (Button::Select, GamepadButtons::VIEW),
        (Button::South, GamepadButtons::A),
        (Button::East, GamepadButtons::B),
        (Button::West, GamepadButtons::X),
        (Button::North, GamepadButtons::Y),
        (Button::DPadUp, GamepadButtons::DPAD_UP),
        (Button::DPadDown, GamepadButtons::DPAD_DOWN),
        (Button::DPadLeft, GamepadButtons::DPAD_LEFT),
        (Button::DPadRight, GamepadButtons::DPAD_RIGHT),
        (Button::LeftTrigger, GamepadButtons::LEFT_SHOULDER),
        (Button::RightTrigger, GamepadButtons::RIGHT_SHOULDER),
    ];

    /// Gamepad snapshots through gilrs
    pub struct GilrsReader {
        gilrs: Gilrs,
    }

    impl GilrsReader {
        pub fn new() -> Result<Self, InputError> {
            let gilrs = Gilrs::new().map_err(|e| InputError::Unsupported(e.to_string()))?;
            Ok(Self { gilrs })
        }
    }

    impl GamepadReader for GilrsReader {
        fn read(&mut self) -> Option<GamepadButtons> {
            // Drain pending events so the cached button state is current
            while self.gilrs.next_event().is_some() {}

            let (_, pad) = self.gilrs.gamepads().find(|(_, pad)| pad.is_connected())?;
            let buttons = BUTTON_MAP
                .iter()
                .filter(|(button, _)| pad.is_pressed(*button))
                .fold(GamepadButtons::NONE, |acc, &(_, bit)| acc | bit);
            Some(buttons)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays queued snapshots, then reports no gamepad
    struct Scripted(VecDeque<Option<GamepadButtons>>);

    impl GamepadReader for Scripted {
        fn read(&mut self) -> Option<GamepadButtons> {
            self.0.pop_front().flatten()
        }
    }

    fn input(script: Vec<Option<GamepadButtons>>) -> GamepadInput {
        GamepadInput::new(
            Box::new(Scripted(script.into())),
            Duration::from_millis(30),
        )
    }

    #[test]
    fn test_dpad_priority() {
        use GamepadButtons as B;
        assert_eq!(vector_from_buttons(B::NONE), ControllerVector::neutral());
        assert_eq!(
            vector_from_buttons(B::DPAD_UP | B::DPAD_LEFT),
            ControllerVector::full(Direction::Up)
        );
        assert_eq!(
            vector_from_buttons(B::DPAD_DOWN | B::DPAD_RIGHT),
            ControllerVector::full(Direction::Down)
        );
        assert_eq!(
            vector_from_buttons(B::DPAD_LEFT | B::DPAD_RIGHT),
            ControllerVector::full(Direction::Left)
        );
        assert_eq!(
            vector_from_buttons(B::DPAD_RIGHT),
            ControllerVector::full(Direction::Right)
        );
        // Non-directional button: full magnitude, no direction
        assert_eq!(
            vector_from_buttons(B::A),
            ControllerVector::full(Direction::None)
        );
    }

    #[tokio::test]
    async fn test_no_gamepad_produces_nothing() {
        let mut input = input(vec![]);
        for _ in 0..100 {
            assert!(input.sample().is_none());
        }
    }

    #[tokio::test]
    async fn test_connect_sample_disconnect() {
        use GamepadButtons as B;
        let mut input = input(vec![
            Some(B::NONE),
            Some(B::NONE),
            Some(B::DPAD_UP),
            Some(B::DPAD_UP),
            Some(B::DPAD_LEFT),
            None,
        ]);

        assert_eq!(input.sample(), Some(InputUpdate::Connected("gamepad".into())));
        assert_eq!(
            input.sample(),
            Some(InputUpdate::Sample(ControllerVector::neutral()))
        );
        assert_eq!(
            input.sample(),
            Some(InputUpdate::Sample(ControllerVector::full(Direction::Up)))
        );
        // Held buttons are reported again on every poll
        assert_eq!(
            input.sample(),
            Some(InputUpdate::Sample(ControllerVector::full(Direction::Up)))
        );
        assert_eq!(
            input.sample(),
            Some(InputUpdate::Sample(ControllerVector::full(Direction::Left)))
        );
        assert_eq!(
            input.sample(),
            Some(InputUpdate::Disconnected("gamepad".into()))
        );
        assert_eq!(input.sample(), None);
    }
}
