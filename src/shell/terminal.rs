// Terminal shell: a/b/e toggle the left motor's lines, q quits
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::ShellCommand;
use crate::messages::UiFrame;
use crate::motor::PinSelector;

const KEY_POLL: Duration = Duration::from_millis(50);

/// Translate a key press into a shell command
pub fn map_key(key: KeyEvent) -> Option<ShellCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ShellCommand::Quit)
        }
        KeyCode::Char('a') => Some(ShellCommand::Toggle(PinSelector::DirA)),
        KeyCode::Char('b') => Some(ShellCommand::Toggle(PinSelector::DirB)),
        KeyCode::Char('e') => Some(ShellCommand::Toggle(PinSelector::Enable)),
        KeyCode::Char('q') | KeyCode::Esc => Some(ShellCommand::Quit),
        _ => None,
    }
}

/// One status line for a frame
pub fn render(frame: &UiFrame) -> String {
    let pins = frame
        .pins
        .map(|pins| pins.to_string())
        .unwrap_or_else(|| "A=- B=- E=-".to_string());
    let controller = frame.controller.as_deref().unwrap_or("no controller");
    format!(
        "[{}] {} | left={:?} right={:?} | {}",
        frame.status, pins, frame.drive.left, frame.drive.right, controller
    )
}

fn read_keys(tx: mpsc::Sender<ShellCommand>) -> std::io::Result<()> {
    while !tx.is_closed() {
        if !event::poll(KEY_POLL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if let Some(command) = map_key(key) {
                if tx.blocking_send(command).is_err() || command == ShellCommand::Quit {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Start the key reader and frame renderer
pub fn spawn(
    tx: mpsc::Sender<ShellCommand>,
    mut frames: watch::Receiver<UiFrame>,
) -> std::io::Result<(JoinHandle<()>, JoinHandle<()>)> {
    enable_raw_mode()?;
    info!("Shell: a/b/e toggle left motor lines, q quits");

    let keys = tokio::task::spawn_blocking(move || {
        if let Err(e) = read_keys(tx) {
            warn!("Shell input failed: {}", e);
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    });

    let renderer = tokio::spawn(async move {
        loop {
            let line = render(&frames.borrow_and_update());
            info!("{}", line);
            if frames.changed().await.is_err() {
                break;
            }
        }
    });

    Ok((keys, renderer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::LogicLevel;
    use crate::messages::{PinLevels, Status};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_map() {
        assert_eq!(
            map_key(press(KeyCode::Char('a'))),
            Some(ShellCommand::Toggle(PinSelector::DirA))
        );
        assert_eq!(
            map_key(press(KeyCode::Char('e'))),
            Some(ShellCommand::Toggle(PinSelector::Enable))
        );
        assert_eq!(map_key(press(KeyCode::Esc)), Some(ShellCommand::Quit));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ShellCommand::Quit)
        );
        assert_eq!(map_key(press(KeyCode::Char('x'))), None);

        let mut release = press(KeyCode::Char('a'));
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release), None);
    }

    #[test]
    fn test_render() {
        let mut frame = UiFrame::default();
        assert_eq!(
            render(&frame),
            "[No GPIO] A=- B=- E=- | left=Stop right=Stop | no controller"
        );

        frame.status = Status::StandingBy;
        frame.pins = Some(PinLevels {
            a: LogicLevel::High,
            b: LogicLevel::Low,
            e: LogicLevel::High,
        });
        frame.controller = Some("Xbox Wireless Controller".to_string());
        assert_eq!(
            render(&frame),
            "[Standing by] A=H B=L E=H | left=Stop right=Stop | Xbox Wireless Controller"
        );
    }
}
