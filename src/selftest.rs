// Startup wiring check: spin right, spin left, stop
//
// Gives a human watching the robot a visible confirmation that every bridge
// is wired with the right polarity. Nothing consumes the outcome besides the
// status text.

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::gpio;
use crate::motor::{DriveController, DrivePair};

/// Patterns held for one dwell each, followed by a stop
pub const SELF_TEST_SEQUENCE: [DrivePair; 2] = [DrivePair::SPIN_RIGHT, DrivePair::SPIN_LEFT];

/// Run the sequence once. `observe` is called after every step so the UI
/// shell can mirror the lines.
///
/// The activity flag is raised for the whole run and always cleared at the
/// end, even when a write fails part way.
pub async fn run<F>(drive: &mut DriveController, dwell: Duration, mut observe: F) -> gpio::Result<()>
where
    F: FnMut(&DriveController),
{
    info!("Self-test: {:?} per pattern", dwell);
    drive.set_active(true);

    let mut result = Ok(());
    for pair in SELF_TEST_SEQUENCE {
        result = drive.drive(pair);
        observe(drive);
        if result.is_err() {
            break;
        }
        sleep(dwell).await;
    }

    // Stop regardless of how the patterns went
    let stopped = drive.drive(DrivePair::STOP);
    drive.set_active(false);
    observe(drive);

    result.and(stopped)?;
    info!("Self-test complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PinLayout;
    use crate::gpio::SimGpio;
    use crate::motor::MotorCommand;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_sequence_order_and_dwell() {
        let mut gpio = SimGpio::new();
        let mut drive = DriveController::open(&mut gpio, &PinLayout::V1, 5000).unwrap();
        let start = Instant::now();
        let mut steps = Vec::new();

        run(&mut drive, Duration::from_millis(200), |d| {
            steps.push((start.elapsed(), d.state()))
        })
        .await
        .unwrap();

        let commands: Vec<_> = steps.iter().map(|(_, s)| (s.left, s.right)).collect();
        assert_eq!(
            commands,
            vec![
                (MotorCommand::Forward, MotorCommand::Reverse),
                (MotorCommand::Reverse, MotorCommand::Forward),
                (MotorCommand::Stop, MotorCommand::Stop),
            ]
        );
        let held = |from: usize, to: usize| steps[to].0 - steps[from].0;
        let dwell = Duration::from_millis(200)..Duration::from_millis(205);
        assert!(steps[0].0 < Duration::from_millis(1));
        assert!(dwell.contains(&held(0, 1)), "right turn held {:?}", held(0, 1));
        assert!(dwell.contains(&held(1, 2)), "left turn held {:?}", held(1, 2));

        assert!(steps[0].1.is_active && steps[1].1.is_active);
        assert!(!steps[2].1.is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_still_stops_and_clears_activity() {
        let mut gpio = SimGpio::new();
        let mut drive = DriveController::open(&mut gpio, &PinLayout::V1, 5000).unwrap();
        gpio.fail_line(PinLayout::V1.right.dir_b);

        let result = run(&mut drive, Duration::from_millis(200), |_| {}).await;

        assert!(result.is_err());
        assert!(!drive.state().is_active);
        assert_eq!(
            gpio.level(PinLayout::V1.left.enable),
            Some(crate::gpio::LogicLevel::Low)
        );
    }
}
