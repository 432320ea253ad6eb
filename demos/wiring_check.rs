// Wiring check: step-by-step H-bridge test with confirmations
//
// Usage: cargo run --example wiring_check -- [v1|v2] [--simulate]
//
// Safety features:
// - Explicit confirmation before any writes
// - Each motor is run alone before both run together
// - Short pulses only; enable is dropped after every step
// - Easy abort with Ctrl+C

use std::io::{self, Write};
use std::time::Duration;

use robopi_drive::config::PinLayout;
use robopi_drive::gpio;
use robopi_drive::motor::{DriveController, DrivePair, Motor, MotorCommand};
use robopi_drive::selftest;

const PULSE: Duration = Duration::from_millis(300);
const PAUSE: Duration = Duration::from_millis(500);

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N]: ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    input.trim().eq_ignore_ascii_case("y")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let layout = if args.iter().any(|a| a == "v2") {
        PinLayout::V2
    } else {
        PinLayout::V1
    };
    let simulate = args.iter().any(|a| a == "--simulate");

    println!("Wiring check (WITH WRITES)");
    println!("This tool WILL drive the motors. Lift the wheels off the ground first.");
    println!();
    println!("Layout: {:?}", layout);
    println!();

    if !confirm("Are the robot's wheels OFF THE GROUND?") {
        println!("Please elevate the robot so the wheels can spin freely.");
        return Ok(());
    }

    // ========== STEP 1: Open lines ==========
    println!("Step 1: Opening GPIO lines...");
    let mut backend = match gpio::probe(simulate) {
        Ok(backend) => backend,
        Err(e) => {
            println!("  ✗ {}", e);
            println!("  Run on the board, or pass --simulate.");
            return Ok(());
        }
    };
    let mut drive = DriveController::open(backend.as_mut(), &layout, 0)?;
    println!("  ✓ {} GPIO, all motor lines driven Low", backend.name());
    println!();

    // ========== STEP 2: One motor at a time ==========
    println!("Step 2: Each motor alone, forward then reverse");
    if !confirm("Proceed?") {
        return Ok(());
    }
    let steps = [
        ("Left forward", DrivePair::new(MotorCommand::Forward, MotorCommand::Stop)),
        ("Left reverse", DrivePair::new(MotorCommand::Reverse, MotorCommand::Stop)),
        ("Right forward", DrivePair::new(MotorCommand::Stop, MotorCommand::Forward)),
        ("Right reverse", DrivePair::new(MotorCommand::Stop, MotorCommand::Reverse)),
    ];
    for (name, pair) in steps {
        println!("  Testing: {}...", name);
        drive.drive(pair)?;
        println!(
            "    left {}  right {}",
            drive.pin_levels(Motor::Left),
            drive.pin_levels(Motor::Right)
        );
        tokio::time::sleep(PULSE).await;
        drive.drive(DrivePair::STOP)?;
        tokio::time::sleep(PAUSE).await;
    }
    println!();

    // ========== STEP 3: Startup self-test ==========
    println!("Step 3: Startup self-test (spin right, spin left, stop)");
    if !confirm("Proceed?") {
        drive.stop()?;
        return Ok(());
    }
    selftest::run(&mut drive, Duration::from_millis(200), |d| {
        let state = d.state();
        println!("    left={:?} right={:?}", state.left, state.right);
    })
    .await?;

    println!();
    println!("If each wheel turned the way its label says, the wiring is correct.");
    println!("You can now run the controller loop with: cargo run");
    Ok(())
}
