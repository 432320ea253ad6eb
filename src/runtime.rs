// Control loop: one serialized context owns both motors
//
// Input updates, shell commands and retries are all handled from a single
// select loop, so there is exactly one writer for the motor lines. The
// status LED owns its own line on a separate task and only reads the
// published drive state.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::gpio::{self, GpioBackend};
use crate::input::{InputSource, InputUpdate};
use crate::messages::{ControllerVector, DriveState, Status, UiFrame};
use crate::motor::{DriveController, Motor};
use crate::selftest;
use crate::shell::publish::SnapshotPublisher;
use crate::shell::{terminal, ShellCommand};
use crate::status::StatusIndicator;

fn frame_for(
    drive: Option<&DriveController>,
    status: &Status,
    controller: &Option<String>,
) -> UiFrame {
    UiFrame {
        status: status.clone(),
        drive: drive.map(|d| d.state()).unwrap_or_default(),
        pins: drive.map(|d| d.pin_levels(Motor::Left)),
        controller: controller.clone(),
    }
}

pub struct Runtime {
    // None when no GPIO controller was found: actuation is a no-op
    drive: Option<DriveController>,
    status: Status,
    controller: Option<String>,
    frames: watch::Sender<UiFrame>,
    // Last sample that failed to apply; retried until it sticks or is replaced
    pending: Option<ControllerVector>,
}

impl Runtime {
    pub fn new(drive: Option<DriveController>) -> Self {
        let status = if drive.is_some() {
            Status::GpioSet
        } else {
            Status::NoGpio
        };
        let frame = frame_for(drive.as_ref(), &status, &None);
        let (frames, _) = watch::channel(frame);
        info!("{}", status);
        Self {
            drive,
            status,
            controller: None,
            frames,
            pending: None,
        }
    }

    pub fn hardware_available(&self) -> bool {
        self.drive.is_some()
    }

    pub fn drive(&self) -> Option<&DriveController> {
        self.drive.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// UI frames, refreshed after every state-changing operation
    pub fn subscribe(&self) -> watch::Receiver<UiFrame> {
        self.frames.subscribe()
    }

    /// Drive state for the status LED, if there is hardware to blink
    pub fn drive_state(&self) -> Option<watch::Receiver<DriveState>> {
        self.drive.as_ref().map(|d| d.subscribe())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    // Gamepad samples arrive every poll; only wake the shells on a change
    fn publish(&self) {
        let frame = frame_for(self.drive.as_ref(), &self.status, &self.controller);
        self.frames.send_if_modified(|current| {
            if *current == frame {
                return false;
            }
            *current = frame;
            true
        });
    }

    fn set_status(&mut self, status: Status) {
        if self.status != status {
            info!("{}", status);
            self.status = status;
        }
    }

    pub fn on_input(&mut self, update: InputUpdate) {
        match update {
            InputUpdate::Sample(vector) => self.apply(vector),
            InputUpdate::Connected(name) => {
                info!("Controller connected: {}", name);
                self.controller = Some(name);
                self.publish();
            }
            InputUpdate::Disconnected(name) => {
                warn!("Controller disconnected: {}", name);
                self.controller = None;
                // Don't keep driving on a reading nobody is holding any more
                self.apply(ControllerVector::neutral());
            }
        }
    }

    /// Apply one sample through the drive controller.
    ///
    /// A failure becomes status text and the sample is kept for `retry`.
    pub fn apply(&mut self, vector: ControllerVector) {
        let Some(drive) = self.drive.as_mut() else {
            debug!("No GPIO, ignoring {:?}", vector);
            return;
        };
        match drive.apply_direction(vector) {
            Ok(_) => {
                self.pending = None;
                if matches!(self.status, Status::Error(_)) {
                    self.set_status(Status::StandingBy);
                }
            }
            Err(e) => {
                warn!("Drive update failed: {}", e);
                self.pending = Some(vector);
                self.set_status(Status::Error(e.to_string()));
            }
        }
        self.publish();
    }

    pub fn retry(&mut self) {
        if let Some(vector) = self.pending {
            debug!("Retrying {:?}", vector);
            self.apply(vector);
        }
    }

    /// Handle a shell request. Returns false when the shell asked to quit.
    pub fn on_shell(&mut self, command: ShellCommand) -> bool {
        let selector = match command {
            ShellCommand::Quit => return false,
            ShellCommand::Toggle(selector) => selector,
        };
        let Some(drive) = self.drive.as_mut() else {
            debug!("No GPIO, ignoring toggle {:?}", selector);
            return true;
        };
        match drive.toggle_motor_pin(Motor::Left, selector) {
            Ok(level) => debug!("Left {:?} -> {}", selector, level),
            Err(e) => {
                warn!("Manual toggle failed: {}", e);
                self.set_status(Status::Error(e.to_string()));
            }
        }
        self.publish();
        true
    }

    /// Startup wiring check. Failures only change the status text.
    pub async fn self_test(&mut self, lead_in: Duration, dwell: Duration) {
        let Some(drive) = self.drive.as_mut() else {
            return;
        };
        // Blink during the lead-in as well
        drive.set_active(true);
        sleep(lead_in).await;
        self.set_status(Status::MotorOn);

        let Runtime {
            drive: Some(drive),
            status,
            controller,
            frames,
            ..
        } = self
        else {
            return;
        };
        let result = selftest::run(drive, dwell, |d| {
            frames.send_replace(frame_for(Some(d), status, controller));
        })
        .await;

        match result {
            Ok(()) => self.set_status(Status::StandingBy),
            Err(e) => {
                warn!("Self-test failed: {}", e);
                self.set_status(Status::Error(e.to_string()));
            }
        }
        self.publish();
    }

    /// Run the self-test unless the operator quits first.
    ///
    /// Returns true when the self-test was cut short by `interrupt` or a
    /// shell quit; the motors are stopped in that case. Toggles sent during
    /// the self-test are dropped.
    pub async fn self_test_or_quit<F>(
        &mut self,
        lead_in: Duration,
        dwell: Duration,
        shell: &mut mpsc::Receiver<ShellCommand>,
        interrupt: F,
    ) -> bool
    where
        F: Future,
    {
        tokio::pin!(interrupt);
        let aborted = {
            let test = self.self_test(lead_in, dwell);
            tokio::pin!(test);
            loop {
                tokio::select! {
                    _ = &mut test => break false,
                    _ = &mut interrupt => {
                        info!("Interrupted during self-test");
                        break true;
                    }
                    Some(command) = shell.recv() => {
                        if command == ShellCommand::Quit {
                            info!("Quit requested during self-test");
                            break true;
                        }
                    }
                }
            }
        };
        if aborted {
            if let Some(drive) = self.drive.as_mut() {
                if let Err(e) = drive.stop() {
                    warn!("Failed to stop motors: {}", e);
                }
            }
            self.set_status(Status::StandingBy);
            self.publish();
        }
        aborted
    }

    /// Stop both motors before the process exits
    pub fn shutdown(&mut self) {
        if let Some(drive) = self.drive.as_mut() {
            if let Err(e) = drive.stop() {
                warn!("Failed to stop motors on shutdown: {}", e);
            }
        }
        self.publish();
    }
}

/// Open the motor lines and the LED line
fn open_hardware(
    backend: &mut dyn GpioBackend,
    config: &Config,
) -> gpio::Result<(DriveController, Box<dyn gpio::OutputLine>)> {
    let drive = DriveController::open(backend, &config.pins, config.deadzone)?;
    let led = backend.open_output(config.pins.led)?;
    Ok((drive, led))
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Pins: {:?}", config.pins);

    // Resolve hardware once; everything below works with or without it
    let (drive, led) = match gpio::probe(config.simulate) {
        Ok(mut backend) => {
            info!("Using {} GPIO", backend.name());
            match open_hardware(backend.as_mut(), &config) {
                Ok((drive, led)) => (Some(drive), Some(led)),
                Err(e) => {
                    warn!("{}; actuation disabled", e);
                    (None, None)
                }
            }
        }
        Err(e) => {
            warn!("{}; actuation disabled", e);
            (None, None)
        }
    };
    let mut runtime = Runtime::new(drive);

    let led_task: Option<JoinHandle<()>> = match (led, runtime.drive_state()) {
        (Some(led), Some(state)) => Some(tokio::spawn(
            StatusIndicator::new(led, state).run(config.led_period),
        )),
        _ => None,
    };

    // Shell commands; the sender is held here so recv() stays pending without a shell
    let (shell_tx, mut shell_rx) = mpsc::channel(16);
    let mut shell_tasks = Vec::new();
    // Zenoh first: a failed session must not leave the terminal in raw mode
    if config.publish {
        let publisher = SnapshotPublisher::open().await?;
        shell_tasks.push(tokio::spawn(publisher.run(runtime.subscribe())));
    }
    if config.shell {
        let (keys, renderer) = terminal::spawn(shell_tx.clone(), runtime.subscribe())?;
        shell_tasks.push(keys);
        shell_tasks.push(renderer);
    }

    let mut quit = false;
    if config.self_test {
        quit = runtime
            .self_test_or_quit(
                config.self_test_lead_in,
                config.self_test_dwell,
                &mut shell_rx,
                tokio::signal::ctrl_c(),
            )
            .await;
    }

    let mut input = InputSource::from_config(&config).unwrap_or_else(|e| {
        warn!("{}; continuing without a controller", e);
        InputSource::Idle
    });
    info!("Input source: {}", input.describe());

    let mut retry = interval(config.poll_period);
    retry.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !quit {
        tokio::select! {
            update = input.next_update() => runtime.on_input(update),
            _ = retry.tick(), if runtime.has_pending() => runtime.retry(),
            Some(command) = shell_rx.recv() => {
                if !runtime.on_shell(command) {
                    info!("Quit requested");
                    quit = true;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                quit = true;
            }
        }
    }

    input.dispose();
    runtime.shutdown();
    if let Some(task) = led_task {
        task.abort();
    }
    drop(shell_tx);
    for task in shell_tasks {
        task.abort();
    }
    Ok(())
}
