// Event-driven HID controller input (evdev)
//
// Until a controller is bound, /dev/input is rescanned on a fixed period for
// a generic-desktop gamepad or joystick. The scan is blocking, so it runs on
// the blocking pool while the rescan timer is held. Once a device opens, a
// reader task turns its axis events into direction vectors and the scan
// timer is retired for good.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use evdev::{AbsoluteAxisType, Device, InputEventKind, Key};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::axes::{Axis, AxisRange, AxisState, DirectionFilter};
use super::{InputError, InputUpdate};

/// Where evdev nodes live
pub const INPUT_DEVICE_DIR: &str = "/dev/input";

/// A controller found by a scan, not yet reading
pub trait Controller: Send {
    fn name(&self) -> &str;

    fn path(&self) -> &Path;

    /// Start the reader task. Updates go to `tx` whenever the direction changes.
    fn start(
        self: Box<Self>,
        deadzone: u32,
        tx: mpsc::Sender<InputUpdate>,
    ) -> Result<JoinHandle<()>, InputError>;
}

/// An evdev node that passed the controller check
pub struct FoundDevice {
    path: PathBuf,
    name: String,
    device: Device,
}

pub enum ScanOutcome {
    Found(Box<dyn Controller>),
    /// Nothing usable; `denied` nodes could not be opened for lack of access
    NotFound { denied: usize },
}

/// One blocking pass over the device nodes
pub type Scanner = Arc<dyn Fn() -> Result<ScanOutcome, InputError> + Send + Sync>;

/// Gamepads report face buttons, joysticks a trigger; both need an X/Y stick
fn is_controller(device: &Device) -> bool {
    let has_buttons = device.supported_keys().is_some_and(|keys| {
        keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER)
    });
    let has_stick = device.supported_absolute_axes().is_some_and(|axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    });
    has_buttons && has_stick
}

/// Open every event node under `dir` and return the first controller
pub fn scan_blocking(dir: &Path) -> Result<ScanOutcome, InputError> {
    // Not evdev::enumerate(): it silently skips nodes it cannot open, and
    // those are what DeviceAccessDenied reports
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("event"))
        })
        .collect();
    paths.sort();

    let mut denied = 0;
    for path in paths {
        match Device::open(&path) {
            Ok(device) if is_controller(&device) => {
                let name = device.name().unwrap_or("unnamed controller").to_string();
                let found = FoundDevice { path, name, device };
                return Ok(ScanOutcome::Found(Box::new(found)));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!("{}: {}", path.display(), e);
                denied += 1;
            }
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(ScanOutcome::NotFound { denied })
}

fn axis_for(kind: AbsoluteAxisType) -> Option<Axis> {
    match kind {
        AbsoluteAxisType::ABS_X => Some(Axis::StickX),
        AbsoluteAxisType::ABS_Y => Some(Axis::StickY),
        AbsoluteAxisType::ABS_HAT0X => Some(Axis::HatX),
        AbsoluteAxisType::ABS_HAT0Y => Some(Axis::HatY),
        _ => None,
    }
}

/// Axis ranges as reported by the device, falling back to the usual ones
fn axis_state(device: &Device) -> AxisState {
    let Ok(info) = device.get_abs_state() else {
        return AxisState::default();
    };
    let range = |axis: AbsoluteAxisType, fallback: AxisRange| {
        let abs = &info[axis.0 as usize];
        if abs.maximum > abs.minimum {
            AxisRange::new(abs.minimum, abs.maximum)
        } else {
            fallback
        }
    };
    AxisState::new(
        range(AbsoluteAxisType::ABS_X, AxisRange::STICK),
        range(AbsoluteAxisType::ABS_Y, AxisRange::STICK),
        range(AbsoluteAxisType::ABS_HAT0X, AxisRange::HAT),
        range(AbsoluteAxisType::ABS_HAT0Y, AxisRange::HAT),
    )
}

impl Controller for FoundDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn start(
        self: Box<Self>,
        deadzone: u32,
        tx: mpsc::Sender<InputUpdate>,
    ) -> Result<JoinHandle<()>, InputError> {
        let FoundDevice { name, device, .. } = *self;
        let mut axes = axis_state(&device);
        let mut stream = device.into_event_stream()?;
        let mut filter = DirectionFilter::new(deadzone);

        Ok(tokio::spawn(async move {
            loop {
                let event = match stream.next_event().await {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Controller {} read failed: {}", name, e);
                        let _ = tx.send(InputUpdate::Disconnected(name)).await;
                        return;
                    }
                };
                match event.kind() {
                    InputEventKind::AbsAxis(kind) => {
                        if let Some(axis) = axis_for(kind) {
                            axes.set(axis, event.value());
                        }
                    }
                    InputEventKind::Synchronization(_) => {
                        if let Some(vector) = filter.accept(axes.vector()) {
                            if tx.send(InputUpdate::Sample(vector)).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }))
    }
}

/// A bound controller and its reader task. Dropping it stops the reader.
pub struct ControllerBinding {
    name: String,
    path: PathBuf,
    reader: JoinHandle<()>,
}

impl ControllerBinding {
    pub fn bind(
        found: Box<dyn Controller>,
        deadzone: u32,
        tx: mpsc::Sender<InputUpdate>,
    ) -> Result<Self, InputError> {
        let name = found.name().to_string();
        let path = found.path().to_path_buf();
        let reader = found.start(deadzone, tx)?;
        Ok(Self { name, path, reader })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControllerBinding {
    fn drop(&mut self) {
        self.reader.abort();
        debug!("Released controller {}", self.name);
    }
}

async fn join_scan(
    scan: &mut Option<JoinHandle<Result<ScanOutcome, InputError>>>,
) -> Result<Result<ScanOutcome, InputError>, JoinError> {
    match scan {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// HID input source: scan until bound, then forward the reader's updates
pub struct HidInput {
    source: String,
    scanner: Scanner,
    deadzone: u32,
    rescan: Interval,
    scanning: bool,
    scan: Option<JoinHandle<Result<ScanOutcome, InputError>>>,
    binding: Option<ControllerBinding>,
    tx: mpsc::Sender<InputUpdate>,
    rx: mpsc::Receiver<InputUpdate>,
    denied: usize,
}

impl HidInput {
    pub fn new(period: Duration, deadzone: u32) -> Self {
        Self::with_device_dir(INPUT_DEVICE_DIR, period, deadzone)
    }

    pub fn with_device_dir(dir: impl Into<PathBuf>, period: Duration, deadzone: u32) -> Self {
        let dir = dir.into();
        let source = dir.display().to_string();
        let scanner: Scanner = Arc::new(move || scan_blocking(&dir));
        Self::with_scanner(source, scanner, period, deadzone)
    }

    /// Scan with `scanner` on the blocking pool; `source` names it in logs
    pub fn with_scanner(
        source: impl Into<String>,
        scanner: Scanner,
        period: Duration,
        deadzone: u32,
    ) -> Self {
        let mut rescan = interval_at(Instant::now() + period, period);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let (tx, rx) = mpsc::channel(16);
        let source = source.into();
        info!(
            "Scanning {} for controllers every {}s",
            source,
            period.as_secs_f32()
        );
        Self {
            source,
            scanner,
            deadzone,
            rescan,
            scanning: true,
            scan: None,
            binding: None,
            tx,
            rx,
            denied: 0,
        }
    }

    /// False once a controller has been bound
    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn binding(&self) -> Option<&ControllerBinding> {
        self.binding.as_ref()
    }

    /// Wait for the next update. Cancel-safe.
    pub async fn next_update(&mut self) -> InputUpdate {
        loop {
            tokio::select! {
                _ = self.rescan.tick(), if self.scanning && self.scan.is_none() => {
                    let scanner = self.scanner.clone();
                    self.scan = Some(tokio::task::spawn_blocking(move || scanner()));
                }
                joined = join_scan(&mut self.scan) => {
                    self.scan = None;
                    if let Some(update) = self.on_scan_result(joined) {
                        return update;
                    }
                    // Nothing bound: resume the timer from now
                    self.rescan.reset();
                }
                Some(update) = self.rx.recv() => {
                    if let InputUpdate::Disconnected(_) = &update {
                        self.dispose();
                    }
                    return update;
                }
            }
        }
    }

    fn on_scan_result(
        &mut self,
        joined: Result<Result<ScanOutcome, InputError>, JoinError>,
    ) -> Option<InputUpdate> {
        match joined {
            Ok(Ok(ScanOutcome::Found(found))) => {
                info!("Found controller {} at {}", found.name(), found.path().display());
                match ControllerBinding::bind(found, self.deadzone, self.tx.clone()) {
                    Ok(binding) => {
                        let name = binding.name().to_string();
                        self.binding = Some(binding);
                        self.scanning = false;
                        Some(InputUpdate::Connected(name))
                    }
                    Err(e) => {
                        warn!("Failed to connect to the controller: {}", e);
                        None
                    }
                }
            }
            Ok(Ok(ScanOutcome::NotFound { denied })) => {
                if let Some(e) = self.access_denied(denied) {
                    warn!("{}", e);
                }
                None
            }
            Ok(Err(e)) => {
                warn!("Controller scan failed: {}", e);
                None
            }
            Err(e) => {
                warn!("Controller scan task failed: {}", e);
                None
            }
        }
    }

    /// Reported once per change in the number of unreadable nodes
    fn access_denied(&mut self, denied: usize) -> Option<InputError> {
        let changed = denied != self.denied;
        self.denied = denied;
        (changed && denied > 0).then(|| InputError::DeviceAccessDenied {
            device: format!("{} node(s) under {}", denied, self.source),
            reason: "permission denied".to_string(),
        })
    }

    /// Release the bound controller, if any. Scanning stays retired.
    pub fn dispose(&mut self) {
        if let Some(binding) = self.binding.take() {
            info!("Releasing controller {}", binding.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::messages::{ControllerVector, Direction};

    /// Forwards whatever the test pushes into `events`
    struct FakeController {
        events: mpsc::Receiver<InputUpdate>,
    }

    impl Controller for FakeController {
        fn name(&self) -> &str {
            "fake pad"
        }

        fn path(&self) -> &Path {
            Path::new("/dev/input/event7")
        }

        fn start(
            self: Box<Self>,
            _deadzone: u32,
            tx: mpsc::Sender<InputUpdate>,
        ) -> Result<JoinHandle<()>, InputError> {
            let mut events = self.events;
            Ok(tokio::spawn(async move {
                while let Some(update) = events.recv().await {
                    if tx.send(update).await.is_err() {
                        return;
                    }
                }
            }))
        }
    }

    /// Scanner that finds the fake controller on its first pass only
    fn finds_once(scans: Arc<AtomicUsize>) -> (Scanner, mpsc::Sender<InputUpdate>) {
        let (events_tx, events) = mpsc::channel(4);
        let controller = Mutex::new(Some(FakeController { events }));
        let scanner: Scanner = Arc::new(move || {
            scans.fetch_add(1, Ordering::SeqCst);
            Ok(match controller.lock().unwrap().take() {
                Some(found) => ScanOutcome::Found(Box::new(found)),
                None => ScanOutcome::NotFound { denied: 0 },
            })
        });
        (scanner, events_tx)
    }

    const RESCAN: Duration = Duration::from_millis(100);

    fn empty_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("robopi-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_scan_empty_dir() {
        let dir = empty_dir("scan");
        std::fs::write(dir.join("js0"), b"").unwrap();
        let outcome = scan_blocking(&dir).unwrap();
        assert!(matches!(outcome, ScanOutcome::NotFound { denied: 0 }));
    }

    #[test]
    fn test_scan_missing_dir_is_error() {
        let dir = std::env::temp_dir().join("robopi-does-not-exist");
        assert!(matches!(scan_blocking(&dir), Err(InputError::Io(_))));
    }

    #[tokio::test]
    async fn test_no_device_never_updates() {
        let dir = empty_dir("idle");
        let mut input = HidInput::with_device_dir(&dir, Duration::from_millis(20), 5000);

        // Several rescans go by without producing anything
        let result = tokio::time::timeout(Duration::from_millis(150), input.next_update()).await;
        assert!(result.is_err());
        assert!(input.binding().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bind_once_and_never_rescan() {
        let scans = Arc::new(AtomicUsize::new(0));
        let (scanner, events) = finds_once(scans.clone());
        let mut input = HidInput::with_scanner("fake", scanner, RESCAN, 5000);

        assert_eq!(input.next_update().await, InputUpdate::Connected("fake pad".into()));
        assert!(!input.is_scanning());
        assert_eq!(input.binding().map(|b| b.name()), Some("fake pad"));

        let up = ControllerVector::full(Direction::Up);
        events.send(InputUpdate::Sample(up)).await.unwrap();
        assert_eq!(input.next_update().await, InputUpdate::Sample(up));

        // Many rescan periods go by without another scan
        let idle = tokio::time::timeout(RESCAN * 50, input.next_update()).await;
        assert!(idle.is_err());
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_releases_without_rescanning() {
        let scans = Arc::new(AtomicUsize::new(0));
        let (scanner, events) = finds_once(scans.clone());
        let mut input = HidInput::with_scanner("fake", scanner, RESCAN, 5000);
        input.next_update().await;

        events
            .send(InputUpdate::Disconnected("fake pad".into()))
            .await
            .unwrap();
        assert!(matches!(input.next_update().await, InputUpdate::Disconnected(_)));
        assert!(input.binding().is_none());
        assert!(!input.is_scanning());

        let idle = tokio::time::timeout(RESCAN * 50, input.next_update()).await;
        assert!(idle.is_err());
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_overlapping_scans() {
        let scans = Arc::new(AtomicUsize::new(0));
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let gate = Mutex::new(gate);
        let counter = scans.clone();
        // The first scan blocks until released; later ones return at once
        let scanner: Scanner = Arc::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                let _ = gate.lock().unwrap().recv();
            }
            Ok(ScanOutcome::NotFound { denied: 0 })
        });
        let mut input =
            HidInput::with_scanner("slow", scanner, Duration::from_millis(10), 5000);

        let pending = tokio::time::timeout(Duration::from_millis(100), input.next_update()).await;
        assert!(pending.is_err());
        assert_eq!(scans.load(Ordering::SeqCst), 1);

        // Once the slow scan returns with nothing, the timer resumes
        release.send(()).unwrap();
        let resumed = tokio::time::timeout(Duration::from_millis(200), input.next_update()).await;
        assert!(resumed.is_err());
        assert!(scans.load(Ordering::SeqCst) >= 2);
        assert!(input.is_scanning());
    }

    #[tokio::test]
    async fn test_access_denied_reported_on_change() {
        let scanner: Scanner = Arc::new(|| Ok(ScanOutcome::NotFound { denied: 0 }));
        let mut input = HidInput::with_scanner("/dev/input", scanner, RESCAN, 5000);

        match input.access_denied(2) {
            Some(InputError::DeviceAccessDenied { device, .. }) => {
                assert_eq!(device, "2 node(s) under /dev/input");
            }
            other => panic!("expected DeviceAccessDenied, got {:?}", other),
        }
        // Same count again is not repeated; clearing is silent
        assert!(input.access_denied(2).is_none());
        assert!(input.access_denied(0).is_none());
        assert!(input.access_denied(3).is_some());
    }
}
