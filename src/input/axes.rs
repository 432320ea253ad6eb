// Analog axis -> direction vector conversion for HID controllers
//
// Raw axis values are normalized to a centered +-32767 range, the stick
// vector is split into eight 45 degree sectors, and a D-pad (hat) press
// overrides the stick with full deflection.

use crate::messages::{ControllerVector, Direction, MAX_MAGNITUDE};

/// Axes the HID reader cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    StickX,
    StickY,
    HatX,
    HatY,
}

/// Reported range of one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    /// Typical gamepad stick range
    pub const STICK: AxisRange = AxisRange {
        min: -32768,
        max: 32767,
    };
    pub const HAT: AxisRange = AxisRange { min: -1, max: 1 };

    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Map `raw` into -32767..=32767 with the range midpoint at 0
    pub fn normalize(&self, raw: i32) -> i32 {
        let span = i64::from(self.max) - i64::from(self.min);
        if span <= 0 {
            return 0;
        }
        let offset = 2 * i64::from(raw) - i64::from(self.min) - i64::from(self.max);
        let scaled = offset * i64::from(MAX_MAGNITUDE) / span;
        scaled.clamp(-i64::from(MAX_MAGNITUDE), i64::from(MAX_MAGNITUDE)) as i32
    }
}

/// Vector for a normalized (x, y) pair. Positive y points down, as HID
/// devices report it.
pub fn vector_from_axes(x: i32, y: i32) -> ControllerVector {
    if x == 0 && y == 0 {
        return ControllerVector::neutral();
    }
    let (fx, fy) = (f64::from(x), -f64::from(y));
    let magnitude = fx.hypot(fy).round() as u32;

    // Sector 0 is centered on +x, counting counter-clockwise
    let degrees = fy.atan2(fx).to_degrees();
    let sector = ((degrees + 22.5).rem_euclid(360.0) / 45.0) as u32 % 8;
    let direction = match sector {
        0 => Direction::Right,
        1 => Direction::UpRight,
        2 => Direction::Up,
        3 => Direction::UpLeft,
        4 => Direction::Left,
        5 => Direction::DownLeft,
        6 => Direction::Down,
        _ => Direction::DownRight,
    };
    ControllerVector::new(direction, magnitude)
}

/// Latest value of every tracked axis
#[derive(Debug, Clone)]
pub struct AxisState {
    ranges: [AxisRange; 4],
    values: [i32; 4],
}

impl AxisState {
    pub fn new(stick_x: AxisRange, stick_y: AxisRange, hat_x: AxisRange, hat_y: AxisRange) -> Self {
        Self {
            ranges: [stick_x, stick_y, hat_x, hat_y],
            values: [0; 4],
        }
    }

    fn index(axis: Axis) -> usize {
        match axis {
            Axis::StickX => 0,
            Axis::StickY => 1,
            Axis::HatX => 2,
            Axis::HatY => 3,
        }
    }

    pub fn set(&mut self, axis: Axis, raw: i32) {
        let i = Self::index(axis);
        self.values[i] = self.ranges[i].normalize(raw);
    }

    pub fn vector(&self) -> ControllerVector {
        let [stick_x, stick_y, hat_x, hat_y] = self.values;
        if hat_x != 0 || hat_y != 0 {
            let hat = vector_from_axes(hat_x.signum(), hat_y.signum());
            return ControllerVector::full(hat.direction);
        }
        vector_from_axes(stick_x, stick_y)
    }
}

impl Default for AxisState {
    fn default() -> Self {
        Self::new(
            AxisRange::STICK,
            AxisRange::STICK,
            AxisRange::HAT,
            AxisRange::HAT,
        )
    }
}

/// Passes a vector on only when the effective direction changes.
///
/// Below the deadzone every direction counts as None, so stick jitter around
/// the center does not flood the control loop.
#[derive(Debug, Clone)]
pub struct DirectionFilter {
    deadzone: u32,
    last: Option<Direction>,
}

impl DirectionFilter {
    pub fn new(deadzone: u32) -> Self {
        Self {
            deadzone,
            last: None,
        }
    }

    pub fn accept(&mut self, vector: ControllerVector) -> Option<ControllerVector> {
        let effective = if vector.magnitude < self.deadzone {
            Direction::None
        } else {
            vector.direction
        };
        if self.last == Some(effective) {
            return None;
        }
        self.last = Some(effective);
        Some(vector)
    }
}
