use glam::{Mat3, Vec3};

use crate::pose::Pose;

pub const PITCH_LIMIT: f64 = 90.0;
pub const DEFAULT_SENSITIVITY: f64 = 0.2;

const PITCH_STEP: f64 = 0.25;
const ROLL_STEP: f64 = 0.25;
const HEADING_STEP: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PitchUp,
    PitchDown,
    RollUp,
    RollDown,
    HeadingUp,
    HeadingDown,
    ResetView,
    ResetCorrection,
    SnapRight,
    SnapLeft,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    View,
    // Carries the new triple for reporting.
    Correction(Pose),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub view_heading: f64,
    pub view_pitch: f64,
    correction: Pose,
}

impl Orientation {
    pub fn from_pose(pose: Pose) -> Self {
        Self {
            view_heading: 0.0,
            view_pitch: 0.0,
            correction: Pose {
                heading: wrap_heading(pose.heading),
                pitch: pose.pitch.clamp(-90.0, 90.0),
                roll: pose.roll.clamp(-180.0, 180.0),
            },
        }
    }

    pub fn correction(&self) -> Pose {
        self.correction
    }

    pub fn drag(&mut self, dx: f64, dy: f64, sensitivity: f64) {
        self.view_heading += dx * sensitivity;
        // Dragging down tilts the view up, like grabbing the sphere.
        self.view_pitch -= dy * sensitivity;
        self.view_pitch = self.view_pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn apply(&mut self, command: Command) -> Effect {
        let c = &mut self.correction;
        match command {
            Command::PitchUp => c.pitch = (c.pitch + PITCH_STEP).clamp(-90.0, 90.0),
            Command::PitchDown => c.pitch = (c.pitch - PITCH_STEP).clamp(-90.0, 90.0),
            Command::RollUp => c.roll = (c.roll + ROLL_STEP).clamp(-180.0, 180.0),
            Command::RollDown => c.roll = (c.roll - ROLL_STEP).clamp(-180.0, 180.0),
            Command::HeadingUp => c.heading = wrap_heading(c.heading + HEADING_STEP),
            Command::HeadingDown => c.heading = wrap_heading(c.heading - HEADING_STEP),
            Command::ResetCorrection => *c = Pose::default(),
            Command::ResetView => {
                self.view_heading = 0.0;
                self.view_pitch = 0.0;
                return Effect::View;
            }
            Command::SnapRight => {
                self.view_heading = snap_quarter(self.view_heading) + 90.0;
                return Effect::View;
            }
            Command::SnapLeft => {
                self.view_heading = snap_quarter(self.view_heading) - 90.0;
                return Effect::View;
            }
        }
        Effect::Correction(self.correction)
    }

    // Zenith sits on model -Z; the 90° offset stands the pole axis upright.
    // Order matters: each rotation post-multiplies the ones before it.
    pub fn rotation(&self) -> Mat3 {
        let c = &self.correction;
        rotate(Vec3::X, self.view_pitch + 90.0)
            * rotate(Vec3::Z, self.view_heading)
            * rotate(Vec3::Z, c.heading)
            * rotate(Vec3::NEG_Y, c.roll)
            * rotate(Vec3::X, c.pitch)
    }
}

fn rotate(axis: Vec3, degrees: f64) -> Mat3 {
    Mat3::from_axis_angle(axis, degrees.to_radians() as f32)
}

/// Floored modulo into `[0, 360)`.
pub fn wrap_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative rounds up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

// Ties to even: round(0.5) == 0.
fn snap_quarter(heading: f64) -> f64 {
    (heading / 90.0).round_ties_even() * 90.0
}
