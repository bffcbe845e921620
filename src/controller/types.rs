// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the command and mode types exchanged between the command channels and the
//! control loop.
//!
//! All layouts are part of the wire contract with upstream command producers:
//! * poses are 4x4 homogeneous matrices in column-major format (16 values)
//! * target poses omit the last row of the homogeneous matrix (12 values, column-major)
//! * twists are ordered (vx, vy, vz, wx, wy, wz)
//! * wrenches are ordered (fx, fy, fz, mx, my, mz)
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// End effector pose as 4x4 matrix in column-major format.
pub type Pose = [f64; 16];
/// Target end effector pose as 3x4 matrix in column-major format.
pub type TargetPose = [f64; 12];
/// Cartesian velocity or acceleration, linear part first.
pub type Twist = [f64; 6];
/// Force and torque, force part first.
pub type Wrench = [f64; 6];

/// Target pose used before any command has been received: identity rotation, zero translation.
pub static DEFAULT_TARGET_POSE: TargetPose = [1., 0., 0., 0., 1., 0., 0., 0., 1., 0., 0., 0.];

/// The three mutually exclusive command modes.
#[derive(
    Serialize_repr, Deserialize_repr, Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, ToPrimitive,
)]
#[repr(u8)]
pub enum ControlMode {
    /// Regulate the end effector towards a target pose.
    Position = 0,
    /// Pass a target twist through.
    Velocity = 1,
    /// Integrate a target Cartesian acceleration onto the last commanded twist.
    AccelerationModel = 2,
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::Position
    }
}

/// The authoritative command. Mode and payload are one value, so they can never disagree.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum Command {
    Position(TargetPose),
    Velocity(Twist),
    Acceleration(Twist),
}

impl Command {
    /// the mode this command belongs to
    pub fn mode(&self) -> ControlMode {
        match self {
            Command::Position(_) => ControlMode::Position,
            Command::Velocity(_) => ControlMode::Velocity,
            Command::Acceleration(_) => ControlMode::AccelerationModel,
        }
    }
}

impl Default for Command {
    fn default() -> Self {
        Command::Position(DEFAULT_TARGET_POSE)
    }
}
