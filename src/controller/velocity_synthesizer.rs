// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Converts the active command into a bounded Cartesian velocity.
use nalgebra::Vector6;

use crate::config::ControllerConfig;
use crate::controller::rate_limiting::TwistLimits;
use crate::controller::types::{Command, Pose, TargetPose, Twist};
use crate::utils::{array_to_isometry, pose_error, truncated_array_to_isometry};

/// Turns commands into twists. Holds only constant parameters, every call is a pure
/// function of its arguments.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VelocitySynthesizer {
    translational_gain: f64,
    rotational_gain: f64,
    limits: TwistLimits,
}

impl VelocitySynthesizer {
    /// Creates a new synthesizer.
    /// # Arguments
    /// * `translational_gain` - Gain from translation error to translational velocity in \[1/s\].
    /// * `rotational_gain` - Gain from rotation error to rotational velocity in \[1/s\].
    /// * `limits` - Limits applied to every synthesized twist.
    pub fn new(translational_gain: f64, rotational_gain: f64, limits: TwistLimits) -> Self {
        VelocitySynthesizer {
            translational_gain,
            rotational_gain,
            limits,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        VelocitySynthesizer::new(
            config.translational_gain,
            config.rotational_gain,
            config.twist_limits(),
        )
    }

    /// Computes the twist to command for this tick.
    ///
    /// * Position: proportional to the pose error between target and `current_pose`.
    /// * Velocity: the commanded twist.
    /// * Acceleration: `last_command + acceleration * dt`.
    ///
    /// The candidate is clamped in magnitude and in its change with respect to `last_command`.
    /// # Arguments
    /// * `command` - Command of the active mode.
    /// * `current_pose` - Measured end effector pose of this tick.
    /// * `last_command` - Twist committed in the previous tick.
    /// * `dt` - Control period in \[s\], strictly positive.
    pub fn synthesize(
        &self,
        command: &Command,
        current_pose: &Pose,
        last_command: &Twist,
        dt: f64,
    ) -> Twist {
        let candidate = match command {
            Command::Position(target) => {
                let error = position_error(target, current_pose);
                let mut candidate = [0.; 6];
                for i in 0..3 {
                    candidate[i] = self.translational_gain * error[i];
                    candidate[i + 3] = self.rotational_gain * error[i + 3];
                }
                candidate
            }
            Command::Velocity(cmd_vel) => *cmd_vel,
            Command::Acceleration(cmd_acc) => {
                let mut candidate = [0.; 6];
                for i in 0..6 {
                    candidate[i] = last_command[i] + cmd_acc[i] * dt;
                }
                candidate
            }
        };
        if candidate.iter().any(|x| !x.is_finite()) {
            // handled by the safety gate
            return candidate;
        }
        self.limits.limit(&candidate, last_command)
    }

    pub fn limits(&self) -> &TwistLimits {
        &self.limits
    }
}

/// Error between a target pose and the current pose.
///
/// Translation error first, followed by the rotation vector moving the current orientation
/// onto the target orientation (angle in \[0, pi\]).
pub fn position_error(target: &TargetPose, current_pose: &Pose) -> Vector6<f64> {
    pose_error(
        &truncated_array_to_isometry(target),
        &array_to_isometry(current_pose),
    )
}

/// Determines whether the end effector has reached a position target.
pub fn has_arrived(
    target: &TargetPose,
    current_pose: &Pose,
    translation_threshold: f64,
    rotation_threshold: f64,
) -> bool {
    let error = position_error(target, current_pose);
    error.fixed_rows::<3>(0).norm() < translation_threshold
        && error.fixed_rows::<3>(3).norm() < rotation_threshold
}
