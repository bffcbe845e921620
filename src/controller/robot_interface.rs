// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Defines the hardware seam between the controllers and the robot.
//!
//! A [`RobotHardware`] hands out the command and state handles a controller needs while it
//! is initialized. Once acquired, the handles are exclusively owned by the controller and
//! only touched from the control loop thread.
#[cfg(test)]
use mockall::automock;

use crate::controller::robot_state::RobotState;
use crate::controller::types::Twist;

/// Handle which commits a Cartesian velocity command to the motor controller.
#[cfg_attr(test, automock)]
pub trait VelocityCartesianHandle: Send {
    /// Sets the commanded end effector twist, linear part first.
    fn set_command(&mut self, command: &Twist);
}

/// Handle which provides the latest robot state.
#[cfg_attr(test, automock)]
pub trait FrankaStateHandle: Send {
    fn robot_state(&self) -> RobotState;
}

/// Handle of a single position controlled joint.
#[cfg_attr(test, automock)]
pub trait PositionJointHandle: Send {
    /// Measured joint position in \[rad\].
    fn position(&self) -> f64;
    /// Sets the commanded joint position in \[rad\].
    fn set_command(&mut self, command: f64);
}

/// Resolves hardware handles by name. Returns `None` if a handle is not available.
#[cfg_attr(test, automock)]
pub trait RobotHardware {
    fn velocity_cartesian_handle(&mut self, name: &str)
        -> Option<Box<dyn VelocityCartesianHandle>>;
    fn state_handle(&mut self, name: &str) -> Option<Box<dyn FrankaStateHandle>>;
    fn position_joint_handle(&mut self, joint_name: &str) -> Option<Box<dyn PositionJointHandle>>;
}
