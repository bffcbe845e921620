// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # franka-controllers
//! A Cartesian velocity controller for [Franka Emika](https://franka.de) research robots which
//! can be steered by target poses, target velocities and target accelerations, for example from
//! a joystick or a visual servoing node.
//!
//! **ALWAYS HAVE THE USER STOP BUTTON AT
//! HAND WHILE CONTROLLING THE ROBOT!**
//!
//! ## Design
//! The library is divided into the following modules:
//! * [controller](`crate::controller`) - the Cartesian velocity controller, its command channels
//! and the real-time loop driving it.
//! * [homing](`crate::homing`) - a joint position controller which brings the arm to a home pose.
//! * [config](`crate::config`) - parameters and their loading from TOML files.
//!
//! Every tick the controller
//! 1. reads the latest command from its [`CommandChannels`],
//! 2. turns it into a twist which is bounded in magnitude and in its change per tick,
//! 3. lets the safety gate replace it with a deceleration if the end effector is in contact or
//! the inputs are unusable,
//! 4. commits the twist to the robot.
//!
//! Commands can be written from any thread at any time. The last written command decides the
//! mode:
//! * target pose: the twist is proportional to the pose error.
//! * target velocity: the twist follows the velocity.
//! * target acceleration: the acceleration is integrated onto the last committed twist.
//!
//! # Example:
//!```no_run
//! use std::time::Duration;
//! use franka_controllers::{
//!     CartesianVelocityController, ControlLoop, ControllerConfig, ControllerResult,
//!     SimulatedRobot,
//! };
//! fn main() -> ControllerResult<()> {
//!     let mut robot = SimulatedRobot::new(
//!         "panda",
//!         [1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0.3, 0., 0.5, 1.],
//!         [0.; 7],
//!         1e-3,
//!     );
//!     let controller = CartesianVelocityController::init(&mut robot, ControllerConfig::default())?;
//!     let handle = ControlLoop::spawn(controller, None)?;
//!     let channels = handle.channels();
//!     channels.write_target_acceleration([0., 0., 1., 0., 0., 0.]);
//!     std::thread::sleep(Duration::from_millis(100));
//!     channels.write_contact(true);
//!     std::thread::sleep(Duration::from_millis(100));
//!     let records = handle.stop()?;
//!     println!("{}", records.last().map(|record| record.log()).unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! With the default [`RealtimeConfig::Enforce`] the control loop refuses to start on a kernel
//! without real-time capabilities. Use [`RealtimeConfig::Ignore`] for simulations.

pub mod config;
pub mod controller;
pub mod exception;
pub mod homing;
pub mod utils;

pub use config::{ControllerConfig, RealtimeConfig};
pub use controller::cartesian_velocity_controller::CartesianVelocityController;
pub use controller::command_channels::CommandChannels;
pub use controller::control_loop::{ControlLoop, ControlLoopHandle};
pub use controller::logger::Record;
pub use controller::robot_state::RobotState;
pub use controller::simulation::SimulatedRobot;
pub use controller::status::{ControllerStatus, StatusPublisher};
pub use controller::types::*;
pub use exception::{ControllerException, ControllerResult};
pub use homing::{HomePose, HomingConfig, HomingController};
pub use utils::*;
