// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the homing controller which brings the arm into a home joint configuration.
use std::f64::consts::FRAC_PI_2;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::load_parameters;
use crate::controller::robot_interface::{PositionJointHandle, RobotHardware};
use crate::exception::{ControllerException, ControllerResult};
use crate::utils::Vector7;

/// Home joint configurations.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HomePose {
    /// Flange x axis pointing along the negative y axis of the base.
    FlangeXNegY,
    /// Pose used with the oct end effector.
    OctEndEffector,
    /// Arm folded next to a bed.
    Bedside,
}

impl Default for HomePose {
    fn default() -> Self {
        HomePose::Bedside
    }
}

impl HomePose {
    /// Joint positions of the pose in \[rad\].
    pub fn joint_positions(&self) -> [f64; 7] {
        match self {
            HomePose::FlangeXNegY => [0.0, -1.0, 0.1, -2.5, 0.1, 1.5, 1.57],
            HomePose::OctEndEffector => [0.0, -0.373, 0.0, -2.025, 0.0, 1.635, 0.523],
            HomePose::Bedside => [
                0.0,
                -30_f64.to_radians(),
                0.0,
                -120_f64.to_radians(),
                0.0,
                FRAC_PI_2,
                -60_f64.to_radians(),
            ],
        }
    }
}

impl FromStr for HomePose {
    type Err = ControllerException;

    /// Parses the snake case name of a pose, e.g. `flange_x_neg_y`.
    ///
    /// # Errors
    /// * ConfigurationException if the name is not one of the known poses.
    fn from_str(name: &str) -> ControllerResult<Self> {
        match name {
            "flange_x_neg_y" => Ok(HomePose::FlangeXNegY),
            "oct_end_effector" => Ok(HomePose::OctEndEffector),
            "bedside" => Ok(HomePose::Bedside),
            _ => Err(ControllerException::ConfigurationException {
                message: format!(
                    "unknown home pose {:?}, expected flange_x_neg_y, oct_end_effector or bedside",
                    name
                ),
            }),
        }
    }
}

/// Parameters of the [`HomingController`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HomingConfig {
    /// Proportional gain from joint error to joint increment per tick.
    pub kp: f64,
    /// Maximum joint increment per tick in \[rad\].
    pub max_increment: f64,
    /// A joint whose error is at most `stop_threshold` \[rad\] is ready and no longer commanded.
    pub stop_threshold: f64,
    pub home_pose: HomePose,
    /// Exactly 7 joint names.
    pub joint_names: Vec<String>,
}

impl Default for HomingConfig {
    fn default() -> Self {
        HomingConfig {
            kp: 0.0005,
            max_increment: 0.00015,
            stop_threshold: 0.0005,
            home_pose: HomePose::default(),
            joint_names: (1..=7).map(|i| format!("panda_joint{}", i)).collect(),
        }
    }
}

impl HomingConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn load<Q: AsRef<Path>>(param_file_path: Q) -> ControllerResult<Self> {
        let config: HomingConfig = load_parameters(param_file_path)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// * ConfigurationException if there are not exactly 7 joint names or a gain is invalid.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.joint_names.len() != 7 {
            return Err(ControllerException::ConfigurationException {
                message: format!(
                    "HomingController: Wrong number of joint names, got {} instead of 7 names!",
                    self.joint_names.len()
                ),
            });
        }
        let valid = self.kp > 0.
            && self.kp.is_finite()
            && self.max_increment > 0.
            && self.max_increment.is_finite()
            && self.stop_threshold >= 0.
            && self.stop_threshold.is_finite();
        if !valid {
            return Err(ControllerException::ConfigurationException {
                message: format!(
                    "HomingController: kp and max_increment must be positive and stop_threshold \
                     non-negative, got {}, {} and {}",
                    self.kp, self.max_increment, self.stop_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Moves every joint towards the home pose with a clamped proportional law.
///
/// Each tick the joint is commanded to `q + clamp(kp * (target - q), ±max_increment)` as long as
/// its error exceeds `stop_threshold`. Joints are handled independently.
pub struct HomingController {
    config: HomingConfig,
    handles: Vec<Box<dyn PositionJointHandle>>,
    target: Vector7,
    initial_positions: Vector7,
    elapsed_time: Duration,
}

impl HomingController {
    /// Resolves the position handles of all joints.
    ///
    /// # Errors
    /// * ConfigurationException if the configuration is invalid or a joint handle is missing.
    pub fn init(hardware: &mut dyn RobotHardware, config: HomingConfig) -> ControllerResult<Self> {
        config.validate()?;
        let mut handles = Vec::with_capacity(7);
        for joint_name in config.joint_names.iter() {
            match hardware.position_joint_handle(joint_name) {
                Some(handle) => handles.push(handle),
                None => {
                    error!("HomingController: could not get joint handle {}", joint_name);
                    return Err(ControllerException::ConfigurationException {
                        message: format!("HomingController: missing joint handle {}", joint_name),
                    });
                }
            }
        }
        Ok(HomingController {
            target: Vector7::from_column_slice(&config.home_pose.joint_positions()),
            config,
            handles,
            initial_positions: Vector7::zeros(),
            elapsed_time: Duration::from_secs(0),
        })
    }

    pub fn starting(&mut self, time: Duration) {
        self.initial_positions = self.positions();
        self.elapsed_time = Duration::from_secs(0);
        info!(
            "HomingController: starting at {:?} towards {:?}",
            time, self.config.home_pose
        );
    }

    /// Commands one increment per joint.
    ///
    /// # Return
    /// For every joint whether it is within `stop_threshold` of the home pose.
    pub fn update(&mut self, period: Duration) -> [bool; 7] {
        self.elapsed_time += period;
        let mut ready = [false; 7];
        for (i, handle) in self.handles.iter_mut().enumerate() {
            let position = handle.position();
            let error = self.target[i] - position;
            if error.abs() > self.config.stop_threshold {
                let increment = (self.config.kp * error)
                    .clamp(-self.config.max_increment, self.config.max_increment);
                handle.set_command(position + increment);
            } else {
                ready[i] = true;
            }
        }
        ready
    }

    /// Current joint positions.
    pub fn positions(&self) -> Vector7 {
        Vector7::from_iterator(self.handles.iter().map(|handle| handle.position()))
    }

    pub fn initial_positions(&self) -> &Vector7 {
        &self.initial_positions
    }

    pub fn target(&self) -> &Vector7 {
        &self.target
    }

    pub fn elapsed_time(&self) -> Duration {
        self.elapsed_time
    }
}
