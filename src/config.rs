// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controller configuration and the loading of parameter files.
use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::controller::rate_limiting::{
    TwistLimits, MAX_PERIOD, MAX_ROTATIONAL_ACCELERATION, MAX_ROTATIONAL_VELOCITY,
    MAX_TRANSLATIONAL_ACCELERATION, MAX_TRANSLATIONAL_VELOCITY,
};
use crate::exception::{ControllerException, ControllerResult};

/// Used to decide whether to enforce realtime mode for a control loop thread.
/// see [`ControlLoop`](`crate::controller::control_loop::ControlLoop`)
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum RealtimeConfig {
    Enforce,
    Ignore,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        RealtimeConfig::Enforce
    }
}

/// Loads a TOML parameter file into a parameter struct.
///
/// # Errors
/// * ParameterException if the file cannot be read or does not describe a `P`.
pub fn load_parameters<P, Q>(param_file_path: Q) -> ControllerResult<P>
where
    P: DeserializeOwned,
    Q: AsRef<Path>,
{
    let params_str = read_to_string(param_file_path.as_ref()).map_err(|error| {
        ControllerException::ParameterException {
            message: format!(
                "Cannot load the parameter file {:?}: {}",
                param_file_path.as_ref(),
                error
            ),
        }
    })?;
    toml::from_str(params_str.as_str()).map_err(|error| ControllerException::ParameterException {
        message: format!("Cannot read the parameter file: {}", error),
    })
}

/// Parameters of the [`CartesianVelocityController`](`crate::CartesianVelocityController`).
///
/// Keys missing in a parameter file keep their default values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Prefix of the hardware handle names (`<arm_id>_robot`).
    pub arm_id: String,
    /// Control period in \[s\].
    pub period: f64,
    /// Proportional gain from translation error to translational velocity in \[1/s\].
    pub translational_gain: f64,
    /// Proportional gain from rotation error to rotational velocity in \[1/s\].
    pub rotational_gain: f64,
    /// Maximum magnitude of each translational component in \[m/s\].
    pub max_translational_velocity: f64,
    /// Maximum magnitude of each rotational component in \[rad/s\].
    pub max_rotational_velocity: f64,
    /// Maximum change of each translational component per second in \[m/s^2\].
    pub max_translational_acceleration: f64,
    /// Maximum change of each rotational component per second in \[rad/s^2\].
    pub max_rotational_acceleration: f64,
    /// Translation error below which a position target counts as reached in \[m\].
    pub arrival_translation_threshold: f64,
    /// Rotation error below which a position target counts as reached in \[rad\].
    pub arrival_rotation_threshold: f64,
    /// A tick whose measured period exceeds `overrun_tolerance * period` is an overrun.
    pub overrun_tolerance: f64,
    /// Number of ticks kept in the command/state log.
    pub log_size: usize,
    /// Status is published every `status_decimation` ticks.
    pub status_decimation: u64,
    pub realtime_config: RealtimeConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            arm_id: "panda".to_string(),
            period: 1e-3,
            translational_gain: 1.0,
            rotational_gain: 1.0,
            max_translational_velocity: 0.5,
            max_rotational_velocity: 1.0,
            max_translational_acceleration: 10.0,
            max_rotational_acceleration: 20.0,
            arrival_translation_threshold: 1e-3,
            arrival_rotation_threshold: 1e-2,
            overrun_tolerance: 1.5,
            log_size: 50,
            status_decimation: 10,
            realtime_config: RealtimeConfig::Enforce,
        }
    }
}

impl ControllerConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn load<Q: AsRef<Path>>(param_file_path: Q) -> ControllerResult<Self> {
        let config: ControllerConfig = load_parameters(param_file_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all values are usable and within the limits of the robot.
    ///
    /// # Errors
    /// * ConfigurationException naming the first invalid value.
    pub fn validate(&self) -> ControllerResult<()> {
        check_positive("period", self.period, MAX_PERIOD)?;
        check_non_negative("translational_gain", self.translational_gain)?;
        check_non_negative("rotational_gain", self.rotational_gain)?;
        check_positive(
            "max_translational_velocity",
            self.max_translational_velocity,
            MAX_TRANSLATIONAL_VELOCITY,
        )?;
        check_positive(
            "max_rotational_velocity",
            self.max_rotational_velocity,
            MAX_ROTATIONAL_VELOCITY,
        )?;
        check_positive(
            "max_translational_acceleration",
            self.max_translational_acceleration,
            MAX_TRANSLATIONAL_ACCELERATION,
        )?;
        check_positive(
            "max_rotational_acceleration",
            self.max_rotational_acceleration,
            MAX_ROTATIONAL_ACCELERATION,
        )?;
        check_non_negative(
            "arrival_translation_threshold",
            self.arrival_translation_threshold,
        )?;
        check_non_negative("arrival_rotation_threshold", self.arrival_rotation_threshold)?;
        if !(self.overrun_tolerance >= 1.0 && self.overrun_tolerance.is_finite()) {
            return Err(configuration_error(format!(
                "overrun_tolerance must be finite and at least 1, got {}",
                self.overrun_tolerance
            )));
        }
        if self.log_size == 0 || self.status_decimation == 0 {
            return Err(configuration_error(
                "log_size and status_decimation must be at least 1".to_string(),
            ));
        }
        if self.arm_id.is_empty() {
            return Err(configuration_error("arm_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Duration of one control period.
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.period)
    }

    /// Per-component velocity and step limits derived from this configuration.
    pub fn twist_limits(&self) -> TwistLimits {
        TwistLimits::new(
            self.max_translational_velocity,
            self.max_rotational_velocity,
            self.max_translational_acceleration,
            self.max_rotational_acceleration,
            self.period,
        )
    }
}

fn configuration_error(message: String) -> ControllerException {
    ControllerException::ConfigurationException { message }
}

fn check_positive(name: &str, value: f64, upper_bound: f64) -> ControllerResult<()> {
    if value > 0. && value <= upper_bound && value.is_finite() {
        Ok(())
    } else {
        Err(configuration_error(format!(
            "{} must be in (0, {}], got {}",
            name, upper_bound, value
        )))
    }
}

fn check_non_negative(name: &str, value: f64) -> ControllerResult<()> {
    if value >= 0. && value.is_finite() {
        Ok(())
    } else {
        Err(configuration_error(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}
