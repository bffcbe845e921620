// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains functions for limiting the magnitude and the per-tick change of Cartesian
//! velocity commands, together with the hardware limits configured values are checked against.

use crate::controller::types::Twist;

///Sample time constant
pub static DELTA_T: f64 = 1e-3;
/// Longest accepted control period. Beyond it one step of the acceleration limit no longer
/// bounds the jerk seen by the robot.
pub static MAX_PERIOD: f64 = 10. * DELTA_T;
///Epsilon value for checking limits
pub static LIMIT_EPS: f64 = 1e-3;
/// Number of packets lost considered for the definition of velocity limits.
/// When a packet is lost, FCI assumes a constant acceleration model
pub static TOL_NUMBER_PACKETS_LOST: f64 = 1e-3;
/// Maximum translational acceleration
pub static MAX_TRANSLATIONAL_ACCELERATION: f64 = 13.0000 - LIMIT_EPS;
/// Maximum translational velocity
pub static MAX_TRANSLATIONAL_VELOCITY: f64 =
    2.0000 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_TRANSLATIONAL_ACCELERATION;
/// Maximum rotational acceleration
pub static MAX_ROTATIONAL_ACCELERATION: f64 = 25.0000 - LIMIT_EPS;
/// Maximum rotational velocity
pub static MAX_ROTATIONAL_VELOCITY: f64 =
    2.5000 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_ROTATIONAL_ACCELERATION;

/// Per-component limits of a commanded twist.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TwistLimits {
    /// Maximum magnitude of each component.
    pub max_velocity: Twist,
    /// Maximum change of each component between two consecutive ticks.
    pub max_step: Twist,
}

impl TwistLimits {
    /// Creates limits which share one bound for the translational and one for the rotational part.
    /// # Arguments
    /// * `max_translational_velocity` - Maximum translational velocity in \[m/s\].
    /// * `max_rotational_velocity` - Maximum rotational velocity in \[rad/s\].
    /// * `max_translational_acceleration` - Maximum translational acceleration in \[m/s^2\].
    /// * `max_rotational_acceleration` - Maximum rotational acceleration in \[rad/s^2\].
    /// * `period` - Duration of one tick in \[s\].
    pub fn new(
        max_translational_velocity: f64,
        max_rotational_velocity: f64,
        max_translational_acceleration: f64,
        max_rotational_acceleration: f64,
        period: f64,
    ) -> Self {
        let mut max_velocity = [0.; 6];
        let mut max_step = [0.; 6];
        for i in 0..3 {
            max_velocity[i] = max_translational_velocity;
            max_velocity[i + 3] = max_rotational_velocity;
            max_step[i] = max_translational_acceleration * period;
            max_step[i + 3] = max_rotational_acceleration * period;
        }
        TwistLimits {
            max_velocity,
            max_step,
        }
    }

    /// Clamps the magnitude of `commanded` and then limits its change with respect to
    /// `last_commanded`.
    ///
    /// If `last_commanded` is within the magnitude limits, so is the result.
    pub fn limit(&self, commanded: &Twist, last_commanded: &Twist) -> Twist {
        limit_rate_twist(
            &self.max_step,
            &limit_magnitude_twist(&self.max_velocity, commanded),
            last_commanded,
        )
    }

    /// Upper bound of ticks needed to bring `twist` to zero with [`limit`](`Self::limit`).
    ///
    /// One tick is added to every moving component to absorb rounding of the accumulated steps.
    pub fn ticks_to_stop(&self, twist: &Twist) -> u64 {
        twist
            .iter()
            .zip(self.max_step.iter())
            .filter(|(v, _)| **v != 0.)
            .map(|(v, step)| f64::ceil(v.abs() / step) as u64 + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Clamps every component of a twist to its maximum magnitude.
/// # Arguments
/// * `max_velocity` - Per-component maximum magnitude.
/// * `commanded_values` - Commanded twist of the current time step.
/// # Return
/// Clamped twist.
pub fn limit_magnitude_twist(max_velocity: &Twist, commanded_values: &Twist) -> Twist {
    debug_assert!(commanded_values.iter().all(|x| x.is_finite()));
    let mut limited_values = [0.; 6];
    for i in 0..6 {
        limited_values[i] = f64::max(
            f64::min(commanded_values[i], max_velocity[i]),
            -max_velocity[i],
        );
    }
    limited_values
}

/// Limits the change of an input twist with respect to the twist of the previous time step.
/// # Arguments
/// * `max_step` - Per-component maximum change per time step.
/// * `commanded_values` - Commanded twist of the current time step.
/// * `last_commanded_values` - Commanded twist of the previous time step.
/// # Return
/// Rate-limited twist.
pub fn limit_rate_twist(
    max_step: &Twist,
    commanded_values: &Twist,
    last_commanded_values: &Twist,
) -> Twist {
    debug_assert!(commanded_values.iter().all(|x| x.is_finite()));
    let mut limited_values = [0.; 6];
    for i in 0..6 {
        let commanded_step = commanded_values[i] - last_commanded_values[i];
        limited_values[i] =
            last_commanded_values[i] + f64::max(f64::min(commanded_step, max_step[i]), -max_step[i]);
    }
    limited_values
}
