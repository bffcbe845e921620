// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the state the control loop carries from one tick to the next.
use std::time::Duration;

use crate::controller::robot_state::RobotState;
use crate::controller::types::{Pose, Twist, Wrench};

/// Activation- and tick-relative time keeping.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Timing {
    /// Time since activation at the current tick in \[s\].
    pub current_time: f64,
    /// Time since activation at the previous tick in \[s\].
    pub last_time: f64,
    /// Time since activation.
    pub elapsed_time: Duration,
}

impl Timing {
    fn advance(&mut self, period: Duration) {
        self.elapsed_time += period;
        self.last_time = self.current_time;
        self.current_time = self.elapsed_time.as_secs_f64();
    }
}

/// Everything the controller remembers between ticks. Created at activation, owned by
/// the control loop and handed to the velocity synthesizer explicitly.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ControllerState {
    /// End effector pose at activation.
    pub initial_pose: Pose,
    /// Elbow configuration at activation.
    pub initial_elbow: [f64; 2],
    /// End effector pose of this tick.
    pub current_pose: Pose,
    /// End effector pose of the previous tick.
    pub last_pose: Pose,
    /// Twist committed in the previous tick.
    pub last_command: Twist,
    /// Acceleration commanded in the previous tick, zero unless acceleration mode was active.
    pub last_cmd_acc: Twist,
    /// Acceleration realized by the previous commit, `(last_command - previous) / dt`.
    pub last_acceleration: Twist,
    pub current_wrench: Wrench,
    pub last_wrench: Wrench,
    pub timing: Timing,
}

impl ControllerState {
    /// Captures the robot state at activation. Commands start from rest.
    pub fn new(robot_state: &RobotState) -> Self {
        ControllerState {
            initial_pose: robot_state.O_T_EE,
            initial_elbow: robot_state.elbow,
            current_pose: robot_state.O_T_EE,
            last_pose: robot_state.O_T_EE,
            last_command: [0.; 6],
            last_cmd_acc: [0.; 6],
            last_acceleration: [0.; 6],
            current_wrench: robot_state.O_F_ext_hat_K,
            last_wrench: robot_state.O_F_ext_hat_K,
            timing: Timing::default(),
        }
    }

    /// Takes over the measurements of a new tick. Must happen before anything is synthesized.
    pub fn observe(&mut self, robot_state: &RobotState, period: Duration) {
        self.current_pose = robot_state.O_T_EE;
        self.current_wrench = robot_state.O_F_ext_hat_K;
        self.timing.advance(period);
    }

    /// Remembers the committed twist and the commanded acceleration and shifts this tick's
    /// measurements into the past.
    pub fn commit(&mut self, twist: &Twist, cmd_acc: &Twist, dt: f64) {
        for i in 0..6 {
            self.last_acceleration[i] = (twist[i] - self.last_command[i]) / dt;
        }
        self.last_cmd_acc = *cmd_acc;
        self.last_command = *twist;
        self.last_pose = self.current_pose;
        self.last_wrench = self.current_wrench;
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::controller_state::ControllerState;
    use crate::controller::robot_state::RobotState;
    use std::time::Duration;

    #[test]
    fn activation_starts_from_rest_at_measured_pose() {
        let mut robot_state = RobotState::default();
        robot_state.O_T_EE[12] = 0.3;
        robot_state.elbow = [0.1, -1.];
        let state = ControllerState::new(&robot_state);
        assert_eq!(state.initial_pose, robot_state.O_T_EE);
        assert_eq!(state.last_pose, robot_state.O_T_EE);
        assert_eq!(state.initial_elbow, [0.1, -1.]);
        assert_eq!(state.last_command, [0.; 6]);
        assert_eq!(state.timing.elapsed_time, Duration::from_secs(0));
    }

    #[test]
    fn commit_shifts_tick_into_past() {
        let mut robot_state = RobotState::default();
        let mut state = ControllerState::new(&robot_state);
        robot_state.O_T_EE[14] = 0.5;
        robot_state.O_F_ext_hat_K[2] = 3.;
        state.observe(&robot_state, Duration::from_millis(1));
        assert_eq!(state.current_pose[14], 0.5);
        assert_eq!(state.last_pose[14], 0.);
        state.commit(&[0.01, 0., 0., 0., 0., 0.], &[30., 0., 0., 0., 0., 0.], 1e-3);
        assert_eq!(state.last_pose[14], 0.5);
        assert_eq!(state.last_wrench[2], 3.);
        // the commanded acceleration is kept apart from the realized one
        assert_eq!(state.last_cmd_acc[0], 30.);
        assert!(f64::abs(state.last_acceleration[0] - 10.) < 1e-9);
        state.observe(&robot_state, Duration::from_millis(1));
        assert!(f64::abs(state.timing.current_time - 2e-3) < 1e-12);
        assert!(f64::abs(state.timing.last_time - 1e-3) < 1e-12);
    }
}
