// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains a kinematic robot simulation implementing [`RobotHardware`].
//!
//! Committed twists are integrated into the end effector pose, joint position commands are
//! applied directly. Useful to try controllers without a robot and in tests.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use nalgebra::{Translation3, UnitQuaternion, Vector3};

use crate::controller::robot_interface::{
    FrankaStateHandle, PositionJointHandle, RobotHardware, VelocityCartesianHandle,
};
use crate::controller::robot_state::RobotState;
use crate::controller::types::{Pose, Twist, Wrench};
use crate::utils::{array_to_isometry, isometry_to_array};

struct Simulation {
    robot_state: RobotState,
    last_command: Twist,
    joint_positions: [f64; 7],
    period: f64,
}

/// Simulated robot. Clones share the same simulation.
#[derive(Clone)]
pub struct SimulatedRobot {
    arm_id: String,
    simulation: Arc<Mutex<Simulation>>,
}

impl SimulatedRobot {
    /// Creates a new simulation.
    /// # Arguments
    /// * `arm_id` - The Cartesian handles are offered as `<arm_id>_robot`, the joint handles as
    /// `<arm_id>_joint1` to `<arm_id>_joint7`.
    /// * `initial_pose` - End effector pose in column-major format.
    /// * `joint_positions` - Initial joint positions in \[rad\].
    /// * `period` - Time a committed twist is applied for in \[s\].
    pub fn new(arm_id: &str, initial_pose: Pose, joint_positions: [f64; 7], period: f64) -> Self {
        let robot_state = RobotState {
            O_T_EE: initial_pose,
            ..RobotState::default()
        };
        SimulatedRobot {
            arm_id: arm_id.to_string(),
            simulation: Arc::new(Mutex::new(Simulation {
                robot_state,
                last_command: [0.; 6],
                joint_positions,
                period,
            })),
        }
    }

    pub fn robot_state(&self) -> RobotState {
        lock(&self.simulation).robot_state
    }

    /// Last twist committed through the velocity handle.
    pub fn last_command(&self) -> Twist {
        lock(&self.simulation).last_command
    }

    pub fn joint_positions(&self) -> [f64; 7] {
        lock(&self.simulation).joint_positions
    }

    /// Overrides the measured end effector pose, e.g. to inject faulty measurements.
    pub fn set_pose(&self, pose: Pose) {
        lock(&self.simulation).robot_state.O_T_EE = pose;
    }

    pub fn set_external_wrench(&self, wrench: Wrench) {
        lock(&self.simulation).robot_state.O_F_ext_hat_K = wrench;
    }

    fn joint_index(&self, joint_name: &str) -> Option<usize> {
        let number: usize = joint_name
            .strip_prefix(self.arm_id.as_str())?
            .strip_prefix("_joint")?
            .parse()
            .ok()?;
        if (1..=7).contains(&number) {
            Some(number - 1)
        } else {
            None
        }
    }
}

fn lock(simulation: &Mutex<Simulation>) -> MutexGuard<Simulation> {
    match simulation.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RobotHardware for SimulatedRobot {
    fn velocity_cartesian_handle(&mut self, name: &str) -> Option<Box<dyn VelocityCartesianHandle>> {
        if name == format!("{}_robot", self.arm_id) {
            Some(Box::new(SimulatedVelocityHandle {
                simulation: self.simulation.clone(),
            }))
        } else {
            None
        }
    }

    fn state_handle(&mut self, name: &str) -> Option<Box<dyn FrankaStateHandle>> {
        if name == format!("{}_robot", self.arm_id) {
            Some(Box::new(SimulatedStateHandle {
                simulation: self.simulation.clone(),
            }))
        } else {
            None
        }
    }

    fn position_joint_handle(&mut self, joint_name: &str) -> Option<Box<dyn PositionJointHandle>> {
        let index = self.joint_index(joint_name)?;
        Some(Box::new(SimulatedJointHandle {
            simulation: self.simulation.clone(),
            index,
        }))
    }
}

struct SimulatedVelocityHandle {
    simulation: Arc<Mutex<Simulation>>,
}

impl VelocityCartesianHandle for SimulatedVelocityHandle {
    fn set_command(&mut self, command: &Twist) {
        let mut simulation = lock(&self.simulation);
        let dt = simulation.period;
        let mut pose = array_to_isometry(&simulation.robot_state.O_T_EE);
        pose.append_translation_mut(&Translation3::new(
            command[0] * dt,
            command[1] * dt,
            command[2] * dt,
        ));
        let rotation = UnitQuaternion::from_scaled_axis(
            Vector3::new(command[3], command[4], command[5]) * dt,
        );
        pose.rotation = rotation * pose.rotation;
        simulation.robot_state.O_T_EE = isometry_to_array(&pose);
        simulation.robot_state.time += Duration::from_secs_f64(dt);
        simulation.last_command = *command;
    }
}

struct SimulatedStateHandle {
    simulation: Arc<Mutex<Simulation>>,
}

impl FrankaStateHandle for SimulatedStateHandle {
    fn robot_state(&self) -> RobotState {
        lock(&self.simulation).robot_state
    }
}

struct SimulatedJointHandle {
    simulation: Arc<Mutex<Simulation>>,
    index: usize,
}

impl PositionJointHandle for SimulatedJointHandle {
    fn position(&self) -> f64 {
        lock(&self.simulation).joint_positions[self.index]
    }

    fn set_command(&mut self, command: f64) {
        lock(&self.simulation).joint_positions[self.index] = command;
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::robot_interface::RobotHardware;
    use crate::controller::simulation::SimulatedRobot;
    use crate::controller::types::Pose;

    static START: Pose = [
        1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0.3, 0., 0.5, 1.,
    ];

    #[test]
    fn handles_are_only_offered_for_the_arm() {
        let mut robot = SimulatedRobot::new("panda", START, [0.; 7], 1e-3);
        assert!(robot.velocity_cartesian_handle("panda_robot").is_some());
        assert!(robot.state_handle("panda_robot").is_some());
        assert!(robot.velocity_cartesian_handle("fr3_robot").is_none());
        assert!(robot.position_joint_handle("panda_joint1").is_some());
        assert!(robot.position_joint_handle("panda_joint7").is_some());
        assert!(robot.position_joint_handle("panda_joint0").is_none());
        assert!(robot.position_joint_handle("panda_joint8").is_none());
        assert!(robot.position_joint_handle("panda_finger_joint1").is_none());
    }

    #[test]
    fn committed_twist_is_integrated_into_pose() {
        let mut robot = SimulatedRobot::new("panda", START, [0.; 7], 1e-3);
        let mut handle = robot.velocity_cartesian_handle("panda_robot").unwrap();
        let state = robot.state_handle("panda_robot").unwrap();
        for _ in 0..100 {
            handle.set_command(&[0.1, 0., -0.2, 0., 0., 0.5]);
        }
        let pose = state.robot_state().O_T_EE;
        assert!(f64::abs(pose[12] - 0.31) < 1e-9);
        assert!(f64::abs(pose[14] - 0.48) < 1e-9);
        // rotated by 0.05 rad about z
        assert!(f64::abs(pose[0] - f64::cos(0.05)) < 1e-9);
        assert!(f64::abs(pose[1] - f64::sin(0.05)) < 1e-9);
        assert_eq!(robot.last_command(), [0.1, 0., -0.2, 0., 0., 0.5]);
    }

    #[test]
    fn joint_commands_move_joints() {
        let mut robot = SimulatedRobot::new("panda", START, [0.; 7], 1e-3);
        let mut joint = robot.position_joint_handle("panda_joint4").unwrap();
        joint.set_command(-1.5);
        assert_eq!(joint.position(), -1.5);
        assert_eq!(robot.joint_positions()[3], -1.5);
    }
}
