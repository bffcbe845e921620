// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Cartesian velocity controller.
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::command_channels::CommandChannels;
use crate::controller::control_tools::is_valid_pose;
use crate::controller::controller_state::ControllerState;
use crate::controller::logger::{Logger, Record};
use crate::controller::mode_arbiter::arbitrate;
use crate::controller::robot_interface::{FrankaStateHandle, RobotHardware, VelocityCartesianHandle};
use crate::controller::safety_gate::{GateInputs, SafetyGate};
use crate::controller::status::ControllerStatus;
use crate::controller::types::{Command, ControlMode, Twist};
use crate::controller::velocity_synthesizer::{has_arrived, VelocitySynthesizer};
use crate::exception::{create_configuration_exception, ControllerResult};

/// Commands a Cartesian end effector velocity every tick, following the latest target pose,
/// target velocity or target acceleration written to its [`CommandChannels`].
///
/// Lifecycle: [`init`](`Self::init`) resolves the hardware handles, [`starting`](`Self::starting`)
/// activates the controller, [`update`](`Self::update`) runs one tick and
/// [`stopping`](`Self::stopping`) deactivates it again.
/// [`ControlLoop`](`crate::controller::control_loop::ControlLoop`) drives it from a real-time thread.
pub struct CartesianVelocityController {
    config: ControllerConfig,
    velocity_handle: Box<dyn VelocityCartesianHandle>,
    state_handle: Box<dyn FrankaStateHandle>,
    channels: CommandChannels,
    synthesizer: VelocitySynthesizer,
    gate: SafetyGate,
    state: Option<ControllerState>,
    status: ControllerStatus,
    logger: Logger,
    last_mode: Option<ControlMode>,
}

impl CartesianVelocityController {
    /// Resolves the velocity and state handles named `<arm_id>_robot`.
    ///
    /// # Errors
    /// * ConfigurationException if the configuration is invalid or a handle is not offered by
    /// the hardware.
    pub fn init(hardware: &mut dyn RobotHardware, config: ControllerConfig) -> ControllerResult<Self> {
        config.validate()?;
        let handle_name = format!("{}_robot", config.arm_id);
        let velocity_handle = hardware.velocity_cartesian_handle(&handle_name).ok_or_else(|| {
            error!("CartesianVelocityController: could not get {} velocity handle", handle_name);
            create_configuration_exception("CartesianVelocityController: missing velocity handle")
        })?;
        let state_handle = hardware.state_handle(&handle_name).ok_or_else(|| {
            error!("CartesianVelocityController: could not get {} state handle", handle_name);
            create_configuration_exception("CartesianVelocityController: missing state handle")
        })?;
        info!("CartesianVelocityController: initialized for {}", config.arm_id);
        Ok(CartesianVelocityController {
            synthesizer: VelocitySynthesizer::from_config(&config),
            gate: SafetyGate::new(config.twist_limits()),
            logger: Logger::new(config.log_size),
            config,
            velocity_handle,
            state_handle,
            channels: CommandChannels::new(),
            state: None,
            status: ControllerStatus::default(),
            last_mode: None,
        })
    }

    /// Handle to write commands to this controller. Stays valid across activations.
    pub fn channels(&self) -> CommandChannels {
        self.channels.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Activates the controller.
    ///
    /// Captures the initial pose and elbow, forgets all previously written commands and starts
    /// commanding from rest. Until a new command is written, the controller commands zero.
    /// The contact flag is kept.
    pub fn starting(&mut self, time: Duration) {
        let robot_state = self.state_handle.robot_state();
        self.channels.reset();
        self.state = Some(ControllerState::new(&robot_state));
        self.status = ControllerStatus {
            contact: self.channels.contact(),
            ..ControllerStatus::default()
        };
        self.last_mode = None;
        self.logger.flush();
        info!("CartesianVelocityController: starting at {:?}", time);
    }

    /// Runs one tick and returns the twist committed to the robot.
    ///
    /// Does nothing and returns zero if the controller is not running.
    /// # Arguments
    /// * `period` - Measured time since the previous tick. Only used to detect overruns, the
    /// velocity synthesis always uses the configured period.
    pub fn update(&mut self, period: Duration) -> Twist {
        let dt = self.config.period;
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => return [0.; 6],
        };
        let robot_state = self.state_handle.robot_state();
        state.observe(&robot_state, period);
        self.status.ticks += 1;

        let overrun = self.status.ticks > 1
            && period.as_secs_f64() > self.config.overrun_tolerance * dt;
        if overrun {
            self.status.overruns += 1;
            warn!(
                "CartesianVelocityController: tick took {:?}, repeating the last command ({} overruns)",
                period, self.status.overruns
            );
        }

        let arbitration = arbitrate(&self.channels);
        let contact = self.channels.contact();
        let pose_valid = is_valid_pose(&state.current_pose);
        if contact && !self.status.contact {
            warn!("CartesianVelocityController: contact detected, decelerating");
        }
        if arbitration.populated && self.last_mode != Some(arbitration.mode) {
            debug!(
                "CartesianVelocityController: switching to {:?} mode",
                arbitration.mode
            );
            self.last_mode = Some(arbitration.mode);
        }

        // an overrun tick holds the last command, which still has to pass the gate
        let candidate = if overrun {
            state.last_command
        } else if arbitration.populated && pose_valid && !contact {
            self.synthesizer.synthesize(
                &arbitration.command,
                &state.current_pose,
                &state.last_command,
                dt,
            )
        } else {
            [0.; 6]
        };
        let output = self.gate.apply(
            &candidate,
            &GateInputs {
                contact,
                populated: arbitration.populated,
                pose_valid,
            },
            &state.last_command,
        );
        let cmd_acc = match arbitration.command {
            Command::Acceleration(cmd_acc) if arbitration.populated => cmd_acc,
            _ => [0.; 6],
        };
        self.velocity_handle.set_command(&output.twist);
        state.commit(&output.twist, &cmd_acc, dt);

        let is_arrived = match arbitration.command {
            Command::Position(target) if arbitration.populated && pose_valid => has_arrived(
                &target,
                &state.current_pose,
                self.config.arrival_translation_threshold,
                self.config.arrival_rotation_threshold,
            ),
            _ => false,
        };
        self.status.mode = arbitration.mode;
        self.status.contact = contact;
        self.status.is_arrived = is_arrived;
        self.status.decision = output.decision;
        self.status.elapsed = state.timing.current_time;
        self.status.last_command = output.twist;
        self.status.wrench = state.current_wrench;
        self.logger.log(Record {
            state: robot_state,
            command: output.twist,
            mode: arbitration.mode,
            decision: output.decision,
        });
        output.twist
    }

    /// Deactivates the controller and returns the log of the last ticks.
    pub fn stopping(&mut self, time: Duration) -> Vec<Record> {
        if self.state.take().is_some() {
            info!(
                "CartesianVelocityController: stopping at {:?} after {} ticks ({} overruns)",
                time, self.status.ticks, self.status.overruns
            );
        }
        self.logger.flush()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn status(&self) -> ControllerStatus {
        self.status
    }

    /// State carried between ticks, `None` while the controller is not running.
    pub fn controller_state(&self) -> Option<&ControllerState> {
        self.state.as_ref()
    }

    /// Returns the log of the last ticks and empties it.
    pub fn flush_log(&mut self) -> Vec<Record> {
        self.logger.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::config::{ControllerConfig, RealtimeConfig};
    use crate::controller::cartesian_velocity_controller::CartesianVelocityController;
    use crate::controller::robot_interface::{
        FrankaStateHandle, MockFrankaStateHandle, MockRobotHardware,
        MockVelocityCartesianHandle, VelocityCartesianHandle,
    };
    use crate::controller::robot_state::RobotState;
    use crate::controller::safety_gate::GateDecision;
    use crate::controller::simulation::SimulatedRobot;
    use crate::controller::types::{ControlMode, Pose, Twist};
    use crate::exception::ControllerException;

    static START: Pose = [
        1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0.3, 0., 0.5, 1.,
    ];
    static TICK: Duration = Duration::from_millis(1);
    // default limits, 0.5 m/s, 1 rad/s, 10 m/s^2, 20 rad/s^2 at 1 ms
    static MAX_VELOCITY: Twist = [0.5, 0.5, 0.5, 1., 1., 1.];
    static MAX_STEP: Twist = [0.01, 0.01, 0.01, 0.02, 0.02, 0.02];

    fn config() -> ControllerConfig {
        ControllerConfig {
            realtime_config: RealtimeConfig::Ignore,
            ..ControllerConfig::default()
        }
    }

    fn simulated_controller() -> (SimulatedRobot, CartesianVelocityController) {
        let mut robot = SimulatedRobot::new("panda", START, [0.; 7], 1e-3);
        let controller = CartesianVelocityController::init(&mut robot, config()).unwrap();
        (robot, controller)
    }

    fn assert_within_limits(twist: &Twist, last: &Twist) {
        for i in 0..6 {
            assert!(
                twist[i].abs() <= MAX_VELOCITY[i] + 1e-12,
                "{:?} exceeds the velocity limits",
                twist
            );
            assert!(
                (twist[i] - last[i]).abs() <= MAX_STEP[i] + 1e-12,
                "step from {:?} to {:?} exceeds the step limits",
                last,
                twist
            );
        }
    }

    fn run(controller: &mut CartesianVelocityController, ticks: usize, last: &mut Twist) {
        for _ in 0..ticks {
            let twist = controller.update(TICK);
            assert_within_limits(&twist, last);
            *last = twist;
        }
    }

    #[test]
    fn missing_handles_refuse_activation() {
        let mut hardware = MockRobotHardware::new();
        hardware
            .expect_velocity_cartesian_handle()
            .returning(|_| None);
        hardware.expect_state_handle().returning(|_| None);
        match CartesianVelocityController::init(&mut hardware, config()) {
            Err(ControllerException::ConfigurationException { .. }) => {}
            Err(error) => panic!("unexpected error {:?}", error),
            Ok(_) => panic!("controller activated without handles"),
        }

        let mut robot = SimulatedRobot::new("fr3", START, [0.; 7], 1e-3);
        assert!(matches!(
            CartesianVelocityController::init(&mut robot, config()),
            Err(ControllerException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn invalid_config_refuses_activation() {
        let mut robot = SimulatedRobot::new("panda", START, [0.; 7], 1e-3);
        let config = ControllerConfig {
            max_translational_velocity: 5.,
            ..config()
        };
        assert!(matches!(
            CartesianVelocityController::init(&mut robot, config),
            Err(ControllerException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn only_running_controller_commits() {
        let committed = Arc::new(Mutex::new(Vec::<Twist>::new()));
        let committed_clone = committed.clone();
        let mut velocity_handle = MockVelocityCartesianHandle::new();
        velocity_handle
            .expect_set_command()
            .times(3)
            .returning(move |twist| committed_clone.lock().unwrap().push(*twist));
        let mut state_handle = MockFrankaStateHandle::new();
        state_handle.expect_robot_state().returning(|| RobotState {
            O_T_EE: START,
            ..RobotState::default()
        });
        let mut hardware = MockRobotHardware::new();
        hardware
            .expect_velocity_cartesian_handle()
            .return_once(move |_| Some(Box::new(velocity_handle) as Box<dyn VelocityCartesianHandle>));
        hardware
            .expect_state_handle()
            .return_once(move |_| Some(Box::new(state_handle) as Box<dyn FrankaStateHandle>));
        let mut controller = CartesianVelocityController::init(&mut hardware, config()).unwrap();

        assert_eq!(controller.update(TICK), [0.; 6]);
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        for _ in 0..3 {
            controller.update(TICK);
        }
        controller.stopping(Duration::from_millis(3));
        assert_eq!(controller.update(TICK), [0.; 6]);
        let committed = committed.lock().unwrap();
        assert_eq!(committed.len(), 3);
        assert!(f64::abs(committed[2][0] - 0.03) < 1e-12);
    }

    #[test]
    fn velocity_command_converges_and_holds() {
        let (robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        assert!(controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]));
        let mut last = [0.; 6];
        run(&mut controller, 10, &mut last);
        assert!(f64::abs(last[0] - 0.1) < 1e-9);
        run(&mut controller, 20, &mut last);
        assert!(f64::abs(last[0] - 0.1) < 1e-9);
        assert!(last[1..].iter().all(|&x| x == 0.));
        assert_eq!(robot.last_command(), last);
        let status = controller.status();
        assert_eq!(status.mode, ControlMode::Velocity);
        assert_eq!(status.decision, GateDecision::Pass);
        assert_eq!(status.ticks, 30);
        assert!(!status.is_arrived);
    }

    #[test]
    fn acceleration_ramps_up_then_contact_stops() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        let channels = controller.channels();
        channels.write_target_acceleration([0., 0., 1., 0., 0., 0.]);
        let mut last = [0.; 6];
        for n in 1..=100 {
            let twist = controller.update(TICK);
            assert_within_limits(&twist, &last);
            assert!(f64::abs(twist[2] - n as f64 * 1e-3) < 1e-9);
            last = twist;
        }
        assert!(f64::abs(last[2] - 0.1) < 1e-9);

        channels.write_contact(true);
        let bound = controller.config().twist_limits().ticks_to_stop(&last);
        for _ in 0..bound {
            let twist = controller.update(TICK);
            assert_within_limits(&twist, &last);
            assert!(twist[2].abs() <= last[2].abs());
            last = twist;
        }
        assert_eq!(last, [0.; 6]);
        assert_eq!(controller.status().decision, GateDecision::Contact);
        assert!(controller.status().contact);

        channels.write_contact(false);
        let twist = controller.update(TICK);
        assert!(f64::abs(twist[2] - 1e-3) < 1e-12);
        assert_eq!(controller.status().decision, GateDecision::Pass);
    }

    #[test]
    fn mode_switches_are_continuous() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        let channels = controller.channels();
        let mut last = [0.; 6];
        let mut far_target = [1., 0., 0., 0., 1., 0., 0., 0., 1., 0.8, 0.2, 0.5];
        channels.write_target_pose(far_target);
        run(&mut controller, 80, &mut last);
        assert_eq!(controller.status().mode, ControlMode::Position);
        channels.write_target_velocity([-0.3, 0.1, 0., 0., 0.5, 0.]);
        run(&mut controller, 80, &mut last);
        assert_eq!(controller.status().mode, ControlMode::Velocity);
        channels.write_target_acceleration([0., 0., -2., 5., 0., 0.]);
        run(&mut controller, 80, &mut last);
        assert_eq!(controller.status().mode, ControlMode::AccelerationModel);
        far_target[11] = -0.5;
        channels.write_target_pose(far_target);
        run(&mut controller, 80, &mut last);
        assert_eq!(controller.status().mode, ControlMode::Position);
    }

    #[test]
    fn position_target_is_reached() {
        let (robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        let target = [1., 0., 0., 0., 1., 0., 0., 0., 1., 0.32, 0., 0.5];
        controller.channels().write_target_pose(target);
        let mut last = [0.; 6];
        run(&mut controller, 10_000, &mut last);
        let status = controller.status();
        assert!(status.is_arrived);
        assert_eq!(status.mode, ControlMode::Position);
        assert!(f64::abs(robot.robot_state().O_T_EE[12] - 0.32) < 1e-3);
    }

    #[test]
    fn non_finite_commands_are_ignored() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        let channels = controller.channels();
        channels.write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 5, &mut last);
        assert!(!channels.write_target_acceleration([f64::NAN, 0., 0., 0., 0., 0.]));
        assert!(!channels.write_target_pose_slice(&[f64::INFINITY; 12]));
        run(&mut controller, 5, &mut last);
        assert_eq!(controller.status().mode, ControlMode::Velocity);
        assert!(f64::abs(last[0] - 0.1) < 1e-9);
    }

    #[test]
    fn no_command_after_starting_commands_rest() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 5, &mut last);
        controller.stopping(Duration::from_millis(5));

        controller.starting(Duration::from_secs(1));
        let twist = controller.update(TICK);
        assert_eq!(twist, [0.; 6]);
        assert_eq!(controller.status().decision, GateDecision::NoCommand);
        assert_eq!(controller.status().mode, ControlMode::Position);
        assert_eq!(controller.status().ticks, 1);
    }

    #[test]
    fn invalid_pose_decelerates() {
        let (robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 5, &mut last);
        let mut pose = START;
        pose[13] = f64::NAN;
        robot.set_pose(pose);
        let twist = controller.update(TICK);
        assert_within_limits(&twist, &last);
        assert!(twist[0] < last[0]);
        assert_eq!(controller.status().decision, GateDecision::InvalidInput);
    }

    #[test]
    fn overrun_repeats_last_command() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 3, &mut last);
        let twist = controller.update(Duration::from_millis(5));
        assert_eq!(twist, last);
        assert_eq!(controller.status().overruns, 1);
        let twist = controller.update(TICK);
        assert!(f64::abs(twist[0] - 0.04) < 1e-12);
        assert_eq!(controller.status().overruns, 1);
    }

    #[test]
    fn contact_decelerates_during_overruns() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 20, &mut last);
        assert!(f64::abs(last[0] - 0.1) < 1e-12);
        controller.channels().write_contact(true);
        for _ in 0..50 {
            let twist = controller.update(Duration::from_millis(2));
            assert_within_limits(&twist, &last);
            assert!(twist[0].abs() <= last[0].abs());
            last = twist;
        }
        assert_eq!(last, [0.; 6]);
        let status = controller.status();
        assert_eq!(status.overruns, 50);
        assert!(status.contact);
        assert_eq!(status.decision, GateDecision::Contact);
        assert_eq!(status.last_command, [0.; 6]);
    }

    #[test]
    fn commanded_acceleration_is_remembered() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_acceleration([0., 0., 1., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 3, &mut last);
        let state = controller.controller_state().unwrap();
        assert_eq!(state.last_cmd_acc, [0., 0., 1., 0., 0., 0.]);
        assert!(f64::abs(state.last_acceleration[2] - 1.) < 1e-6);
    }

    #[test]
    fn controller_state_tracks_ticks() {
        let (robot, mut controller) = simulated_controller();
        assert!(controller.controller_state().is_none());
        controller.starting(Duration::from_secs(0));
        robot.set_external_wrench([0., 0., -4., 0., 0., 0.]);
        controller
            .channels()
            .write_target_velocity([0., 0.1, 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 2, &mut last);
        let state = controller.controller_state().unwrap();
        assert_eq!(state.initial_pose, START);
        assert_eq!(state.last_command, last);
        assert!(f64::abs(state.last_acceleration[1] - 10.) < 1e-6);
        assert_eq!(state.last_cmd_acc, [0.; 6]);
        assert_eq!(state.last_wrench[2], -4.);
        assert_eq!(state.timing.elapsed_time, Duration::from_millis(2));
        assert_eq!(controller.status().wrench[2], -4.);
    }

    #[test]
    fn stopping_returns_last_records() {
        let (_robot, mut controller) = simulated_controller();
        controller.starting(Duration::from_secs(0));
        controller
            .channels()
            .write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let mut last = [0.; 6];
        run(&mut controller, 60, &mut last);
        let records = controller.stopping(Duration::from_millis(60));
        assert_eq!(records.len(), controller.config().log_size);
        assert_eq!(records.last().unwrap().command, last);
        assert_eq!(records[0].mode, ControlMode::Velocity);
        assert!(!controller.is_running());
        assert!(controller.flush_log().is_empty());
    }
}
