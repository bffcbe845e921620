// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{debug, info, warn, LevelFilter};

use franka_controllers::{
    CartesianVelocityController, ControlLoop, ControllerConfig, ControllerResult,
    ControllerStatus, RealtimeConfig, SimulatedRobot, StatusPublisher,
};

/// An example driving a simulated robot with the Cartesian velocity controller.
///
/// The end effector first accelerates along z, then holds a velocity along x, then returns to
/// its initial pose. Finally contact is signalled and the controller brings the arm to rest.
#[derive(Parser, Debug)]
#[clap(author, version, name = "simulated_velocity_control")]
struct CommandLineArguments {
    /// TOML file with controller parameters
    #[clap(short, long)]
    pub config: Option<PathBuf>,
    /// Duration of every phase in milliseconds
    #[clap(short, long, default_value_t = 500)]
    pub phase_ms: u64,
    /// Enforce real-time scheduling of the control loop
    #[clap(short, long, action)]
    pub realtime: bool,
    /// Print debug messages
    #[clap(short, long, action)]
    pub verbose: bool,
}

struct LoggingPublisher;

impl StatusPublisher for LoggingPublisher {
    fn publish(&mut self, status: &ControllerStatus) {
        match status.to_bytes() {
            Ok(bytes) => debug!(
                "status: {:?} mode after {} ticks, {} bytes",
                status.mode,
                status.ticks,
                bytes.len()
            ),
            Err(error) => warn!("{}", error),
        }
    }
}

fn main() -> ControllerResult<()> {
    let args = CommandLineArguments::parse();
    init_logger(args.verbose);

    let mut config = match args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    if !args.realtime {
        config.realtime_config = RealtimeConfig::Ignore;
    }
    let initial_pose = [
        1., 0., 0., 0., 0., -1., 0., 0., 0., 0., -1., 0., 0.307, 0., 0.487, 1.,
    ];
    let mut robot = SimulatedRobot::new("panda", initial_pose, [0.; 7], config.period);
    let controller = CartesianVelocityController::init(&mut robot, config)?;
    let handle = ControlLoop::spawn(controller, Some(Box::new(LoggingPublisher)))?;
    let channels = handle.channels();
    let phase = Duration::from_millis(args.phase_ms);

    channels.write_target_acceleration([0., 0., 0.2, 0., 0., 0.]);
    thread::sleep(phase);
    channels.write_target_velocity([0.05, 0., 0., 0., 0., 0.]);
    thread::sleep(phase);
    let mut target = [0.; 12];
    for column in 0..4 {
        target[column * 3..column * 3 + 3].copy_from_slice(&initial_pose[column * 4..column * 4 + 3]);
    }
    channels.write_target_pose(target);
    thread::sleep(phase * 4);
    info!("arrived: {}", handle.status().is_arrived);

    channels.write_target_velocity([0., 0.1, 0., 0., 0., 0.]);
    thread::sleep(phase);
    channels.write_contact(true);
    thread::sleep(phase);

    let status = handle.status();
    let records = handle.stop()?;
    info!(
        "stopped after {} ticks with {} overruns, last decision {:?}",
        status.ticks, status.overruns, status.decision
    );
    if let Some(record) = records.last() {
        info!("last record: {}", record.log());
    }
    info!("final pose: {:?}", robot.robot_state().O_T_EE);
    Ok(())
}

fn init_logger(verbose: bool) {
    let start = Instant::now();
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(error) = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                start.elapsed().as_secs_f64(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
    {
        eprintln!("could not initialize logging: {}", error);
    }
}
