// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{info, LevelFilter};

use franka_controllers::{ControllerResult, HomePose, HomingConfig, HomingController, SimulatedRobot};

/// An example moving a simulated robot into a home pose with the homing controller.
///
/// The simulation runs as fast as possible, one tick corresponds to 1 ms.
#[derive(Parser, Debug)]
#[clap(author, version, name = "simulated_homing")]
struct CommandLineArguments {
    /// TOML file with homing parameters
    #[clap(short, long)]
    pub config: Option<PathBuf>,
    /// Home pose: flange_x_neg_y, oct_end_effector or bedside
    #[clap(long)]
    pub home_pose: Option<HomePose>,
    /// Maximum number of ticks
    #[clap(short, long, default_value_t = 60_000)]
    pub max_ticks: u64,
}

fn main() -> ControllerResult<()> {
    let args = CommandLineArguments::parse();
    init_logger();

    let mut config = match args.config {
        Some(path) => HomingConfig::load(path)?,
        None => HomingConfig::default(),
    };
    if let Some(home_pose) = args.home_pose {
        config.home_pose = home_pose;
    }
    let identity = [
        1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1.,
    ];
    let start = [0., -0.785, 0., -2.356, 0., 1.571, 0.785];
    let mut robot = SimulatedRobot::new("panda", identity, start, 1e-3);
    let mut controller = HomingController::init(&mut robot, config)?;
    controller.starting(Duration::from_secs(0));

    let period = Duration::from_millis(1);
    let mut ready = [false; 7];
    let mut ticks = 0;
    while ticks < args.max_ticks && !ready.iter().all(|&joint_ready| joint_ready) {
        ready = controller.update(period);
        ticks += 1;
        if ticks % 5000 == 0 {
            info!("after {:?}: ready joints {:?}", controller.elapsed_time(), ready);
        }
    }
    info!(
        "{} after {} ticks, joint positions {:?}",
        if ready.iter().all(|&joint_ready| joint_ready) {
            "homed"
        } else {
            "not homed"
        },
        ticks,
        robot.joint_positions()
    );
    Ok(())
}

fn init_logger() {
    let start = Instant::now();
    if let Err(error) = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{:10.6} {}] {}",
                start.elapsed().as_secs_f64(),
                record.level(),
                message
            ))
        })
        .level(LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
    {
        eprintln!("could not initialize logging: {}", error);
    }
}
