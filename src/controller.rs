// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the Cartesian velocity controller and everything it is made of.

pub mod cartesian_velocity_controller;
pub mod command_channels;
pub mod control_loop;
pub mod control_tools;
pub mod controller_state;
pub mod logger;
pub mod mode_arbiter;
pub mod rate_limiting;
pub mod robot_interface;
pub mod robot_state;
pub mod safety_gate;
pub mod simulation;
pub mod status;
pub mod types;
pub mod velocity_synthesizer;
