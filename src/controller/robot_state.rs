// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the RobotState snapshot read once per control period.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::controller::types::{Pose, Wrench};

/// Describes the part of the robot state the Cartesian velocity controller consumes.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct RobotState {
    /// ![^{O}T_{EE}](https://latex.codecogs.com/png.latex?^{O}T_{EE})
    ///
    /// Measured end effector pose in base frame.
    /// Pose is represented as a 4x4 matrix in column-major format.
    pub O_T_EE: Pose,
    /// Elbow configuration.
    ///
    /// The values of the array are:
    ///  - \[0\] Position of the 3rd joint in \[rad\].
    ///  - \[1\] Sign of the 4th joint. Can be +1 or -1.
    pub elbow: [f64; 2],
    /// ![^OF_{K,\text{ext}}](https://latex.codecogs.com/png.latex?^OF_{K,\text{ext}})
    ///
    /// Estimated external wrench (force, torque) acting on stiffness frame, expressed
    /// relative to the base frame. Unit: \[N,N,N,Nm,Nm,Nm\].
    pub O_F_ext_hat_K: Wrench,
    /// Strictly monotonically increasing timestamp since robot start.
    pub time: Duration,
}

impl Default for RobotState {
    fn default() -> Self {
        RobotState {
            O_T_EE: [
                1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1.,
            ],
            elbow: [0.; 2],
            O_F_ext_hat_K: [0.; 6],
            time: Duration::from_secs(0),
        }
    }
}
