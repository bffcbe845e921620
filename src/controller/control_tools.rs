// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later
#![allow(non_upper_case_globals)]

//! Helpers for the real-time thread and for validating measured poses.
use std::path::Path;

use crate::exception::{ControllerException, ControllerResult};
use crate::utils::all_finite;

/// Determines whether the current OS kernel is a realtime kernel.
///
/// On Linux, this checks for the existence of `/sys/kernel/realtime`.
pub fn has_realtime_kernel() -> bool {
    Path::new("/sys/kernel/realtime").exists()
}

/// Sets the current thread to the second highest SCHED_FIFO priority and locks the memory
/// of the process.
///
/// # Errors
/// * RealTimeException if realtime priority cannot be set for the current thread.
///
/// If the method returns an Error please check your /etc/security/limits.conf file
/// There should be a line like this:
/// ```text
///controller       -       rtprio          99
/// ```
pub fn set_current_thread_to_highest_scheduler_priority() -> ControllerResult<()> {
    unsafe {
        let max_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max_priority == -1 {
            return Err(realtime_exception("unable to get maximum possible thread priority"));
        }
        let thread_param = libc::sched_param {
            sched_priority: max_priority - 1,
        };
        if libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &thread_param) != 0 {
            return Err(realtime_exception("unable to set realtime scheduling"));
        }
        // keeps page faults out of the control loop
        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            return Err(realtime_exception("unable to lock memory"));
        }
    }
    Ok(())
}

fn realtime_exception(message: &str) -> ControllerException {
    ControllerException::RealTimeException {
        message: format!("franka-controllers: {}", message),
    }
}

/// Determines whether the given array represents a valid homogeneous transformation matrix.
/// transform is represented as a 4x4 matrix in column-major format
#[allow(clippy::float_cmp)]
pub fn is_homogeneous_transformation(transform: &[f64; 16]) -> bool {
    const kOrthonormalThreshold: f64 = 1e-5;
    if transform[3] != 0.0 || transform[7] != 0.0 || transform[11] != 0.0 || transform[15] != 1.0 {
        return false;
    }
    let is_unit =
        |x: f64, y: f64, z: f64| f64::abs(f64::sqrt(x * x + y * y + z * z) - 1.) <= kOrthonormalThreshold;
    // columns, then rows of the rotational part
    (0..3).all(|j| is_unit(transform[j * 4], transform[j * 4 + 1], transform[j * 4 + 2]))
        && (0..3).all(|i| is_unit(transform[i], transform[4 + i], transform[8 + i]))
}

/// true if the pose can be used to compute a pose error.
pub fn is_valid_pose(pose: &[f64; 16]) -> bool {
    all_finite(pose) && is_homogeneous_transformation(pose)
}

#[cfg(test)]
mod tests {
    use crate::controller::control_tools::{is_homogeneous_transformation, is_valid_pose};

    static IDENTITY: [f64; 16] = [
        1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0.3, 0., 0.5, 1.,
    ];

    #[test]
    fn identity_with_translation_is_homogeneous() {
        assert!(is_homogeneous_transformation(&IDENTITY));
        assert!(is_valid_pose(&IDENTITY));
    }

    #[test]
    fn malformed_poses_are_rejected() {
        let mut pose = IDENTITY;
        pose[15] = 0.;
        assert!(!is_homogeneous_transformation(&pose));
        let mut pose = IDENTITY;
        pose[0] = 2.;
        assert!(!is_homogeneous_transformation(&pose));
        let mut pose = IDENTITY;
        pose[12] = f64::NAN;
        assert!(is_homogeneous_transformation(&pose));
        assert!(!is_valid_pose(&pose));
        let mut pose = IDENTITY;
        pose[1] = f64::NAN;
        assert!(!is_valid_pose(&pose));
    }
}
