// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{Isometry3, Matrix3, Matrix4, Rotation3, SVector, Vector3, Vector6};

/// A Vector with 7 entries
pub type Vector7 = SVector<f64, 7>;

/// Upper bound of iterations used to project an arbitrary 3x3 matrix onto SO(3).
pub const MAX_PROJECTION_ITERATIONS: usize = 100;

/// converts a 4x4 column-major homogenous matrix to an Isometry
pub fn array_to_isometry(array: &[f64; 16]) -> Isometry3<f64> {
    let rot = Rotation3::from_matrix_eps(
        &Matrix4::from_column_slice(array)
            .remove_column(3)
            .remove_row(3),
        f64::EPSILON,
        MAX_PROJECTION_ITERATIONS,
        Rotation3::identity(),
    );
    Isometry3::from_parts(
        Vector3::new(array[12], array[13], array[14]).into(),
        rot.into(),
    )
}

/// converts a 3x4 column-major matrix (a homogeneous matrix without its last row) to an Isometry.
///
/// The rotational part is not required to be orthonormal, it is projected onto the closest
/// rotation. The projection is bounded to [`MAX_PROJECTION_ITERATIONS`] iterations.
pub fn truncated_array_to_isometry(array: &[f64; 12]) -> Isometry3<f64> {
    let rot = Rotation3::from_matrix_eps(
        &Matrix3::from_column_slice(&array[0..9]),
        f64::EPSILON,
        MAX_PROJECTION_ITERATIONS,
        Rotation3::identity(),
    );
    Isometry3::from_parts(
        Vector3::new(array[9], array[10], array[11]).into(),
        rot.into(),
    )
}

/// converts an Isometry to a 4x4 column-major homogenous matrix
pub fn isometry_to_array(transform: &Isometry3<f64>) -> [f64; 16] {
    let mut out = [0.; 16];
    for (i, &x) in transform.to_homogeneous().iter().enumerate() {
        out[i] = x;
    }
    out
}

/// Computes the Cartesian error which moves `current` onto `target`.
///
/// The first three entries are the translation error in base frame, the last three the
/// rotation vector (axis times angle, angle in \[0, pi\]) of `R_target * R_current^T`.
pub fn pose_error(target: &Isometry3<f64>, current: &Isometry3<f64>) -> Vector6<f64> {
    let dx_head = target.translation.vector - current.translation.vector;
    let mut rot_diff: Rotation3<f64> = target.rotation.to_rotation_matrix()
        * current.rotation.to_rotation_matrix().transpose();
    rot_diff.renormalize();
    let dx_tail = rot_diff.scaled_axis();
    Vector6::new(
        dx_head[0], dx_head[1], dx_head[2], dx_tail[0], dx_tail[1], dx_tail[2],
    )
}

/// true if every element is neither NaN nor infinite
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|x| x.is_finite())
}
