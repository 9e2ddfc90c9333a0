//! Small math helpers shared by the encoder and the pipeline stages.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Sigmoid activation: σ(x) = 1 / (1 + e^(-x)).
///
/// Loaders that store opacity in logit space go through this on encode.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Rotation matrix for a unit quaternion.
pub fn quaternion_to_matrix(q: &UnitQuaternion<f32>) -> Matrix3<f32> {
    q.to_rotation_matrix().into_inner()
}

/// Σ = R · S · Sᵀ · Rᵀ for per-axis standard deviations `scale`.
pub fn covariance_from_scale_rotation(
    scale: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
) -> Matrix3<f32> {
    let r = quaternion_to_matrix(rotation);
    let s_squared = Matrix3::from_diagonal(&scale.component_mul(scale));
    r * s_squared * r.transpose()
}

/// Rebuild the symmetric matrix from its packed upper triangle.
///
/// `cov_a = (Σ00, Σ01, Σ02)`, `cov_b = (Σ11, Σ12, Σ22)`.
pub fn symmetric_from_upper(cov_a: &Vector3<f32>, cov_b: &Vector3<f32>) -> Matrix3<f32> {
    Matrix3::new(
        cov_a.x, cov_a.y, cov_a.z, //
        cov_a.y, cov_b.x, cov_b.y, //
        cov_a.z, cov_b.y, cov_b.z,
    )
}

/// Split a symmetric matrix into the `(cov_a, cov_b)` upper-triangle packing.
pub fn upper_from_symmetric(m: &Matrix3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    (
        Vector3::new(m[(0, 0)], m[(0, 1)], m[(0, 2)]),
        Vector3::new(m[(1, 1)], m[(1, 2)], m[(2, 2)]),
    )
}
