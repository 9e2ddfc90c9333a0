//! 3D covariance → 2D screen-space covariance (EWA splatting).
//!
//! Σ₂d = T · Vrk · Tᵀ with T = J · W, where
//! - W is the rotation part of the view matrix
//! - J is the perspective Jacobian at the view-space mean, in pixels
//!
//! The view-space x/z and y/z ratios are clamped to 1.3 × tan(fov/2) first,
//! since J blows up for splats near the edge of (or behind) the frustum.

use crate::core::{symmetric_from_upper, ViewUniforms};
use nalgebra::{Matrix2x3, Matrix3, Vector3};

/// Added to both diagonal terms so every splat covers at least ~1 pixel.
pub const LOW_PASS_BIAS: f32 = 0.3;

/// Frustum multiple the view-space ratios are clamped to.
pub const FRUSTUM_CLAMP: f32 = 1.3;

/// Symmetric 2×2 covariance `[[a, b], [b, d]]` in pixel units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Covariance2D {
    pub a: f32,
    pub b: f32,
    pub d: f32,
}

impl Covariance2D {
    pub fn new(a: f32, b: f32, d: f32) -> Self {
        Self { a, b, d }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.b
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.b.is_finite() && self.d.is_finite()
    }
}

/// Project a splat's packed 3D covariance into screen space.
///
/// `view_position` is the splat center in view space and must have a non-zero
/// z; splats on the camera plane are culled by the vertex stage instead.
pub fn project_covariance(
    cov_a: &Vector3<f32>,
    cov_b: &Vector3<f32>,
    view_position: &Vector3<f32>,
    view: &ViewUniforms,
) -> Covariance2D {
    let z = view_position.z;
    let inv_z = 1.0 / z;
    let lim = view.tan_half_fov() * FRUSTUM_CLAMP;

    let x = (view_position.x * inv_z).clamp(-lim.x, lim.x) * z;
    let y = (view_position.y * inv_z).clamp(-lim.y, lim.y) * z;

    let focal = view.focal();
    let inv_z2 = inv_z * inv_z;
    let j = Matrix2x3::new(
        focal.x * inv_z, 0.0, -focal.x * x * inv_z2, //
        0.0, focal.y * inv_z, -focal.y * y * inv_z2,
    );

    let w: Matrix3<f32> = view.view.fixed_view::<3, 3>(0, 0).into_owned();
    let t = j * w;
    let vrk = symmetric_from_upper(cov_a, cov_b);
    let cov = t * vrk * t.transpose();

    Covariance2D {
        a: cov[(0, 0)] + LOW_PASS_BIAS,
        b: cov[(0, 1)],
        d: cov[(1, 1)] + LOW_PASS_BIAS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn front_view() -> ViewUniforms {
        // Camera at the origin looking down -Z, 90° vertical fov, square 100 px.
        ViewUniforms::look_at(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::y(),
            std::f32::consts::FRAC_PI_2,
            100,
            100,
            0.1,
            100.0,
        )
    }

    #[test]
    fn test_isotropic_splat_on_axis() {
        let view = front_view();
        // σ² = 0.01 at distance 2: focal = 50 px, so σ_px² = 0.01 · (50 / 2)² = 6.25
        let cov = project_covariance(
            &Vector3::new(0.01, 0.0, 0.0),
            &Vector3::new(0.01, 0.0, 0.01),
            &Vector3::new(0.0, 0.0, -2.0),
            &view,
        );
        assert_relative_eq!(cov.a, 6.25 + LOW_PASS_BIAS, epsilon = 1e-4);
        assert_relative_eq!(cov.d, 6.25 + LOW_PASS_BIAS, epsilon = 1e-4);
        assert_relative_eq!(cov.b, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_covariance_keeps_low_pass_bias() {
        let cov = project_covariance(
            &Vector3::zeros(),
            &Vector3::zeros(),
            &Vector3::new(0.3, -0.2, -5.0),
            &front_view(),
        );
        assert_relative_eq!(cov.a, LOW_PASS_BIAS, epsilon = 1e-6);
        assert_relative_eq!(cov.d, LOW_PASS_BIAS, epsilon = 1e-6);
        assert!(cov.determinant() > 0.0);
    }

    #[test]
    fn test_far_off_axis_position_is_clamped() {
        let view = front_view();
        let cov_a = Vector3::new(0.0, 0.0, 0.5);
        let cov_b = Vector3::new(0.0, 0.0, 1.0);

        // x/z = 10 would dominate the Jacobian; clamped to 1.3 it matches a
        // splat sitting exactly at the clamp limit.
        let far = project_covariance(&cov_a, &cov_b, &Vector3::new(20.0, 0.0, -2.0), &view);
        let limit = project_covariance(&cov_a, &cov_b, &Vector3::new(2.6, 0.0, -2.0), &view);
        assert_relative_eq!(far.a, limit.a, epsilon = 1e-3);
        assert_relative_eq!(far.b, limit.b, epsilon = 1e-3);
    }

    #[test]
    fn test_projection_is_symmetric_under_rotation() {
        // An elongated splat rotated 90° around the view axis swaps a and d.
        let view = front_view();
        let pos = Vector3::new(0.0, 0.0, -4.0);
        let wide = project_covariance(&Vector3::new(0.2, 0.0, 0.0), &Vector3::new(0.01, 0.0, 0.01), &pos, &view);
        let tall = project_covariance(&Vector3::new(0.01, 0.0, 0.0), &Vector3::new(0.2, 0.0, 0.01), &pos, &view);
        assert_relative_eq!(wide.a, tall.d, epsilon = 1e-4);
        assert_relative_eq!(wide.d, tall.a, epsilon = 1e-4);
    }
}
