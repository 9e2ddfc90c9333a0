//! Screen-space ellipse of a projected splat, and the per-frame preprocessing
//! stage that produces it.
//!
//! The symmetric 2×2 covariance is decomposed analytically:
//! - λ = mean ± dist, with `dist` floored at 0.1 so a slightly negative
//!   discriminant never produces NaN
//! - the major eigenvector is `normalize(b, d - λ2)`, or an axis when b = 0
//! - the minor eigenvector is the major one rotated by -90°
//!
//! Each axis is `eigenvector · sqrt(λ) · bounds_radius`, in pixels. The stored
//! form is in NDC units (× 2 / screen size) and half precision.

use crate::core::{Splat, ViewUniforms};
use crate::render::config::BoundsRadius;
use crate::render::projection::{project_covariance, Covariance2D};
use half::f16;
use nalgebra::Vector2;

/// Lower bound on half the eigenvalue spread.
pub const MIN_EIGEN_DISTANCE: f32 = 0.1;

/// Both eigen-pairs of a [`Covariance2D`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Eigen2 {
    pub lambda1: f32,
    pub lambda2: f32,
    pub v1: Vector2<f32>,
    pub v2: Vector2<f32>,
}

pub fn eigen_decompose(cov: &Covariance2D) -> Eigen2 {
    let Covariance2D { a, b, d } = *cov;
    let det = a * d - b * b;
    let mean = 0.5 * (a + d);
    let dist = (mean * mean - det).max(0.0).sqrt().max(MIN_EIGEN_DISTANCE);
    let lambda1 = mean + dist;
    let lambda2 = mean - dist;

    let v1 = if b == 0.0 {
        if a > d {
            Vector2::new(1.0, 0.0)
        } else {
            Vector2::new(0.0, 1.0)
        }
    } else {
        Vector2::new(b, d - lambda2).normalize()
    };

    Eigen2 {
        lambda1,
        lambda2,
        v1,
        v2: Vector2::new(v1.y, -v1.x),
    }
}

/// Ellipse axes in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseAxes {
    pub axis1: Vector2<f32>,
    pub axis2: Vector2<f32>,
}

impl EllipseAxes {
    /// Σ axisᵢ · axisᵢᵀ / radius², which gives back the input covariance
    /// whenever its true eigenvalue spread is above the 0.1 floor.
    pub fn reconstruct(&self, radius: f32) -> Covariance2D {
        let r2 = radius * radius;
        let (p, q) = (self.axis1, self.axis2);
        Covariance2D {
            a: (p.x * p.x + q.x * q.x) / r2,
            b: (p.x * p.y + q.x * q.y) / r2,
            d: (p.y * p.y + q.y * q.y) / r2,
        }
    }
}

/// Decompose a screen-space covariance into two scaled, orthogonal axes.
pub fn decompose(cov: &Covariance2D, radius: f32) -> EllipseAxes {
    let e = eigen_decompose(cov);
    EllipseAxes {
        axis1: e.v1 * e.lambda1.max(0.0).sqrt() * radius,
        axis2: e.v2 * e.lambda2.max(0.0).sqrt() * radius,
    }
}

/// Per-frame, per-view ellipse axes in NDC units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PreprocessedSplat {
    pub axis1: [f16; 2],
    pub axis2: [f16; 2],
}

impl PreprocessedSplat {
    pub fn from_pixel_axes(axes: &EllipseAxes, screen_size: [u32; 2]) -> Self {
        let to_ndc = Vector2::new(
            2.0 / screen_size[0].max(1) as f32,
            2.0 / screen_size[1].max(1) as f32,
        );
        let a1 = axes.axis1.component_mul(&to_ndc);
        let a2 = axes.axis2.component_mul(&to_ndc);
        Self {
            axis1: [f16::from_f32(a1.x), f16::from_f32(a1.y)],
            axis2: [f16::from_f32(a2.x), f16::from_f32(a2.y)],
        }
    }

    pub fn axis1(&self) -> Vector2<f32> {
        Vector2::new(self.axis1[0].to_f32(), self.axis1[1].to_f32())
    }

    pub fn axis2(&self) -> Vector2<f32> {
        Vector2::new(self.axis2[0].to_f32(), self.axis2[1].to_f32())
    }

    pub fn is_finite(&self) -> bool {
        self.axis1().iter().chain(self.axis2().iter()).all(|v| v.is_finite())
    }
}

/// Preprocessing for one splat in one view.
///
/// Splats on the camera plane, or whose projection is not finite, get zero
/// axes; the vertex stage degenerates them anyway.
pub fn preprocess_splat(splat: &Splat, view: &ViewUniforms, radius: BoundsRadius) -> PreprocessedSplat {
    let view_position = view.world_to_view(&splat.position);
    if view_position.z == 0.0 || !view_position.iter().all(|v| v.is_finite()) {
        return PreprocessedSplat::default();
    }

    let cov = project_covariance(&splat.cov_a(), &splat.cov_b(), &view_position, view);
    if !cov.is_finite() {
        return PreprocessedSplat::default();
    }

    let pre = PreprocessedSplat::from_pixel_axes(&decompose(&cov, radius.value()), view.screen_size);
    if pre.is_finite() {
        pre
    } else {
        PreprocessedSplat::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diagonal_axis_policy() {
        let e = eigen_decompose(&Covariance2D::new(4.0, 0.0, 1.0));
        assert_eq!(e.v1, Vector2::new(1.0, 0.0));
        assert_eq!(e.v2, Vector2::new(0.0, -1.0));

        let e = eigen_decompose(&Covariance2D::new(1.0, 0.0, 4.0));
        assert_eq!(e.v1, Vector2::new(0.0, 1.0));
    }

    #[test]
    fn test_eigenvalues_ordered() {
        let e = eigen_decompose(&Covariance2D::new(5.0, 2.0, 3.0));
        assert!(e.lambda1 >= e.lambda2);
        assert_relative_eq!(e.lambda1 + e.lambda2, 8.0, epsilon = 1e-5);
        assert_relative_eq!(e.lambda1 * e.lambda2, 11.0, epsilon = 1e-4);
    }

    #[test]
    fn test_isotropic_uses_distance_floor() {
        // a == d, b == 0: the spread is 0, so λ = mean ± 0.1.
        let e = eigen_decompose(&Covariance2D::new(2.0, 0.0, 2.0));
        assert_relative_eq!(e.lambda1, 2.1, epsilon = 1e-6);
        assert_relative_eq!(e.lambda2, 1.9, epsilon = 1e-6);
        assert_eq!(e.v1, Vector2::new(0.0, 1.0));
    }

    #[test]
    fn test_negative_discriminant_is_finite() {
        let e = eigen_decompose(&Covariance2D::new(1.0, 1.0, 1.0 - 1e-7));
        assert!(e.lambda1.is_finite() && e.lambda2.is_finite());
        assert!(e.v1.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_reconstruction() {
        let cov = Covariance2D::new(9.0, 3.0, 4.0);
        let axes = decompose(&cov, 3.0);
        let back = axes.reconstruct(3.0);
        assert_relative_eq!(back.a, cov.a, max_relative = 1e-4);
        assert_relative_eq!(back.b, cov.b, max_relative = 1e-4);
        assert_relative_eq!(back.d, cov.d, max_relative = 1e-4);
        assert_relative_eq!(axes.axis1.dot(&axes.axis2), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_ndc_conversion() {
        let axes = EllipseAxes {
            axis1: Vector2::new(10.0, 0.0),
            axis2: Vector2::new(0.0, -5.0),
        };
        let pre = PreprocessedSplat::from_pixel_axes(&axes, [200, 100]);
        assert_relative_eq!(pre.axis1(), Vector2::new(0.1, 0.0), epsilon = 1e-4);
        assert_relative_eq!(pre.axis2(), Vector2::new(0.0, -0.1), epsilon = 1e-4);
    }
}
