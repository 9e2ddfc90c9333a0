//! The splat record consumed by the pipeline, and the loader-facing point it is
//! encoded from.
//!
//! A [`Splat`] is the compact, upload-ready form:
//! - Position in world space (f32)
//! - RGBA color (f16), alpha already in linear [0, 1]
//! - Upper triangle of the 3D covariance (2 × 3 f16)
//!
//! Loaders (PLY, SPZ, ...) live outside this crate and hand over
//! [`SplatPoint`]s, whose color/opacity/scale may still be in the
//! training-space encodings.

use crate::core::math::{covariance_from_scale_rotation, sigmoid, symmetric_from_upper, upper_from_symmetric};
use crate::core::sh::SH_C0;
use half::f16;
use nalgebra::{Matrix3, UnitQuaternion, Vector3, Vector4};

/// One renderable Gaussian. Immutable once uploaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub position: Vector3<f32>,

    /// RGB + alpha
    pub color: [f16; 4],

    /// (Σ00, Σ01, Σ02)
    pub cov_a: [f16; 3],

    /// (Σ11, Σ12, Σ22)
    pub cov_b: [f16; 3],
}

impl Splat {
    /// Build a splat from full-precision values, rounding to half precision.
    pub fn new(
        position: Vector3<f32>,
        color: Vector4<f32>,
        cov_a: Vector3<f32>,
        cov_b: Vector3<f32>,
    ) -> Self {
        Self {
            position,
            color: [
                f16::from_f32(color.x),
                f16::from_f32(color.y),
                f16::from_f32(color.z),
                f16::from_f32(color.w),
            ],
            cov_a: [
                f16::from_f32(cov_a.x),
                f16::from_f32(cov_a.y),
                f16::from_f32(cov_a.z),
            ],
            cov_b: [
                f16::from_f32(cov_b.x),
                f16::from_f32(cov_b.y),
                f16::from_f32(cov_b.z),
            ],
        }
    }

    /// Build a splat from a full 3×3 covariance (only the upper triangle is kept).
    pub fn from_covariance(position: Vector3<f32>, color: Vector4<f32>, covariance: &Matrix3<f32>) -> Self {
        let (cov_a, cov_b) = upper_from_symmetric(covariance);
        Self::new(position, color, cov_a, cov_b)
    }

    pub fn color(&self) -> Vector4<f32> {
        Vector4::new(
            self.color[0].to_f32(),
            self.color[1].to_f32(),
            self.color[2].to_f32(),
            self.color[3].to_f32(),
        )
    }

    pub fn alpha(&self) -> f32 {
        self.color[3].to_f32()
    }

    pub fn cov_a(&self) -> Vector3<f32> {
        Vector3::new(self.cov_a[0].to_f32(), self.cov_a[1].to_f32(), self.cov_a[2].to_f32())
    }

    pub fn cov_b(&self) -> Vector3<f32> {
        Vector3::new(self.cov_b[0].to_f32(), self.cov_b[1].to_f32(), self.cov_b[2].to_f32())
    }

    /// The symmetric 3D covariance this splat encodes.
    pub fn covariance(&self) -> Matrix3<f32> {
        symmetric_from_upper(&self.cov_a(), &self.cov_b())
    }
}

/// Color as handed over by a loader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplatColor {
    /// Display-ready RGB
    Linear(Vector3<f32>),

    /// Band-0 spherical-harmonic coefficient per channel
    ShDc(Vector3<f32>),
}

/// Opacity as handed over by a loader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplatOpacity {
    Linear(f32),
    Logit(f32),
}

/// Per-axis extent as handed over by a loader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SplatScale {
    /// Standard deviation per axis
    Linear(Vector3<f32>),

    /// Natural log of the standard deviation per axis
    Exponent(Vector3<f32>),
}

/// A decoded point cloud entry before it is encoded for rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatPoint {
    pub position: Vector3<f32>,
    pub color: SplatColor,
    pub opacity: SplatOpacity,
    pub scale: SplatScale,
    pub rotation: UnitQuaternion<f32>,
}

impl SplatPoint {
    pub fn linear_color(&self) -> Vector3<f32> {
        match self.color {
            SplatColor::Linear(rgb) => rgb,
            SplatColor::ShDc(dc) => dc.map(|c| 0.5 + SH_C0 * c),
        }
    }

    pub fn linear_opacity(&self) -> f32 {
        match self.opacity {
            SplatOpacity::Linear(a) => a,
            SplatOpacity::Logit(x) => sigmoid(x),
        }
    }

    pub fn linear_scale(&self) -> Vector3<f32> {
        match self.scale {
            SplatScale::Linear(s) => s,
            SplatScale::Exponent(s) => s.map(f32::exp),
        }
    }

    /// Encode into the upload-ready record.
    pub fn encode(&self) -> Splat {
        let rgb = self.linear_color();
        let covariance = covariance_from_scale_rotation(&self.linear_scale(), &self.rotation);
        Splat::from_covariance(
            self.position,
            Vector4::new(rgb.x, rgb.y, rgb.z, self.linear_opacity()),
            &covariance,
        )
    }
}

impl From<&SplatPoint> for Splat {
    fn from(point: &SplatPoint) -> Self {
        point.encode()
    }
}
