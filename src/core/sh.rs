//! Spherical harmonics evaluation for view-dependent color.
//!
//! A splat's band-0 (DC) term is already baked into its RGB. Chunks that declare
//! a higher degree carry the remaining coefficients, `(degree + 1)² - 1` per
//! color channel, packed as half floats with the channel innermost:
//!
//! ```text
//! [c1.r, c1.g, c1.b, c2.r, c2.g, c2.b, ...]
//! ```

use half::f16;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const SH_C0: f32 = 0.282_094_8; // 1 / (2 sqrt(pi))
pub const SH_C1: f32 = 0.488_602_5; // sqrt(3 / (4 pi))

pub const SH_C2: [f32; 5] = [
    1.092_548_4,
    -1.092_548_4,
    0.315_391_57,
    -1.092_548_4,
    0.546_274_2,
];

pub const SH_C3: [f32; 7] = [
    -0.590_043_6,
    2.890_611_4,
    -0.457_045_8,
    0.373_176_33,
    -0.457_045_8,
    1.445_305_7,
    -0.590_043_6,
];

/// Number of SH bands a chunk stores beyond the DC term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ShDegree {
    #[default]
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
}

impl ShDegree {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Higher-order coefficients per color channel (excludes DC).
    pub fn coefficient_count(self) -> usize {
        let bands = self as usize + 1;
        bands * bands - 1
    }

    /// Half floats stored per splat for this degree.
    pub fn halves_per_splat(self) -> usize {
        self.coefficient_count() * 3
    }
}

/// Real SH basis up to degree 3 at a normalized direction.
///
/// Ordering follows the usual 3DGS convention:
/// - index 0: band 0
/// - 1..4: band 1
/// - 4..9: band 2
/// - 9..16: band 3
pub fn sh_basis(direction: &Vector3<f32>) -> [f32; 16] {
    let (x, y, z) = (direction.x, direction.y, direction.z);
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, yz, xz) = (x * y, y * z, x * z);

    [
        SH_C0,
        -SH_C1 * y,
        SH_C1 * z,
        -SH_C1 * x,
        SH_C2[0] * xy,
        SH_C2[1] * yz,
        SH_C2[2] * (2.0 * zz - xx - yy),
        SH_C2[3] * xz,
        SH_C2[4] * (xx - yy),
        SH_C3[0] * y * (3.0 * xx - yy),
        SH_C3[1] * xy * z,
        SH_C3[2] * y * (4.0 * zz - xx - yy),
        SH_C3[3] * z * (2.0 * zz - 3.0 * xx - 3.0 * yy),
        SH_C3[4] * x * (4.0 * zz - xx - yy),
        SH_C3[5] * z * (xx - yy),
        SH_C3[6] * x * (xx - 3.0 * yy),
    ]
}

/// View-dependent RGB for one splat.
///
/// `coefficients` is this splat's slice of its chunk's blob. Degree zero never
/// reads it, so `None` is fine there; a blob shorter than the degree requires
/// also falls back to the DC color. The result is clamped to [0, 1].
pub fn evaluate_sh(
    dc_color: &Vector3<f32>,
    coefficients: Option<&[f16]>,
    degree: ShDegree,
    direction: &Vector3<f32>,
) -> Vector3<f32> {
    let mut color = *dc_color;

    if degree != ShDegree::Zero {
        if let Some(coeffs) = coefficients.filter(|c| c.len() >= degree.halves_per_splat()) {
            let dir = direction.normalize();
            let basis = sh_basis(&dir);
            for i in 0..degree.coefficient_count() {
                let b = basis[i + 1];
                color.x += b * coeffs[i * 3].to_f32();
                color.y += b * coeffs[i * 3 + 1].to_f32();
                color.z += b * coeffs[i * 3 + 2].to_f32();
            }
        }
    }

    color.map(|c| c.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn halves(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    #[test]
    fn test_coefficient_counts() {
        assert_eq!(ShDegree::Zero.coefficient_count(), 0);
        assert_eq!(ShDegree::One.coefficient_count(), 3);
        assert_eq!(ShDegree::Two.coefficient_count(), 8);
        assert_eq!(ShDegree::Three.coefficient_count(), 15);
        assert_eq!(ShDegree::Three.halves_per_splat(), 45);
        assert_eq!(ShDegree::from_u32(4), None);
    }

    #[test]
    fn test_sh_basis_dc_component() {
        let b1 = sh_basis(&Vector3::new(1.0, 0.0, 0.0));
        let b2 = sh_basis(&Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(b1[0], b2[0], epsilon = 1e-6);
        assert_relative_eq!(b1[0], 0.282_094_8, epsilon = 1e-6);
    }

    #[test]
    fn test_sh_basis_band1_along_axes() {
        let b = sh_basis(&Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(b[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(b[2], SH_C1, epsilon = 1e-6);
        assert_relative_eq!(b[3], 0.0, epsilon = 1e-6);

        let b = sh_basis(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(b[3], -SH_C1, epsilon = 1e-6);
    }

    #[test]
    fn test_degree_zero_ignores_missing_coefficients() {
        let dc = Vector3::new(0.2, 0.4, 0.6);
        let c = evaluate_sh(&dc, None, ShDegree::Zero, &Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(c, dc, epsilon = 1e-6);
    }

    #[test]
    fn test_degree_one_is_view_dependent() {
        let dc = Vector3::new(0.5, 0.5, 0.5);
        // Only the z-aligned band-1 coefficient (index 1) is set, red channel.
        let coeffs = halves(&[0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let front = evaluate_sh(&dc, Some(&coeffs), ShDegree::One, &Vector3::new(0.0, 0.0, 1.0));
        let back = evaluate_sh(&dc, Some(&coeffs), ShDegree::One, &Vector3::new(0.0, 0.0, -1.0));

        assert_relative_eq!(front.x, 0.5 + SH_C1 * 0.5, epsilon = 1e-3);
        assert_relative_eq!(back.x, 0.5 - SH_C1 * 0.5, epsilon = 1e-3);
        assert_relative_eq!(front.y, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_short_blob_falls_back_to_dc() {
        let dc = Vector3::new(0.1, 0.2, 0.3);
        let coeffs = halves(&[1.0, 1.0, 1.0]);
        let c = evaluate_sh(&dc, Some(&coeffs), ShDegree::Two, &Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(c, dc, epsilon = 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let dc = Vector3::new(0.9, 0.1, 0.5);
        let coeffs = halves(&[0.0, 0.0, 0.0, 4.0, -4.0, 0.0, 0.0, 0.0, 0.0]);
        let c = evaluate_sh(&dc, Some(&coeffs), ShDegree::One, &Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(c.x, 1.0);
        assert_eq!(c.y, 0.0);
    }
}
