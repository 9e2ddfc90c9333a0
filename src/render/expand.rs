//! Vertex stage: one splat corner → clip-space position.
//!
//! Culling never drops a vertex. A splat that fails the frustum / guard-band
//! test puts all four corners on [`DEGENERATE_POSITION`], which yields
//! zero-area triangles, so the draw keeps its fixed vertex count.

use crate::render::ellipse::PreprocessedSplat;
use nalgebra::{Vector2, Vector4};

/// Off-screen sentinel every corner of a culled splat collapses to.
pub const DEGENERATE_POSITION: [f32; 4] = [1.0, 1.0, 0.0, 1.0];

/// Corner offsets for vertex indices 0..4.
pub const CORNERS: [[f32; 2]; 4] = [[-1.0, -1.0], [-1.0, 1.0], [1.0, -1.0], [1.0, 1.0]];

/// Projected centers may sit up to 1.2·w off-axis before the splat is culled.
pub const GUARD_BAND: f32 = 1.2;

/// Output of the vertex stage for one corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplatVertex {
    pub position: Vector4<f32>,

    /// Corner offset in units of standard deviations
    pub relative_position: Vector2<f32>,

    /// Evaluated RGB + splat alpha (straight, not premultiplied)
    pub color: Vector4<f32>,
}

impl SplatVertex {
    pub fn degenerate() -> Self {
        Self {
            position: Vector4::from(DEGENERATE_POSITION),
            relative_position: Vector2::zeros(),
            color: Vector4::zeros(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.position == Vector4::from(DEGENERATE_POSITION)
    }
}

/// Frustum + guard-band test on the projected center. NaN fails.
pub fn is_visible(center: &Vector4<f32>) -> bool {
    let limit = GUARD_BAND * center.w;
    center.w > 0.0
        && center.z >= -center.w
        && center.x.abs() <= limit
        && center.y.abs() <= limit
}

/// Expand corner `corner` (0..4) of a splat centered at clip position `center`.
pub fn expand_corner(
    center: &Vector4<f32>,
    pre: &PreprocessedSplat,
    corner: usize,
    bounds_radius: f32,
    color: Vector4<f32>,
) -> SplatVertex {
    if !is_visible(center) {
        return SplatVertex::degenerate();
    }
    let Some(&[sx, sy]) = CORNERS.get(corner) else {
        return SplatVertex::degenerate();
    };

    let offset = (pre.axis1() * sx + pre.axis2() * sy) * center.w;
    SplatVertex {
        position: Vector4::new(center.x + offset.x, center.y + offset.y, center.z, center.w),
        relative_position: Vector2::new(sx, sy) * bounds_radius,
        color,
    }
}
