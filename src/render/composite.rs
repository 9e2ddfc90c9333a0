//! Fragment coverage and the two compositing variants.
//!
//! Colors flowing between stages are premultiplied RGBA.
//!
//! Hardware blend ("over", in draw order):
//! ```text
//! C' = C_src + C_dst · (1 - α_src)
//! ```
//!
//! Multi-pass accumulation (per pixel, strict submission order):
//! ```text
//! C' = C · (1 - α) + premultiply(c, α)
//! D' = D · (1 - α) + z · α
//! ```
//! resolved as `(C, D / C.a)`, with depth 0 where nothing was accumulated.

use nalgebra::{Vector2, Vector3, Vector4};

/// Gaussian coverage at `relative_position` (in standard deviations), or
/// `None` outside the bounds radius.
pub fn splat_fragment_alpha(relative_position: &Vector2<f32>, splat_alpha: f32, bounds_radius: f32) -> Option<f32> {
    let r2 = relative_position.norm_squared();
    if r2 > bounds_radius * bounds_radius {
        return None;
    }
    Some((-0.5 * r2).exp() * splat_alpha)
}

/// Rasterizer depth clip: fragments with NDC depth outside [0, 1] are dropped.
/// Every corner of a quad shares the center's `z/w`, so this clips whole splats.
pub fn is_depth_in_range(depth: f32) -> bool {
    (0.0..=1.0).contains(&depth)
}

pub fn premultiply(color: &Vector3<f32>, alpha: f32) -> Vector4<f32> {
    Vector4::new(color.x * alpha, color.y * alpha, color.z * alpha, alpha)
}

/// Composited color (premultiplied) and depth of one pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorDepth {
    pub color: Vector4<f32>,
    pub depth: f32,
}

impl ColorDepth {
    pub fn new(color: Vector4<f32>, depth: f32) -> Self {
        Self { color, depth }
    }

    pub fn cleared(background: [f32; 4]) -> Self {
        Self {
            color: Vector4::from(background),
            depth: 0.0,
        }
    }

    /// Fixed-function premultiplied "over". Depth is written unconditionally
    /// (compare `Always`), so back-to-front submission leaves the nearest
    /// covering splat's depth.
    pub fn blend_over(&mut self, src: &Vector4<f32>, depth: f32) {
        self.color = src + self.color * (1.0 - src.w);
        self.depth = depth;
    }
}

/// Per-pixel accumulator for the multi-pass variant.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    pub color: Vector4<f32>,
    pub depth: f32,
}

impl Accumulator {
    pub fn accumulate(&mut self, color: &Vector3<f32>, alpha: f32, depth: f32) {
        let keep = 1.0 - alpha;
        self.color = self.color * keep + premultiply(color, alpha);
        self.depth = self.depth * keep + depth * alpha;
    }

    /// Final pass: normalize depth by coverage and composite over `background`.
    pub fn resolve(&self, background: [f32; 4]) -> ColorDepth {
        let alpha = self.color.w;
        let depth = if alpha == 0.0 { 0.0 } else { self.depth / alpha };
        let bg = Vector4::from(background);
        ColorDepth {
            color: self.color + bg * (1.0 - alpha),
            depth,
        }
    }
}
