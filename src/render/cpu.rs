//! CPU reference renderer.
//!
//! Runs the same stages as the GPU path, one after the other, as plain
//! functions over the scene:
//! 1. Preprocess: covariance projection + ellipse decomposition per draw slot
//! 2. Draw: slot resolution, SH color and corner expansion, in submission order
//! 3. Composite: hardware-style "over", or tiled multi-pass accumulation
//!
//! Both triangles of a quad are rasterized together: a pixel is covered when
//! its NDC offset from the center, expressed in the (axis1, axis2) basis, lies
//! in [-1, 1]². That is the same coverage as the (0, 2, 1) / (1, 2, 3) pair
//! without double-blending the shared diagonal.

use crate::core::{evaluate_sh, ShDegree, SplatScene, ViewUniforms};
use crate::render::composite::{is_depth_in_range, premultiply, splat_fragment_alpha, Accumulator, ColorDepth};
use crate::render::config::{BlendMode, RenderConfig};
use crate::render::ellipse::{preprocess_splat, PreprocessedSplat};
use crate::render::expand::{expand_corner, SplatVertex};
use crate::render::frame_ring::FrameRing;
use crate::render::instancing::{resolve_slot, InstancingLayout, ResolvedSplat};
use crate::render::uniforms::{frame_uniforms, FrameUniforms};
use crate::render::RenderError;
use image::{Rgba, RgbaImage};
use nalgebra::{Matrix2, Vector2, Vector3, Vector4};
use tracing::debug;

/// Composited color (premultiplied) and depth for one view.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<ColorDepth>,
}

impl Frame {
    fn cleared(width: u32, height: u32, background: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![ColorDepth::cleared(background); width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&ColorDepth> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize)
    }

    /// Straight-alpha 8-bit image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.pixels[(y * self.width + x) as usize].color;
            let rgb = if c.w > 0.0 { c.xyz() / c.w } else { Vector3::zeros() };
            Rgba([to_u8(rgb.x), to_u8(rgb.y), to_u8(rgb.z), to_u8(c.w)])
        })
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A visible splat after the vertex stage, ready to rasterize.
#[derive(Clone, Debug)]
struct RasterQuad {
    center: Vector2<f32>,

    /// NDC offset → (sx, sy) corner coordinates
    to_corner: Matrix2<f32>,

    depth: f32,
    color: Vector3<f32>,
    alpha: f32,

    /// Pixel bounds, [x0, x1) × [y0, y1)
    bounds: [u32; 4],
}

impl RasterQuad {
    fn from_vertices(v: &[SplatVertex; 4], width: u32, height: u32) -> Option<Self> {
        let w = v[0].position.w;
        let depth = v[0].position.z / w;
        if !is_depth_in_range(depth) {
            return None;
        }
        let center = (v[0].position.xy() + v[3].position.xy()) / (2.0 * w);
        let axis1 = (v[2].position.xy() - v[0].position.xy()) / (2.0 * w);
        let axis2 = (v[1].position.xy() - v[0].position.xy()) / (2.0 * w);
        let to_corner = Matrix2::from_columns(&[axis1, axis2]).try_inverse()?;
        if !to_corner.iter().all(|m| m.is_finite()) {
            return None;
        }

        let (mut lo, mut hi) = (Vector2::repeat(f32::MAX), Vector2::repeat(f32::MIN));
        for vertex in v {
            let p = ndc_to_pixel(&(vertex.position.xy() / w), width, height);
            lo = lo.inf(&p);
            hi = hi.sup(&p);
        }
        let x0 = (lo.x - 0.5).floor().max(0.0) as u32;
        let y0 = (lo.y - 0.5).floor().max(0.0) as u32;
        let x1 = ((hi.x + 0.5).ceil().max(0.0) as u32).min(width);
        let y1 = ((hi.y + 0.5).ceil().max(0.0) as u32).min(height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        Some(Self {
            center,
            to_corner,
            depth,
            color: v[0].color.xyz(),
            alpha: v[0].color.w,
            bounds: [x0, x1, y0, y1],
        })
    }

    /// Coverage at pixel (x, y), or `None` if outside the quad or discarded.
    fn fragment_alpha(&self, x: u32, y: u32, width: u32, height: u32, bounds_radius: f32) -> Option<f32> {
        let ndc = pixel_center_to_ndc(x, y, width, height);
        let corner = self.to_corner * (ndc - self.center);
        if corner.x.abs() > 1.0 || corner.y.abs() > 1.0 {
            return None;
        }
        splat_fragment_alpha(&(corner * bounds_radius), self.alpha, bounds_radius)
    }

    fn overlaps(&self, x0: u32, x1: u32, y0: u32, y1: u32) -> bool {
        self.bounds[0] < x1 && x0 < self.bounds[1] && self.bounds[2] < y1 && y0 < self.bounds[3]
    }
}

fn ndc_to_pixel(ndc: &Vector2<f32>, width: u32, height: u32) -> Vector2<f32> {
    Vector2::new(
        (ndc.x + 1.0) * 0.5 * width as f32,
        (1.0 - ndc.y) * 0.5 * height as f32,
    )
}

fn pixel_center_to_ndc(x: u32, y: u32, width: u32, height: u32) -> Vector2<f32> {
    Vector2::new(
        (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
        1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
    )
}

/// Preprocessing pass: one entry per draw slot, written before any corner is
/// expanded. Unresolvable slots keep zero axes.
pub fn preprocess_view(scene: &SplatScene, uniforms: &FrameUniforms) -> Vec<PreprocessedSplat> {
    (0..uniforms.splat_count)
        .map(|slot| match resolve_slot(scene.addressing(), slot) {
            Some(r) => preprocess_splat(r.splat, &uniforms.view, uniforms.bounds_radius),
            None => PreprocessedSplat::default(),
        })
        .collect()
}

/// View-dependent RGB plus splat alpha, straight.
fn shade(resolved: &ResolvedSplat<'_>, view: &ViewUniforms) -> Vector4<f32> {
    let base = resolved.splat.color();
    let to_camera = view.camera_position - resolved.splat.position;
    let degree = if to_camera.norm_squared() > 0.0 {
        resolved.sh_degree
    } else {
        ShDegree::Zero
    };
    let rgb = evaluate_sh(&base.xyz(), resolved.coefficients, degree, &to_camera);
    Vector4::new(rgb.x, rgb.y, rgb.z, base.w)
}

/// Vertex stage for one draw slot: all four corners.
pub fn expand_slot(
    scene: &SplatScene,
    layout: &InstancingLayout,
    uniforms: &FrameUniforms,
    preprocessed: &[PreprocessedSplat],
    slot: u32,
) -> [SplatVertex; 4] {
    let degenerate = [SplatVertex::degenerate(); 4];
    if !layout.is_in_range(slot) {
        return degenerate;
    }
    let (Some(resolved), Some(pre)) = (resolve_slot(scene.addressing(), slot), preprocessed.get(slot as usize))
    else {
        return degenerate;
    };

    let center = uniforms.view.world_to_clip(&resolved.splat.position);
    let color = shade(&resolved, &uniforms.view);
    let radius = uniforms.bounds_radius.value();
    [0, 1, 2, 3].map(|corner| expand_corner(&center, pre, corner, radius, color))
}

fn draw_view(
    scene: &SplatScene,
    layout: &InstancingLayout,
    uniforms: &FrameUniforms,
    preprocessed: &[PreprocessedSplat],
) -> Vec<RasterQuad> {
    let (width, height) = (uniforms.view.width(), uniforms.view.height());
    layout
        .submitted_slots()
        .filter_map(|slot| {
            let vertices = expand_slot(scene, layout, uniforms, preprocessed, slot);
            if vertices[0].is_degenerate() {
                return None;
            }
            RasterQuad::from_vertices(&vertices, width, height)
        })
        .collect()
}

fn composite_hardware(quads: &[RasterQuad], uniforms: &FrameUniforms, config: &RenderConfig) -> Frame {
    let (width, height) = (uniforms.view.width(), uniforms.view.height());
    let radius = uniforms.bounds_radius.value();
    let mut frame = Frame::cleared(width, height, config.background);

    for quad in quads {
        for y in quad.bounds[2]..quad.bounds[3] {
            for x in quad.bounds[0]..quad.bounds[1] {
                if let Some(alpha) = quad.fragment_alpha(x, y, width, height, radius) {
                    let pixel = &mut frame.pixels[(y * width + x) as usize];
                    pixel.blend_over(&premultiply(&quad.color, alpha), quad.depth);
                }
            }
        }
    }
    frame
}

fn composite_accumulate(quads: &[RasterQuad], uniforms: &FrameUniforms, config: &RenderConfig) -> Frame {
    let (width, height) = (uniforms.view.width(), uniforms.view.height());
    let radius = uniforms.bounds_radius.value();
    let tile = config.tile_size.max(1);
    let mut frame = Frame::cleared(width, height, config.background);
    let mut accumulators = vec![Accumulator::default(); (tile * tile) as usize];

    for ty in (0..height).step_by(tile as usize) {
        for tx in (0..width).step_by(tile as usize) {
            let (x1, y1) = ((tx + tile).min(width), (ty + tile).min(height));
            accumulators.fill(Accumulator::default());

            for quad in quads.iter().filter(|q| q.overlaps(tx, x1, ty, y1)) {
                for y in quad.bounds[2].max(ty)..quad.bounds[3].min(y1) {
                    for x in quad.bounds[0].max(tx)..quad.bounds[1].min(x1) {
                        if let Some(alpha) = quad.fragment_alpha(x, y, width, height, radius) {
                            accumulators[((y - ty) * tile + (x - tx)) as usize]
                                .accumulate(&quad.color, alpha, quad.depth);
                        }
                    }
                }
            }

            for y in ty..y1 {
                for x in tx..x1 {
                    let acc = &accumulators[((y - ty) * tile + (x - tx)) as usize];
                    frame.pixels[(y * width + x) as usize] = acc.resolve(config.background);
                }
            }
        }
    }
    frame
}

/// Render one view of `scene` with precomputed uniforms.
pub fn render_view(
    scene: &SplatScene,
    layout: &InstancingLayout,
    uniforms: &FrameUniforms,
    config: &RenderConfig,
) -> Frame {
    let preprocessed = preprocess_view(scene, uniforms);
    let quads = draw_view(scene, layout, uniforms, &preprocessed);
    debug!(
        view = uniforms.view_index,
        slots = layout.splat_count,
        visible = quads.len(),
        "cpu draw"
    );

    match config.blend_mode {
        BlendMode::HardwareBlend => composite_hardware(&quads, uniforms, config),
        BlendMode::MultiPassAccumulation => composite_accumulate(&quads, uniforms, config),
    }
}

/// Deterministic CPU back-end.
pub struct CpuRenderer {
    config: RenderConfig,
    ring: FrameRing<Vec<FrameUniforms>>,
}

impl CpuRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        config
            .validate()
            .map_err(|e| RenderError::InvalidConfig(e.to_string()))?;
        let ring = FrameRing::new(config.frames_in_flight, |_| Vec::new());
        Ok(Self { config, ring })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn frames_rendered(&self) -> u64 {
        self.ring.frame()
    }

    /// Render every view (one, or two for stereo) of `scene`.
    pub fn render(&mut self, scene: &SplatScene, views: &[ViewUniforms]) -> Result<Vec<Frame>, RenderError> {
        let layout = InstancingLayout::new(scene.splat_count(), self.config.max_indexed_splat_count);
        let uniforms = frame_uniforms(views, &layout, scene.chunk_count(), self.config.bounds_radius)?;

        let (slot_index, slot) = self.ring.next_slot();
        *slot = uniforms;
        debug!(
            slot = slot_index,
            views = slot.len(),
            indexed = layout.indexed_splat_count,
            instances = layout.instance_count,
            "cpu frame"
        );

        Ok(slot
            .iter()
            .map(|u| render_view(scene, &layout, u, &self.config))
            .collect())
    }
}
