//! GPU-side record types.
//!
//! These types are uploaded or read back as-is:
//! - `#[repr(C)]`, no pointers
//! - Layout matches the WGSL structs in `common.wgsl` and friends
//! - bytemuck Pod + Zeroable traits

use crate::render::{ColorDepth, FrameUniforms, PreprocessedSplat};
use half::f16;
use nalgebra::Vector4;

/// Per-view uniform slot size; also the dynamic offset alignment.
pub const UNIFORM_SLOT_SIZE: u64 = 256;

/// One view's uniforms, padded to a full 256-byte slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformsGPU {
    /// Column-major view → clip
    pub projection: [[f32; 4]; 4],

    /// Column-major world → view
    pub view: [[f32; 4]; 4],

    /// (x, y, z, pad)
    pub camera_position: [f32; 4],

    pub screen_size: [u32; 2],
    pub splat_count: u32,
    pub indexed_splat_count: u32,
    pub chunk_count: u32,
    pub view_index: u32,
    pub bounds_radius: f32,
    pub _pad0: u32,

    /// Premultiplied RGBA
    pub background: [f32; 4],

    pub _pad1: [u32; 16],
}

impl UniformsGPU {
    pub fn from_frame(u: &FrameUniforms, background: [f32; 4]) -> Self {
        let p = &u.view.camera_position;
        Self {
            projection: u.view.projection.into(),
            view: u.view.view.into(),
            camera_position: [p.x, p.y, p.z, 0.0],
            screen_size: u.view.screen_size,
            splat_count: u.splat_count,
            indexed_splat_count: u.indexed_splat_count,
            chunk_count: u.chunk_count,
            view_index: u.view_index,
            bounds_radius: u.bounds_radius.value(),
            _pad0: 0,
            background,
            _pad1: [0; 16],
        }
    }
}

/// Slot range and accumulator region for one accumulation pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BatchGPU {
    pub start: u32,
    pub end: u32,
    pub pixel_offset: u32,
    pub _pad: u32,
    pub _pad1: [[u32; 4]; 15],
}

impl BatchGPU {
    pub fn new(start: u32, end: u32, pixel_offset: u32) -> Self {
        Self {
            start,
            end,
            pixel_offset,
            _pad: 0,
            _pad1: [[0; 4]; 15],
        }
    }
}

/// Axes packed as two `half2` words (`pack2x16float`).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PreprocessedSplatGPU {
    pub axis1: u32,
    pub axis2: u32,
}

fn unpack_halves(word: u32) -> [f16; 2] {
    [f16::from_bits(word as u16), f16::from_bits((word >> 16) as u16)]
}

fn pack_halves(h: [f16; 2]) -> u32 {
    h[0].to_bits() as u32 | ((h[1].to_bits() as u32) << 16)
}

impl From<PreprocessedSplatGPU> for PreprocessedSplat {
    fn from(p: PreprocessedSplatGPU) -> Self {
        Self {
            axis1: unpack_halves(p.axis1),
            axis2: unpack_halves(p.axis2),
        }
    }
}

impl From<&PreprocessedSplat> for PreprocessedSplatGPU {
    fn from(p: &PreprocessedSplat) -> Self {
        Self {
            axis1: pack_halves(p.axis1),
            axis2: pack_halves(p.axis2),
        }
    }
}

/// Accumulator (and, after the resolve pass, final) pixel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AccumPixelGPU {
    pub color: [f32; 4],
    pub depth: f32,
    pub _pad: [f32; 3],
}

impl From<AccumPixelGPU> for ColorDepth {
    fn from(p: AccumPixelGPU) -> Self {
        ColorDepth::new(Vector4::from(p.color), p.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ViewUniforms;
    use crate::render::BoundsRadius;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<UniformsGPU>() as u64, UNIFORM_SLOT_SIZE);
        assert_eq!(std::mem::size_of::<BatchGPU>() as u64, UNIFORM_SLOT_SIZE);
        assert_eq!(std::mem::size_of::<PreprocessedSplatGPU>(), 8);
        assert_eq!(std::mem::size_of::<AccumPixelGPU>(), 32);
    }

    #[test]
    fn test_uniforms_are_column_major() {
        let view = ViewUniforms::look_at(
            Point3::new(1.0, 2.0, 3.0),
            Point3::origin(),
            Vector3::y(),
            1.0,
            64,
            32,
            0.1,
            10.0,
        );
        let frame = FrameUniforms {
            view: view.clone(),
            splat_count: 10,
            indexed_splat_count: 4,
            chunk_count: 0,
            view_index: 1,
            bounds_radius: BoundsRadius::Two,
        };
        let u = UniformsGPU::from_frame(&frame, [0.0; 4]);

        // Translation lives in the last column.
        assert_eq!(u.view[3][0], view.view[(0, 3)]);
        assert_eq!(u.projection[2][3], view.projection[(3, 2)]);
        assert_eq!(u.screen_size, [64, 32]);
        assert_eq!(u.bounds_radius, 2.0);
        assert_eq!(u.view_index, 1);
    }

    #[test]
    fn test_preprocessed_packing_roundtrip() {
        let p = PreprocessedSplat {
            axis1: [f16::from_f32(0.25), f16::from_f32(-0.5)],
            axis2: [f16::from_f32(0.125), f16::from_f32(2.0)],
        };
        let gpu = PreprocessedSplatGPU::from(&p);
        assert_eq!(gpu.axis1 & 0xffff, f16::from_f32(0.25).to_bits() as u32);
        assert_eq!(PreprocessedSplat::from(gpu), p);
    }
}
