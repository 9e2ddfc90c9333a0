//! GPU type conversion tests
//!
//! These tests verify that CPU-side records convert correctly to the
//! `#[repr(C)]` GPU records. They don't require GPU hardware.

#![cfg(feature = "gpu")]

use half::f16;
use nalgebra::{Point3, Vector3, Vector4};
use splat_rs::core::ViewUniforms;
use splat_rs::gpu::{AccumPixelGPU, BatchGPU, PreprocessedSplatGPU, UniformsGPU, UNIFORM_SLOT_SIZE};
use splat_rs::render::{frame_uniforms, BoundsRadius, ColorDepth, InstancingLayout, PreprocessedSplat};

fn stereo_views() -> Vec<ViewUniforms> {
    [-0.05, 0.05]
        .into_iter()
        .map(|x| {
            ViewUniforms::look_at(
                Point3::new(x, 1.0, 4.0),
                Point3::new(x, 0.0, 0.0),
                Vector3::y(),
                1.2,
                640,
                480,
                0.1,
                100.0,
            )
        })
        .collect()
}

#[test]
fn test_uniform_slots_are_dynamic_offset_aligned() {
    assert_eq!(std::mem::size_of::<UniformsGPU>() as u64, UNIFORM_SLOT_SIZE);
    assert_eq!(std::mem::size_of::<BatchGPU>() as u64, UNIFORM_SLOT_SIZE);
    assert_eq!(UNIFORM_SLOT_SIZE % 256, 0);
}

fn word_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

#[test]
fn test_batch_bytes_match_wgsl_layout() {
    let batch = BatchGPU::new(7, 1031, 4096);
    let bytes = bytemuck::bytes_of(&batch);
    assert_eq!(bytes.len(), 256);
    assert_eq!(word_at(bytes, 0), 7);
    assert_eq!(word_at(bytes, 4), 1031);
    assert_eq!(word_at(bytes, 8), 4096);
    assert!(bytes[12..].iter().all(|&b| b == 0));
}

#[test]
fn test_uniform_bytes_match_wgsl_layout() {
    let views = stereo_views();
    let layout = InstancingLayout::new(10, 4);
    let frames = frame_uniforms(&views, &layout, 2, BoundsRadius::Two).unwrap();
    let u = UniformsGPU::from_frame(&frames[1], [0.25, 0.5, 0.75, 1.0]);
    let bytes = bytemuck::bytes_of(&u);

    // projection @0, view @64, camera_position @128, then the scalar block @144.
    assert_eq!(f32::from_bits(word_at(bytes, 128)), views[1].camera_position.x);
    assert_eq!(word_at(bytes, 144), 640);
    assert_eq!(word_at(bytes, 148), 480);
    assert_eq!(word_at(bytes, 152), 10);
    assert_eq!(word_at(bytes, 156), 4);
    assert_eq!(word_at(bytes, 160), 2);
    assert_eq!(word_at(bytes, 164), 1);
    assert_eq!(f32::from_bits(word_at(bytes, 168)), 2.0);
    assert_eq!(f32::from_bits(word_at(bytes, 176)), 0.25);
    assert_eq!(f32::from_bits(word_at(bytes, 188)), 1.0);
}

#[test]
fn test_stereo_uniforms_preserve_data() {
    let views = stereo_views();
    let layout = InstancingLayout::new(5000, 1024);
    let frames = frame_uniforms(&views, &layout, 3, BoundsRadius::Three).unwrap();
    let background = [0.0, 0.0, 0.0, 1.0];
    let gpu: Vec<UniformsGPU> = frames.iter().map(|f| UniformsGPU::from_frame(f, background)).collect();

    for (i, (u, view)) in gpu.iter().zip(&views).enumerate() {
        assert_eq!(u.view_index, i as u32);
        assert_eq!(u.splat_count, 5000);
        assert_eq!(u.indexed_splat_count, 1024);
        assert_eq!(u.chunk_count, 3);
        assert_eq!(u.screen_size, [640, 480]);
        assert_eq!(u.bounds_radius, 3.0);
        assert_eq!(u.background, background);
        assert_eq!(&u.camera_position[..3], view.camera_position.as_slice());

        // Column-major, as WGSL mat4x4 expects.
        for c in 0..4 {
            for r in 0..4 {
                assert_eq!(u.view[c][r], view.view[(r, c)]);
                assert_eq!(u.projection[c][r], view.projection[(r, c)]);
            }
        }
    }

    // Both slots upload as one contiguous block.
    let bytes: &[u8] = bytemuck::cast_slice(&gpu);
    assert_eq!(bytes.len() as u64, 2 * UNIFORM_SLOT_SIZE);
}

#[test]
fn test_preprocessed_halves_pack_low_first() {
    let pre = PreprocessedSplat {
        axis1: [f16::from_f32(0.5), f16::from_f32(-0.25)],
        axis2: [f16::from_f32(0.0625), f16::from_f32(0.125)],
    };
    let gpu = PreprocessedSplatGPU::from(&pre);

    // Matches WGSL pack2x16float: first component in the low half.
    assert_eq!(gpu.axis1 as u16, f16::from_f32(0.5).to_bits());
    assert_eq!((gpu.axis1 >> 16) as u16, f16::from_f32(-0.25).to_bits());
    assert_eq!(PreprocessedSplat::from(gpu), pre);
}

#[test]
fn test_accum_pixel_converts_to_color_depth() {
    let pixel = AccumPixelGPU {
        color: [0.25, 0.5, 0.75, 1.0],
        depth: 0.9,
        _pad: [0.0; 3],
    };
    assert_eq!(
        ColorDepth::from(pixel),
        ColorDepth::new(Vector4::new(0.25, 0.5, 0.75, 1.0), 0.9)
    );
}
