//! Compositor tests
//!
//! End-to-end CPU renders checking that:
//! - Hardware blending and multi-pass accumulation agree where they should
//! - Stereo, chunked and instanced submissions match their plain equivalents
//! - Culled splats never reach the frame

use approx::assert_relative_eq;
use half::f16;
use nalgebra::{Point3, Vector3, Vector4};
use splat_rs::core::{Chunk, ChunkedSplatIndex, ShDegree, Splat, SplatScene, ViewUniforms};
use splat_rs::render::{BlendMode, CpuRenderer, Frame, RenderConfig, RenderError};

fn view_from(eye: Point3<f32>) -> ViewUniforms {
    view_with_depth_range(eye, 0.1, 100.0)
}

fn view_with_depth_range(eye: Point3<f32>, near: f32, far: f32) -> ViewUniforms {
    ViewUniforms::look_at(
        eye,
        Point3::new(eye.x, 0.0, 0.0),
        Vector3::y(),
        std::f32::consts::FRAC_PI_3,
        32,
        32,
        near,
        far,
    )
}

fn front_view() -> ViewUniforms {
    view_from(Point3::new(0.0, 0.0, 4.0))
}

fn splat(position: Vector3<f32>, rgb: Vector3<f32>, alpha: f32) -> Splat {
    Splat::new(
        position,
        Vector4::new(rgb.x, rgb.y, rgb.z, alpha),
        Vector3::new(0.2, 0.0, 0.0),
        Vector3::new(0.2, 0.0, 0.2),
    )
}

fn render(config: RenderConfig, scene: &SplatScene, views: &[ViewUniforms]) -> Vec<Frame> {
    CpuRenderer::new(config).unwrap().render(scene, views).unwrap()
}

fn config(blend_mode: BlendMode) -> RenderConfig {
    RenderConfig {
        blend_mode,
        background: [0.1, 0.2, 0.3, 1.0],
        ..RenderConfig::default()
    }
}

fn straight_rgb(frame: &Frame, x: u32, y: u32) -> Vector3<f32> {
    let c = frame.pixel(x, y).unwrap().color;
    c.xyz() / c.w
}

#[test]
fn test_single_opaque_splat_matches_between_variants() {
    let scene = SplatScene::flat(vec![splat(Vector3::zeros(), Vector3::new(0.9, 0.4, 0.1), 1.0)]).unwrap();
    let transparent = |blend_mode| RenderConfig {
        blend_mode,
        background: [0.0; 4],
        ..RenderConfig::default()
    };
    let hardware = &render(transparent(BlendMode::HardwareBlend), &scene, &[front_view()])[0];
    let accumulated = &render(transparent(BlendMode::MultiPassAccumulation), &scene, &[front_view()])[0];

    let mut covered = 0;
    for (h, a) in hardware.pixels.iter().zip(&accumulated.pixels) {
        for i in 0..4 {
            assert_relative_eq!(h.color[i], a.color[i], epsilon = 1e-5);
        }
        assert_relative_eq!(h.depth, a.depth, epsilon = 1e-5);
        if h.depth != 0.0 {
            covered += 1;
        }
    }
    assert!(covered > 0);

    // Pixel centers sit half a pixel off the splat center, so coverage is
    // just under 1; over a transparent background the straight color is exact.
    let center = hardware.pixel(16, 16).unwrap();
    assert!(center.color.w > 0.9 && center.color.w <= 1.0);
    assert_relative_eq!(straight_rgb(hardware, 16, 16), Vector3::new(0.9, 0.4, 0.1), epsilon = 0.01);
    assert!((0.0..=1.0).contains(&center.depth));
}

#[test]
fn test_overlapping_splats_agree_on_color_not_depth() {
    // Back-to-front: red behind, translucent blue in front.
    let scene = SplatScene::flat(vec![
        splat(Vector3::new(0.0, 0.0, -0.5), Vector3::new(1.0, 0.0, 0.0), 1.0),
        splat(Vector3::new(0.0, 0.0, 0.5), Vector3::new(0.0, 0.0, 1.0), 0.5),
    ])
    .unwrap();
    let hardware = &render(config(BlendMode::HardwareBlend), &scene, &[front_view()])[0];
    let accumulated = &render(config(BlendMode::MultiPassAccumulation), &scene, &[front_view()])[0];

    let (h, a) = (hardware.pixel(16, 16).unwrap(), accumulated.pixel(16, 16).unwrap());
    for i in 0..4 {
        assert_relative_eq!(h.color[i], a.color[i], epsilon = 1e-5);
    }
    assert!(h.color[0] > 0.3 && h.color[2] > 0.3);

    // Hardware keeps the last (nearest) depth; accumulation averages.
    assert!(a.depth > h.depth);
}

#[test]
fn test_empty_pixels_hold_background() {
    let scene = SplatScene::flat(vec![splat(Vector3::zeros(), Vector3::repeat(1.0), 1.0)]).unwrap();
    for mode in [BlendMode::HardwareBlend, BlendMode::MultiPassAccumulation] {
        let frame = &render(config(mode), &scene, &[front_view()])[0];
        let corner = frame.pixel(0, 0).unwrap();
        assert_eq!(corner.color, Vector4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(corner.depth, 0.0);
    }
}

#[test]
fn test_stereo_views_match_mono_renders() {
    let scene = SplatScene::flat(vec![
        splat(Vector3::new(-0.3, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 1.0),
        splat(Vector3::new(0.3, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), 0.7),
    ])
    .unwrap();
    let left = view_from(Point3::new(-0.1, 0.0, 4.0));
    let right = view_from(Point3::new(0.1, 0.0, 4.0));

    for mode in [BlendMode::HardwareBlend, BlendMode::MultiPassAccumulation] {
        let stereo = render(config(mode), &scene, &[left.clone(), right.clone()]);
        assert_eq!(stereo.len(), 2);
        assert_eq!(stereo[0], render(config(mode), &scene, &[left.clone()])[0]);
        assert_eq!(stereo[1], render(config(mode), &scene, &[right.clone()])[0]);
        assert_ne!(stereo[0], stereo[1]);
    }
}

#[test]
fn test_view_count_and_viewport_errors() {
    let scene = SplatScene::flat(vec![splat(Vector3::zeros(), Vector3::repeat(1.0), 1.0)]).unwrap();
    let mut renderer = CpuRenderer::new(RenderConfig::default()).unwrap();

    assert_eq!(renderer.render(&scene, &[]), Err(RenderError::NoViews));
    assert_eq!(
        renderer.render(&scene, &[front_view(), front_view(), front_view()]),
        Err(RenderError::TooManyViews(3))
    );

    let mut empty = front_view();
    empty.screen_size = [0, 32];
    assert_eq!(
        renderer.render(&scene, &[front_view(), empty]),
        Err(RenderError::EmptyViewport(1))
    );
}

#[test]
fn test_instance_grouping_does_not_change_output() {
    let splats: Vec<Splat> = (0..10)
        .map(|i| {
            let t = i as f32 / 9.0;
            splat(Vector3::new(t - 0.5, 0.5 - t, -t), Vector3::new(t, 1.0 - t, 0.5), 0.6)
        })
        .collect();
    let scene = SplatScene::flat(splats).unwrap();

    let full = render(RenderConfig::default(), &scene, &[front_view()]);
    for max_indexed in [1, 3, 4, 9] {
        let grouped = RenderConfig {
            max_indexed_splat_count: max_indexed,
            ..RenderConfig::default()
        };
        assert_eq!(render(grouped, &scene, &[front_view()]), full);
    }
}

#[test]
fn test_chunked_scene_matches_flat_order() {
    let a = splat(Vector3::new(-0.2, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 0.8);
    let b = splat(Vector3::new(0.2, 0.0, 0.5), Vector3::new(0.0, 0.0, 1.0), 0.8);

    // Draw order b, a through the index; chunks store them the other way round.
    let chunked = SplatScene::chunked(
        vec![Chunk::new(vec![a]), Chunk::new(vec![b])],
        vec![ChunkedSplatIndex::new(1, 0), ChunkedSplatIndex::new(0, 0)],
    )
    .unwrap();
    let flat = SplatScene::flat(vec![b, a]).unwrap();

    let view = [front_view()];
    assert_eq!(
        render(RenderConfig::default(), &chunked, &view),
        render(RenderConfig::default(), &flat, &view)
    );
}

#[test]
fn test_chunk_sh_tints_view_dependent_color() {
    let gray = splat(Vector3::zeros(), Vector3::repeat(0.5), 1.0);

    // Band 1, second coefficient pairs with +z, which points at the camera.
    let mut coefficients = vec![f16::ZERO; ShDegree::One.halves_per_splat()];
    coefficients[3] = f16::from_f32(0.5);
    coefficients[4] = f16::from_f32(-0.5);
    let chunk = Chunk::with_sh(vec![gray], ShDegree::One, coefficients).unwrap();
    let tinted = SplatScene::from_chunks(vec![chunk]).unwrap();

    let frame = &render(RenderConfig::default(), &tinted, &[front_view()])[0];
    let rgb = straight_rgb(frame, 16, 16);
    assert!(rgb.x > 0.7, "red should be boosted: {rgb:?}");
    assert!(rgb.y < 0.3, "green should be reduced: {rgb:?}");
    assert_relative_eq!(rgb.z, 0.5, epsilon = 0.01);

    let plain = &render(RenderConfig::default(), &SplatScene::flat(vec![gray]).unwrap(), &[front_view()])[0];
    assert_relative_eq!(straight_rgb(plain, 16, 16).x, 0.5, epsilon = 0.01);
}

#[test]
fn test_culled_splats_leave_frame_untouched() {
    let visible = splat(Vector3::zeros(), Vector3::new(0.2, 0.8, 0.2), 0.9);
    let at_camera = splat(Vector3::new(0.0, 0.0, 4.0), Vector3::repeat(1.0), 1.0);
    let behind = splat(Vector3::new(0.0, 0.0, 8.0), Vector3::repeat(1.0), 1.0);
    let off_screen = splat(Vector3::new(50.0, 0.0, 0.0), Vector3::repeat(1.0), 1.0);

    let view = [front_view()];
    let baseline = render(RenderConfig::default(), &SplatScene::flat(vec![visible]).unwrap(), &view);
    let cluttered = SplatScene::flat(vec![behind, visible, at_camera, off_screen]).unwrap();
    assert_eq!(render(RenderConfig::default(), &cluttered, &view), baseline);
}

#[test]
fn test_splat_beyond_far_plane_is_clipped_in_both_variants() {
    // Camera 20 units away with the far plane at 10.
    let view = [view_with_depth_range(Point3::new(0.0, 0.0, 20.0), 0.1, 10.0)];
    let scene = SplatScene::flat(vec![splat(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), 1.0)]).unwrap();

    for mode in [BlendMode::HardwareBlend, BlendMode::MultiPassAccumulation] {
        let frame = &render(config(mode), &scene, &view)[0];
        for pixel in &frame.pixels {
            assert_eq!(pixel.color, Vector4::new(0.1, 0.2, 0.3, 1.0));
            assert_eq!(pixel.depth, 0.0);
        }
    }
}

#[test]
fn test_splat_inside_near_plane_is_clipped_in_both_variants() {
    // Near plane at 2: the splat at z = 2.5 is 1.5 units from the camera.
    let view = [view_with_depth_range(Point3::new(0.0, 0.0, 4.0), 2.0, 100.0)];
    let visible = splat(Vector3::zeros(), Vector3::new(0.2, 0.8, 0.2), 0.9);
    let too_close = splat(Vector3::new(0.0, 0.0, 2.5), Vector3::new(1.0, 0.0, 0.0), 1.0);

    for mode in [BlendMode::HardwareBlend, BlendMode::MultiPassAccumulation] {
        let baseline = render(config(mode), &SplatScene::flat(vec![visible]).unwrap(), &view);
        let with_near = render(config(mode), &SplatScene::flat(vec![visible, too_close]).unwrap(), &view);
        assert_eq!(with_near, baseline);
        assert!(baseline[0].pixels.iter().any(|p| p.depth > 0.0));
    }
}

#[test]
fn test_depth_stays_in_unit_range() {
    let scene = SplatScene::flat(vec![
        splat(Vector3::new(0.0, 0.0, -50.0), Vector3::new(1.0, 0.0, 0.0), 1.0),
        splat(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), 0.5),
        splat(Vector3::new(0.0, 0.0, 3.0), Vector3::new(0.0, 0.0, 1.0), 0.5),
    ])
    .unwrap();
    for mode in [BlendMode::HardwareBlend, BlendMode::MultiPassAccumulation] {
        let frame = &render(config(mode), &scene, &[front_view()])[0];
        for pixel in &frame.pixels {
            assert!((0.0..=1.0).contains(&pixel.depth), "depth {}", pixel.depth);
        }
    }
}
