//! splat-render: Render a splat record file to PNG
//!
//! Usage:
//!   splat-render --input scene.splat --camera-json camera.json --out render.png
//!   splat-render --input scene.splat --camera-json stereo.json --config render.json --gpu

use nalgebra::Vector3;
use serde::Deserialize;
use splat_rs::core::{LookAtCamera, SplatScene, ViewUniforms};
use splat_rs::io::load_splats;
use splat_rs::render::{BlendMode, CpuRenderer, Frame, RenderConfig};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `--camera-json` holds one camera, or a `[left, right]` pair.
#[derive(Deserialize)]
#[serde(untagged)]
enum CameraFile {
    Mono(LookAtCamera),
    Stereo(Vec<LookAtCamera>),
}

struct Args {
    input: PathBuf,
    camera_json: Option<PathBuf>,
    config: Option<PathBuf>,
    out: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
    accumulate: bool,
    gpu: bool,
}

fn print_help() {
    eprintln!("Usage:");
    eprintln!("  splat-render --input <scene.splat> [--camera-json <camera.json>] [--config <render.json>]");
    eprintln!("               [--out render.png] [--width W] [--height H] [--accumulate] [--gpu]");
    eprintln!();
    eprintln!("  --camera-json  one LookAtCamera object, or an array of two for stereo");
    eprintln!("  --accumulate   use the multi-pass accumulation compositor");
    eprintln!("  --gpu          render with wgpu (requires --features gpu)");
    eprintln!();
    eprintln!("  Set RUST_LOG=debug for pipeline logs, SPLAT_GPU_TIMING=1 for GPU timings.");
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    args.next().ok_or_else(|| format!("Missing {flag} argument"))
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut input: Option<PathBuf> = None;
    let mut parsed = Args {
        input: PathBuf::new(),
        camera_json: None,
        config: None,
        out: PathBuf::from("render.png"),
        width: None,
        height: None,
        accumulate: false,
        gpu: false,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input" => input = Some(next_value(&mut args, "--input")?.into()),
            "--camera-json" => parsed.camera_json = Some(next_value(&mut args, "--camera-json")?.into()),
            "--config" => parsed.config = Some(next_value(&mut args, "--config")?.into()),
            "--out" => parsed.out = next_value(&mut args, "--out")?.into(),
            "--width" => {
                let v = next_value(&mut args, "--width")?;
                parsed.width = Some(v.parse().map_err(|_| format!("Invalid width: {v}"))?);
            }
            "--height" => {
                let v = next_value(&mut args, "--height")?;
                parsed.height = Some(v.parse().map_err(|_| format!("Invalid height: {v}"))?);
            }
            "--accumulate" => parsed.accumulate = true,
            "--gpu" => parsed.gpu = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => return Err(format!("Unknown argument: {other}")),
        }
    }

    parsed.input = input.ok_or("Missing --input argument")?;
    Ok(parsed)
}

fn load_cameras(args: &Args) -> Result<Vec<LookAtCamera>, Box<dyn Error>> {
    let mut cameras = match &args.camera_json {
        Some(path) => match serde_json::from_str::<CameraFile>(&std::fs::read_to_string(path)?)? {
            CameraFile::Mono(camera) => vec![camera],
            CameraFile::Stereo(cameras) => cameras,
        },
        None => vec![LookAtCamera {
            eye: [0.0, 0.0, 5.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov_y_degrees: 60.0,
            width: 800,
            height: 600,
            near: 0.1,
            far: 1000.0,
        }],
    };
    for camera in &mut cameras {
        camera.width = args.width.unwrap_or(camera.width);
        camera.height = args.height.unwrap_or(camera.height);
    }
    Ok(cameras)
}

/// `render.png` → `render_0.png`, `render_1.png` for stereo.
fn output_path(out: &Path, view: usize, view_count: usize) -> PathBuf {
    if view_count == 1 {
        return out.to_path_buf();
    }
    let stem = out.file_stem().and_then(|s| s.to_str()).unwrap_or("render");
    let ext = out.extension().and_then(|s| s.to_str()).unwrap_or("png");
    out.with_file_name(format!("{stem}_{view}.{ext}"))
}

#[cfg(feature = "gpu")]
fn render_gpu(config: RenderConfig, scene: &SplatScene, views: &[ViewUniforms]) -> Result<Vec<Frame>, Box<dyn Error>> {
    let mut renderer = splat_rs::gpu::GpuRenderer::new(config)?;
    let uploaded = renderer.upload(scene)?;
    Ok(renderer.render(&uploaded, views)?)
}

#[cfg(not(feature = "gpu"))]
fn render_gpu(_: RenderConfig, _: &SplatScene, _: &[ViewUniforms]) -> Result<Vec<Frame>, Box<dyn Error>> {
    Err("GPU support not enabled. Compile with --features gpu".into())
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load_json(path)?,
        None => RenderConfig::default(),
    };
    if args.accumulate {
        config.blend_mode = BlendMode::MultiPassAccumulation;
    }

    let splats = load_splats(&args.input)?;
    let views: Vec<ViewUniforms> = load_cameras(&args)?.iter().map(ViewUniforms::from).collect();
    let scene = match config.blend_mode {
        // "Over" is only correct back-to-front; stereo sorts from the eye midpoint.
        BlendMode::HardwareBlend if !views.is_empty() => {
            let eye = views.iter().map(|v| v.camera_position).sum::<Vector3<f32>>() / views.len() as f32;
            SplatScene::back_to_front(splats, &eye)?
        }
        _ => SplatScene::flat(splats)?,
    };
    info!(
        splats = scene.splat_count(),
        views = views.len(),
        blend_mode = ?config.blend_mode,
        gpu = args.gpu,
        "rendering"
    );

    let start = std::time::Instant::now();
    let frames = if args.gpu {
        render_gpu(config, &scene, &views)?
    } else {
        CpuRenderer::new(config)?.render(&scene, &views)?
    };
    info!(elapsed = ?start.elapsed(), "render complete");

    for (i, frame) in frames.iter().enumerate() {
        let path = output_path(&args.out, i, frames.len());
        frame.to_rgba_image().save(&path)?;
        println!("Saved {}×{} render to {:?}", frame.width, frame.height, path);
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    println!("splat-render v{}", splat_rs::VERSION);

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("Error: {msg}");
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
