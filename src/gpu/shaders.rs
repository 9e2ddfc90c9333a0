//! WGSL shader modules.
//!
//! Every pipeline is `common.wgsl` (uniforms, scene buffers, slot
//! resolution, SH, projection and decomposition) followed by its own stage:
//! - `preprocess.wgsl`: per-slot ellipse axes (compute)
//! - `splat.wgsl`: indexed + instanced quads with hardware blending
//! - `accumulate.wgsl` / `resolve.wgsl`: multi-pass accumulation (compute)

use wgpu::{Device, ShaderModule};

#[cfg(test)]
const COMMON_SHADER: &str = include_str!("common.wgsl");

pub const PREPROCESS_SHADER: &str = concat!(include_str!("common.wgsl"), include_str!("preprocess.wgsl"));

pub const SPLAT_SHADER: &str = concat!(include_str!("common.wgsl"), include_str!("splat.wgsl"));

pub const ACCUMULATE_SHADER: &str = concat!(include_str!("common.wgsl"), include_str!("accumulate.wgsl"));

pub const RESOLVE_SHADER: &str = concat!(include_str!("common.wgsl"), include_str!("resolve.wgsl"));

fn create_shader(device: &Device, label: &str, source: &'static str) -> ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

pub fn create_preprocess_shader(device: &Device) -> ShaderModule {
    create_shader(device, "Preprocess Shader", PREPROCESS_SHADER)
}

pub fn create_splat_shader(device: &Device) -> ShaderModule {
    create_shader(device, "Splat Shader", SPLAT_SHADER)
}

pub fn create_accumulate_shader(device: &Device) -> ShaderModule {
    create_shader(device, "Accumulate Shader", ACCUMULATE_SHADER)
}

pub fn create_resolve_shader(device: &Device) -> ShaderModule {
    create_shader(device, "Resolve Shader", RESOLVE_SHADER)
}
