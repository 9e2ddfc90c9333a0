//! GPU back-end (feature-gated).
//!
//! Runs the same pipeline as [`crate::render::cpu`] with wgpu.
//! Only available when compiled with --features gpu
//!
//! - `context` - wgpu device/queue initialization
//! - `buffers` - buffer creation and readback
//! - `types` - `#[repr(C)]` records shared with WGSL
//! - `shaders` - WGSL shader modules
//! - `renderer` - pipelines, scene upload, frame submission

mod buffers;
mod context;
mod renderer;
mod shaders;
mod types;

use crate::render::RenderError;
use thiserror::Error;

pub use context::GpuContext;
pub use renderer::{GpuRenderer, GpuScene};
pub use types::{AccumPixelGPU, BatchGPU, PreprocessedSplatGPU, UniformsGPU, UNIFORM_SLOT_SIZE};

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to find GPU adapter")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("unsupported adapter: {0}")]
    Unsupported(String),

    #[error("buffer mapping failed: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("readback channel closed")]
    ChannelClosed,

    #[error("{label} needs {size} bytes, device limit is {limit}")]
    BufferTooLarge { label: &'static str, size: u64, limit: u64 },

    #[error(transparent)]
    Render(#[from] RenderError),
}
