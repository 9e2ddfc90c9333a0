//! # splat-rs: Gaussian splat rendering pipeline in Rust
//!
//! Turns a set of 3D Gaussian splats (position, color, opacity, 3D
//! covariance) into a color + depth image for one or two (stereo) views.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - `core`: Splats, scenes (flat or chunked), cameras, spherical harmonics
//! - `io`: Packed splat records, chunk tables, scene packing for upload
//! - `render`: Projection, ellipse decomposition, quad expansion, instancing,
//!   compositing, plus the deterministic CPU renderer
//! - `gpu`: The same pipeline on wgpu (feature-gated)
//!
//! Splats are drawn in submission order. Sorting them back-to-front is the
//! caller's job; see [`core::SplatScene::ordered`].

// Core data structures and math
pub mod core;

// Binary buffer formats
pub mod io;

// Splat-to-pixel pipeline (CPU reference)
pub mod render;

// GPU acceleration (optional)
#[cfg(feature = "gpu")]
pub mod gpu;

// Re-export commonly used types at crate root for convenience
pub use core::{Splat, SplatScene, ViewUniforms};
pub use io::CodecError;
pub use render::{CpuRenderer, Frame, RenderConfig, RenderError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
