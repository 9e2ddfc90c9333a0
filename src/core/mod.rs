//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - `Splat` / `SplatPoint`: the upload-ready record and its loader-facing form
//! - `SplatScene`: flat or chunked storage with per-slot addressing
//! - `ViewUniforms`: per-view projection, view and viewport
//! - SH evaluation and small math helpers
//!
//! All types here are "pure data" - no I/O, no rendering logic.

mod camera;
mod math;
mod scene;
mod sh;
mod splat;

// Re-export public types
pub use camera::{perspective, LookAtCamera, ViewUniforms};
pub use math::{
    covariance_from_scale_rotation, quaternion_to_matrix, sigmoid,
    symmetric_from_upper, upper_from_symmetric,
};
pub use scene::{back_to_front_order, Chunk, ChunkedSplatIndex, SceneError, SplatAddressing, SplatScene};
pub use sh::{evaluate_sh, sh_basis, ShDegree, SH_C0, SH_C1, SH_C2, SH_C3};
pub use splat::{Splat, SplatColor, SplatOpacity, SplatPoint, SplatScale};
