//! Splat-to-pixel pipeline.
//!
//! Stages, in the order a frame runs them:
//! - `projection`: 3D covariance → 2D screen-space covariance
//! - `ellipse`: 2D covariance → scaled screen-space axes (preprocessing)
//! - `instancing` + `expand`: draw slot → splat → quad corner (vertex stage)
//! - `composite`: coverage and blending (fragment stage)
//!
//! `cpu` chains them into the reference renderer; the `gpu` module runs the
//! same math in WGSL.

pub mod composite;
pub mod config;
pub mod cpu;
pub mod ellipse;
pub mod expand;
pub mod frame_ring;
pub mod instancing;
pub mod projection;
pub mod uniforms;

use thiserror::Error;

// Re-export
pub use composite::{premultiply, splat_fragment_alpha, Accumulator, ColorDepth};
pub use config::{BlendMode, BoundsRadius, ConfigError, RenderConfig};
pub use cpu::{CpuRenderer, Frame};
pub use ellipse::{decompose, eigen_decompose, preprocess_splat, EllipseAxes, PreprocessedSplat};
pub use expand::{expand_corner, is_visible, SplatVertex, CORNERS, DEGENERATE_POSITION};
pub use frame_ring::FrameRing;
pub use instancing::{resolve_chunked, resolve_slot, DrawSlot, InstancingLayout, ResolvedSplat, QUAD_INDICES};
pub use projection::{project_covariance, Covariance2D, LOW_PASS_BIAS};
pub use uniforms::{frame_uniforms, FrameUniforms, MAX_VIEW_COUNT};

/// Errors raised before a frame is drawn.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("no views to render")]
    NoViews,

    #[error("too many views: {0} (at most {max})", max = MAX_VIEW_COUNT)]
    TooManyViews(usize),

    #[error("view {0} has an empty viewport")]
    EmptyViewport(usize),

    #[error("invalid render config: {0}")]
    InvalidConfig(String),
}
