//! Render configuration shared by the CPU and GPU back-ends.
//!
//! Everything here is plain data with serde support, so a config can be kept
//! next to a camera file and loaded with `--config` on the CLI:
//!
//! ```json
//! { "bounds_radius": "Two", "blend_mode": "MultiPassAccumulation" }
//! ```
//!
//! Missing fields fall back to [`RenderConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How many standard deviations a splat's quad extends from its center.
///
/// Three keeps nearly all of the Gaussian's tail at the cost of more
/// overdraw; two rasterizes fewer empty pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundsRadius {
    Two,
    #[default]
    Three,
}

impl BoundsRadius {
    pub fn value(self) -> f32 {
        match self {
            BoundsRadius::Two => 2.0,
            BoundsRadius::Three => 3.0,
        }
    }

    pub fn squared(self) -> f32 {
        let r = self.value();
        r * r
    }
}

/// Which compositing strategy writes the final frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Premultiplied "over" in draw order. Needs back-to-front submission.
    #[default]
    HardwareBlend,

    /// Ordered per-pixel accumulation of color and alpha-weighted depth,
    /// followed by a resolve pass.
    MultiPassAccumulation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub bounds_radius: BoundsRadius,
    pub blend_mode: BlendMode,

    /// Upper bound on splats that get their own quad in the index buffer;
    /// the rest are drawn as instances of the same geometry.
    pub max_indexed_splat_count: u32,

    /// Uniform ring slots (max frames in flight)
    pub frames_in_flight: usize,

    /// Accumulator tile edge in pixels (CPU accumulation path)
    pub tile_size: u32,

    /// Splats per accumulation pass (GPU accumulation path)
    pub accumulation_batch_size: u32,

    /// Premultiplied RGBA the frame is cleared to
    pub background: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bounds_radius: BoundsRadius::Three,
            blend_mode: BlendMode::HardwareBlend,
            max_indexed_splat_count: 1024,
            frames_in_flight: 3,
            tile_size: 16,
            accumulation_batch_size: 256,
            background: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl RenderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_indexed_splat_count == 0 {
            return Err(ConfigError::Invalid("max_indexed_splat_count must be > 0".into()));
        }
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("frames_in_flight must be > 0".into()));
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be > 0".into()));
        }
        if self.accumulation_batch_size == 0 {
            return Err(ConfigError::Invalid("accumulation_batch_size must be > 0".into()));
        }
        let [r, g, b, a] = self.background;
        if !(0.0..=1.0).contains(&a) || r > a || g > a || b > a || r < 0.0 || g < 0.0 || b < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "background {:?} is not a premultiplied color",
                self.background
            )));
        }
        Ok(())
    }
}
