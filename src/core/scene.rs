//! Splat storage as seen by the renderer: either one flat array, or a table of
//! chunks addressed through a per-slot index.
//!
//! Validation happens here, before anything is uploaded. The draw stages
//! still bounds-check every lookup, since an index buffer may be refreshed by
//! an external sorter independently of the chunks it points into.

use crate::core::sh::ShDegree;
use crate::core::splat::Splat;
use half::f16;
use nalgebra::Vector3;
use thiserror::Error;
use tracing::debug;

/// Errors raised while assembling a scene.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("scene contains no splats")]
    Empty,

    #[error("too many chunks: {0} (at most {max})", max = u16::MAX)]
    TooManyChunks(usize),

    #[error("too many splats: {0} (at most {max})", max = u32::MAX)]
    TooManySplats(usize),

    #[error("splat index has {actual} entries but the chunks hold {expected} splats")]
    IndexLengthMismatch { expected: usize, actual: usize },

    #[error("splat index entry {slot} points outside the chunk table")]
    InvalidIndex { slot: usize },

    #[error("chunk of degree {degree:?} needs {expected} SH halves, got {actual}")]
    CoefficientSizeMismatch {
        degree: ShDegree,
        expected: usize,
        actual: usize,
    },

    #[error("invalid SH degree {0}")]
    InvalidShDegree(u32),
}

/// A contiguous run of splats sharing one SH degree.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub splats: Vec<Splat>,
    pub sh_degree: ShDegree,

    /// `splats.len() * sh_degree.halves_per_splat()` halves, empty for degree 0
    pub sh_coefficients: Vec<f16>,
}

impl Chunk {
    /// A chunk without higher-order SH.
    pub fn new(splats: Vec<Splat>) -> Self {
        Self {
            splats,
            sh_degree: ShDegree::Zero,
            sh_coefficients: Vec::new(),
        }
    }

    pub fn with_sh(
        splats: Vec<Splat>,
        sh_degree: ShDegree,
        sh_coefficients: Vec<f16>,
    ) -> Result<Self, SceneError> {
        let expected = splats.len() * sh_degree.halves_per_splat();
        if sh_coefficients.len() != expected {
            return Err(SceneError::CoefficientSizeMismatch {
                degree: sh_degree,
                expected,
                actual: sh_coefficients.len(),
            });
        }
        Ok(Self {
            splats,
            sh_degree,
            sh_coefficients,
        })
    }

    pub fn splat_count(&self) -> usize {
        self.splats.len()
    }

    /// This splat's coefficient slice, or `None` for degree 0 / out of range.
    pub fn coefficients_for(&self, local_index: usize) -> Option<&[f16]> {
        let stride = self.sh_degree.halves_per_splat();
        if stride == 0 {
            return None;
        }
        let start = local_index.checked_mul(stride)?;
        self.sh_coefficients.get(start..start + stride)
    }
}

/// One logical draw slot in chunked mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkedSplatIndex {
    pub chunk_index: u16,
    pub splat_index: u32,
}

impl ChunkedSplatIndex {
    pub fn new(chunk_index: u16, splat_index: u32) -> Self {
        Self {
            chunk_index,
            splat_index,
        }
    }
}

/// How draw slots map onto splats.
#[derive(Clone, Debug, PartialEq)]
pub enum SplatAddressing {
    /// Slot `d` is `splats[d]`.
    Flat(Vec<Splat>),

    /// Slot `d` is `chunks[index[d].chunk_index].splats[index[d].splat_index]`.
    Chunked {
        chunks: Vec<Chunk>,
        index: Vec<ChunkedSplatIndex>,
    },
}

/// A validated, non-empty set of splats ready to be rendered or uploaded.
#[derive(Clone, Debug, PartialEq)]
pub struct SplatScene {
    addressing: SplatAddressing,
}

impl SplatScene {
    pub fn flat(splats: Vec<Splat>) -> Result<Self, SceneError> {
        if splats.is_empty() {
            return Err(SceneError::Empty);
        }
        if splats.len() > u32::MAX as usize {
            return Err(SceneError::TooManySplats(splats.len()));
        }
        debug!(splats = splats.len(), "flat splat scene");
        Ok(Self {
            addressing: SplatAddressing::Flat(splats),
        })
    }

    pub fn chunked(chunks: Vec<Chunk>, index: Vec<ChunkedSplatIndex>) -> Result<Self, SceneError> {
        if chunks.len() > u16::MAX as usize {
            return Err(SceneError::TooManyChunks(chunks.len()));
        }
        let total: usize = chunks.iter().map(Chunk::splat_count).sum();
        if total == 0 {
            return Err(SceneError::Empty);
        }
        if total > u32::MAX as usize {
            return Err(SceneError::TooManySplats(total));
        }
        if index.len() != total {
            return Err(SceneError::IndexLengthMismatch {
                expected: total,
                actual: index.len(),
            });
        }
        if let Some(slot) = index.iter().position(|entry| {
            chunks
                .get(entry.chunk_index as usize)
                .map_or(true, |c| entry.splat_index as usize >= c.splat_count())
        }) {
            return Err(SceneError::InvalidIndex { slot });
        }
        debug!(chunks = chunks.len(), splats = total, "chunked splat scene");
        Ok(Self {
            addressing: SplatAddressing::Chunked { chunks, index },
        })
    }

    /// Every chunk's splats in chunk order, one slot each.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self, SceneError> {
        let index = chunks
            .iter()
            .enumerate()
            .flat_map(|(c, chunk)| {
                (0..chunk.splat_count() as u32).map(move |s| ChunkedSplatIndex::new(c as u16, s))
            })
            .collect();
        Self::chunked(chunks, index)
    }

    /// A flat splat array drawn in an externally supplied order (e.g. a depth
    /// sort). Expressed as one chunk plus an index.
    pub fn ordered(splats: Vec<Splat>, order: &[u32]) -> Result<Self, SceneError> {
        let index = order.iter().map(|&s| ChunkedSplatIndex::new(0, s)).collect();
        Self::chunked(vec![Chunk::new(splats)], index)
    }

    /// [`SplatScene::ordered`] with splats sorted farthest-first from `eye`,
    /// the submission order hardware "over" blending needs.
    pub fn back_to_front(splats: Vec<Splat>, eye: &Vector3<f32>) -> Result<Self, SceneError> {
        let order = back_to_front_order(&splats, eye);
        Self::ordered(splats, &order)
    }

    pub fn addressing(&self) -> &SplatAddressing {
        &self.addressing
    }

    /// Number of logical draw slots.
    pub fn splat_count(&self) -> u32 {
        match &self.addressing {
            SplatAddressing::Flat(splats) => splats.len() as u32,
            SplatAddressing::Chunked { index, .. } => index.len() as u32,
        }
    }

    /// Chunks in the table; 0 in flat mode.
    pub fn chunk_count(&self) -> u32 {
        match &self.addressing {
            SplatAddressing::Flat(_) => 0,
            SplatAddressing::Chunked { chunks, .. } => chunks.len() as u32,
        }
    }

    /// Highest SH degree of any chunk.
    pub fn max_sh_degree(&self) -> ShDegree {
        match &self.addressing {
            SplatAddressing::Flat(_) => ShDegree::Zero,
            SplatAddressing::Chunked { chunks, .. } => chunks
                .iter()
                .map(|c| c.sh_degree)
                .max()
                .unwrap_or_default(),
        }
    }
}

/// Splat indices sorted by decreasing distance from `eye`. Ties keep file order.
pub fn back_to_front_order(splats: &[Splat], eye: &Vector3<f32>) -> Vec<u32> {
    let distances: Vec<f32> = splats.iter().map(|s| (s.position - eye).norm_squared()).collect();
    let mut order: Vec<u32> = (0..splats.len() as u32).collect();
    order.sort_by(|&a, &b| distances[b as usize].total_cmp(&distances[a as usize]));
    order
}
