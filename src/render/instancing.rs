//! Indexed + instanced draw addressing.
//!
//! The first `indexed_splat_count` splats each get their own quad (4 vertices,
//! 6 indices) in a static index buffer; the rest of the scene is covered by
//! drawing that same index buffer again as further instances:
//!
//! ```text
//! slot = instance_id · indexed_splat_count + vertex_id / 4
//! corner = vertex_id % 4
//! ```
//!
//! The last instance may run past `splat_count`; those slots degenerate. In
//! chunked mode every lookup through the index and chunk table is
//! bounds-checked and also degenerates on failure.

use crate::core::{Chunk, ChunkedSplatIndex, ShDegree, Splat, SplatAddressing};
use half::f16;

/// Index pattern of one quad: triangles (0, 2, 1) and (1, 2, 3).
pub const QUAD_INDICES: [u32; 6] = [0, 2, 1, 1, 2, 3];

pub const VERTICES_PER_SPLAT: u32 = 4;
pub const INDICES_PER_SPLAT: u32 = 6;

/// Draw-call shape for a scene of `splat_count` splats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstancingLayout {
    pub splat_count: u32,
    pub indexed_splat_count: u32,
    pub instance_count: u32,
}

/// Where a single vertex invocation lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawSlot {
    pub slot: u32,
    pub corner: u32,
}

impl InstancingLayout {
    pub fn new(splat_count: u32, max_indexed_splat_count: u32) -> Self {
        let indexed_splat_count = splat_count.min(max_indexed_splat_count.max(1));
        let instance_count = if indexed_splat_count == 0 {
            0
        } else {
            splat_count.div_ceil(indexed_splat_count)
        };
        Self {
            splat_count,
            indexed_splat_count,
            instance_count,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.indexed_splat_count * VERTICES_PER_SPLAT
    }

    pub fn index_count(&self) -> u32 {
        self.indexed_splat_count * INDICES_PER_SPLAT
    }

    /// Static index buffer: `QUAD_INDICES` offset by 4·i for each indexed quad.
    pub fn index_buffer(&self) -> Vec<u32> {
        (0..self.indexed_splat_count)
            .flat_map(|i| QUAD_INDICES.iter().map(move |&k| k + i * VERTICES_PER_SPLAT))
            .collect()
    }

    pub fn draw_slot(&self, instance_id: u32, vertex_id: u32) -> DrawSlot {
        DrawSlot {
            slot: instance_id * self.indexed_splat_count + vertex_id / VERTICES_PER_SPLAT,
            corner: vertex_id % VERTICES_PER_SPLAT,
        }
    }

    /// Inverse of [`Self::draw_slot`] for the first corner: (instance, quad).
    pub fn instance_of(&self, slot: u32) -> (u32, u32) {
        if self.indexed_splat_count == 0 {
            return (0, 0);
        }
        (slot / self.indexed_splat_count, slot % self.indexed_splat_count)
    }

    pub fn is_in_range(&self, slot: u32) -> bool {
        slot < self.splat_count
    }

    /// Draw slots in submission order, including the out-of-range tail of the
    /// last instance.
    pub fn submitted_slots(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.instance_count).flat_map(move |instance| {
            (0..self.indexed_splat_count).map(move |quad| instance * self.indexed_splat_count + quad)
        })
    }
}

/// A draw slot resolved to its splat and SH data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedSplat<'a> {
    pub splat: &'a Splat,
    pub sh_degree: ShDegree,

    /// `None` for degree 0
    pub coefficients: Option<&'a [f16]>,
}

/// Resolve a chunked draw slot. `None` means the slot degenerates.
pub fn resolve_chunked<'a>(
    chunks: &'a [Chunk],
    index: &[ChunkedSplatIndex],
    slot: u32,
) -> Option<ResolvedSplat<'a>> {
    let entry = index.get(slot as usize)?;
    let chunk = chunks.get(entry.chunk_index as usize)?;
    let local = entry.splat_index as usize;
    let splat = chunk.splats.get(local)?;
    Some(ResolvedSplat {
        splat,
        sh_degree: chunk.sh_degree,
        coefficients: chunk.coefficients_for(local),
    })
}

/// Resolve any draw slot against a scene's addressing.
pub fn resolve_slot(addressing: &SplatAddressing, slot: u32) -> Option<ResolvedSplat<'_>> {
    match addressing {
        SplatAddressing::Flat(splats) => splats.get(slot as usize).map(|splat| ResolvedSplat {
            splat,
            sh_degree: ShDegree::Zero,
            coefficients: None,
        }),
        SplatAddressing::Chunked { chunks, index } => resolve_chunked(chunks, index, slot),
    }
}
