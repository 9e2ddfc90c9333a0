//! Chunk table, chunked splat index, and whole-scene packing for upload.
//!
//! Chunk table:
//! ```text
//! Header (16 bytes):
//!   - enabled chunk count: u16
//!   - padding: 14 bytes
//! Per chunk (16 bytes):
//!   - splat offset: u32   (records into the concatenated splat buffer)
//!   - splat count:  u32
//!   - SH offset:    u32   (halves into the concatenated SH blob)
//!   - SH degree:    u32
//! ```
//!
//! Splat index, one 8-byte record per draw slot:
//! ```text
//!   chunk index: u16, padding: u16, splat index: u32
//! ```

use crate::core::{Chunk, ChunkedSplatIndex, ShDegree, Splat, SplatAddressing, SplatScene};
use crate::io::splat_buffer::write_splat;
use crate::io::CodecError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use tracing::debug;

pub const CHUNK_TABLE_HEADER_SIZE: usize = 16;
pub const CHUNK_RECORD_SIZE: usize = 16;
pub const INDEX_RECORD_SIZE: usize = 8;

/// One chunk's entry in the table, with pointers replaced by offsets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkRecord {
    pub splat_offset: u32,
    pub splat_count: u32,
    pub sh_offset: u32,
    pub sh_degree: u32,
}

pub fn encode_chunk_table(records: &[ChunkRecord]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(CHUNK_TABLE_HEADER_SIZE + records.len() * CHUNK_RECORD_SIZE);
    bytes.extend_from_slice(&(records.len().min(u16::MAX as usize) as u16).to_le_bytes());
    bytes.resize(CHUNK_TABLE_HEADER_SIZE, 0);
    for r in records {
        for word in [r.splat_offset, r.splat_count, r.sh_offset, r.sh_degree] {
            // Writing into a Vec cannot fail.
            let _ = bytes.write_u32::<LittleEndian>(word);
        }
    }
    bytes
}

pub fn decode_chunk_table(bytes: &[u8]) -> Result<Vec<ChunkRecord>, CodecError> {
    let mut reader = bytes;
    let count = reader.read_u16::<LittleEndian>()? as usize;
    let expected = CHUNK_TABLE_HEADER_SIZE + count * CHUNK_RECORD_SIZE;
    if bytes.len() < expected {
        return Err(CodecError::Truncated {
            len: bytes.len(),
            record_size: CHUNK_RECORD_SIZE,
        });
    }

    let mut reader = &bytes[CHUNK_TABLE_HEADER_SIZE..];
    (0..count)
        .map(|_| {
            let record = ChunkRecord {
                splat_offset: reader.read_u32::<LittleEndian>()?,
                splat_count: reader.read_u32::<LittleEndian>()?,
                sh_offset: reader.read_u32::<LittleEndian>()?,
                sh_degree: reader.read_u32::<LittleEndian>()?,
            };
            if ShDegree::from_u32(record.sh_degree).is_none() {
                return Err(CodecError::InvalidShDegree(record.sh_degree));
            }
            Ok(record)
        })
        .collect()
}

pub fn encode_splat_index(index: &[ChunkedSplatIndex]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(index.len() * INDEX_RECORD_SIZE);
    for entry in index {
        let _ = bytes.write_u16::<LittleEndian>(entry.chunk_index);
        let _ = bytes.write_u16::<LittleEndian>(0);
        let _ = bytes.write_u32::<LittleEndian>(entry.splat_index);
    }
    bytes
}

pub fn decode_splat_index(bytes: &[u8]) -> Result<Vec<ChunkedSplatIndex>, CodecError> {
    if bytes.len() % INDEX_RECORD_SIZE != 0 {
        return Err(CodecError::Truncated {
            len: bytes.len(),
            record_size: INDEX_RECORD_SIZE,
        });
    }
    let mut reader = bytes;
    (0..bytes.len() / INDEX_RECORD_SIZE)
        .map(|_| {
            let chunk_index = reader.read_u16::<LittleEndian>()?;
            let _pad = reader.read_u16::<LittleEndian>()?;
            let splat_index = reader.read_u32::<LittleEndian>()?;
            Ok(ChunkedSplatIndex::new(chunk_index, splat_index))
        })
        .collect()
}

/// Every buffer a scene needs on the device, as raw little-endian bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedScene {
    /// All splats; chunks are concatenated in table order
    pub splats: Vec<u8>,

    /// Empty in flat mode
    pub chunk_table: Vec<u8>,
    pub chunk_records: Vec<ChunkRecord>,

    /// Empty in flat mode
    pub splat_index: Vec<u8>,

    /// All chunks' SH halves, concatenated and padded to a 4-byte multiple
    pub sh_coefficients: Vec<u8>,

    pub splat_count: u32,
}

impl PackedScene {
    pub fn chunk_count(&self) -> u32 {
        self.chunk_records.len() as u32
    }
}

fn append_splats(bytes: &mut Vec<u8>, splats: &[Splat]) {
    for splat in splats {
        let _ = write_splat(bytes, splat);
    }
}

fn append_halves(bytes: &mut Vec<u8>, halves: &[f16]) {
    for h in halves {
        bytes.extend_from_slice(&h.to_bits().to_le_bytes());
    }
}

/// Flatten a scene into upload-ready buffers.
pub fn pack_scene(scene: &SplatScene) -> PackedScene {
    let mut packed = PackedScene {
        splat_count: scene.splat_count(),
        ..PackedScene::default()
    };

    match scene.addressing() {
        SplatAddressing::Flat(splats) => append_splats(&mut packed.splats, splats),
        SplatAddressing::Chunked { chunks, index } => {
            let (mut splat_offset, mut sh_offset) = (0u32, 0u32);
            for Chunk { splats, sh_degree, sh_coefficients } in chunks {
                packed.chunk_records.push(ChunkRecord {
                    splat_offset,
                    splat_count: splats.len() as u32,
                    sh_offset,
                    sh_degree: sh_degree.as_u32(),
                });
                append_splats(&mut packed.splats, splats);
                append_halves(&mut packed.sh_coefficients, sh_coefficients);
                splat_offset += splats.len() as u32;
                sh_offset += sh_coefficients.len() as u32;
            }
            packed.chunk_table = encode_chunk_table(&packed.chunk_records);
            packed.splat_index = encode_splat_index(index);
        }
    }

    let padded = packed.sh_coefficients.len().next_multiple_of(4);
    packed.sh_coefficients.resize(padded, 0);

    debug!(
        splats = packed.splat_count,
        chunks = packed.chunk_count(),
        splat_bytes = packed.splats.len(),
        sh_bytes = packed.sh_coefficients.len(),
        "packed scene"
    );
    packed
}
