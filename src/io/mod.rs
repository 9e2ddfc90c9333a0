//! Binary buffer formats for loading, saving and uploading splats.
//!
//! This module handles:
//! - Packed 32-byte splat records (`.splat` files, GPU splat buffer)
//! - Chunk table and chunked splat index encoding
//! - Packing a whole `SplatScene` into upload-ready buffers

mod chunk_table;
mod splat_buffer;

use thiserror::Error;

// Re-export public types and functions
pub use chunk_table::{
    decode_chunk_table, decode_splat_index, encode_chunk_table, encode_splat_index, pack_scene,
    ChunkRecord, PackedScene, CHUNK_RECORD_SIZE, CHUNK_TABLE_HEADER_SIZE, INDEX_RECORD_SIZE,
};
pub use splat_buffer::{
    decode_splats, encode_splats, load_splats, read_splat, save_splats, write_splat,
    SPLAT_RECORD_SIZE,
};

/// Errors that can occur when decoding or loading splat buffers.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated buffer: {len} bytes is not a whole number of {record_size}-byte records")]
    Truncated { len: usize, record_size: usize },

    #[error("Non-finite position in record {index}")]
    NonFinite { index: usize },

    #[error("No splats in buffer")]
    Empty,

    #[error("Invalid SH degree: {0}")]
    InvalidShDegree(u32),
}
