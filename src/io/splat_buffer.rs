//! Packed splat records.
//!
//! Layout (32 bytes, little-endian, no padding):
//! ```text
//!   position: 3 × f32 (12 bytes)
//!   color:    4 × f16 ( 8 bytes)  RGB + alpha
//!   cov_a:    3 × f16 ( 6 bytes)  Σ00 Σ01 Σ02
//!   cov_b:    3 × f16 ( 6 bytes)  Σ11 Σ12 Σ22
//! ```
//!
//! A `.splat` file is a bare stream of these records. The same bytes are
//! uploaded as-is to the GPU splat buffer.

use crate::core::Splat;
use crate::io::CodecError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::info;

pub const SPLAT_RECORD_SIZE: usize = 32;

fn write_halves<W: Write>(writer: &mut W, values: &[f16]) -> std::io::Result<()> {
    for v in values {
        writer.write_u16::<LittleEndian>(v.to_bits())?;
    }
    Ok(())
}

fn read_half<R: Read>(reader: &mut R) -> std::io::Result<f16> {
    Ok(f16::from_bits(reader.read_u16::<LittleEndian>()?))
}

pub fn write_splat<W: Write>(writer: &mut W, splat: &Splat) -> std::io::Result<()> {
    writer.write_f32::<LittleEndian>(splat.position.x)?;
    writer.write_f32::<LittleEndian>(splat.position.y)?;
    writer.write_f32::<LittleEndian>(splat.position.z)?;
    write_halves(writer, &splat.color)?;
    write_halves(writer, &splat.cov_a)?;
    write_halves(writer, &splat.cov_b)?;
    Ok(())
}

pub fn read_splat<R: Read>(reader: &mut R) -> std::io::Result<Splat> {
    let x = reader.read_f32::<LittleEndian>()?;
    let y = reader.read_f32::<LittleEndian>()?;
    let z = reader.read_f32::<LittleEndian>()?;

    let mut color = [f16::ZERO; 4];
    for c in &mut color {
        *c = read_half(reader)?;
    }
    let mut cov_a = [f16::ZERO; 3];
    for c in &mut cov_a {
        *c = read_half(reader)?;
    }
    let mut cov_b = [f16::ZERO; 3];
    for c in &mut cov_b {
        *c = read_half(reader)?;
    }

    Ok(Splat {
        position: Vector3::new(x, y, z),
        color,
        cov_a,
        cov_b,
    })
}

pub fn encode_splats(splats: &[Splat]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(splats.len() * SPLAT_RECORD_SIZE);
    for splat in splats {
        // Writing into a Vec cannot fail.
        let _ = write_splat(&mut bytes, splat);
    }
    bytes
}

/// Decode a record stream. Rejects a trailing partial record and
/// non-finite positions.
pub fn decode_splats(bytes: &[u8]) -> Result<Vec<Splat>, CodecError> {
    if bytes.len() % SPLAT_RECORD_SIZE != 0 {
        return Err(CodecError::Truncated {
            len: bytes.len(),
            record_size: SPLAT_RECORD_SIZE,
        });
    }

    let mut reader = bytes;
    let mut splats = Vec::with_capacity(bytes.len() / SPLAT_RECORD_SIZE);
    for index in 0..bytes.len() / SPLAT_RECORD_SIZE {
        let splat = read_splat(&mut reader)?;
        if !splat.position.iter().all(|v| v.is_finite()) {
            return Err(CodecError::NonFinite { index });
        }
        splats.push(splat);
    }
    Ok(splats)
}

/// Save splats as a `.splat` record stream.
pub fn save_splats<P: AsRef<Path>>(path: P, splats: &[Splat]) -> Result<(), CodecError> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    for splat in splats {
        write_splat(&mut writer, splat)?;
    }
    writer.flush()?;
    info!(path = %path.as_ref().display(), splats = splats.len(), "saved splats");
    Ok(())
}

/// Load a `.splat` record stream. An empty file is an error.
pub fn load_splats<P: AsRef<Path>>(path: P) -> Result<Vec<Splat>, CodecError> {
    let file = File::open(path.as_ref())?;
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes)?;

    let splats = decode_splats(&bytes)?;
    if splats.is_empty() {
        return Err(CodecError::Empty);
    }
    info!(path = %path.as_ref().display(), splats = splats.len(), "loaded splats");
    Ok(splats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    fn sample() -> Splat {
        Splat::new(
            Vector3::new(1.5, -2.0, 0.25),
            Vector4::new(0.1, 0.2, 0.3, 0.9),
            Vector3::new(0.5, 0.01, -0.02),
            Vector3::new(0.25, 0.0, 0.125),
        )
    }

    #[test]
    fn test_record_is_32_bytes() {
        assert_eq!(encode_splats(&[sample()]).len(), SPLAT_RECORD_SIZE);
    }

    #[test]
    fn test_byte_layout() {
        let bytes = encode_splats(&[sample()]);
        assert_eq!(&bytes[0..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[12..14], &f16::from_f32(0.1).to_bits().to_le_bytes());
        assert_eq!(&bytes[26..28], &f16::from_f32(0.25).to_bits().to_le_bytes());
    }

    #[test]
    fn test_truncated_stream_rejected() {
        let mut bytes = encode_splats(&[sample(), sample()]);
        bytes.pop();
        assert!(matches!(
            decode_splats(&bytes),
            Err(CodecError::Truncated { len: 63, record_size: 32 })
        ));
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let mut bad = sample();
        bad.position.y = f32::NAN;
        let bytes = encode_splats(&[sample(), bad]);
        assert!(matches!(decode_splats(&bytes), Err(CodecError::NonFinite { index: 1 })));
    }
}
