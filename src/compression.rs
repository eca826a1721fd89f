//! Component C: the Brotli compression codec shim.
//!
//! The reference implementation treats the compressor as an external
//! library contract: `compress(level, src) -> dst` and `decompress(src) ->
//! dst`, with the decompressed length stored separately by the caller
//! (the oiXX container keeps it in its own size field, §4.D). This module
//! is that contract, backed by the `brotli` crate.

use std::io::Write;

use crate::error::{Error, Result};

/// `EXXCompressionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Brotli11 = 1,
    Brotli1 = 2,
}

impl CompressionType {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Brotli11),
            2 => Ok(CompressionType::Brotli1),
            other => Err(Error::invalid_parameter(
                0,
                match other {
                    _ => "unrecognized compression type",
                },
            )),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn quality(self) -> Option<u32> {
        match self {
            CompressionType::None => None,
            CompressionType::Brotli11 => Some(11),
            CompressionType::Brotli1 => Some(1),
        }
    }
}

/// Compress `src` at the given Brotli quality level (1 = fast, 11 =
/// maximum, matching `EXXCompressionType`).
pub fn compress(level: u32, src: &[u8]) -> Result<Vec<u8>> {
    let params = brotli::enc::BrotliEncoderParams {
        quality: level as i32,
        ..Default::default()
    };
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::with_params(&mut out, 4096, &params);
        writer
            .write_all(src)
            .map_err(|_| Error::invalid_state("brotli compression failed"))?;
    }
    Ok(out)
}

/// Decompress `src`. `expected_len` (the format's stored uncompressed
/// size) is used only to pre-size the output buffer; the actual output is
/// whatever the stream decodes to.
pub fn decompress(src: &[u8], expected_len: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len as usize);
    let mut reader = brotli::Decompressor::new(src, 4096);
    std::io::copy(&mut reader, &mut out).map_err(|_| Error::invalid_state("brotli decompression failed"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_level_11() {
        let src = b"the quick brown fox jumps over the lazy dog ".repeat(64);
        let compressed = compress(11, &src).unwrap();
        let decompressed = decompress(&compressed, src.len() as u64).unwrap();
        assert_eq!(decompressed, src);
    }

    #[test]
    fn round_trips_level_1() {
        let src = b"shader bytecode payload".repeat(8);
        let compressed = compress(1, &src).unwrap();
        let decompressed = decompress(&compressed, src.len() as u64).unwrap();
        assert_eq!(decompressed, src);
    }

    #[test]
    fn type_from_bits() {
        assert_eq!(CompressionType::from_bits(0).unwrap(), CompressionType::None);
        assert_eq!(CompressionType::from_bits(1).unwrap(), CompressionType::Brotli11);
        assert!(CompressionType::from_bits(3).is_err());
    }
}
