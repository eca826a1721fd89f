//! Component D: the `oiXX` container — the header conventions shared by
//! oiDL, oiSB, oiSH and oiBC (§4.D, §6.1-§6.3).

use crate::compression::CompressionType;
use crate::crypto::AesChunkMode;
use crate::error::{Error, Result};
use crate::primitives::SizeWidth;

/// `EXXEncryptionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionType {
    None = 0,
    AES256GCM = 1,
}

pub const ENCRYPTION_TYPE_COUNT: u8 = 2;

impl EncryptionType {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(EncryptionType::None),
            1 => Ok(EncryptionType::AES256GCM),
            _ => Err(Error::invalid_parameter(0, "encryption type out of range")),
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

/// Magic numbers (§6.1), stored little-endian at the start of the file
/// unless a parent container sets `HideMagicNumber`.
pub const MAGIC_OIDL: u32 = u32::from_le_bytes(*b"oiDL");
pub const MAGIC_OISB: u32 = 0x4253_696F;
pub const MAGIC_OISH: u32 = 0x4853_696F;
pub const MAGIC_OIBC: u32 = 0x4342_696F;

/// Pack the oiXX `type` byte: `(compression << 4) | encryption`.
pub fn pack_type_byte(compression: CompressionType, encryption: EncryptionType) -> u8 {
    (compression.bits() << 4) | encryption.bits()
}

/// Unpack the oiXX `type` byte into its compression/encryption halves.
pub fn unpack_type_byte(byte: u8) -> Result<(CompressionType, EncryptionType)> {
    let compression = CompressionType::from_bits(byte >> 4)?;
    let encryption = EncryptionType::from_bits(byte & 0x0F)?;
    Ok((compression, encryption))
}

/// The shared 16-bit `flags` word: bit 0 selects SHA-256 over CRC32C,
/// bits 1-2 are the AES chunk mode, bits 3-4 are the compressed-size
/// width, remaining bits are format-specific channel toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XxFlags(pub u16);

impl XxFlags {
    pub fn new() -> Self {
        XxFlags(0)
    }

    pub fn use_sha256(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn with_sha256(mut self, on: bool) -> Self {
        if on {
            self.0 |= 1;
        } else {
            self.0 &= !1;
        }
        self
    }

    pub fn aes_chunk_mode(self) -> AesChunkMode {
        AesChunkMode::from_bits(((self.0 >> 1) & 0b11) as u8)
    }

    pub fn with_aes_chunk_mode(mut self, mode: AesChunkMode) -> Self {
        self.0 = (self.0 & !(0b11 << 1)) | ((mode.bits() as u16) << 1);
        self
    }

    pub fn compressed_size_width(self) -> SizeWidth {
        SizeWidth::from_bits(((self.0 >> 3) & 0b11) as u8)
    }

    pub fn with_compressed_size_width(mut self, width: SizeWidth) -> Self {
        self.0 = (self.0 & !(0b11 << 3)) | ((width.bits() as u16) << 3);
        self
    }

    /// Format-specific channel/feature bit, starting at bit 5.
    pub fn extra_bit(self, index: u32) -> bool {
        self.0 & (1 << (5 + index)) != 0
    }

    pub fn with_extra_bit(mut self, index: u32, on: bool) -> Self {
        let mask = 1u16 << (5 + index);
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
        self
    }
}

impl Default for XxFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// Pack a `major*10 + minor` version the way every oiXX header does
/// (§6.2).
pub fn pack_version(major: u8, minor: u8) -> u16 {
    major as u16 * 10 + minor as u16
}

pub fn version_major(version: u16) -> u16 {
    version / 10
}

/// Validation order shared by every reader (§4.D): magic, then major
/// version, then unsupported flags, then encryption range, then key
/// presence.
pub fn validate_header(
    magic: u32,
    expected_magic: u32,
    version: u16,
    expected_major: u16,
    flags: XxFlags,
    encryption: EncryptionType,
    has_key: bool,
) -> Result<()> {
    if magic != expected_magic {
        return Err(Error::invalid_state("magic number mismatch"));
    }
    if version_major(version) != expected_major {
        return Err(Error::invalid_state("major version mismatch"));
    }
    flags.aes_chunk_mode().require_unchunked()?;
    if (encryption as u8) >= ENCRYPTION_TYPE_COUNT {
        return Err(Error::invalid_parameter(0, "encryption type out of range"));
    }
    let needs_key = encryption != EncryptionType::None;
    if needs_key != has_key {
        return Err(Error::unauthorized(
            "encryption key presence does not match encryption type",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_numbers_match_ascii_le() {
        assert_eq!(MAGIC_OIDL.to_le_bytes(), *b"oiDL");
        assert_eq!(MAGIC_OISB.to_le_bytes(), *b"oiSB");
        assert_eq!(MAGIC_OISH.to_le_bytes(), *b"oiSH");
        assert_eq!(MAGIC_OIBC.to_le_bytes(), *b"oiBC");
    }

    #[test]
    fn type_byte_round_trips() {
        let byte = pack_type_byte(CompressionType::Brotli11, EncryptionType::AES256GCM);
        let (c, e) = unpack_type_byte(byte).unwrap();
        assert_eq!(c, CompressionType::Brotli11);
        assert_eq!(e, EncryptionType::AES256GCM);
    }

    #[test]
    fn flags_pack_independent_fields() {
        let flags = XxFlags::new()
            .with_sha256(true)
            .with_compressed_size_width(SizeWidth::U32)
            .with_extra_bit(0, true);
        assert!(flags.use_sha256());
        assert_eq!(flags.compressed_size_width().bits(), SizeWidth::U32.bits());
        assert!(flags.extra_bit(0));
        assert!(!flags.extra_bit(1));
    }

    #[test]
    fn validate_header_rejects_version_major_mismatch() {
        let flags = XxFlags::new();
        let err = validate_header(MAGIC_OISH, MAGIC_OISH, 21, 1, flags, EncryptionType::None, false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn validate_header_rejects_missing_key() {
        let flags = XxFlags::new();
        let err = validate_header(MAGIC_OISH, MAGIC_OISH, 12, 1, flags, EncryptionType::AES256GCM, false)
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }
}
