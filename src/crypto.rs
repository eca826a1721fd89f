//! Component B: integrity and encryption primitives shared by every oiXX
//! container — CRC32C and SHA-256 for integrity, AES-256-GCM for
//! encryption.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// CRC32C (Castagnoli) checksum, used when a format's SHA-256 flag is
/// unset.
pub fn crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// SHA-256 digest, used when a format opts in via its SHA-256 flag.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `AESChunkMode` — the two reserved chunk-size bits in the oiXX flags
/// word. The reference implementation declares these but the current
/// behavior rejects any non-zero mode; we mirror that (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AesChunkMode {
    None = 0,
    Chunk10MiB = 1,
    Chunk100MiB = 2,
    Chunk500MiB = 3,
}

impl AesChunkMode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => AesChunkMode::None,
            1 => AesChunkMode::Chunk10MiB,
            2 => AesChunkMode::Chunk100MiB,
            _ => AesChunkMode::Chunk500MiB,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Reject any mode the current implementation does not back with a
    /// real chunked-AES loop. Kept as its own function so a future
    /// implementation can replace just this check.
    pub fn require_unchunked(self) -> Result<()> {
        match self {
            AesChunkMode::None => Ok(()),
            _ => Err(Error::unsupported(
                "chunked AES (non-zero chunk-size flags) is not implemented",
            )),
        }
    }
}

/// AES-256-GCM encrypt. `aad` is the associated data (the file header up
/// to and including any pre-encryption payload markers, §4.B/§6.3).
/// Returns `(ciphertext, tag)`; the IV is supplied by the caller since
/// oiXX stores it inline ahead of the tag.
pub fn aes256gcm_encrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    let mut out = cipher.encrypt(
        nonce,
        Payload {
            msg: plaintext,
            aad,
        },
    )?;
    // `aes-gcm` appends the tag to the ciphertext; oiXX stores it as a
    // separate, length-prefixing field, so split it back out.
    let tag_start = out.len() - TAG_LEN;
    let tag: [u8; TAG_LEN] = out[tag_start..].try_into().unwrap();
    out.truncate(tag_start);
    Ok((out, tag))
}

/// AES-256-GCM decrypt. Fails with `Unauthorized` on any tag mismatch —
/// never partially returns plaintext.
pub fn aes256gcm_decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &combined,
                aad,
            },
        )
        .map_err(|_| Error::unauthorized("AES-256-GCM tag mismatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32c_known_vector() {
        // "123456789" is the standard CRC32C check string.
        assert_eq!(crc32c(b"123456789"), 0xE3069283);
    }

    #[test]
    fn aes_round_trip() {
        let key = [7u8; KEY_LEN];
        let iv = [9u8; IV_LEN];
        let aad = b"oiSH header bytes";
        let plaintext = b"compressed shader payload bytes";

        let (ciphertext, tag) = aes256gcm_encrypt(&key, &iv, aad, plaintext).unwrap();
        let recovered = aes256gcm_decrypt(&key, &iv, aad, &ciphertext, &tag).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn aes_tampered_tag_is_unauthorized() {
        let key = [1u8; KEY_LEN];
        let iv = [2u8; IV_LEN];
        let aad = b"aad";
        let (ciphertext, mut tag) = aes256gcm_encrypt(&key, &iv, aad, b"hello").unwrap();
        tag[0] ^= 0xFF;
        let err = aes256gcm_decrypt(&key, &iv, aad, &ciphertext, &tag).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test]
    fn aes_tampered_ciphertext_is_unauthorized() {
        let key = [1u8; KEY_LEN];
        let iv = [2u8; IV_LEN];
        let aad = b"aad";
        let (mut ciphertext, tag) = aes256gcm_encrypt(&key, &iv, aad, b"hello").unwrap();
        ciphertext[0] ^= 0x01;
        let err = aes256gcm_decrypt(&key, &iv, aad, &ciphertext, &tag).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test]
    fn chunk_mode_rejects_nonzero() {
        assert!(AesChunkMode::None.require_unchunked().is_ok());
        assert!(AesChunkMode::Chunk10MiB.require_unchunked().is_err());
    }
}
