//! Component H: **oiBC** — a generic compressed/encrypted blob container
//! with four payload channels (§3 "oiBC file", §4.H). Where oiDL indexes
//! many same-shaped entries, oiBC holds up to four differently-typed
//! channels side by side: two opaque byte channels (`fidiA`, `fidiB`), a
//! `U16` channel (`gida`) and a `U32` channel (`leon`).

use rand::RngCore;

use crate::compression::{self, CompressionType};
use crate::container::{self, validate_header, EncryptionType, XxFlags, MAGIC_OIBC};
use crate::crypto::{self, AesChunkMode, IV_LEN, KEY_LEN, TAG_LEN};
use crate::error::{Error, Result};
use crate::primitives::{ByteReader, ByteWriter, SizeWidth};

const BC_VERSION_MAJOR: u16 = 1;
const BC_VERSION: u16 = 10; // 1.0, mirrors oiDL's current version

/// Which of the four channels a bit in the shared `flags` word's
/// format-specific range (§4.D, starting at bit 5) stands for.
const CHANNEL_COUNT: usize = 4;
const CHANNEL_FIDI_A: u32 = 0;
const CHANNEL_FIDI_B: u32 = 1;
const CHANNEL_GIDA: u32 = 2;
const CHANNEL_LEON: u32 = 3;

#[derive(Debug, Clone)]
pub struct BcSettings {
    pub compression_type: CompressionType,
    pub encryption_type: EncryptionType,
    pub use_sha256: bool,
    pub key: Option<[u8; KEY_LEN]>,
}

impl BcSettings {
    pub fn new() -> Self {
        Self {
            compression_type: CompressionType::None,
            encryption_type: EncryptionType::None,
            use_sha256: false,
            key: None,
        }
    }
}

impl Default for BcSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// `BCFile`. Channels default empty; at least one must be populated
/// before [`BcFile::write`].
#[derive(Debug, Clone)]
pub struct BcFile {
    pub settings: BcSettings,
    fidi_a: Vec<u8>,
    fidi_b: Vec<u8>,
    gida: Vec<u16>,
    leon: Vec<u32>,
}

impl BcFile {
    pub fn create(settings: BcSettings) -> Self {
        Self {
            settings,
            fidi_a: Vec::new(),
            fidi_b: Vec::new(),
            gida: Vec::new(),
            leon: Vec::new(),
        }
    }

    pub fn fidi_a(&self) -> &[u8] {
        &self.fidi_a
    }

    pub fn fidi_b(&self) -> &[u8] {
        &self.fidi_b
    }

    pub fn gida(&self) -> &[u16] {
        &self.gida
    }

    pub fn leon(&self) -> &[u32] {
        &self.leon
    }

    pub fn set_fidi_a(&mut self, data: Vec<u8>) {
        self.fidi_a = data;
    }

    pub fn set_fidi_b(&mut self, data: Vec<u8>) {
        self.fidi_b = data;
    }

    pub fn set_gida(&mut self, data: Vec<u16>) {
        self.gida = data;
    }

    pub fn set_leon(&mut self, data: Vec<u32>) {
        self.leon = data;
    }

    fn channel_present(&self) -> [bool; CHANNEL_COUNT] {
        [
            !self.fidi_a.is_empty(),
            !self.fidi_b.is_empty(),
            !self.gida.is_empty(),
            !self.leon.is_empty(),
        ]
    }

    /// `write` — serialize per §4.H (concatenated payload, compressed
    /// and/or encrypted as a whole, same as the oiXX container contract).
    pub fn write(&self) -> Result<Vec<u8>> {
        self.write_inner(true)
    }

    /// Serialize without the leading magic number, for embedding inside
    /// a parent container (§6.1 `HideMagicNumber`).
    pub fn write_hidden_magic(&self) -> Result<Vec<u8>> {
        self.write_inner(false)
    }

    fn write_inner(&self, with_magic: bool) -> Result<Vec<u8>> {
        if self.settings.encryption_type != EncryptionType::None && self.settings.key.is_none() {
            return Err(Error::unauthorized("encryption requested without a key"));
        }

        let present = self.channel_present();
        if !present.iter().any(|&p| p) {
            return Err(Error::invalid_state(
                "oiBC requires at least one populated channel to serialize",
            ));
        }

        let fidi_b_bytes: Vec<u8> = self.fidi_b.clone();
        let gida_bytes: Vec<u8> = self.gida.iter().flat_map(|v| v.to_le_bytes()).collect();
        let leon_bytes: Vec<u8> = self.leon.iter().flat_map(|v| v.to_le_bytes()).collect();
        let channels: [&[u8]; CHANNEL_COUNT] =
            [&self.fidi_a, &fidi_b_bytes, &gida_bytes, &leon_bytes];

        let mut payload = Vec::new();
        let len_widths: Vec<SizeWidth> = channels
            .iter()
            .zip(present)
            .filter(|(_, p)| *p)
            .map(|(c, _)| SizeWidth::required_for(c.len() as u64))
            .collect();

        for (channel, is_present) in channels.iter().zip(present) {
            if is_present {
                payload.extend_from_slice(channel);
            }
        }

        let is_compressed = self.settings.compression_type != CompressionType::None;
        let compressed_probe = if is_compressed {
            compression::compress(self.settings.compression_type.quality().unwrap(), &payload)?
        } else {
            Vec::new()
        };
        let uncompressed_len_width = SizeWidth::required_for(payload.len() as u64);
        let compressed_len_width = SizeWidth::required_for(compressed_probe.len() as u64);

        let mut w = ByteWriter::new();
        if with_magic {
            w.write_u32(MAGIC_OIBC);
        }
        w.write_u16(BC_VERSION);

        // Channel-present toggles occupy extra bits 0-3; bits 4-5 carry
        // the compressed-length width (the sizeTypes byte below is fully
        // spent on the four per-channel length widths, so this field has
        // nowhere else to live).
        let mut flags = XxFlags::new()
            .with_sha256(self.settings.use_sha256)
            .with_aes_chunk_mode(AesChunkMode::None)
            .with_compressed_size_width(uncompressed_len_width);
        for (i, &p) in present.iter().enumerate() {
            flags = flags.with_extra_bit(i as u32, p);
        }
        flags = flags
            .with_extra_bit(4, compressed_len_width.bits() & 0b01 != 0)
            .with_extra_bit(5, compressed_len_width.bits() & 0b10 != 0);
        w.write_u16(flags.0);
        w.write_u8(container::pack_type_byte(
            self.settings.compression_type,
            self.settings.encryption_type,
        ));

        // sizeTypes byte: two bits per present channel length, in
        // fidiA/fidiB/gida/leon order, packed low-to-high; unused
        // channel slots keep their bits zeroed.
        let mut size_types_byte = 0u8;
        let mut width_iter = len_widths.iter();
        for (i, &p) in present.iter().enumerate() {
            if p {
                let width = *width_iter.next().unwrap();
                size_types_byte |= width.bits() << (i as u8 * 2);
            }
        }
        w.write_u8(size_types_byte);

        let mut width_iter = len_widths.iter();
        for (channel, &p) in channels.iter().zip(present.iter()) {
            if p {
                let width = *width_iter.next().unwrap();
                w.write_size(width, channel.len() as u64)?;
            }
        }

        let body = if is_compressed {
            w.write_size(uncompressed_len_width, payload.len() as u64)?;
            w.write_size(compressed_len_width, compressed_probe.len() as u64)?;
            compressed_probe
        } else {
            payload
        };

        let aad = w.as_slice().to_vec();
        match self.settings.encryption_type {
            EncryptionType::None => {
                w.write(&body);
            }
            EncryptionType::AES256GCM => {
                let key = self.settings.key.expect("checked above");
                let mut iv = [0u8; IV_LEN];
                rand::thread_rng().fill_bytes(&mut iv);
                let (ciphertext, tag) = crypto::aes256gcm_encrypt(&key, &iv, &aad, &body)?;
                w.write(&iv);
                w.write(&tag);
                w.write(&ciphertext);
            }
        }

        Ok(w.into_vec())
    }

    /// `read` — parse bytes produced by [`BcFile::write`].
    pub fn read(buf: &[u8], key: Option<[u8; KEY_LEN]>, is_sub_file: bool) -> Result<(Self, usize)> {
        Self::read_inner(buf, key, is_sub_file, true)
    }

    pub fn read_hidden_magic(
        buf: &[u8],
        key: Option<[u8; KEY_LEN]>,
        is_sub_file: bool,
    ) -> Result<(Self, usize)> {
        Self::read_inner(buf, key, is_sub_file, false)
    }

    fn read_inner(
        buf: &[u8],
        key: Option<[u8; KEY_LEN]>,
        is_sub_file: bool,
        expect_magic: bool,
    ) -> Result<(Self, usize)> {
        let mut r = ByteReader::new(buf);

        if expect_magic {
            let magic = r.consume_u32()?;
            if magic != MAGIC_OIBC {
                return Err(Error::invalid_state("magic number mismatch"));
            }
        }

        let version = r.consume_u16()?;
        let flags = XxFlags(r.consume_u16()?);
        let type_byte = r.consume_u8()?;
        let (compression_type, encryption_type) = container::unpack_type_byte(type_byte)?;
        validate_header(
            MAGIC_OIBC,
            MAGIC_OIBC,
            version,
            BC_VERSION_MAJOR,
            flags,
            encryption_type,
            key.is_some(),
        )?;

        let present = [
            flags.extra_bit(CHANNEL_FIDI_A),
            flags.extra_bit(CHANNEL_FIDI_B),
            flags.extra_bit(CHANNEL_GIDA),
            flags.extra_bit(CHANNEL_LEON),
        ];
        if !present.iter().any(|&p| p) {
            return Err(Error::invalid_state(
                "oiBC header declares no populated channel",
            ));
        }

        let size_types_byte = r.consume_u8()?;
        let widths: Vec<Option<SizeWidth>> = present
            .iter()
            .enumerate()
            .map(|(i, &p)| p.then(|| SizeWidth::from_bits(size_types_byte >> (i as u8 * 2))))
            .collect();

        let mut lens = [0u64; CHANNEL_COUNT];
        for (i, width) in widths.iter().enumerate() {
            if let Some(w) = width {
                lens[i] = r.consume_size(*w)?;
            }
        }
        let total: u64 = lens
            .iter()
            .try_fold(0u64, |acc, &l| acc.checked_add(l))
            .ok_or_else(|| Error::overflow("oiBC total channel size overflow"))?;

        let is_compressed = compression_type != CompressionType::None;
        let uncompressed_len_width = flags.compressed_size_width();
        let compressed_len_width =
            SizeWidth::from_bits((flags.extra_bit(4) as u8) | ((flags.extra_bit(5) as u8) << 1));
        let (uncompressed_len, body_len) = if is_compressed {
            let uncompressed_len = r.consume_size(uncompressed_len_width)?;
            let compressed_len = r.consume_size(compressed_len_width)?;
            (Some(uncompressed_len), compressed_len as usize)
        } else {
            (None, total as usize)
        };

        let aad_end = r.position();
        let body: Vec<u8> = match encryption_type {
            EncryptionType::None => r.consume(body_len)?.to_vec(),
            EncryptionType::AES256GCM => {
                let key = key.ok_or_else(|| Error::unauthorized("missing decryption key"))?;
                let iv: [u8; IV_LEN] = r.consume(IV_LEN)?.try_into().unwrap();
                let tag: [u8; TAG_LEN] = r.consume(TAG_LEN)?.try_into().unwrap();
                let aad = &buf[..aad_end];
                let ciphertext = r.consume(body_len)?;
                crypto::aes256gcm_decrypt(&key, &iv, aad, ciphertext, &tag)?
            }
        };

        let payload = if is_compressed {
            compression::decompress(&body, uncompressed_len.unwrap())?
        } else {
            body
        };

        if payload.len() as u64 != total {
            return Err(Error::invalid_state("decoded payload size mismatch"));
        }

        let mut cursor = 0usize;
        let mut fidi_a = Vec::new();
        let mut fidi_b = Vec::new();
        let mut gida = Vec::new();
        let mut leon = Vec::new();

        if present[0] {
            let n = lens[0] as usize;
            fidi_a = payload[cursor..cursor + n].to_vec();
            cursor += n;
        }
        if present[1] {
            let n = lens[1] as usize;
            fidi_b = payload[cursor..cursor + n].to_vec();
            cursor += n;
        }
        if present[2] {
            let n = lens[2] as usize;
            if n % 2 != 0 {
                return Err(Error::invalid_state("gida channel length is not a multiple of 2"));
            }
            gida = payload[cursor..cursor + n]
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            cursor += n;
        }
        if present[3] {
            let n = lens[3] as usize;
            if n % 4 != 0 {
                return Err(Error::invalid_state("leon channel length is not a multiple of 4"));
            }
            leon = payload[cursor..cursor + n]
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            cursor += n;
        }

        let read_length = r.position();
        if !is_sub_file && r.remaining() > 0 {
            return Err(Error::invalid_state("trailing bytes after non-sub-file oiBC"));
        }

        Ok((
            BcFile {
                settings: BcSettings {
                    compression_type,
                    encryption_type,
                    use_sha256: flags.use_sha256(),
                    key,
                },
                fidi_a,
                fidi_b,
                gida,
                leon,
            },
            read_length,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_channels() {
        let mut file = BcFile::create(BcSettings::new());
        file.set_fidi_a(vec![1, 2, 3]);
        file.set_fidi_b(vec![4, 5]);
        file.set_gida(vec![100, 200, 300]);
        file.set_leon(vec![70_000, 1]);

        let bytes = file.write().unwrap();
        let (parsed, read_length) = BcFile::read(&bytes, None, false).unwrap();
        assert_eq!(read_length, bytes.len());
        assert_eq!(parsed.fidi_a(), &[1, 2, 3]);
        assert_eq!(parsed.fidi_b(), &[4, 5]);
        assert_eq!(parsed.gida(), &[100, 200, 300]);
        assert_eq!(parsed.leon(), &[70_000, 1]);
    }

    #[test]
    fn round_trips_single_channel() {
        let mut file = BcFile::create(BcSettings::new());
        file.set_leon(vec![1, 2, 3, 4]);
        let bytes = file.write().unwrap();
        let (parsed, _) = BcFile::read(&bytes, None, false).unwrap();
        assert!(parsed.fidi_a().is_empty());
        assert!(parsed.fidi_b().is_empty());
        assert!(parsed.gida().is_empty());
        assert_eq!(parsed.leon(), &[1, 2, 3, 4]);
    }

    #[test]
    fn no_channels_rejected() {
        let file = BcFile::create(BcSettings::new());
        assert!(file.write().is_err());
    }

    #[test]
    fn compressed_round_trip() {
        let mut settings = BcSettings::new();
        settings.compression_type = CompressionType::Brotli11;
        let mut file = BcFile::create(settings);
        file.set_fidi_a(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec());
        let bytes = file.write().unwrap();
        let (parsed, _) = BcFile::read(&bytes, None, false).unwrap();
        assert_eq!(parsed.fidi_a().len(), 82);
    }

    #[test]
    fn encrypted_round_trip() {
        let mut settings = BcSettings::new();
        settings.encryption_type = EncryptionType::AES256GCM;
        settings.key = Some([3u8; KEY_LEN]);
        let mut file = BcFile::create(settings);
        file.set_gida(vec![1, 2, 3]);
        let bytes = file.write().unwrap();
        let (parsed, _) = BcFile::read(&bytes, Some([3u8; KEY_LEN]), false).unwrap();
        assert_eq!(parsed.gida(), &[1, 2, 3]);
        assert!(BcFile::read(&bytes, Some([9u8; KEY_LEN]), false).is_err());
    }
}
