//! Component E: **oiDL** — an indexed list of opaque blobs or text
//! entries (§3 "oiDL file", §4.E).

use rand::RngCore;

use crate::compression::{self, CompressionType};
use crate::container::{
    self, validate_header, EncryptionType, XxFlags, MAGIC_OIDL,
};
use crate::crypto::{self, AesChunkMode, IV_LEN, KEY_LEN, TAG_LEN};
use crate::error::{Error, Result};
use crate::primitives::{ByteReader, ByteWriter, SizeWidth};

const DL_VERSION_MAJOR: u16 = 1;
const DL_VERSION: u16 = 10; // 1.0

/// What kind of entries a [`DlFile`] holds; Ascii/Utf8 entries are
/// validated at insertion time so every later read sees well-formed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlDataType {
    Data = 0,
    Ascii = 1,
    Utf8 = 2,
}

impl DlDataType {
    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(DlDataType::Data),
            1 => Ok(DlDataType::Ascii),
            2 => Ok(DlDataType::Utf8),
            _ => Err(Error::invalid_parameter(0, "unrecognized oiDL data type")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DlSettings {
    pub compression_type: CompressionType,
    pub encryption_type: EncryptionType,
    pub data_type: DlDataType,
    pub use_sha256: bool,
    pub key: Option<[u8; KEY_LEN]>,
}

impl DlSettings {
    pub fn new(data_type: DlDataType) -> Self {
        Self {
            compression_type: CompressionType::None,
            encryption_type: EncryptionType::None,
            data_type,
            use_sha256: false,
            key: None,
        }
    }
}

/// 48-bit total-size budget (§3 invariant).
const MAX_TOTAL_DATA_SIZE: u64 = (1u64 << 48) - 1;

#[derive(Debug, Clone)]
pub struct DlFile {
    pub settings: DlSettings,
    entries: Vec<Vec<u8>>,
}

impl DlFile {
    pub fn create(settings: DlSettings) -> Self {
        Self {
            settings,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_total_size(&self, extra: usize) -> Result<()> {
        let mut total: u64 = extra as u64;
        for e in &self.entries {
            total = total
                .checked_add(e.len() as u64)
                .ok_or_else(|| Error::overflow("oiDL total data size overflow"))?;
        }
        if total > MAX_TOTAL_DATA_SIZE {
            return Err(Error::out_of_bounds(
                total,
                MAX_TOTAL_DATA_SIZE,
                "oiDL total data size exceeds 48-bit budget",
            ));
        }
        Ok(())
    }

    /// `addEntry` — raw blob, requires `dataType == Data`.
    pub fn add_entry(&mut self, buf: Vec<u8>) -> Result<()> {
        if self.settings.data_type != DlDataType::Data {
            return Err(Error::invalid_operation(
                "addEntry requires dataType == Data",
            ));
        }
        self.check_total_size(buf.len())?;
        self.entries.push(buf);
        Ok(())
    }

    /// `addEntryAscii` — every byte must be `<= 0x7F`.
    pub fn add_entry_ascii(&mut self, text: impl AsRef<[u8]>) -> Result<()> {
        if !matches!(self.settings.data_type, DlDataType::Ascii | DlDataType::Utf8) {
            return Err(Error::invalid_operation(
                "addEntryAscii requires dataType in {Ascii, UTF-8}",
            ));
        }
        let bytes = text.as_ref();
        if let Some((i, &b)) = bytes.iter().enumerate().find(|(_, &b)| b > 0x7F) {
            return Err(Error::invalid_parameter(
                i as u32,
                "ASCII entry byte exceeds 0x7F",
            ));
        }
        self.check_total_size(bytes.len())?;
        self.entries.push(bytes.to_vec());
        Ok(())
    }

    /// `addEntryUTF8` — validates the bytes decode as UTF-8.
    pub fn add_entry_utf8(&mut self, bytes: Vec<u8>) -> Result<()> {
        if self.settings.data_type != DlDataType::Utf8 {
            return Err(Error::invalid_operation(
                "addEntryUTF8 requires dataType == UTF-8",
            ));
        }
        if std::str::from_utf8(&bytes).is_err() {
            return Err(Error::invalid_parameter(0, "entry is not valid UTF-8"));
        }
        self.check_total_size(bytes.len())?;
        self.entries.push(bytes);
        Ok(())
    }

    /// `write` — serialize per §4.E's layout.
    pub fn write(&self) -> Result<Vec<u8>> {
        self.write_inner(true)
    }

    /// Serialize without the leading magic number, for embedding inside
    /// oiSB/oiSH name tables (§6.4).
    pub fn write_hidden_magic(&self) -> Result<Vec<u8>> {
        self.write_inner(false)
    }

    fn write_inner(&self, with_magic: bool) -> Result<Vec<u8>> {
        if self.settings.encryption_type != EncryptionType::None && self.settings.key.is_none() {
            return Err(Error::unauthorized("encryption requested without a key"));
        }

        let payload: Vec<u8> = self.entries.iter().flat_map(|e| e.iter().copied()).collect();
        self.check_total_size(0)?;

        let max_entry_len = self.entries.iter().map(|e| e.len() as u64).max().unwrap_or(0);
        let count_width = SizeWidth::required_for(self.entries.len() as u64);
        let entry_len_width = SizeWidth::required_for(max_entry_len);
        let uncompressed_len_width = SizeWidth::required_for(payload.len() as u64);
        let is_compressed = self.settings.compression_type != CompressionType::None;
        let compressed_probe = if is_compressed {
            compression::compress(self.settings.compression_type.quality().unwrap(), &payload)?
        } else {
            Vec::new()
        };
        let compressed_len_width = SizeWidth::required_for(compressed_probe.len() as u64);

        let mut w = ByteWriter::new();
        if with_magic {
            w.write_u32(MAGIC_OIDL);
        }
        w.write_u16(DL_VERSION);

        let data_type_bits = self.settings.data_type as u8;
        let flags = XxFlags::new()
            .with_sha256(self.settings.use_sha256)
            .with_aes_chunk_mode(AesChunkMode::None)
            .with_compressed_size_width(uncompressed_len_width)
            .with_extra_bit(1, data_type_bits & 0b01 != 0)
            .with_extra_bit(2, data_type_bits & 0b10 != 0);
        w.write_u16(flags.0);
        w.write_u8(container::pack_type_byte(
            self.settings.compression_type,
            self.settings.encryption_type,
        ));

        let size_types_byte = count_width.bits()
            | (uncompressed_len_width.bits() << 2)
            | (entry_len_width.bits() << 4)
            | (compressed_len_width.bits() << 6);
        w.write_u8(size_types_byte);

        w.write_size(count_width, self.entries.len() as u64)?;
        for entry in &self.entries {
            w.write_size(entry_len_width, entry.len() as u64)?;
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

    /// `read` — parse bytes produced by [`DlFile::write`].
    ///
    /// `is_sub_file` tolerates trailing bytes beyond the parsed length
    /// (the file is embedded in a larger stream); returns the parsed file
    /// and the number of bytes actually consumed (`readLength`).
    pub fn read(buf: &[u8], key: Option<[u8; KEY_LEN]>, is_sub_file: bool) -> Result<(Self, usize)> {
        Self::read_inner(buf, key, is_sub_file, true)
    }

    /// Parse a name table embedded with `HideMagicNumber` set (§6.4).
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
            if magic != MAGIC_OIDL {
                return Err(Error::invalid_state("magic number mismatch"));
            }
        }

        let version = r.consume_u16()?;
        let flags = XxFlags(r.consume_u16()?);
        let type_byte = r.consume_u8()?;
        let (compression_type, encryption_type) = container::unpack_type_byte(type_byte)?;
        validate_header(
            MAGIC_OIDL,
            MAGIC_OIDL,
            version,
            DL_VERSION_MAJOR,
            flags,
            encryption_type,
            key.is_some(),
        )?;

        let size_types_byte = r.consume_u8()?;
        let count_width = SizeWidth::from_bits(size_types_byte);
        let uncompressed_len_width = SizeWidth::from_bits(size_types_byte >> 2);
        let entry_len_width = SizeWidth::from_bits(size_types_byte >> 4);
        let compressed_len_width = SizeWidth::from_bits(size_types_byte >> 6);

        let has_extended_info = flags.extra_bit(0);
        if has_extended_info {
            let _per_entry_extended = r.consume_u64()?;
            let extended_header_len = r.consume_u64()?;
            r.consume(extended_header_len as usize)?;
        }

        let entry_count = r.consume_size(count_width)? as usize;
        let mut entry_lens = Vec::with_capacity(entry_count);
        let mut total: u64 = 0;
        for _ in 0..entry_count {
            if has_extended_info {
                // Reserved per-entry extended bytes are skipped; the
                // exact width is not tracked by this implementation
                // since it never writes them.
            }
            let len = r.consume_size(entry_len_width)?;
            total = total
                .checked_add(len)
                .ok_or_else(|| Error::overflow("oiDL total data size overflow"))?;
            entry_lens.push(len as usize);
        }
        if total > MAX_TOTAL_DATA_SIZE {
            return Err(Error::out_of_bounds(
                total,
                MAX_TOTAL_DATA_SIZE,
                "oiDL total data size exceeds 48-bit budget",
            ));
        }

        let is_compressed = compression_type != CompressionType::None;
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

        let mut entries = Vec::with_capacity(entry_count);
        let mut cursor = 0usize;
        for len in entry_lens {
            entries.push(payload[cursor..cursor + len].to_vec());
            cursor += len;
        }

        let read_length = r.position();
        if !is_sub_file && r.remaining() > 0 {
            return Err(Error::invalid_state("trailing bytes after non-sub-file oiDL"));
        }

        let data_type_bits = (flags.extra_bit(1) as u8) | ((flags.extra_bit(2) as u8) << 1);
        let data_type = DlDataType::from_bits(data_type_bits)?;

        Ok((
            DlFile {
                settings: DlSettings {
                    compression_type,
                    encryption_type,
                    data_type,
                    use_sha256: flags.use_sha256(),
                    key,
                },
                entries,
            },
            read_length,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_entry_round_trip() {
        // S4: "é" is valid two-byte UTF-8.
        let mut file = DlFile::create(DlSettings::new(DlDataType::Utf8));
        file.add_entry_utf8(vec![0xC3, 0xA9]).unwrap();
        let bytes = file.write().unwrap();
        let (parsed, read_length) = DlFile::read(&bytes, None, false).unwrap();
        assert_eq!(read_length, bytes.len());
        assert_eq!(parsed.entries()[0], vec![0xC3, 0xA9]);
    }

    #[test]
    fn invalid_utf8_entry_rejected() {
        let mut file = DlFile::create(DlSettings::new(DlDataType::Utf8));
        let err = file.add_entry_utf8(vec![0xC3, 0x28]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn ascii_rejects_high_bytes() {
        let mut file = DlFile::create(DlSettings::new(DlDataType::Ascii));
        let err = file.add_entry_ascii([0xFF]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn data_entries_round_trip_multiple() {
        let mut file = DlFile::create(DlSettings::new(DlDataType::Data));
        file.add_entry(vec![1, 2, 3]).unwrap();
        file.add_entry(vec![]).unwrap();
        file.add_entry(vec![9; 300]).unwrap();
        let bytes = file.write().unwrap();
        let (parsed, read_length) = DlFile::read(&bytes, None, false).unwrap();
        assert_eq!(read_length, bytes.len());
        assert_eq!(parsed.entries().len(), 3);
        assert_eq!(parsed.entries()[2].len(), 300);
    }

    #[test]
    fn compressed_round_trip() {
        let mut settings = DlSettings::new(DlDataType::Data);
        settings.compression_type = CompressionType::Brotli11;
        let mut file = DlFile::create(settings);
        file.add_entry(b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec())
            .unwrap();
        let bytes = file.write().unwrap();
        let (parsed, _) = DlFile::read(&bytes, None, false).unwrap();
        assert_eq!(parsed.entries()[0].len(), 82);
    }

    #[test]
    fn encrypted_round_trip() {
        let mut settings = DlSettings::new(DlDataType::Data);
        settings.encryption_type = EncryptionType::AES256GCM;
        settings.key = Some([5u8; KEY_LEN]);
        let mut file = DlFile::create(settings);
        file.add_entry(b"secret bytes".to_vec()).unwrap();
        let bytes = file.write().unwrap();
        let (parsed, _) = DlFile::read(&bytes, Some([5u8; KEY_LEN]), false).unwrap();
        assert_eq!(parsed.entries()[0], b"secret bytes");

        let err = DlFile::read(&bytes, Some([9u8; KEY_LEN]), false).unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[test]
    fn trailing_bytes_rejected_unless_subfile() {
        let mut file = DlFile::create(DlSettings::new(DlDataType::Data));
        file.add_entry(vec![1]).unwrap();
        let mut bytes = file.write().unwrap();
        bytes.push(0xAA);
        assert!(DlFile::read(&bytes, None, false).is_err());
        let (_, read_length) = DlFile::read(&bytes, None, true).unwrap();
        assert_eq!(read_length, bytes.len() - 1);
    }
}
