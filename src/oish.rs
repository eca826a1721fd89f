//! Component G: **oiSH** — a compiled shader package. One or more binary
//! targets (SPIR-V, DXIL) plus entry points describing how each target's
//! shader stages wire together (§4.G).

use bitflags::bitflags;

use crate::container::MAGIC_OISH;
use crate::error::{Error, Result};
use crate::oidl::{DlDataType, DlFile, DlSettings};
use crate::primitives::{ByteReader, ByteWriter, SizeWidth};

const SH_VERSION_BYTE: u8 = 12; // 1.2

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ShSettingsFlags: u8 {
        const HIDE_MAGIC_NUMBER = 1 << 0;
        const IS_UTF8 = 1 << 1;
    }
}

/// `ESHExtension` — capabilities an entry point may depend on.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EshExtension: u16 {
        const F64 = 1 << 0;
        const I64 = 1 << 1;
        const F16 = 1 << 2;
        const I16 = 1 << 3;
        const ATOMIC_I64 = 1 << 4;
        const ATOMIC_F32 = 1 << 5;
        const ATOMIC_F64 = 1 << 6;
        const SUBGROUP_ARITHMETIC = 1 << 7;
        const SUBGROUP_SHUFFLE = 1 << 8;
        const RAY_QUERY = 1 << 9;
        const RAY_MICROMAP_OPACITY = 1 << 10;
        const RAY_MICROMAP_DISPLACEMENT = 1 << 11;
        const RAY_MOTION_BLUR = 1 << 12;
        const RAY_REORDER = 1 << 13;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EshBinaryType {
    Spirv = 0,
    Dxil = 1,
}

pub const ESH_BINARY_TYPE_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EshPipelineStage {
    Vertex = 0,
    Pixel = 1,
    Compute = 2,
    GeometryExt = 3,
    Hull = 4,
    Domain = 5,
    MeshExt = 6,
    TaskExt = 7,
    RaygenExt = 8,
    CallableExt = 9,
    MissExt = 10,
    ClosestHitExt = 11,
    AnyHitExt = 12,
    IntersectionExt = 13,
}

const SH_PIPELINE_STAGE_COUNT: u8 = 14;
const RT_START: u8 = EshPipelineStage::RaygenExt as u8;
const RT_END: u8 = EshPipelineStage::IntersectionExt as u8;

impl EshPipelineStage {
    fn from_bits(bits: u8) -> Result<Self> {
        use EshPipelineStage::*;
        Ok(match bits {
            0 => Vertex,
            1 => Pixel,
            2 => Compute,
            3 => GeometryExt,
            4 => Hull,
            5 => Domain,
            6 => MeshExt,
            7 => TaskExt,
            8 => RaygenExt,
            9 => CallableExt,
            10 => MissExt,
            11 => ClosestHitExt,
            12 => AnyHitExt,
            13 => IntersectionExt,
            _ => return Err(Error::invalid_parameter(1, "ESHPipelineStage out of range")),
        })
    }

    fn pipeline_type(self) -> EshPipelineType {
        let bits = self as u8;
        if self == EshPipelineStage::Compute {
            EshPipelineType::Compute
        } else if bits >= RT_START && bits <= RT_END {
            EshPipelineType::Raytracing
        } else {
            EshPipelineType::Graphics
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EshPipelineType {
    Graphics = 0,
    Compute = 1,
    Raytracing = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EshPrimitive {
    Invalid = 0,
    Float = 1,
    Int = 2,
    UInt = 3,
}

/// `ESHType_create(prim, vec) = (prim << 2) | vec`: the graphics
/// input/output nibble shape (§4.G.1).
pub const fn esh_type_create(primitive: EshPrimitive, vector_minus_one: u8) -> u8 {
    ((primitive as u8) << 2) | (vector_minus_one & 0b11)
}

/// Smallest valid (non-absent) nibble value: `F32` with a 1-component
/// vector.
pub const ESH_TYPE_F32: u8 = esh_type_create(EshPrimitive::Float, 0);

fn nibble_at(packed: u64, slot: u8) -> u8 {
    ((packed >> (slot as u32 * 4)) & 0xF) as u8
}

fn set_nibble(packed: &mut u64, slot: u8, value: u8) {
    let shift = slot as u32 * 4;
    *packed = (*packed & !(0xFu64 << shift)) | ((value as u64 & 0xF) << shift);
}

/// `SHEntry`. `inputs`/`outputs` pack 16 four-bit [`ESHType`] nibbles
/// each (graphics stages only); the reference's `union { U8[8]; U64 }` is
/// just the packed integer here.
#[derive(Debug, Clone)]
pub struct ShEntry {
    pub name: String,
    pub stage: EshPipelineStage,
    pub group_x: u16,
    pub group_y: u16,
    pub group_z: u16,
    pub intersection_size: u8,
    pub payload_size: u8,
    pub inputs: u64,
    pub outputs: u64,
}

impl ShEntry {
    pub fn input_at(&self, slot: u8) -> u8 {
        nibble_at(self.inputs, slot)
    }

    pub fn output_at(&self, slot: u8) -> u8 {
        nibble_at(self.outputs, slot)
    }

    pub fn set_input(&mut self, slot: u8, value: u8) {
        set_nibble(&mut self.inputs, slot, value);
    }

    pub fn set_output(&mut self, slot: u8, value: u8) {
        set_nibble(&mut self.outputs, slot, value);
    }
}

/// `SHFile`.
#[derive(Debug, Clone)]
pub struct ShFile {
    binaries: [Option<Vec<u8>>; ESH_BINARY_TYPE_COUNT],
    pub entries: Vec<ShEntry>,
    pub read_length: u64,
    pub flags: ShSettingsFlags,
    pub extensions: EshExtension,
    pub pipeline_type: Option<EshPipelineType>,
}

impl ShFile {
    pub fn create(flags: ShSettingsFlags, extensions: EshExtension) -> Result<Self> {
        Ok(Self {
            binaries: [None, None],
            entries: Vec::new(),
            read_length: 0,
            flags,
            extensions,
            pipeline_type: None,
        })
    }

    pub fn binary(&self, ty: EshBinaryType) -> Option<&[u8]> {
        self.binaries[ty as usize].as_deref()
    }

    /// §4.G.2.
    pub fn add_binary(&mut self, ty: EshBinaryType, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Err(Error::null_pointer("SHFile::add_binary requires a non-empty buffer"));
        }
        if ty == EshBinaryType::Spirv && data.len() % 4 != 0 {
            return Err(Error::invalid_parameter(2, "SPIR-V binaries must be a multiple of 4 bytes"));
        }
        if self.binaries[ty as usize].is_some() {
            return Err(Error::invalid_operation("can't call add_binary twice for the same binary type"));
        }
        self.binaries[ty as usize] = Some(data);
        Ok(())
    }

    /// §4.G.1: the single validation path used both when the caller adds
    /// an entry and when a read file re-derives the same invariants.
    pub fn add_entrypoint(&mut self, entry: ShEntry) -> Result<()> {
        if entry.name.is_empty() {
            return Err(Error::null_pointer("SHFile::add_entrypoint requires a name"));
        }

        let current_type = entry.stage.pipeline_type();
        if let Some(existing) = self.pipeline_type {
            if existing != current_type {
                return Err(Error::invalid_operation("pipeline is incompatible with earlier entries"));
            }
            if existing != EshPipelineType::Raytracing {
                return Err(Error::invalid_operation(
                    "can't add multiple entrypoints in a single SHFile if type isn't raytracing",
                ));
            }
        }

        let group_xyz = entry.group_x | entry.group_y | entry.group_z;
        let total_group = entry.group_x as u64 * entry.group_y as u64 * entry.group_z as u64;

        if current_type != EshPipelineType::Compute && group_xyz != 0 {
            return Err(Error::invalid_operation("can't have group size for non compute"));
        }
        if current_type == EshPipelineType::Compute && group_xyz == 0 {
            return Err(Error::invalid_operation("needs group size for compute"));
        }
        if total_group > 512 {
            return Err(Error::invalid_operation("group count out of bounds (512)"));
        }
        if entry.group_x.max(entry.group_y) > 512 {
            return Err(Error::invalid_operation("group count x or y out of bounds (512)"));
        }
        if entry.group_z > 64 {
            return Err(Error::invalid_operation("group count z out of bounds (64)"));
        }

        let is_hit_or_intersection = matches!(
            entry.stage,
            EshPipelineStage::ClosestHitExt | EshPipelineStage::AnyHitExt | EshPipelineStage::IntersectionExt
        );
        if is_hit_or_intersection {
            if entry.payload_size == 0 {
                return Err(Error::invalid_operation("payloadSize is required for hit/intersection shaders"));
            }
            if entry.payload_size > 128 {
                return Err(Error::invalid_operation("payloadSize exceeds 128"));
            }
        } else if entry.payload_size != 0 {
            return Err(Error::invalid_operation("payloadSize is only valid for hit/intersection shaders"));
        }

        if entry.stage == EshPipelineStage::IntersectionExt {
            if entry.intersection_size == 0 {
                return Err(Error::invalid_operation("intersectionSize is required for intersection shaders"));
            }
            if entry.intersection_size > 32 {
                return Err(Error::invalid_operation("intersectionSize exceeds 32"));
            }
        } else if entry.intersection_size != 0 {
            return Err(Error::invalid_operation("intersectionSize is only valid for intersection shaders"));
        }

        if current_type != EshPipelineType::Graphics && (entry.inputs | entry.outputs) != 0 {
            return Err(Error::invalid_operation("inputs/outputs are only valid for graphics shaders"));
        }
        if current_type == EshPipelineType::Graphics {
            for slot in 0..16 {
                let vin = entry.input_at(slot);
                let vout = entry.output_at(slot);
                if (vin != 0 && vin < ESH_TYPE_F32) || (vout != 0 && vout < ESH_TYPE_F32) {
                    return Err(Error::invalid_operation("inputs or outputs contains an invalid type"));
                }
            }
        }

        if !entry.name.is_ascii() {
            self.flags |= ShSettingsFlags::IS_UTF8;
        }

        if self.pipeline_type.is_none() {
            self.pipeline_type = Some(current_type);
        }
        self.entries.push(entry);
        Ok(())
    }

    fn embedded_names(&self) -> Result<DlFile> {
        let data_type = if self.flags.contains(ShSettingsFlags::IS_UTF8) {
            DlDataType::Utf8
        } else {
            DlDataType::Ascii
        };
        let mut dl = DlFile::create(DlSettings::new(data_type));
        for entry in &self.entries {
            match data_type {
                DlDataType::Utf8 => dl.add_entry_utf8(entry.name.clone().into_bytes())?,
                DlDataType::Ascii => dl.add_entry_ascii(&entry.name)?,
                DlDataType::Data => unreachable!(),
            }
        }
        Ok(dl)
    }

    /// §4.G.3.
    pub fn write(&self) -> Result<Vec<u8>> {
        if self.entries.is_empty() {
            return Err(Error::null_pointer("SHFile::write requires at least one entrypoint"));
        }

        let dl = self.embedded_names()?;
        let dl_bytes = dl.write_hidden_magic()?;

        let mut has_binary = 0u8;
        let mut size_types = 0u8;
        for (i, binary) in self.binaries.iter().enumerate() {
            if let Some(b) = binary {
                has_binary |= 1 << i;
                size_types |= SizeWidth::required_for(b.len() as u64).bits() << (i * 2);
            }
        }

        let mut w = ByteWriter::new();
        if !self.flags.contains(ShSettingsFlags::HIDE_MAGIC_NUMBER) {
            w.write_u32(MAGIC_OISH);
        }
        w.write_u8(SH_VERSION_BYTE);
        w.write_u8(has_binary);
        w.write_u8(size_types);
        w.write_u8(self.pipeline_type.map(|t| t as u8).unwrap_or(0));
        w.write_u16(self.extensions.bits());
        w.write(&dl_bytes);

        for entry in &self.entries {
            w.write_u8(entry.stage as u8);
        }

        for entry in &self.entries {
            match self.pipeline_type {
                Some(EshPipelineType::Compute) => {
                    let packed = entry.group_x as u64 | ((entry.group_y as u64) << 16) | ((entry.group_z as u64) << 32);
                    w.write_u64(packed);
                }
                Some(EshPipelineType::Graphics) => {
                    w.write_u64(entry.inputs);
                    w.write_u64(entry.outputs);
                }
                Some(EshPipelineType::Raytracing) => {
                    w.write_u8(entry.intersection_size);
                    w.write_u8(entry.payload_size);
                }
                None => unreachable!("write() already checked entries is non-empty"),
            }
        }

        for (i, binary) in self.binaries.iter().enumerate() {
            if let Some(b) = binary {
                let width = SizeWidth::from_bits((size_types >> (i * 2)) & 0b11);
                w.write_size(width, b.len() as u64)?;
            }
        }
        for binary in self.binaries.iter().flatten() {
            w.write(binary);
        }

        Ok(w.into_vec())
    }

    pub fn read(buf: &[u8], is_sub_file: bool) -> Result<Self> {
        Self::read_inner(buf, is_sub_file, true)
    }

    pub fn read_hidden_magic(buf: &[u8], is_sub_file: bool) -> Result<Self> {
        Self::read_inner(buf, is_sub_file, false)
    }

    fn read_inner(buf: &[u8], is_sub_file: bool, expect_magic: bool) -> Result<Self> {
        let mut r = ByteReader::new(buf);

        if expect_magic {
            let magic = r.consume_u32()?;
            if magic != MAGIC_OISH {
                return Err(Error::invalid_state("magic number mismatch"));
            }
        }

        let version = r.consume_u8()?;
        if version != SH_VERSION_BYTE {
            return Err(Error::invalid_parameter(1, "SHFile header.version is invalid"));
        }
        let has_binary = r.consume_u8()?;
        if has_binary & !0b11 != 0 {
            return Err(Error::unsupported("unsupported oiSH binary-type flag bits"));
        }
        if has_binary == 0 {
            return Err(Error::invalid_state("oiSH file has no binaries"));
        }
        let size_types = r.consume_u8()?;
        let pipeline_type_byte = r.consume_u8()?;
        let extensions = EshExtension::from_bits_truncate(r.consume_u16()?);

        let (dl, consumed) = DlFile::read_hidden_magic(r.rest(), None, true)?;
        r.consume(consumed)?;
        let is_utf8 = dl.settings.data_type == DlDataType::Utf8;

        let mut flags = if is_utf8 {
            ShSettingsFlags::IS_UTF8
        } else {
            ShSettingsFlags::empty()
        };
        if !expect_magic {
            flags |= ShSettingsFlags::HIDE_MAGIC_NUMBER;
        }

        let mut file = ShFile::create(flags, extensions)?;

        let entry_count = dl.len();
        let stages: Vec<u8> = (0..entry_count).map(|_| r.consume_u8()).collect::<Result<_>>()?;

        let pipeline_type = match pipeline_type_byte {
            0 => EshPipelineType::Graphics,
            1 => EshPipelineType::Compute,
            2 => EshPipelineType::Raytracing,
            _ => return Err(Error::invalid_parameter(3, "pipelineType is invalid")),
        };

        for (i, name) in dl.entries().iter().enumerate() {
            let stage = EshPipelineStage::from_bits(stages[i])?;
            let name = if is_utf8 {
                String::from_utf8(name.clone()).map_err(|_| Error::invalid_state("entry name is not valid UTF-8"))?
            } else {
                name.iter().map(|&b| b as char).collect()
            };

            let mut entry = ShEntry {
                name,
                stage,
                group_x: 0,
                group_y: 0,
                group_z: 0,
                intersection_size: 0,
                payload_size: 0,
                inputs: 0,
                outputs: 0,
            };

            match pipeline_type {
                EshPipelineType::Compute => {
                    let packed = r.consume_u64()?;
                    entry.group_x = packed as u16;
                    entry.group_y = (packed >> 16) as u16;
                    entry.group_z = (packed >> 32) as u16;
                }
                EshPipelineType::Graphics => {
                    entry.inputs = r.consume_u64()?;
                    entry.outputs = r.consume_u64()?;
                }
                EshPipelineType::Raytracing => {
                    entry.intersection_size = r.consume_u8()?;
                    entry.payload_size = r.consume_u8()?;
                }
            }

            file.add_entrypoint(entry)?;
        }

        let mut binary_sizes = [0u64; ESH_BINARY_TYPE_COUNT];
        for i in 0..ESH_BINARY_TYPE_COUNT {
            if has_binary & (1 << i) != 0 {
                let width = SizeWidth::from_bits((size_types >> (i * 2)) & 0b11);
                binary_sizes[i] = r.consume_size(width)?;
            }
        }
        for i in 0..ESH_BINARY_TYPE_COUNT {
            if binary_sizes[i] > 0 {
                let ty = if i == 0 { EshBinaryType::Spirv } else { EshBinaryType::Dxil };
                let bytes = r.consume(binary_sizes[i] as usize)?.to_vec();
                file.add_binary(ty, bytes)?;
            }
        }

        if !is_sub_file && !r.is_empty() {
            return Err(Error::invalid_state("trailing bytes after oiSH file"));
        }

        file.read_length = r.position() as u64;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_entry() -> ShEntry {
        ShEntry {
            name: "main".to_string(),
            stage: EshPipelineStage::Compute,
            group_x: 8,
            group_y: 8,
            group_z: 1,
            intersection_size: 0,
            payload_size: 0,
            inputs: 0,
            outputs: 0,
        }
    }

    // S1: oiSH compute round trip.
    #[test]
    fn compute_round_trip() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        sh.add_entrypoint(compute_entry()).unwrap();
        sh.add_binary(EshBinaryType::Spirv, vec![0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
            .unwrap();

        let bytes = sh.write().unwrap();
        assert_eq!(&bytes[0..4], b"oiSH");
        assert_eq!(bytes[4], SH_VERSION_BYTE);
        assert_eq!(bytes[5], 0x01); // HasSPIRV
        assert_eq!(bytes[6] & 0b11, SizeWidth::U8.bits());

        let read_back = ShFile::read(&bytes, false).unwrap();
        assert_eq!(read_back.entries.len(), 1);
        assert_eq!(read_back.entries[0].name, "main");
        assert_eq!(read_back.pipeline_type, Some(EshPipelineType::Compute));
        assert_eq!(read_back.binary(EshBinaryType::Spirv).unwrap().len(), 16);
    }

    #[test]
    fn compute_without_group_size_is_rejected() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        let mut entry = compute_entry();
        entry.group_x = 0;
        entry.group_y = 0;
        entry.group_z = 0;
        let err = sh.add_entrypoint(entry).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    // S5: pipeline coherence.
    #[test]
    fn pipeline_coherence_rejects_second_graphics_entry() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        sh.add_entrypoint(ShEntry {
            name: "vs".to_string(),
            stage: EshPipelineStage::Vertex,
            group_x: 0,
            group_y: 0,
            group_z: 0,
            intersection_size: 0,
            payload_size: 0,
            inputs: 0,
            outputs: 0,
        })
        .unwrap();

        let err = sh
            .add_entrypoint(ShEntry {
                name: "ps".to_string(),
                stage: EshPipelineStage::Pixel,
                group_x: 0,
                group_y: 0,
                group_z: 0,
                intersection_size: 0,
                payload_size: 0,
                inputs: 0,
                outputs: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[test]
    fn raytracing_accepts_multiple_entries() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        sh.add_entrypoint(ShEntry {
            name: "raygen".to_string(),
            stage: EshPipelineStage::RaygenExt,
            group_x: 0,
            group_y: 0,
            group_z: 0,
            intersection_size: 0,
            payload_size: 0,
            inputs: 0,
            outputs: 0,
        })
        .unwrap();
        sh.add_entrypoint(ShEntry {
            name: "miss".to_string(),
            stage: EshPipelineStage::MissExt,
            group_x: 0,
            group_y: 0,
            group_z: 0,
            intersection_size: 0,
            payload_size: 0,
            inputs: 0,
            outputs: 0,
        })
        .unwrap();
        assert_eq!(sh.entries.len(), 2);
    }

    #[test]
    fn hit_shader_requires_payload_size() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        let err = sh
            .add_entrypoint(ShEntry {
                name: "chit".to_string(),
                stage: EshPipelineStage::ClosestHitExt,
                group_x: 0,
                group_y: 0,
                group_z: 0,
                intersection_size: 0,
                payload_size: 0,
                inputs: 0,
                outputs: 0,
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[test]
    fn add_binary_twice_is_rejected() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        sh.add_binary(EshBinaryType::Spirv, vec![1, 2, 3, 4]).unwrap();
        let err = sh.add_binary(EshBinaryType::Spirv, vec![5, 6, 7, 8]).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
    }

    #[test]
    fn spirv_binary_must_be_word_aligned() {
        let mut sh = ShFile::create(ShSettingsFlags::empty(), EshExtension::empty()).unwrap();
        let err = sh.add_binary(EshBinaryType::Spirv, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
