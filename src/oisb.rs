//! Component F: **oiSB** — a shader buffer layout descriptor. Named
//! structs, named variables, multi-dimensional arrays, and the alignment
//! rules for packed vs. HLSL/CBuffer-style (std140-ish) layouts (§4.F).

use bitflags::bitflags;

use crate::container::{validate_header, MAGIC_OISB};
use crate::error::{Error, Result};
use crate::oidl::{DlDataType, DlFile, DlSettings};
use crate::primitives::{ByteReader, ByteWriter};

const SB_VERSION_MAJOR: u16 = 1;
const SB_VERSION_BYTE: u8 = 12; // 1.2, packed as major*10 + minor

/// `ESBSettingsFlags` — creation-time choices for a [`SbFile`]. Only
/// `IS_TIGHTLY_PACKED` is persisted on disk (as the header's `ESBFlag`
/// byte); `HIDE_MAGIC_NUMBER` and `IS_UTF8` are recovered on read from,
/// respectively, which read method the caller used and the embedded
/// name table's own data type.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SbSettingsFlags: u8 {
        const HIDE_MAGIC_NUMBER = 1 << 0;
        const IS_UTF8 = 1 << 1;
        const IS_TIGHTLY_PACKED = 1 << 2;
    }
}

/// `ESBVarFlag`.
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SbVarFlag: u8 {
        const IS_USED_VAR_SPIRV = 1 << 0;
        const IS_USED_VAR_DXIL = 1 << 1;
    }
}

/// Sentinel used by `structId`, `arrayIndex` and `parentId`: "none".
pub const SB_NONE: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EsbPrimitive {
    Invalid = 0,
    Float = 1,
    Int = 2,
    UInt = 3,
}

impl EsbPrimitive {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => EsbPrimitive::Invalid,
            1 => EsbPrimitive::Float,
            2 => EsbPrimitive::Int,
            _ => EsbPrimitive::UInt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EsbStride {
    X8 = 0,
    X16 = 1,
    X32 = 2,
    X64 = 3,
}

impl EsbStride {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => EsbStride::X8,
            1 => EsbStride::X16,
            2 => EsbStride::X32,
            _ => EsbStride::X64,
        }
    }

    fn byte_count(self) -> u8 {
        1 << (self as u8)
    }
}

/// Component count minus one, shared shape for both `ESBVector` and
/// `ESBMatrix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EsbDimension {
    N1 = 0,
    N2 = 1,
    N3 = 2,
    N4 = 3,
}

impl EsbDimension {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => EsbDimension::N1,
            1 => EsbDimension::N2,
            2 => EsbDimension::N3,
            _ => EsbDimension::N4,
        }
    }

    fn count(self) -> u8 {
        self as u8 + 1
    }
}

/// `ESBType` — a bit-packed primitive/stride/vector/matrix descriptor,
/// `(matrix << 6) | (stride << 4) | (primitive << 2) | vector`. Kept as a
/// wrapper around the raw byte rather than expanded into a sum type: the
/// on-disk format *is* this bit layout (§9 "Enum-packed types").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsbType(pub u8);

impl EsbType {
    pub const fn create(
        stride: EsbStride,
        primitive: EsbPrimitive,
        vector: EsbDimension,
        matrix: EsbDimension,
    ) -> Self {
        EsbType(((matrix as u8) << 6) | ((stride as u8) << 4) | ((primitive as u8) << 2) | (vector as u8))
    }

    pub fn from_bits(bits: u8) -> Self {
        EsbType(bits)
    }

    pub fn vector(self) -> EsbDimension {
        EsbDimension::from_bits(self.0)
    }

    pub fn matrix(self) -> EsbDimension {
        EsbDimension::from_bits(self.0 >> 6)
    }

    pub fn primitive(self) -> EsbPrimitive {
        EsbPrimitive::from_bits(self.0 >> 2)
    }

    pub fn stride(self) -> EsbStride {
        EsbStride::from_bits(self.0 >> 4)
    }

    pub fn validate(self) -> Result<()> {
        if self.primitive() == EsbPrimitive::Invalid {
            return Err(Error::invalid_parameter(4, "ESBType primitive is Invalid"));
        }
        if self.primitive() == EsbPrimitive::Float && self.stride() == EsbStride::X8 {
            return Err(Error::invalid_parameter(4, "ESBType has no 8-bit float"));
        }
        Ok(())
    }

    /// `ESBType_getSize`: packed layouts multiply primitive size by every
    /// dimension; std140-style layouts round each matrix row up to a
    /// 4-component (16-byte, for 32-bit primitives) lane.
    pub fn size(self, is_packed: bool) -> u8 {
        let primitive_size = self.stride().byte_count();
        let w = self.vector().count();
        let m = self.matrix().count();
        if is_packed {
            primitive_size * w * m
        } else if m == 1 {
            primitive_size * w
        } else {
            4 * primitive_size * m
        }
    }

    /// A human-readable name like `F32x4` or `F16x2x3` (vector × matrix),
    /// reconstructed from the packed fields rather than looked up in a
    /// static table.
    pub fn name(self) -> String {
        if self.validate().is_err() {
            return String::new();
        }
        let letter = match self.primitive() {
            EsbPrimitive::Float => 'F',
            EsbPrimitive::Int => 'I',
            EsbPrimitive::UInt => 'U',
            EsbPrimitive::Invalid => unreachable!(),
        };
        let bits = match self.stride() {
            EsbStride::X8 => 8,
            EsbStride::X16 => 16,
            EsbStride::X32 => 32,
            EsbStride::X64 => 64,
        };
        let mut s = format!("{letter}{bits}");
        let v = self.vector().count();
        if v > 1 {
            s.push_str(&format!("x{v}"));
        }
        let m = self.matrix().count();
        if m > 1 {
            s.push_str(&format!("x{m}"));
        }
        s
    }
}

pub const ESB_TYPE_F16: EsbType = EsbType::create(EsbStride::X16, EsbPrimitive::Float, EsbDimension::N1, EsbDimension::N1);
pub const ESB_TYPE_F32: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N1, EsbDimension::N1);
pub const ESB_TYPE_F32X2: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N2, EsbDimension::N1);
pub const ESB_TYPE_F32X3: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N3, EsbDimension::N1);
pub const ESB_TYPE_F32X4: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N4, EsbDimension::N1);
pub const ESB_TYPE_I32: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Int, EsbDimension::N1, EsbDimension::N1);
pub const ESB_TYPE_U32: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::UInt, EsbDimension::N1, EsbDimension::N1);
pub const ESB_TYPE_F32X4X4: EsbType = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N4, EsbDimension::N4);

/// `SBStruct`. Only `stride` is written to disk; `length` (occupied
/// bytes of the last array element, `stride` minus tail padding) is a
/// caller-supplied, in-memory-only quantity used for containment checks.
/// A struct read back off disk has no way to recover a `length` smaller
/// than `stride` (the wire format never stored the distinction), so
/// `SbFile::read` sets `length = stride` for every parsed struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbStruct {
    pub stride: u32,
    pub length: u32,
}

/// `SBVar`. `struct_id == SB_NONE` marks the primitive path (`ty` holds
/// an [`EsbType`]); otherwise `ty == 0` and `struct_id` indexes
/// [`SbFile::structs`].
#[derive(Debug, Clone, Copy)]
pub struct SbVar {
    pub struct_id: u16,
    pub array_index: u16,
    pub offset: u32,
    pub ty: u8,
    pub flags: SbVarFlag,
    pub parent_id: u16,
}

impl SbVar {
    pub fn is_struct(&self) -> bool {
        self.struct_id != SB_NONE
    }
}

/// `SBFile`.
#[derive(Debug, Clone)]
pub struct SbFile {
    pub struct_names: Vec<String>,
    pub var_names: Vec<String>,
    pub structs: Vec<SbStruct>,
    pub vars: Vec<SbVar>,
    pub arrays: Vec<Vec<u32>>,
    pub read_length: u64,
    pub flags: SbSettingsFlags,
    pub buffer_size: u32,
}

const MAX_TABLE_LEN: usize = u16::MAX as usize - 1;
const MAX_ARRAY_DIMS: usize = 32;

fn round_up_16(v: u64) -> u64 {
    (v + 15) & !15
}

impl SbFile {
    pub fn create(flags: SbSettingsFlags, buffer_size: u32) -> Result<Self> {
        if buffer_size == 0 {
            return Err(Error::invalid_parameter(1, "SbFile::create requires a non-zero bufferSize"));
        }
        Ok(Self {
            struct_names: Vec::new(),
            var_names: Vec::new(),
            structs: Vec::new(),
            vars: Vec::new(),
            arrays: Vec::new(),
            read_length: 0,
            flags,
            buffer_size,
        })
    }

    pub fn is_packed(&self) -> bool {
        self.flags.contains(SbSettingsFlags::IS_TIGHTLY_PACKED)
    }

    /// §4.F.1/§4.F.3: `stride >= length > 0`.
    pub fn add_struct(&mut self, name: impl Into<String>, stride: u32, length: u32) -> Result<u16> {
        if stride < length || length == 0 {
            return Err(Error::invalid_parameter(
                2,
                "SbFile::add_struct requires stride >= length && length != 0",
            ));
        }
        if self.structs.len() >= MAX_TABLE_LEN {
            return Err(Error::out_of_bounds(self.structs.len() as u64, MAX_TABLE_LEN as u64, "structs.len limited to 65535"));
        }

        self.structs.push(SbStruct { stride, length });
        self.struct_names.push(name.into());
        Ok((self.structs.len() - 1) as u16)
    }

    fn check_array_dims(&self, arrays: Option<&[u32]>) -> Result<()> {
        if let Some(a) = arrays {
            if a.len() > MAX_ARRAY_DIMS {
                return Err(Error::out_of_bounds(a.len() as u64, MAX_ARRAY_DIMS as u64, "arrays.len limited to 32"));
            }
            if a.is_empty() {
                return Err(Error::invalid_state("arrays should be None if the array is empty"));
            }
            if self.arrays.len() >= MAX_TABLE_LEN {
                return Err(Error::out_of_bounds(self.arrays.len() as u64, MAX_TABLE_LEN as u64, "arrays.len limited to 65535"));
            }
        }
        Ok(())
    }

    fn check_sibling_name_unique(&self, parent_id: u16, name: &str) -> Result<()> {
        for (var, var_name) in self.vars.iter().zip(self.var_names.iter()) {
            if var.parent_id == parent_id && var_name == name {
                return Err(Error::invalid_state("parent already contains a member with this name"));
            }
        }
        Ok(())
    }

    /// Validate and resolve a `parent_id`'s containment window, returning
    /// `(parent_offset, parent_length)`. `SB_NONE` is the root (the whole
    /// buffer).
    fn resolve_parent_window(&self, parent_id: u16) -> Result<(u32, u32)> {
        if parent_id == SB_NONE {
            return Ok((0, self.buffer_size));
        }
        let parent_id = parent_id as usize;
        if parent_id >= self.vars.len() {
            return Err(Error::out_of_bounds(parent_id as u64, self.vars.len() as u64, "parentId is out of bounds"));
        }
        let parent = self.vars[parent_id];
        if !parent.is_struct() {
            return Err(Error::invalid_state("parentId does not reference a struct-typed variable"));
        }
        let strc = self.structs[parent.struct_id as usize];
        Ok((parent.offset, strc.length))
    }

    /// §4.F.2: add a primitive-typed variable.
    pub fn add_variable_as_type(
        &mut self,
        name: impl Into<String>,
        offset: u32,
        parent_id: u16,
        ty: EsbType,
        flags: SbVarFlag,
        arrays: Option<&[u32]>,
    ) -> Result<u16> {
        ty.validate()?;
        self.check_array_dims(arrays)?;
        if self.vars.len() >= MAX_TABLE_LEN {
            return Err(Error::out_of_bounds(self.vars.len() as u64, MAX_TABLE_LEN as u64, "vars.len limited to 65535"));
        }

        let is_packed = self.is_packed();
        let size = ty.size(is_packed) as u32;
        let type_size = ty.stride().byte_count() as u32;

        if !is_packed {
            let straddles = ((offset + size - 1) >> 4) != (offset >> 4);
            if straddles && offset & 15 != 0 {
                return Err(Error::invalid_parameter(5, "offset spans 16 bytes, not tightly packed"));
            }
        } else if offset & (type_size - 1) != 0 {
            return Err(Error::invalid_parameter(5, "offset doesn't follow required type alignment"));
        }

        let mut total_size_bytes: u64 = if is_packed { size as u64 } else { round_up_16(size as u64) };
        for &dim in arrays.unwrap_or(&[]) {
            if dim == 0 {
                return Err(Error::invalid_parameter(0, "array dimension is 0"));
            }
            total_size_bytes = total_size_bytes
                .checked_mul(dim as u64)
                .ok_or_else(|| Error::overflow("array size overflowed"))?;
            if total_size_bytes > u32::MAX as u64 {
                return Err(Error::out_of_bounds(total_size_bytes, u32::MAX as u64, "array size out of bounds (only 2^32 permitted)"));
            }
        }

        let (parent_offset, parent_length) = self.resolve_parent_window(parent_id)?;
        if (offset as u64) < parent_offset as u64
            || offset as u64 + size as u64 > parent_offset as u64 + parent_length as u64
        {
            return Err(Error::out_of_bounds(
                offset as u64 + size as u64,
                parent_offset as u64 + parent_length as u64,
                "offset isn't in bounds of parent",
            ));
        }
        if parent_id != SB_NONE && is_packed {
            let parent = self.vars[parent_id as usize];
            let strc = self.structs[parent.struct_id as usize];
            if (parent.offset & (type_size - 1)) != 0 && ((parent.offset + strc.stride) & (type_size - 1)) != 0 {
                return Err(Error::invalid_state("parent struct doesn't respect alignment"));
            }
        }

        let name = name.into();
        self.check_sibling_name_unique(parent_id, &name)?;

        let array_index = if let Some(a) = arrays {
            self.arrays.push(a.to_vec());
            (self.arrays.len() - 1) as u16
        } else {
            SB_NONE
        };

        self.vars.push(SbVar {
            struct_id: SB_NONE,
            array_index,
            offset,
            ty: ty.0,
            flags,
            parent_id,
        });
        self.var_names.push(name);
        Ok((self.vars.len() - 1) as u16)
    }

    /// §4.F.2 "symmetric" struct-typed variant: alignment is fixed at 16
    /// bytes when non-packed, and the trailing element's padding is
    /// subtracted from the multiplied total (the last array element
    /// doesn't need trailing padding).
    pub fn add_variable_as_struct(
        &mut self,
        name: impl Into<String>,
        offset: u32,
        parent_id: u16,
        struct_id: u16,
        flags: SbVarFlag,
        arrays: Option<&[u32]>,
    ) -> Result<u16> {
        self.check_array_dims(arrays)?;
        if struct_id as usize >= self.structs.len() {
            return Err(Error::out_of_bounds(struct_id as u64, self.structs.len() as u64, "structId out of bounds"));
        }
        if self.vars.len() >= MAX_TABLE_LEN {
            return Err(Error::out_of_bounds(self.vars.len() as u64, MAX_TABLE_LEN as u64, "vars.len limited to 65535"));
        }

        let is_packed = self.is_packed();
        if !is_packed && offset & 15 != 0 {
            return Err(Error::invalid_parameter(5, "offset needs 16-byte alignment"));
        }

        let strc = self.structs[struct_id as usize];
        let mut size: u64 = strc.stride as u64;
        for &dim in arrays.unwrap_or(&[]) {
            if dim == 0 {
                return Err(Error::invalid_parameter(0, "array dimension is 0"));
            }
            size = size.checked_mul(dim as u64).ok_or_else(|| Error::overflow("array size overflowed"))?;
            if size > u32::MAX as u64 {
                return Err(Error::out_of_bounds(size, u32::MAX as u64, "array size out of bounds (only 2^32 permitted)"));
            }
        }
        size -= (strc.stride - strc.length) as u64;

        let (parent_offset, parent_length) = self.resolve_parent_window(parent_id)?;
        if (offset as u64) < parent_offset as u64
            || offset as u64 + size > parent_offset as u64 + parent_length as u64
        {
            return Err(Error::out_of_bounds(
                offset as u64 + size,
                parent_offset as u64 + parent_length as u64,
                "offset isn't in bounds of parent",
            ));
        }

        let name = name.into();
        self.check_sibling_name_unique(parent_id, &name)?;

        let array_index = if let Some(a) = arrays {
            self.arrays.push(a.to_vec());
            (self.arrays.len() - 1) as u16
        } else {
            SB_NONE
        };

        self.vars.push(SbVar {
            struct_id,
            array_index,
            offset,
            ty: 0,
            flags,
            parent_id,
        });
        self.var_names.push(name);
        Ok((self.vars.len() - 1) as u16)
    }

    fn embedded_names(&self) -> Result<DlFile> {
        let data_type = if self.flags.contains(SbSettingsFlags::IS_UTF8) {
            DlDataType::Utf8
        } else {
            DlDataType::Ascii
        };
        let mut dl = DlFile::create(DlSettings::new(data_type));
        for name in self.struct_names.iter().chain(self.var_names.iter()) {
            match data_type {
                DlDataType::Utf8 => dl.add_entry_utf8(name.clone().into_bytes())?,
                DlDataType::Ascii => dl.add_entry_ascii(name)?,
                DlDataType::Data => unreachable!(),
            }
        }
        Ok(dl)
    }

    /// §4.F.4.
    pub fn write(&self) -> Result<Vec<u8>> {
        let dl = self.embedded_names()?;
        let dl_bytes = dl.write_hidden_magic()?;

        let mut w = ByteWriter::new();
        if !self.flags.contains(SbSettingsFlags::HIDE_MAGIC_NUMBER) {
            w.write_u32(MAGIC_OISB);
        }
        w.write_u8(SB_VERSION_BYTE);
        w.write_u8(if self.is_packed() { 1 } else { 0 });
        w.write_u16(self.arrays.len() as u16);
        w.write_u16(self.structs.len() as u16);
        w.write_u16(self.vars.len() as u16);
        w.write_u32(self.buffer_size);
        w.write(&dl_bytes);

        for s in &self.structs {
            w.write_u32(s.stride);
        }
        for v in &self.vars {
            w.write_u16(v.struct_id);
            w.write_u16(v.array_index);
            w.write_u32(v.offset);
            w.write_u8(v.ty);
            w.write_u8(v.flags.bits());
            w.write_u16(v.parent_id);
        }
        for a in &self.arrays {
            w.write_u8(a.len() as u8);
        }
        for a in &self.arrays {
            for &d in a {
                w.write_u32(d);
            }
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

        let magic = if expect_magic { r.consume_u32()? } else { MAGIC_OISB };
        let version = r.consume_u8()? as u16;
        let header_flags = r.consume_u8()?;
        if header_flags & !0b1 != 0 {
            return Err(Error::unsupported("unknown oiSB header flag bits"));
        }
        let is_tightly_packed = header_flags & 1 != 0;

        let arrays_len = r.consume_u16()? as usize;
        let structs_len = r.consume_u16()? as usize;
        let vars_len = r.consume_u16()? as usize;
        let buffer_size = r.consume_u32()?;

        validate_header(magic, MAGIC_OISB, version, SB_VERSION_MAJOR, crate::container::XxFlags::new(), crate::container::EncryptionType::None, false)?;

        let (dl, consumed) = DlFile::read_hidden_magic(r.rest(), None, true)?;
        r.consume(consumed)?;

        if dl.len() != structs_len + vars_len {
            return Err(Error::invalid_state("embedded name table entry count mismatch"));
        }
        let is_utf8 = dl.settings.data_type == DlDataType::Utf8;
        let decode = |bytes: &[u8]| -> String {
            if is_utf8 {
                String::from_utf8_lossy(bytes).into_owned()
            } else {
                bytes.iter().map(|&b| b as char).collect()
            }
        };
        let struct_names: Vec<String> = dl.entries()[..structs_len].iter().map(|e| decode(e)).collect();
        let var_names: Vec<String> = dl.entries()[structs_len..structs_len + vars_len].iter().map(|e| decode(e)).collect();

        let mut structs = Vec::with_capacity(structs_len);
        for _ in 0..structs_len {
            let stride = r.consume_u32()?;
            structs.push(SbStruct { stride, length: stride });
        }

        let mut vars = Vec::with_capacity(vars_len);
        for _ in 0..vars_len {
            let struct_id = r.consume_u16()?;
            let array_index = r.consume_u16()?;
            let offset = r.consume_u32()?;
            let ty = r.consume_u8()?;
            let flags = SbVarFlag::from_bits_truncate(r.consume_u8()?);
            let parent_id = r.consume_u16()?;
            vars.push(SbVar { struct_id, array_index, offset, ty, flags, parent_id });
        }

        let mut dim_counts = Vec::with_capacity(arrays_len);
        for _ in 0..arrays_len {
            dim_counts.push(r.consume_u8()?);
        }
        let mut arrays = Vec::with_capacity(arrays_len);
        for &count in &dim_counts {
            let mut dims = Vec::with_capacity(count as usize);
            for _ in 0..count {
                dims.push(r.consume_u32()?);
            }
            arrays.push(dims);
        }

        if !is_sub_file && !r.is_empty() {
            return Err(Error::invalid_state("trailing bytes after oiSB file"));
        }

        let mut flags = SbSettingsFlags::empty();
        if !expect_magic {
            flags |= SbSettingsFlags::HIDE_MAGIC_NUMBER;
        }
        if is_utf8 {
            flags |= SbSettingsFlags::IS_UTF8;
        }
        if is_tightly_packed {
            flags |= SbSettingsFlags::IS_TIGHTLY_PACKED;
        }

        Ok(SbFile {
            struct_names,
            var_names,
            structs,
            vars,
            arrays,
            read_length: r.position() as u64,
            flags,
            buffer_size,
        })
    }

    /// §4.F.5: struct/var tables must agree field-for-field except each
    /// var's `flags`, which are unioned (a variable used by both SPIR-V
    /// and DXIL pipelines ends up flagged for both).
    pub fn combine(a: &SbFile, b: &SbFile) -> Result<SbFile> {
        if a.buffer_size != b.buffer_size || a.flags != b.flags {
            return Err(Error::invalid_state("oiSB files have incompatible settings"));
        }
        if a.structs != b.structs || a.struct_names != b.struct_names {
            return Err(Error::invalid_state("oiSB struct tables differ"));
        }
        if a.arrays != b.arrays {
            return Err(Error::invalid_state("oiSB array tables differ"));
        }
        if a.vars.len() != b.vars.len() || a.var_names != b.var_names {
            return Err(Error::invalid_state("oiSB var tables differ"));
        }

        let mut vars = Vec::with_capacity(a.vars.len());
        for (va, vb) in a.vars.iter().zip(b.vars.iter()) {
            if va.struct_id != vb.struct_id
                || va.array_index != vb.array_index
                || va.offset != vb.offset
                || va.ty != vb.ty
                || va.parent_id != vb.parent_id
            {
                return Err(Error::invalid_state("oiSB vars differ beyond their flags"));
            }
            vars.push(SbVar { flags: va.flags | vb.flags, ..*va });
        }

        Ok(SbFile {
            struct_names: a.struct_names.clone(),
            var_names: a.var_names.clone(),
            structs: a.structs.clone(),
            vars,
            arrays: a.arrays.clone(),
            read_length: 0,
            flags: a.flags,
            buffer_size: a.buffer_size,
        })
    }

    /// A human-readable dump, grounded in the reference's `SBFile_print`.
    pub fn print(&self) -> String {
        let mut out = format!(
            "SBFile(bufferSize={}, packed={})\n",
            self.buffer_size,
            self.is_packed()
        );
        for (i, (s, name)) in self.structs.iter().zip(self.struct_names.iter()).enumerate() {
            out.push_str(&format!("  struct {i} \"{name}\" stride={} length={}\n", s.stride, s.length));
        }
        for (i, (v, name)) in self.vars.iter().zip(self.var_names.iter()).enumerate() {
            let type_desc = if v.is_struct() {
                format!("struct {}", v.struct_id)
            } else {
                EsbType::from_bits(v.ty).name()
            };
            let parent = if v.parent_id == SB_NONE { "root".to_string() } else { v.parent_id.to_string() };
            out.push_str(&format!(
                "  var {i} \"{name}\" type={type_desc} offset={} parent={parent}\n",
                v.offset
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn esb_type_packing_round_trips() {
        let ty = EsbType::create(EsbStride::X32, EsbPrimitive::Float, EsbDimension::N4, EsbDimension::N1);
        assert_eq!(ty.stride(), EsbStride::X32);
        assert_eq!(ty.primitive(), EsbPrimitive::Float);
        assert_eq!(ty.vector(), EsbDimension::N4);
        assert_eq!(ty.matrix(), EsbDimension::N1);
        assert_eq!(ty, ESB_TYPE_F32X4);
    }

    #[test]
    fn esb_type_rejects_float_x8_combination() {
        let bogus = EsbType::create(EsbStride::X8, EsbPrimitive::Float, EsbDimension::N1, EsbDimension::N1);
        assert!(bogus.validate().is_err());
    }

    // S2: scalar oiSB round trip.
    #[test]
    fn scalar_round_trip() {
        let mut sb = SbFile::create(SbSettingsFlags::empty(), 16).unwrap();
        let s = sb.add_struct("Scalars", 16, 16).unwrap();
        assert_eq!(s, 0);
        sb.add_variable_as_type("value", 0, SB_NONE, ESB_TYPE_F32X4, SbVarFlag::empty(), None)
            .unwrap();

        let bytes = sb.write().unwrap();
        let read_back = SbFile::read(&bytes, false).unwrap();
        assert_eq!(read_back.structs.len(), 1);
        assert_eq!(read_back.vars.len(), 1);
        assert_eq!(read_back.vars[0].ty, ESB_TYPE_F32X4.0);
        assert_eq!(read_back.vars[0].offset, 0);
        assert_eq!(read_back.struct_names, vec!["Scalars".to_string()]);
        assert_eq!(read_back.var_names, vec!["value".to_string()]);
    }

    // S3: alignment violation.
    #[test]
    fn alignment_violation_is_rejected() {
        let mut sb = SbFile::create(SbSettingsFlags::empty(), 16).unwrap();
        let err = sb
            .add_variable_as_type("v", 8, SB_NONE, ESB_TYPE_F32X3, SbVarFlag::empty(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn packed_misaligned_offset_is_rejected() {
        let mut sb = SbFile::create(SbSettingsFlags::IS_TIGHTLY_PACKED, 16).unwrap();
        let err = sb
            .add_variable_as_type("v", 1, SB_NONE, ESB_TYPE_F32, SbVarFlag::empty(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    #[test]
    fn sibling_names_must_be_unique() {
        let mut sb = SbFile::create(SbSettingsFlags::IS_TIGHTLY_PACKED, 16).unwrap();
        sb.add_variable_as_type("v", 0, SB_NONE, ESB_TYPE_F32, SbVarFlag::empty(), None).unwrap();
        let err = sb
            .add_variable_as_type("v", 4, SB_NONE, ESB_TYPE_F32, SbVarFlag::empty(), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn struct_member_must_fit_parent_window() {
        let mut sb = SbFile::create(SbSettingsFlags::empty(), 32).unwrap();
        let inner = sb.add_struct("Inner", 16, 16).unwrap();
        sb.add_variable_as_struct("a", 0, SB_NONE, inner, SbVarFlag::empty(), None).unwrap();
        let err = sb
            .add_variable_as_type("oops", 0, 0, ESB_TYPE_F32X4X4, SbVarFlag::empty(), None)
            .unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn combine_unions_var_flags() {
        let mut a = SbFile::create(SbSettingsFlags::IS_TIGHTLY_PACKED, 16).unwrap();
        a.add_variable_as_type("v", 0, SB_NONE, ESB_TYPE_F32X4, SbVarFlag::IS_USED_VAR_SPIRV, None)
            .unwrap();
        let mut b = a.clone();
        b.vars[0].flags = SbVarFlag::IS_USED_VAR_DXIL;

        let combined = SbFile::combine(&a, &b).unwrap();
        assert_eq!(combined.vars[0].flags, SbVarFlag::IS_USED_VAR_SPIRV | SbVarFlag::IS_USED_VAR_DXIL);
    }
}
