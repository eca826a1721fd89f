//! Shader buffer layout extraction (§4.I.6), grounded on
//! `Compiler_convertShaderBufferSPIRV` and `Compiler_convertMemberSPIRV`.
//!
//! Two shapes feed an [`crate::oisb::SbFile`]: a plain cbuffer/storage
//! buffer walks its block members directly, while a
//! `StructuredBuffer<T>`/`RWStructuredBuffer<T>` has `padded_size == 0` on
//! the outer block and represents the whole buffer as a single
//! `$Element` variable — either a primitive type or a named struct,
//! recursed the same way a normal member would be.

use crate::error::{Error, Result};
use crate::oisb::{EsbType, SbFile, SbSettingsFlags, SbVarFlag, SB_NONE};
use crate::spirv::reflect::BlockVariable;

const MAX_ARRAY_DIMS: usize = 32;

fn used_flag(is_unused: bool) -> SbVarFlag {
    if is_unused {
        SbVarFlag::empty()
    } else {
        SbVarFlag::IS_USED_VAR_SPIRV
    }
}

fn round_up_16(v: u32) -> u32 {
    (v + 15) & !15
}

/// §4.I.6 type-to-ESBType mapping for a non-struct block variable. Only
/// the subset of `SpvReflectTypeDescription`/`NumericTraits` this bridge
/// needs is modeled; scalar/vector/matrix float/int/uint combos funnel
/// through [`format::to_esb_type`]-equivalent construction directly from
/// the numeric traits rather than a format id (block members don't carry
/// a `SpvReflectFormat`, only scalar width/component counts).
fn member_to_esb_type(var: &BlockVariable) -> Result<EsbType> {
    use crate::oisb::{EsbDimension, EsbPrimitive, EsbStride};

    if var.type_description.is_struct {
        return Err(Error::invalid_state("member_to_esb_type called on a struct-typed member"));
    }

    let stride = match var.numeric.scalar_width {
        8 => EsbStride::X8,
        16 => EsbStride::X16,
        32 => EsbStride::X32,
        64 => EsbStride::X64,
        other => {
            return Err(Error::invalid_state(format!(
                "unsupported scalar width for shader buffer member: {other}"
            )))
        }
    };

    // This bridge has no direct line to the original's `typeFlags &
    // SPV_REFLECT_TYPE_FLAG_FLOAT/INT/BOOL`, so the primitive kind rides
    // on `TypeDescription::type_name`'s leading convention
    // ("float"/"int"/"uint"), matching SPIRV-Cross's HLSL type naming.
    let primitive = if var.type_description.type_name.starts_with("uint") {
        EsbPrimitive::UInt
    } else if var.type_description.type_name.starts_with("int") {
        EsbPrimitive::Int
    } else {
        EsbPrimitive::Float
    };

    let vector = match var.numeric.vector_component_count {
        0 | 1 => EsbDimension::N1,
        2 => EsbDimension::N2,
        3 => EsbDimension::N3,
        4 => EsbDimension::N4,
        other => return Err(Error::invalid_state(format!("unsupported vector component count: {other}"))),
    };

    let matrix = if var.type_description.is_matrix {
        match var.numeric.matrix_row_count.max(var.numeric.matrix_column_count) {
            1 => EsbDimension::N1,
            2 => EsbDimension::N2,
            3 => EsbDimension::N3,
            4 => EsbDimension::N4,
            other => return Err(Error::invalid_state(format!("unsupported matrix dimension: {other}"))),
        }
    } else {
        EsbDimension::N1
    };

    let ty = EsbType::create(stride, primitive, vector, matrix);
    ty.validate()?;
    Ok(ty)
}

fn find_or_add_struct(sb_file: &mut SbFile, struct_name: &str, stride: u32) -> Result<u16> {
    for (id, (name, strct)) in sb_file.struct_names.iter().zip(sb_file.structs.iter()).enumerate() {
        if name == struct_name && strct.stride == stride {
            return Ok(id as u16);
        }
    }
    sb_file.add_struct(struct_name.to_string(), stride, stride)
}

/// `Compiler_convertMemberSPIRV`: recursively add one block member
/// (struct or primitive) at `offset + var.offset`, under `parent`.
pub fn convert_member(sb_file: &mut SbFile, var: &BlockVariable, parent: u16, offset: u32, is_packed: bool) -> Result<()> {
    if var.array_dims.len() > MAX_ARRAY_DIMS {
        return Err(Error::out_of_bounds(var.array_dims.len() as u64, MAX_ARRAY_DIMS as u64, "array dimensions out of bounds"));
    }
    if !var.array_dims.is_empty() && var.array_stride == 0 {
        return Err(Error::invalid_state("array stride unset"));
    }
    for &dim in &var.array_dims {
        if dim == 0 {
            return Err(Error::invalid_state("invalid array data (dimension is 0)"));
        }
    }

    let arrays: Option<&[u32]> = if var.array_dims.is_empty() { None } else { Some(&var.array_dims) };
    let member_offset = offset + var.offset;

    if !var.type_description.is_struct {
        let esb_type = member_to_esb_type(var)?;
        let per_element_stride = if var.array_dims.is_empty() {
            esb_type.size(is_packed) as u64
        } else {
            var.array_stride as u64
        };

        let mut expected_size = per_element_stride;
        for &dim in &var.array_dims {
            expected_size = expected_size.saturating_mul(dim as u64);
        }
        if var.size as u64 > expected_size {
            return Err(Error::invalid_state("shader buffer member had mismatching size"));
        }

        sb_file.add_variable_as_type(var.name.clone(), member_offset, parent, esb_type, used_flag(var.is_unused), arrays)?;
        return Ok(());
    }

    let stride = if var.array_dims.is_empty() { var.size } else { var.array_stride };
    let struct_id = find_or_add_struct(sb_file, &var.type_description.type_name, stride)?;

    let new_parent = sb_file.vars.len() as u16;
    sb_file.add_variable_as_struct(var.name.clone(), member_offset, parent, struct_id, used_flag(var.is_unused), arrays)?;

    if var.members.is_empty() {
        return Err(Error::invalid_state("missing member_count or members on struct-typed shader buffer member"));
    }
    for member in &var.members {
        convert_member(sb_file, member, new_parent, member_offset, is_packed)?;
    }
    Ok(())
}

/// `Compiler_convertShaderBufferSPIRV`: build a fresh [`SbFile`] from a
/// descriptor binding's `block`. `is_packed` should be `true` for any
/// storage-buffer binding (HLSL `StructuredBuffer<T>`/raw buffers are
/// tightly packed) and `false` for a `cbuffer`/`ConstantBuffer<T>`.
pub fn convert_shader_buffer(block: &BlockVariable, is_packed: bool) -> Result<SbFile> {
    let packed_flags = if is_packed { SbSettingsFlags::IS_TIGHTLY_PACKED } else { SbSettingsFlags::empty() };

    if block.padded_size == 0 {
        if block.members.len() != 1 {
            return Err(Error::invalid_state("binding is missing member count or members"));
        }
        let inner = &block.members[0];

        if inner.members.is_empty() || inner.padded_size == 0 {
            let ty = member_to_esb_type(inner)?;

            let mut padded_size = ty.size(is_packed) as u32;
            if !is_packed {
                padded_size = round_up_16(padded_size);
            }

            let mut sb_file = SbFile::create(packed_flags, padded_size)?;
            let arrays: Option<&[u32]> = if inner.array_dims.is_empty() { None } else { Some(&inner.array_dims) };
            sb_file.add_variable_as_type("$Element", 0, SB_NONE, ty, used_flag(inner.is_unused), arrays)?;
            return Ok(sb_file);
        }

        let mut sb_file = SbFile::create(packed_flags, inner.padded_size)?;
        let struct_id = sb_file.add_struct(inner.type_description.type_name.clone(), inner.padded_size, inner.padded_size)?;
        sb_file.add_variable_as_struct("$Element", 0, SB_NONE, struct_id, used_flag(inner.is_unused), None)?;

        for member in &inner.members {
            convert_member(&mut sb_file, member, 0, 0, is_packed)?;
        }
        return Ok(sb_file);
    }

    let mut sb_file = SbFile::create(SbSettingsFlags::empty(), block.padded_size)?;
    for member in &block.members {
        convert_member(&mut sb_file, member, SB_NONE, 0, is_packed)?;
    }
    Ok(sb_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spirv::reflect::{NumericTraits, TypeDescription};

    fn scalar_member(name: &str, width: u32) -> BlockVariable {
        scalar_member_at(name, width, 0)
    }

    fn scalar_member_at(name: &str, width: u32, offset: u32) -> BlockVariable {
        BlockVariable {
            name: name.to_string(),
            offset,
            numeric: NumericTraits {
                scalar_width: width,
                ..Default::default()
            },
            is_unused: false,
            ..Default::default()
        }
    }

    #[test]
    fn converts_plain_cbuffer_with_two_floats() {
        let block = BlockVariable {
            padded_size: 16,
            members: vec![scalar_member_at("a", 32, 0), scalar_member_at("b", 32, 4)],
            ..Default::default()
        };
        let sb_file = convert_shader_buffer(&block, false).unwrap();
        assert_eq!(sb_file.vars.len(), 2);
        assert_eq!(sb_file.vars[0].offset, 0);
        assert_eq!(sb_file.vars[1].offset, 4);
        assert_ne!(sb_file.vars[0].offset, sb_file.vars[1].offset);
    }

    #[test]
    fn converts_structured_buffer_single_element() {
        let inner = scalar_member("value", 32);
        let block = BlockVariable {
            padded_size: 0,
            members: vec![inner],
            ..Default::default()
        };
        let sb_file = convert_shader_buffer(&block, true).unwrap();
        assert_eq!(sb_file.vars.len(), 1);
        assert_eq!(sb_file.buffer_size, 4);
    }

    #[test]
    fn converts_structured_buffer_of_structs() {
        let member_a = scalar_member("a", 32);
        let member_b = scalar_member("b", 32);
        let inner = BlockVariable {
            name: "s".to_string(),
            padded_size: 8,
            size: 8,
            type_description: TypeDescription {
                is_struct: true,
                type_name: "MyStruct".to_string(),
                ..Default::default()
            },
            members: vec![member_a, member_b],
            ..Default::default()
        };
        let block = BlockVariable {
            padded_size: 0,
            members: vec![inner],
            ..Default::default()
        };
        let sb_file = convert_shader_buffer(&block, true).unwrap();
        assert_eq!(sb_file.vars.len(), 3);
    }

    #[test]
    fn missing_struct_members_is_rejected() {
        let inner = BlockVariable {
            name: "s".to_string(),
            padded_size: 8,
            size: 8,
            type_description: TypeDescription {
                is_struct: true,
                type_name: "MyStruct".to_string(),
                ..Default::default()
            },
            members: vec![],
            ..Default::default()
        };
        let block = BlockVariable {
            padded_size: 0,
            members: vec![inner],
            ..Default::default()
        };
        assert!(convert_shader_buffer(&block, true).is_err());
    }
}
