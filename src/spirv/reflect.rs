//! The SPIR-V reflection input shape the bridge consumes (§6.7), plus the
//! entry-point walk and graphics I/O reflection steps (§4.I.3-§4.I.4).
//!
//! These types model the shape an external reflection library (the
//! corpus's SPIRV-Reflect equivalent) hands the bridge. This crate does
//! not parse SPIR-V bytecode itself — §1 treats that as an external
//! collaborator — so [`ReflectModule`] is the boundary: anything that can
//! populate this shape (a real reflection library, a test fixture) can
//! drive [`crate::spirv::convert`].

use crate::error::{Error, Result};
use crate::oish::EshPipelineStage;

/// `SpvExecutionModel` values this bridge recognizes.
pub mod execution_model {
    pub const VERTEX: u32 = 0;
    pub const TESSELLATION_CONTROL: u32 = 1;
    pub const TESSELLATION_EVALUATION: u32 = 2;
    pub const GEOMETRY: u32 = 3;
    pub const FRAGMENT: u32 = 4;
    pub const GL_COMPUTE: u32 = 5;
    pub const KERNEL: u32 = 6;
    pub const TASK_NV: u32 = 5267;
    pub const MESH_NV: u32 = 5268;
    pub const RAY_GENERATION_KHR: u32 = 5313;
    pub const INTERSECTION_KHR: u32 = 5314;
    pub const ANY_HIT_KHR: u32 = 5315;
    pub const CLOSEST_HIT_KHR: u32 = 5316;
    pub const MISS_KHR: u32 = 5317;
    pub const CALLABLE_KHR: u32 = 5318;
    pub const TASK_EXT: u32 = 5364;
    pub const MESH_EXT: u32 = 5365;
}

/// SPIR-V `Dim` values for [`ImageTraits::dim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDim {
    D1,
    D2,
    D3,
    Cube,
    Rect,
    Buffer,
    SubpassData,
}

/// `SpvReflectDescriptorType`, limited to the variants the bridge can
/// classify (§4.I.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    UniformBuffer,
    StorageBuffer,
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    AccelerationStructureKhr,
    InputAttachment,
    UniformTexelBuffer,
    StorageTexelBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
}

/// `SpvReflectNumericTraits`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericTraits {
    pub scalar_width: u32,
    pub vector_component_count: u32,
    pub matrix_row_count: u32,
    pub matrix_column_count: u32,
    pub matrix_stride: u32,
    pub row_major: bool,
}

/// `SpvReflectTypeDescription`, trimmed to the fields §4.I.6's recursive
/// member walk needs.
#[derive(Debug, Clone, Default)]
pub struct TypeDescription {
    pub type_name: String,
    pub is_struct: bool,
    pub is_array: bool,
    pub is_matrix: bool,
    pub is_vector: bool,
    /// External data (pointers/images/etc.), a ref, or void — these
    /// can't appear inside a struct this bridge is asked to flatten.
    pub is_disallowed: bool,
    pub struct_type_description: Option<Box<TypeDescription>>,
}

/// `SpvReflectBlockVariable` — one member of a uniform/storage buffer
/// block, or the block itself.
#[derive(Debug, Clone, Default)]
pub struct BlockVariable {
    pub name: String,
    /// Byte offset of this member within its immediate parent block
    /// (`SpvReflectBlockVariable::offset`). Zero for the outer block
    /// itself, which is positioned by the caller instead.
    pub offset: u32,
    /// Unpadded size; 0 for a block that only names a type (the
    /// "StructuredBuffer<T>" shape where `members` holds exactly one
    /// synthetic `$Element` entry).
    pub size: u32,
    pub padded_size: u32,
    pub members: Vec<BlockVariable>,
    pub type_description: TypeDescription,
    pub array_dims: Vec<u32>,
    pub array_stride: u32,
    pub numeric: NumericTraits,
    /// `true` unless SPIRV-Reflect's `flags` field holds something other
    /// than `SPV_REFLECT_VARIABLE_FLAGS_UNUSED`.
    pub is_unused: bool,
}

/// `SpvReflectImageTraits`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTraits {
    pub dim: Option<ImageDim>,
    pub arrayed: bool,
    pub ms: bool,
    pub depth: bool,
    /// 1 = sampled (texture), 2 = storage (read/write image).
    pub sampled: u32,
    /// `SpvImageFormat` numeric value; 0 (`Unknown`) for sampled images.
    pub image_format: u32,
}

/// `SpvReflectDescriptorBinding`.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBinding {
    pub descriptor_type: Option<DescriptorType>,
    pub set: u32,
    pub binding: u32,
    pub name: String,
    pub count: u32,
    pub array_dims: Vec<u32>,
    pub accessed: bool,
    pub non_writable: bool,
    pub block: Option<BlockVariable>,
    pub image: Option<ImageTraits>,
    pub input_attachment_index: u32,
    pub uav_counter_id: Option<u32>,
    pub uav_counter_binding: Option<u32>,
    pub type_description: TypeDescription,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    pub set: u32,
    pub bindings: Vec<DescriptorBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Input,
    Output,
    /// `SpvStorageClassIncomingRayPayloadKHR`.
    RayPayload,
    /// `SpvStorageClassHitAttributeKHR`.
    HitAttribute,
    Other,
}

/// `SpvReflectInterfaceVariable`.
#[derive(Debug, Clone, Default)]
pub struct InterfaceVariable {
    pub storage_class: Option<StorageClass>,
    pub name: String,
    pub location: Option<u32>,
    /// `SpvReflectFormat` numeric id, populated for scalar/vector
    /// in/out variables.
    pub format: Option<u32>,
    /// Set when this interface variable carries a SPIR-V builtin
    /// semantic (`gl_Position` and friends) — these are excluded from
    /// graphics I/O reflection (§4.I.4).
    pub built_in: bool,
    pub type_description: TypeDescription,
    /// Present only for `IncomingRayPayloadKHR`/`HitAttributeKHR`
    /// storage-class variables, whose struct layout the RT payload/
    /// attribute size calculation (§4.I.3) needs to walk.
    pub payload_block: Option<BlockVariable>,
}

impl Default for StorageClass {
    fn default() -> Self {
        StorageClass::Other
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReflectEntryPoint {
    pub execution_model: u32,
    pub name: String,
    pub local_size: [u32; 3],
    pub interface_variables: Vec<InterfaceVariable>,
    pub descriptor_sets: Vec<DescriptorSet>,
}

#[derive(Debug, Clone, Default)]
pub struct ReflectModule {
    pub capabilities: Vec<u32>,
    pub entry_points: Vec<ReflectEntryPoint>,
}

/// §4.I.1 "Header sanity": length >= 8, multiple of 4, first word is the
/// SPIR-V magic number.
pub fn header_sanity(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 8 {
        return Err(Error::invalid_state("SPIR-V module shorter than 8 bytes"));
    }
    if bytes.len() % 4 != 0 {
        return Err(Error::invalid_state("SPIR-V module length is not a multiple of 4"));
    }
    let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    if magic != 0x0723_0203 {
        return Err(Error::invalid_state("SPIR-V module does not start with the SPIR-V magic number"));
    }
    Ok(())
}

/// §4.I.3 execution-model walk: `SpvExecutionModel` → [`EshPipelineStage`].
pub fn map_execution_model(model: u32) -> Result<EshPipelineStage> {
    use execution_model::*;
    Ok(match model {
        VERTEX => EshPipelineStage::Vertex,
        FRAGMENT => EshPipelineStage::Pixel,
        GL_COMPUTE => EshPipelineStage::Compute,
        GEOMETRY => EshPipelineStage::GeometryExt,
        TESSELLATION_CONTROL => EshPipelineStage::Hull,
        TESSELLATION_EVALUATION => EshPipelineStage::Domain,
        MESH_NV | MESH_EXT => EshPipelineStage::MeshExt,
        TASK_NV | TASK_EXT => EshPipelineStage::TaskExt,
        RAY_GENERATION_KHR => EshPipelineStage::RaygenExt,
        CALLABLE_KHR => EshPipelineStage::CallableExt,
        MISS_KHR => EshPipelineStage::MissExt,
        CLOSEST_HIT_KHR => EshPipelineStage::ClosestHitExt,
        ANY_HIT_KHR => EshPipelineStage::AnyHitExt,
        INTERSECTION_KHR => EshPipelineStage::IntersectionExt,
        KERNEL => {
            return Err(Error::invalid_state(
                "SPIR-V kernel execution model is not a supported oiSH shader stage",
            ))
        }
        _ => return Err(Error::invalid_state("unrecognized SpvExecutionModel")),
    })
}

/// `SpvReflectFormat` → [`crate::oisb::EsbType`] (§4.I.4, grounded on
/// `SpvReflectFormatToESBType`'s R16*..R64G64B64A64_* table).
pub mod format {
    use crate::error::{Error, Result};
    use crate::oisb::{EsbDimension, EsbPrimitive, EsbStride, EsbType};

    pub const R16_UINT: u32 = 0;
    pub const R16_SINT: u32 = 1;
    pub const R16_SFLOAT: u32 = 2;
    pub const R16G16_UINT: u32 = 3;
    pub const R16G16_SINT: u32 = 4;
    pub const R16G16_SFLOAT: u32 = 5;
    pub const R16G16B16_UINT: u32 = 6;
    pub const R16G16B16_SINT: u32 = 7;
    pub const R16G16B16_SFLOAT: u32 = 8;
    pub const R16G16B16A16_UINT: u32 = 9;
    pub const R16G16B16A16_SINT: u32 = 10;
    pub const R16G16B16A16_SFLOAT: u32 = 11;
    pub const R32_UINT: u32 = 12;
    pub const R32_SINT: u32 = 13;
    pub const R32_SFLOAT: u32 = 14;
    pub const R32G32_UINT: u32 = 15;
    pub const R32G32_SINT: u32 = 16;
    pub const R32G32_SFLOAT: u32 = 17;
    pub const R32G32B32_UINT: u32 = 18;
    pub const R32G32B32_SINT: u32 = 19;
    pub const R32G32B32_SFLOAT: u32 = 20;
    pub const R32G32B32A32_UINT: u32 = 21;
    pub const R32G32B32A32_SINT: u32 = 22;
    pub const R32G32B32A32_SFLOAT: u32 = 23;
    pub const R64_UINT: u32 = 24;
    pub const R64_SINT: u32 = 25;
    pub const R64_SFLOAT: u32 = 26;
    pub const R64G64_UINT: u32 = 27;
    pub const R64G64_SINT: u32 = 28;
    pub const R64G64_SFLOAT: u32 = 29;
    pub const R64G64B64_UINT: u32 = 30;
    pub const R64G64B64_SINT: u32 = 31;
    pub const R64G64B64_SFLOAT: u32 = 32;
    pub const R64G64B64A64_UINT: u32 = 33;
    pub const R64G64B64A64_SINT: u32 = 34;
    pub const R64G64B64A64_SFLOAT: u32 = 35;

    pub fn to_esb_type(format: u32) -> Result<EsbType> {
        use EsbDimension::*;
        use EsbPrimitive::*;
        use EsbStride::*;

        let (stride, prim, vec) = match format {
            R16_UINT => (X16, UInt, N1),
            R16_SINT => (X16, Int, N1),
            R16_SFLOAT => (X16, Float, N1),
            R16G16_UINT => (X16, UInt, N2),
            R16G16_SINT => (X16, Int, N2),
            R16G16_SFLOAT => (X16, Float, N2),
            R16G16B16_UINT => (X16, UInt, N3),
            R16G16B16_SINT => (X16, Int, N3),
            R16G16B16_SFLOAT => (X16, Float, N3),
            R16G16B16A16_UINT => (X16, UInt, N4),
            R16G16B16A16_SINT => (X16, Int, N4),
            R16G16B16A16_SFLOAT => (X16, Float, N4),
            R32_UINT => (X32, UInt, N1),
            R32_SINT => (X32, Int, N1),
            R32_SFLOAT => (X32, Float, N1),
            R32G32_UINT => (X32, UInt, N2),
            R32G32_SINT => (X32, Int, N2),
            R32G32_SFLOAT => (X32, Float, N2),
            R32G32B32_UINT => (X32, UInt, N3),
            R32G32B32_SINT => (X32, Int, N3),
            R32G32B32_SFLOAT => (X32, Float, N3),
            R32G32B32A32_UINT => (X32, UInt, N4),
            R32G32B32A32_SINT => (X32, Int, N4),
            R32G32B32A32_SFLOAT => (X32, Float, N4),
            R64_UINT => (X64, UInt, N1),
            R64_SINT => (X64, Int, N1),
            R64_SFLOAT => (X64, Float, N1),
            R64G64_UINT => (X64, UInt, N2),
            R64G64_SINT => (X64, Int, N2),
            R64G64_SFLOAT => (X64, Float, N2),
            R64G64B64_UINT => (X64, UInt, N3),
            R64G64B64_SINT => (X64, Int, N3),
            R64G64B64_SFLOAT => (X64, Float, N3),
            R64G64B64A64_UINT => (X64, UInt, N4),
            R64G64B64A64_SINT => (X64, Int, N4),
            R64G64B64A64_SFLOAT => (X64, Float, N4),
            _ => return Err(Error::invalid_state("couldn't map SpvReflectFormat to ESBType")),
        };
        Ok(EsbType::create(stride, prim, vec, N1))
    }
}

/// A graphics I/O reflection result: one entry per in/out semantic
/// (§4.I.4). Semantic names follow the DXC convention `in.var.<NAME><I>` /
/// `out.var.<NAME><I>`, where `<I>` is a trailing decimal index.
#[derive(Debug, Clone)]
pub struct GraphicsIoVar {
    pub location: u32,
    pub semantic_name: String,
    pub semantic_index: u32,
    pub is_input: bool,
    pub esb_type: crate::oisb::EsbType,
}

fn split_semantic(var_name: &str) -> (String, u32) {
    let stripped = var_name
        .strip_prefix("in.var.")
        .or_else(|| var_name.strip_prefix("out.var."))
        .unwrap_or(var_name);
    let digits_at = stripped
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let (name, digits) = stripped.split_at(digits_at);
    let index = digits.parse().unwrap_or(0);
    (name.to_string(), index)
}

/// Reflect the graphics-stage in/out interface (§4.I.4): builtins are
/// skipped, locations must be `< 16`, and each semantic name is split
/// into a leading name and a trailing decimal index.
pub fn reflect_graphics_io(vars: &[InterfaceVariable], is_input: bool) -> Result<Vec<GraphicsIoVar>> {
    let mut out = Vec::new();
    for var in vars {
        if var.built_in {
            continue;
        }
        let location = var
            .location
            .ok_or_else(|| Error::invalid_state("graphics interface variable missing a location"))?;
        if location >= 16 {
            return Err(Error::out_of_bounds(location as u64, 15, "graphics I/O location must be < 16"));
        }
        let format = var
            .format
            .ok_or_else(|| Error::invalid_state("graphics interface variable missing a format"))?;
        let esb_type = format::to_esb_type(format)?;
        let (semantic_name, semantic_index) = split_semantic(&var.name);
        out.push(GraphicsIoVar {
            location,
            semantic_name,
            semantic_index,
            is_input,
            esb_type,
        });
    }
    Ok(out)
}

/// §4.I.3 RT payload/attribute size calculation: recursively sum struct
/// members, multiplying arrays by their declared stride×dims and matrices
/// by `stride × (rowMajor ? rows : cols)` (`SpvCalculateStructLength`,
/// here walking the reflected `BlockVariable` tree rather than raw type
/// descriptions).
pub fn calculate_block_length(block: &BlockVariable) -> Result<u64> {
    let mut len: u64 = 0;

    for member in &block.members {
        if member.type_description.is_disallowed {
            return Err(Error::invalid_state(
                "calculate_block_length: member has external/ref/void data",
            ));
        }

        let cur_len: u64 = if member.type_description.is_array {
            let mut array_len = member.array_stride as u64;
            for &dim in &member.array_dims {
                let prev = array_len;
                array_len = array_len
                    .checked_mul(dim as u64)
                    .ok_or_else(|| Error::overflow("calculate_block_length: array length overflow"))?;
                if array_len < prev {
                    return Err(Error::overflow("calculate_block_length: array length overflow"));
                }
            }
            array_len
        } else if member.type_description.is_struct {
            calculate_block_length(member)?
        } else {
            let numeric = &member.numeric;
            let mut v = (numeric.scalar_width >> 3) as u64;
            if member.type_description.is_matrix {
                v = if !numeric.row_major {
                    numeric.matrix_stride as u64 * numeric.matrix_column_count as u64
                } else {
                    numeric.matrix_stride as u64 * numeric.matrix_row_count as u64
                };
            } else if member.type_description.is_vector {
                v *= numeric.vector_component_count as u64;
            }
            v
        };

        let prev_len = len;
        len += cur_len;
        if len < prev_len {
            return Err(Error::overflow("calculate_block_length: total length overflow"));
        }
    }

    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sanity_rejects_bad_magic() {
        let bytes = [0u8; 8];
        assert!(header_sanity(&bytes).is_err());
    }

    #[test]
    fn header_sanity_accepts_spirv_magic() {
        let bytes = [0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0];
        assert!(header_sanity(&bytes).is_ok());
    }

    #[test]
    fn execution_model_maps_compute() {
        assert_eq!(
            map_execution_model(execution_model::GL_COMPUTE).unwrap(),
            EshPipelineStage::Compute
        );
    }

    #[test]
    fn execution_model_rejects_kernel() {
        assert!(map_execution_model(execution_model::KERNEL).is_err());
    }

    #[test]
    fn semantic_name_splits_trailing_index() {
        assert_eq!(split_semantic("out.var.TEXCOORD0"), ("TEXCOORD".to_string(), 0));
        assert_eq!(split_semantic("in.var.COLOR12"), ("COLOR".to_string(), 12));
    }

    #[test]
    fn struct_length_sums_scalar_members() {
        let block = BlockVariable {
            members: vec![
                BlockVariable {
                    numeric: NumericTraits {
                        scalar_width: 32,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                BlockVariable {
                    type_description: TypeDescription {
                        is_vector: true,
                        ..Default::default()
                    },
                    numeric: NumericTraits {
                        scalar_width: 32,
                        vector_component_count: 3,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(calculate_block_length(&block).unwrap(), 4 + 12);
    }
}
