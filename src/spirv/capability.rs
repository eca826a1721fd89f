//! SPIR-V `OpCapability` → [`EshExtension`] mapping (§4.I.2, §9 "SPIR-V
//! capability table").
//!
//! Grounded on `compiler_spv.cpp`'s `spvMapCapabilityToESHExtension`: a
//! big three-way switch (extension bit / no-op / reject) over every
//! capability SPIRV-Headers defines. Reimplemented as a data table keyed
//! by the raw `SpvCapability` enumerant so the mapping is inspectable and
//! testable without a 300-arm match.

use crate::oish::EshExtension;

/// `SpvCapability` enumerant values, limited to the subset the bridge
/// needs to recognize (either to map, no-op, or explicitly reject). Any
/// value not in [`CAPABILITY_TABLE`] is treated as unknown and rejected
/// the same way the reference treats a `SpvCapability` past
/// `SpvCapabilityMax` — a forward-compat hazard, not a silent accept.
pub type SpvCapability = u32;

pub const CAP_MATRIX: SpvCapability = 0;
pub const CAP_SHADER: SpvCapability = 1;
pub const CAP_GEOMETRY: SpvCapability = 2;
pub const CAP_TESSELLATION: SpvCapability = 3;
pub const CAP_ADDRESSES: SpvCapability = 4;
pub const CAP_LINKAGE: SpvCapability = 5;
pub const CAP_KERNEL: SpvCapability = 6;
pub const CAP_VECTOR16: SpvCapability = 7;
pub const CAP_FLOAT16_BUFFER: SpvCapability = 8;
pub const CAP_FLOAT16: SpvCapability = 9;
pub const CAP_FLOAT64: SpvCapability = 10;
pub const CAP_INT64: SpvCapability = 11;
pub const CAP_INT64_ATOMICS: SpvCapability = 12;
pub const CAP_IMAGE_BASIC: SpvCapability = 13;
pub const CAP_IMAGE_READ_WRITE: SpvCapability = 14;
pub const CAP_IMAGE_MIPMAP: SpvCapability = 15;
pub const CAP_PIPES: SpvCapability = 17;
pub const CAP_GROUPS: SpvCapability = 18;
pub const CAP_DEVICE_ENQUEUE: SpvCapability = 19;
pub const CAP_LITERAL_SAMPLER: SpvCapability = 20;
pub const CAP_ATOMIC_STORAGE: SpvCapability = 21;
pub const CAP_INT16: SpvCapability = 22;
pub const CAP_TESSELLATION_POINT_SIZE: SpvCapability = 23;
pub const CAP_GEOMETRY_POINT_SIZE: SpvCapability = 24;
pub const CAP_IMAGE_GATHER_EXTENDED: SpvCapability = 25;
pub const CAP_STORAGE_IMAGE_MULTISAMPLE: SpvCapability = 27;
pub const CAP_UNIFORM_BUFFER_ARRAY_DYNAMIC_INDEXING: SpvCapability = 28;
pub const CAP_SAMPLED_IMAGE_ARRAY_DYNAMIC_INDEXING: SpvCapability = 29;
pub const CAP_STORAGE_BUFFER_ARRAY_DYNAMIC_INDEXING: SpvCapability = 30;
pub const CAP_STORAGE_IMAGE_ARRAY_DYNAMIC_INDEXING: SpvCapability = 31;
pub const CAP_CLIP_DISTANCE: SpvCapability = 32;
pub const CAP_CULL_DISTANCE: SpvCapability = 33;
pub const CAP_IMAGE_CUBE_ARRAY: SpvCapability = 34;
pub const CAP_SAMPLE_RATE_SHADING: SpvCapability = 35;
pub const CAP_IMAGE_RECT: SpvCapability = 36;
pub const CAP_SAMPLED_RECT: SpvCapability = 37;
pub const CAP_GENERIC_POINTER: SpvCapability = 38;
pub const CAP_INT8: SpvCapability = 39;
pub const CAP_INPUT_ATTACHMENT: SpvCapability = 40;
pub const CAP_SPARSE_RESIDENCY: SpvCapability = 41;
pub const CAP_MIN_LOD: SpvCapability = 42;
pub const CAP_SAMPLED1_D: SpvCapability = 43;
pub const CAP_IMAGE1_D: SpvCapability = 44;
pub const CAP_SAMPLED_CUBE_ARRAY: SpvCapability = 45;
pub const CAP_SAMPLED_BUFFER: SpvCapability = 46;
pub const CAP_IMAGE_BUFFER: SpvCapability = 47;
pub const CAP_IMAGE_MS_ARRAY: SpvCapability = 48;
pub const CAP_STORAGE_IMAGE_EXTENDED_FORMATS: SpvCapability = 49;
pub const CAP_IMAGE_QUERY: SpvCapability = 50;
pub const CAP_DERIVATIVE_CONTROL: SpvCapability = 51;
pub const CAP_INTERPOLATION_FUNCTION: SpvCapability = 52;
pub const CAP_TRANSFORM_FEEDBACK: SpvCapability = 53;
pub const CAP_GEOMETRY_STREAMS: SpvCapability = 54;
pub const CAP_STORAGE_IMAGE_READ_WITHOUT_FORMAT: SpvCapability = 55;
pub const CAP_STORAGE_IMAGE_WRITE_WITHOUT_FORMAT: SpvCapability = 56;
pub const CAP_MULTI_VIEWPORT: SpvCapability = 57;
pub const CAP_DEVICE_GROUP: SpvCapability = 4437;
pub const CAP_MULTI_VIEW: SpvCapability = 4439;
pub const CAP_VARIABLE_POINTERS_STORAGE_BUFFER: SpvCapability = 4441;
pub const CAP_VARIABLE_POINTERS: SpvCapability = 4442;
pub const CAP_RUNTIME_DESCRIPTOR_ARRAY: SpvCapability = 5302;
pub const CAP_FLOAT16_IMAGE_AMD: SpvCapability = 5008;
pub const CAP_IMAGE_GATHER_BIAS_LOD_AMD: SpvCapability = 5009;
pub const CAP_FRAGMENT_MASK_AMD: SpvCapability = 5010;
pub const CAP_STENCIL_EXPORT_EXT: SpvCapability = 5013;
pub const CAP_IMAGE_READ_WRITE_LOD_AMD: SpvCapability = 5015;
pub const CAP_SAMPLE_MASK_OVERRIDE_COVERAGE_NV: SpvCapability = 5249;
pub const CAP_GEOMETRY_SHADER_PASSTHROUGH_NV: SpvCapability = 5251;
pub const CAP_SHADER_VIEWPORT_INDEX_LAYER_EXT: SpvCapability = 5254;
pub const CAP_SHADER_VIEWPORT_MASK_NV: SpvCapability = 5255;
pub const CAP_SHADER_STEREO_VIEW_NV: SpvCapability = 5259;
pub const CAP_PER_VIEW_ATTRIBUTES_NV: SpvCapability = 5260;
pub const CAP_FRAGMENT_FULLY_COVERED_EXT: SpvCapability = 5265;
pub const CAP_MESH_SHADING_NV: SpvCapability = 5266;
pub const CAP_IMAGE_FOOTPRINT_NV: SpvCapability = 5282;
pub const CAP_FRAGMENT_BARYCENTRIC_KHR: SpvCapability = 5284;
pub const CAP_COMPUTE_DERIVATIVE_GROUP_QUADS_NV: SpvCapability = 5288;
pub const CAP_GROUP_NON_UNIFORM_PARTITIONED_NV: SpvCapability = 5297;
pub const CAP_SHADER_NON_UNIFORM: SpvCapability = 5301;
pub const CAP_UNIFORM_BUFFER_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5303;
pub const CAP_SAMPLED_IMAGE_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5305;
pub const CAP_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5307;
pub const CAP_STORAGE_IMAGE_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5309;
pub const CAP_INPUT_ATTACHMENT_ARRAY_DYNAMIC_INDEXING: SpvCapability = 5310;
pub const CAP_UNIFORM_TEXEL_BUFFER_ARRAY_DYNAMIC_INDEXING: SpvCapability = 5311;
pub const CAP_STORAGE_TEXEL_BUFFER_ARRAY_DYNAMIC_INDEXING: SpvCapability = 5312;
pub const CAP_UNIFORM_TEXEL_BUFFER_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5313;
pub const CAP_STORAGE_TEXEL_BUFFER_ARRAY_NON_UNIFORM_INDEXING: SpvCapability = 5315;
pub const CAP_RAY_TRACING_NV: SpvCapability = 5340;
pub const CAP_RAY_TRACING_MOTION_BLUR_NV: SpvCapability = 5341;
pub const CAP_VULKAN_MEMORY_MODEL: SpvCapability = 5345;
pub const CAP_VULKAN_MEMORY_MODEL_DEVICE_SCOPE: SpvCapability = 5346;
pub const CAP_PHYSICAL_STORAGE_BUFFER_ADDRESSES: SpvCapability = 5347;
pub const CAP_COMPUTE_DERIVATIVE_GROUP_LINEAR_NV: SpvCapability = 5350;
pub const CAP_RAY_TRACING_PROVISIONAL_KHR: SpvCapability = 5353;
pub const CAP_COOPERATIVE_MATRIX_NV: SpvCapability = 5357;
pub const CAP_FRAGMENT_SHADER_SAMPLE_INTERLOCK_EXT: SpvCapability = 5363;
pub const CAP_FRAGMENT_SHADER_SHADING_RATE_INTERLOCK_EXT: SpvCapability = 5372;
pub const CAP_SHADER_SM_BUILTINS_NV: SpvCapability = 5373;
pub const CAP_FRAGMENT_SHADER_PIXEL_INTERLOCK_EXT: SpvCapability = 5378;
pub const CAP_DEMOTE_TO_HELPER_INVOCATION: SpvCapability = 5379;
pub const CAP_RAY_TRACING_KHR: SpvCapability = 4479;
pub const CAP_RAY_QUERY_KHR: SpvCapability = 4472;
pub const CAP_RAY_TRAVERSAL_PRIMITIVE_CULLING_KHR: SpvCapability = 4478;
pub const CAP_RAY_QUERY_PROVISIONAL_KHR: SpvCapability = 4471;
pub const CAP_MESH_SHADING_EXT: SpvCapability = 5283;
pub const CAP_RAY_TRACING_OPACITY_MICROMAP_EXT: SpvCapability = 5396;
pub const CAP_SHADER_INVOCATION_REORDER_NV: SpvCapability = 5383;
pub const CAP_ATOMIC_FLOAT32_ADD_EXT: SpvCapability = 6033;
pub const CAP_ATOMIC_FLOAT64_ADD_EXT: SpvCapability = 6034;
pub const CAP_ATOMIC_FLOAT16_ADD_EXT: SpvCapability = 6095;
pub const CAP_ATOMIC_FLOAT32_MIN_MAX_EXT: SpvCapability = 5112;
pub const CAP_ATOMIC_FLOAT64_MIN_MAX_EXT: SpvCapability = 5113;
pub const CAP_ATOMIC_FLOAT16_MIN_MAX_EXT: SpvCapability = 5114;
pub const CAP_GROUP_NON_UNIFORM: SpvCapability = 61;
pub const CAP_GROUP_NON_UNIFORM_VOTE: SpvCapability = 62;
pub const CAP_GROUP_NON_UNIFORM_ARITHMETIC: SpvCapability = 63;
pub const CAP_GROUP_NON_UNIFORM_BALLOT: SpvCapability = 64;
pub const CAP_GROUP_NON_UNIFORM_SHUFFLE: SpvCapability = 65;
pub const CAP_GROUP_NON_UNIFORM_SHUFFLE_RELATIVE: SpvCapability = 66;
pub const CAP_GROUP_NON_UNIFORM_CLUSTERED: SpvCapability = 67;
pub const CAP_GROUP_NON_UNIFORM_QUAD: SpvCapability = 68;
pub const CAP_SHADER_LAYER: SpvCapability = 69;
pub const CAP_SHADER_VIEWPORT_INDEX: SpvCapability = 70;
pub const CAP_SUBGROUP_BALLOT_KHR: SpvCapability = 4423;
pub const CAP_DRAW_PARAMETERS: SpvCapability = 4427;
pub const CAP_SUBGROUP_VOTE_KHR: SpvCapability = 4431;
pub const CAP_STORAGE_BUFFER16_BIT_ACCESS: SpvCapability = 4433;
pub const CAP_STORAGE_UNIFORM16: SpvCapability = 4434;
pub const CAP_STORAGE_PUSH_CONSTANT16: SpvCapability = 4435;
pub const CAP_STORAGE_INPUT_OUTPUT16: SpvCapability = 4436;
pub const CAP_FRAGMENT_SHADING_RATE_KHR: SpvCapability = 4422;

/// Result of looking a capability up in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// Requires the given extension to be declared by the target.
    Extension(EshExtension),
    /// Always allowed; does not gate on any oiSH extension bit.
    NoOp,
    /// Explicitly unsupported (kernels, provisional/vendor-only features).
    Reject,
}

/// `spvMapCapabilityToESHExtension`. Returns `None` for a capability this
/// table has never heard of — the caller must treat that the same as
/// `Reject` (§4.I.2: "Unknown/new capabilities fail with InvalidState"),
/// distinguished only so a test can tell "we know this is unsupported"
/// from "SPIRV-Headers grew a capability we've never seen".
pub fn capability_to_extension(capability: SpvCapability) -> Option<Mapping> {
    use EshExtension as Ext;
    use Mapping::*;

    Some(match capability {
        // RT extension bits.
        CAP_RAY_TRACING_OPACITY_MICROMAP_EXT => Extension(Ext::RAY_MICROMAP_OPACITY),
        CAP_RAY_QUERY_KHR => Extension(Ext::RAY_QUERY),
        CAP_RAY_TRACING_MOTION_BLUR_NV => Extension(Ext::RAY_MOTION_BLUR),
        CAP_SHADER_INVOCATION_REORDER_NV => Extension(Ext::RAY_REORDER),

        // Atomics.
        CAP_ATOMIC_FLOAT32_ADD_EXT | CAP_ATOMIC_FLOAT32_MIN_MAX_EXT => Extension(Ext::ATOMIC_F32),
        CAP_ATOMIC_FLOAT64_ADD_EXT | CAP_ATOMIC_FLOAT64_MIN_MAX_EXT => Extension(Ext::ATOMIC_F64),
        CAP_INT64_ATOMICS => Extension(Ext::I64 | Ext::ATOMIC_I64),

        // Subgroup.
        CAP_GROUP_NON_UNIFORM_ARITHMETIC => Extension(Ext::SUBGROUP_ARITHMETIC),
        CAP_GROUP_NON_UNIFORM_SHUFFLE => Extension(Ext::SUBGROUP_SHUFFLE),

        // Wide types.
        CAP_STORAGE_BUFFER16_BIT_ACCESS
        | CAP_STORAGE_UNIFORM16
        | CAP_STORAGE_PUSH_CONSTANT16
        | CAP_STORAGE_INPUT_OUTPUT16
        | CAP_INT16
        | CAP_FLOAT16 => Extension(Ext::F16 | Ext::I16),
        CAP_FLOAT64 => Extension(Ext::F64),
        CAP_INT64 => Extension(Ext::I64),

        // Always-allowed shader fundamentals and dynamic/non-uniform
        // indexing capabilities — the oiSH reflection bridge doesn't
        // need to track these as extension bits, they're just always on.
        CAP_SHADER
        | CAP_MATRIX
        | CAP_ATOMIC_STORAGE
        | CAP_RUNTIME_DESCRIPTOR_ARRAY
        | CAP_SHADER_NON_UNIFORM
        | CAP_UNIFORM_TEXEL_BUFFER_ARRAY_DYNAMIC_INDEXING
        | CAP_STORAGE_TEXEL_BUFFER_ARRAY_DYNAMIC_INDEXING
        | CAP_UNIFORM_BUFFER_ARRAY_NON_UNIFORM_INDEXING
        | CAP_SAMPLED_IMAGE_ARRAY_NON_UNIFORM_INDEXING
        | CAP_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING
        | CAP_STORAGE_IMAGE_ARRAY_NON_UNIFORM_INDEXING
        | CAP_UNIFORM_TEXEL_BUFFER_ARRAY_NON_UNIFORM_INDEXING
        | CAP_STORAGE_TEXEL_BUFFER_ARRAY_NON_UNIFORM_INDEXING
        | CAP_STORAGE_IMAGE_EXTENDED_FORMATS
        | CAP_IMAGE_QUERY
        | CAP_DERIVATIVE_CONTROL
        | CAP_INPUT_ATTACHMENT
        | CAP_MIN_LOD
        | CAP_UNIFORM_BUFFER_ARRAY_DYNAMIC_INDEXING
        | CAP_SAMPLED_IMAGE_ARRAY_DYNAMIC_INDEXING
        | CAP_STORAGE_BUFFER_ARRAY_DYNAMIC_INDEXING
        | CAP_STORAGE_IMAGE_ARRAY_DYNAMIC_INDEXING
        | CAP_SAMPLED_CUBE_ARRAY
        | CAP_SAMPLED1_D
        | CAP_IMAGE1_D
        | CAP_IMAGE_CUBE_ARRAY => NoOp,

        // Supported as shader stages by the oiSH pipeline-type model
        // itself, not gated by an extension bit.
        CAP_TESSELLATION | CAP_GEOMETRY | CAP_RAY_TRACING_KHR | CAP_MESH_SHADING_EXT => NoOp,

        CAP_MULTI_VIEW => Reject, // no ESHExtension_Multiview in this crate's extension set.
        CAP_COMPUTE_DERIVATIVE_GROUP_LINEAR_NV => Reject, // no ESHExtension_ComputeDeriv counterpart.
        CAP_IMAGE_MS_ARRAY | CAP_STORAGE_IMAGE_MULTISAMPLE => Reject, // no ESHExtension_WriteMSTexture counterpart.

        // Kernel-only, provisional, and vendor-specific capabilities:
        // explicitly unsupported, same bucket as the reference's single
        // fallthrough `retError`.
        CAP_ADDRESSES
        | CAP_LINKAGE
        | CAP_KERNEL
        | CAP_FLOAT16_BUFFER
        | CAP_VECTOR16
        | CAP_IMAGE_BASIC
        | CAP_IMAGE_READ_WRITE
        | CAP_IMAGE_MIPMAP
        | CAP_PIPES
        | CAP_DEVICE_ENQUEUE
        | CAP_LITERAL_SAMPLER
        | CAP_GROUPS
        | CAP_RAY_QUERY_PROVISIONAL_KHR
        | CAP_RAY_TRACING_PROVISIONAL_KHR
        | CAP_FLOAT16_IMAGE_AMD
        | CAP_IMAGE_GATHER_BIAS_LOD_AMD
        | CAP_FRAGMENT_MASK_AMD
        | CAP_IMAGE_READ_WRITE_LOD_AMD
        | CAP_SAMPLE_MASK_OVERRIDE_COVERAGE_NV
        | CAP_GEOMETRY_SHADER_PASSTHROUGH_NV
        | CAP_SHADER_VIEWPORT_MASK_NV
        | CAP_SHADER_STEREO_VIEW_NV
        | CAP_PER_VIEW_ATTRIBUTES_NV
        | CAP_MESH_SHADING_NV
        | CAP_IMAGE_FOOTPRINT_NV
        | CAP_COMPUTE_DERIVATIVE_GROUP_QUADS_NV
        | CAP_GROUP_NON_UNIFORM_PARTITIONED_NV
        | CAP_RAY_TRACING_NV
        | CAP_COOPERATIVE_MATRIX_NV
        | CAP_SHADER_SM_BUILTINS_NV
        | CAP_SHADER_VIEWPORT_INDEX_LAYER_EXT
        | CAP_FRAGMENT_BARYCENTRIC_KHR
        | CAP_DEMOTE_TO_HELPER_INVOCATION
        | CAP_MULTI_VIEWPORT
        | CAP_SHADER_LAYER
        | CAP_SHADER_VIEWPORT_INDEX
        | CAP_FRAGMENT_SHADER_SAMPLE_INTERLOCK_EXT
        | CAP_FRAGMENT_SHADER_SHADING_RATE_INTERLOCK_EXT
        | CAP_FRAGMENT_SHADER_PIXEL_INTERLOCK_EXT
        | CAP_RAY_TRAVERSAL_PRIMITIVE_CULLING_KHR
        | CAP_GROUP_NON_UNIFORM
        | CAP_GROUP_NON_UNIFORM_VOTE
        | CAP_GROUP_NON_UNIFORM_BALLOT
        | CAP_SUBGROUP_VOTE_KHR
        | CAP_SUBGROUP_BALLOT_KHR
        | CAP_GROUP_NON_UNIFORM_SHUFFLE_RELATIVE
        | CAP_GROUP_NON_UNIFORM_CLUSTERED
        | CAP_GROUP_NON_UNIFORM_QUAD
        | CAP_ATOMIC_FLOAT16_ADD_EXT
        | CAP_ATOMIC_FLOAT16_MIN_MAX_EXT
        | CAP_INPUT_ATTACHMENT_ARRAY_DYNAMIC_INDEXING
        | CAP_VULKAN_MEMORY_MODEL
        | CAP_VULKAN_MEMORY_MODEL_DEVICE_SCOPE
        | CAP_PHYSICAL_STORAGE_BUFFER_ADDRESSES
        | CAP_STENCIL_EXPORT_EXT
        | CAP_DEVICE_GROUP
        | CAP_VARIABLE_POINTERS_STORAGE_BUFFER
        | CAP_VARIABLE_POINTERS
        | CAP_DRAW_PARAMETERS
        | CAP_INTERPOLATION_FUNCTION
        | CAP_TRANSFORM_FEEDBACK
        | CAP_SAMPLED_BUFFER
        | CAP_IMAGE_BUFFER
        | CAP_FRAGMENT_SHADING_RATE_KHR
        | CAP_GEOMETRY_STREAMS
        | CAP_STORAGE_IMAGE_READ_WITHOUT_FORMAT
        | CAP_STORAGE_IMAGE_WRITE_WITHOUT_FORMAT
        | CAP_IMAGE_RECT
        | CAP_SAMPLED_RECT
        | CAP_GENERIC_POINTER
        | CAP_INT8
        | CAP_SPARSE_RESIDENCY
        | CAP_SAMPLE_RATE_SHADING
        | CAP_IMAGE_GATHER_EXTENDED
        | CAP_CLIP_DISTANCE
        | CAP_CULL_DISTANCE
        | CAP_TESSELLATION_POINT_SIZE
        | CAP_GEOMETRY_POINT_SIZE
        | CAP_FRAGMENT_FULLY_COVERED_EXT => Reject,

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extension_capability_maps() {
        assert_eq!(
            capability_to_extension(CAP_RAY_QUERY_KHR),
            Some(Mapping::Extension(EshExtension::RAY_QUERY))
        );
        assert_eq!(
            capability_to_extension(CAP_INT64_ATOMICS),
            Some(Mapping::Extension(EshExtension::I64 | EshExtension::ATOMIC_I64))
        );
    }

    #[test]
    fn no_op_capability_is_always_allowed() {
        assert_eq!(capability_to_extension(CAP_SHADER), Some(Mapping::NoOp));
        assert_eq!(capability_to_extension(CAP_MATRIX), Some(Mapping::NoOp));
    }

    #[test]
    fn kernel_capability_is_rejected() {
        // S6: feeding capability `Kernel` must be rejected.
        assert_eq!(capability_to_extension(CAP_KERNEL), Some(Mapping::Reject));
    }

    #[test]
    fn unknown_capability_returns_none() {
        assert_eq!(capability_to_extension(0xFFFF_FFF0), None);
    }
}
