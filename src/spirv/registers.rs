//! Descriptor binding → register classification (§4.I.5), grounded on
//! `Compiler_convertRegisterSPIRV`: buffer-type detection walks the
//! SPIRV-Cross type name prefix (`type.`, `RW`, `ByteAddressBuffer`,
//! `AppendStructuredBuffer.`, `ConsumeStructuredBuffer.`,
//! `StructuredBuffer.`, `ACSBuffer.counter`), and storage-image formats are
//! mapped to texture format ids with four formats explicitly rejected.

use crate::error::{Error, Result};
use crate::spirv::reflect::{DescriptorBinding, DescriptorType, ImageDim};

/// `ESHBufferType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    ConstantBuffer,
    StorageBuffer,
    StorageBufferAtomic,
    ByteAddressBuffer,
    StructuredBuffer,
    StructuredBufferAtomic,
    AccelerationStructure,
}

/// `ESHTextureType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    Texture1D,
    Texture2D,
    Texture2DMs,
    Texture3D,
    TextureCube,
}

/// `ETextureFormatId`, limited to the ids this bridge's storage-image
/// classification can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormatId {
    Rgba32f,
    Rgba16f,
    R32f,
    Rgba8,
    Rgba8S,
    Rg32f,
    Rg16f,
    R16f,
    Rgba16,
    Bgr10A2,
    Rg16,
    Rg8,
    R16,
    R8,
    Rgba16S,
    Rg16S,
    Rg8S,
    R16S,
    R8S,
    Rgba32I,
    Rgba16I,
    Rgba8I,
    R32I,
    Rg32I,
    Rg16I,
    Rg8I,
    R16I,
    R8I,
    Rgba32U,
    Rgba16U,
    Rgba8U,
    R32U,
    Rg32U,
    Rg16U,
    Rg8U,
    R16U,
    R8U,
}

/// `SpvImageFormat` → [`TextureFormatId`]. `Rgb10a2ui`, `R64ui`, `R64i`
/// and `R11fG11fB10f` have no oiSH texture-format counterpart and are
/// rejected, matching the single combined error case in the original
/// switch.
pub fn image_format_to_texture_format(spv_image_format: u32) -> Result<TextureFormatId> {
    use TextureFormatId::*;
    Ok(match spv_image_format {
        spv_image_format::RGBA32F => Rgba32f,
        spv_image_format::RGBA16F => Rgba16f,
        spv_image_format::R32F => R32f,
        spv_image_format::RGBA8 => Rgba8,
        spv_image_format::RGBA8_SNORM => Rgba8S,
        spv_image_format::RG32F => Rg32f,
        spv_image_format::RG16F => Rg16f,
        spv_image_format::R16F => R16f,
        spv_image_format::RGBA16 => Rgba16,
        spv_image_format::RGB10A2 => Bgr10A2,
        spv_image_format::RG16 => Rg16,
        spv_image_format::RG8 => Rg8,
        spv_image_format::R16 => R16,
        spv_image_format::R8 => R8,
        spv_image_format::RGBA16_SNORM => Rgba16S,
        spv_image_format::RG16_SNORM => Rg16S,
        spv_image_format::RG8_SNORM => Rg8S,
        spv_image_format::R16_SNORM => R16S,
        spv_image_format::R8_SNORM => R8S,
        spv_image_format::RGBA32I => Rgba32I,
        spv_image_format::RGBA16I => Rgba16I,
        spv_image_format::RGBA8I => Rgba8I,
        spv_image_format::R32I => R32I,
        spv_image_format::RG32I => Rg32I,
        spv_image_format::RG16I => Rg16I,
        spv_image_format::RG8I => Rg8I,
        spv_image_format::R16I => R16I,
        spv_image_format::R8I => R8I,
        spv_image_format::RGBA32UI => Rgba32U,
        spv_image_format::RGBA16UI => Rgba16U,
        spv_image_format::RGBA8UI => Rgba8U,
        spv_image_format::R32UI => R32U,
        spv_image_format::RG32UI => Rg32U,
        spv_image_format::RG16UI => Rg16U,
        spv_image_format::RG8UI => Rg8U,
        spv_image_format::R16UI => R16U,
        spv_image_format::R8UI => R8U,
        spv_image_format::RGB10A2UI
        | spv_image_format::R64UI
        | spv_image_format::R64I
        | spv_image_format::R11FG11FB10F => {
            return Err(Error::unsupported(
                "unsupported image format: rg11fb10f, r64i, r64ui, rgb10a2ui",
            ))
        }
        _ => return Err(Error::invalid_state("unrecognized SpvImageFormat")),
    })
}

/// `SpvImageFormat` numeric ids this module classifies.
pub mod spv_image_format {
    pub const RGBA32F: u32 = 1;
    pub const RGBA16F: u32 = 2;
    pub const R32F: u32 = 3;
    pub const RGBA8: u32 = 4;
    pub const RGBA8_SNORM: u32 = 5;
    pub const RG32F: u32 = 6;
    pub const RG16F: u32 = 7;
    pub const R11FG11FB10F: u32 = 8;
    pub const R16F: u32 = 9;
    pub const RGBA16: u32 = 10;
    pub const RGB10A2: u32 = 11;
    pub const RG16: u32 = 12;
    pub const RG8: u32 = 13;
    pub const R16: u32 = 14;
    pub const R8: u32 = 15;
    pub const RGBA16_SNORM: u32 = 16;
    pub const RG16_SNORM: u32 = 17;
    pub const RG8_SNORM: u32 = 18;
    pub const R16_SNORM: u32 = 19;
    pub const R8_SNORM: u32 = 20;
    pub const RGBA32I: u32 = 21;
    pub const RGBA16I: u32 = 22;
    pub const RGBA8I: u32 = 23;
    pub const R32I: u32 = 24;
    pub const RG32I: u32 = 25;
    pub const RG16I: u32 = 26;
    pub const RG8I: u32 = 27;
    pub const R16I: u32 = 28;
    pub const R8I: u32 = 29;
    pub const RGBA32UI: u32 = 30;
    pub const RGBA16UI: u32 = 31;
    pub const RGBA8UI: u32 = 32;
    pub const R32UI: u32 = 33;
    pub const RG32UI: u32 = 34;
    pub const RG16UI: u32 = 35;
    pub const RG8UI: u32 = 36;
    pub const R16UI: u32 = 37;
    pub const R8UI: u32 = 38;
    pub const R64UI: u32 = 40;
    pub const R64I: u32 = 41;
    pub const RGB10A2UI: u32 = 42;
}

/// Classify a SPIRV-Cross type name prefix into a buffer register type
/// (`type.` / `RW` / `ByteAddressBuffer` / `AppendStructuredBuffer.` /
/// `ConsumeStructuredBuffer.` / `StructuredBuffer.` /
/// `ACSBuffer.counter`). Returns `Ok(None)` for the atomic-counter
/// companion buffer, which the caller drops entirely (the
/// `goto clean` in the original with no register emitted).
pub fn classify_buffer_type_name(type_name: &str) -> Result<Option<(BufferType, bool)>> {
    let Some(rest) = type_name.strip_prefix("type.") else {
        return Ok(Some((BufferType::StructuredBuffer, false)));
    };

    let (rest, should_write) = match rest.strip_prefix("RW") {
        Some(r) => (r, true),
        None => (rest, false),
    };

    if rest == "ByteAddressBuffer" {
        return Ok(Some((BufferType::ByteAddressBuffer, should_write)));
    }

    if rest.starts_with("AppendStructuredBuffer.") || rest.starts_with("ConsumeStructuredBuffer.") {
        if should_write {
            return Err(Error::invalid_state("invalid RW prefix for append/consume buffer"));
        }
        return Ok(Some((BufferType::StructuredBufferAtomic, true)));
    }

    if rest == "ACSBuffer.counter" {
        return Ok(None);
    }

    if rest.starts_with("StructuredBuffer.") {
        return Ok(Some((BufferType::StructuredBuffer, should_write)));
    }

    Err(Error::invalid_state("invalid RW prefix for append/consume buffer"))
}

/// A fully classified register, ready to be attached to an `ShEntry`'s
/// binding table. The oiSH format itself only stores input/output usage
/// bitmasks per entry point (see [`crate::oish::ShEntry`]); this shape is
/// the bridge's intermediate result before that final write.
#[derive(Debug, Clone)]
pub enum RegisterKind {
    Buffer {
        ty: BufferType,
        is_write: bool,
    },
    Sampler,
    Texture {
        ty: TextureType,
        is_array: bool,
    },
    RwTexture {
        ty: TextureType,
        is_array: bool,
        format: TextureFormatId,
    },
    AccelerationStructure,
    InputAttachment {
        index: u32,
    },
}

#[derive(Debug, Clone)]
pub struct Register {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub accessed: bool,
    pub kind: RegisterKind,
}

fn texture_dim(dim: Option<ImageDim>, ms: bool) -> Result<(TextureType, u32)> {
    if ms {
        return Ok((TextureType::Texture2DMs, 2));
    }
    match dim {
        Some(ImageDim::D1) => Ok((TextureType::Texture1D, 1)),
        Some(ImageDim::D2) => Ok((TextureType::Texture2D, 2)),
        Some(ImageDim::D3) => Ok((TextureType::Texture3D, 3)),
        Some(ImageDim::Cube) => Ok((TextureType::TextureCube, 3)),
        _ => Err(Error::invalid_state("unsupported image type")),
    }
}

/// §4.I.5: classify one descriptor binding into a [`Register`].
/// `expected_set` must equal `binding.set` (descriptor sets are walked
/// one at a time by the caller).
pub fn classify_register(binding: &DescriptorBinding, expected_set: u32) -> Result<Option<Register>> {
    if binding.set != expected_set {
        return Err(Error::invalid_state("binding set does not match the enclosing descriptor set"));
    }
    if binding.binding == u32::MAX && binding.set == u32::MAX {
        return Err(Error::invalid_state("binding = u32::MAX, set = u32::MAX is reserved"));
    }
    if binding.descriptor_type != Some(DescriptorType::InputAttachment) && binding.input_attachment_index != 0 {
        return Err(Error::invalid_state("input attachment index is invalid on non input attachment"));
    }

    let kind = match binding.descriptor_type {
        Some(DescriptorType::UniformBuffer) => {
            if !binding.array_dims.is_empty() {
                return Err(Error::invalid_state("constant buffers can't be arrays"));
            }
            if binding.uav_counter_id.is_some() || binding.uav_counter_binding.is_some() {
                return Err(Error::invalid_state("constant buffers can't have a UAV counter"));
            }
            RegisterKind::Buffer {
                ty: BufferType::ConstantBuffer,
                is_write: false,
            }
        }

        Some(DescriptorType::StorageBuffer) => {
            let type_name = binding.type_description.type_name.as_str();
            let Some((mut buffer_type, should_write)) = classify_buffer_type_name(type_name)? else {
                return Ok(None);
            };

            let is_atomic = binding.uav_counter_id.is_some() || binding.uav_counter_binding.is_some();
            if buffer_type == BufferType::StorageBuffer && is_atomic {
                buffer_type = BufferType::StorageBufferAtomic;
            }

            RegisterKind::Buffer {
                ty: buffer_type,
                is_write: should_write || is_atomic,
            }
        }

        Some(DescriptorType::Sampler) => RegisterKind::Sampler,

        Some(DescriptorType::SampledImage) => {
            let image = binding
                .image
                .ok_or_else(|| Error::invalid_state("sampled image missing image traits"))?;
            let (ty, _req_depth) = texture_dim(image.dim, image.ms)?;
            RegisterKind::Texture {
                ty,
                is_array: image.arrayed,
            }
        }

        Some(DescriptorType::StorageImage) => {
            let image = binding
                .image
                .ok_or_else(|| Error::invalid_state("storage image missing image traits"))?;
            let (ty, _req_depth) = texture_dim(image.dim, image.ms)?;
            let format = image_format_to_texture_format(image.image_format)?;
            RegisterKind::RwTexture {
                ty,
                is_array: image.arrayed,
                format,
            }
        }

        Some(DescriptorType::AccelerationStructureKhr) => RegisterKind::AccelerationStructure,

        Some(DescriptorType::InputAttachment) => RegisterKind::InputAttachment {
            index: binding.input_attachment_index,
        },

        Some(DescriptorType::CombinedImageSampler) => {
            return Err(Error::unsupported("combined image samplers not supported yet"))
        }

        _ => return Err(Error::invalid_state("unsupported descriptor type for register classification")),
    };

    Ok(Some(Register {
        name: binding.name.clone(),
        set: binding.set,
        binding: binding.binding,
        accessed: binding.accessed,
        kind,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rw_byte_address_buffer() {
        let (ty, write) = classify_buffer_type_name("type.RWByteAddressBuffer").unwrap().unwrap();
        assert_eq!(ty, BufferType::ByteAddressBuffer);
        assert!(write);
    }

    #[test]
    fn classifies_structured_buffer() {
        let (ty, write) = classify_buffer_type_name("type.StructuredBuffer.Foo").unwrap().unwrap();
        assert_eq!(ty, BufferType::StructuredBuffer);
        assert!(!write);
    }

    #[test]
    fn append_buffer_must_not_be_rw() {
        assert!(classify_buffer_type_name("type.RWAppendStructuredBuffer.Foo").is_err());
    }

    #[test]
    fn acsbuffer_counter_is_dropped() {
        assert!(classify_buffer_type_name("type.ACSBuffer.counter").unwrap().is_none());
    }

    #[test]
    fn image_format_rejects_unsupported_four() {
        assert!(image_format_to_texture_format(spv_image_format::RGB10A2UI).is_err());
        assert!(image_format_to_texture_format(spv_image_format::R64UI).is_err());
        assert!(image_format_to_texture_format(spv_image_format::R64I).is_err());
        assert!(image_format_to_texture_format(spv_image_format::R11FG11FB10F).is_err());
    }

    #[test]
    fn image_format_accepts_rgba32f() {
        assert_eq!(
            image_format_to_texture_format(spv_image_format::RGBA32F).unwrap(),
            TextureFormatId::Rgba32f
        );
    }

    fn uniform_buffer_binding() -> DescriptorBinding {
        DescriptorBinding {
            descriptor_type: Some(DescriptorType::UniformBuffer),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_plain_uniform_buffer() {
        let binding = uniform_buffer_binding();
        let register = classify_register(&binding, 0).unwrap().unwrap();
        assert!(matches!(
            register.kind,
            RegisterKind::Buffer { ty: BufferType::ConstantBuffer, is_write: false }
        ));
    }

    #[test]
    fn rejects_arrayed_uniform_buffer() {
        let binding = DescriptorBinding {
            array_dims: vec![4],
            ..uniform_buffer_binding()
        };
        assert!(classify_register(&binding, 0).is_err());
    }

    #[test]
    fn rejects_uniform_buffer_with_uav_counter() {
        let binding = DescriptorBinding {
            uav_counter_id: Some(0),
            uav_counter_binding: Some(1),
            ..uniform_buffer_binding()
        };
        assert!(classify_register(&binding, 0).is_err());
    }
}
