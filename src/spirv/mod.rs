//! Component I: the SPIR-V → oiSB/oiSH reflection bridge (§4.I). Turns a
//! SPIR-V module plus externally-supplied reflection data
//! ([`reflect::ReflectModule`]) into the pieces an [`crate::oish::ShFile`]
//! entry point needs: pipeline stage, extension requirements, payload and
//! intersection-attribute sizes, graphics I/O locations, and per-binding
//! register classification. Shader-buffer layout extraction lives in
//! [`buffer`]; register classification in [`registers`]; capability
//! mapping in [`capability`].
//!
//! Grounded throughout on `Compiler_processSPIRV` (the orchestration
//! function) and the helpers it calls.

pub mod buffer;
pub mod capability;
pub mod disasm;
pub mod optimize;
pub mod reflect;
pub mod registers;

use crate::error::{Error, Result};
use crate::oish::{EshExtension, EshPipelineStage, EshPipelineType};
use reflect::{header_sanity, map_execution_model, reflect_graphics_io, GraphicsIoVar, ReflectEntryPoint, ReflectModule};
use registers::{classify_register, Register};

const MAX_RT_PAYLOAD_SIZE: u64 = 128;
const MAX_RT_ATTRIBUTE_SIZE: u64 = 32;

fn is_graphics_stage(stage: EshPipelineStage) -> bool {
    stage.pipeline_type() == EshPipelineType::Graphics
}

/// One entry point's converted reflection data, ready to feed
/// [`crate::oish::ShEntry`] and the binding table.
#[derive(Debug, Clone)]
pub struct ConvertedEntryPoint {
    pub name: String,
    pub stage: EshPipelineStage,
    pub local_size: [u32; 3],
    pub payload_size: u8,
    pub intersection_size: u8,
    pub inputs: Vec<GraphicsIoVar>,
    pub outputs: Vec<GraphicsIoVar>,
    pub registers: Vec<Register>,
}

/// Everything the bridge extracts from one SPIR-V module.
#[derive(Debug, Clone)]
pub struct BridgeOutput {
    pub extensions: EshExtension,
    pub demotions: EshExtension,
    pub entry_points: Vec<ConvertedEntryPoint>,
}

fn validate_group_size(local_size: [u32; 3]) -> Result<()> {
    let total = local_size[0] as u64 * local_size[1] as u64 * local_size[2] as u64;
    if total == 0 || total > 1024 {
        return Err(Error::out_of_bounds(total, 1024, "compute/mesh/task group size out of bounds"));
    }
    Ok(())
}

/// §4.I.2: validate the module's capabilities map to a known subset of
/// `ESHExtension`, none are `Reject`-ed, and compute the demotion mask.
fn validate_capabilities(module: &ReflectModule, declared_extensions: EshExtension) -> Result<EshExtension> {
    let mut exts = EshExtension::empty();

    for &cap in &module.capabilities {
        match capability::capability_to_extension(cap) {
            Some(capability::Mapping::Extension(ext)) => exts |= ext,
            Some(capability::Mapping::NoOp) => {}
            Some(capability::Mapping::Reject) => {
                return Err(Error::invalid_state("SPIR-V module uses a capability unsupported by oiSH"))
            }
            None => return Err(Error::invalid_state("SPIR-V module uses an unrecognized capability")),
        }
    }

    if !declared_extensions.contains(exts) {
        return Err(Error::invalid_state(
            "SPIR-V module uses a capability that wasn't enabled by the oiSH file (use annotations)",
        ));
    }

    Ok(optimize::compute_demotions(exts))
}

/// §4.I.3: classify one entry point's stage, validate group size for
/// compute-shaped stages, and extract RT payload/attribute sizes.
fn convert_entry_point(entry: &ReflectEntryPoint) -> Result<(EshPipelineStage, [u32; 3], u8, u8)> {
    let stage = map_execution_model(entry.execution_model)?;

    let mut local_size = [0u32; 3];
    if matches!(stage, EshPipelineStage::Compute | EshPipelineStage::MeshExt | EshPipelineStage::TaskExt) {
        local_size = entry.local_size;
        validate_group_size(local_size)?;
    }

    let search_payload = matches!(
        stage,
        EshPipelineStage::AnyHitExt
            | EshPipelineStage::ClosestHitExt
            | EshPipelineStage::MissExt
            | EshPipelineStage::CallableExt
            | EshPipelineStage::IntersectionExt
    );
    let search_intersection = matches!(stage, EshPipelineStage::IntersectionExt);

    let mut payload_size: u64 = 0;
    let mut intersection_size: u64 = 0;

    if search_payload || search_intersection {
        use reflect::StorageClass;
        for var in &entry.interface_variables {
            let is_payload = var.storage_class == Some(StorageClass::RayPayload);
            let is_intersection = var.storage_class == Some(StorageClass::HitAttribute);
            if !is_payload && !is_intersection {
                continue;
            }
            if !var.type_description.is_struct {
                return Err(Error::invalid_state("struct payload or intersection attribute isn't a struct"));
            }
            let block = var
                .payload_block
                .as_ref()
                .ok_or_else(|| Error::invalid_state("payload or intersection attribute missing block layout"))?;
            let struct_size = reflect::calculate_block_length(block)?;

            if is_payload {
                payload_size = struct_size;
            } else {
                intersection_size = struct_size;
            }
        }
    }

    if search_payload && payload_size == 0 {
        return Err(Error::invalid_state("payload wasn't found in the SPIR-V module"));
    }
    if search_intersection && intersection_size == 0 {
        return Err(Error::invalid_state("intersection attribute wasn't found in the SPIR-V module"));
    }
    if payload_size > MAX_RT_PAYLOAD_SIZE {
        return Err(Error::out_of_bounds(payload_size, MAX_RT_PAYLOAD_SIZE, "payload out of bounds"));
    }
    if intersection_size > MAX_RT_ATTRIBUTE_SIZE {
        return Err(Error::out_of_bounds(intersection_size, MAX_RT_ATTRIBUTE_SIZE, "intersection attribute out of bounds"));
    }

    Ok((stage, local_size, payload_size as u8, intersection_size as u8))
}

/// Top-level orchestration (`Compiler_processSPIRV`): validate the SPIR-V
/// header, check capabilities against `declared_extensions`, walk every
/// entry point, and classify every descriptor binding into a register.
pub fn convert(spirv: &[u8], module: &ReflectModule, declared_extensions: EshExtension) -> Result<BridgeOutput> {
    header_sanity(spirv)?;

    let demotions = validate_capabilities(module, declared_extensions)?;

    let mut entry_points = Vec::with_capacity(module.entry_points.len());
    for entry in &module.entry_points {
        let (stage, local_size, payload_size, intersection_size) = convert_entry_point(entry)?;

        let (inputs, outputs) = if is_graphics_stage(stage) {
            let inputs = reflect_graphics_io(
                &entry.interface_variables.iter().filter(|v| v.storage_class == Some(reflect::StorageClass::Input)).cloned().collect::<Vec<_>>(),
                true,
            )?;
            let outputs = reflect_graphics_io(
                &entry.interface_variables.iter().filter(|v| v.storage_class == Some(reflect::StorageClass::Output)).cloned().collect::<Vec<_>>(),
                false,
            )?;
            (inputs, outputs)
        } else {
            (Vec::new(), Vec::new())
        };

        let mut registers = Vec::new();
        for set in &entry.descriptor_sets {
            for binding in &set.bindings {
                if let Some(reg) = classify_register(binding, set.set)? {
                    registers.push(reg);
                }
            }
        }

        entry_points.push(ConvertedEntryPoint {
            name: entry.name.clone(),
            stage,
            local_size,
            payload_size,
            intersection_size,
            inputs,
            outputs,
            registers,
        });
    }

    Ok(BridgeOutput {
        extensions: declared_extensions,
        demotions,
        entry_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spirv::capability::CAP_SHADER;
    use reflect::{execution_model, InterfaceVariable, ReflectEntryPoint, StorageClass};

    fn minimal_module() -> Vec<u8> {
        let words: [u32; 5] = [0x0723_0203, 0x0001_0300, 0, 1, 0];
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn converts_a_trivial_vertex_shader() {
        let spirv = minimal_module();
        let module = ReflectModule {
            capabilities: vec![CAP_SHADER],
            entry_points: vec![ReflectEntryPoint {
                execution_model: execution_model::VERTEX,
                name: "main".to_string(),
                local_size: [0, 0, 0],
                interface_variables: vec![InterfaceVariable {
                    storage_class: Some(StorageClass::Output),
                    name: "out.var.SV_Position".to_string(),
                    location: Some(0),
                    format: Some(reflect::format::R32G32B32A32_SFLOAT),
                    built_in: true,
                    ..Default::default()
                }],
                descriptor_sets: vec![],
            }],
        };

        let output = convert(&spirv, &module, EshExtension::empty()).unwrap();
        assert_eq!(output.entry_points.len(), 1);
        assert_eq!(output.entry_points[0].stage, EshPipelineStage::Vertex);
        assert!(output.entry_points[0].outputs.is_empty());
    }

    #[test]
    fn rejects_module_with_disallowed_capability() {
        let spirv = minimal_module();
        let module = ReflectModule {
            capabilities: vec![capability::CAP_KERNEL],
            entry_points: vec![],
        };
        assert!(convert(&spirv, &module, EshExtension::empty()).is_err());
    }

    #[test]
    fn rejects_bad_header() {
        let module = ReflectModule::default();
        assert!(convert(&[0u8; 4], &module, EshExtension::empty()).is_err());
    }
}
