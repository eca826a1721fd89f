//! Optimize/strip recipe and extension demotion (§4.I.2), grounded on
//! `Compiler_processSPIRV`'s `spvtools::Optimizer` setup and its
//! `*demotions = (~exts) & ESHExtension_SpirvNative` computation.
//!
//! This crate has no SPIRV-Tools binding in its dependency stack (no pack
//! example reaches for one), so [`run_recipe`] documents the exact pass
//! sequence without executing it — a stub, not a silent no-op: callers
//! that need the optimized bytes must run the recipe through an external
//! `spirv-opt` binary or the `spirv-tools` crate themselves.

use crate::oish::EshExtension;

/// One step of the optimizer recipe, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizePass {
    /// `spvtools::Optimizer::RegisterPassesFromFlags({"-O", "--legalize-hlsl"})`.
    LegalizeHlsl,
    /// `spvtools::CreateStripDebugInfoPass()`.
    StripDebugInfo,
    /// `spvtools::CreateStripReflectInfoPass()`.
    StripReflectInfo,
}

/// The fixed recipe the reference compiler runs, in order.
pub const RECIPE: [OptimizePass; 3] = [
    OptimizePass::LegalizeHlsl,
    OptimizePass::StripDebugInfo,
    OptimizePass::StripReflectInfo,
];

/// Runs [`RECIPE`] over a SPIR-V module. Always fails: no SPIRV-Tools
/// binding is wired up (see module docs). The bytes are returned
/// untouched to the caller via the error only in spirit; callers should
/// treat any `Err` here as "optimization unavailable", not as a data
/// error.
pub fn run_recipe(_spirv: &[u8]) -> crate::error::Result<Vec<u8>> {
    Err(crate::error::Error::unsupported(
        "SPIR-V optimization recipe (-O --legalize-hlsl, strip debug/reflect info) requires an external SPIRV-Tools binding",
    ))
}

/// Every extension bit the SPIR-V capability bridge can ever produce
/// from `capability_to_extension`. Anything outside this set (DXIL-only
/// extension bits) can never be "demoted away" by stripping SPIR-V
/// capabilities, since SPIR-V never turned it on in the first place.
pub const SPIRV_NATIVE: EshExtension = EshExtension::from_bits_truncate(
    EshExtension::F64.bits()
        | EshExtension::I64.bits()
        | EshExtension::F16.bits()
        | EshExtension::I16.bits()
        | EshExtension::ATOMIC_I64.bits()
        | EshExtension::ATOMIC_F32.bits()
        | EshExtension::ATOMIC_F64.bits()
        | EshExtension::SUBGROUP_ARITHMETIC.bits()
        | EshExtension::SUBGROUP_SHUFFLE.bits()
        | EshExtension::RAY_QUERY.bits()
        | EshExtension::RAY_MICROMAP_OPACITY.bits()
        | EshExtension::RAY_MICROMAP_DISPLACEMENT.bits()
        | EshExtension::RAY_MOTION_BLUR.bits()
        | EshExtension::RAY_REORDER.bits(),
);

/// `*demotions = (~exts) & ESHExtension_SpirvNative`: the extension bits
/// the oiSH binary *could* need (per [`SPIRV_NATIVE`]) that the reflected
/// capabilities didn't actually exercise, and so could safely be demoted
/// off this particular binary's requirement list.
pub fn compute_demotions(enabled_extensions: EshExtension) -> EshExtension {
    (!enabled_extensions) & SPIRV_NATIVE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotions_excludes_enabled_extensions() {
        let enabled = EshExtension::F64 | EshExtension::RAY_QUERY;
        let demotions = compute_demotions(enabled);
        assert!(!demotions.contains(EshExtension::F64));
        assert!(!demotions.contains(EshExtension::RAY_QUERY));
        assert!(demotions.contains(EshExtension::I64));
    }

    #[test]
    fn run_recipe_is_an_explicit_stub() {
        assert!(run_recipe(&[]).is_err());
    }
}
