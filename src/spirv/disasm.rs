//! Friendly SPIR-V disassembly (closing note of §4.I): a read-only pass
//! over the module's words that prints an offset-commented, indented
//! listing, without pulling in an actual SPIR-V grammar table.
//!
//! This crate has no `spirv-tools`/`rspirv`-grade disassembler in its
//! dependency stack, and the reference implementation delegates this to
//! `spvtools::Disassemble`. [`disassemble`] produces a useful-enough
//! listing for diagnostics (one line per 32-bit word, grouped by the
//! instruction word count each opcode word encodes) without claiming to
//! be a full disassembler.

use crate::error::{Error, Result};
use crate::spirv::reflect::header_sanity;

/// One decoded instruction header: word count + opcode, plus the operand
/// words that follow it.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub word_offset: usize,
    pub opcode: u16,
    pub word_count: u16,
    pub operands: Vec<u32>,
}

/// Walk a SPIR-V module's instruction stream after the 5-word header,
/// returning one [`Instruction`] per opcode. Doesn't interpret operands
/// (no opcode table is carried), just slices them out.
pub fn walk_instructions(spirv: &[u8]) -> Result<Vec<Instruction>> {
    header_sanity(spirv)?;

    let words: Vec<u32> = spirv
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut out = Vec::new();
    let mut i = 5; // skip magic, version, generator, bound, schema
    while i < words.len() {
        let header = words[i];
        let word_count = (header >> 16) as u16;
        let opcode = (header & 0xFFFF) as u16;
        if word_count == 0 {
            return Err(Error::invalid_state("SPIR-V instruction has a zero word count"));
        }
        let end = i + word_count as usize;
        if end > words.len() {
            return Err(Error::invalid_state("SPIR-V instruction word count overruns the module"));
        }
        out.push(Instruction {
            word_offset: i,
            opcode,
            word_count,
            operands: words[i + 1..end].to_vec(),
        });
        i = end;
    }
    Ok(out)
}

/// Render [`walk_instructions`]'s output as an indented, offset-commented
/// text listing: `// <word offset>` followed by `Op<opcode> <operands...>`.
pub fn disassemble(spirv: &[u8]) -> Result<String> {
    let instructions = walk_instructions(spirv)?;
    let mut out = String::new();
    for ins in instructions {
        out.push_str(&format!(
            "// {:>6}    Op{:<5} {}\n",
            ins.word_offset,
            ins.opcode,
            ins.operands.iter().map(|w| format!("{w:#010x}")).collect::<Vec<_>>().join(" ")
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with_one_nop() -> Vec<u8> {
        let words: [u32; 6] = [
            0x0723_0203, // magic
            0x0001_0300, // version 1.3
            0,           // generator
            1,           // bound
            0,           // schema
            1 << 16,     // OpNop, word_count=1
        ];
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn walks_a_single_instruction() {
        let module = module_with_one_nop();
        let instructions = walk_instructions(&module).unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].opcode, 0);
        assert!(instructions[0].operands.is_empty());
    }

    #[test]
    fn disassembles_to_a_nonempty_listing() {
        let module = module_with_one_nop();
        let text = disassemble(&module).unwrap();
        assert!(text.contains("Op0"));
    }

    #[test]
    fn rejects_instruction_overrunning_the_module() {
        let mut module = module_with_one_nop();
        let last = module.len() - 4;
        module[last..].copy_from_slice(&(2u32 << 16).to_le_bytes());
        assert!(walk_instructions(&module).is_err());
    }
}
