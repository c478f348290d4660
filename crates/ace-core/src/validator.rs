//! Bytecode validator: static checks run before any instruction executes
//!
//! Validation is a pure function over the code bytes. It rejects:
//!
//! 1. Empty code
//! 2. Code larger than [`MAX_CONTRACT_SIZE`]
//! 3. Any unrecognized opcode at an instruction boundary
//! 4. Any immediate operand that runs past the end of the code
//! 5. Programs whose last instruction is not `halt`
//!
//! Immediates are skipped structurally, so their bytes are never read as
//! opcodes. Requiring the last *instruction* to be `halt` also guarantees
//! that the final byte is the halt opcode.

use crate::bytecode::{instructions, Instruction};
use crate::{Error, Result, MAX_CONTRACT_SIZE};

/// Summary of a successfully validated program
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ValidationReport {
    /// Code size in bytes
    pub code_size: usize,
    /// Number of instructions at structural boundaries
    pub instruction_count: usize,
    /// Static sum of the instructions' gas costs (one pass, no loops)
    pub straight_line_gas: u64,
}

/// Validate contract bytecode.
///
/// # Errors
/// Returns `InvalidContract` describing the first violation found.
pub fn validate(code: &[u8]) -> Result<ValidationReport> {
    if code.is_empty() {
        return Err(Error::InvalidContract("empty bytecode".into()));
    }
    if code.len() > MAX_CONTRACT_SIZE {
        return Err(Error::InvalidContract(format!(
            "bytecode of {} bytes exceeds maximum of {} bytes",
            code.len(),
            MAX_CONTRACT_SIZE
        )));
    }

    let mut instruction_count = 0usize;
    let mut straight_line_gas = 0u64;
    let mut last = None;

    for item in instructions(code) {
        let (offset, insn) = item.map_err(|e| Error::InvalidContract(e.to_string()))?;
        instruction_count += 1;
        straight_line_gas = straight_line_gas.saturating_add(insn.opcode().gas_cost());
        last = Some((offset, insn));
    }

    match last {
        Some((_, Instruction::Halt)) => Ok(ValidationReport {
            code_size: code.len(),
            instruction_count,
            straight_line_gas,
        }),
        Some((offset, insn)) => Err(Error::InvalidContract(format!(
            "program must end with halt, found {} at offset {}",
            insn, offset
        ))),
        None => Err(Error::InvalidContract("empty bytecode".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::encode;
    use crate::opcode::Opcode;

    fn add_program() -> Vec<u8> {
        encode(&[
            Instruction::Push(10),
            Instruction::Push(20),
            Instruction::Add,
            Instruction::Halt,
        ])
    }

    #[test]
    fn test_valid_program() {
        let report = validate(&add_program()).unwrap();
        assert_eq!(report.code_size, 20);
        assert_eq!(report.instruction_count, 4);
        assert_eq!(report.straight_line_gas, 9);
    }

    #[test]
    fn test_halt_only_program() {
        assert!(validate(&[Opcode::Halt.byte()]).is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = validate(&[]).unwrap_err();
        assert_eq!(err, Error::InvalidContract("empty bytecode".into()));
    }

    #[test]
    fn test_rejects_oversized() {
        let mut code = vec![Opcode::Nop.byte(); MAX_CONTRACT_SIZE];
        code.push(Opcode::Halt.byte());
        let err = validate(&code).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_accepts_maximum_size() {
        let mut code = vec![Opcode::Nop.byte(); MAX_CONTRACT_SIZE - 1];
        code.push(Opcode::Halt.byte());
        assert!(validate(&code).is_ok());
    }

    #[test]
    fn test_rejects_unknown_opcode() {
        let code = vec![Opcode::Nop.byte(), 0x42, Opcode::Halt.byte()];
        let err = validate(&code).unwrap_err();
        assert!(err.to_string().contains("unrecognized opcode 0x42 at offset 1"));
    }

    #[test]
    fn test_rejects_missing_halt() {
        let code = encode(&[Instruction::Push(1), Instruction::Pop]);
        let err = validate(&code).unwrap_err();
        assert!(err.to_string().contains("must end with halt"));
    }

    #[test]
    fn test_halt_byte_inside_immediate_is_not_an_ending() {
        // Last byte is 0xFF but it belongs to the push immediate
        let code = encode(&[Instruction::Push(0xFF00_0000_0000_0000)]);
        assert_eq!(*code.last().unwrap(), 0xFF);
        assert!(validate(&code).is_err());
    }

    #[test]
    fn test_rejects_truncated_immediate() {
        let code = vec![Opcode::Push.byte(), 1, 2, 3, Opcode::Halt.byte()];
        let err = validate(&code).unwrap_err();
        assert!(err.to_string().contains("immediate bytes"));
    }

    #[test]
    fn test_immediate_bytes_skipped() {
        // Immediate bytes that are not opcodes must not be rejected
        let code = encode(&[Instruction::Push(0x4242_4242_4242_4242), Instruction::Halt]);
        assert!(validate(&code).is_ok());
    }

    #[test]
    fn test_report_serializes() {
        let report = validate(&add_program()).unwrap();
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["code_size"], 20);
        assert_eq!(json["instruction_count"], 4);
        assert_eq!(json["straight_line_gas"], 9);
    }

    #[test]
    fn test_validation_is_pure() {
        let code = add_program();
        let first = validate(&code).unwrap();
        for _ in 0..100 {
            assert_eq!(validate(&code).unwrap(), first);
        }
    }
}
