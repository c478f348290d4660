//! Instruction decoding and encoding
//!
//! [`Instruction`] is the closed, tagged form of the opcode set: one variant
//! per instruction, immediates carried in the variant. Decoding is purely
//! structural and shared by the validator, the executor and the disassembler,
//! so trailing operand bytes are never read as opcodes.

use std::fmt;

use thiserror::Error;

use crate::opcode::Opcode;

// ── Instruction ───────────────────────────────────────────

/// A decoded instruction with its immediate operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Push(u64),
    Pop,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Eq,
    Lt,
    Gt,
    Jmp(u32),
    JmpIf(u32),
    Call(u32),
    Ret,
    Load,
    Store,
    Hash,
    Verify,
    Halt,
}

/// Structural decoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("offset {offset} is outside code of {len} bytes")]
    OutOfBounds { offset: usize, len: usize },

    #[error("unrecognized opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { offset: usize, byte: u8 },

    #[error("{opcode} at offset {offset} needs {needed} immediate bytes, {available} available")]
    TruncatedImmediate {
        offset: usize,
        opcode: Opcode,
        needed: usize,
        available: usize,
    },
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Nop => Opcode::Nop,
            Instruction::Push(_) => Opcode::Push,
            Instruction::Pop => Opcode::Pop,
            Instruction::Add => Opcode::Add,
            Instruction::Sub => Opcode::Sub,
            Instruction::Mul => Opcode::Mul,
            Instruction::Div => Opcode::Div,
            Instruction::Mod => Opcode::Mod,
            Instruction::And => Opcode::And,
            Instruction::Or => Opcode::Or,
            Instruction::Xor => Opcode::Xor,
            Instruction::Not => Opcode::Not,
            Instruction::Eq => Opcode::Eq,
            Instruction::Lt => Opcode::Lt,
            Instruction::Gt => Opcode::Gt,
            Instruction::Jmp(_) => Opcode::Jmp,
            Instruction::JmpIf(_) => Opcode::JmpIf,
            Instruction::Call(_) => Opcode::Call,
            Instruction::Ret => Opcode::Ret,
            Instruction::Load => Opcode::Load,
            Instruction::Store => Opcode::Store,
            Instruction::Hash => Opcode::Hash,
            Instruction::Verify => Opcode::Verify,
            Instruction::Halt => Opcode::Halt,
        }
    }

    pub fn encoded_len(&self) -> usize {
        self.opcode().encoded_len()
    }

    /// Build an instruction that carries no immediate.
    /// Returns `None` for `push`, `jmp`, `jmpif` and `call`.
    pub fn bare(opcode: Opcode) -> Option<Instruction> {
        let insn = match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::Pop => Instruction::Pop,
            Opcode::Add => Instruction::Add,
            Opcode::Sub => Instruction::Sub,
            Opcode::Mul => Instruction::Mul,
            Opcode::Div => Instruction::Div,
            Opcode::Mod => Instruction::Mod,
            Opcode::And => Instruction::And,
            Opcode::Or => Instruction::Or,
            Opcode::Xor => Instruction::Xor,
            Opcode::Not => Instruction::Not,
            Opcode::Eq => Instruction::Eq,
            Opcode::Lt => Instruction::Lt,
            Opcode::Gt => Instruction::Gt,
            Opcode::Ret => Instruction::Ret,
            Opcode::Load => Instruction::Load,
            Opcode::Store => Instruction::Store,
            Opcode::Hash => Instruction::Hash,
            Opcode::Verify => Instruction::Verify,
            Opcode::Halt => Instruction::Halt,
            Opcode::Push | Opcode::Jmp | Opcode::JmpIf | Opcode::Call => return None,
        };
        Some(insn)
    }

    /// Append the encoded instruction to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().byte());
        match *self {
            Instruction::Push(value) => out.extend_from_slice(&value.to_le_bytes()),
            Instruction::Jmp(target) | Instruction::JmpIf(target) | Instruction::Call(target) => {
                out.extend_from_slice(&target.to_le_bytes())
            }
            _ => {}
        }
    }

    /// Decode the instruction starting at `offset`
    pub fn decode(code: &[u8], offset: usize) -> Result<Instruction, DecodeError> {
        let byte = *code.get(offset).ok_or(DecodeError::OutOfBounds {
            offset,
            len: code.len(),
        })?;
        let opcode =
            Opcode::try_from(byte).map_err(|byte| DecodeError::UnknownOpcode { offset, byte })?;

        let needed = opcode.immediate_width();
        let start = offset + 1;
        let available = code.len() - start;
        if available < needed {
            return Err(DecodeError::TruncatedImmediate {
                offset,
                opcode,
                needed,
                available,
            });
        }
        let imm = &code[start..start + needed];

        let insn = match opcode {
            Opcode::Push => Instruction::Push(read_u64(imm)),
            Opcode::Jmp => Instruction::Jmp(read_u32(imm)),
            Opcode::JmpIf => Instruction::JmpIf(read_u32(imm)),
            Opcode::Call => Instruction::Call(read_u32(imm)),
            other => {
                Instruction::bare(other).ok_or(DecodeError::UnknownOpcode { offset, byte })?
            }
        };
        Ok(insn)
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Push(value) => write!(f, "push {}", value),
            Instruction::Jmp(target) | Instruction::JmpIf(target) | Instruction::Call(target) => {
                write!(f, "{} {:#x}", self.opcode(), target)
            }
            other => write!(f, "{}", other.opcode()),
        }
    }
}

// ── Sequential decoding ───────────────────────────────────

/// Iterator over `(offset, instruction)` pairs from offset 0.
/// Yields at most one error and then stops.
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<(usize, Instruction), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.len() {
            return None;
        }
        let offset = self.offset;
        match Instruction::decode(self.code, offset) {
            Ok(insn) => {
                self.offset += insn.encoded_len();
                Some(Ok((offset, insn)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Walk the code structurally, instruction by instruction
pub fn instructions(code: &[u8]) -> Instructions<'_> {
    Instructions {
        code,
        offset: 0,
        failed: false,
    }
}

/// Decode a whole program
pub fn disassemble(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    instructions(code).collect()
}

/// Render a listing that the assembler accepts back unchanged
pub fn format_listing(listing: &[(usize, Instruction)]) -> String {
    let mut out = String::new();
    for (offset, insn) in listing {
        let text = insn.to_string();
        out.push_str(&format!("{:<24}; {:#06x}\n", text, offset));
    }
    out
}

/// Encode a sequence of instructions
pub fn encode(program: &[Instruction]) -> Vec<u8> {
    let mut out = Vec::with_capacity(program.iter().map(Instruction::encoded_len).sum());
    for insn in program {
        insn.encode_into(&mut out);
    }
    out
}
