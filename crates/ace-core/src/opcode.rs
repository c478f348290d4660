//! Opcode set of the ACE stack machine
//!
//! Each opcode is a single byte. `PUSH` is followed by an 8-byte
//! little-endian immediate; `JMP`, `JMPIF` and `CALL` by a 4-byte
//! little-endian absolute target. Every other opcode stands alone.

use std::fmt;

/// A recognized opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0x00,
    Push = 0x01,
    Pop = 0x02,
    Add = 0x03,
    Sub = 0x04,
    Mul = 0x05,
    Div = 0x06,
    Mod = 0x07,
    And = 0x08,
    Or = 0x09,
    Xor = 0x0A,
    Not = 0x0B,
    Eq = 0x0C,
    Lt = 0x0D,
    Gt = 0x0E,
    Jmp = 0x0F,
    JmpIf = 0x10,
    Call = 0x11,
    Ret = 0x12,
    Load = 0x13,
    Store = 0x14,
    Hash = 0x15,
    Verify = 0x16,
    Halt = 0xFF,
}

impl Opcode {
    /// Every opcode, in byte order
    pub const ALL: [Opcode; 24] = [
        Opcode::Nop,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Div,
        Opcode::Mod,
        Opcode::And,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Not,
        Opcode::Eq,
        Opcode::Lt,
        Opcode::Gt,
        Opcode::Jmp,
        Opcode::JmpIf,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Load,
        Opcode::Store,
        Opcode::Hash,
        Opcode::Verify,
        Opcode::Halt,
    ];

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Width in bytes of the immediate operand that follows the opcode
    pub fn immediate_width(self) -> usize {
        match self {
            Opcode::Push => 8,
            Opcode::Jmp | Opcode::JmpIf | Opcode::Call => 4,
            _ => 0,
        }
    }

    /// Total encoded size of the instruction, opcode byte included
    pub fn encoded_len(self) -> usize {
        1 + self.immediate_width()
    }

    /// Fixed gas cost charged before the instruction executes
    pub fn gas_cost(self) -> u64 {
        match self {
            Opcode::Nop => 1,
            Opcode::Push => 3,
            Opcode::Pop => 2,
            Opcode::Add | Opcode::Sub => 3,
            Opcode::Mul | Opcode::Div | Opcode::Mod => 5,
            Opcode::And | Opcode::Or | Opcode::Xor | Opcode::Not => 3,
            Opcode::Eq | Opcode::Lt | Opcode::Gt => 3,
            Opcode::Jmp => 8,
            Opcode::JmpIf => 10,
            Opcode::Call => 10,
            Opcode::Ret => 8,
            Opcode::Load | Opcode::Store => 5,
            Opcode::Hash => 30,
            Opcode::Verify => 40,
            Opcode::Halt => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::Mod => "mod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Not => "not",
            Opcode::Eq => "eq",
            Opcode::Lt => "lt",
            Opcode::Gt => "gt",
            Opcode::Jmp => "jmp",
            Opcode::JmpIf => "jmpif",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Hash => "hash",
            Opcode::Verify => "verify",
            Opcode::Halt => "halt",
        }
    }

    /// Case-insensitive mnemonic lookup
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        let lower = name.to_ascii_lowercase();
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == lower)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    /// Returns the unrecognized byte on failure
    fn try_from(byte: u8) -> std::result::Result<Self, Self::Error> {
        let op = match byte {
            0x00 => Opcode::Nop,
            0x01 => Opcode::Push,
            0x02 => Opcode::Pop,
            0x03 => Opcode::Add,
            0x04 => Opcode::Sub,
            0x05 => Opcode::Mul,
            0x06 => Opcode::Div,
            0x07 => Opcode::Mod,
            0x08 => Opcode::And,
            0x09 => Opcode::Or,
            0x0A => Opcode::Xor,
            0x0B => Opcode::Not,
            0x0C => Opcode::Eq,
            0x0D => Opcode::Lt,
            0x0E => Opcode::Gt,
            0x0F => Opcode::Jmp,
            0x10 => Opcode::JmpIf,
            0x11 => Opcode::Call,
            0x12 => Opcode::Ret,
            0x13 => Opcode::Load,
            0x14 => Opcode::Store,
            0x15 => Opcode::Hash,
            0x16 => Opcode::Verify,
            0xFF => Opcode::Halt,
            other => return Err(other),
        };
        Ok(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
